//! Read-only admin API, served on its own listener.

pub mod handlers;

use axum::{routing::get, Router};

use self::handlers::*;
use crate::http::server::AppState;

pub fn admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/workers", get(get_workers))
        .route("/admin/responders", get(get_responders))
        .with_state(state)
}
