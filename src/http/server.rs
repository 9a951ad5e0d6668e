//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the axum Router and middleware (request id, tracing)
//! - Hold shared state: the swappable gateway state and the worker pool
//! - Resolve request paths and hand them to the worker exchange
//! - Apply config reloads; start the health monitor and admin listener

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, Request},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::config::{GatewayConfig, HealthCheckConfig};
use crate::error::GatewayError;
use crate::health::HealthMonitor;
use crate::http::forward;
use crate::http::request::{self, UuidRequestId};
use crate::lifecycle::recv_shutdown;
use crate::load_balancer::{PoolError, WorkerPool};
use crate::observability::metrics;
use crate::protocol::session::SessionSettings;
use crate::resilience::RetryPolicy;
use crate::routing::Dispatcher;

/// Everything a reload replaces.
#[derive(Debug)]
pub struct GatewayState {
    pub config: GatewayConfig,
    pub dispatcher: Dispatcher,
    pub session: SessionSettings,
    pub retry: RetryPolicy,
    pub health: HealthCheckConfig,
    pub request_timeout: Duration,
}

impl GatewayState {
    pub fn from_config(config: GatewayConfig) -> Self {
        Self {
            dispatcher: Dispatcher::from_config(&config.responders),
            session: config.session_settings(),
            retry: RetryPolicy::from_config(&config.retries),
            health: config.health_check.clone(),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            config,
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<GatewayState>>,
    pub pool: Arc<WorkerPool>,
    pub started: Instant,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Result<Self, PoolError> {
        let pool = WorkerPool::new(
            &config.workers,
            Duration::from_millis(config.pool.acquire_timeout_ms),
        )?;
        Ok(Self {
            inner: Arc::new(ArcSwap::from_pointee(GatewayState::from_config(config))),
            pool: Arc::new(pool),
            started: Instant::now(),
        })
    }

    /// Publish a new dispatcher and exchange settings. Worker changes wait
    /// for a restart.
    pub fn reload(&self, config: GatewayConfig) {
        let current = self.inner.load();
        if current.config.workers != config.workers {
            tracing::warn!("Worker list changed; restart the gateway to apply it");
        }
        let responders = config.responders.len();
        self.inner.store(Arc::new(GatewayState::from_config(config)));
        tracing::info!(responders, "Configuration reloaded");
    }
}

/// HTTP front end of the gateway.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    pub fn new(config: GatewayConfig) -> Result<Self, PoolError> {
        Ok(Self {
            state: AppState::new(config)?,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The public router with all middleware layers.
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Serve until `shutdown` fires, applying configs from `config_updates`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let config = self.state.inner.load_full().config.clone();
        tracing::info!(
            address = %addr,
            workers = self.state.pool.capacity(),
            "HTTP server starting"
        );

        {
            let state = self.state.clone();
            let mut stop = shutdown.resubscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        Some(new_config) = config_updates.recv() => state.reload(new_config),
                        _ = stop.recv() => break,
                    }
                }
            });
        }

        if config.health_check.enabled {
            let monitor = HealthMonitor::new(
                self.state.pool.clone(),
                config.health_check.clone(),
                config.session_settings(),
            );
            let stop = shutdown.resubscribe();
            tokio::spawn(async move { monitor.run(stop).await });
        }

        if config.admin.enabled {
            let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
            tracing::info!(address = %config.admin.bind_address, "Admin API listening");
            let app = admin::admin_router(self.state.clone());
            let stop = shutdown.resubscribe();
            tokio::spawn(async move {
                if let Err(e) = axum::serve(admin_listener, app)
                    .with_graceful_shutdown(recv_shutdown(stop))
                    .await
                {
                    tracing::error!(error = %e, "Admin server failed");
                }
            });
        }

        axum::serve(listener, self.router())
            .with_graceful_shutdown(recv_shutdown(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn build_router(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        tracing::info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request::request_id(req.headers()),
        )
    });

    Router::new()
        .route("/{*path}", get(gateway_handler))
        .fallback(not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(trace)
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

/// Resolve the path, negotiate, and run the exchange.
async fn gateway_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    let started = Instant::now();
    let gateway = state.inner.load_full();
    let request_id = request::request_id(&headers).to_string();
    let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok());

    let resolution = match gateway.dispatcher.resolve(&path) {
        Ok(resolution) => resolution,
        Err(e) => {
            tracing::debug!(request_id = %request_id, path = %path, "No responder matched");
            metrics::record_request("none", 404, started);
            return GatewayError::from(e).into_response();
        }
    };

    let responder = match resolution.negotiate(accept) {
        Ok(responder) => responder,
        Err(e) => {
            metrics::record_request(&resolution.responder.name, 406, started);
            return GatewayError::from(e).into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        responder = %responder.name,
        resource = %resolution.resource_id,
        "Dispatching to worker"
    );

    match forward::forward(&state, &gateway, responder, &resolution.resource_id, &request_id).await {
        Ok(reply) => {
            metrics::record_request(&responder.name, 200, started);
            tracing::debug!(request_id = %request_id, worker = %reply.worker, "Request served");
            ([(header::CONTENT_TYPE, responder.media_type.clone())], reply.body).into_response()
        }
        Err(err) => {
            metrics::record_request(&responder.name, err.status_code().as_u16(), started);
            err.into_response()
        }
    }
}

async fn not_found(request: Request<Body>) -> Response {
    GatewayError::DispatchNoMatch(request.uri().path().to_string()).into_response()
}
