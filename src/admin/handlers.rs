use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::load_balancer::HealthState;
use crate::routing::ResponderNode;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub workers: usize,
    pub healthy_workers: usize,
    pub responders: usize,
}

#[derive(Debug, Serialize)]
pub struct WorkerStatus {
    pub name: String,
    pub address: String,
    pub health: HealthState,
    pub healthy: bool,
    pub active_connections: usize,
    pub max_connections: usize,
    pub total_requests: u64,
    pub total_failures: u64,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let workers = state.pool.workers();
    let healthy_workers = workers.iter().filter(|w| w.is_healthy()).count();
    let status = if healthy_workers == 0 { "degraded" } else { "operational" };

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status,
        uptime_secs: state.started.elapsed().as_secs(),
        workers: workers.len(),
        healthy_workers,
        responders: state.inner.load().dispatcher.len(),
    })
}

pub async fn get_workers(State(state): State<AppState>) -> Json<Vec<WorkerStatus>> {
    let statuses = state
        .pool
        .workers()
        .iter()
        .map(|w| WorkerStatus {
            name: w.name.clone(),
            address: w.address.clone(),
            health: w.health(),
            healthy: w.is_healthy(),
            active_connections: w.active_sessions(),
            max_connections: w.max_connections,
            total_requests: w.total_requests(),
            total_failures: w.total_failures(),
        })
        .collect();
    Json(statuses)
}

pub async fn get_responders(State(state): State<AppState>) -> Json<Vec<ResponderNode>> {
    let inner = state.inner.load();
    Json(inner.dispatcher.responders().cloned().collect())
}
