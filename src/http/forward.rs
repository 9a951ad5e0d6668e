//! Worker exchange orchestration.
//!
//! # Responsibilities
//! - Turn a resolved responder into a worker command
//! - Acquire a worker, run one session, classify the outcome
//! - Retry unreachable workers on the next one in rotation
//! - Feed passive health and failure metrics
//!
//! # Design Decisions
//! - One fresh session per request; the guard caps sessions per worker
//! - The response body is buffered so a late failure still maps to a status
//! - The whole loop runs under the request deadline

use bytes::Bytes;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::http::server::{AppState, GatewayState};
use crate::load_balancer::WorkerGuard;
use crate::observability::metrics;
use crate::protocol::session::{SessionSettings, WorkerSession};
use crate::routing::ResponderNode;

/// A successful worker reply.
#[derive(Debug)]
pub struct WorkerReply {
    pub worker: String,
    pub body: Bytes,
}

/// Run `responder` for `resource_id` against the pool, under the request deadline.
pub async fn forward(
    state: &AppState,
    gateway: &Arc<GatewayState>,
    responder: &ResponderNode,
    resource_id: &str,
    request_id: &str,
) -> Result<WorkerReply, GatewayError> {
    let command = responder.worker_request(resource_id);
    tokio::time::timeout(
        gateway.request_timeout,
        attempt_all(state, gateway, responder, &command, request_id),
    )
    .await
    .map_err(|_| {
        tracing::warn!(request_id = %request_id, responder = %responder.name, "Request deadline elapsed");
        GatewayError::Timeout
    })?
}

async fn attempt_all(
    state: &AppState,
    gateway: &GatewayState,
    responder: &ResponderNode,
    command: &str,
    request_id: &str,
) -> Result<WorkerReply, GatewayError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let guard = state.pool.acquire().await?;
        let result = exchange(&guard, command, &gateway.session).await;
        record_health(gateway, &guard, &result);

        match result {
            Ok(body) => {
                tracing::debug!(
                    request_id = %request_id,
                    worker = %guard.name,
                    bytes = body.len(),
                    "Worker replied"
                );
                return Ok(WorkerReply {
                    worker: guard.name.clone(),
                    body: Bytes::from(body),
                });
            }
            Err(err) => {
                if let GatewayError::BackendSignaledError { .. } = err {
                    metrics::record_backend_error(&responder.name);
                }
                match gateway.retry.next_delay(attempt, &err) {
                    Some(delay) => {
                        tracing::info!(
                            request_id = %request_id,
                            worker = %guard.name,
                            attempt,
                            delay = ?delay,
                            error = %err,
                            "Retrying on next worker"
                        );
                        drop(guard);
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::warn!(
                            request_id = %request_id,
                            worker = %guard.name,
                            attempt,
                            error = %err,
                            "Worker exchange failed"
                        );
                        return Err(err);
                    }
                }
            }
        }
    }
}

/// One session: connect, handshake, send, read, close.
pub async fn exchange(
    guard: &WorkerGuard,
    command: &str,
    settings: &SessionSettings,
) -> Result<Vec<u8>, GatewayError> {
    let mut session = WorkerSession::connect(&guard.address, settings)
        .await
        .map_err(|source| GatewayError::WorkerUnreachable {
            worker: guard.name.clone(),
            source,
        })?;

    session.send_request(command).await?;

    let (mut data, mut errors) = (Vec::new(), Vec::new());
    let outcome = session.read_response(&mut data, &mut errors).await?;
    session.close().await;

    if outcome.backend_error {
        return Err(GatewayError::BackendSignaledError { body: errors });
    }
    Ok(data)
}

fn record_health(gateway: &GatewayState, guard: &WorkerGuard, result: &Result<Vec<u8>, GatewayError>) {
    let healthy_threshold = gateway.health.healthy_threshold;
    let unhealthy_threshold = gateway.health.unhealthy_threshold;
    match result {
        Err(err) if err.is_worker_fault() => {
            metrics::record_worker_failure(&guard.name, err.kind());
            if guard.mark_failure(unhealthy_threshold) {
                tracing::warn!(worker = %guard.name, error = %err, "Worker marked unhealthy");
                metrics::record_worker_health(&guard.name, false);
            }
        }
        _ => {
            if guard.mark_success(healthy_threshold) {
                tracing::info!(worker = %guard.name, "Worker marked healthy");
                metrics::record_worker_health(&guard.name, true);
            }
        }
    }
}
