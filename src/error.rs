//! Gateway-level errors and their HTTP mapping.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::load_balancer::PoolError;
use crate::protocol::ProtocolError;
use crate::routing::DispatchError;

/// Why a request could not be served with a 200.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Corrupt or incomplete framing from the worker.
    #[error("protocol framing error: {0}")]
    ProtocolFraming(#[source] ProtocolError),

    #[error("worker sent a chunk of {requested} bytes, limit is {max}")]
    BufferCapacityExceeded { requested: usize, max: usize },

    /// The worker reported `status=error`; the body is its error output.
    #[error("worker reported an error")]
    BackendSignaledError { body: Vec<u8> },

    #[error("worker requested an emergency exit")]
    BackendEmergencyExit,

    #[error("no worker available: {0}")]
    PoolUnavailable(#[from] PoolError),

    #[error("no responder for '{0}'")]
    DispatchNoMatch(String),

    #[error("not acceptable: {0}")]
    NotAcceptable(String),

    /// The path maps to a responder but its resource id is unusable.
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    /// Connect or handshake failed; safe to try another worker.
    #[error("worker '{worker}' unreachable: {source}")]
    WorkerUnreachable {
        worker: String,
        #[source]
        source: ProtocolError,
    },

    #[error("worker exchange timed out")]
    Timeout,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::ProtocolFraming(_)
            | GatewayError::BufferCapacityExceeded { .. }
            | GatewayError::BackendEmergencyExit
            | GatewayError::WorkerUnreachable { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::BackendSignaledError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::PoolUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::DispatchNoMatch(_) => StatusCode::NOT_FOUND,
            GatewayError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            GatewayError::InvalidResource(_) => StatusCode::BAD_REQUEST,
            GatewayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::ProtocolFraming(_) => "framing",
            GatewayError::BufferCapacityExceeded { .. } => "capacity",
            GatewayError::BackendSignaledError { .. } => "backend_error",
            GatewayError::BackendEmergencyExit => "emergency_exit",
            GatewayError::PoolUnavailable(_) => "pool_unavailable",
            GatewayError::DispatchNoMatch(_) => "no_match",
            GatewayError::NotAcceptable(_) => "not_acceptable",
            GatewayError::InvalidResource(_) => "invalid_resource",
            GatewayError::WorkerUnreachable { .. } => "unreachable",
            GatewayError::Timeout => "timeout",
        }
    }

    /// True when the failure says something about the worker's health.
    pub fn is_worker_fault(&self) -> bool {
        matches!(
            self,
            GatewayError::ProtocolFraming(_)
                | GatewayError::BackendEmergencyExit
                | GatewayError::WorkerUnreachable { .. }
                | GatewayError::Timeout
        )
    }
}

/// Classify an error raised during an established exchange.
impl From<ProtocolError> for GatewayError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::BufferCapacityExceeded { requested, max } => {
                GatewayError::BufferCapacityExceeded { requested, max }
            }
            ProtocolError::EmergencyExit => GatewayError::BackendEmergencyExit,
            ProtocolError::TimedOut => GatewayError::Timeout,
            other => GatewayError::ProtocolFraming(other),
        }
    }
}

impl From<DispatchError> for GatewayError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NoMatch(path) => GatewayError::DispatchNoMatch(path),
            not_acceptable @ DispatchError::NotAcceptable { .. } => {
                GatewayError::NotAcceptable(not_acceptable.to_string())
            }
            DispatchError::InvalidResource(id) => GatewayError::InvalidResource(id),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            GatewayError::BackendSignaledError { body } => (
                status,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                body,
            )
                .into_response(),
            other => (status, other.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::RingError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (GatewayError::from(ProtocolError::UnexpectedEof), StatusCode::BAD_GATEWAY),
            (
                GatewayError::from(ProtocolError::BufferCapacityExceeded { requested: 9, max: 8 }),
                StatusCode::BAD_GATEWAY,
            ),
            (GatewayError::from(ProtocolError::EmergencyExit), StatusCode::BAD_GATEWAY),
            (GatewayError::from(ProtocolError::TimedOut), StatusCode::GATEWAY_TIMEOUT),
            (
                GatewayError::BackendSignaledError { body: b"boom".to_vec() },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                GatewayError::from(PoolError::Ring(RingError::Unavailable)),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                GatewayError::from(DispatchError::NoMatch("/x".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                GatewayError::from(DispatchError::NotAcceptable {
                    responder: "dmr".into(),
                    accept: "image/png".into(),
                }),
                StatusCode::NOT_ACCEPTABLE,
            ),
            (
                GatewayError::from(DispatchError::InvalidResource("a;b".into())),
                StatusCode::BAD_REQUEST,
            ),
            (GatewayError::Timeout, StatusCode::GATEWAY_TIMEOUT),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{err}");
        }
    }

    #[test]
    fn test_emergency_exit_is_not_framing() {
        assert!(matches!(
            GatewayError::from(ProtocolError::EmergencyExit),
            GatewayError::BackendEmergencyExit
        ));
        assert!(matches!(
            GatewayError::from(ProtocolError::MalformedHeader("zz".into())),
            GatewayError::ProtocolFraming(_)
        ));
    }

    #[tokio::test]
    async fn test_backend_error_body_is_passed_through() {
        let response = GatewayError::BackendSignaledError { body: b"boom".to_vec() }.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"boom");
    }
}
