//! Recovery middleware: request timeouts, handler panics and tower service errors become JSON
//! error responses instead of dropped connections.

use std::any::Any;
use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::response::{IntoResponse, Response};
use tower::timeout::TimeoutLayer;
use tower::timeout::error::Elapsed;
use tower::{BoxError, ServiceBuilder};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

use crate::errors::Error;

pub trait RouterRecoveryExt<S> {
    /// Wrap every route so a request running longer than `request_timeout` answers 503, and a
    /// panicking handler answers 500.
    fn with_recovery(self, request_timeout: Duration) -> Self;
}

impl<S> RouterRecoveryExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_recovery(self, request_timeout: Duration) -> Self {
        let middlewares = ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_middleware_error))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(TimeoutLayer::new(request_timeout));

        self.layer(middlewares)
    }
}

async fn handle_middleware_error(err: BoxError) -> Response {
    if err.is::<Elapsed>() {
        error!(error = %err, "Request timeout exceeded");
        Error::Timeout {
            operation: "Request".to_string(),
        }
        .into_response()
    } else {
        error!(error = %err, "Unhandled middleware error");
        Error::internal("request").into_response()
    }
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");

    error!(panic = detail, "Handler panicked");
    Error::internal("request").into_response()
}
