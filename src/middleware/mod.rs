//! Built-in middleware.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: structured tracing, request-id injection, and
//! authentication-header inspection. Register built-ins like any other
//! pipe:
//!
//! ```rust,no_run
//! use melanth::{Pipe, Router, middleware::Trace};
//!
//! let mut router = Router::new();
//! router.middleware(Pipe::new(Trace));
//! ```

use tracing::{error, info};

use crate::pipeline::{Middleware, MiddlewareFuture, Next};
use crate::request::Request;

/// Per-request logging: method, path, status, and latency on success;
/// method, path, and the error on failure.
pub struct Trace;

impl Middleware for Trace {
    fn handle(&self, request: Request, next: Next, _args: Vec<String>) -> MiddlewareFuture {
        let method = request.method().clone();
        let path = request.path().to_owned();

        Box::pin(async move {
            let started = std::time::Instant::now();
            let result = next.run(request).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match &result {
                Ok(response) => info!(
                    %method,
                    path,
                    status = response.status_code().as_u16(),
                    elapsed_ms,
                    "request handled"
                ),
                Err(e) => error!(%method, path, elapsed_ms, "request failed: {e}"),
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::pipeline::{Pipe, Pipeline};
    use crate::response::Response;
    use http::Method;
    use std::sync::Arc;

    #[tokio::test]
    async fn trace_passes_the_response_through_unchanged() {
        let response = Pipeline::new(Arc::new(Container::new()))
            .via(Request::new(Method::GET, "/traced"))
            .through(vec![Pipe::new(Trace)])
            .then(|_req| async { Ok(Response::text("traced")) })
            .await
            .unwrap();

        assert_eq!(response.body(), b"traced");
    }
}
