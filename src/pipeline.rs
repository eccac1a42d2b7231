//! Middleware pipeline.
//!
//! Sends a request through an ordered list of handlers, each able to
//! inspect or transform it, short-circuit by not calling `next`, or
//! post-process the response on the way back out — the classic onion
//! model. The chain is built by right-folding the pipe list around a
//! terminal handler, so pipe *i*'s `next` continues at pipe *i + 1* and the
//! last pipe's `next` is the terminal.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::container::Container;
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

/// The boxed future every middleware returns.
pub type MiddlewareFuture = Pin<Box<dyn Future<Output = Result<Response, Error>> + Send + 'static>>;

/// An ordered stage in the pipeline.
///
/// Implemented automatically for any `Fn(Request, Next) -> Future` closure;
/// named middleware types implement it directly. `args` carries the
/// `:`-delimited extra parameters of a [`Pipe::service`] spec and is empty
/// for every other pipe shape.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, request: Request, next: Next, args: Vec<String>) -> MiddlewareFuture;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, Error>> + Send + 'static,
{
    fn handle(&self, request: Request, next: Next, _args: Vec<String>) -> MiddlewareFuture {
        Box::pin(self(request, next))
    }
}

type NextFn = Box<dyn FnOnce(Request) -> MiddlewareFuture + Send>;

/// The continuation into the rest of the pipeline.
pub struct Next(NextFn);

impl Next {
    /// Proceeds to the next stage. Not calling this short-circuits the
    /// pipeline with whatever the current middleware returns.
    pub fn run(self, request: Request) -> MiddlewareFuture {
        (self.0)(request)
    }
}

/// One entry of a `through` list.
#[derive(Clone)]
pub enum Pipe {
    /// An already-constructed middleware.
    Handler(Arc<dyn Middleware>),
    /// A container key, optionally with `:`-delimited, `,`-split extra
    /// arguments (`"throttle:60,burst"`), resolved at dispatch time.
    Service(String),
}

impl Pipe {
    pub fn new(middleware: impl Middleware) -> Self {
        Self::Handler(Arc::new(middleware))
    }

    pub fn service(spec: impl Into<String>) -> Self {
        Self::Service(spec.into())
    }

    fn prepare(&self, container: &Container) -> Result<(Arc<dyn Middleware>, Vec<String>), Error> {
        match self {
            Self::Handler(middleware) => Ok((Arc::clone(middleware), Vec::new())),
            Self::Service(spec) => {
                let (key, args) = match spec.split_once(':') {
                    Some((key, rest)) => (key, rest.split(',').map(str::to_owned).collect()),
                    None => (spec.as_str(), Vec::new()),
                };
                let middleware = container
                    .make_key(key)?
                    .downcast::<Arc<dyn Middleware>>()
                    .map_err(|_| Error::Instantiation(key.to_owned()))?;
                Ok(((*middleware).clone(), args))
            }
        }
    }
}

/// Registers a middleware in the container under a string key, making it
/// addressable from [`Pipe::service`] specs.
pub fn register_middleware(
    container: &Container,
    key: impl Into<String>,
    middleware: impl Middleware,
) {
    container.instance(key, Arc::new(middleware) as Arc<dyn Middleware>);
}

/// The pipeline executor.
///
/// `then` consumes the pipeline; it carries no state across invocations, so
/// a new dispatch builds a new pipeline.
pub struct Pipeline {
    container: Arc<Container>,
    passable: Option<Request>,
    pipes: Vec<Pipe>,
}

impl Pipeline {
    pub fn new(container: Arc<Container>) -> Self {
        Self { container, passable: None, pipes: Vec::new() }
    }

    /// Sets the request threaded through the pipeline.
    pub fn via(mut self, request: Request) -> Self {
        self.passable = Some(request);
        self
    }

    /// Sets the ordered middleware list.
    pub fn through(mut self, pipes: Vec<Pipe>) -> Self {
        self.pipes = pipes;
        self
    }

    /// Folds the pipes around the terminal handler and runs the chain.
    pub async fn then<F, Fut>(self, destination: F) -> Result<Response, Error>
    where
        F: FnOnce(Request) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Response, Error>> + Send + 'static,
    {
        let Pipeline { container, passable, pipes } = self;
        let request = passable
            .ok_or_else(|| Error::Configuration("pipeline has no payload".to_owned()))?;

        let mut chain: NextFn = Box::new(move |req| Box::pin(destination(req)));

        for pipe in pipes.into_iter().rev() {
            let container = Arc::clone(&container);
            let tail = chain;
            chain = Box::new(move |req| {
                Box::pin(async move {
                    let (middleware, args) = pipe.prepare(&container)?;
                    middleware.handle(req, Next(tail), args).await
                })
            });
        }

        chain(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording_pipe(log: &Log, name: &'static str) -> Pipe {
        let log = Arc::clone(log);
        Pipe::new(move |req: Request, next: Next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{name}:before"));
                let response = next.run(req).await;
                log.lock().unwrap().push(format!("{name}:after"));
                response
            }
        })
    }

    #[tokio::test]
    async fn pipes_wrap_the_terminal_in_order() {
        let container = Arc::new(Container::new());
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let terminal_log = Arc::clone(&log);

        let response = Pipeline::new(container)
            .via(Request::new(Method::GET, "/"))
            .through(vec![recording_pipe(&log, "a"), recording_pipe(&log, "b")])
            .then(move |_req| async move {
                terminal_log.lock().unwrap().push("terminal".to_owned());
                Ok(Response::text("done"))
            })
            .await
            .unwrap();

        assert_eq!(response.body(), b"done");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:before", "b:before", "terminal", "b:after", "a:after"]
        );
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let container = Arc::new(Container::new());
        let gate = Pipe::new(|_req: Request, _next: Next| async {
            Ok(Response::status(http::StatusCode::FORBIDDEN))
        });

        let response = Pipeline::new(container)
            .via(Request::new(Method::GET, "/"))
            .through(vec![gate])
            .then(|_req| async { Ok(Response::text("unreachable")) })
            .await
            .unwrap();

        assert_eq!(response.status_code(), http::StatusCode::FORBIDDEN);
    }

    struct RoleGate;

    impl Middleware for RoleGate {
        fn handle(&self, request: Request, next: Next, args: Vec<String>) -> MiddlewareFuture {
            Box::pin(async move {
                if args.first().map(String::as_str) == Some("admin") {
                    next.run(request).await
                } else {
                    Ok(Response::status(http::StatusCode::UNAUTHORIZED))
                }
            })
        }
    }

    #[tokio::test]
    async fn service_pipes_resolve_through_the_container_with_args() {
        let container = Arc::new(Container::new());
        register_middleware(&container, "role", RoleGate);

        let allowed = Pipeline::new(Arc::clone(&container))
            .via(Request::new(Method::GET, "/"))
            .through(vec![Pipe::service("role:admin")])
            .then(|_req| async { Ok(Response::text("in")) })
            .await
            .unwrap();
        assert_eq!(allowed.body(), b"in");

        let denied = Pipeline::new(container)
            .via(Request::new(Method::GET, "/"))
            .through(vec![Pipe::service("role:guest")])
            .then(|_req| async { Ok(Response::text("in")) })
            .await
            .unwrap();
        assert_eq!(denied.status_code(), http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_service_pipe_is_an_instantiation_error() {
        let container = Arc::new(Container::new());
        let err = Pipeline::new(container)
            .via(Request::new(Method::GET, "/"))
            .through(vec![Pipe::service("nope")])
            .then(|_req| async { Ok(Response::text("in")) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Instantiation(_)));
    }
}
