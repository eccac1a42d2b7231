//! # melanth
//!
//! A small async web framework: a dependency-injection container, a
//! pattern-matching router with middleware pipelines, and an HTTP server
//! built on `tokio` and `hyper`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use melanth::{Application, Request, Response, Server};
//!
//! async fn greet(req: Request) -> Response {
//!     let name = req.param("name").unwrap_or("stranger");
//!     Response::text(format!("Hello, {name}"))
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     tracing_subscriber::fmt::init();
//!
//!     let mut app = Application::new();
//!     app.routes(|router| {
//!         router.get("/greet/{name}", greet);
//!     });
//!
//!     Server::bind("0.0.0.0:3000")
//!         .serve(app)
//!         .await
//!         .expect("server error");
//! }
//! ```
//!
//! ## Pieces
//!
//! - [`Container`]: service bindings, aliases, shared instances, and
//!   extenders, with [`Construct`] for explicit dependency wiring.
//! - [`Router`]: HTTP-verb route registration, `{name}` path parameters,
//!   route groups with prefix, namespace, domain, and middleware.
//! - [`Pipeline`] / [`Middleware`]: onion-style request middleware,
//!   resolvable out of the container by string key.
//! - [`Controller`] / [`RouteDispatcher`]: `"class@method"` route actions
//!   resolved through the container.
//! - [`Application`]: configuration loading, service providers, and the
//!   error-rendering boundary.
//! - [`Server`]: the hyper connection loop with graceful shutdown.

mod app;
mod config;
mod container;
mod dispatch;
mod error;
mod handler;
mod pipeline;
mod request;
mod response;
mod route;
mod router;
mod server;

pub mod middleware;

pub use app::{Application, ErrorHandler, ServiceProvider};
pub use config::Config;
pub use container::{Construct, Container, Overrides, Value};
pub use dispatch::{ActionContext, ActionFuture, Controller, RouteDispatcher, register_controller};
pub use error::Error;
pub use handler::{BoxedHandler, ErasedHandler, Handler};
pub use pipeline::{Middleware, MiddlewareFuture, Next, Pipe, Pipeline, register_middleware};
pub use request::Request;
pub use response::{IntoResponse, Json, Response, ResponseBuilder};
pub use route::{Route, RouteAction};
pub use router::{GroupAttributes, RouteRegistrator, Router};
pub use server::Server;

pub use http::{Method, StatusCode};
