//! Application bootstrap and the request-handling boundary.
//!
//! The [`Application`] owns the base container and the router. Bootstrap
//! runs once before traffic: configuration loads from the base path's
//! `config/` directory, then every registered [`ServiceProvider`] boots in
//! registration order. While serving, the base container stays read-only;
//! each request gets its own container scope.
//!
//! All dispatch failures converge here: the [`ErrorHandler`] maps an
//! [`Error`] to a status-coded response — 404 for an unmatched route,
//! 500 for everything else — with diagnostic detail only in debug mode.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::container::Container;
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// A unit of framework or application setup.
///
/// `register` runs immediately when the provider is added and should only
/// put bindings into the container. `boot` runs during
/// [`Application::boot`], after configuration is loaded, and may touch any
/// other service.
pub trait ServiceProvider: Send + Sync + 'static {
    fn register(&self, app: &mut Application) {
        let _ = app;
    }

    fn boot(&self, app: &mut Application) {
        let _ = app;
    }
}

/// The application: container, router, configuration, providers.
pub struct Application {
    container: Arc<Container>,
    router: Router,
    config: Config,
    base_path: Option<PathBuf>,
    providers: Vec<(&'static str, Arc<dyn ServiceProvider>)>,
    booted: bool,
    error_handler: ErrorHandler,
}

impl Application {
    pub fn new() -> Self {
        Self {
            container: Arc::new(Container::new()),
            router: Router::new(),
            config: Config::new(),
            base_path: None,
            providers: Vec::new(),
            booted: false,
            error_handler: ErrorHandler::new(false),
        }
    }

    /// Sets the base path configuration is loaded relative to.
    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Registers route definitions against the router.
    pub fn routes<F: FnOnce(&mut Router)>(&mut self, define: F) -> &mut Self {
        define(&mut self.router);
        self
    }

    pub fn config_path(&self) -> Option<PathBuf> {
        self.base_path.as_ref().map(|base| base.join("config"))
    }

    /// Adds a service provider and runs its `register` step.
    ///
    /// Re-registering a provider type has no effect.
    pub fn register<P: ServiceProvider>(&mut self, provider: P) -> &mut Self {
        let name = std::any::type_name::<P>();
        if self.providers.iter().any(|(existing, _)| *existing == name) {
            return self;
        }

        let provider = Arc::new(provider);
        provider.register(self);
        self.providers.push((name, provider));
        self
    }

    /// Bootstraps the application: loads configuration, boots every
    /// provider in registration order. Idempotent.
    pub fn boot(&mut self) -> Result<(), Error> {
        if self.booted {
            return Ok(());
        }

        self.load_configuration()?;
        self.error_handler = ErrorHandler::new(self.config.get_bool("app.debug", false));

        let providers: Vec<_> =
            self.providers.iter().map(|(_, provider)| Arc::clone(provider)).collect();
        for provider in providers {
            provider.boot(self);
        }

        self.booted = true;
        Ok(())
    }

    pub fn is_booted(&self) -> bool {
        self.booted
    }

    fn load_configuration(&mut self) -> Result<(), Error> {
        if let Some(dir) = self.config_path() {
            if dir.is_dir() {
                self.config = Config::load_dir(dir)?;
            }
        }
        self.container.instance("config", self.config.clone());
        Ok(())
    }

    /// Handles one request: a fresh container scope, router dispatch, and
    /// error rendering at the boundary. Call [`Application::boot`] first;
    /// [`Server::serve`](crate::Server::serve) does so automatically.
    pub async fn handle(&self, request: Request) -> Response {
        let scope = Arc::new(Arc::clone(&self.container).scope());

        match self.router.dispatch(request, scope).await {
            Ok(response) => response,
            Err(error) => self.error_handler.render(&error),
        }
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps dispatch errors to status-coded responses at the HTTP boundary.
pub struct ErrorHandler {
    debug: bool,
}

impl ErrorHandler {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    pub fn render(&self, error: &Error) -> Response {
        let status = error.status();
        tracing::error!(kind = error.kind(), status = status.as_u16(), "dispatch failed: {error}");

        if self.debug {
            let detail = serde_json::json!({
                "error": error.kind(),
                "message": error.to_string(),
            });
            Response::builder()
                .status(status)
                .json(serde_json::to_vec(&detail).unwrap_or_default())
        } else {
            Response::builder()
                .status(status)
                .text(status.canonical_reason().unwrap_or("error"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingProvider {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ServiceProvider for RecordingProvider {
        fn register(&self, _app: &mut Application) {
            self.log.lock().unwrap().push(format!("{}:register", self.name));
        }

        fn boot(&self, _app: &mut Application) {
            self.log.lock().unwrap().push(format!("{}:boot", self.name));
        }
    }

    #[test]
    fn providers_register_eagerly_and_boot_in_order() {
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let mut app = Application::new();
        app.register(RecordingProvider { name: "a", log: Arc::clone(&log) });

        assert_eq!(*log.lock().unwrap(), vec!["a:register"]);

        app.boot().unwrap();
        app.boot().unwrap(); // idempotent

        assert_eq!(*log.lock().unwrap(), vec!["a:register", "a:boot"]);
        assert!(app.is_booted());
    }

    struct CountingProvider(Arc<AtomicUsize>);

    impl ServiceProvider for CountingProvider {
        fn register(&self, _app: &mut Application) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn re_registering_a_provider_type_is_a_no_op() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut app = Application::new();
        app.register(CountingProvider(Arc::clone(&count)));
        app.register(CountingProvider(Arc::clone(&count)));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unmatched_requests_render_as_404() {
        let mut app = Application::new();
        app.boot().unwrap();

        let response = app.handle(Request::new(Method::GET, "/nowhere")).await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn debug_mode_includes_diagnostic_detail() {
        let mut app = Application::new();
        app.config_mut().set("app.debug", true);
        app.error_handler = ErrorHandler::new(true);

        let response = app.handle(Request::new(Method::GET, "/nowhere")).await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

        let detail: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(detail["error"], "route_not_found");
    }

    #[tokio::test]
    async fn handlers_run_through_the_application_boundary() {
        async fn hello(_req: Request) -> Response {
            Response::text("hello")
        }

        let mut app = Application::new();
        app.routes(|router| {
            router.get("/hello", hello);
        });
        app.boot().unwrap();

        let response = app.handle(Request::new(Method::GET, "/hello")).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.body(), b"hello");
    }
}
