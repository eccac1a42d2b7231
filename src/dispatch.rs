//! Route dispatch: invoking a matched route's action.
//!
//! Plain handler actions are invoked directly. Controller actions resolve
//! the controller out of the container and call the named method through
//! the [`Controller`] trait — the explicit replacement for reflected method
//! dispatch. Argument resolution (route values, container dependencies,
//! defaults) goes through [`ActionContext`] instead of inspecting a
//! callable's signature at run time.

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use crate::container::{Construct, Container, Overrides, Value};
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::route::{Route, RouteAction};

/// The boxed future a controller method returns.
pub type ActionFuture = Pin<Box<dyn Future<Output = Result<Response, Error>> + Send + 'static>>;

/// A container-resolved action target addressed as `"class@method"`.
///
/// `call` routes the method name to the concrete handler; unknown names
/// must fail with [`Error::InvalidAction`], keeping malformed route
/// definitions a dispatch-time failure:
///
/// ```rust,ignore
/// impl Controller for UserController {
///     fn call(self: Arc<Self>, method: &str, ctx: ActionContext) -> ActionFuture {
///         match method {
///             "show" => Box::pin(async move { self.show(ctx).await }),
///             other => {
///                 let other = other.to_owned();
///                 Box::pin(async move { Err(Error::InvalidAction(other)) })
///             }
///         }
///     }
/// }
/// ```
pub trait Controller: Send + Sync + 'static {
    fn call(self: Arc<Self>, method: &str, context: ActionContext) -> ActionFuture;
}

/// Registers a controller type under a string key so `"key@method"` route
/// actions can resolve it.
pub fn register_controller<C: Controller + Construct>(
    container: &Container,
    key: impl Into<String>,
) {
    container.bind_factory(key, |container, overrides| {
        let controller = C::construct(container, overrides)?;
        Ok(Arc::new(Arc::new(controller) as Arc<dyn Controller>) as Value)
    });
}

/// Everything a controller method needs to build its argument list: route
/// parameter values, typed container dependencies, and defaults.
pub struct ActionContext {
    request: Request,
    container: Arc<Container>,
}

impl ActionContext {
    pub fn new(request: Request, container: Arc<Container>) -> Self {
        Self { request, container }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn into_request(self) -> Request {
        self.request
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// A bound route parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.request.param(name)
    }

    /// A typed route parameter; fails with
    /// [`Error::UnresolvedParameter`] when absent or unparsable.
    pub fn value<T: FromStr>(&self, name: &str) -> Result<T, Error> {
        self.param(name)
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| Error::UnresolvedParameter(name.to_owned()))
    }

    /// A typed route parameter, falling back to a default when missing.
    pub fn value_or<T: FromStr>(&self, name: &str, default: T) -> T {
        self.param(name).and_then(|raw| raw.parse().ok()).unwrap_or(default)
    }

    /// A container-resolved dependency.
    pub fn argument<T: Construct>(&self) -> Result<Arc<T>, Error> {
        self.container.make::<T>()
    }

    /// A container-resolved dependency with explicit overrides.
    pub fn argument_with<T: Construct>(&self, overrides: &Overrides) -> Result<Arc<T>, Error> {
        self.container.make_with::<T>(overrides)
    }
}

/// Invokes a matched route's action.
pub struct RouteDispatcher {
    container: Arc<Container>,
}

impl RouteDispatcher {
    pub fn new(container: Arc<Container>) -> Self {
        Self { container }
    }

    /// Runs the route's action against the request.
    ///
    /// Container instantiation failures propagate uncaught to the caller;
    /// the application's error handler maps them at the boundary.
    pub async fn dispatch(&self, route: Arc<Route>, request: Request) -> Result<Response, Error> {
        match route.action() {
            RouteAction::Missing => Err(Error::MissingAction),
            RouteAction::Handler(handler) => Ok(handler.call(request).await),
            RouteAction::Controller { class, method } => {
                let controller = self
                    .container
                    .make_key(class)?
                    .downcast::<Arc<dyn Controller>>()
                    .map_err(|_| Error::Instantiation(class.clone()))?;
                let context = ActionContext::new(request, Arc::clone(&self.container));
                (*controller).clone().call(method, context).await
            }
        }
    }
}
