//! Request router.
//!
//! Routes are partitioned by HTTP method and kept in registration order
//! within each partition, keyed by `domain + uri`. Re-registering an
//! existing key replaces the route in place (last registration wins, the
//! original position is kept), and lookup picks the first route in
//! insertion order whose pattern matches — never specificity-based
//! ordering.
//!
//! Group attributes (prefix, namespace, domain, middleware) compose through
//! a stack: nested groups concatenate prefixes path-wise and append
//! middleware. The fluent registrator is an explicit builder, so
//! `router.prefix("admin").middleware(pipe).group(|r| …)` reads the same as
//! an attribute map.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;

use crate::container::Container;
use crate::dispatch::RouteDispatcher;
use crate::error::Error;
use crate::handler::Handler;
use crate::pipeline::{Pipe, Pipeline};
use crate::request::Request;
use crate::response::Response;
use crate::route::{Route, RouteAction};

/// Shared metadata applied to every route registered inside a group.
#[derive(Default, Clone)]
pub struct GroupAttributes {
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    pub domain: Option<String>,
    pub middleware: Vec<Pipe>,
}

impl GroupAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn middleware(mut self, pipe: Pipe) -> Self {
        self.middleware.push(pipe);
        self
    }
}

/// The application router.
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, Vec<(String, Arc<Route>)>>,
    group_stack: Vec<GroupAttributes>,
    middleware: Vec<Pipe>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration sugar ───────────────────────────────────────────────────

    pub fn get(&mut self, uri: &str, handler: impl Handler) -> &mut Self {
        self.add_route(vec![Method::GET], uri, RouteAction::handler(handler))
    }

    pub fn post(&mut self, uri: &str, handler: impl Handler) -> &mut Self {
        self.add_route(vec![Method::POST], uri, RouteAction::handler(handler))
    }

    pub fn put(&mut self, uri: &str, handler: impl Handler) -> &mut Self {
        self.add_route(vec![Method::PUT], uri, RouteAction::handler(handler))
    }

    pub fn patch(&mut self, uri: &str, handler: impl Handler) -> &mut Self {
        self.add_route(vec![Method::PATCH], uri, RouteAction::handler(handler))
    }

    pub fn delete(&mut self, uri: &str, handler: impl Handler) -> &mut Self {
        self.add_route(vec![Method::DELETE], uri, RouteAction::handler(handler))
    }

    pub fn head(&mut self, uri: &str, handler: impl Handler) -> &mut Self {
        self.add_route(vec![Method::HEAD], uri, RouteAction::handler(handler))
    }

    pub fn options(&mut self, uri: &str, handler: impl Handler) -> &mut Self {
        self.add_route(vec![Method::OPTIONS], uri, RouteAction::handler(handler))
    }

    /// Registers one action under several methods.
    pub fn any(&mut self, methods: &[Method], uri: &str, action: RouteAction) -> &mut Self {
        self.add_route(methods.to_vec(), uri, action)
    }

    /// Registers an arbitrary action (controller reference, missing action)
    /// under a single method.
    pub fn action(&mut self, method: Method, uri: &str, action: RouteAction) -> &mut Self {
        self.add_route(vec![method], uri, action)
    }

    /// Registers a pre-built [`Route`], applying the active group
    /// attributes to it.
    pub fn add(&mut self, mut route: Route) -> &mut Self {
        if let Some(group) = self.group_stack.last().cloned() {
            if let Some(namespace) = &group.namespace {
                route.prepend_namespace(namespace);
            }
            let uri = join_paths(group.prefix.as_deref().unwrap_or(""), route.uri());
            route.set_uri(&uri);
            if route.domain().is_none() {
                if let Some(domain) = &group.domain {
                    route.set_domain(domain);
                }
            }
            route.add_middleware(group.middleware.iter().cloned());
        } else {
            let uri = join_paths("", route.uri());
            route.set_uri(&uri);
        }
        self.insert(route);
        self
    }

    fn add_route(&mut self, methods: Vec<Method>, uri: &str, action: RouteAction) -> &mut Self {
        self.add(Route::new(methods, uri, action))
    }

    fn insert(&mut self, route: Route) {
        let key = format!("{}{}", route.domain().unwrap_or(""), route.uri());
        let route = Arc::new(route);

        for method in route.methods().to_vec() {
            let bucket = self.routes.entry(method).or_default();
            match bucket.iter_mut().find(|(existing, _)| *existing == key) {
                // Last registration wins; the original position is kept.
                Some(entry) => entry.1 = Arc::clone(&route),
                None => bucket.push((key.clone(), Arc::clone(&route))),
            }
        }
    }

    // ── Groups ───────────────────────────────────────────────────────────────

    /// Evaluates `routes` with `attributes` active, composed onto whatever
    /// group is already open.
    pub fn group<F: FnOnce(&mut Router)>(&mut self, attributes: GroupAttributes, routes: F) {
        let merged = self.compose(attributes);
        self.group_stack.push(merged);
        routes(self);
        self.group_stack.pop();
    }

    fn compose(&self, attributes: GroupAttributes) -> GroupAttributes {
        let Some(parent) = self.group_stack.last() else { return attributes };

        let prefix = match (&parent.prefix, &attributes.prefix) {
            (Some(outer), Some(inner)) => {
                Some(format!("{}/{}", outer.trim_matches('/'), inner.trim_matches('/')))
            }
            (Some(outer), None) => Some(outer.clone()),
            (None, inner) => inner.clone(),
        };
        let namespace = match (&parent.namespace, &attributes.namespace) {
            (Some(outer), Some(inner)) => Some(format!("{outer}::{inner}")),
            (Some(outer), None) => Some(outer.clone()),
            (None, inner) => inner.clone(),
        };
        let mut middleware = parent.middleware.clone();
        middleware.extend(attributes.middleware);

        GroupAttributes {
            prefix,
            namespace,
            domain: attributes.domain.or_else(|| parent.domain.clone()),
            middleware,
        }
    }

    /// Starts a fluent group builder with a path prefix.
    pub fn prefix(&mut self, prefix: impl Into<String>) -> RouteRegistrator<'_> {
        RouteRegistrator::new(self).prefix(prefix)
    }

    /// Starts a fluent group builder with a controller namespace.
    pub fn namespace(&mut self, namespace: impl Into<String>) -> RouteRegistrator<'_> {
        RouteRegistrator::new(self).namespace(namespace)
    }

    /// Starts a fluent group builder with a domain.
    pub fn domain(&mut self, domain: impl Into<String>) -> RouteRegistrator<'_> {
        RouteRegistrator::new(self).domain(domain)
    }

    /// Appends a global middleware, run before every route's own pipes.
    pub fn middleware(&mut self, pipe: Pipe) -> &mut Self {
        self.middleware.push(pipe);
        self
    }

    // ── Lookup and dispatch ──────────────────────────────────────────────────

    /// Finds the matching route: partition by method, then first match in
    /// registration order.
    pub fn find(&self, request: &Request) -> Result<Arc<Route>, Error> {
        self.routes
            .get(request.method())
            .into_iter()
            .flatten()
            .map(|(_, route)| route)
            .find(|route| route.matches(request))
            .cloned()
            .ok_or(Error::RouteNotFound)
    }

    /// Dispatches a request: find, bind parameters into the request, then
    /// run the global and route middleware around the route dispatcher.
    ///
    /// The container is the per-request scope, passed explicitly.
    pub async fn dispatch(
        &self,
        mut request: Request,
        container: Arc<Container>,
    ) -> Result<Response, Error> {
        let route = self.find(&request)?;
        request.set_params(route.bind(&request));

        let mut pipes = self.middleware.clone();
        pipes.extend(route.middleware().iter().cloned());

        let dispatcher = RouteDispatcher::new(Arc::clone(&container));
        let matched = Arc::clone(&route);

        Pipeline::new(container)
            .via(request)
            .through(pipes)
            .then(move |req| async move { dispatcher.dispatch(matched, req).await })
            .await
    }
}

/// Explicit builder behind the router's fluent group methods.
pub struct RouteRegistrator<'r> {
    router: &'r mut Router,
    attributes: GroupAttributes,
}

impl<'r> RouteRegistrator<'r> {
    fn new(router: &'r mut Router) -> Self {
        Self { router, attributes: GroupAttributes::new() }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.attributes.prefix = Some(prefix.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.attributes.namespace = Some(namespace.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.attributes.domain = Some(domain.into());
        self
    }

    pub fn middleware(mut self, pipe: Pipe) -> Self {
        self.attributes.middleware.push(pipe);
        self
    }

    /// Closes the builder: evaluates `routes` under the accumulated
    /// attributes.
    pub fn group<F: FnOnce(&mut Router)>(self, routes: F) {
        self.router.group(self.attributes, routes);
    }
}

/// Joins a prefix and a URI into a normalized absolute path.
fn join_paths(prefix: &str, uri: &str) -> String {
    let joined = format!("{}/{}", prefix.trim_matches('/'), uri.trim_matches('/'));
    format!("/{}", joined.trim_matches('/'))
}
