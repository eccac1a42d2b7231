//! Route definition and matching.
//!
//! A [`Route`] is immutable once registered. Its `{name}` placeholders are
//! compiled into two anchored regexes at construction: a plain one used for
//! matching and a named-capture one used for parameter extraction.
//! [`Route::bind`] returns a fresh per-request parameter map — the shared
//! definition is never mutated during dispatch.

use std::collections::HashMap;
use std::sync::LazyLock;

use http::Method;
use regex::Regex;

use crate::handler::{BoxedHandler, Handler};
use crate::pipeline::Pipe;
use crate::request::Request;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("placeholder pattern is valid"));

/// What a route runs when it matches.
///
/// Missing and malformed actions surface lazily: registering them succeeds,
/// dispatching them fails.
pub enum RouteAction {
    /// Registered without an action; dispatch fails with
    /// [`Error::MissingAction`](crate::Error::MissingAction).
    Missing,
    /// A directly invocable async handler.
    Handler(BoxedHandler),
    /// A container-resolved controller and the method to call on it.
    Controller { class: String, method: String },
}

impl RouteAction {
    pub fn handler(handler: impl Handler) -> Self {
        Self::Handler(handler.into_boxed_handler())
    }

    /// Parses a `"Class@method"` reference. A reference without `@` targets
    /// the conventional `invoke` method.
    pub fn controller(reference: impl AsRef<str>) -> Self {
        let reference = reference.as_ref();
        let (class, method) = match reference.split_once('@') {
            Some((class, method)) => (class, method),
            None => (reference, "invoke"),
        };
        Self::Controller { class: class.to_owned(), method: method.to_owned() }
    }

    pub fn none() -> Self {
        Self::Missing
    }

    pub(crate) fn prepend_namespace(&mut self, namespace: &str) {
        if let Self::Controller { class, .. } = self {
            *class = format!("{namespace}::{class}");
        }
    }
}

/// A registered mapping from HTTP methods and a URI pattern to an action.
pub struct Route {
    methods: Vec<Method>,
    uri: String,
    action: RouteAction,
    domain: Option<String>,
    middleware: Vec<Pipe>,
    defaults: HashMap<String, String>,
    matcher: Regex,
    binder: Regex,
    parameter_names: Vec<String>,
}

impl Route {
    /// Builds a route.
    ///
    /// # Panics
    ///
    /// Panics when the URI pattern does not compile — registering an
    /// invalid route is a programmer error caught at startup.
    pub fn new(methods: Vec<Method>, uri: &str, action: RouteAction) -> Self {
        let uri = if uri.is_empty() { "/".to_owned() } else { uri.to_owned() };
        let (matcher, binder, parameter_names) = Self::compile(&uri);

        Self {
            methods,
            uri,
            action,
            domain: None,
            middleware: Vec::new(),
            defaults: HashMap::new(),
            matcher,
            binder,
            parameter_names,
        }
    }

    fn compile(uri: &str) -> (Regex, Regex, Vec<String>) {
        let matcher = Self::regex(uri, false);
        let binder = Self::regex(uri, true);
        let names = PLACEHOLDER
            .captures_iter(uri)
            .map(|captures| captures[1].to_owned())
            .collect();
        (matcher, binder, names)
    }

    fn regex(uri: &str, named: bool) -> Regex {
        let replacement = if named { "(?P<$1>[^/]+)" } else { "[^/]+" };
        let pattern = format!("^{}$", PLACEHOLDER.replace_all(uri, replacement));
        Regex::new(&pattern).unwrap_or_else(|e| panic!("invalid route `{uri}`: {e}"))
    }

    /// Whether the request's decoded path and method both match.
    pub fn matches(&self, request: &Request) -> bool {
        self.matcher.is_match(&request.decoded_path()) && self.methods.contains(request.method())
    }

    /// Extracts path parameters into a per-request map.
    ///
    /// Named captures are intersected with the declared parameter names and
    /// empty-string matches are discarded. Manually supplied defaults win
    /// on key collision.
    pub fn bind(&self, request: &Request) -> HashMap<String, String> {
        let path = request.decoded_path();
        let mut params = self.defaults.clone();

        if let Some(captures) = self.binder.captures(&path) {
            for name in &self.parameter_names {
                if params.contains_key(name) {
                    continue;
                }
                if let Some(value) = captures.name(name) {
                    if !value.as_str().is_empty() {
                        params.insert(name.clone(), value.as_str().to_owned());
                    }
                }
            }
        }

        params
    }

    /// Supplies a parameter value ahead of binding; it takes precedence
    /// over the path capture of the same name.
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    pub(crate) fn set_domain(&mut self, domain: &str) {
        self.domain = Some(domain.to_owned());
    }

    pub(crate) fn set_uri(&mut self, uri: &str) {
        let uri = if uri.is_empty() { "/" } else { uri };
        let (matcher, binder, parameter_names) = Self::compile(uri);
        self.uri = uri.to_owned();
        self.matcher = matcher;
        self.binder = binder;
        self.parameter_names = parameter_names;
    }

    pub(crate) fn add_middleware(&mut self, pipes: impl IntoIterator<Item = Pipe>) {
        self.middleware.extend(pipes);
    }

    pub(crate) fn prepend_namespace(&mut self, namespace: &str) {
        self.action.prepend_namespace(namespace);
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn action(&self) -> &RouteAction {
        &self.action
    }

    pub fn middleware(&self) -> &[Pipe] {
        &self.middleware
    }

    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }
}
