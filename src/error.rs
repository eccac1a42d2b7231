//! Unified error type.
//!
//! Application-level outcomes (a 404 page, a validation message) are
//! expressed as [`Response`](crate::Response) values. This type carries the
//! framework's own failures: container resolution, route lookup, action
//! dispatch, configuration loading, and transport I/O. Nothing here is
//! retried or swallowed — every error propagates to the application's
//! error handler, which maps it to a status-coded response.

use http::StatusCode;

/// The error type returned by melanth's fallible operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Programmer error raised at registration time: a self-referential
    /// alias, an unreadable configuration directory, a malformed pipe spec.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The requested abstract key cannot be constructed: no binding, no
    /// `Construct` fallback, or a factory that produced the wrong type.
    #[error("unable to instantiate [{0}]")]
    Instantiation(String),

    /// A handler or controller argument has no route value, no binding,
    /// and no default.
    #[error("unresolved parameter `{0}`")]
    UnresolvedParameter(String),

    /// No registered route matches the request's method and path.
    #[error("no route matches the request")]
    RouteNotFound,

    /// The matched route was registered without an action. Raised lazily,
    /// only when the route is actually hit.
    #[error("route has no action")]
    MissingAction,

    /// The matched route's action is malformed: an unknown controller
    /// method, or a controller binding of the wrong shape.
    #[error("invalid route action `{0}`")]
    InvalidAction(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The HTTP status this error maps to at the application boundary.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RouteNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Instantiation(_) => "instantiation",
            Self::UnresolvedParameter(_) => "unresolved_parameter",
            Self::RouteNotFound => "route_not_found",
            Self::MissingAction => "missing_action",
            Self::InvalidAction(_) => "invalid_action",
            Self::Io(_) => "io",
        }
    }
}
