//! Which method(s) a route answers.
//!
//! Method names are case-sensitive per RFC 9110 §9.1. Registering a route
//! with a lowercase or mixed-case method is a programming error and panics,
//! the same way an invalid path does.

use std::fmt;

use http::Method;

/// Key under which [`Router::list_paths`](crate::Router::list_paths) reports ANY routes.
pub const ANY: &str = "*";

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) enum RouteMethod {
    /// Matches when no route is registered for the exact request method.
    Any,
    Exact(Method),
}

impl RouteMethod {
    /// # Panics
    ///
    /// Panics if `method` is not all uppercase.
    pub(crate) fn exact(method: Method) -> Self {
        let name = method.as_str();
        if name != name.to_ascii_uppercase() {
            panic!("the http method `{name}` must be in uppercase");
        }
        Self::Exact(method)
    }

    pub(crate) fn as_str(&self) -> &str {
        match self {
            Self::Any => ANY,
            Self::Exact(m) => m.as_str(),
        }
    }

    pub(crate) fn is_options(&self) -> bool {
        matches!(self, Self::Exact(m) if m == Method::OPTIONS)
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
