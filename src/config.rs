//! Server configuration.
//!
//! A [`Config`] can be built programmatically (`Config::default()` plus the
//! `with_*` setters) or loaded from TOML:
//!
//! ```toml
//! addr = "0.0.0.0:8000"
//! debug = true
//! handle_options = true
//! pool_capacity = 1024
//!
//! [logging]
//! format = "json"
//! level = "info"
//! ```
//!
//! The error view is code, not data, and is always set with
//! [`Config::with_error_view`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use http::StatusCode;
use serde::Deserialize;

use crate::context::RequestCtx;
use crate::error::{BoxError, Error};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `host:port` to listen on.
    pub addr: String,

    /// Logs every request before its chain runs.
    pub debug: bool,

    /// Registers an OPTIONS route with an `Allow` header for every path.
    pub handle_options: bool,

    /// Upper bound on idle request contexts kept for reuse.
    pub pool_capacity: usize,

    pub logging: LoggingConfig,

    #[serde(skip)]
    pub error_view: ErrorView,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8000".to_owned(),
            debug: false,
            handle_options: true,
            pool_capacity: 1024,
            logging: LoggingConfig::default(),
            error_view: ErrorView::default(),
        }
    }
}

impl Config {
    pub fn from_toml(s: &str) -> Result<Self, Error> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_handle_options(mut self, enabled: bool) -> Self {
        self.handle_options = enabled;
        self
    }

    pub fn with_error_view<F>(mut self, view: F) -> Self
    where
        F: Fn(&mut RequestCtx, &BoxError, StatusCode) + Send + Sync + 'static,
    {
        self.error_view = ErrorView(Arc::new(view));
        self
    }
}

// ── Logging ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Default filter directive. `RUST_LOG` takes precedence when set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { format: LogFormat::default(), level: "info".to_owned() }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Default,
    Compact,
    Pretty,
}

// ── Error view ────────────────────────────────────────────────────────────────

type ErrorViewFn = dyn Fn(&mut RequestCtx, &BoxError, StatusCode) + Send + Sync;

/// Renders the response when a step of a chain fails.
///
/// Receives the error and the inferred status: whatever status the failing
/// step had already set, or `500 Internal Server Error` if it was still
/// `200 OK`. The default writes the error message as plain text.
#[derive(Clone)]
pub struct ErrorView(Arc<ErrorViewFn>);

impl ErrorView {
    pub(crate) fn render(&self, ctx: &mut RequestCtx, err: &BoxError, status: StatusCode) {
        (self.0)(ctx, err, status)
    }
}

impl Default for ErrorView {
    fn default() -> Self {
        Self(Arc::new(default_error_view))
    }
}

impl fmt::Debug for ErrorView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorView")
    }
}

fn default_error_view(ctx: &mut RequestCtx, err: &BoxError, status: StatusCode) {
    ctx.error(&err.to_string(), status);
}
