//! Unified error type.

use thiserror::Error;

/// Error type returned by views and middlewares.
///
/// Anything implementing [`std::error::Error`] converts into it with `?`,
/// and so does a plain `&str` or `String` via `.into()`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by trellis' fallible operations.
///
/// Application-level failures travel through the chain as [`BoxError`] and
/// end up in the error view. This type surfaces infrastructure failures:
/// loading configuration, building the route table, binding a port.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid route `{method} {path}`: {source}")]
    Route {
        method: String,
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
