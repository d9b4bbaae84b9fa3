//! Tracing subscriber setup.
//!
//! trellis only emits `tracing` events; installing a subscriber is left to
//! the application. [`init`] is the one-liner for applications that are
//! happy with `tracing-subscriber`'s fmt layer.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::Error;

/// Installs a global fmt subscriber.
///
/// `RUST_LOG` wins over `config.level` when it is set. Fails if a global
/// subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::Logging(e.to_string()))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match config.format {
        LogFormat::Json    => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty  => builder.pretty().try_init(),
        LogFormat::Default => builder.try_init(),
    };

    result.map_err(|e| Error::Logging(e.to_string()))
}
