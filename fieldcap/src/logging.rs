//! Logging bootstrap

use crate::config::FieldCapConfig;
use fieldcap_core::{FieldCapError, FieldCapResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
///
/// Directive targets match by prefix, so `fieldcap` covers every
/// `fieldcap_*` crate.
pub fn default_filter(config: &FieldCapConfig) -> &'static str {
    if config.debug_logging {
        "fieldcap=debug"
    } else {
        "fieldcap=info"
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level. Calling this a second time
/// returns an `Initialization` error.
pub fn init_logging(config: &FieldCapConfig) -> FieldCapResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(config)))
        .map_err(|e| FieldCapError::Initialization {
            reason: format!("invalid log filter: {}", e),
        })?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| FieldCapError::Initialization {
            reason: format!("logging already initialized: {}", e),
        })?;

    tracing::info!("Field capture v{} logging ready", env!("CARGO_PKG_VERSION"));
    Ok(())
}
