//! Logging initialization

use super::config::Environment;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for `env`
///
/// `local` logs human-readable text at debug, `dev` JSON at debug and
/// `prod` JSON at info. `RUST_LOG` overrides the level. Calling this twice
/// keeps the first subscriber.
pub fn init_tracing(env: Environment) {
    let default_level = match env {
        Environment::Local | Environment::Dev => "debug",
        Environment::Prod => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false);

    let _ = match env {
        Environment::Local => builder.try_init(),
        Environment::Dev | Environment::Prod => builder.json().try_init(),
    };
}
