//! Logging setup.
//!
//! Level filtering comes from [`LoggingConfig`], with per-module overrides;
//! a `RUST_LOG` environment variable wins over the config when present:
//!
//! ```bash
//! RUST_LOG=debug ...
//! RUST_LOG=graph=debug,validation=trace ...
//! ```

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

/// Millisecond wall-clock stamps; full dates add nothing to an editor log.
struct WallClock;

impl FormatTime for WallClock {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Comma-joined filter directives from the config: the default level first,
/// then one `module=level` entry per override.
fn filter_directives(config: &LoggingConfig) -> String {
    std::iter::once(config.default.clone())
        .chain(
            config
                .modules
                .iter()
                .map(|(module, level)| format!("{module}={level}")),
        )
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber.
///
/// Repeat calls are no-ops; the first installation wins. `RUST_LOG` takes
/// precedence over the config, falling back to the config's directives when
/// the variable is absent.
pub fn init_with_config(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_timer(WallClock)
        .with_target(true)
        .try_init();
}

/// Install the global subscriber with defaults (`warn`, quiet operation).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}
