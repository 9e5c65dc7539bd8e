//! Tracing setup for the `treemend` binary.
//!
//! Library code only emits events; [`init_tracing`] installs the global
//! subscriber once at startup.

use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Build the env filter: `RUST_LOG` wins, `level` otherwise. Unparseable
/// directives in `RUST_LOG` are skipped rather than failing startup.
fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

/// Install the global subscriber.
///
/// Human output is compact. JSON output flattens event fields and carries
/// the enclosing `treemend.run` span, so every line of a run has its
/// `run_id`. Both write to stderr; stdout is reserved for reports. Only the
/// first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let output = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let output = if json {
        output
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed()
    } else {
        output.compact().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(output)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
    }

    #[test]
    fn test_default_level_applies_without_env() {
        let filter = env_filter(Level::DEBUG);
        if std::env::var_os("RUST_LOG").is_none() {
            assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
        }
    }
}
