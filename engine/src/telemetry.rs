//! Structured logging setup.
//!
//! Owns the log level resolution: `RUST_LOG` wins when set, then an
//! explicit `--log` flag, then the configured level. Debug builds get
//! pretty terminal output; release builds get JSON with span context.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// Idempotent: a second call in the same process is ignored, so tests
/// that each set up logging do not trip over one another.
pub fn init_telemetry(flag_level: Option<&str>, config_level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(directives(effective_level(flag_level, config_level)))
    });

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(false))
            .try_init()
            .ok();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
            .ok();
    }
}

fn effective_level<'a>(flag_level: Option<&'a str>, config_level: &'a str) -> &'a str {
    flag_level.unwrap_or(config_level)
}

/// Filter directives applying the level globally and to this crate.
fn directives(level: &str) -> String {
    format!("{level},tiabridge_engine={level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_level_wins_over_config() {
        assert_eq!(effective_level(Some("debug"), "warn"), "debug");
        assert_eq!(effective_level(None, "warn"), "warn");
    }

    #[test]
    fn test_directives_scope_the_crate() {
        assert_eq!(directives("info"), "info,tiabridge_engine=info");
    }
}
