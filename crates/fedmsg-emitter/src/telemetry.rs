//! Tracing setup for processes that host the emitter.
//!
//! Hosts call [`init_tracing`] once at startup. Later calls are no-ops since
//! the global subscriber can only be installed once per process.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Targets that follow the requested level; everything else, including the
/// ZeroMQ socket internals, stays at `warn`.
const EMITTER_TARGETS: &[&str] = &["fedmsg_emitter", "fedmsg_emit"];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let mut directives = String::from("warn");
    for target in EMITTER_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level` when set. With `json`, lines are emitted as
/// newline-delimited JSON. Logs go to stderr so stdout stays free for output.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_level_to_emitter() {
        assert_eq!(
            default_directives(Level::DEBUG),
            "warn,fedmsg_emitter=debug,fedmsg_emit=debug"
        );
        assert!(default_directives(Level::INFO).parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
    }
}
