//! Logger bootstrap and the transition-logging macro.
//!
//! Usage:
//! ```ignore
//! // In your module, define the flag first:
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::log_transition;
//! log_transition!(session, SessionAction::Pause);
//! ```

use std::str::FromStr;

use log::LevelFilter;

/// Installs `env_logger`. `RUST_LOG` wins over `default_level`; an unparsable
/// level falls back to `info`. Returns `false` if a logger was already set.
pub fn init_logging(default_level: &str) -> bool {
    let level = LevelFilter::from_str(default_level).unwrap_or(LevelFilter::Info);

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format_timestamp_millis();
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.try_init().is_ok()
}

/// Logs a completed transition at info level.
/// Checks the `ENABLE_LOGS` const in the calling module.
///
/// Each module that uses this macro must define:
/// ```ignore
/// const ENABLE_LOGS: bool = true; // or false
/// ```
#[macro_export]
macro_rules! log_transition {
    ($session:expr, $action:expr) => {
        if ENABLE_LOGS {
            let session = &$session;
            log::info!(
                target: "work_tracker::transitions",
                "{} session {} for user {} -> {} (v{})",
                $action,
                session.id,
                session.user_id,
                session.status(),
                session.version
            );
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_noop() {
        init_logging("debug");
        assert!(!init_logging("not-a-level"));
    }
}
