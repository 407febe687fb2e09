//! Startup-time engine configuration.
//!
//! The engine never reads the environment at call time; whatever policy the
//! environment sets is captured here once, at startup, and injected.

use serde::{Deserialize, Serialize};

/// Environment variable disabling signature enforcement.
const ENV_SKIP_AUTH: &str = "RELAY_SKIP_AUTH";

/// Environment variable enabling test mode (synchronous task capabilities).
const ENV_TEST_MODE: &str = "RELAY_TEST_MODE";

/// Engine-wide configuration, fixed for the life of the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Disable signature enforcement entirely. Local development only.
    pub skip_signature_check: bool,
    /// Run task capabilities synchronously and side-effect-free, for
    /// self-tests and recorded replays.
    pub test_mode: bool,
}

impl EngineConfig {
    /// Capture configuration from the process environment.
    ///
    /// `RELAY_SKIP_AUTH` and `RELAY_TEST_MODE` are truthy when set to `1`
    /// or `true` (case-insensitive).
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            skip_signature_check: env_flag(ENV_SKIP_AUTH),
            test_mode: env_flag(ENV_TEST_MODE),
        }
    }
}

fn env_flag(name: &str) -> bool {
    parse_flag(std::env::var(name).ok().as_deref())
}

fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        let v = v.trim();
        v == "1" || v.eq_ignore_ascii_case("true")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_strict() {
        let config = EngineConfig::default();
        assert!(!config.skip_signature_check);
        assert!(!config.test_mode);
    }

    #[test]
    fn flag_parsing() {
        assert!(parse_flag(Some("1")));
        assert!(parse_flag(Some("true")));
        assert!(parse_flag(Some("TRUE")));
        assert!(parse_flag(Some(" true ")));
        assert!(!parse_flag(Some("0")));
        assert!(!parse_flag(Some("yes")));
        assert!(!parse_flag(None));
    }
}
