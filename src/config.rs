//! Hub configuration, read from `HUB_*` environment variables (spec §6).
//!
//! Follows the repo's convention of reading individual env vars directly
//! (see `packages/arbiter/src/bin/server.rs`'s `PORT` handling) rather than
//! a config-file layer: the hub has no persisted state to configure.

#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    pub max_logs: usize,
    pub stale_after_seconds: i64,
    pub remove_after_seconds: i64,
    pub reaper_interval_seconds: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown_seconds: i64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_logs: 100,
            stale_after_seconds: 900,
            remove_after_seconds: 3600,
            reaper_interval_seconds: 60,
            breaker_failure_threshold: 5,
            breaker_cooldown_seconds: 60,
        }
    }
}

impl HubConfig {
    /// Load from the environment, falling back to defaults on missing or
    /// malformed values (warn-and-proceed, matching the original's posture
    /// toward bad input elsewhere). Discards the warnings `env_parse`
    /// collects for malformed values; callers that can log (i.e. `main`,
    /// once the Log Ring exists) should use [`HubConfig::from_env_logged`].
    pub fn from_env() -> Self {
        Self::from_env_logged().0
    }

    /// Same as [`HubConfig::from_env`], but also returns one WARNING
    /// message per malformed env var so the caller can append them to the
    /// Log Ring once it exists. Config loading happens before the Log Ring
    /// is constructed (its own capacity comes from this config), so the
    /// warnings are collected here and logged by the caller afterward.
    pub fn from_env_logged() -> (Self, Vec<String>) {
        let defaults = Self::default();
        let mut warnings = Vec::new();

        let mut parse = |key: &str, default| env_parse(key, default, &mut warnings);
        let config = Self {
            max_logs: parse("HUB_MAX_LOGS", defaults.max_logs),
            stale_after_seconds: parse("HUB_STALE_AFTER_SECONDS", defaults.stale_after_seconds),
            remove_after_seconds: parse("HUB_REMOVE_AFTER_SECONDS", defaults.remove_after_seconds),
            reaper_interval_seconds: parse(
                "HUB_REAPER_INTERVAL_SECONDS",
                defaults.reaper_interval_seconds,
            ),
            breaker_failure_threshold: parse(
                "HUB_BREAKER_FAILURE_THRESHOLD",
                defaults.breaker_failure_threshold,
            ),
            breaker_cooldown_seconds: parse(
                "HUB_BREAKER_COOLDOWN_SECONDS",
                defaults.breaker_cooldown_seconds,
            ),
        };
        (config, warnings)
    }
}

fn env_parse<T: std::str::FromStr + std::fmt::Display>(
    key: &str,
    default: T,
    warnings: &mut Vec<String>,
) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warnings.push(format!(
                    "env var {key}='{raw}' is malformed, falling back to default ({default})"
                ));
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_spec() {
        let cfg = HubConfig::default();
        assert_eq!(cfg.max_logs, 100);
        assert_eq!(cfg.stale_after_seconds, 900);
        assert_eq!(cfg.remove_after_seconds, 3600);
        assert_eq!(cfg.reaper_interval_seconds, 60);
        assert_eq!(cfg.breaker_failure_threshold, 5);
        assert_eq!(cfg.breaker_cooldown_seconds, 60);
    }

    #[test]
    fn test_env_parse_falls_back_on_malformed_value() {
        // SAFETY: test-only, single-threaded access to this specific var.
        unsafe {
            std::env::set_var("HUB_TEST_MALFORMED", "not-a-number");
        }
        let mut warnings = Vec::new();
        let parsed: usize = env_parse("HUB_TEST_MALFORMED", 42, &mut warnings);
        assert_eq!(parsed, 42);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("HUB_TEST_MALFORMED"));
        unsafe {
            std::env::remove_var("HUB_TEST_MALFORMED");
        }
    }

    #[test]
    fn test_env_parse_is_silent_when_var_is_absent() {
        let mut warnings = Vec::new();
        let parsed: usize = env_parse("HUB_TEST_DEFINITELY_UNSET", 7, &mut warnings);
        assert_eq!(parsed, 7);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_from_env_logged_collects_one_warning_per_malformed_var() {
        // SAFETY: test-only, single-threaded access to these specific vars.
        unsafe {
            std::env::set_var("HUB_MAX_LOGS", "not-a-number");
            std::env::set_var("HUB_BREAKER_COOLDOWN_SECONDS", "also-not-a-number");
        }
        let (config, warnings) = HubConfig::from_env_logged();
        unsafe {
            std::env::remove_var("HUB_MAX_LOGS");
            std::env::remove_var("HUB_BREAKER_COOLDOWN_SECONDS");
        }

        assert_eq!(config.max_logs, HubConfig::default().max_logs);
        assert_eq!(
            config.breaker_cooldown_seconds,
            HubConfig::default().breaker_cooldown_seconds
        );
        assert_eq!(warnings.len(), 2);
    }
}
