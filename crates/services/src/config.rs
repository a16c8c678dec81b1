//! Engine configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use sporty_core::Calendar;

use crate::error::ConfigError;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://sporty.sqlite3";
pub const DEFAULT_MAX_SAVE_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Runtime settings for the progress engine, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// `SQLite` URL for progress and curriculum storage.
    pub database_url: String,
    /// Upper bound on optimistic write attempts per event (at least 1).
    pub max_save_attempts: u32,
    /// Base delay between attempts; each retry adds jitter on top.
    pub retry_backoff: Duration,
    /// Day boundary used by the streak rule.
    pub calendar: Calendar,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_save_attempts: DEFAULT_MAX_SAVE_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            calendar: Calendar::utc(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the process environment.
    ///
    /// Reads `SPORTY_DB_URL`, `SPORTY_MAX_SAVE_ATTEMPTS`,
    /// `SPORTY_RETRY_BACKOFF_MS`, and one of `SPORTY_TIMEZONE` (an IANA zone
    /// name) or `SPORTY_UTC_OFFSET_MINUTES`. Unset variables fall back to the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a variable is set to a value that
    /// cannot be used.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`EngineConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for unusable values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("SPORTY_DB_URL") {
            let url = url.trim();
            if url.is_empty() {
                return Err(invalid("SPORTY_DB_URL", url, "must not be empty"));
            }
            config.database_url = url.to_string();
        }

        if let Some(raw) = lookup("SPORTY_MAX_SAVE_ATTEMPTS") {
            let attempts: u32 = parse("SPORTY_MAX_SAVE_ATTEMPTS", &raw, "expected an integer")?;
            if attempts == 0 {
                return Err(invalid(
                    "SPORTY_MAX_SAVE_ATTEMPTS",
                    &raw,
                    "must be at least 1",
                ));
            }
            config.max_save_attempts = attempts;
        }

        if let Some(raw) = lookup("SPORTY_RETRY_BACKOFF_MS") {
            let ms: u64 = parse("SPORTY_RETRY_BACKOFF_MS", &raw, "expected milliseconds")?;
            config.retry_backoff = Duration::from_millis(ms);
        }

        match (lookup("SPORTY_TIMEZONE"), lookup("SPORTY_UTC_OFFSET_MINUTES")) {
            (Some(zone), Some(_)) => {
                return Err(invalid(
                    "SPORTY_TIMEZONE",
                    &zone,
                    "conflicts with SPORTY_UTC_OFFSET_MINUTES",
                ));
            }
            (Some(zone), None) => {
                config.calendar = Calendar::from_zone_name(&zone)
                    .ok_or_else(|| invalid("SPORTY_TIMEZONE", &zone, "unknown IANA zone"))?;
            }
            (None, Some(raw)) => {
                let minutes: i32 = parse("SPORTY_UTC_OFFSET_MINUTES", &raw, "expected minutes")?;
                config.calendar = Calendar::from_offset_minutes(minutes)
                    .ok_or_else(|| invalid("SPORTY_UTC_OFFSET_MINUTES", &raw, "outside +/-24h"))?;
            }
            (None, None) => {}
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(
    var: &'static str,
    raw: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| invalid(var, raw, expected))
}

fn invalid(var: &'static str, value: &str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn unset_environment_gives_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.database_url, "sqlite://sporty.sqlite3");
        assert_eq!(config.max_save_attempts, 5);
        assert_eq!(config.retry_backoff, Duration::from_millis(10));
        assert_eq!(config.calendar, Calendar::utc());
    }

    #[test]
    fn reads_every_variable() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("SPORTY_DB_URL", "sqlite::memory:"),
            ("SPORTY_MAX_SAVE_ATTEMPTS", "3"),
            ("SPORTY_RETRY_BACKOFF_MS", "0"),
            ("SPORTY_UTC_OFFSET_MINUTES", "-300"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.max_save_attempts, 3);
        assert_eq!(config.retry_backoff, Duration::ZERO);
        assert_eq!(
            config.calendar,
            Calendar::from_offset_minutes(-300).unwrap()
        );
    }

    #[test]
    fn timezone_name_selects_a_zone_calendar() {
        let vars = [("SPORTY_TIMEZONE", "America/New_York")];
        let config = EngineConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(
            config.calendar,
            Calendar::from_zone_name("America/New_York").unwrap()
        );

        let err = EngineConfig::from_lookup(lookup(&[("SPORTY_TIMEZONE", "Nowhere/Special")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "SPORTY_TIMEZONE",
                ..
            }
        ));
    }

    #[test]
    fn timezone_and_offset_together_are_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[
            ("SPORTY_TIMEZONE", "Europe/Berlin"),
            ("SPORTY_UTC_OFFSET_MINUTES", "60"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "SPORTY_TIMEZONE",
                ..
            }
        ));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[("SPORTY_MAX_SAVE_ATTEMPTS", "0")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "SPORTY_MAX_SAVE_ATTEMPTS",
                ..
            }
        ));
    }

    #[test]
    fn garbage_is_rejected_not_defaulted() {
        for vars in [
            [("SPORTY_RETRY_BACKOFF_MS", "soon")],
            [("SPORTY_UTC_OFFSET_MINUTES", "5000")],
            [("SPORTY_DB_URL", "  ")],
        ] {
            assert!(EngineConfig::from_lookup(lookup(&vars)).is_err());
        }
    }
}
