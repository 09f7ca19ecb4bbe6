//! Runtime configuration, read once from the environment at start-up.

use std::time::Duration;

use crate::error::ControllerError;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Restrict both watchers to one namespace (`None` = all namespaces)
    pub watch_namespace: Option<String>,
    /// Concurrent reconciliations per watcher
    pub concurrency: u16,
    /// Quiet period after the last event before a pass runs
    pub debounce: Duration,
    /// First retry delay after a transient failure, in seconds
    pub backoff_min_seconds: u64,
    /// Upper bound of the retry delay, in seconds
    pub backoff_max_seconds: u64,
    /// Delay before redoing a pass that lost an optimistic-concurrency race
    pub conflict_requeue: Duration,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            concurrency: 3,
            debounce: Duration::from_secs(1),
            backoff_min_seconds: 1,
            backoff_max_seconds: 60,
            conflict_requeue: Duration::from_millis(500),
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Loads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// unset or empty variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let concurrency = match get("RECONCILE_CONCURRENCY") {
            Some(raw) => parse_number::<u16>("RECONCILE_CONCURRENCY", &raw)?,
            None => defaults.concurrency,
        };
        if concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        let debounce = match get("RECONCILE_DEBOUNCE_SECONDS") {
            Some(raw) => Duration::from_secs(parse_number("RECONCILE_DEBOUNCE_SECONDS", &raw)?),
            None => defaults.debounce,
        };

        let backoff_min_seconds = match get("BACKOFF_MIN_SECONDS") {
            Some(raw) => parse_number("BACKOFF_MIN_SECONDS", &raw)?,
            None => defaults.backoff_min_seconds,
        };
        let backoff_max_seconds = match get("BACKOFF_MAX_SECONDS") {
            Some(raw) => parse_number("BACKOFF_MAX_SECONDS", &raw)?,
            None => defaults.backoff_max_seconds,
        };
        if backoff_min_seconds == 0 || backoff_min_seconds > backoff_max_seconds {
            return Err(ControllerError::InvalidConfig(format!(
                "backoff bounds must satisfy 1 <= BACKOFF_MIN_SECONDS <= BACKOFF_MAX_SECONDS, got {} and {}",
                backoff_min_seconds, backoff_max_seconds
            )));
        }

        let conflict_requeue = match get("CONFLICT_REQUEUE_MILLIS") {
            Some(raw) => Duration::from_millis(parse_number("CONFLICT_REQUEUE_MILLIS", &raw)?),
            None => defaults.conflict_requeue,
        };

        let log_format = match get("LOG_FORMAT").as_deref() {
            None => defaults.log_format,
            Some(raw) if raw.eq_ignore_ascii_case("text") => LogFormat::Text,
            Some(raw) if raw.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(raw) => {
                return Err(ControllerError::InvalidConfig(format!(
                    "LOG_FORMAT must be 'text' or 'json', got {:?}",
                    raw
                )));
            }
        };

        Ok(Self {
            watch_namespace: get("WATCH_NAMESPACE"),
            concurrency,
            debounce,
            backoff_min_seconds,
            backoff_max_seconds,
            conflict_requeue,
            log_format,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ControllerError> {
    raw.parse().map_err(|_| {
        ControllerError::InvalidConfig(format!("{} must be a non-negative integer, got {:?}", key, raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.conflict_requeue, Duration::from_millis(500));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("WATCH_NAMESPACE", "team-a"),
            ("RECONCILE_CONCURRENCY", "8"),
            ("RECONCILE_DEBOUNCE_SECONDS", "0"),
            ("BACKOFF_MIN_SECONDS", "2"),
            ("BACKOFF_MAX_SECONDS", "120"),
            ("CONFLICT_REQUEUE_MILLIS", "50"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.watch_namespace.as_deref(), Some("team-a"));
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.debounce, Duration::ZERO);
        assert_eq!(config.backoff_min_seconds, 2);
        assert_eq!(config.backoff_max_seconds, 120);
        assert_eq!(config.conflict_requeue, Duration::from_millis(50));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_empty_watch_namespace_means_all() {
        let config = Config::from_lookup(lookup(&[("WATCH_NAMESPACE", "  ")])).unwrap();
        assert_eq!(config.watch_namespace, None);
    }

    #[test]
    fn test_invalid_values() {
        for vars in [
            vec![("RECONCILE_CONCURRENCY", "0")],
            vec![("RECONCILE_CONCURRENCY", "many")],
            vec![("BACKOFF_MIN_SECONDS", "-1")],
            vec![("BACKOFF_MIN_SECONDS", "30"), ("BACKOFF_MAX_SECONDS", "10")],
            vec![("LOG_FORMAT", "yaml")],
        ] {
            let err = Config::from_lookup(lookup(&vars)).unwrap_err();
            assert!(
                matches!(err, ControllerError::InvalidConfig(_)),
                "expected InvalidConfig for {:?}, got {:?}",
                vars,
                err
            );
        }
    }
}
