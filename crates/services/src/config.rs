use std::env;

use crate::error::ConfigError;

pub const DB_URL_VAR: &str = "COURSES_DB_URL";
pub const TAGGING_ENABLED_VAR: &str = "COURSES_TAGGING_ENABLED";

pub const DEFAULT_DB_URL: &str = "sqlite://courses.sqlite3";

/// Runtime configuration for the progress engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressConfig {
    pub database_url: String,
    /// When off, milestones are still recorded but no marketing tags are queued.
    pub tagging_enabled: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DB_URL.to_owned(),
            tagging_enabled: true,
        }
    }
}

impl ProgressConfig {
    /// Read configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let database_url = lookup(DB_URL_VAR)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.database_url);

        let tagging_enabled = match lookup(TAGGING_ENABLED_VAR) {
            None => defaults.tagging_enabled,
            Some(raw) => parse_flag(&raw).unwrap_or_else(|| {
                tracing::warn!(
                    var = TAGGING_ENABLED_VAR,
                    value = %raw,
                    default = defaults.tagging_enabled,
                    "invalid env var value, using default"
                );
                defaults.tagging_enabled
            }),
        };

        Self {
            database_url,
            tagging_enabled,
        }
    }

    /// Override the database URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyDatabaseUrl` for a blank value.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }
        self.database_url = url;
        Ok(self)
    }

    #[must_use]
    pub fn with_tagging(mut self, enabled: bool) -> Self {
        self.tagging_enabled = enabled;
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ProgressConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ProgressConfig::default());
        assert_eq!(config.database_url, DEFAULT_DB_URL);
        assert!(config.tagging_enabled);
    }

    #[test]
    fn reads_values() {
        let config = ProgressConfig::from_lookup(lookup(&[
            (DB_URL_VAR, "sqlite::memory:"),
            (TAGGING_ENABLED_VAR, "off"),
        ]));
        assert_eq!(config.database_url, "sqlite::memory:");
        assert!(!config.tagging_enabled);
    }

    #[test]
    fn invalid_flag_falls_back_to_default() {
        let config = ProgressConfig::from_lookup(lookup(&[(TAGGING_ENABLED_VAR, "banana")]));
        assert!(config.tagging_enabled);
    }

    #[test]
    fn blank_database_url_is_rejected() {
        let config = ProgressConfig::from_lookup(lookup(&[(DB_URL_VAR, "  ")]));
        assert_eq!(config.database_url, DEFAULT_DB_URL);
        assert_eq!(
            ProgressConfig::default().with_database_url(" "),
            Err(ConfigError::EmptyDatabaseUrl)
        );
    }
}
