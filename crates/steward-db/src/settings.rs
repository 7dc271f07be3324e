//! Connection settings read from a prefix-scoped settings map.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::SettingsError;

/// Prefix under which database settings live in the application settings.
pub const DEFAULT_PREFIX: &str = "db.";

/// Everything needed to build a [`crate::SessionFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbSettings {
    /// SQLite database path, or `:memory:`.
    pub url: String,

    /// Maximum number of pooled connections.
    pub pool_max_size: u32,

    /// Busy timeout for SQLite connections, in milliseconds.
    pub busy_timeout_ms: u64,

    /// How long to wait for a pooled connection, in milliseconds.
    pub connection_timeout_ms: u64,

    /// Whether `PRAGMA foreign_keys` is enabled on every connection.
    pub foreign_keys: bool,
}

impl DbSettings {
    /// Settings for `url` with every tunable at its default.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool_max_size: 8,
            busy_timeout_ms: 5_000,
            connection_timeout_ms: 30_000,
            foreign_keys: true,
        }
    }

    /// Reads settings from `settings`, looking only at keys that start with
    /// `prefix`.
    ///
    /// Recognised keys (after the prefix): `url` (required), `pool_max_size`,
    /// `busy_timeout_ms`, `connection_timeout_ms`, `foreign_keys`. Unknown keys
    /// under the prefix are ignored. A `sqlite://` scheme on the url is
    /// stripped.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Missing` if `url` is absent or blank and
    /// `SettingsError::Invalid` if a tunable cannot be parsed.
    pub fn from_settings(
        settings: &BTreeMap<String, String>,
        prefix: &str,
    ) -> Result<Self, SettingsError> {
        let key = |name: &str| format!("{prefix}{name}");

        let url_key = key("url");
        let url = settings
            .get(&url_key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SettingsError::Missing(url_key.clone()))?;
        let url = url.strip_prefix("sqlite://").unwrap_or(url);

        let mut parsed = Self::new(url);
        if let Some(v) = parse_opt(settings, &key("pool_max_size"))? {
            parsed.pool_max_size = v;
        }
        if let Some(v) = parse_opt(settings, &key("busy_timeout_ms"))? {
            parsed.busy_timeout_ms = v;
        }
        if let Some(v) = parse_opt(settings, &key("connection_timeout_ms"))? {
            parsed.connection_timeout_ms = v;
        }
        if let Some(v) = parse_opt(settings, &key("foreign_keys"))? {
            parsed.foreign_keys = v;
        }

        if parsed.pool_max_size == 0 {
            return Err(SettingsError::Invalid {
                key: key("pool_max_size"),
                value: "0".to_string(),
            });
        }

        Ok(parsed)
    }
}

fn parse_opt<T: FromStr>(
    settings: &BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>, SettingsError> {
    match settings.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SettingsError::Invalid {
                key: key.to_string(),
                value: raw.clone(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn reads_prefixed_keys() {
        let parsed = DbSettings::from_settings(
            &settings(&[
                ("db.url", "sqlite:///var/lib/steward.db"),
                ("db.pool_max_size", "3"),
                ("db.busy_timeout_ms", "250"),
                ("db.foreign_keys", "false"),
                ("other.url", "ignored.db"),
            ]),
            DEFAULT_PREFIX,
        )
        .expect("settings should parse");

        assert_eq!(parsed.url, "/var/lib/steward.db");
        assert_eq!(parsed.pool_max_size, 3);
        assert_eq!(parsed.busy_timeout_ms, 250);
        assert_eq!(parsed.connection_timeout_ms, 30_000);
        assert!(!parsed.foreign_keys);
    }

    #[test]
    fn custom_prefix() {
        let parsed = DbSettings::from_settings(
            &settings(&[("sqlalchemy.url", ":memory:"), ("db.url", "other.db")]),
            "sqlalchemy.",
        )
        .expect("settings should parse");
        assert_eq!(parsed.url, ":memory:");
    }

    #[test]
    fn missing_url_is_an_error() {
        let err = DbSettings::from_settings(&settings(&[("db.url", "  ")]), DEFAULT_PREFIX)
            .expect_err("blank url should fail");
        assert!(matches!(err, SettingsError::Missing(key) if key == "db.url"));
    }

    #[test]
    fn unparsable_value_is_an_error() {
        let err = DbSettings::from_settings(
            &settings(&[("db.url", "a.db"), ("db.pool_max_size", "many")]),
            DEFAULT_PREFIX,
        )
        .expect_err("bad pool size should fail");
        match err {
            SettingsError::Invalid { key, value } => {
                assert_eq!(key, "db.pool_max_size");
                assert_eq!(value, "many");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let err = DbSettings::from_settings(
            &settings(&[("db.url", "a.db"), ("db.pool_max_size", "0")]),
            DEFAULT_PREFIX,
        )
        .expect_err("zero pool size should fail");
        assert!(matches!(err, SettingsError::Invalid { .. }));
    }
}
