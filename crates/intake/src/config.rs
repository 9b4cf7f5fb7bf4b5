use std::path::PathBuf;

use sellerdesk_core::types::AccountId;
use sellerdesk_core::upload_entry::{parse_data_type, DataType};

/// Errors raised while reading [`IntakeConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Intake configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Base URL of the dashboard API, without a trailing slash.
    pub api_url: String,
    /// Read accounts from this JSON file instead of `GET {api_url}/accounts`.
    pub accounts_file: Option<PathBuf>,
    /// Data type applied to files added without an explicit one.
    pub default_data_type: DataType,
    /// Account selected for files with no exact suggestion.
    pub default_account_id: Option<AccountId>,
    /// Whole-request timeout for uploads and account listing.
    pub request_timeout_secs: u64,
    /// Size of the chunks an upload body is streamed in.
    pub chunk_size_bytes: usize,
    /// Confirm every account mismatch without asking.
    pub auto_confirm: bool,
    /// Emit JSON log lines instead of human-readable ones.
    pub log_json: bool,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000/api/v1".into(),
            accounts_file: None,
            default_data_type: DataType::Order,
            default_account_id: None,
            request_timeout_secs: 120,
            chunk_size_bytes: 64 * 1024,
            auto_confirm: false,
            log_json: false,
        }
    }
}

impl IntakeConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                       | Default                        |
    /// |-------------------------------|--------------------------------|
    /// | `INTAKE_API_URL`              | `http://localhost:3000/api/v1` |
    /// | `INTAKE_ACCOUNTS_FILE`        | unset                          |
    /// | `INTAKE_DATA_TYPE`            | `order`                        |
    /// | `INTAKE_DEFAULT_ACCOUNT_ID`   | unset                          |
    /// | `INTAKE_REQUEST_TIMEOUT_SECS` | `120`                          |
    /// | `INTAKE_CHUNK_SIZE_BYTES`     | `65536`                        |
    /// | `INTAKE_AUTO_CONFIRM`         | `false`                        |
    /// | `INTAKE_LOG_JSON`             | `false`                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_url = get("INTAKE_API_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);

        let accounts_file = get("INTAKE_ACCOUNTS_FILE").map(PathBuf::from);

        let default_data_type = match get("INTAKE_DATA_TYPE") {
            Some(v) => parse_data_type(&v).map_err(|_| ConfigError::Invalid {
                var: "INTAKE_DATA_TYPE",
                expected: "one of order, listing, customer",
                value: v,
            })?,
            None => defaults.default_data_type,
        };

        let default_account_id = get("INTAKE_DEFAULT_ACCOUNT_ID")
            .map(|v| parse_number("INTAKE_DEFAULT_ACCOUNT_ID", v))
            .transpose()?;

        let request_timeout_secs = get("INTAKE_REQUEST_TIMEOUT_SECS")
            .map(|v| parse_number("INTAKE_REQUEST_TIMEOUT_SECS", v))
            .transpose()?
            .unwrap_or(defaults.request_timeout_secs);

        let chunk_size_bytes: usize = get("INTAKE_CHUNK_SIZE_BYTES")
            .map(|v| parse_number("INTAKE_CHUNK_SIZE_BYTES", v))
            .transpose()?
            .unwrap_or(defaults.chunk_size_bytes);
        if chunk_size_bytes == 0 {
            return Err(ConfigError::Invalid {
                var: "INTAKE_CHUNK_SIZE_BYTES",
                expected: "a positive integer",
                value: "0".into(),
            });
        }

        let auto_confirm = get("INTAKE_AUTO_CONFIRM")
            .map(|v| parse_bool("INTAKE_AUTO_CONFIRM", v))
            .transpose()?
            .unwrap_or(defaults.auto_confirm);

        let log_json = get("INTAKE_LOG_JSON")
            .map(|v| parse_bool("INTAKE_LOG_JSON", v))
            .transpose()?
            .unwrap_or(defaults.log_json);

        Ok(Self {
            api_url,
            accounts_file,
            default_data_type,
            default_account_id,
            request_timeout_secs,
            chunk_size_bytes,
            auto_confirm,
            log_json,
        })
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        var,
        expected: "a non-negative integer",
        value,
    })
}

fn parse_bool(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            expected: "a boolean",
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<IntakeConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        IntakeConfig::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.api_url, "http://localhost:3000/api/v1");
        assert_eq!(config.default_data_type, DataType::Order);
        assert_eq!(config.request_timeout_secs, 120);
        assert_eq!(config.chunk_size_bytes, 65536);
        assert!(config.accounts_file.is_none());
        assert!(!config.auto_confirm);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("INTAKE_API_URL", "https://dash.example.com/api/"),
            ("INTAKE_ACCOUNTS_FILE", "/tmp/accounts.json"),
            ("INTAKE_DATA_TYPE", "Listing"),
            ("INTAKE_DEFAULT_ACCOUNT_ID", "42"),
            ("INTAKE_CHUNK_SIZE_BYTES", "1024"),
            ("INTAKE_AUTO_CONFIRM", "yes"),
            ("INTAKE_LOG_JSON", "1"),
        ])
        .unwrap();
        assert_eq!(config.api_url, "https://dash.example.com/api");
        assert_eq!(config.accounts_file, Some(PathBuf::from("/tmp/accounts.json")));
        assert_eq!(config.default_data_type, DataType::Listing);
        assert_eq!(config.default_account_id, Some(42));
        assert_eq!(config.chunk_size_bytes, 1024);
        assert!(config.auto_confirm);
        assert!(config.log_json);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("INTAKE_API_URL", "  "), ("INTAKE_DATA_TYPE", "")]).unwrap();
        assert_eq!(config.api_url, "http://localhost:3000/api/v1");
        assert_eq!(config.default_data_type, DataType::Order);
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(load(&[("INTAKE_REQUEST_TIMEOUT_SECS", "soon")]).is_err());
        assert!(load(&[("INTAKE_DATA_TYPE", "invoice")]).is_err());
        assert!(load(&[("INTAKE_AUTO_CONFIRM", "maybe")]).is_err());
        assert!(load(&[("INTAKE_CHUNK_SIZE_BYTES", "0")]).is_err());
    }
}
