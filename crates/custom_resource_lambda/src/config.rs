use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use custom_resource_core::contract::ExecutionContext;

pub const CALLBACK_TIMEOUT_ENV: &str = "CUSTOM_RESOURCE_CALLBACK_TIMEOUT_SECS";
pub const REASON_STYLE_ENV: &str = "CUSTOM_RESOURCE_REASON_STYLE";
pub const LOG_PROPERTIES_ENV: &str = "CUSTOM_RESOURCE_LOG_PROPERTIES";
pub const LOG_GROUP_ENV: &str = "AWS_LAMBDA_LOG_GROUP_NAME";
pub const LOG_STREAM_ENV: &str = "AWS_LAMBDA_LOG_STREAM_NAME";
pub const RANDOM_STRING_KEY_ENV: &str = "CUSTOM_RESOURCE_RANDOM_STRING_KEY";

pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);
pub const MIN_DERIVATION_KEY_LEN: usize = 32;

/// How the `Reason` field of a FAILED response is composed.
///
/// Only `LogPointer` keeps handler error text out of the orchestrator; the
/// other styles are for stacks whose events may show internal messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReasonStyle {
    /// Only a pointer at the log stream; no error text leaves the function.
    #[default]
    LogPointer,
    /// Failure summary, followed by the log coordinates when known.
    Summary,
    /// Failure summary verbatim.
    Bare,
}

impl FromStr for ReasonStyle {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "summary" => Ok(Self::Summary),
            "log-pointer" | "log_pointer" => Ok(Self::LogPointer),
            "bare" => Ok(Self::Bare),
            _ => Err(ConfigError::Invalid {
                key: REASON_STYLE_ENV,
                value: value.to_string(),
                expected: "summary, log-pointer or bare",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid; expected {expected}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Secret keying derived resource values. `Debug` never prints the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivationKey(Vec<u8>);

impl DerivationKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let bytes = bytes.into();
        if bytes.len() < MIN_DERIVATION_KEY_LEN {
            return Err(ConfigError::Invalid {
                key: RANDOM_STRING_KEY_ENV,
                value: format!("<{} bytes>", bytes.len()),
                expected: "a secret of at least 32 bytes",
            });
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for DerivationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivationKey(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub callback_timeout: Duration,
    pub reason_style: ReasonStyle,
    pub log_resource_properties: bool,
    pub log_group_name: String,
    pub log_stream_name: String,
    pub random_string_key: Option<DerivationKey>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
            reason_style: ReasonStyle::default(),
            log_resource_properties: false,
            log_group_name: String::new(),
            log_stream_name: String::new(),
            random_string_key: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests never touch the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let callback_timeout = match non_empty(lookup(CALLBACK_TIMEOUT_ENV)) {
            Some(value) => parse_timeout(&value)?,
            None => defaults.callback_timeout,
        };
        let reason_style = match non_empty(lookup(REASON_STYLE_ENV)) {
            Some(value) => value.parse()?,
            None => defaults.reason_style,
        };
        let log_resource_properties = match non_empty(lookup(LOG_PROPERTIES_ENV)) {
            Some(value) => parse_bool(LOG_PROPERTIES_ENV, &value)?,
            None => defaults.log_resource_properties,
        };
        let random_string_key = match lookup(RANDOM_STRING_KEY_ENV) {
            Some(value) if !value.is_empty() => Some(DerivationKey::new(value)?),
            _ => None,
        };

        Ok(Self {
            callback_timeout,
            reason_style,
            log_resource_properties,
            log_group_name: lookup(LOG_GROUP_ENV).unwrap_or_default(),
            log_stream_name: lookup(LOG_STREAM_ENV).unwrap_or_default(),
            random_string_key,
        })
    }

    /// Diagnostic coordinates for one invocation.
    pub fn execution_context(&self, request_id: impl Into<String>) -> ExecutionContext {
        ExecutionContext {
            request_id: request_id.into(),
            log_group_name: self.log_group_name.clone(),
            log_stream_name: self.log_stream_name.clone(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn parse_timeout(value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(Duration::from_secs(seconds)),
        _ => Err(ConfigError::Invalid {
            key: CALLBACK_TIMEOUT_ENV,
            value: value.to_string(),
            expected: "a positive number of seconds",
        }),
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            expected: "true or false",
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<RuntimeConfig, ConfigError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        RuntimeConfig::from_lookup(|key| values.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = config_from(&[]).expect("defaults should load");
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn reads_all_settings() {
        let config = config_from(&[
            (CALLBACK_TIMEOUT_ENV, "25"),
            (REASON_STYLE_ENV, "summary"),
            (LOG_PROPERTIES_ENV, "TRUE"),
            (LOG_GROUP_ENV, "/aws/lambda/provisioner"),
            (LOG_STREAM_ENV, "2026/10/19/[$LATEST]abc"),
        ])
        .expect("config should load");

        assert_eq!(config.callback_timeout, Duration::from_secs(25));
        assert_eq!(config.reason_style, ReasonStyle::Summary);
        assert!(config.log_resource_properties);
        assert_eq!(config.log_group_name, "/aws/lambda/provisioner");
        assert_eq!(config.log_stream_name, "2026/10/19/[$LATEST]abc");
    }

    #[test]
    fn default_reason_style_keeps_error_text_out_of_responses() {
        let config = config_from(&[]).expect("defaults should load");
        assert_eq!(config.reason_style, ReasonStyle::LogPointer);
    }

    #[test]
    fn reads_random_string_key_without_printing_it() {
        let secret = "k".repeat(MIN_DERIVATION_KEY_LEN);
        let config = config_from(&[(RANDOM_STRING_KEY_ENV, secret.as_str())])
            .expect("config should load");

        let key = config.random_string_key.clone().expect("key should be set");
        assert_eq!(key.as_bytes(), secret.as_bytes());
        assert!(!format!("{config:?}").contains(&secret));
    }

    #[test]
    fn rejects_short_random_string_key() {
        let error = config_from(&[(RANDOM_STRING_KEY_ENV, "too-short")])
            .expect_err("short key should fail");
        assert!(error.to_string().contains(RANDOM_STRING_KEY_ENV));
        assert!(!error.to_string().contains("too-short"));
    }

    #[test]
    fn rejects_zero_timeout() {
        let error = config_from(&[(CALLBACK_TIMEOUT_ENV, "0")]).expect_err("zero should fail");
        assert!(error.to_string().contains(CALLBACK_TIMEOUT_ENV));
    }

    #[test]
    fn rejects_unknown_reason_style() {
        assert!(config_from(&[(REASON_STYLE_ENV, "verbose")]).is_err());
    }

    #[test]
    fn rejects_unparsable_bool() {
        assert!(config_from(&[(LOG_PROPERTIES_ENV, "maybe")]).is_err());
    }
}
