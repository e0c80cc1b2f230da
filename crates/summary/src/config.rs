//! Summary client configuration.
//!
//! Configuration is resolved once at process startup and passed into the client. Nothing in this
//! crate reads environment variables; binaries read them and hand the raw values to
//! [`resolve_config`].

use crate::{SummaryError, SummaryResult};
use std::fmt;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 5000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Chat endpoint configuration.
#[derive(Clone)]
pub struct SummaryConfig {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
}

impl SummaryConfig {
    /// Create a new `SummaryConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::MissingApiKey`] if the key is empty, and [`SummaryError::Config`]
    /// if the model or base URL is empty, the temperature is outside `0.0..=2.0`, or the token
    /// limit or timeout is zero.
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        temperature: f32,
        max_tokens: u32,
        timeout_secs: u64,
    ) -> SummaryResult<Self> {
        if api_key.trim().is_empty() {
            return Err(SummaryError::MissingApiKey);
        }
        if model.trim().is_empty() {
            return Err(SummaryError::Config("model cannot be empty".into()));
        }
        if base_url.trim().is_empty() {
            return Err(SummaryError::Config("base url cannot be empty".into()));
        }
        if !(0.0..=2.0).contains(&temperature) {
            return Err(SummaryError::Config(format!(
                "temperature {temperature} is outside 0.0..=2.0"
            )));
        }
        if max_tokens == 0 {
            return Err(SummaryError::Config("max tokens must be positive".into()));
        }
        if timeout_secs == 0 {
            return Err(SummaryError::Config("timeout must be positive".into()));
        }

        Ok(Self {
            api_key: api_key.trim().to_string(),
            model: model.trim().to_string(),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            temperature,
            max_tokens,
            timeout_secs,
        })
    }

    /// Configuration with every setting at its default except the key.
    pub fn with_defaults(api_key: String) -> SummaryResult<Self> {
        Self::new(
            api_key,
            DEFAULT_MODEL.to_string(),
            DEFAULT_BASE_URL.to_string(),
            DEFAULT_TEMPERATURE,
            DEFAULT_MAX_TOKENS,
            DEFAULT_TIMEOUT_SECS,
        )
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}

impl fmt::Debug for SummaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummaryConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Build a [`SummaryConfig`] from optional raw values (typically environment variables).
///
/// Missing or blank optional values fall back to the defaults.
///
/// # Errors
///
/// Returns [`SummaryError::MissingApiKey`] if the key is missing, and [`SummaryError::Config`]
/// if a numeric value does not parse or is out of range.
pub fn resolve_config(
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    temperature: Option<String>,
    max_tokens: Option<String>,
) -> SummaryResult<SummaryConfig> {
    let api_key = non_empty(api_key).ok_or(SummaryError::MissingApiKey)?;

    let temperature = non_empty(temperature)
        .map(|v| {
            v.parse::<f32>()
                .map_err(|_| SummaryError::Config(format!("invalid temperature '{v}'")))
        })
        .transpose()?
        .unwrap_or(DEFAULT_TEMPERATURE);

    let max_tokens = non_empty(max_tokens)
        .map(|v| {
            v.parse::<u32>()
                .map_err(|_| SummaryError::Config(format!("invalid max tokens '{v}'")))
        })
        .transpose()?
        .unwrap_or(DEFAULT_MAX_TOKENS);

    SummaryConfig::new(
        api_key,
        non_empty(model).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        non_empty(base_url).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        temperature,
        max_tokens,
        DEFAULT_TIMEOUT_SECS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_values_missing() {
        let config = resolve_config(Some("sk-test".into()), None, Some("  ".into()), None, None)
            .expect("config");
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.max_tokens(), DEFAULT_MAX_TOKENS);
        assert!((config.temperature() - DEFAULT_TEMPERATURE).abs() < f32::EPSILON);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = resolve_config(
            Some("sk-test".into()),
            Some("gpt-4o".into()),
            Some("http://localhost:8080/v1/".into()),
            Some("0.2".into()),
            Some("1200".into()),
        )
        .expect("config");
        assert_eq!(config.model(), "gpt-4o");
        assert_eq!(config.base_url(), "http://localhost:8080/v1");
        assert_eq!(config.max_tokens(), 1200);
    }

    #[test]
    fn missing_key_is_rejected() {
        let err = resolve_config(None, None, None, None, None).expect_err("no key");
        assert!(matches!(err, SummaryError::MissingApiKey));

        assert!(matches!(
            SummaryConfig::with_defaults("   ".into()),
            Err(SummaryError::MissingApiKey)
        ));
    }

    #[test]
    fn rejects_bad_numbers() {
        let key = || Some("sk-test".to_string());
        assert!(resolve_config(key(), None, None, Some("warm".into()), None).is_err());
        assert!(resolve_config(key(), None, None, Some("3.5".into()), None).is_err());
        assert!(resolve_config(key(), None, None, None, Some("-1".into())).is_err());
        assert!(resolve_config(key(), None, None, None, Some("0".into())).is_err());
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = SummaryConfig::with_defaults("sk-very-secret".into()).expect("config");
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
