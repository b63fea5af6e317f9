//! Configuration loading and validation for the SupportFlow backend.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is present but invalid.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::server::throttle::RateLimit;

/// Validated service configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// 64 hex characters (32 bytes). Absent or blank runs in passthrough mode.
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// Google Gemini API key. Gemini answers `/api/chat` first when set.
    #[serde(default)]
    pub google_gemini_api_key: Option<String>,

    /// HuggingFace Inference API key, used when Gemini is not configured.
    #[serde(default)]
    pub huggingface_api_key: Option<String>,

    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP endpoint for span export. Spans are only exported when set.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Requests allowed per client per window on `/api/`.
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: usize,

    /// Rate limit window length in seconds.
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: u64,

    /// Take the client address from the last `X-Forwarded-For` hop.
    #[serde(default = "default_trust_forwarded_for")]
    pub trust_forwarded_for: bool,
}

fn default_port() -> u16 {
    10000
}
fn default_log_level() -> String {
    "info".into()
}
fn default_rate_limit_max_requests() -> usize {
    30
}
fn default_rate_limit_window() -> u64 {
    60
}
fn default_trust_forwarded_for() -> bool {
    true
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// The OTLP endpoint, if one is configured and non-blank.
    pub fn otlp_endpoint(&self) -> Option<&str> {
        self.otel_exporter_otlp_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn rate_limit(&self) -> RateLimit {
        RateLimit {
            max_requests: self.rate_limit_max_requests,
            window: Duration::from_secs(self.rate_limit_window_secs),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("PORT must be a non-zero port number");
        }
        if self.log_level.trim().is_empty() {
            anyhow::bail!("LOG_LEVEL must not be empty");
        }
        if self.rate_limit_max_requests == 0 {
            anyhow::bail!("RATE_LIMIT_MAX_REQUESTS must be > 0");
        }
        if self.rate_limit_window_secs == 0 {
            anyhow::bail!("RATE_LIMIT_WINDOW_SECS must be > 0");
        }
        Ok(())
    }
}

// Secrets are never printed, only whether one was supplied.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "google_gemini_api_key",
                &self.google_gemini_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "huggingface_api_key",
                &self.huggingface_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("otel_exporter_otlp_endpoint", &self.otel_exporter_otlp_endpoint)
            .field("rate_limit_max_requests", &self.rate_limit_max_requests)
            .field("rate_limit_window_secs", &self.rate_limit_window_secs)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            encryption_key: None,
            google_gemini_api_key: None,
            huggingface_api_key: None,
            port: default_port(),
            log_level: default_log_level(),
            otel_exporter_otlp_endpoint: None,
            rate_limit_max_requests: default_rate_limit_max_requests(),
            rate_limit_window_secs: default_rate_limit_window(),
            trust_forwarded_for: default_trust_forwarded_for(),
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_port(), 10000);
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_rate_limit_max_requests(), 30);
        assert_eq!(default_rate_limit_window(), 60);
        assert!(default_trust_forwarded_for());
    }

    #[test]
    fn defaults_validate() {
        assert!(base().validate().is_ok());
        assert_eq!(base().rate_limit(), RateLimit::default());
    }

    #[test]
    fn validate_rejects_zero_port() {
        let cfg = Config { port: 0, ..base() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_window() {
        let cfg = Config {
            rate_limit_window_secs: 0,
            ..base()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_budget() {
        let cfg = Config {
            rate_limit_max_requests: 0,
            ..base()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn blank_otlp_endpoint_is_ignored() {
        let cfg = Config {
            otel_exporter_otlp_endpoint: Some("  ".into()),
            ..base()
        };
        assert_eq!(cfg.otlp_endpoint(), None);

        let cfg = Config {
            otel_exporter_otlp_endpoint: Some("http://collector:4317".into()),
            ..base()
        };
        assert_eq!(cfg.otlp_endpoint(), Some("http://collector:4317"));
    }

    #[test]
    fn debug_redacts_keys() {
        let cfg = Config {
            encryption_key: Some("ab".repeat(32)),
            google_gemini_api_key: Some("gemini-secret".into()),
            huggingface_api_key: Some("hf-secret".into()),
            ..base()
        };
        let shown = format!("{cfg:?}");
        assert!(shown.contains("[REDACTED]"));
        assert!(!shown.contains(&"ab".repeat(32)));
        assert!(!shown.contains("gemini-secret"));
        assert!(!shown.contains("hf-secret"));
    }
}
