//! Runtime configuration.
//!
//! Loaded once at process start and threaded through every subsystem by
//! `Arc`, the same way `rvoip_call_engine::config::CallCenterConfig` groups
//! its settings into nested sections (`general`, `routing`, ...). Here the
//! sections are `general`, `providers`, and `webhooks`.

use std::time::Duration;

/// Top-level configuration for the dialer engine.
#[derive(Debug, Clone)]
pub struct DialerConfig {
    pub general: GeneralConfig,
    pub providers: ProviderConfig,
    pub webhooks: WebhookConfig,
}

#[derive(Debug, Clone)]
pub struct GeneralConfig {
    /// Base URL used when a campaign omits a webhook URL.
    pub public_url: Option<String>,
    /// Fallback outbound caller id.
    pub default_caller_id: Option<String>,
    /// How often the dispatch tick fires (1-5s per spec; default 2s).
    pub scheduler_tick_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// STT/TTS credential; `None` disables STT for new sessions.
    pub speech_api_key: Option<String>,
    /// STT result callback URL; `None` disables STT for new sessions.
    pub speech_webhook_url: Option<String>,
    /// Hard timeout for telephony place-call RPCs.
    pub telephony_timeout: Duration,
    /// Hard timeout for STT async submission.
    pub stt_submit_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// HMAC key for signing outbound webhooks. Absent means the literal
    /// `default-secret` is used, with a warning logged at startup.
    pub signing_secret: Option<String>,
    /// Timeout for outbound webhook POSTs.
    pub post_timeout: Duration,
}

pub const DEFAULT_SIGNING_SECRET: &str = "default-secret";

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig {
                public_url: None,
                default_caller_id: None,
                scheduler_tick_interval: Duration::from_secs(2),
            },
            providers: ProviderConfig {
                speech_api_key: None,
                speech_webhook_url: None,
                telephony_timeout: Duration::from_secs(30),
                stt_submit_timeout: Duration::from_secs(10),
            },
            webhooks: WebhookConfig {
                signing_secret: None,
                post_timeout: Duration::from_secs(5),
            },
        }
    }
}

impl DialerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.general.public_url = std::env::var("PUBLIC_URL").ok();
        config.general.default_caller_id = std::env::var("DEFAULT_CALLER_ID").ok();

        config.providers.speech_api_key = std::env::var("ELEVENLABS_API_KEY").ok();
        config.providers.speech_webhook_url = std::env::var("ELEVENLABS_WEBHOOK_URL").ok();

        config.webhooks.signing_secret = std::env::var("WEBHOOK_SIGNING_SECRET").ok();
        if config.webhooks.signing_secret.is_none() {
            tracing::warn!("WEBHOOK_SIGNING_SECRET not set, falling back to default-secret");
        }

        config
    }

    /// The effective signing secret (never empty).
    pub fn signing_secret(&self) -> &str {
        self.webhooks
            .signing_secret
            .as_deref()
            .unwrap_or(DEFAULT_SIGNING_SECRET)
    }

    /// Whether speech-to-text/text-to-speech is usable for new sessions.
    pub fn speech_enabled(&self) -> bool {
        self.providers.speech_api_key.is_some() && self.providers.speech_webhook_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_signing_secret_is_literal() {
        let config = DialerConfig::default();
        assert_eq!(config.signing_secret(), DEFAULT_SIGNING_SECRET);
    }

    #[test]
    fn speech_disabled_without_both_settings() {
        let mut config = DialerConfig::default();
        assert!(!config.speech_enabled());
        config.providers.speech_api_key = Some("key".into());
        assert!(!config.speech_enabled());
        config.providers.speech_webhook_url = Some("https://example.com/hook".into());
        assert!(config.speech_enabled());
    }
}
