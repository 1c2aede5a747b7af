//! Server Configuration

use std::time::Duration;

use camp_payments::{OrchestratorConfig, PollConfig};

/// Server settings, read from the environment
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Public URL of this API, used in gateway notification URLs
    pub public_base_url: String,

    /// Page the payer returns to after the payment page
    pub return_url: String,

    /// Recipient of booking notices
    pub operator_email: String,

    /// Fall back to the mock gateway when Saferpay is not configured
    pub local: bool,

    /// Background status polling after initiate, if enabled
    pub poll: Option<PollConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            public_base_url: "http://localhost:3000".into(),
            return_url: "http://localhost:3000/payment/complete".into(),
            operator_email: "camp@example.ch".into(),
            local: false,
            poll: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let public_base_url =
            std::env::var("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url);
        let return_url = std::env::var("PAYMENT_RETURN_URL").unwrap_or_else(|_| {
            format!("{}/payment/complete", public_base_url.trim_end_matches('/'))
        });

        let poll_enabled = std::env::var("PAYMENT_POLL_ENABLED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(false);
        let poll = poll_enabled.then(|| {
            let fallback = PollConfig::default();
            PollConfig {
                interval: std::env::var("PAYMENT_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map_or(fallback.interval, Duration::from_secs),
                max_attempts: std::env::var("PAYMENT_POLL_ATTEMPTS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(fallback.max_attempts),
            }
        });

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            public_base_url,
            return_url,
            operator_email: std::env::var("OPERATOR_EMAIL").unwrap_or(defaults.operator_email),
            local: std::env::var("APP_ENV").is_ok_and(|env| env.eq_ignore_ascii_case("local")),
            poll,
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            return_url: self.return_url.clone(),
            public_api_url: self.public_base_url.clone(),
            ..Default::default()
        }
    }
}
