//! Notification sink - Pushover client
//!
//! Every message is also mirrored to the log, so the console shows the same
//! stream the push channel receives. Delivery failures are errors for the
//! caller to log; there is no retry.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::NotifyConfig;

/// Sink for user-facing notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<()>;
}

/// Pushover push-notification client.
pub struct PushoverNotifier {
    client: Client,
    base_url: String,
    app_token: String,
    user_key: String,
}

impl PushoverNotifier {
    pub fn new(cfg: &NotifyConfig, app_token: String, user_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            app_token,
            user_key,
        }
    }

    /// Build from the PUSHOVER_APP_TOKEN / PUSHOVER_USER_KEY environment
    /// variables.
    pub fn from_env(cfg: &NotifyConfig) -> Result<Self> {
        let app_token =
            std::env::var("PUSHOVER_APP_TOKEN").context("PUSHOVER_APP_TOKEN is not set")?;
        let user_key =
            std::env::var("PUSHOVER_USER_KEY").context("PUSHOVER_USER_KEY is not set")?;
        Ok(Self::new(cfg, app_token, user_key))
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        tracing::info!(%message, "notify");

        let url = format!("{}/1/messages.json", self.base_url);
        let params = [
            ("token", self.app_token.as_str()),
            ("user", self.user_key.as_str()),
            ("message", message),
        ];

        let resp = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .context("push request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("push rejected with {}: {}", status, body);
        }

        Ok(())
    }
}
