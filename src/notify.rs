// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use crate::config::Config;
use crate::error::{CheckinError, CheckinResult};

/// Title of every notification.
pub const NOTIFY_TITLE: &str = "班级魔法签到结果";

/// Destination of the outcome messages.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, content: &str) -> CheckinResult<()>;
}

#[derive(serde::Serialize)]
struct PushPlusMessage<'a> {
    token: &'a str,
    title: &'a str,
    content: &'a str,
}

/// Notifier backed by the PushPlus service.
pub struct PushPlus {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl PushPlus {
    /// Create the notifier, or return `None` if no token is configured.
    pub fn from_config(config: &Config) -> CheckinResult<Option<Self>> {
        let token = match &config.pushplus_token {
            Some(token) => token.clone(),
            None => return Ok(None),
        };
        let client =
            crate::portal::client_builder(config.notify_timeout, &config.notify_url).build()?;
        Ok(Some(Self {
            client,
            url: config.notify_url.clone(),
            token,
        }))
    }
}

#[async_trait::async_trait]
impl Notifier for PushPlus {
    async fn send(&self, content: &str) -> CheckinResult<()> {
        let message = PushPlusMessage {
            token: &self.token,
            title: NOTIFY_TITLE,
            content,
        };
        let response = self.client.post(&self.url).json(&message).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CheckinError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        // the service reports application errors with a code in the body
        let body = response.text().await?;
        if let Ok(reply) = serde_json::from_str::<serde_json::Value>(&body) {
            if let Some(code) = reply.get("code").and_then(|x| x.as_i64()) {
                if code != 200 {
                    let msg = reply
                        .get("msg")
                        .and_then(|x| x.as_str())
                        .unwrap_or_default();
                    return Err(CheckinError::Rejected(format!("code {}: {}", code, msg)));
                }
            }
        }
        Ok(())
    }
}

/// Local wall-clock time, as shown in console lines and notifications.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Send `message` with the current time appended.
///
/// Nothing is sent without a notifier, and failures are only logged.
pub async fn notify_outcome(notifier: Option<&dyn Notifier>, message: &str) {
    let notifier = match notifier {
        Some(notifier) => notifier,
        None => return,
    };
    log::info!("sending notification");
    let content = format!("{}\n时间: {}", message, timestamp());
    if let Err(err) = notifier.send(&content).await {
        log::warn!("notification failed: {}", err);
    }
}
