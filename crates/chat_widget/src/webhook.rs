//! Webhook client - the single outbound call per submitted message
//!
//! Speaks the Rasa REST channel contract: POST `{sender, message}` and get
//! back a JSON array of reply objects.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::config::WidgetConfig;
use crate::error::{Result, WidgetError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookRequest {
    pub sender: String,
    pub message: String,
}

impl WebhookRequest {
    /// Sender id is `<prefix><submission time in epoch ms>`.
    pub fn new(prefix: &str, message: impl Into<String>) -> Self {
        Self {
            sender: format!("{}{}", prefix, chrono::Utc::now().timestamp_millis()),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyButton {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub payload: String,
}

/// One item of the webhook's reply array. Only `text` is rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookReply {
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub buttons: Vec<ReplyButton>,
}

impl WebhookReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Field-by-field decode of one reply item. A field of the wrong type is
    /// treated as absent so it never costs the item its text.
    pub fn from_item(item: &Value) -> Option<Self> {
        let fields = item.as_object()?;
        let string = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);
        let buttons = fields
            .get("buttons")
            .and_then(Value::as_array)
            .map(|buttons| {
                buttons
                    .iter()
                    .filter_map(|b| serde_json::from_value::<ReplyButton>(b.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            recipient_id: string("recipient_id"),
            text: string("text"),
            image: string("image"),
            buttons,
        })
    }

    /// Text worth rendering, if any.
    pub fn display_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.is_empty())
    }
}

/// Decode a reply body. The body must be a JSON array; items that are not
/// objects are skipped.
pub fn parse_replies(body: &str) -> Result<Vec<WebhookReply>> {
    let items: Vec<Value> = serde_json::from_str(body)?;
    Ok(items.iter().filter_map(WebhookReply::from_item).collect())
}

#[async_trait]
pub trait WebhookClient: Send + Sync {
    async fn send(&self, request: &WebhookRequest) -> Result<Vec<WebhookReply>>;
}

#[derive(Debug, Clone)]
pub struct RestWebhookClient {
    client: Client,
    url: String,
}

impl RestWebhookClient {
    pub fn new(config: &WidgetConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            url: config.webhook_url.clone(),
        })
    }
}

#[async_trait]
impl WebhookClient for RestWebhookClient {
    async fn send(&self, request: &WebhookRequest) -> Result<Vec<WebhookReply>> {
        debug!("POST {} as {}", self.url, request.sender);
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach webhook: {}", e);
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("Webhook returned {}", status);
            return Err(WidgetError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let replies = parse_replies(&body)?;
        debug!("Webhook returned {} replies", replies.len());
        Ok(replies)
    }
}
