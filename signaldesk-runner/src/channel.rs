//! Messaging channel seam and the Telegram Bot API implementation.
//!
//! The channel enforces a hard payload limit, which is why reports are
//! chunked before sending. Authentication and connection handling stay
//! inside the implementation; callers only see `send`.

use std::time::Duration;

use serde::Deserialize;

use crate::error::DeliveryError;
use crate::report::MESSAGE_SIZE_LIMIT;

/// How the channel should interpret the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint {
    Plain,
    Html,
}

/// Delivers one text message to one destination.
pub trait MessageChannel {
    /// Human-readable name of this channel.
    fn name(&self) -> &str;

    fn send(&self, destination: &str, text: &str, format: FormatHint) -> Result<(), DeliveryError>;
}

impl<C: MessageChannel + ?Sized> MessageChannel for &C {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn send(&self, destination: &str, text: &str, format: FormatHint) -> Result<(), DeliveryError> {
        (**self).send(destination, text, format)
    }
}

impl<C: MessageChannel + ?Sized> MessageChannel for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn send(&self, destination: &str, text: &str, format: FormatHint) -> Result<(), DeliveryError> {
        (**self).send(destination, text, format)
    }
}

// ─── Telegram ───────────────────────────────────────────────────────

/// Public Bot API endpoint.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends messages through the Telegram Bot API `sendMessage` method.
pub struct TelegramChannel {
    client: reqwest::blocking::Client,
    api_base: String,
    bot_token: String,
    max_len: usize,
}

impl TelegramChannel {
    pub fn new(bot_token: impl Into<String>) -> Result<Self, DeliveryError> {
        Self::with_api_base(bot_token, TELEGRAM_API_BASE)
    }

    /// Use a different Bot API server (self-hosted server, test double).
    pub fn with_api_base(
        bot_token: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Result<Self, DeliveryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            max_len: MESSAGE_SIZE_LIMIT,
        })
    }

    /// Override the local payload limit check.
    ///
    /// The limit counts characters of the raw HTML text, tags and `&amp;`-style
    /// escapes included. The Bot API applies its limit after parsing entities,
    /// so this check is stricter than the server's, never looser.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    /// JSON body for `sendMessage`.
    pub fn message_body(chat_id: &str, text: &str, format: FormatHint) -> serde_json::Value {
        match format {
            FormatHint::Html => serde_json::json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML"
            }),
            FormatHint::Plain => serde_json::json!({
                "chat_id": chat_id,
                "text": text
            }),
        }
    }

    /// Strip the bot token from transport error text.
    fn redact(&self, message: String) -> String {
        if self.bot_token.is_empty() {
            return message;
        }
        message.replace(&self.bot_token, "<redacted>")
    }
}

impl MessageChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn send(&self, destination: &str, text: &str, format: FormatHint) -> Result<(), DeliveryError> {
        let len = text.chars().count();
        if len > self.max_len {
            return Err(DeliveryError::TooLarge {
                len,
                limit: self.max_len,
            });
        }

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&Self::message_body(destination, text, format))
            .send()
            .map_err(|e| DeliveryError::Transport(self.redact(e.without_url().to_string())))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| DeliveryError::Transport(self.redact(e.without_url().to_string())))?;
        let parsed: Option<ApiResponse> = serde_json::from_str(&body).ok();

        match parsed {
            Some(api) if status.is_success() && api.ok => Ok(()),
            Some(api) => Err(DeliveryError::Rejected {
                status: status.as_u16(),
                description: api.description.unwrap_or_else(|| "no description".into()),
            }),
            None => Err(DeliveryError::Rejected {
                status: status.as_u16(),
                description: body,
            }),
        }
    }
}
