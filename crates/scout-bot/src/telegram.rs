use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::TelegramConfig;
use crate::error::{AppError, AppResult};

// ============================================================================
// Telegram Bot API types
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// A reply queued for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub text: String,
    /// Attach the one-button reply keyboard
    pub with_keyboard: bool,
    /// Send with `parse_mode=Markdown`
    pub markdown: bool,
}

impl OutgoingMessage {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            with_keyboard: false,
            markdown: true,
        }
    }

    pub fn with_keyboard(mut self) -> Self {
        self.with_keyboard = true;
        self
    }

    /// The same message without entity parsing
    pub fn plain(mut self) -> Self {
        self.markdown = false;
        self
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<Value>,
}

// ============================================================================
// Telegram Client - long polling and replies
// ============================================================================

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_url: String,
    token: String,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> AppResult<Self> {
        tracing::debug!(api_url = %config.api_url, "Creating Telegram client");

        Ok(Self {
            client: Client::builder().build()?,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    /// Long-poll for message updates newer than `offset`.
    pub async fn get_updates(&self, offset: i64) -> AppResult<Vec<Update>> {
        let body = json!({
            "offset": offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"],
        });

        // The HTTP request must outlive the server-side poll
        let timeout = Duration::from_secs(self.poll_timeout_secs + 10);
        self.call("getUpdates", &body, timeout).await
    }

    pub async fn send_message(&self, message: &OutgoingMessage) -> AppResult<()> {
        let start = Instant::now();
        let request = SendMessageRequest {
            chat_id: message.chat_id,
            text: &message.text,
            parse_mode: message.markdown.then_some("Markdown"),
            disable_web_page_preview: true,
            reply_markup: message.with_keyboard.then(check_keyboard),
        };

        let _: Value = self
            .call("sendMessage", &request, Duration::from_secs(30))
            .await?;

        tracing::debug!(
            chat_id = %message.chat_id,
            chars = %message.text.len(),
            duration_ms = %start.elapsed().as_millis(),
            "Sent message"
        );
        Ok(())
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            // The URL carries the bot token
            .map_err(|e| AppError::Http(e.without_url()))?;

        let status = response.status();
        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            AppError::Telegram(format!(
                "{} returned undecodable body ({}): {}",
                method,
                status,
                e.without_url()
            ))
        })?;

        if !envelope.ok {
            let description = envelope.description.unwrap_or_default();
            if description.contains("can't parse entities") {
                return Err(AppError::MarkdownRejected(description));
            }
            return Err(AppError::Telegram(format!(
                "{} failed ({}): {}",
                method, status, description
            )));
        }

        envelope
            .result
            .ok_or_else(|| AppError::Telegram(format!("{} returned ok without result", method)))
    }
}

fn check_keyboard() -> Value {
    json!({
        "keyboard": [[{ "text": crate::format::CHECK_BUTTON }]],
        "resize_keyboard": true,
    })
}
