//! Messaging-channel client for remote control.
//!
//! The agent subscribes to a Telegram-style bot HTTP API: long-polled
//! `getUpdates` for inbound text and document events, `sendMessage` for
//! replies, and `getFile`/file download for update archives. The shared
//! secret is the bot token from the settings file. An async client does the
//! work; a blocking facade over a current-thread runtime serves the
//! handler's synchronous loop.

use serde::Deserialize;

/// Seconds the server holds a long poll open before returning empty.
pub const POLL_TIMEOUT_SECS: u64 = 25;

/// Channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Bot API token (the shared secret of the channel).
    pub token: String,
    /// API host.
    pub api_base: String,
}

impl ChannelConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: "https://api.telegram.org".to_string(),
        }
    }

    /// Base URL for bot method calls.
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// URL for downloading a file by its server-side path.
    pub fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }
}

/// Transport error types.
#[derive(Debug)]
pub enum TransportError {
    /// Configuration error
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// The API answered with ok=false
    Api { status: u16, message: String },
    /// JSON decoding error
    Serialization(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Config(msg) => write!(f, "Channel config error: {msg}"),
            TransportError::Network(msg) => write!(f, "Channel network error: {msg}"),
            TransportError::Api { status, message } => {
                write!(f, "Channel API error ({status}): {message}")
            }
            TransportError::Serialization(msg) => {
                write!(f, "Channel serialization error: {msg}")
            }
        }
    }
}

impl std::error::Error for TransportError {}

/// Envelope wrapping every bot API response.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// One inbound update from the channel.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

/// An inbound message: text, an attached document, or both.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub document: Option<Document>,
}

/// The issuer identity replies go back to.
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// A file attachment event.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

/// Async channel client.
pub struct ChannelClient {
    config: ChannelConfig,
    client: reqwest::Client,
    device_id: String,
}

impl ChannelClient {
    /// Create a client. The HTTP timeout leaves headroom over the long-poll
    /// hold time.
    pub fn new(config: ChannelConfig) -> Result<Self, TransportError> {
        if config.token.is_empty() {
            return Err(TransportError::Config("API token is empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()
            .map_err(|e| TransportError::Config(format!("Failed to create HTTP client: {e}")))?;

        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let device_id = format!("agent-{}-{}", host, &uuid::Uuid::new_v4().to_string()[..8]);

        Ok(Self {
            config,
            client,
            device_id,
        })
    }

    /// Per-install identity, used in connection logs.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Drop any webhook so long polling can take over the update stream.
    pub async fn delete_webhook(&self) -> Result<(), TransportError> {
        self.call::<bool>("deleteWebhook", &[]).await.map(|_| ())
    }

    /// Long-poll for updates past `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        let offset_str = offset.to_string();
        let timeout_str = POLL_TIMEOUT_SECS.to_string();
        let params = [("offset", offset_str.as_str()), ("timeout", timeout_str.as_str())];
        self.call::<Vec<Update>>("getUpdates", &params).await
    }

    /// Send a text reply to the issuer.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        let chat_str = chat_id.to_string();
        let params = [("chat_id", chat_str.as_str()), ("text", text)];
        self.call::<serde_json::Value>("sendMessage", &params)
            .await
            .map(|_| ())
    }

    /// Download the bytes of an attached document.
    pub async fn download_document(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        let params = [("file_id", file_id)];
        let info = self.call::<FileInfo>("getFile", &params).await?;
        let file_path = info
            .file_path
            .ok_or_else(|| TransportError::Api {
                status: 200,
                message: "File path missing from getFile response".to_string(),
            })?;

        let response = self
            .client
            .get(self.config.file_url(&file_path))
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TransportError::Api {
                status: response.status().as_u16(),
                message: "File download failed".to_string(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .get(self.config.method_url(method))
            .query(params)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| TransportError::Serialization(e.to_string()))?;

        if !envelope.ok {
            return Err(TransportError::Api {
                status: status.as_u16(),
                message: envelope
                    .description
                    .unwrap_or_else(|| "Unknown error".to_string()),
            });
        }
        envelope.result.ok_or_else(|| TransportError::Api {
            status: status.as_u16(),
            message: "Missing result".to_string(),
        })
    }
}

/// Blocking channel client for use in synchronous contexts.
pub struct BlockingChannelClient {
    inner: ChannelClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingChannelClient {
    pub fn new(config: ChannelConfig) -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TransportError::Config(format!("Failed to create runtime: {e}")))?;
        Ok(Self {
            inner: ChannelClient::new(config)?,
            runtime,
        })
    }

    pub fn device_id(&self) -> &str {
        self.inner.device_id()
    }

    pub fn delete_webhook(&self) -> Result<(), TransportError> {
        self.runtime.block_on(self.inner.delete_webhook())
    }

    pub fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        self.runtime.block_on(self.inner.get_updates(offset))
    }

    pub fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        self.runtime.block_on(self.inner.send_message(chat_id, text))
    }

    pub fn download_document(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        self.runtime.block_on(self.inner.download_document(file_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_config_urls() {
        let config = ChannelConfig::new("123:abc");
        assert_eq!(
            config.method_url("getUpdates"),
            "https://api.telegram.org/bot123:abc/getUpdates"
        );
        assert_eq!(
            config.file_url("documents/update.zip"),
            "https://api.telegram.org/file/bot123:abc/documents/update.zip"
        );
    }

    #[test]
    fn test_empty_token_rejected() {
        let result = ChannelClient::new(ChannelConfig::new(""));
        assert!(matches!(result, Err(TransportError::Config(_))));
    }

    #[test]
    fn test_update_deserialization() {
        let json = r#"{
            "ok": true,
            "result": [{
                "update_id": 42,
                "message": {
                    "chat": {"id": 7},
                    "text": "/status"
                }
            }]
        }"#;
        let envelope: ApiEnvelope<Vec<Update>> = serde_json::from_str(json).unwrap();
        assert!(envelope.ok);
        let updates = envelope.result.unwrap();
        assert_eq!(updates[0].update_id, 42);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 7);
        assert_eq!(message.text.as_deref(), Some("/status"));
        assert!(message.document.is_none());
    }

    #[test]
    fn test_document_deserialization() {
        let json = r#"{
            "chat": {"id": 9},
            "document": {"file_id": "F1", "file_name": "update.zip"}
        }"#;
        let message: Message = serde_json::from_str(json).unwrap();
        let document = message.document.unwrap();
        assert_eq!(document.file_id, "F1");
        assert_eq!(document.file_name.as_deref(), Some("update.zip"));
    }
}
