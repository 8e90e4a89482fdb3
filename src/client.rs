use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Settings;
use crate::error::TransportError;

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

/// Answer returned by `POST /chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,
    pub timestamp: String,
}

/// One record of `GET /history`. Only `question` is interpreted; any other
/// field the backend sends is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub question: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryRecord>,
}

/// Body of `DELETE /history`; `Null` when the server sends nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct ClearAck(pub serde_json::Value);

/// The three remote operations the conversation store depends on.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn send(&self, message: &str) -> Result<ChatReply, TransportError>;

    async fn fetch_history(&self) -> Result<HistoryResponse, TransportError>;

    async fn clear_history(&self) -> Result<ClearAck, TransportError>;
}

/// HTTP client for the chat backend. Stateless apart from the connection
/// pool; cloning is cheap.
#[derive(Clone, Debug)]
pub struct ChatServiceClient {
    client: Client,
    base_url: String,
}

impl ChatServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, TransportError> {
        Self::new(&settings.api_url, settings.timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ChatService for ChatServiceClient {
    async fn send(&self, message: &str) -> Result<ChatReply, TransportError> {
        let url = self.url("/chat");
        log::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { message })
            .send()
            .await?;

        parse_json(response).await
    }

    async fn fetch_history(&self) -> Result<HistoryResponse, TransportError> {
        let url = self.url("/history");
        log::debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        parse_json(response).await
    }

    async fn clear_history(&self) -> Result<ClearAck, TransportError> {
        let url = self.url("/history");
        log::debug!("DELETE {}", url);

        let response = self.client.delete(&url).send().await?;
        let body = checked_body(response).await?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(ClearAck(serde_json::Value::Null));
        }
        Ok(ClearAck(serde_json::from_slice(&body)?))
    }
}

async fn checked_body(response: Response) -> Result<Vec<u8>, TransportError> {
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::status(status));
    }
    Ok(response.bytes().await?.to_vec())
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let body = checked_body(response).await?;
    Ok(serde_json::from_slice(&body)?)
}
