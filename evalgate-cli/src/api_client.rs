use evalgate_core::wire::{Discovery, EvaluateBody};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API error: {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Status and JSON body of an evaluation call, success or not.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: u16,
    pub body: Value,
}

impl ApiReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self) -> String {
        format!("{}/api/evaluate", self.base_url)
    }

    /// Posts `body` for evaluation. Non-2xx answers are returned, not raised.
    pub async fn evaluate(&self, body: &EvaluateBody) -> ClientResult<ApiReply> {
        let url = self.url();
        debug!(%url, "sending evaluation request");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| ClientError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|source| ClientError::Http { url, source })?;
        let body = serde_json::from_str(&text).map_err(|_| ClientError::Decode(text))?;
        Ok(ApiReply { status, body })
    }

    pub async fn describe(&self) -> ClientResult<Discovery> {
        let url = self.url();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ClientError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| ClientError::Http { url, source })?;
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|err| ClientError::Decode(err.to_string()))
    }
}
