//! # Forwarding Relay
//!
//! Re-issues a validated request to an internal evaluation endpoint and hands
//! back the endpoint's status and body unchanged. The relay never retries: a
//! call that cannot be completed becomes an [`FailureKind::InternalError`]
//! outcome for this request.

use reqwest::Client;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RelayConfig;
use crate::normalize::truncate_detail;
use crate::outcome::{Evaluation, FailureKind};

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("evaluation endpoint did not respond: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to read evaluation endpoint response: {0}")]
    Body(#[source] reqwest::Error),
}

pub type RelayResult<T> = Result<T, RelayError>;

#[derive(Debug, Clone, PartialEq)]
pub enum RelayReply {
    /// The endpoint answered; status and body are passed through.
    Forwarded { status: u16, body: Value },
    /// The gateway had to answer on the endpoint's behalf.
    Failed(Evaluation),
}

#[derive(Debug, Clone)]
pub struct Relay {
    client: Client,
    endpoint: String,
    detail_limit: usize,
}

impl Relay {
    pub fn new(config: &RelayConfig, detail_limit: usize) -> RelayResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(RelayError::Client)?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            detail_limit,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn forward(&self, body: &Value) -> RelayReply {
        match self.exchange(body).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(endpoint = %self.endpoint, "relay failed: {}", err);
                RelayReply::Failed(Evaluation::rejected(
                    FailureKind::InternalError,
                    "Failed to process request",
                    truncate_detail(&err.to_string(), self.detail_limit),
                ))
            }
        }
    }

    async fn exchange(&self, body: &Value) -> RelayResult<RelayReply> {
        debug!(endpoint = %self.endpoint, "forwarding request");
        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(RelayError::Transport)?;

        let status = response.status();
        let text = response.text().await.map_err(RelayError::Body)?;
        debug!(status = status.as_u16(), bytes = text.len(), "evaluation endpoint answered");

        let reply = match serde_json::from_str::<Value>(&text) {
            Ok(body) => RelayReply::Forwarded {
                status: status.as_u16(),
                body,
            },
            Err(_) if status.is_success() => RelayReply::Failed(Evaluation::rejected(
                FailureKind::OutputUnparsable,
                "evaluation endpoint returned a non-JSON body",
                truncate_detail(&text, self.detail_limit),
            )),
            Err(_) => {
                warn!(status = status.as_u16(), "evaluation endpoint error without JSON body");
                RelayReply::Forwarded {
                    status: status.as_u16(),
                    body: json!({
                        "error": "upstream evaluation error",
                        "status": status.as_u16(),
                        "details": truncate_detail(&text, self.detail_limit),
                    }),
                }
            }
        };
        Ok(reply)
    }
}
