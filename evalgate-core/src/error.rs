use thiserror::Error;

use crate::config::ConfigError;
use crate::relay::RelayError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type GatewayResult<T> = Result<T, Error>;

impl Error {
    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Error::InvalidRequest(message.into())
    }
}
