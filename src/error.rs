use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("image payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to decode image: {0}")]
    Image(String),
    #[error("decoded image has zero size")]
    Empty,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("no landmark provider became available within {0:?}")]
    ProviderBusy(Duration),
    #[error("landmark provider failed: {0:#}")]
    Provider(#[source] anyhow::Error),
}
