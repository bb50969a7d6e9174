//! Error types for mc-notify

use thiserror::Error;

/// mc-notify error type
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Bot token not configured")]
    TokenNotSet,

    #[error("Team chat not configured")]
    ChatNotSet,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::ApiError),

    #[error("Request error: {0}")]
    Request(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Wake endpoint returned {status}: {body}")]
    WakeRejected { status: u16, body: String },

    #[error("Core error: {0}")]
    Core(#[from] mc_core::Error),
}

impl NotifyError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::TokenNotSet | Self::ChatNotSet | Self::Config(_))
    }
}

impl From<teloxide::RequestError> for NotifyError {
    fn from(err: teloxide::RequestError) -> Self {
        match err {
            teloxide::RequestError::Api(api_err) => NotifyError::Telegram(api_err),
            _ => NotifyError::Request(err.to_string()),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, NotifyError>;
