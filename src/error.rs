use reqwest::StatusCode;
use thiserror::Error;

/// Failure of one provider fetch
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("{provider} request timed out")]
    Timeout { provider: &'static str },

    #[error("{provider} API error: {status} - {body}")]
    Status {
        provider: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{provider} returned an error: {message}")]
    Upstream {
        provider: &'static str,
        message: String,
    },

    #[error("missing {0} credentials")]
    MissingCredentials(&'static str),

    #[error("{provider} fetch panicked")]
    Panicked { provider: &'static str },
}

impl FetchError {
    /// Classify a transport error, keeping timeouts distinct
    pub fn from_reqwest(provider: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { provider }
        } else {
            FetchError::Http(err)
        }
    }

    pub fn upstream(provider: &'static str, message: impl Into<String>) -> Self {
        FetchError::Upstream {
            provider,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
