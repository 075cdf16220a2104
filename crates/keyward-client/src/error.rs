//! Error types for the session client.

use keyward_common::error::KeywardError;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected the credentials (HTTP 401).
    #[error("Unauthorized: {}", .detail.as_deref().unwrap_or("no detail"))]
    Unauthorized { detail: Option<String> },

    /// Any other non-2xx status. Never intercepted or retried.
    #[error("API error {status}: {message}")]
    Api {
        status: u16,
        message: String,
        detail: Option<String>,
    },

    /// An error from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The access token could not be decoded.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// A refresh was needed but no refresh token is stored.
    #[error("No refresh token stored")]
    MissingRefreshToken,

    /// The token store could not be read or written.
    #[error("Token store error: {0}")]
    Store(String),

    /// The form failed client-side validation.
    #[error(transparent)]
    Validation(#[from] KeywardError),

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Build an error from a non-2xx response, pulling the backend's
    /// `detail` string out of the body when there is one.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_owned));

        if status == StatusCode::UNAUTHORIZED {
            return Self::Unauthorized { detail };
        }

        let message = match (&detail, text.is_empty()) {
            (Some(d), _) => d.clone(),
            (None, false) => text,
            (None, true) => status.to_string(),
        };
        Self::Api {
            status: status.as_u16(),
            message,
            detail,
        }
    }

    /// HTTP status carried by this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// The inline message shown to a user after a failed form submission:
    /// the backend's `detail` when present, otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Unauthorized { detail: Some(d) } | Self::Api { detail: Some(d), .. } => {
                d.clone()
            }
            Self::Validation(KeywardError::Validation { message }) => message.clone(),
            _ => fallback.to_owned(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
