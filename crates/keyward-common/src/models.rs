//! Wire types for the token, refresh, registration, and OAuth endpoints.
//!
//! Field names match the backend's JSON exactly (`access`, `refresh`,
//! `email`, `password`, `profile`).

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Access + refresh token pair issued by the token and OAuth endpoints.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

// Tokens are bearer credentials; keep them out of logs and panic messages.
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Login form, sent as-is to `POST /auth/token/`.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct LoginRequest {
    #[validate(regex(path = *EMAIL_REGEX, message = "Invalid email"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password should include at least 8 characters"))]
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Profile data submitted alongside a registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Registration form, sent to `POST /auth/register/`.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct RegisterRequest {
    #[validate(regex(path = *EMAIL_REGEX, message = "Invalid email"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password should include at least 8 characters"))]
    pub password: String,

    pub profile: Profile,
}

impl RegisterRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>, profile: Profile) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            profile,
        }
    }
}

/// Body of `POST /auth/token/refresh/`.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Refresh endpoint response. The backend rotates refresh tokens, but a
/// non-rotating deployment only returns `access`.
#[derive(Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

static EMAIL_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^\S+@\S+$").unwrap());
