//! Login, registration, OAuth callback, and logout.
//!
//! These are the only places a token pair is written from scratch. Every
//! call here goes to the backend unauthenticated; the refresh-and-replay
//! logic of the gateway never applies to the token endpoints.

use keyward_common::models::{LoginRequest, Profile, RegisterRequest, TokenPair};
use keyward_common::validation::validate_request;
use serde_json::Value;
use tracing::info;
use url::form_urlencoded;

use crate::error::Result;
use crate::gateway::{AuthGateway, PendingRequest};

pub const TOKEN_PATH: &str = "/auth/token/";
pub const REGISTER_PATH: &str = "/auth/register/";
pub const GOOGLE_CALLBACK_PATH: &str = "/auth/google/callback/";

pub const LOGIN_FAILED: &str = "Login failed. Please try again.";
pub const REGISTER_FAILED: &str = "Register failed. Please try again.";

#[derive(Clone)]
pub struct AuthClient {
    gateway: AuthGateway,
}

impl AuthClient {
    pub fn new(gateway: AuthGateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &AuthGateway {
        &self.gateway
    }

    /// Exchange credentials for a token pair and store it.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair> {
        let form = LoginRequest::new(email, password);
        validate_request(&form)?;

        let request = PendingRequest::post(TOKEN_PATH).json(&form)?;
        let pair: TokenPair = self.gateway.send_anonymous(&request).await?.json().await?;
        self.gateway.store().set_tokens(&pair).await?;

        info!("logged in");
        Ok(pair)
    }

    /// Create an account. Returns the created resource; no tokens are issued.
    pub async fn register(&self, email: &str, password: &str, profile: Profile) -> Result<Value> {
        let form = RegisterRequest::new(email, password, profile);
        validate_request(&form)?;

        let request = PendingRequest::post(REGISTER_PATH).json(&form)?;
        let created: Value = self.gateway.send_anonymous(&request).await?.json().await?;

        info!("registered new account");
        Ok(created)
    }

    /// Register, then log in with the same credentials.
    pub async fn register_and_login(
        &self,
        email: &str,
        password: &str,
        profile: Profile,
    ) -> Result<TokenPair> {
        self.register(email, password, profile).await?;
        self.login(email, password).await
    }

    /// Finish the Google OAuth handshake with the `code` Google returned.
    pub async fn google_login(&self, code: &str) -> Result<TokenPair> {
        let encoded: String = form_urlencoded::byte_serialize(code.as_bytes()).collect();
        let request = PendingRequest::get(format!("{GOOGLE_CALLBACK_PATH}?code={encoded}"));
        let pair: TokenPair = self.gateway.send_anonymous(&request).await?.json().await?;
        self.gateway.store().set_tokens(&pair).await?;

        info!("logged in with google");
        Ok(pair)
    }

    pub async fn logout(&self) -> Result<()> {
        self.gateway.store().clear().await?;
        info!("logged out");
        Ok(())
    }
}

/// Where to send the user after a successful login: the destination the
/// session guard intercepted, or the root.
pub fn redirect_after_login(from: Option<&str>) -> String {
    match from {
        Some(path) if !path.is_empty() => path.to_owned(),
        _ => "/".to_owned(),
    }
}
