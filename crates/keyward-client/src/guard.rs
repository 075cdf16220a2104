//! Session guard for protected destinations.
//!
//! A guard runs one check per mount: `Checking` resolves to `Authorized` or
//! `Unauthorized`. An expired access token is refreshed before access is
//! granted. There is no background timer; a new navigation means a new check.

use keyward_common::claims::{self, ExpiryClaim};
use tracing::{debug, info};

use crate::error::{ClientError, Result};
use crate::gateway::AuthGateway;

pub const DEFAULT_LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Authorized,
    Unauthorized,
}

/// What the caller should do with the navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Render the protected destination.
    Granted { destination: String },
    /// Send the user to `to`, remembering where they were headed.
    Redirect { to: String, from: String },
}

impl GuardOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

pub struct SessionGuard {
    gateway: AuthGateway,
    login_path: String,
    state: GuardState,
}

impl SessionGuard {
    pub fn new(gateway: AuthGateway) -> Self {
        Self {
            gateway,
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
            state: GuardState::Checking,
        }
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Check the session for a navigation to `destination` at the current time.
    pub async fn check(&mut self, destination: &str) -> GuardOutcome {
        self.check_at(destination, chrono::Utc::now().timestamp())
            .await
    }

    /// Check the session as of `now` (Unix seconds).
    pub async fn check_at(&mut self, destination: &str, now: i64) -> GuardOutcome {
        self.state = GuardState::Checking;
        self.state = match self.authorize(now).await {
            Ok(()) => GuardState::Authorized,
            Err(e) => {
                debug!(destination, error = %e, "session check failed");
                GuardState::Unauthorized
            }
        };

        match self.state {
            GuardState::Authorized => GuardOutcome::Granted {
                destination: destination.to_owned(),
            },
            _ => GuardOutcome::Redirect {
                to: self.login_path.clone(),
                from: destination.to_owned(),
            },
        }
    }

    async fn authorize(&self, now: i64) -> Result<()> {
        let token = self
            .gateway
            .store()
            .access_token()
            .await?
            .ok_or(ClientError::Unauthorized { detail: None })?;

        let expiry: ExpiryClaim = claims::decode_expiry(&token)
            .map_err(|e| ClientError::MalformedToken(e.to_string()))?;

        if claims::is_live(expiry, now) {
            return Ok(());
        }

        info!(exp = expiry.exp, now, "access token expired, refreshing");
        self.gateway.refresh_if_stale(Some(&token)).await?;
        Ok(())
    }
}
