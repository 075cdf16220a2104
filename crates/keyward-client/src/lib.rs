//! Keyward session client.
//!
//! Three pieces cooperate around one persisted token pair:
//!
//! - [`TokenStore`] holds the access and refresh tokens.
//! - [`AuthGateway`] attaches the access token to every outbound request and,
//!   on a 401, refreshes once and replays the request.
//! - [`SessionGuard`] decides whether a protected destination may be entered,
//!   refreshing an expired access token first.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use keyward_client::{AuthClient, AuthGateway, MemoryTokenStore};
//!
//! #[tokio::main]
//! async fn main() -> keyward_client::Result<()> {
//!     let gateway = AuthGateway::builder()
//!         .base_url("http://localhost:8000")
//!         .store(Arc::new(MemoryTokenStore::new()))
//!         .build()?;
//!
//!     AuthClient::new(gateway.clone())
//!         .login("a@b.com", "longenough1")
//!         .await?;
//!
//!     let me: serde_json::Value = gateway.get("/auth/test").await?;
//!     println!("{me}");
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod oauth;
pub mod store;

pub use auth::AuthClient;
pub use error::{ClientError, Result};
pub use gateway::{AuthGateway, AuthGatewayBuilder, PendingRequest};
pub use guard::{GuardOutcome, GuardState, SessionGuard};
pub use keyward_common::models::TokenPair;
pub use reqwest::Method;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
