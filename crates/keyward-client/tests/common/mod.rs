//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use jsonwebtoken::{EncodingKey, Header, encode};
use keyward_client::{AuthGateway, MemoryTokenStore, TokenPair, TokenStore};
use serde::Serialize;

#[derive(Serialize)]
struct Claims {
    sub: String,
    exp: i64,
    token_type: String,
}

/// A signed access token expiring at `exp`. The client never sees the key.
pub fn access_token_expiring_at(exp: i64) -> String {
    let claims = Claims {
        sub: "1".into(),
        exp,
        token_type: "access".into(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"backend-only-secret"),
    )
    .unwrap()
}

pub fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub fn store_with(access: &str, refresh: &str) -> Arc<MemoryTokenStore> {
    Arc::new(MemoryTokenStore::with_tokens(&TokenPair::new(access, refresh)))
}

pub fn gateway(base_url: &str, store: Arc<dyn TokenStore>) -> AuthGateway {
    AuthGateway::builder()
        .base_url(base_url)
        .store(store)
        .build()
        .unwrap()
}

/// A local URL with nothing listening on it.
pub fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}
