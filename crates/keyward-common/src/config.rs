//! Client configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > keyward.toml > defaults

use serde::Deserialize;
use std::sync::OnceLock;

use crate::error::KeywardResult;

static CONFIG: OnceLock<KeywardConfig> = OnceLock::new();

/// Initialize the global configuration from environment.
///
/// Should be called once at startup; later calls return the first value.
pub fn init() -> KeywardResult<&'static KeywardConfig> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let cfg = KeywardConfig::load()?;
    Ok(CONFIG.get_or_init(|| cfg))
}

#[derive(Debug, Deserialize, Clone)]
pub struct KeywardConfig {
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub google: GoogleConfig,
}

impl KeywardConfig {
    /// Build a configuration from defaults, `keyward.toml`, and `KEYWARD__*`
    /// environment variables, without touching the global.
    pub fn load() -> KeywardResult<Self> {
        let cfg = config::Config::builder()
            // Defaults
            .set_default("api.base_url", "http://localhost:8000")?
            .set_default("store.path", ".keyward/tokens.json")?
            .set_default("auth.login_path", "/login")?
            .set_default("auth.clear_on_refresh_failure", false)?
            .set_default("google.client_id", "")?
            .set_default("google.redirect_uri", "http://localhost:5173/google/callback")?
            // Optional config file
            .add_source(config::File::with_name("keyward").required(false))
            // Environment variables (KEYWARD__API__BASE_URL, KEYWARD__STORE__PATH, etc.)
            .add_source(
                config::Environment::with_prefix("KEYWARD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Backend origin, e.g. `https://api.example.com`. Endpoint paths are
    /// appended verbatim.
    pub base_url: String,
    /// Per-request timeout. Unset leaves the HTTP client default in place.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// File the token pair is persisted to.
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Destination the session guard redirects to when no session can be established
    pub login_path: String,
    /// Wipe stored tokens when a refresh is rejected
    pub clear_on_refresh_failure: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GoogleConfig {
    /// OAuth client ID registered with Google
    pub client_id: String,
    /// Where Google sends the user back with `?code=`
    pub redirect_uri: String,
}
