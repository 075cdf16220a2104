//! CLI commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use keyward_client::auth::{self, LOGIN_FAILED, REGISTER_FAILED};
use keyward_client::{
    AuthClient, AuthGateway, ClientError, FileTokenStore, GuardOutcome, Method, PendingRequest,
    SessionGuard, oauth,
};
use keyward_common::config::KeywardConfig;
use keyward_common::models::Profile;
use serde_json::{Value, json};
use tracing::info;

#[derive(Subcommand)]
pub enum Commands {
    /// Log in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "KEYWARD_PASSWORD")]
        password: String,
        /// Destination the session guard redirected from
        #[arg(long)]
        from: Option<String>,
    },

    /// Create an account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "KEYWARD_PASSWORD")]
        password: String,
        #[arg(long)]
        display_name: Option<String>,
        /// Log in right after registering
        #[arg(long)]
        login: bool,
    },

    /// Forget the stored session
    Logout,

    /// Print the Google consent URL to open in a browser
    GoogleUrl,

    /// Finish Google login with the code (or full callback URL) Google returned
    GoogleCallback {
        /// Authorization code
        #[arg(long, conflicts_with = "url", required_unless_present = "url")]
        code: Option<String>,
        /// Full callback URL, e.g. http://localhost:5173/google/callback?code=...
        #[arg(long)]
        url: Option<String>,
    },

    /// Check whether a protected destination may be entered
    Status {
        #[arg(default_value = "/")]
        destination: String,
    },

    /// Call an endpoint through the authenticated gateway
    Call {
        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        /// Path relative to the backend origin, e.g. /auth/test
        path: String,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },
}

impl Commands {
    pub async fn execute(self, config: &KeywardConfig) -> Result<()> {
        let store = Arc::new(FileTokenStore::new(&config.store.path));
        let gateway = AuthGateway::from_config(config, store)?;
        let client = AuthClient::new(gateway.clone());

        match self {
            Commands::Login {
                email,
                password,
                from,
            } => {
                client
                    .login(&email, &password)
                    .await
                    .map_err(|e| inline_error(e, LOGIN_FAILED))?;
                print_json(&json!({
                    "logged_in": true,
                    "redirect": auth::redirect_after_login(from.as_deref()),
                }))
            }

            Commands::Register {
                email,
                password,
                display_name,
                login,
            } => {
                let profile = Profile { display_name };
                let created = client
                    .register(&email, &password, profile)
                    .await
                    .map_err(|e| inline_error(e, REGISTER_FAILED))?;
                if login {
                    client
                        .login(&email, &password)
                        .await
                        .map_err(|e| inline_error(e, LOGIN_FAILED))?;
                }
                print_json(&json!({ "created": created, "logged_in": login }))
            }

            Commands::Logout => {
                client.logout().await?;
                print_json(&json!({ "logged_in": false }))
            }

            Commands::GoogleUrl => {
                let url =
                    oauth::google_authorize_url(&config.google.client_id, &config.google.redirect_uri)?;
                println!("{url}");
                Ok(())
            }

            Commands::GoogleCallback { code, url } => {
                let code = match (code, url) {
                    (Some(code), _) => code,
                    (None, Some(url)) => oauth::code_from_callback(&url)
                        .context("callback URL has no `code` parameter")?,
                    (None, None) => anyhow::bail!("either --code or --url is required"),
                };
                client
                    .google_login(&code)
                    .await
                    .map_err(|e| inline_error(e, LOGIN_FAILED))?;
                print_json(&json!({
                    "logged_in": true,
                    "redirect": auth::redirect_after_login(None),
                }))
            }

            Commands::Status { destination } => {
                let mut guard =
                    SessionGuard::new(gateway).with_login_path(&config.auth.login_path);
                match guard.check(&destination).await {
                    GuardOutcome::Granted { destination } => {
                        print_json(&json!({ "authorized": true, "destination": destination }))
                    }
                    GuardOutcome::Redirect { to, from } => {
                        info!(%to, %from, "session required");
                        print_json(&json!({ "authorized": false, "redirect": to, "from": from }))
                    }
                }
            }

            Commands::Call { method, path, body } => {
                let mut request = PendingRequest::new(
                    Method::from_bytes(method.to_uppercase().as_bytes())
                        .with_context(|| format!("unsupported HTTP method `{method}`"))?,
                    path,
                );
                if let Some(raw) = body {
                    let value: Value =
                        serde_json::from_str(&raw).context("--body is not valid JSON")?;
                    request = request.json(&value)?;
                }
                let response = gateway.send(&request).await?;
                let text = response.text().await?;
                match serde_json::from_str::<Value>(&text) {
                    Ok(value) => print_json(&value),
                    Err(_) => {
                        println!("{text}");
                        Ok(())
                    }
                }
            }
        }
    }
}

/// Turn a failed form submission into the message a user would see inline.
fn inline_error(error: ClientError, fallback: &str) -> anyhow::Error {
    tracing::debug!(error = %error, "form submission failed");
    anyhow::anyhow!(error.user_message(fallback))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
