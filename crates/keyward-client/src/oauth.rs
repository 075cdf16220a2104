//! Google OAuth authorization-code redirect.

use url::Url;

use crate::error::{ClientError, Result};

pub const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_SCOPE: &str = "openid email profile";

/// URL of Google's consent screen. After consent, Google redirects to
/// `redirect_uri?code=...`, which is handed to [`crate::AuthClient::google_login`].
pub fn google_authorize_url(client_id: &str, redirect_uri: &str) -> Result<Url> {
    if client_id.is_empty() {
        return Err(ClientError::Configuration("google.client_id is not set".into()));
    }

    let mut url = Url::parse(GOOGLE_AUTHORIZE_URL)
        .map_err(|e| ClientError::Configuration(e.to_string()))?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", GOOGLE_SCOPE)
        .append_pair("prompt", "consent");
    Ok(url)
}

/// Pull the `code` query parameter out of the URL Google redirected to.
pub fn code_from_callback(callback_url: &str) -> Option<String> {
    let url = Url::parse(callback_url).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .filter(|c| !c.is_empty())
}
