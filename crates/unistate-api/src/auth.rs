// Controller authentication
//
// Two strategies: an API key injected as a default header on every
// request, or cookie-based session login. The login endpoint sets a
// session cookie in the client's jar; subsequent requests use that
// cookie automatically.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::Error;

/// How to authenticate with a controller.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// API key sent as `X-API-KEY` on every request.
    ApiKey(SecretString),
    /// Cookie-based session auth via `POST /api/login`.
    Session {
        username: String,
        password: SecretString,
    },
}

/// Perform the session login handshake against `/api/login`.
///
/// On success the session cookie is stored in the client's cookie jar
/// and used for all subsequent requests.
pub(crate) async fn session_login(
    http: &reqwest::Client,
    base_url: &Url,
    username: &str,
    password: &SecretString,
) -> Result<(), Error> {
    let url = base_url.join("/api/login").map_err(Error::InvalidUrl)?;

    debug!("logging in at {}", url);

    let body = json!({
        "username": username,
        "password": password.expose_secret(),
    });

    let resp = http
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(Error::Transport)?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Authentication {
            message: format!("login failed (HTTP {status}): {}", &body[..body.len().min(200)]),
        });
    }

    debug!("login successful");
    Ok(())
}

/// Build the default header map for API-key auth.
///
/// The key header is marked sensitive so it never appears in debug logs.
pub(crate) fn api_key_headers(
    api_key: &SecretString,
) -> Result<reqwest::header::HeaderMap, Error> {
    let mut headers = reqwest::header::HeaderMap::new();
    let mut value = reqwest::header::HeaderValue::from_str(api_key.expose_secret())
        .map_err(|e| Error::Authentication {
            message: format!("invalid API key header value: {e}"),
        })?;
    value.set_sensitive(true);
    headers.insert("X-API-KEY", value);
    Ok(headers)
}
