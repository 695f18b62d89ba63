// REST client for the controller's site-scoped configuration API.
//
// Wraps `reqwest::Client` with site-scoped URL construction and
// `{ data: [], meta: { rc, msg } }` envelope unwrapping. Documents are
// raw `serde_json::Value`s -- collection semantics live in
// unistate-core; this module is transport mechanics only.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::auth::{Credentials, api_key_headers, session_login};
use crate::error::Error;
use crate::transport::TransportConfig;

/// The `{ meta, data }` envelope every legacy-style endpoint returns.
#[derive(Debug, Deserialize)]
struct Envelope {
    meta: Meta,
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    rc: String,
    #[serde(default)]
    msg: Option<String>,
}

/// Raw HTTP client for a controller's site-scoped REST collections.
///
/// Handles URL construction (`/api/s/{site}/rest/{collection}`),
/// envelope unwrapping, and auth. All methods return unwrapped `data`
/// payloads -- the envelope is stripped before the caller sees it.
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    site: String,
}

impl RestClient {
    /// Connect to a controller: build the HTTP client for the given
    /// credentials and, for session auth, perform the login handshake.
    pub async fn connect(
        base_url: Url,
        site: String,
        credentials: &Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        match credentials {
            Credentials::ApiKey(key) => {
                let headers = api_key_headers(key)?;
                let http = transport.build_client_with_headers(headers)?;
                Ok(Self {
                    http,
                    base_url,
                    site,
                })
            }
            Credentials::Session { username, password } => {
                // Session auth requires cookies.
                let config = if transport.cookie_jar.is_some() {
                    transport.clone()
                } else {
                    transport.clone().with_cookie_jar()
                };
                let http = config.build_client()?;
                session_login(&http, &base_url, username, password).await?;
                Ok(Self {
                    http,
                    base_url,
                    site,
                })
            }
        }
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth).
    pub fn from_reqwest(http: reqwest::Client, base_url: Url, site: String) -> Self {
        Self {
            http,
            base_url,
            site,
        }
    }

    /// The current site identifier.
    pub fn site(&self) -> &str {
        &self.site
    }

    /// The controller base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Build a site-scoped REST URL: `{base}/api/s/{site}/rest/{path}`.
    fn rest_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let full = format!("{base}/api/s/{}/rest/{path}", self.site);
        Url::parse(&full).map_err(Error::InvalidUrl)
    }

    // ── Collection operations ────────────────────────────────────────

    /// List every document in a collection.
    pub async fn list(&self, collection: &str) -> Result<Vec<Value>, Error> {
        let url = self.rest_url(collection)?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        self.parse_envelope(resp).await
    }

    /// Create a document. Returns the stored document (including the
    /// device-assigned `_id`).
    pub async fn create(&self, collection: &str, doc: &Value) -> Result<Value, Error> {
        let url = self.rest_url(collection)?;
        debug!("POST {url}");

        let resp = self
            .http
            .post(url)
            .json(doc)
            .send()
            .await
            .map_err(Error::Transport)?;
        let mut data = self.parse_envelope(resp).await?;

        data.drain(..).next().ok_or_else(|| Error::Envelope {
            message: format!("create on '{collection}' returned no document"),
        })
    }

    /// Update a document by id. The body may be partial -- the
    /// controller merges it into the stored document.
    pub async fn update(&self, collection: &str, id: &str, doc: &Value) -> Result<Value, Error> {
        let url = self.rest_url(&format!("{collection}/{id}"))?;
        debug!("PUT {url}");

        let resp = self
            .http
            .put(url)
            .json(doc)
            .send()
            .await
            .map_err(Error::Transport)?;
        let mut data = self.parse_envelope(resp).await?;

        data.drain(..).next().ok_or_else(|| Error::Envelope {
            message: format!("update on '{collection}/{id}' returned no document"),
        })
    }

    /// Delete a document by id.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<(), Error> {
        let url = self.rest_url(&format!("{collection}/{id}"))?;
        debug!("DELETE {url}");

        let resp = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(Error::Transport)?;
        self.parse_envelope(resp).await?;
        Ok(())
    }

    // ── Response handling ────────────────────────────────────────────

    /// Parse the `{ meta, data }` envelope, returning `data` on success
    /// or an error if the HTTP status or `meta.rc` indicates failure.
    async fn parse_envelope(&self, resp: reqwest::Response) -> Result<Vec<Value>, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "session expired or invalid credentials".into(),
            });
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(Error::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            // Envelope errors come back with a meta.msg even on non-2xx;
            // prefer that over the raw body when present.
            let message = serde_json::from_str::<Envelope>(&body)
                .ok()
                .and_then(|env| env.meta.msg)
                .unwrap_or_else(|| {
                    let preview = &body[..body.len().min(200)];
                    format!("HTTP {status}: {preview}")
                });
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        let envelope: Envelope = serde_json::from_str(&body).map_err(|e| {
            let preview = &body[..body.len().min(200)];
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })?;

        match envelope.meta.rc.as_str() {
            "ok" => Ok(envelope.data),
            _ => Err(Error::Envelope {
                message: envelope
                    .meta
                    .msg
                    .unwrap_or_else(|| format!("rc={}", envelope.meta.rc)),
            }),
        }
    }
}
