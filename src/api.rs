//! JSON-over-HTTP access to the storefront server.
//!
//! Every endpoint answers with a JSON object. Failures carry
//! `{"message": ..., "error": ...}` where `error` is either a machine code
//! such as `INVALID_OTP` or a human sentence; both shapes are decoded into
//! [`StorefrontError::Api`].

use reqwest::header::ACCEPT;
use reqwest::multipart::Form;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::{Result, StorefrontError};

const CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// Generic success body. Most endpoints only send a message.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Ack {
    pub fn message_or(&self, fallback: &str) -> String {
        self.message.clone().filter(|m| !m.trim().is_empty()).unwrap_or_else(|| fallback.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn into_error(self, status: u16) -> StorefrontError {
        let (code, described) = match self.error {
            Some(e) if is_code(&e) => (Some(e), None),
            Some(e) => (None, Some(e)),
            None => (None, None),
        };
        StorefrontError::Api { status, code, message: self.message.or(described) }
    }
}

fn is_code(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    csrf_token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self { http, base_url: config.base_url.trim_end_matches('/').to_string(), csrf_token: config.csrf_token.clone() })
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send("GET", path, self.http.get(self.url(path))).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send("POST", path, self.http.post(self.url(path)).json(body)).await
    }

    pub async fn patch_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send("PATCH", path, self.http.patch(self.url(path)).json(body)).await
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send("POST", path, self.http.post(self.url(path))).await
    }

    pub async fn post_form<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T> {
        self.send("POST", path, self.http.post(self.url(path)).multipart(form)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Ack> {
        self.send("DELETE", path, self.http.delete(self.url(path))).await
    }

    async fn send<T: DeserializeOwned>(&self, method: &str, path: &str, req: RequestBuilder) -> Result<T> {
        let req = match &self.csrf_token {
            Some(token) => req.header(CSRF_HEADER, token),
            None => req,
        };
        let resp = req.header(ACCEPT, "application/json").send().await.map_err(|e| {
            warn!(method, path, error = %e, "request did not complete");
            StorefrontError::Transport(e)
        })?;
        let status = resp.status();
        let body = resp.bytes().await?;

        if !status.is_success() {
            let err = serde_json::from_slice::<ErrorBody>(&body).unwrap_or_default().into_error(status.as_u16());
            warn!(method, path, status = status.as_u16(), code = ?err.code(), "request rejected");
            return Err(err);
        }

        debug!(method, path, status = status.as_u16(), bytes = body.len(), "request ok");
        let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) { b"{}" } else { &body };
        Ok(serde_json::from_slice(body)?)
    }
}
