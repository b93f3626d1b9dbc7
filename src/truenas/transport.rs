//! HTTP Transport
//!
//! Thin request layer over `reqwest`: joins paths onto the versioned base URL,
//! attaches the bearer API key, applies the configured timeout and TLS
//! verification toggle, and decodes JSON bodies.
//!
//! The transport never retries. Failures map onto three error kinds:
//!
//! - connection/IO failure → [`SyncError::Transport`]
//! - non-2xx status → [`SyncError::Api`] with the appliance message
//! - 2xx body that is not JSON → [`SyncError::Protocol`]

use crate::config::TrueNasConfig;
use crate::error::{Result, SyncError};
use crate::truenas::types::ErrorEnvelope;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub struct Transport {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl Transport {
    pub fn new(config: &TrueNasConfig) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_seconds));

        if !config.verify_ssl {
            // Appliances usually ship a self-signed certificate until the first sync
            let connector = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
                .map_err(|e| SyncError::Config(format!("TLS connector: {}", e)))?;
            builder = builder.use_preconfigured_tls(connector);
        }

        let http = builder.build().map_err(SyncError::Transport)?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform one request and return the decoded JSON body
    ///
    /// `path` is relative to the API version root and may carry a query string.
    /// An empty 2xx body decodes to `Value::Null`.
    pub async fn request<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(self.api_key.expose_secret().trim());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(SyncError::Transport)?;
        let status = response.status();
        let text = response.text().await.map_err(SyncError::Transport)?;

        if !status.is_success() {
            let message = ErrorEnvelope::parse(&text)
                .map(|envelope| envelope.message)
                .unwrap_or(text);
            return Err(SyncError::Api {
                status: status.as_u16(),
                method: method.to_string(),
                path: path.to_string(),
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            SyncError::Protocol(format!(
                "{} {} returned a body that is not JSON: {}",
                method, path, e
            ))
        })
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.request::<Value>(Method::GET, path, None).await
    }
}
