//! TrueNAS REST API Client
//!
//! Typed operations on top of [`Transport`]. Every response is run through the
//! schema layer before it is returned, so callers only ever see validated
//! records.
//!
//! # Example
//!
//! ```no_run
//! use truenas_cert_sync::config::TrueNasConfig;
//! use truenas_cert_sync::truenas::{ApplianceApi, TrueNasClient};
//! use secrecy::SecretString;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = TrueNasConfig {
//!     url: "https://truenas.local/api/v2.0".to_string(),
//!     api_key: SecretString::from("your-api-key"),
//!     verify_ssl: false,
//!     timeout_seconds: 30,
//! };
//!
//! let client = TrueNasClient::new(&config)?;
//! let certificates = client.list_certificates().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::TrueNasConfig;
use crate::error::{Result, SyncError};
use crate::truenas::schema::{validate, validate_job_id, validate_list};
use crate::truenas::transport::Transport;
use crate::truenas::types::*;
use async_trait::async_trait;
use reqwest::Method;
use secrecy::SecretString;
use serde_json::{json, Value};
use tracing::debug;

/// Appliance operations the reconciler and job waiter depend on
///
/// [`TrueNasClient`] is the production implementation; tests substitute an
/// in-memory appliance.
#[async_trait]
pub trait ApplianceApi: Send + Sync {
    async fn list_certificates(&self) -> Result<Vec<CertificateRecord>>;

    /// Import a certificate; returns the job id
    async fn create_certificate(
        &self,
        name: &str,
        chain_pem: &str,
        private_key: &SecretString,
    ) -> Result<i64>;

    /// Replace the material of an existing certificate; returns the job id
    ///
    /// Releases whose update call does not take `certificate`/`privatekey`
    /// reject it with HTTP 422, reported as [`SyncError::Api`].
    async fn update_certificate(
        &self,
        id: i64,
        chain_pem: &str,
        private_key: &SecretString,
    ) -> Result<i64>;

    async fn get_job(&self, job_id: i64) -> Result<Job>;

    /// Id of the certificate currently serving the web UI, if any
    async fn active_certificate_id(&self) -> Result<Option<i64>>;

    /// Make `id` the active UI certificate; returns a job id when the
    /// appliance completes the change asynchronously
    async fn set_active_certificate(&self, id: i64) -> Result<Option<i64>>;

    async fn restart_ui(&self) -> Result<()>;
}

pub struct TrueNasClient {
    transport: Transport,
}

impl TrueNasClient {
    pub fn new(config: &TrueNasConfig) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(config)?,
        })
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub async fn get_certificate(&self, id: i64) -> Result<CertificateRecord> {
        let raw = self.transport.get(&format!("/certificate/id/{}", id)).await?;
        validate(raw)
    }

    /// Delete a certificate; returns the job id
    pub async fn delete_certificate(&self, id: i64, force: bool) -> Result<i64> {
        let path = format!("/certificate/id/{}?force={}", id, force);
        let raw = self
            .transport
            .request::<Value>(Method::DELETE, &path, None)
            .await?;
        validate_job_id(raw, "certificate delete")
    }

    /// One page of the appliance job list
    pub async fn get_jobs(&self, limit: u32, offset: u32) -> Result<Vec<Job>> {
        let raw = self
            .transport
            .get(&format!("/core/get_jobs?limit={}&offset={}", limit, offset))
            .await?;
        validate_list(raw)
    }
}

#[async_trait]
impl ApplianceApi for TrueNasClient {
    async fn list_certificates(&self) -> Result<Vec<CertificateRecord>> {
        let raw = self.transport.get("/certificate").await?;
        let certificates: Vec<CertificateRecord> = validate_list(raw)?;
        debug!("Appliance reports {} certificates", certificates.len());
        Ok(certificates)
    }

    async fn create_certificate(
        &self,
        name: &str,
        chain_pem: &str,
        private_key: &SecretString,
    ) -> Result<i64> {
        let body = CertificateImport::new(name, chain_pem, private_key);
        let raw = self
            .transport
            .request(Method::POST, "/certificate", Some(&body))
            .await?;
        validate_job_id(raw, "certificate create")
    }

    async fn update_certificate(
        &self,
        id: i64,
        chain_pem: &str,
        private_key: &SecretString,
    ) -> Result<i64> {
        let body = CertificateUpdate {
            certificate: chain_pem,
            privatekey: private_key,
        };
        let raw = self
            .transport
            .request(Method::PUT, &format!("/certificate/id/{}", id), Some(&body))
            .await?;
        validate_job_id(raw, "certificate update")
    }

    async fn get_job(&self, job_id: i64) -> Result<Job> {
        let raw = self
            .transport
            .get(&format!("/core/get_jobs?id={}", job_id))
            .await?;
        let jobs: Vec<Job> = validate_list(raw)?;
        jobs.into_iter()
            .find(|job| job.id == job_id)
            .ok_or(SyncError::JobNotFound(job_id))
    }

    async fn active_certificate_id(&self) -> Result<Option<i64>> {
        let raw = self.transport.get("/system/general").await?;
        let settings: GeneralSettings = validate(raw)?;
        Ok(settings.ui_certificate_id())
    }

    async fn set_active_certificate(&self, id: i64) -> Result<Option<i64>> {
        let body = json!({ "ui_certificate": id });
        let raw = self
            .transport
            .request(Method::PUT, "/system/general", Some(&body))
            .await?;

        // Older releases answer with a job id, newer ones with the updated settings
        if raw.is_number() {
            return validate_job_id(raw, "system general update").map(Some);
        }

        let settings: GeneralSettings = validate(raw)?;
        match settings.ui_certificate_id() {
            Some(active) if active != id => Err(SyncError::Protocol(format!(
                "system general update kept certificate {} active instead of {}",
                active, id
            ))),
            _ => Ok(None),
        }
    }

    async fn restart_ui(&self) -> Result<()> {
        self.transport
            .request::<Value>(Method::POST, "/system/general/ui_restart", None)
            .await?;
        Ok(())
    }
}
