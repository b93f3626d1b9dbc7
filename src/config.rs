use crate::error::{Result, SyncError};
use crate::reconcile::{ActivationPolicy, DesiredCertificate};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub truenas: TrueNasConfig,
    #[serde(default)]
    pub certificate: CertificateConfig,
    #[serde(default)]
    pub jobs: JobConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrueNasConfig {
    /// API root including the version segment, e.g. `https://nas.local/api/v2.0`
    pub url: String,
    pub api_key: SecretString,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CertificateConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fullchain_path: PathBuf,
    #[serde(default)]
    pub privatekey_path: PathBuf,
    #[serde(default)]
    pub activate: bool,
    #[serde(default)]
    pub restart_ui: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JobConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_poll_interval_ms")]
    pub max_poll_interval_ms: u64,
    #[serde(default = "default_job_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_interval_ms: default_max_poll_interval_ms(),
            timeout_seconds: default_job_timeout_seconds(),
        }
    }
}

fn default_verify_ssl() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_poll_interval_ms() -> u64 {
    4000
}

fn default_job_timeout_seconds() -> u64 {
    300
}

/// Values supplied on the command line; each one wins over file and environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub truenas_url: Option<String>,
    pub truenas_api_key: Option<String>,
    pub insecure: bool,
    pub cert_name: Option<String>,
    pub cert_fullchain_path: Option<String>,
    pub cert_privatekey_path: Option<String>,
    pub activate: bool,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        Self::load_with_overrides(path, &Overrides::default())
    }

    /// Load `path` (optional), then `TRUENAS_CERT_SYNC__*` variables, then CLI overrides
    pub fn load_with_overrides(path: &str, overrides: &Overrides) -> Result<Self> {
        // Load environment variables from .env if present
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("TRUENAS_CERT_SYNC").separator("__"));

        builder = builder
            .set_override_option("truenas.url", overrides.truenas_url.clone())
            .and_then(|b| b.set_override_option("truenas.api_key", overrides.truenas_api_key.clone()))
            .and_then(|b| b.set_override_option("certificate.name", overrides.cert_name.clone()))
            .and_then(|b| {
                b.set_override_option(
                    "certificate.fullchain_path",
                    overrides.cert_fullchain_path.clone(),
                )
            })
            .and_then(|b| {
                b.set_override_option(
                    "certificate.privatekey_path",
                    overrides.cert_privatekey_path.clone(),
                )
            })
            .and_then(|b| b.set_override_option("truenas.verify_ssl", overrides.insecure.then_some(false)))
            .and_then(|b| b.set_override_option("certificate.activate", overrides.activate.then_some(true)))
            .map_err(|e| SyncError::Config(e.to_string()))?;

        let config = builder
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to build configuration: {}", e)))?;

        config
            .try_deserialize()
            .map_err(|e| SyncError::Config(format!("Failed to deserialize configuration: {}", e)))
    }

    /// Check connection, certificate and polling settings
    pub fn validate(&self) -> Result<()> {
        self.truenas.validate()?;
        self.certificate.validate()?;

        let jobs = &self.jobs;
        if jobs.poll_interval_ms == 0 {
            return Err(SyncError::Config("jobs.poll_interval_ms must be positive".to_string()));
        }
        if jobs.max_poll_interval_ms < jobs.poll_interval_ms {
            return Err(SyncError::Config(format!(
                "jobs.max_poll_interval_ms ({}) is below jobs.poll_interval_ms ({})",
                jobs.max_poll_interval_ms, jobs.poll_interval_ms
            )));
        }
        if jobs.timeout_seconds == 0 {
            return Err(SyncError::Config("jobs.timeout_seconds must be positive".to_string()));
        }
        Ok(())
    }
}

impl TrueNasConfig {
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.url)
            .map_err(|e| SyncError::Config(format!("truenas.url '{}' is invalid: {}", self.url, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::Config(format!(
                "truenas.url must use http or https, got '{}'",
                url.scheme()
            )));
        }

        let last_segment = url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .unwrap_or_default();
        if !is_version_segment(last_segment) {
            return Err(SyncError::Config(format!(
                "truenas.url '{}' must end with an API version segment such as /api/v2.0",
                self.url
            )));
        }

        if self.api_key.expose_secret().trim().is_empty() {
            return Err(SyncError::Config("truenas.api_key is empty".to_string()));
        }
        Ok(())
    }
}

impl CertificateConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SyncError::Config("certificate.name is empty".to_string()));
        }
        Ok(())
    }

    pub fn activation(&self) -> ActivationPolicy {
        ActivationPolicy {
            activate: self.activate,
            restart_ui: self.restart_ui,
        }
    }

    /// Read chain and key from disk
    pub fn load_material(&self) -> Result<DesiredCertificate> {
        self.validate()?;

        let read = |path: &PathBuf, what: &str| {
            if path.as_os_str().is_empty() {
                return Err(SyncError::Config(format!("certificate.{} is not set", what)));
            }
            std::fs::read_to_string(path).map_err(|e| {
                SyncError::Io(std::io::Error::new(
                    e.kind(),
                    format!("{} ({}): {}", what, path.display(), e),
                ))
            })
        };

        let chain_pem = read(&self.fullchain_path, "fullchain_path")?;
        let private_key = read(&self.privatekey_path, "privatekey_path")?;

        Ok(DesiredCertificate {
            name: self.name.clone(),
            chain_pem,
            private_key: SecretString::new(private_key.into()),
        })
    }
}

/// `v2`, `v2.0`, `v25.04.1`
fn is_version_segment(segment: &str) -> bool {
    let Some(version) = segment.strip_prefix('v') else {
        return false;
    };
    !version.is_empty()
        && version
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}
