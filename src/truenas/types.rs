//! TrueNAS REST API Type Definitions
//!
//! Typed records for the parts of the TrueNAS REST API (`/api/v2.0`) used by
//! this crate. Each response record implements [`Schema`] so it is
//! structurally validated before deserialization.
//!
//! # Endpoints Covered
//!
//! - `GET /certificate` → [`CertificateRecord`]
//! - `POST /certificate`, `PUT /certificate/id/{id}` ← [`CertificateImport`], [`CertificateUpdate`]
//! - `GET /core/get_jobs` → [`Job`]
//! - `GET /system/general` → [`GeneralSettings`]
//! - error bodies → [`ErrorEnvelope`]

use crate::truenas::schema::{Field, FieldKind, Schema};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Certificate entry from `GET /certificate`
#[derive(Debug, Deserialize, Clone)]
pub struct CertificateRecord {
    pub id: i64,
    pub name: String,
    /// PEM chain; null for CSR entries
    #[serde(default)]
    pub certificate: Option<String>,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub common: Option<String>,
    /// Subject alternative names; null on CSR and CA entries
    #[serde(default, deserialize_with = "null_as_empty")]
    pub san: Vec<String>,
    #[serde(default)]
    pub until: Option<String>,
    #[serde(default)]
    pub expired: Option<bool>,
}

impl Schema for CertificateRecord {
    const KIND: &'static str = "certificate";
    const FIELDS: &'static [Field] = &[
        Field::required("id", FieldKind::Integer),
        Field::required("name", FieldKind::String),
        Field::nullable("certificate", FieldKind::String),
        Field::optional("fingerprint", FieldKind::String),
        Field::optional("common", FieldKind::String),
        Field::optional("san", FieldKind::StringArray),
        Field::optional("until", FieldKind::String),
        Field::optional("expired", FieldKind::Bool),
    ];
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Appliance job states as reported by `core.get_jobs`
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    Waiting,
    Running,
    Success,
    Failed,
    Aborted,
}

impl JobState {
    pub const NAMES: &'static [&'static str] = &["WAITING", "RUNNING", "SUCCESS", "FAILED", "ABORTED"];

    /// No transition leaves a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Success | JobState::Failed | JobState::Aborted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Waiting => "WAITING",
            JobState::Running => "RUNNING",
            JobState::Success => "SUCCESS",
            JobState::Failed => "FAILED",
            JobState::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct JobProgress {
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Job entry from `GET /core/get_jobs`
#[derive(Debug, Deserialize, Clone)]
pub struct Job {
    pub id: i64,
    pub state: JobState,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub progress: Option<JobProgress>,
}

impl Schema for Job {
    const KIND: &'static str = "job";
    const FIELDS: &'static [Field] = &[
        Field::required("id", FieldKind::Integer),
        Field::required("state", FieldKind::OneOf(JobState::NAMES)),
        Field::optional("method", FieldKind::String),
        Field::optional("result", FieldKind::Any),
        Field::optional("error", FieldKind::String),
        Field::optional("progress", FieldKind::Object),
    ];
}

impl Job {
    /// Id of the record a create job produced, when the result carries one
    pub fn result_id(&self) -> Option<i64> {
        self.result.as_ref()?.get("id")?.as_i64()
    }
}

/// Subset of `GET /system/general`
#[derive(Debug, Deserialize, Clone)]
pub struct GeneralSettings {
    /// Either the full certificate object, its bare id, or null
    #[serde(default)]
    pub ui_certificate: Option<serde_json::Value>,
}

impl Schema for GeneralSettings {
    const KIND: &'static str = "system general";
    const FIELDS: &'static [Field] = &[Field::optional("ui_certificate", FieldKind::Any)];
}

impl GeneralSettings {
    pub fn ui_certificate_id(&self) -> Option<i64> {
        match self.ui_certificate.as_ref()? {
            serde_json::Value::Object(obj) => obj.get("id")?.as_i64(),
            other => other.as_i64(),
        }
    }
}

/// Body of `POST /certificate` for importing an existing certificate
#[derive(Debug, Serialize)]
pub struct CertificateImport<'a> {
    pub create_type: &'static str,
    pub name: &'a str,
    pub certificate: &'a str,
    #[serde(serialize_with = "expose")]
    pub privatekey: &'a SecretString,
}

impl<'a> CertificateImport<'a> {
    pub fn new(name: &'a str, certificate: &'a str, privatekey: &'a SecretString) -> Self {
        Self {
            create_type: "CERTIFICATE_CREATE_IMPORTED",
            name,
            certificate,
            privatekey,
        }
    }
}

/// Body of `PUT /certificate/id/{id}` replacing the certificate material
#[derive(Debug, Serialize)]
pub struct CertificateUpdate<'a> {
    pub certificate: &'a str,
    #[serde(serialize_with = "expose")]
    pub privatekey: &'a SecretString,
}

fn expose<S: Serializer>(secret: &&SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Error body returned with non-2xx responses
///
/// TrueNAS answers either `{"message": "..."}` or, for validation failures,
/// an object keyed by field with lists of `{"message": ...}` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub message: String,
}

impl ErrorEnvelope {
    pub fn parse(body: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        let object = value.as_object()?;

        if let Some(message) = object.get("message").and_then(|m| m.as_str()) {
            return Some(Self {
                message: message.to_string(),
            });
        }

        let messages: Vec<String> = object
            .iter()
            .filter_map(|(field, entries)| {
                let texts: Vec<&str> = entries
                    .as_array()?
                    .iter()
                    .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                    .collect();
                (!texts.is_empty()).then(|| format!("{}: {}", field, texts.join(", ")))
            })
            .collect();

        (!messages.is_empty()).then(|| Self {
            message: messages.join("; "),
        })
    }
}
