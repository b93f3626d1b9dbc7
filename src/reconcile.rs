//! Certificate Reconciliation
//!
//! Brings one named certificate on the appliance in line with a local chain
//! and key:
//!
//! 1. list certificates and select those with the exact target name
//! 2. none → import; one → compare fingerprints, replace only if they differ;
//!    several → [`SyncError::AmbiguousCertificate`] without touching anything
//! 3. await the job produced by the mutating call
//! 4. optionally make the certificate the active UI certificate
//!
//! An unchanged chain issues no mutating call, so running on every renewal
//! cycle is safe.

use crate::clock::Clock;
use crate::error::{Result, SyncError};
use crate::fingerprint::chain_fingerprint;
use crate::jobs::JobWaiter;
use crate::truenas::types::{CertificateRecord, Job};
use crate::truenas::ApplianceApi;
use secrecy::SecretString;
use std::fmt;
use tracing::{debug, info, warn};

/// Certificate material the appliance should end up holding
#[derive(Debug, Clone)]
pub struct DesiredCertificate {
    pub name: String,
    pub chain_pem: String,
    pub private_key: SecretString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    Replaced,
    Unchanged,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Created => f.write_str("created"),
            Action::Replaced => f.write_str("replaced"),
            Action::Unchanged => f.write_str("unchanged"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub action: Action,
    pub certificate_id: i64,
    /// The certificate was switched to be the active UI certificate
    pub activated: bool,
}

/// Whether the appliance needs an explicit "set active" step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationPolicy {
    pub activate: bool,
    pub restart_ui: bool,
}

pub struct Reconciler<'a, A: ApplianceApi + ?Sized, C: Clock> {
    api: &'a A,
    waiter: JobWaiter<C>,
    activation: ActivationPolicy,
}

impl<'a, A: ApplianceApi + ?Sized, C: Clock> Reconciler<'a, A, C> {
    pub fn new(api: &'a A, waiter: JobWaiter<C>) -> Self {
        Self {
            api,
            waiter,
            activation: ActivationPolicy::default(),
        }
    }

    pub fn with_activation(mut self, activation: ActivationPolicy) -> Self {
        self.activation = activation;
        self
    }

    pub async fn reconcile(&self, desired: &DesiredCertificate) -> Result<ReconcileOutcome> {
        info!("Reconciling certificate '{}'", desired.name);

        let certificates = self.api.list_certificates().await?;
        let matches: Vec<&CertificateRecord> = certificates
            .iter()
            .filter(|cert| cert.name == desired.name)
            .collect();

        let (action, certificate_id) = match matches.as_slice() {
            [] => {
                info!("No certificate named '{}', importing", desired.name);
                let job_id = self
                    .api
                    .create_certificate(&desired.name, &desired.chain_pem, &desired.private_key)
                    .await?;
                let job = self.waiter.await_job(self.api, job_id).await?;
                (Action::Created, self.created_id(&job, &desired.name).await?)
            }
            [existing] => {
                let wanted = chain_fingerprint(&desired.chain_pem);
                let current = existing.certificate.as_deref().map(chain_fingerprint);
                debug!(
                    "Certificate {} fingerprint {:?}, wanted {}",
                    existing.id, current, wanted
                );

                if current.as_deref() == Some(wanted.as_str()) {
                    info!("Certificate {} is up to date", existing.id);
                    (Action::Unchanged, existing.id)
                } else {
                    info!("Certificate {} differs, replacing", existing.id);
                    let job_id = self
                        .api
                        .update_certificate(existing.id, &desired.chain_pem, &desired.private_key)
                        .await?;
                    self.waiter.await_job(self.api, job_id).await?;
                    (Action::Replaced, existing.id)
                }
            }
            many => {
                return Err(SyncError::AmbiguousCertificate {
                    name: desired.name.clone(),
                    count: many.len(),
                    ids: many.iter().map(|cert| cert.id).collect(),
                });
            }
        };

        let activated = if self.activation.activate {
            self.activate(action, certificate_id)
                .await
                .map_err(|source| SyncError::Activation {
                    certificate_id,
                    action,
                    source: Box::new(source),
                })?
        } else {
            false
        };

        Ok(ReconcileOutcome {
            action,
            certificate_id,
            activated,
        })
    }

    /// Resolve the id of a freshly imported certificate
    async fn created_id(&self, job: &Job, name: &str) -> Result<i64> {
        if let Some(id) = job.result_id() {
            return Ok(id);
        }

        warn!("Job {} did not report a certificate id, looking it up by name", job.id);
        let certificates = self.api.list_certificates().await?;
        let ids: Vec<i64> = certificates
            .iter()
            .filter(|cert| cert.name == name)
            .map(|cert| cert.id)
            .collect();
        match ids.len() {
            1 => Ok(ids[0]),
            0 => Err(SyncError::Protocol(format!(
                "job {} succeeded but no certificate named '{}' exists",
                job.id, name
            ))),
            count => Err(SyncError::AmbiguousCertificate {
                name: name.to_string(),
                count,
                ids,
            }),
        }
    }

    /// Returns whether the active certificate was switched
    async fn activate(&self, action: Action, certificate_id: i64) -> Result<bool> {
        let active = self.api.active_certificate_id().await?;
        let switch = active != Some(certificate_id);

        if switch {
            info!(
                "Activating certificate {} (currently {:?})",
                certificate_id, active
            );
            if let Some(job_id) = self.api.set_active_certificate(certificate_id).await? {
                self.waiter.await_job(self.api, job_id).await?;
            }
        }

        if self.activation.restart_ui && (switch || action != Action::Unchanged) {
            info!("Restarting appliance web UI");
            self.api.restart_ui().await?;
        }

        Ok(switch)
    }
}
