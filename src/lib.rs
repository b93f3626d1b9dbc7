//! TrueNAS Certificate Sync
//!
//! Keeps a TLS certificate on a TrueNAS appliance in line with a certificate
//! on disk (typically an ACME-renewed `fullchain.pem`/`privkey.pem` pair),
//! using the appliance's REST API.
//!
//! # Overview
//!
//! ```text
//! ┌───────────────┐               ┌───────────────┐   HTTPS / REST    ┌─────────┐
//! │ fullchain.pem │─► Reconciler ─┤ TrueNasClient ├──────────────────►│ TrueNAS │
//! │ privkey.pem   │       │       └───────────────┘  bearer API key   └─────────┘
//! └───────────────┘       ▼
//!                    JobWaiter (polls /core/get_jobs until terminal)
//! ```
//!
//! # Modules
//!
//! - [`truenas`] - HTTP transport, schema validation, typed API client
//! - [`jobs`] - Polling of appliance jobs until completion
//! - [`reconcile`] - Create / replace / unchanged decision and orchestration
//! - [`fingerprint`] - Content fingerprints of PEM chains
//! - [`clock`] - Injectable time source
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//!
//! # Quick Start
//!
//! ```no_run
//! use truenas_cert_sync::clock::TokioClock;
//! use truenas_cert_sync::config::Config;
//! use truenas_cert_sync::jobs::{JobWaiter, PollPolicy};
//! use truenas_cert_sync::reconcile::Reconciler;
//! use truenas_cert_sync::truenas::TrueNasClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/Default.toml")?;
//!     config.validate()?;
//!
//!     let client = TrueNasClient::new(&config.truenas)?;
//!     let waiter = JobWaiter::new(TokioClock, PollPolicy::from(&config.jobs));
//!     let desired = config.certificate.load_material()?;
//!
//!     let outcome = Reconciler::new(&client, waiter).reconcile(&desired).await?;
//!     println!("{} certificate {}", outcome.action, outcome.certificate_id);
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod jobs;
pub mod reconcile;
pub mod truenas;
