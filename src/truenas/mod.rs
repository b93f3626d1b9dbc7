pub mod client;
pub mod schema;
pub mod transport;
pub mod types;

pub use client::{ApplianceApi, TrueNasClient};
pub use transport::Transport;
