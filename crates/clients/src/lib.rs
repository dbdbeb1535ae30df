//! HTTP clients for Saldo's collaborating services.
//!
//! - [`HttpContractDirectory`] reads employees, contracts and labor-agreement
//!   versions from the contract configuration service.
//! - [`HttpLeaveRequestSource`] reads leave requests and their statuses from
//!   the leave-request workflow service.
//!
//! Both share one [`reqwest::Client`] built by [`ServiceClients::from_config`]
//! at startup, with the configured per-request timeout.

pub mod contracts;
pub mod leave_requests;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use saldo_shared::ServicesConfig;
use thiserror::Error;

pub use contracts::HttpContractDirectory;
pub use leave_requests::HttpLeaveRequestSource;

/// Failure to build the HTTP clients.
#[derive(Debug, Error)]
#[error("Cannot build HTTP client: {0}")]
pub struct ClientBuildError(#[from] reqwest::Error);

/// The collaborator clients of one process.
#[derive(Clone)]
pub struct ServiceClients {
    /// Contract configuration service.
    pub contracts: Arc<HttpContractDirectory>,
    /// Leave-request workflow service.
    pub leave_requests: Arc<HttpLeaveRequestSource>,
}

impl ServiceClients {
    /// Builds both clients around one connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn from_config(config: &ServicesConfig) -> Result<Self, ClientBuildError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("saldo/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            contracts: Arc::new(HttpContractDirectory::new(
                client.clone(),
                &config.contracts_base_url,
            )),
            leave_requests: Arc::new(HttpLeaveRequestSource::new(
                client,
                &config.leave_requests_base_url,
            )),
        })
    }
}
