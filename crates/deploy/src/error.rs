//! Error taxonomy for a deployment run.

use std::time::Duration;

use alloy_core::primitives::Address;

/// Errors surfaced by the orchestration core.
///
/// Every variant except [`DeployError::VerificationFailure`] is fatal and aborts
/// the run. Verification failures are folded into log lines by the
/// verification dispatcher and never propagate past it.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// A required dependency address could not be resolved for the target chain.
    #[error("missing configuration: no `{dependency}` address for chain `{chain}`")]
    MissingConfiguration { dependency: &'static str, chain: String },

    /// A configuration value was present but unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The deployment executor failed to deploy an artifact.
    #[error("failed to deploy `{name}`")]
    DeploymentFailure {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// Reading the registry membership of a sub-component failed.
    #[error("failed to query registry {registry} for `{name}` at {address}")]
    RegistryQueryFailure {
        name: String,
        registry: Address,
        address: Address,
        #[source]
        source: anyhow::Error,
    },

    /// The registry write failed, leaving a deployed but unregistered component.
    #[error("failed to register `{key}` ({address}) in registry {registry}")]
    RegistrationFailure {
        key: String,
        registry: Address,
        address: Address,
        #[source]
        source: anyhow::Error,
    },

    /// An external call did not complete within the configured bound.
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// Another local run already holds the lock for this chain.
    #[error("another run already holds the deployment lock for chain `{chain}`")]
    RunLocked { chain: String },

    /// A verification attempt failed. Only ever observed inside the dispatcher.
    #[error("verification of {address} on `{chain}` failed")]
    VerificationFailure {
        chain: String,
        address: Address,
        #[source]
        source: anyhow::Error,
    },
}

impl DeployError {
    /// Whether this error must terminate the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::VerificationFailure { .. })
    }
}

/// Result alias for the orchestration core.
pub type DeployResult<T> = Result<T, DeployError>;
