//! Best-effort, chain-routed verification of deployed artifacts.
//!
//! Every attempt is isolated: whatever goes wrong is reduced to a log line and a
//! [`VerificationOutcome::Failed`]. Nothing here can abort a run.

use std::future::Future;
use std::time::Duration;

use alloy_core::primitives::{Address, Bytes};
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{
    chains::VerificationBackend, config::RunConfig, error::DeployError, executor::bounded,
    resolver::ChainProfile,
};

/// One artifact to verify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationTask {
    /// Network name of the chain.
    pub chain_id: String,
    /// Artifact name.
    pub contract: String,
    pub address: Address,
    /// ABI-encoded constructor arguments.
    pub constructor_args: Bytes,
}

/// What a verification service receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub backend: VerificationBackend,
    /// EIP-155 chain id, when known.
    pub evm_chain_id: Option<u64>,
    pub task: VerificationTask,
    /// Explorer credential, when configured.
    pub api_key: Option<String>,
}

/// An external verification service.
pub trait VerificationService: Send + Sync {
    fn verify(&self, request: &VerificationRequest) -> impl Future<Output = Result<()>> + Send;
}

/// Why a task was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Verification is turned off for the run.
    Disabled,
    /// The chain has no verification backend.
    UnsupportedChain,
}

/// Result of one verification task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationOutcome {
    Skipped { reason: SkipReason },
    Verified { backend: VerificationBackend },
    Failed { backend: VerificationBackend, reason: String },
}

impl VerificationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// A task together with its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub task: VerificationTask,
    pub outcome: VerificationOutcome,
}

/// Routes verification tasks to the chain's backend with a fixed delay before each.
pub struct VerificationDispatcher<'a, V> {
    service: &'a V,
    enabled: bool,
    delay: Duration,
    api_key: Option<&'a str>,
    timeout: Option<Duration>,
}

impl<'a, V: VerificationService> VerificationDispatcher<'a, V> {
    pub fn new(service: &'a V, config: &'a RunConfig) -> Self {
        Self {
            service,
            enabled: config.verification.enabled,
            delay: config.verification_delay(),
            api_key: config.explorer_api_key(),
            timeout: config.call_timeout(),
        }
    }

    /// Verify one task. Never fails.
    pub async fn verify(
        &self,
        profile: &ChainProfile,
        task: VerificationTask,
    ) -> VerificationOutcome {
        if !self.enabled {
            return VerificationOutcome::Skipped {
                reason: SkipReason::Disabled,
            };
        }

        let Some(backend) = profile.verification_backend() else {
            tracing::debug!(
                chain = %profile.chain_id,
                contract = %task.contract,
                "No verification backend for chain"
            );
            return VerificationOutcome::Skipped {
                reason: SkipReason::UnsupportedChain,
            };
        };

        tracing::info!(
            contract = %task.contract,
            address = %task.address,
            %backend,
            "Verifying..."
        );
        tokio::time::sleep(self.delay).await;

        if backend == VerificationBackend::Explorer && self.api_key.is_none() {
            tracing::warn!(
                chain = %profile.chain_id,
                "No explorer API key configured, attempting verification anyway"
            );
        }

        let request = VerificationRequest {
            backend,
            evm_chain_id: profile.evm_chain_id,
            task: task.clone(),
            api_key: self.api_key.map(str::to_string),
        };

        let attempt = match bounded(
            self.timeout,
            || format!("verification of {}", task.address),
            self.service.verify(&request),
        )
        .await
        {
            Ok(inner) => inner,
            Err(timeout) => Err(anyhow::Error::new(timeout)),
        };

        match attempt {
            Ok(()) => {
                tracing::info!(contract = %task.contract, address = %task.address, "Verified");
                VerificationOutcome::Verified { backend }
            }
            Err(source) => {
                let reason = format!("{source:#}");
                let failure = DeployError::VerificationFailure {
                    chain: task.chain_id.clone(),
                    address: task.address,
                    source,
                };
                tracing::warn!(
                    contract = %task.contract,
                    error = %reason,
                    "{failure}, continuing"
                );
                VerificationOutcome::Failed { backend, reason }
            }
        }
    }

    /// Verify every task in order. Each task is independent of the others.
    pub async fn verify_all(
        &self,
        profile: &ChainProfile,
        tasks: Vec<VerificationTask>,
    ) -> Vec<VerificationRecord> {
        let mut records = Vec::with_capacity(tasks.len());
        for task in tasks {
            let outcome = self.verify(profile, task.clone()).await;
            records.push(VerificationRecord { task, outcome });
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::address;

    use crate::{
        backends::simulated::RecordingVerifier, config::OperatorOverrides,
        resolver::ChainResolver,
    };

    const OPERATOR: Address = address!("0xf39Fd6e51aad88F6F4Ce6aB8827279cffFb92266");
    const A: Address = address!("0x00000000000000000000000000000000000000aa");
    const B: Address = address!("0x00000000000000000000000000000000000000bb");

    fn config(chain: &str) -> RunConfig {
        let mut config = RunConfig::new(chain, OPERATOR);
        config.verification.delay_secs = 0;
        config
    }

    fn profile(chain: &str) -> ChainProfile {
        ChainResolver::default()
            .resolve(chain, &OperatorOverrides::default())
            .unwrap()
    }

    fn task(chain: &str, contract: &str, address: Address) -> VerificationTask {
        VerificationTask {
            chain_id: chain.to_string(),
            contract: contract.to_string(),
            address,
            constructor_args: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let verifier = RecordingVerifier::new();
        verifier.fail_for(A);
        let config = config("ftm");
        let dispatcher = VerificationDispatcher::new(&verifier, &config);

        let records = dispatcher
            .verify_all(&profile("ftm"), vec![task("ftm", "A", A), task("ftm", "B", B)])
            .await;

        assert!(records[0].outcome.is_failure());
        assert_eq!(
            records[1].outcome,
            VerificationOutcome::Verified {
                backend: VerificationBackend::Explorer
            }
        );
        assert_eq!(verifier.attempts().len(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_chain_is_noop() {
        let verifier = RecordingVerifier::new();
        let config = config("fuse");
        let dispatcher = VerificationDispatcher::new(&verifier, &config);

        let outcome = dispatcher.verify(&profile("fuse"), task("fuse", "A", A)).await;
        assert_eq!(
            outcome,
            VerificationOutcome::Skipped {
                reason: SkipReason::UnsupportedChain
            }
        );
        assert!(verifier.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_disabled() {
        let verifier = RecordingVerifier::new();
        let mut config = config("ftm");
        config.verification.enabled = false;
        let dispatcher = VerificationDispatcher::new(&verifier, &config);

        let outcome = dispatcher.verify(&profile("ftm"), task("ftm", "A", A)).await;
        assert_eq!(
            outcome,
            VerificationOutcome::Skipped {
                reason: SkipReason::Disabled
            }
        );
        assert!(verifier.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential_still_attempts() {
        let verifier = RecordingVerifier::new();
        let config = config("bsc");
        let dispatcher = VerificationDispatcher::new(&verifier, &config);

        dispatcher.verify(&profile("bsc"), task("bsc", "A", A)).await;

        let attempts = verifier.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].backend, VerificationBackend::Explorer);
        assert_eq!(attempts[0].evm_chain_id, Some(56));
        assert!(attempts[0].api_key.is_none());
    }

    #[tokio::test]
    async fn test_sourcify_routing_and_key_passthrough() {
        let verifier = RecordingVerifier::new();
        let mut config = config("celo");
        config.explorer_api_key = Some("KEY".to_string());
        let dispatcher = VerificationDispatcher::new(&verifier, &config);

        dispatcher.verify(&profile("celo"), task("celo", "A", A)).await;

        let attempts = verifier.attempts();
        assert_eq!(attempts[0].backend, VerificationBackend::Sourcify);
        assert_eq!(attempts[0].api_key.as_deref(), Some("KEY"));
    }

    #[tokio::test]
    async fn test_slow_verifier_times_out_without_failing_run() {
        let verifier = RecordingVerifier::new().with_latency(Duration::from_secs(5));
        let mut config = config("ftm");
        config.call_timeout_secs = Some(1);
        let dispatcher = VerificationDispatcher::new(&verifier, &config);

        let outcome = dispatcher.verify(&profile("ftm"), task("ftm", "A", A)).await;
        match outcome {
            VerificationOutcome::Failed { reason, .. } => assert!(reason.contains("timed out")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
