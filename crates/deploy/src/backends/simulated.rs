//! In-process chain used for dry runs and tests.
//!
//! Addresses are derived the same way the CREATE2 deployer derives them, from a
//! synthetic creation code built out of the artifact name and its arguments. A
//! proxy is only initialized when it is first created, and only a proxy whose
//! initializer is the registry's `initialize` call gets registry storage.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, keccak256};
use alloy_core::sol_types::{SolCall, SolValue};
use anyhow::{Context, Result};

use crate::{
    executor::{DeployRequest, DeployStatus, DeploymentExecutor, DeploymentResult, RegistryClient},
    registry::IStrategyFactory,
    verification::{VerificationRequest, VerificationService},
};

use super::{CREATE2_DEPLOYER, PROXY_ARTIFACT};

/// Registry storage of one deployed registry.
#[derive(Debug, Clone, Default)]
struct RegistryState {
    owner: Address,
    strategy_types: BTreeMap<String, Address>,
    subfactories: HashSet<Address>,
}

#[derive(Debug, Default)]
struct ChainState {
    /// Address -> artifact name.
    code: HashMap<Address, String>,
    /// Proxy address -> initializer calldata it was created with.
    initialized: HashMap<Address, Bytes>,
    registries: HashMap<Address, RegistryState>,
    stats: SimulationStats,
    fail_deployments: HashSet<String>,
    fail_registrations: HashSet<String>,
}

/// Call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationStats {
    pub deploy_calls: usize,
    /// Deployments that created new code.
    pub fresh_deployments: usize,
    /// Initializer executions.
    pub initializations: usize,
    pub registry_reads: usize,
    pub registry_writes: usize,
}

/// Simulated chain implementing [`DeploymentExecutor`] and [`RegistryClient`].
#[derive(Debug, Default)]
pub struct SimulatedChain {
    state: Mutex<ChainState>,
    latency: Option<Duration>,
}

impl SimulatedChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every deployment of `name` fail.
    pub fn fail_deployment_of(&self, name: impl Into<String>) {
        self.state().fail_deployments.insert(name.into());
    }

    /// Make every registration under `key` revert.
    pub fn fail_registration_of(&self, key: impl Into<String>) {
        self.state().fail_registrations.insert(key.into());
    }

    pub fn stats(&self) -> SimulationStats {
        self.state().stats
    }

    /// Registered strategy types of the registry at `registry`.
    pub fn registered_types(&self, registry: Address) -> BTreeMap<String, Address> {
        self.state()
            .registries
            .get(&registry)
            .map(|r| r.strategy_types.clone())
            .unwrap_or_default()
    }

    /// Artifact deployed at `address`, if any.
    pub fn code_at(&self, address: Address) -> Option<String> {
        self.state().code.get(&address).cloned()
    }

    /// Initializer calldata the proxy at `address` ran.
    pub fn initializer_of(&self, address: Address) -> Option<Bytes> {
        self.state().initialized.get(&address).cloned()
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Place `name` at its deterministic address, reusing existing code.
    fn place(state: &mut ChainState, name: &str, salt: B256, init_code: &[u8]) -> (Address, DeployStatus) {
        let address = CREATE2_DEPLOYER.create2_from_code(salt.0, init_code);
        if state.code.contains_key(&address) {
            return (address, DeployStatus::Reused);
        }
        state.code.insert(address, name.to_string());
        state.stats.fresh_deployments += 1;
        (address, DeployStatus::Deployed)
    }
}

/// Synthetic creation code: hash of the artifact name followed by the encoded arguments.
fn creation_code(name: &str, encoded_args: &[u8]) -> Vec<u8> {
    let mut code = keccak256(name.as_bytes()).to_vec();
    code.extend_from_slice(encoded_args);
    code
}

impl DeploymentExecutor for SimulatedChain {
    async fn deploy(&self, request: &DeployRequest) -> Result<DeploymentResult> {
        self.simulate_latency().await;

        let mut state = self.state();
        state.stats.deploy_calls += 1;

        if state.fail_deployments.contains(&request.name) {
            anyhow::bail!("simulated deployment failure for `{}`", request.name);
        }

        let code = creation_code(&request.name, &request.encoded_args());
        let (implementation, implementation_status) =
            Self::place(&mut state, &request.name, request.salt, &code);

        let Some(proxy) = &request.proxy else {
            return Ok(DeploymentResult {
                address: implementation,
                implementation_address: None,
                status: implementation_status,
            });
        };

        let proxy_args = (implementation, proxy.owner, proxy.calldata.clone()).abi_encode_params();
        let proxy_code = creation_code(PROXY_ARTIFACT, &proxy_args);
        let (address, status) = Self::place(&mut state, PROXY_ARTIFACT, request.salt, &proxy_code);

        if status == DeployStatus::Deployed {
            state.initialized.insert(address, proxy.calldata.clone());
            state.stats.initializations += 1;
            if proxy
                .calldata
                .starts_with(&IStrategyFactory::initializeCall::SELECTOR)
            {
                state.registries.insert(
                    address,
                    RegistryState {
                        owner: proxy.owner,
                        ..Default::default()
                    },
                );
            }
        }

        Ok(DeploymentResult {
            address,
            implementation_address: Some(implementation),
            status,
        })
    }
}

impl RegistryClient for SimulatedChain {
    async fn is_registered(&self, registry: Address, component: Address) -> Result<bool> {
        self.simulate_latency().await;

        let mut state = self.state();
        state.stats.registry_reads += 1;
        let registry = state
            .registries
            .get(&registry)
            .with_context(|| format!("no registry deployed at {registry}"))?;
        Ok(registry.subfactories.contains(&component))
    }

    async fn register_strategy_type(
        &self,
        registry: Address,
        key: &str,
        component: Address,
        operator: Address,
    ) -> Result<()> {
        self.simulate_latency().await;

        let mut state = self.state();
        if state.fail_registrations.contains(key) {
            anyhow::bail!("simulated revert while registering `{key}`");
        }
        if !state.code.contains_key(&component) {
            anyhow::bail!("no contract deployed at {component}");
        }

        let registry_state = state
            .registries
            .get_mut(&registry)
            .with_context(|| format!("no registry deployed at {registry}"))?;

        if registry_state.owner != operator {
            anyhow::bail!("execution reverted: caller {operator} is not the owner");
        }
        if registry_state.strategy_types.contains_key(key) {
            anyhow::bail!("execution reverted: strategy type `{key}` already registered");
        }

        registry_state.strategy_types.insert(key.to_string(), component);
        registry_state.subfactories.insert(component);
        state.stats.registry_writes += 1;
        Ok(())
    }
}

/// Verification service that records requests and fails on demand.
#[derive(Debug, Default)]
pub struct RecordingVerifier {
    attempts: Mutex<Vec<VerificationRequest>>,
    failing: Mutex<HashSet<Address>>,
    failing_all: AtomicBool,
    latency: Option<Duration>,
}

impl RecordingVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make verification of `address` fail.
    pub fn fail_for(&self, address: Address) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address);
    }

    /// Make every verification fail.
    pub fn fail_all(&self) {
        self.failing_all.store(true, Ordering::Relaxed);
    }

    /// Every request received so far, in order.
    pub fn attempts(&self) -> Vec<VerificationRequest> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl VerificationService for RecordingVerifier {
    async fn verify(&self, request: &VerificationRequest) -> Result<()> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let failing = self.failing_all.load(Ordering::Relaxed)
            || self
                .failing
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&request.task.address);
        if failing {
            anyhow::bail!("simulated verification failure for {}", request.task.address);
        }

        tracing::debug!(
            contract = %request.task.contract,
            address = %request.task.address,
            backend = %request.backend,
            "Simulated verification accepted"
        );
        Ok(())
    }
}
