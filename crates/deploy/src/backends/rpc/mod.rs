//! JSON-RPC backend: deterministic deployment and registry access on a live chain.
//!
//! Transactions are sent with `eth_sendTransaction` from the operator account,
//! which must be unlocked on the node (or a signing proxy in front of it).

mod artifacts;

pub use artifacts::ArtifactStore;

use std::path::PathBuf;

use alloy_core::primitives::{Address, B256, Bytes};
use alloy_core::sol_types::{SolCall, SolValue};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    executor::{DeployRequest, DeployStatus, DeploymentExecutor, DeploymentResult, RegistryClient},
    registry::IStrategyFactory,
    rpc,
};

use super::{CREATE2_DEPLOYER, PROXY_ARTIFACT};

/// Default time to wait for a transaction receipt.
pub const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 300;

/// Configuration for the RPC backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcBackendConfig {
    /// JSON-RPC endpoint of the target chain.
    pub rpc_url: Url,
    /// Directory holding `<Name>.json` artifacts.
    pub artifacts: PathBuf,
    /// Account transactions are sent from.
    pub operator: Address,
    /// Maximum time to wait for each receipt.
    pub receipt_timeout_secs: u64,
}

impl RpcBackendConfig {
    pub fn new(rpc_url: Url, artifacts: impl Into<PathBuf>, operator: Address) -> Self {
        Self {
            rpc_url,
            artifacts: artifacts.into(),
            operator,
            receipt_timeout_secs: DEFAULT_RECEIPT_TIMEOUT_SECS,
        }
    }
}

/// Deployment and registry backend talking to a node over JSON-RPC.
#[derive(Debug)]
pub struct RpcBackend {
    client: reqwest::Client,
    config: RpcBackendConfig,
    artifacts: ArtifactStore,
}

impl RpcBackend {
    /// Connect to the node, checking its chain id when `expected_chain_id` is set.
    pub async fn connect(config: RpcBackendConfig, expected_chain_id: Option<u64>) -> Result<Self> {
        let client = rpc::create_client()?;

        let chain_id = rpc::chain_id(&client, config.rpc_url.as_str())
            .await
            .context("Failed to query chain id - is the RPC endpoint reachable?")?;
        if let Some(expected) = expected_chain_id.filter(|expected| *expected != chain_id) {
            anyhow::bail!("RPC endpoint serves chain {chain_id}, expected {expected}");
        }

        let deployer_code = rpc::get_code(&client, config.rpc_url.as_str(), CREATE2_DEPLOYER).await?;
        if deployer_code.is_empty() {
            anyhow::bail!("No deterministic deployer at {CREATE2_DEPLOYER} on chain {chain_id}");
        }

        let artifacts = ArtifactStore::new(&config.artifacts);
        tracing::info!(
            rpc_url = %config.rpc_url,
            chain_id,
            operator = %config.operator,
            artifacts = %artifacts.dir().display(),
            "Connected to chain"
        );

        Ok(Self {
            client,
            config,
            artifacts,
        })
    }

    fn url(&self) -> &str {
        self.config.rpc_url.as_str()
    }

    /// Deploy `creation_code` through the deterministic deployer unless code already sits at its address.
    async fn place(&self, name: &str, salt: B256, creation_code: Bytes) -> Result<(Address, DeployStatus)> {
        let address = CREATE2_DEPLOYER.create2_from_code(salt.0, &creation_code);

        let existing = rpc::get_code(&self.client, self.url(), address).await?;
        if !existing.is_empty() {
            tracing::debug!(contract = %name, %address, "Code already deployed, reusing");
            return Ok((address, DeployStatus::Reused));
        }

        let mut data = salt.to_vec();
        data.extend_from_slice(&creation_code);

        tracing::debug!(contract = %name, %address, "Sending deployment transaction...");
        let receipt = rpc::send_transaction(
            &self.client,
            self.url(),
            self.config.operator,
            CREATE2_DEPLOYER,
            &data.into(),
            self.config.receipt_timeout_secs,
        )
        .await
        .with_context(|| format!("Failed to deploy {name}"))?;

        let deployed = rpc::get_code(&self.client, self.url(), address).await?;
        if deployed.is_empty() {
            anyhow::bail!(
                "Deployment of {name} in {} left no code at {address}",
                receipt.transaction_hash
            );
        }

        Ok((address, DeployStatus::Deployed))
    }
}

impl DeploymentExecutor for RpcBackend {
    async fn deploy(&self, request: &DeployRequest) -> Result<DeploymentResult> {
        let mut creation_code = self.artifacts.creation_code(&request.name)?.to_vec();
        creation_code.extend_from_slice(&request.encoded_args());

        let (implementation, implementation_status) = self
            .place(&request.name, request.salt, creation_code.into())
            .await?;

        let Some(proxy) = &request.proxy else {
            return Ok(DeploymentResult {
                address: implementation,
                implementation_address: None,
                status: implementation_status,
            });
        };

        let mut proxy_code = self.artifacts.creation_code(PROXY_ARTIFACT)?.to_vec();
        proxy_code.extend_from_slice(
            &(implementation, proxy.owner, proxy.calldata.clone()).abi_encode_params(),
        );

        let (address, status) = self
            .place(PROXY_ARTIFACT, request.salt, proxy_code.into())
            .await
            .with_context(|| format!("Failed to deploy proxy for {}", request.name))?;

        Ok(DeploymentResult {
            address,
            implementation_address: Some(implementation),
            status,
        })
    }
}

impl RegistryClient for RpcBackend {
    async fn is_registered(&self, registry: Address, component: Address) -> Result<bool> {
        let call = IStrategyFactory::isSubfactoryCall { factory: component };
        let output = rpc::eth_call(&self.client, self.url(), registry, &call.abi_encode().into())
            .await
            .context("isSubfactory call failed")?;

        let decoded = IStrategyFactory::isSubfactoryCall::abi_decode_returns(&output, true)
            .context("Failed to decode isSubfactory result")?;
        Ok(decoded._0)
    }

    async fn register_strategy_type(
        &self,
        registry: Address,
        key: &str,
        component: Address,
        operator: Address,
    ) -> Result<()> {
        let call = IStrategyFactory::registerStrategyTypeCall {
            key: key.to_string(),
            factory: component,
        };

        let receipt = rpc::send_transaction(
            &self.client,
            self.url(),
            operator,
            registry,
            &call.abi_encode().into(),
            self.config.receipt_timeout_secs,
        )
        .await
        .context("registerStrategyType transaction failed")?;

        tracing::debug!(key, tx_hash = %receipt.transaction_hash, "Strategy type registered");
        Ok(())
    }
}
