//! Collaborator interfaces the core drives: deployment and registry access.
//!
//! The core never talks to a network itself. It hands a [`DeployRequest`] to a
//! [`DeploymentExecutor`] and queries or appends registry state through a
//! [`RegistryClient`]. Both must be deterministic for a given chain state.

use std::future::Future;
use std::time::Duration;

use alloy_core::dyn_abi::DynSolValue;
use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployResult};

/// Whether a deterministic deployment created code or found it in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeployStatus {
    Deployed,
    Reused,
}

/// Output of deploying one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    /// Address callers interact with (the proxy for proxied artifacts).
    pub address: Address,
    /// Implementation behind the proxy. Present iff the artifact is proxied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_address: Option<Address>,
    pub status: DeployStatus,
}

/// Proxy wiring for a proxied artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyInit {
    /// Proxy admin.
    pub owner: Address,
    /// Initializer calldata executed once, when the proxy is created.
    pub calldata: Bytes,
}

/// A deterministic deployment request.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployRequest {
    /// Artifact name.
    pub name: String,
    /// Constructor arguments, in order.
    pub constructor_args: Vec<DynSolValue>,
    pub salt: B256,
    /// Set for proxied artifacts.
    pub proxy: Option<ProxyInit>,
}

impl DeployRequest {
    pub fn new(name: impl Into<String>, constructor_args: Vec<DynSolValue>, salt: B256) -> Self {
        Self {
            name: name.into(),
            constructor_args,
            salt,
            proxy: None,
        }
    }

    pub fn with_proxy(mut self, proxy: ProxyInit) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// ABI-encoded constructor arguments, as appended to creation code.
    pub fn encoded_args(&self) -> Bytes {
        encode_args(&self.constructor_args)
    }
}

/// ABI-encode an argument list as constructor parameters.
pub fn encode_args(args: &[DynSolValue]) -> Bytes {
    if args.is_empty() {
        return Bytes::new();
    }
    DynSolValue::Tuple(args.to_vec()).abi_encode_params().into()
}

/// Deploys named artifacts deterministically.
///
/// Identical `(artifact, args, salt, chain)` must always yield the same address.
/// Deploying something that already exists returns its address with
/// [`DeployStatus::Reused`] and must not run the proxy initializer again.
pub trait DeploymentExecutor: Send + Sync {
    fn deploy(&self, request: &DeployRequest)
    -> impl Future<Output = Result<DeploymentResult>> + Send;
}

/// Reads and appends registry membership.
pub trait RegistryClient: Send + Sync {
    /// Whether `component` is already a known sub-factory of `registry`.
    fn is_registered(
        &self,
        registry: Address,
        component: Address,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Register `component` under `key`, authenticated as `operator`.
    fn register_strategy_type(
        &self,
        registry: Address,
        key: &str,
        component: Address,
        operator: Address,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Await `fut`, bounded by `limit` when set.
pub(crate) async fn bounded<F: Future>(
    limit: Option<Duration>,
    operation: impl FnOnce() -> String,
    fut: F,
) -> DeployResult<F::Output> {
    match limit {
        None => Ok(fut.await),
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| DeployError::Timeout {
                operation: operation(),
                after,
            }),
    }
}

/// Log the deployment record for one artifact.
pub(crate) fn log_deployment(name: &str, result: &DeploymentResult) {
    match result.implementation_address {
        Some(implementation) => tracing::info!(
            component = %name,
            address = %result.address,
            %implementation,
            status = %result.status,
            "Deployed behind proxy"
        ),
        None => tracing::info!(
            component = %name,
            address = %result.address,
            status = %result.status,
            "Deployed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::{U256, address};

    #[test]
    fn test_encode_empty_args() {
        assert!(encode_args(&[]).is_empty());
    }

    #[test]
    fn test_encode_two_addresses() {
        let a = address!("0x1000000000000000000000000000000000000001");
        let b = address!("0x2000000000000000000000000000000000000002");
        let encoded = encode_args(&[DynSolValue::Address(a), DynSolValue::Address(b)]);
        assert_eq!(encoded.len(), 64);
        assert_eq!(&encoded[12..32], a.as_slice());
        assert_eq!(&encoded[44..64], b.as_slice());
    }

    #[test]
    fn test_encode_uint() {
        let encoded = encode_args(&[DynSolValue::Uint(U256::from(7), 256)]);
        assert_eq!(encoded.len(), 32);
        assert_eq!(encoded[31], 7);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result = bounded(
            Some(Duration::from_millis(10)),
            || "sleep".to_string(),
            tokio::time::sleep(Duration::from_secs(5)),
        )
        .await;
        assert!(matches!(result, Err(DeployError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_bounded_unbounded() {
        let value = bounded(None, String::new, async { 42 }).await.unwrap();
        assert_eq!(value, 42);
    }
}
