//! Root registry: contract interface and bootstrap.

use alloy_core::primitives::{Bytes, keccak256};
use alloy_core::sol;

use crate::{
    config::RunConfig,
    executor::{
        DeployRequest, DeploymentExecutor, DeploymentResult, ProxyInit, bounded, encode_args,
        log_deployment,
    },
    error::{DeployError, DeployResult},
    plan::{ArgContext, ConstructorArg, RegistrySpec, resolve_args},
    resolver::ChainProfile,
};

/// Name of the initializer run through the registry proxy.
pub const INITIALIZER: &str = "initialize";

sol! {
    /// Registry surface used during bring-up.
    interface IStrategyFactory {
        function initialize(address vault, address zap, address operator) external;
        function isSubfactory(address factory) external view returns (bool);
        function registerStrategyType(string key, address factory) external;
    }
}

/// Calldata for `method(args...)`: 4-byte selector followed by the encoded arguments.
pub fn initializer_calldata(
    method: &str,
    args: &[ConstructorArg],
    values: &[alloy_core::dyn_abi::DynSolValue],
) -> Bytes {
    let signature = format!(
        "{method}({})",
        args.iter()
            .map(ConstructorArg::sol_type)
            .collect::<Vec<_>>()
            .join(",")
    );
    let selector = &keccak256(signature.as_bytes())[..4];

    let mut calldata = selector.to_vec();
    calldata.extend_from_slice(&encode_args(values));
    calldata.into()
}

/// Deploy the registry behind a proxy and initialize it once.
///
/// A re-run lands on the same deterministic address; the executor reports it as
/// reused and the initializer is not executed again. Any failure is fatal.
pub async fn bootstrap_registry<E: DeploymentExecutor>(
    executor: &E,
    spec: &RegistrySpec,
    profile: &ChainProfile,
    config: &RunConfig,
) -> DeployResult<DeploymentResult> {
    let ctx = ArgContext {
        roots: profile.roots,
        operator: config.operator,
        registry: None,
    };
    let init_values = resolve_args(&spec.init_args, &ctx)?;
    let calldata = initializer_calldata(INITIALIZER, &spec.init_args, &init_values);

    let request = DeployRequest::new(&spec.name, Vec::new(), spec.salt.unwrap_or(config.salt))
        .with_proxy(ProxyInit {
            owner: config.operator,
            calldata,
        });

    tracing::info!(
        registry = %spec.name,
        chain = %profile.chain_id,
        vault = %profile.roots.vault,
        zap = %profile.roots.zap,
        operator = %config.operator,
        "Bootstrapping registry..."
    );

    let result = bounded(
        config.call_timeout(),
        || format!("deployment of `{}`", spec.name),
        executor.deploy(&request),
    )
    .await?
    .map_err(|source| DeployError::DeploymentFailure {
        name: spec.name.clone(),
        source,
    })?;

    if result.implementation_address.is_none() {
        return Err(DeployError::DeploymentFailure {
            name: spec.name.clone(),
            source: anyhow::anyhow!("executor returned no implementation address for a proxy"),
        });
    }

    log_deployment(&spec.name, &result);
    Ok(result)
}
