//! Sub-component deployment and at-most-once registration.

use alloy_core::primitives::{Address, Bytes};
use derive_more::Deref;
use serde::{Deserialize, Serialize};

use crate::{
    config::RunConfig,
    error::{DeployError, DeployResult},
    executor::{
        DeployRequest, DeploymentExecutor, DeploymentResult, ProxyInit, RegistryClient, bounded,
        log_deployment,
    },
    plan::{ArgContext, ComponentSpec, DeploymentPlan, resolve_args},
    resolver::ChainProfile,
};

/// What the loop did with the registry for one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RegistrationStatus {
    /// The registry already knew the component; no write was issued.
    AlreadyRegistered,
    /// The component was registered during this run.
    Registered,
}

/// A deployed sub-component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedComponent {
    pub name: String,
    pub registration_key: String,
    /// ABI-encoded constructor arguments, kept for verification.
    pub constructor_args: Bytes,
    pub result: DeploymentResult,
    pub registration: RegistrationStatus,
}

/// Deployed sub-components in deployment order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Deref)]
pub struct DeployedComponents(Vec<DeployedComponent>);

impl DeployedComponents {
    /// Look up a component by name.
    pub fn get(&self, name: &str) -> Option<&DeployedComponent> {
        self.0.iter().find(|c| c.name == name)
    }

    /// How many registry writes the run issued.
    pub fn registrations(&self) -> usize {
        self.0
            .iter()
            .filter(|c| c.registration == RegistrationStatus::Registered)
            .count()
    }
}

/// Deploy every applicable sub-component in plan order and register the ones
/// the registry does not know yet.
///
/// A deployment failure aborts the loop. A registry read or write failure is
/// not caught either: a deployed but unregistered component must surface.
pub async fn deploy_and_register_all<B>(
    backend: &B,
    registry: &DeploymentResult,
    profile: &ChainProfile,
    plan: &DeploymentPlan,
    config: &RunConfig,
) -> DeployResult<DeployedComponents>
where
    B: DeploymentExecutor + RegistryClient,
{
    let ctx = ArgContext {
        roots: profile.roots,
        operator: config.operator,
        registry: Some(registry.address),
    };

    let mut deployed = Vec::with_capacity(plan.components.len());

    for spec in &plan.components {
        if !spec.applies_to(&profile.chain_id) {
            tracing::info!(
                component = %spec.name,
                chain = %profile.chain_id,
                "Skipping component, not applicable to this chain"
            );
            continue;
        }

        let component = deploy_and_register(backend, registry.address, spec, &ctx, config).await?;
        deployed.push(component);
    }

    Ok(DeployedComponents(deployed))
}

async fn deploy_and_register<B>(
    backend: &B,
    registry: Address,
    spec: &ComponentSpec,
    ctx: &ArgContext,
    config: &RunConfig,
) -> DeployResult<DeployedComponent>
where
    B: DeploymentExecutor + RegistryClient,
{
    let args = resolve_args(&spec.constructor_args, ctx)?;
    let mut request = DeployRequest::new(&spec.name, args, spec.salt.unwrap_or(config.salt));
    if spec.is_proxied {
        request = request.with_proxy(ProxyInit {
            owner: config.operator,
            calldata: Bytes::new(),
        });
    }
    let constructor_args = request.encoded_args();

    let result = bounded(
        config.call_timeout(),
        || format!("deployment of `{}`", spec.name),
        backend.deploy(&request),
    )
    .await?
    .map_err(|source| DeployError::DeploymentFailure {
        name: spec.name.clone(),
        source,
    })?;
    log_deployment(&spec.name, &result);

    if spec.is_proxied && result.implementation_address.is_none() {
        return Err(DeployError::DeploymentFailure {
            name: spec.name.clone(),
            source: anyhow::anyhow!("executor returned no implementation address for a proxy"),
        });
    }

    let address = result.address;
    let known = bounded(
        config.call_timeout(),
        || format!("registry lookup of `{}`", spec.name),
        backend.is_registered(registry, address),
    )
    .await?
    .map_err(|source| DeployError::RegistryQueryFailure {
        name: spec.name.clone(),
        registry,
        address,
        source,
    })?;

    let registration = if known {
        tracing::info!(
            component = %spec.name,
            key = %spec.registration_key,
            %address,
            "Already registered"
        );
        RegistrationStatus::AlreadyRegistered
    } else {
        tracing::info!(
            component = %spec.name,
            key = %spec.registration_key,
            %address,
            "Registering..."
        );
        bounded(
            config.call_timeout(),
            || format!("registration of `{}`", spec.registration_key),
            backend.register_strategy_type(
                registry,
                &spec.registration_key,
                address,
                config.operator,
            ),
        )
        .await?
        .map_err(|source| DeployError::RegistrationFailure {
            key: spec.registration_key.clone(),
            registry,
            address,
            source,
        })?;
        tracing::info!(key = %spec.registration_key, %address, "Registered");
        RegistrationStatus::Registered
    };

    Ok(DeployedComponent {
        name: spec.name.clone(),
        registration_key: spec.registration_key.clone(),
        constructor_args,
        result,
        registration,
    })
}
