//! Deployment plans: the registry and the ordered sub-components to bring up.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use alloy_core::dyn_abi::DynSolValue;
use alloy_core::primitives::{Address, B256, U256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    error::{DeployError, DeployResult},
    resolver::RootDependencies,
};

/// Name of the registry artifact in the default catalogue.
pub const REGISTRY_ARTIFACT: &str = "StrategyFactory";

/// A constructor or initializer argument, resolved at deploy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructorArg {
    /// Address of the registry deployed in this run.
    Registry,
    /// Resolved vault / registry-owner address.
    Vault,
    /// Resolved zap address.
    Zap,
    /// The deploying operator.
    Operator,
    /// A literal address.
    Address(Address),
    /// A literal uint256.
    Uint(U256),
}

/// Addresses symbolic arguments resolve against.
#[derive(Debug, Clone, Copy)]
pub struct ArgContext {
    pub roots: RootDependencies,
    pub operator: Address,
    /// Unset while the registry itself is being deployed.
    pub registry: Option<Address>,
}

impl ConstructorArg {
    /// Solidity type of the resolved value.
    pub fn sol_type(&self) -> &'static str {
        match self {
            Self::Uint(_) => "uint256",
            _ => "address",
        }
    }

    pub fn resolve(&self, ctx: &ArgContext) -> DeployResult<DynSolValue> {
        let value = match self {
            Self::Registry => DynSolValue::Address(ctx.registry.ok_or_else(|| {
                DeployError::InvalidConfiguration(
                    "the registry address is not available to its own arguments".to_string(),
                )
            })?),
            Self::Vault => DynSolValue::Address(ctx.roots.vault),
            Self::Zap => DynSolValue::Address(ctx.roots.zap),
            Self::Operator => DynSolValue::Address(ctx.operator),
            Self::Address(address) => DynSolValue::Address(*address),
            Self::Uint(value) => DynSolValue::Uint(*value, 256),
        };
        Ok(value)
    }
}

/// Resolve an argument list in order.
pub fn resolve_args(args: &[ConstructorArg], ctx: &ArgContext) -> DeployResult<Vec<DynSolValue>> {
    args.iter().map(|arg| arg.resolve(ctx)).collect()
}

/// The root registry component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySpec {
    /// Artifact name.
    pub name: String,
    /// Arguments of `initialize`, run once through the proxy.
    pub init_args: Vec<ConstructorArg>,
    /// Salt override; the run salt is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<B256>,
}

impl Default for RegistrySpec {
    fn default() -> Self {
        Self {
            name: REGISTRY_ARTIFACT.to_string(),
            init_args: vec![
                ConstructorArg::Vault,
                ConstructorArg::Zap,
                ConstructorArg::Operator,
            ],
            salt: None,
        }
    }
}

/// One sub-component that registers itself into the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Artifact name, unique within a plan.
    pub name: String,
    /// Key the component is registered under, unique within a plan.
    pub registration_key: String,
    /// Constructor arguments.
    #[serde(default = "default_component_args")]
    pub constructor_args: Vec<ConstructorArg>,
    /// Whether the component sits behind a proxy.
    #[serde(default)]
    pub is_proxied: bool,
    /// Chains this component is limited to. Applies everywhere when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_gate: Option<BTreeSet<String>>,
    /// Salt override; the run salt is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<B256>,
}

fn default_component_args() -> Vec<ConstructorArg> {
    vec![ConstructorArg::Registry, ConstructorArg::Zap]
}

impl ComponentSpec {
    /// A plain sub-component constructed with `(registry, zap)`.
    pub fn sub_component(name: impl Into<String>, registration_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registration_key: registration_key.into(),
            constructor_args: default_component_args(),
            is_proxied: false,
            chain_gate: None,
            salt: None,
        }
    }

    /// Limit this component to the given chains.
    pub fn gated_to<I, S>(mut self, chains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chain_gate = Some(chains.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_args(mut self, args: Vec<ConstructorArg>) -> Self {
        self.constructor_args = args;
        self
    }

    pub fn with_salt(mut self, salt: B256) -> Self {
        self.salt = Some(salt);
        self
    }

    pub fn proxied(mut self) -> Self {
        self.is_proxied = true;
        self
    }

    /// Whether the component is deployed on `chain`.
    pub fn applies_to(&self, chain: &str) -> bool {
        self.chain_gate
            .as_ref()
            .is_none_or(|chains| chains.contains(chain))
    }
}

/// Registry plus ordered sub-components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub registry: RegistrySpec,
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
}

impl DeploymentPlan {
    pub fn new(registry: RegistrySpec, components: Vec<ComponentSpec>) -> Self {
        Self {
            registry,
            components,
        }
    }

    /// The strategy factory catalogue.
    pub fn default_catalogue() -> Self {
        Self::new(
            RegistrySpec::default(),
            vec![
                ComponentSpec::sub_component("PancakeSwapFactory", "PANCAKESWAP_MC4"),
                ComponentSpec::sub_component("StakingRewardsFactory", "STAKING_REWARDS2"),
                ComponentSpec::sub_component("PancakeSwapStakingFactory", "PANCAKESWAP_MC_STAKING"),
                ComponentSpec::sub_component("SushiMiniChefV2Factory", "SUSHI_MINICHEF_V2"),
                ComponentSpec::sub_component("FuseFiStakingFactory", "FUSEFI_MULTI_REWARDS")
                    .gated_to(["fuse"]),
                ComponentSpec::sub_component("PancakeSwapReferralFactory", "PANCAKESWAP_REFERRAL_MC"),
                ComponentSpec::sub_component("WagmiEarnFactory", "WAGMI_EARN").gated_to(["harmony"]),
            ],
        )
    }

    /// Check name and registration key uniqueness.
    pub fn validate(&self) -> DeployResult<()> {
        let mut names = HashSet::from([self.registry.name.as_str()]);
        let mut keys = HashSet::new();

        for spec in &self.components {
            if !names.insert(spec.name.as_str()) {
                return Err(DeployError::InvalidConfiguration(format!(
                    "component `{}` appears twice in the plan",
                    spec.name
                )));
            }
            if spec.registration_key.trim().is_empty() {
                return Err(DeployError::InvalidConfiguration(format!(
                    "component `{}` has an empty registration key",
                    spec.name
                )));
            }
            if !keys.insert(spec.registration_key.as_str()) {
                return Err(DeployError::InvalidConfiguration(format!(
                    "registration key `{}` is used more than once",
                    spec.registration_key
                )));
            }
            if spec.chain_gate.as_ref().is_some_and(BTreeSet::is_empty) {
                return Err(DeployError::InvalidConfiguration(format!(
                    "component `{}` has an empty chain gate",
                    spec.name
                )));
            }
        }
        Ok(())
    }

    /// Components that apply to `chain`, in plan order.
    pub fn components_for<'a>(&'a self, chain: &'a str) -> impl Iterator<Item = &'a ComponentSpec> {
        self.components.iter().filter(move |spec| spec.applies_to(chain))
    }

    /// Load a plan from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read plan from {}", path.display()))?;
        let plan: Self = toml::from_str(&content).context("Failed to parse plan file as TOML")?;
        tracing::info!(
            path = %path.display(),
            components = plan.components.len(),
            "Deployment plan loaded"
        );
        Ok(plan)
    }

    /// Save the plan to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize plan to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write plan to {}", path.display()))?;
        Ok(())
    }
}

impl Default for DeploymentPlan {
    fn default() -> Self {
        Self::default_catalogue()
    }
}
