//! Chain config resolution: chain table + operator overrides -> [`ChainProfile`].

use std::collections::BTreeSet;

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{
    chains::{ChainTable, VerificationBackend},
    config::OperatorOverrides,
    error::{DeployError, DeployResult},
    plan::DeploymentPlan,
};

/// Logical name of the vault / registry-owner dependency.
pub const VAULT_DEPENDENCY: &str = "vault";
/// Logical name of the shared zap dependency.
pub const ZAP_DEPENDENCY: &str = "zap";

/// Root dependency addresses every run needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootDependencies {
    pub vault: Address,
    pub zap: Address,
}

/// Resolved deployment target. Built once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProfile {
    /// Network name of the chain.
    pub chain_id: String,
    /// EIP-155 chain id, when the chain is in the table.
    pub evm_chain_id: Option<u64>,
    pub supports_explorer_verification: bool,
    pub supports_sourcify_verification: bool,
    /// Resolved root dependencies.
    pub roots: RootDependencies,
    /// Components of the plan that only apply to this chain.
    pub conditional_components: BTreeSet<String>,
}

impl ChainProfile {
    /// The verification backend this chain is routed to, if any.
    ///
    /// A chain that supports both backends is routed to the explorer.
    pub fn verification_backend(&self) -> Option<VerificationBackend> {
        if self.supports_explorer_verification {
            Some(VerificationBackend::Explorer)
        } else if self.supports_sourcify_verification {
            Some(VerificationBackend::Sourcify)
        } else {
            None
        }
    }
}

/// Resolves chain profiles against a chain table.
#[derive(Debug, Clone, Default)]
pub struct ChainResolver {
    table: ChainTable,
}

impl ChainResolver {
    pub fn new(table: ChainTable) -> Self {
        Self { table }
    }

    /// Resolve the profile for `chain_id`.
    ///
    /// A non-empty override wins over the table. A dependency missing from both
    /// fails with [`DeployError::MissingConfiguration`]. No side effects.
    pub fn resolve(
        &self,
        chain_id: &str,
        overrides: &OperatorOverrides,
    ) -> DeployResult<ChainProfile> {
        let entry = self.table.get(chain_id);

        let vault = resolve_dependency(
            VAULT_DEPENDENCY,
            chain_id,
            overrides.vault.as_deref(),
            entry.and_then(|e| e.vault),
        )?;
        let zap = resolve_dependency(
            ZAP_DEPENDENCY,
            chain_id,
            overrides.zap.as_deref(),
            entry.and_then(|e| e.zap),
        )?;

        if entry.is_none() {
            tracing::warn!(
                chain = %chain_id,
                "Chain is not in the chain table, relying on overrides and skipping verification"
            );
        }

        Ok(ChainProfile {
            chain_id: chain_id.to_string(),
            evm_chain_id: entry.map(|e| e.evm_chain_id),
            supports_explorer_verification: entry.is_some_and(|e| e.explorer_verification),
            supports_sourcify_verification: entry.is_some_and(|e| e.sourcify_verification),
            roots: RootDependencies { vault, zap },
            conditional_components: BTreeSet::new(),
        })
    }

    /// Resolve the profile and record which of the plan's components are gated to it.
    pub fn resolve_for_plan(
        &self,
        chain_id: &str,
        overrides: &OperatorOverrides,
        plan: &DeploymentPlan,
    ) -> DeployResult<ChainProfile> {
        let mut profile = self.resolve(chain_id, overrides)?;
        profile.conditional_components = plan
            .components
            .iter()
            .filter(|spec| spec.chain_gate.is_some() && spec.applies_to(chain_id))
            .map(|spec| spec.name.clone())
            .collect();
        Ok(profile)
    }
}

fn resolve_dependency(
    dependency: &'static str,
    chain_id: &str,
    override_value: Option<&str>,
    table_value: Option<Address>,
) -> DeployResult<Address> {
    match override_value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => {
            let address = raw.parse::<Address>().map_err(|e| {
                DeployError::InvalidConfiguration(format!(
                    "`{dependency}` override `{raw}` is not an address: {e}"
                ))
            })?;
            tracing::debug!(dependency, %address, "Using operator override");
            Ok(address)
        }
        None => table_value.ok_or_else(|| DeployError::MissingConfiguration {
            dependency,
            chain: chain_id.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::address;

    use crate::plan::{ComponentSpec, DeploymentPlan};

    const BSC_VAULT: Address = address!("0x9166933Bd5c8A77E99B149c5A32f0936aD6aaE25");
    const ZAP: Address = address!("0xAfEf94984f3C3665e72F1a8d4634659621dA18A0");
    const OVERRIDE: &str = "0x1111111111111111111111111111111111111111";

    #[test]
    fn test_table_fallback() {
        let profile = ChainResolver::default()
            .resolve("bsc", &OperatorOverrides::default())
            .unwrap();
        assert_eq!(profile.roots.vault, BSC_VAULT);
        assert_eq!(profile.roots.zap, ZAP);
        assert_eq!(profile.evm_chain_id, Some(56));
        assert_eq!(
            profile.verification_backend(),
            Some(VerificationBackend::Explorer)
        );
    }

    #[test]
    fn test_override_wins() {
        let overrides = OperatorOverrides::new(Some(OVERRIDE.to_string()), None);
        let profile = ChainResolver::default().resolve("bsc", &overrides).unwrap();
        assert_eq!(profile.roots.vault, OVERRIDE.parse::<Address>().unwrap());
        assert_eq!(profile.roots.zap, ZAP);
    }

    #[test]
    fn test_empty_override_falls_back() {
        let overrides = OperatorOverrides::new(Some(String::new()), Some("  ".to_string()));
        let profile = ChainResolver::default().resolve("bsc", &overrides).unwrap();
        assert_eq!(profile.roots.vault, BSC_VAULT);
        assert_eq!(profile.roots.zap, ZAP);
    }

    #[test]
    fn test_missing_dependency() {
        let err = ChainResolver::default()
            .resolve("poly", &OperatorOverrides::default())
            .unwrap_err();
        match err {
            DeployError::MissingConfiguration { dependency, chain } => {
                assert_eq!(dependency, VAULT_DEPENDENCY);
                assert_eq!(chain, "poly");
            }
            other => panic!("unexpected error: {other}"),
        }

        let overrides = OperatorOverrides::new(Some(OVERRIDE.to_string()), None);
        let err = ChainResolver::default()
            .resolve("poly", &overrides)
            .unwrap_err();
        assert!(matches!(
            err,
            DeployError::MissingConfiguration { dependency: ZAP_DEPENDENCY, .. }
        ));
    }

    #[test]
    fn test_unknown_chain_with_overrides() {
        let overrides = OperatorOverrides::new(Some(OVERRIDE.to_string()), Some(OVERRIDE.to_string()));
        let profile = ChainResolver::default().resolve("devnet", &overrides).unwrap();
        assert_eq!(profile.evm_chain_id, None);
        assert_eq!(profile.verification_backend(), None);
    }

    #[test]
    fn test_invalid_override() {
        let overrides = OperatorOverrides::new(Some("0xnothex".to_string()), None);
        let err = ChainResolver::default().resolve("bsc", &overrides).unwrap_err();
        assert!(matches!(err, DeployError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_routing() {
        let resolver = ChainResolver::default();
        let overrides = OperatorOverrides::new(Some(OVERRIDE.to_string()), Some(OVERRIDE.to_string()));

        let arbitrum = resolver.resolve("arbitrum", &overrides).unwrap();
        assert_eq!(arbitrum.verification_backend(), Some(VerificationBackend::Explorer));

        let celo = resolver.resolve("celo", &overrides).unwrap();
        assert_eq!(celo.verification_backend(), Some(VerificationBackend::Sourcify));

        let fuse = resolver.resolve("fuse", &overrides).unwrap();
        assert_eq!(fuse.verification_backend(), None);
    }

    #[test]
    fn test_conditional_components() {
        let plan = DeploymentPlan::default_catalogue();
        let harmony = ChainResolver::default()
            .resolve_for_plan("harmony", &OperatorOverrides::default(), &plan)
            .unwrap();
        assert_eq!(
            harmony.conditional_components,
            BTreeSet::from(["WagmiEarnFactory".to_string()])
        );

        let ftm = ChainResolver::default()
            .resolve_for_plan("ftm", &OperatorOverrides::default(), &plan)
            .unwrap();
        assert!(ftm.conditional_components.is_empty());

        let gated = DeploymentPlan::new(
            plan.registry.clone(),
            vec![ComponentSpec::sub_component("X", "X_TYPE").gated_to(["ftm"])],
        );
        let ftm = ChainResolver::default()
            .resolve_for_plan("ftm", &OperatorOverrides::default(), &gated)
            .unwrap();
        assert!(ftm.conditional_components.contains("X"));
    }
}
