//! End-to-end run: resolve, bootstrap, deploy and register, verify, record.

use std::path::Path;

use alloy_core::primitives::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    config::RunConfig,
    error::DeployResult,
    executor::{DeploymentExecutor, DeploymentResult, RegistryClient},
    lock::RunLock,
    plan::DeploymentPlan,
    record::{DeploymentRecord, PlanFingerprint},
    registration::{DeployedComponents, deploy_and_register_all},
    registry::bootstrap_registry,
    resolver::{ChainProfile, ChainResolver},
    verification::{VerificationDispatcher, VerificationRecord, VerificationService, VerificationTask},
};

/// Everything a run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub profile: ChainProfile,
    /// Registry name.
    pub registry_name: String,
    pub registry: DeploymentResult,
    pub components: DeployedComponents,
    pub verifications: Vec<VerificationRecord>,
}

impl RunReport {
    /// Number of verification tasks that failed.
    pub fn verification_failures(&self) -> usize {
        self.verifications
            .iter()
            .filter(|record| record.outcome.is_failure())
            .count()
    }
}

/// Drives a deployment run against a backend and a verification service.
#[derive(Debug)]
pub struct Orchestrator<B, V> {
    backend: B,
    verifier: V,
    plan: DeploymentPlan,
    resolver: ChainResolver,
}

impl<B, V> Orchestrator<B, V>
where
    B: DeploymentExecutor + RegistryClient,
    V: VerificationService,
{
    /// Create an orchestrator with the default catalogue and the built-in chain table.
    pub fn new(backend: B, verifier: V) -> Self {
        Self {
            backend,
            verifier,
            plan: DeploymentPlan::default_catalogue(),
            resolver: ChainResolver::default(),
        }
    }

    pub fn with_plan(mut self, plan: DeploymentPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_resolver(mut self, resolver: ChainResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    pub fn plan(&self) -> &DeploymentPlan {
        &self.plan
    }

    /// Run the whole deployment for `config.chain`.
    ///
    /// Configuration, deployment and registration errors abort the run;
    /// verification problems only show up in the report.
    pub async fn run(&self, config: &RunConfig) -> DeployResult<RunReport> {
        config.validate()?;
        self.plan.validate()?;

        let _lock = config
            .outdata
            .as_deref()
            .map(|outdata| RunLock::acquire(outdata, &config.chain))
            .transpose()?;

        let profile =
            self.resolver
                .resolve_for_plan(&config.chain, &config.overrides, &self.plan)?;

        tracing::info!(
            chain = %profile.chain_id,
            evm_chain_id = ?profile.evm_chain_id,
            vault = %profile.roots.vault,
            zap = %profile.roots.zap,
            components = self.plan.components_for(&profile.chain_id).count(),
            "Starting deployment"
        );

        let registry =
            bootstrap_registry(&self.backend, &self.plan.registry, &profile, config).await?;

        let components =
            deploy_and_register_all(&self.backend, &registry, &profile, &self.plan, config).await?;

        let tasks = self.verification_tasks(&profile, &registry, &components);
        let verifications = VerificationDispatcher::new(&self.verifier, config)
            .verify_all(&profile, tasks)
            .await;

        let report = RunReport {
            profile,
            registry_name: self.plan.registry.name.clone(),
            registry,
            components,
            verifications,
        };

        tracing::info!(
            chain = %report.profile.chain_id,
            registry = %report.registry.address,
            components = report.components.len(),
            registered = report.components.registrations(),
            verification_failures = report.verification_failures(),
            "Deployment complete"
        );

        if let Some(outdata) = &config.outdata {
            self.write_record(outdata, config, &report);
        }

        Ok(report)
    }

    /// The registry implementation first, then every deployed sub-component's façade address in order.
    fn verification_tasks(
        &self,
        profile: &ChainProfile,
        registry: &DeploymentResult,
        components: &DeployedComponents,
    ) -> Vec<VerificationTask> {
        let registry_task = registry
            .implementation_address
            .map(|implementation| VerificationTask {
                chain_id: profile.chain_id.clone(),
                contract: self.plan.registry.name.clone(),
                address: implementation,
                constructor_args: Bytes::new(),
            });

        registry_task
            .into_iter()
            .chain(components.iter().map(|component| VerificationTask {
                chain_id: profile.chain_id.clone(),
                contract: component.name.clone(),
                address: component.result.address,
                constructor_args: component.constructor_args.clone(),
            }))
            .collect()
    }

    /// Write the run record. The deployment already happened, so failures are only logged.
    fn write_record(&self, outdata: &Path, config: &RunConfig, report: &RunReport) {
        let fingerprint = PlanFingerprint {
            chain: &config.chain,
            salt: config.salt,
            plan: &self.plan,
        };
        let path = DeploymentRecord::path_for(outdata, &config.chain);

        let result = fingerprint
            .compute_hash()
            .and_then(|hash| DeploymentRecord::new(hash, report.clone()).save_to_file(&path));

        match result {
            Ok(()) => tracing::info!(path = %path.display(), "Deployment record saved"),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %format!("{e:#}"),
                "Failed to save deployment record"
            ),
        }
    }
}
