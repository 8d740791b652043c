//! stratfactory-deploy - Deployment library for the strategy factory registry.
//!
//! This crate brings up a registry contract and its sub-factories on a target
//! chain: it resolves per-chain dependencies, deploys everything at
//! deterministic addresses, registers each sub-factory exactly once and
//! submits best-effort source verification.

pub mod backends;
pub mod rpc;

mod chains;
mod config;
mod error;
mod executor;
mod lock;
mod orchestrator;
mod plan;
mod record;
mod registration;
mod registry;
mod resolver;
mod verification;

pub use backends::{
    CREATE2_DEPLOYER, PROXY_ARTIFACT,
    forge::{ForgeVerifier, ForgeVerifierConfig},
    rpc::{ArtifactStore, RpcBackend, RpcBackendConfig},
    simulated::{RecordingVerifier, SimulatedChain, SimulationStats},
};
pub use chains::{BUILTIN_CHAINS, ChainEntry, ChainTable, VerificationBackend};
pub use config::{
    CONFIG_FILENAME, DEFAULT_SALT, OperatorOverrides, RunConfig, VerificationConfig,
};
pub use error::{DeployError, DeployResult};
pub use executor::{
    DeployRequest, DeployStatus, DeploymentExecutor, DeploymentResult, ProxyInit, RegistryClient,
};
pub use lock::RunLock;
pub use orchestrator::{Orchestrator, RunReport};
pub use plan::{ComponentSpec, ConstructorArg, DeploymentPlan, RegistrySpec};
pub use record::{DeploymentRecord, PlanFingerprint};
pub use registration::{
    DeployedComponent, DeployedComponents, RegistrationStatus, deploy_and_register_all,
};
pub use registry::{IStrategyFactory, bootstrap_registry};
pub use resolver::{ChainProfile, ChainResolver, RootDependencies};
pub use verification::{
    SkipReason, VerificationDispatcher, VerificationOutcome, VerificationRecord,
    VerificationRequest, VerificationService, VerificationTask,
};
