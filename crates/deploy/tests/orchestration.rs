//! Integration tests for stratfactory-deploy.
//!
//! Full runs against the in-process simulated chain. No network or external tools needed.
//! Run with: cargo test --test orchestration

use std::time::Duration;

use alloy_core::primitives::{Address, address};
use stratfactory_deploy::{
    ComponentSpec, DeployError, DeployStatus, DeploymentPlan, DeploymentRecord, Orchestrator,
    OperatorOverrides, PlanFingerprint, RecordingVerifier, RegistrationStatus, RegistrySpec,
    RunConfig, RunLock, SimulatedChain, SkipReason, VerificationBackend, VerificationOutcome,
};
use tempdir::TempDir;

const OPERATOR: Address = address!("0xf39Fd6e51aad88F6F4Ce6aB8827279cffFb92266");
const BSC_VAULT: Address = address!("0x9166933Bd5c8A77E99B149c5A32f0936aD6aaE25");
const ZAP: Address = address!("0xAfEf94984f3C3665e72F1a8d4634659621dA18A0");

/// Route run logs to the test harness. Safe to call from every test.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// A run configuration with no verification delay.
fn config(chain: &str) -> RunConfig {
    init_tracing();
    let mut config = RunConfig::new(chain, OPERATOR);
    config.verification.delay_secs = 0;
    config
}

/// Registry plus `A` everywhere and `B` only on harmony.
fn small_plan() -> DeploymentPlan {
    DeploymentPlan::new(
        RegistrySpec::default(),
        vec![
            ComponentSpec::sub_component("A", "A_TYPE"),
            ComponentSpec::sub_component("B", "B_TYPE").gated_to(["harmony"]),
        ],
    )
}

fn orchestrator() -> Orchestrator<SimulatedChain, RecordingVerifier> {
    Orchestrator::new(SimulatedChain::new(), RecordingVerifier::new())
}

#[tokio::test]
async fn test_ftm_small_plan_end_to_end() {
    let orchestrator = orchestrator().with_plan(small_plan());
    orchestrator.verifier().fail_all();

    let report = orchestrator.run(&config("ftm")).await.unwrap();

    // B is gated to harmony and never deployed.
    assert_eq!(report.components.len(), 1);
    assert!(report.components.get("B").is_none());

    let a = report.components.get("A").unwrap();
    assert_eq!(a.registration, RegistrationStatus::Registered);

    let registered = orchestrator
        .backend()
        .registered_types(report.registry.address);
    assert_eq!(registered.len(), 1);
    assert_eq!(registered.get("A_TYPE"), Some(&a.result.address));

    // Registry implementation, then A, both on the explorer backend, without credentials.
    let attempts = orchestrator.verifier().attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(
        Some(attempts[0].task.address),
        report.registry.implementation_address
    );
    assert!(attempts[0].task.constructor_args.is_empty());
    assert_eq!(attempts[1].task.address, a.result.address);
    assert_eq!(attempts[1].task.constructor_args, a.constructor_args);
    assert!(
        attempts
            .iter()
            .all(|r| r.backend == VerificationBackend::Explorer && r.api_key.is_none())
    );

    // Failures are reported, not raised.
    assert_eq!(report.verification_failures(), 2);
}

#[tokio::test]
async fn test_registry_initialized_with_resolved_roots() {
    let orchestrator = orchestrator().with_plan(small_plan());
    let report = orchestrator.run(&config("bsc")).await.unwrap();

    assert_eq!(report.profile.roots.vault, BSC_VAULT);
    assert_eq!(report.profile.roots.zap, ZAP);

    let calldata = orchestrator
        .backend()
        .initializer_of(report.registry.address)
        .unwrap();
    // selector, then vault, zap and operator as 32-byte words
    assert_eq!(calldata.len(), 4 + 3 * 32);
    assert_eq!(&calldata[16..36], BSC_VAULT.as_slice());
    assert_eq!(&calldata[48..68], ZAP.as_slice());
    assert_eq!(&calldata[80..100], OPERATOR.as_slice());
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let orchestrator = orchestrator();
    let config = config("bsc");

    let first = orchestrator.run(&config).await.unwrap();
    let writes = orchestrator.backend().stats().registry_writes;
    assert_eq!(writes, 5);

    let second = orchestrator.run(&config).await.unwrap();

    assert_eq!(first.registry.address, second.registry.address);
    assert_eq!(second.registry.status, DeployStatus::Reused);
    assert_eq!(second.components.registrations(), 0);
    assert!(
        second
            .components
            .iter()
            .all(|c| c.result.status == DeployStatus::Reused
                && c.registration == RegistrationStatus::AlreadyRegistered)
    );

    let stats = orchestrator.backend().stats();
    assert_eq!(stats.registry_writes, writes);
    assert_eq!(stats.initializations, 1);
}

#[tokio::test]
async fn test_addresses_are_deterministic_across_independent_runs() {
    let first = orchestrator().run(&config("bsc")).await.unwrap();
    let second = orchestrator().run(&config("bsc")).await.unwrap();

    assert_eq!(first.registry, second.registry);
    let first_addresses: Vec<_> = first.components.iter().map(|c| c.result.address).collect();
    let second_addresses: Vec<_> = second.components.iter().map(|c| c.result.address).collect();
    assert_eq!(first_addresses, second_addresses);
}

#[tokio::test]
async fn test_conditional_components_follow_chain() {
    let fuse = orchestrator().run(&config("fuse")).await.unwrap();
    assert!(fuse.components.get("FuseFiStakingFactory").is_some());
    assert!(fuse.components.get("WagmiEarnFactory").is_none());
    assert!(fuse.profile.conditional_components.contains("FuseFiStakingFactory"));

    let harmony = orchestrator().run(&config("harmony")).await.unwrap();
    assert!(harmony.components.get("WagmiEarnFactory").is_some());
    assert!(harmony.components.get("FuseFiStakingFactory").is_none());
    assert_eq!(harmony.components.len(), 6);
}

#[tokio::test]
async fn test_unsupported_chain_skips_verification() {
    let orchestrator = orchestrator();
    let report = orchestrator.run(&config("cro")).await.unwrap();

    assert!(orchestrator.verifier().attempts().is_empty());
    assert!(report.verifications.iter().all(|r| r.outcome
        == VerificationOutcome::Skipped {
            reason: SkipReason::UnsupportedChain
        }));
    assert_eq!(report.verifications.len(), 1 + report.components.len());
}

#[tokio::test]
async fn test_missing_dependency_deploys_nothing() {
    let orchestrator = orchestrator();
    let err = orchestrator.run(&config("poly")).await.unwrap_err();

    assert!(matches!(err, DeployError::MissingConfiguration { .. }));
    assert_eq!(orchestrator.backend().stats().deploy_calls, 0);
}

#[tokio::test]
async fn test_overrides_enable_chains_without_table_roots() {
    let vault = address!("0x1000000000000000000000000000000000000001");
    let zap = address!("0x2000000000000000000000000000000000000002");

    let mut config = config("poly");
    config.overrides =
        OperatorOverrides::new(Some(vault.to_string()), Some(zap.to_string()));

    let orchestrator = orchestrator().with_plan(small_plan());
    let report = orchestrator.run(&config).await.unwrap();

    assert_eq!(report.profile.roots.vault, vault);
    assert_eq!(report.profile.roots.zap, zap);
    assert_eq!(report.profile.evm_chain_id, Some(137));
    assert_eq!(orchestrator.verifier().attempts().len(), 2);
}

#[tokio::test]
async fn test_failed_verification_does_not_stop_later_tasks() {
    let orchestrator = orchestrator().with_plan(small_plan());
    let config = config("ftm");

    // Learn the registry implementation address, then fail only that one.
    let dry = orchestrator.run(&config).await.unwrap();
    let implementation = dry.registry.implementation_address.unwrap();

    let orchestrator = Orchestrator::new(SimulatedChain::new(), RecordingVerifier::new())
        .with_plan(small_plan());
    orchestrator.verifier().fail_for(implementation);
    let report = orchestrator.run(&config).await.unwrap();

    assert!(report.verifications[0].outcome.is_failure());
    assert_eq!(
        report.verifications[1].outcome,
        VerificationOutcome::Verified {
            backend: VerificationBackend::Explorer
        }
    );
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let orchestrator = Orchestrator::new(
        SimulatedChain::new().with_latency(Duration::from_secs(5)),
        RecordingVerifier::new(),
    );
    let mut config = config("bsc");
    config.call_timeout_secs = Some(1);

    let err = orchestrator.run(&config).await.unwrap_err();
    assert!(matches!(err, DeployError::Timeout { .. }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_record_written_to_outdata() {
    let temp_dir = TempDir::new("stratfactory-run").expect("Failed to create temp dir");
    let mut config = config("bsc");
    config.outdata = Some(temp_dir.path().to_path_buf());

    let orchestrator = orchestrator();
    let report = orchestrator.run(&config).await.unwrap();

    let record =
        DeploymentRecord::load_from_file(&DeploymentRecord::path_for(temp_dir.path(), "bsc"))
            .unwrap();
    assert_eq!(record.report, report);

    let expected_hash = PlanFingerprint {
        chain: "bsc",
        salt: config.salt,
        plan: orchestrator.plan(),
    }
    .compute_hash()
    .unwrap();
    assert_eq!(record.plan_hash, expected_hash);

    // The lock is released when the run ends.
    assert!(RunLock::acquire(temp_dir.path(), "bsc").is_ok());
}

#[tokio::test]
async fn test_concurrent_local_run_is_refused() {
    let temp_dir = TempDir::new("stratfactory-run").expect("Failed to create temp dir");
    let mut config = config("bsc");
    config.outdata = Some(temp_dir.path().to_path_buf());

    let _held = RunLock::acquire(temp_dir.path(), "bsc").unwrap();

    let orchestrator = orchestrator();
    let err = orchestrator.run(&config).await.unwrap_err();
    assert!(matches!(err, DeployError::RunLocked { .. }));
    assert_eq!(orchestrator.backend().stats().deploy_calls, 0);
}

#[tokio::test]
async fn test_invalid_plan_is_rejected_before_deploying() {
    let plan = DeploymentPlan::new(
        RegistrySpec::default(),
        vec![
            ComponentSpec::sub_component("A", "KEY"),
            ComponentSpec::sub_component("B", "KEY"),
        ],
    );
    let orchestrator = orchestrator().with_plan(plan);

    let err = orchestrator.run(&config("bsc")).await.unwrap_err();
    assert!(matches!(err, DeployError::InvalidConfiguration(_)));
    assert_eq!(orchestrator.backend().stats().deploy_calls, 0);
}
