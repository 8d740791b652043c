//! stratfactory deploys the strategy factory registry and its sub-factories on a chain.

mod cli;

use alloy_core::primitives::{Address, address};
use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};

use cli::{Cli, OutputFormat};
use stratfactory_deploy::{
    ChainTable, DeploymentExecutor, DeploymentPlan, ForgeVerifier, ForgeVerifierConfig,
    Orchestrator, RecordingVerifier, RegistryClient, RpcBackend, RpcBackendConfig, RunConfig,
    RunReport, SimulatedChain, VerificationOutcome, VerificationService,
};

/// Operator used by dry runs when none is configured.
const DRY_RUN_OPERATOR: Address = address!("0xf39Fd6e51aad88F6F4Ce6aB8827279cffFb92266");

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = build_config(&cli)?;

    if let Some(path) = &cli.save_config {
        config.save_to_file(path)?;
    }

    let plan = match &cli.plan {
        Some(path) => DeploymentPlan::load_from_file(path)?,
        None => DeploymentPlan::default_catalogue(),
    };

    let report = if cli.dry_run {
        tracing::info!(chain = %config.chain, "Dry run against a simulated chain");
        let orchestrator = Orchestrator::new(SimulatedChain::new(), RecordingVerifier::new())
            .with_plan(plan);
        run(&orchestrator, &config).await?
    } else {
        let rpc_url = cli
            .rpc_url
            .clone()
            .context("--rpc-url is required unless --dry-run is set")?;
        let expected_chain_id = ChainTable::builtin()
            .get(&config.chain)
            .map(|entry| entry.evm_chain_id);

        let backend = RpcBackend::connect(
            RpcBackendConfig::new(rpc_url, &cli.artifacts, config.operator),
            expected_chain_id,
        )
        .await?;
        let verifier = ForgeVerifier::new(ForgeVerifierConfig {
            root: cli.forge_root.clone(),
            ..Default::default()
        });

        let orchestrator = Orchestrator::new(backend, verifier).with_plan(plan);
        run(&orchestrator, &config).await?
    };

    match cli.output {
        OutputFormat::Table => print_summary(&report),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize run report")?
        ),
    }

    Ok(())
}

/// Defaults, then the config file and `STRATFACTORY_*` variables, then CLI flags.
fn build_config(cli: &Cli) -> Result<RunConfig> {
    let mut config = RunConfig::load(cli.config.as_deref())?;

    if let Some(chain) = &cli.chain {
        config.chain = chain.clone();
    }
    if cli.vault.is_some() {
        config.overrides.vault = cli.vault.clone();
    }
    if cli.zap.is_some() {
        config.overrides.zap = cli.zap.clone();
    }
    if cli.etherscan_api_key.is_some() {
        config.explorer_api_key = cli.etherscan_api_key.clone();
    }
    if let Some(operator) = cli.operator {
        config.operator = operator;
    }
    if cli.dry_run && config.operator == Address::ZERO {
        config.operator = DRY_RUN_OPERATOR;
    }
    if let Some(outdata) = &cli.outdata {
        config.outdata = Some(outdata.clone());
    }
    if cli.no_verify {
        config.verification.enabled = false;
    }
    if let Some(delay) = cli.verification_delay {
        config.verification.delay_secs = delay;
    }
    if let Some(timeout) = cli.call_timeout {
        config.call_timeout_secs = Some(timeout);
    }

    Ok(config)
}

async fn run<B, V>(orchestrator: &Orchestrator<B, V>, config: &RunConfig) -> Result<RunReport>
where
    B: DeploymentExecutor + RegistryClient,
    V: VerificationService,
{
    orchestrator
        .run(config)
        .await
        .with_context(|| format!("Deployment to `{}` failed", config.chain))
}

fn print_summary(report: &RunReport) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Component",
        "Address",
        "Implementation",
        "Status",
        "Registration",
        "Verification",
    ]);

    let verification = |address: Address| {
        report
            .verifications
            .iter()
            .find(|record| record.task.address == address)
            .map(|record| match &record.outcome {
                VerificationOutcome::Skipped { reason } => format!("skipped ({reason:?})"),
                VerificationOutcome::Verified { backend } => format!("verified ({backend})"),
                VerificationOutcome::Failed { backend, .. } => format!("failed ({backend})"),
            })
            .unwrap_or_else(|| "-".to_string())
    };

    let registry = &report.registry;
    let registry_verified_at = registry.implementation_address.unwrap_or(registry.address);
    table.add_row(vec![
        report.registry_name.clone(),
        registry.address.to_string(),
        registry
            .implementation_address
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string()),
        registry.status.to_string(),
        "registry".to_string(),
        verification(registry_verified_at),
    ]);

    for component in report.components.iter() {
        let result = &component.result;
        table.add_row(vec![
            component.name.clone(),
            result.address.to_string(),
            result
                .implementation_address
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string()),
            result.status.to_string(),
            format!("{} ({})", component.registration_key, component.registration),
            verification(result.address),
        ]);
    }

    println!("{table}");
}
