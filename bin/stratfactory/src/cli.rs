use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use url::Url;

/// How the run summary is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "stratfactory")]
#[command(
    author,
    version,
    about = "Deploy and register the strategy factory registry on a chain"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "STRATFACTORY_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Target chain, by network name (bsc, ftm, poly, ...).
    #[arg(short, long, alias = "network", env = "STRATFACTORY_CHAIN")]
    pub chain: Option<String>,

    /// Vault / registry-owner address. Overrides the chain table.
    #[arg(long, env = "VAULTCHEF")]
    pub vault: Option<String>,

    /// Zap address. Overrides the chain table.
    #[arg(long, env = "ZAP")]
    pub zap: Option<String>,

    /// Explorer API key used for source verification.
    #[arg(long, env = "ETHERSCAN_APIKEY", hide_env_values = true)]
    pub etherscan_api_key: Option<String>,

    /// Account that deploys and registers. Must be unlocked on the RPC node.
    #[arg(long, env = "STRATFACTORY_OPERATOR")]
    pub operator: Option<Address>,

    /// JSON-RPC endpoint of the target chain. Required unless --dry-run is set.
    #[arg(long, alias = "rpc", env = "STRATFACTORY_RPC_URL")]
    pub rpc_url: Option<Url>,

    /// Directory containing compiled `<Name>.json` artifacts.
    #[arg(long, env = "STRATFACTORY_ARTIFACTS", default_value = "artifacts")]
    pub artifacts: PathBuf,

    /// A TOML deployment plan replacing the built-in catalogue.
    #[arg(long, env = "STRATFACTORY_PLAN")]
    pub plan: Option<PathBuf>,

    /// A configuration file, or a directory containing Stratfactory.toml.
    #[arg(long, alias = "conf", env = "STRATFACTORY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Save the resolved configuration to this path before deploying.
    #[arg(long)]
    pub save_config: Option<PathBuf>,

    /// Directory for the run record and lock.
    #[arg(long, env = "STRATFACTORY_OUTDATA")]
    pub outdata: Option<PathBuf>,

    /// Run against an in-process simulated chain instead of a node.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip source verification. The variable accepts true/false, yes/no, on/off or 1/0.
    #[arg(
        long,
        env = "STRATFACTORY_NO_VERIFY",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub no_verify: bool,

    /// Seconds to wait before each verification request.
    #[arg(long, env = "STRATFACTORY_VERIFICATION_DELAY")]
    pub verification_delay: Option<u64>,

    /// Upper bound for each deployment, registry and verification call, in seconds.
    #[arg(long, env = "STRATFACTORY_CALL_TIMEOUT")]
    pub call_timeout: Option<u64>,

    /// Project root `forge verify-contract` compiles from.
    #[arg(long, env = "STRATFACTORY_FORGE_ROOT")]
    pub forge_root: Option<PathBuf>,

    /// Summary format.
    #[arg(long, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}
