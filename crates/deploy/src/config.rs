//! Run configuration, built once per run and passed by reference everywhere.

use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy_core::primitives::{Address, B256, b256};
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{DeployError, DeployResult};

/// The default name for the configuration file.
pub const CONFIG_FILENAME: &str = "Stratfactory.toml";

/// Prefix for environment variables merged over the configuration file.
pub const ENV_PREFIX: &str = "STRATFACTORY_";

/// Salt shared by every deterministic deployment of a run.
pub const DEFAULT_SALT: B256 =
    b256!("0x9c22ff5f21f0b81b113e63f7db6da94fedef11b2119b4088b89664fb9a3cb659");

/// Fixed wait before each verification request.
pub const DEFAULT_VERIFICATION_DELAY_SECS: u64 = 5;

/// Operator-supplied replacements for the chain table's root dependencies.
///
/// Values are kept raw so that an empty string behaves like an absent value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorOverrides {
    /// Vault / registry-owner address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault: Option<String>,
    /// Shared zap utility address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zap: Option<String>,
}

impl OperatorOverrides {
    pub fn new(vault: Option<String>, zap: Option<String>) -> Self {
        Self { vault, zap }
    }
}

/// Verification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Whether verification is attempted at all.
    pub enabled: bool,
    /// Seconds to wait before each verification request.
    pub delay_secs: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_secs: DEFAULT_VERIFICATION_DELAY_SECS,
        }
    }
}

/// Everything a run needs, resolved up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Target chain name, as listed in the chain table.
    pub chain: String,
    /// Root dependency overrides.
    #[serde(default)]
    pub overrides: OperatorOverrides,
    /// Account that deploys, initializes and registers.
    pub operator: Address,
    /// Credential for the explorer verification backend. Never written back to disk.
    #[serde(default, skip_serializing, deserialize_with = "string_or_scalar")]
    pub explorer_api_key: Option<String>,
    /// Salt for deterministic deployments.
    #[serde(default = "default_salt")]
    pub salt: B256,
    /// Verification settings.
    #[serde(default)]
    pub verification: VerificationConfig,
    /// Upper bound for each external call, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<u64>,
    /// Where run records and locks are written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outdata: Option<PathBuf>,
}

fn default_salt() -> B256 {
    DEFAULT_SALT
}

/// Accept a credential that the environment layer typed as a number or boolean.
fn string_or_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|value| match value {
        Scalar::Text(text) => text,
        Scalar::Unsigned(n) => n.to_string(),
        Scalar::Signed(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            chain: String::new(),
            overrides: OperatorOverrides::default(),
            operator: Address::ZERO,
            explorer_api_key: None,
            salt: DEFAULT_SALT,
            verification: VerificationConfig::default(),
            call_timeout_secs: None,
            outdata: None,
        }
    }
}

impl RunConfig {
    /// Create a configuration for a chain and operator with defaults elsewhere.
    pub fn new(chain: impl Into<String>, operator: Address) -> Self {
        Self {
            chain: chain.into(),
            operator,
            ..Default::default()
        }
    }

    /// Layer defaults, an optional TOML file and `STRATFACTORY_*` environment variables.
    ///
    /// `path` may point to a file or to a directory containing [`CONFIG_FILENAME`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(RunConfig::default()));

        if let Some(path) = path {
            let config_path = if path.is_dir() {
                path.join(CONFIG_FILENAME)
            } else {
                path.to_path_buf()
            };
            if !config_path.exists() {
                anyhow::bail!("Configuration file not found: {}", config_path.display());
            }
            figment = figment.merge(Toml::file(&config_path));
        }

        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to assemble run configuration")?;

        tracing::debug!(chain = %config.chain, "Run configuration loaded");
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize run config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, without environment layering.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        Ok(config)
    }

    /// Reject configurations that cannot drive a run.
    pub fn validate(&self) -> DeployResult<()> {
        if self.chain.trim().is_empty() {
            return Err(DeployError::InvalidConfiguration(
                "no target chain selected".to_string(),
            ));
        }
        if self.operator == Address::ZERO {
            return Err(DeployError::InvalidConfiguration(
                "operator address is the zero address".to_string(),
            ));
        }
        if self.call_timeout_secs == Some(0) {
            return Err(DeployError::InvalidConfiguration(
                "call timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
    }

    pub fn verification_delay(&self) -> Duration {
        Duration::from_secs(self.verification.delay_secs)
    }

    /// The explorer credential, treating an empty string as absent.
    pub fn explorer_api_key(&self) -> Option<&str> {
        self.explorer_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }
}
