//! Verification through `forge verify-contract`.

mod cmd;

pub use cmd::ForgeVerifyCmdBuilder;

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::verification::{VerificationRequest, VerificationService};

/// Output fragments meaning the contract needs no further verification.
const ALREADY_VERIFIED: [&str; 2] = ["already verified", "Already Verified"];

/// Configuration for the forge verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeVerifierConfig {
    /// The forge binary to run.
    pub binary: PathBuf,
    /// Project root forge compiles sources from.
    pub root: Option<PathBuf>,
    /// Extra arguments appended to every invocation.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for ForgeVerifierConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("forge"),
            root: None,
            extra_args: Vec::new(),
        }
    }
}

/// Runs `forge verify-contract` once per request.
#[derive(Debug, Clone, Default)]
pub struct ForgeVerifier {
    config: ForgeVerifierConfig,
}

impl ForgeVerifier {
    pub fn new(config: ForgeVerifierConfig) -> Self {
        Self { config }
    }

    fn args(&self, request: &VerificationRequest) -> Vec<String> {
        ForgeVerifyCmdBuilder::new(request.task.address, &request.task.contract, request.backend)
            .chain_id(request.evm_chain_id)
            .constructor_args(&request.task.constructor_args)
            .api_key(request.api_key.as_deref())
            .root(self.config.root.as_ref())
            .extra_args(self.config.extra_args.iter().cloned())
            .build()
    }
}

impl VerificationService for ForgeVerifier {
    async fn verify(&self, request: &VerificationRequest) -> Result<()> {
        let args = self.args(request);
        tracing::debug!(binary = %self.config.binary.display(), ?args, "Running forge");

        let output = tokio::process::Command::new(&self.config.binary)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.config.binary.display()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            return Ok(());
        }
        if ALREADY_VERIFIED
            .iter()
            .any(|marker| stdout.contains(marker) || stderr.contains(marker))
        {
            tracing::info!(address = %request.task.address, "Contract already verified");
            return Ok(());
        }

        anyhow::bail!(
            "forge verify-contract exited with {}: {}",
            output.status,
            stderr.trim()
        )
    }
}
