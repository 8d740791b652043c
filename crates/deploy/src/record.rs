use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use alloy_core::primitives::B256;

use crate::{orchestrator::RunReport, plan::DeploymentPlan};

/// Inputs that determine every deployed address of a run.
///
/// Two runs with the same hash target the same addresses; a changed hash means
/// a changed plan, salt or chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanFingerprint<'a> {
    pub chain: &'a str,
    pub salt: B256,
    pub plan: &'a DeploymentPlan,
}

impl PlanFingerprint<'_> {
    /// SHA-256 of the JSON serialization, hex-encoded.
    pub fn compute_hash(&self) -> Result<String> {
        let json = serde_json::to_string(self).context("Failed to serialize plan fingerprint")?;

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Record of a finished run, stored at `<outdata>/<chain>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Hash of the plan fingerprint.
    pub plan_hash: String,
    /// RFC 3339 timestamp of the end of the run.
    pub deployed_at: String,
    /// Version of this tool that produced the record.
    pub stratfactory_version: String,
    pub report: RunReport,
}

impl DeploymentRecord {
    /// Create a record stamped with the current time.
    pub fn new(plan_hash: String, report: RunReport) -> Self {
        Self {
            plan_hash,
            deployed_at: chrono::Utc::now().to_rfc3339(),
            stratfactory_version: env!("CARGO_PKG_VERSION").to_string(),
            report,
        }
    }

    pub fn path_for(outdata: &Path, chain: &str) -> PathBuf {
        outdata.join(format!("{chain}.json"))
    }

    /// Save this record as formatted JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize deployment record")?;

        std::fs::write(path, json).context(format!(
            "Failed to write deployment record to {}",
            path.display()
        ))?;

        Ok(())
    }

    /// Load a record from a file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Deployment record does not exist: {}", path.display());
        }

        let content = std::fs::read_to_string(path).context(format!(
            "Failed to read deployment record from {}",
            path.display()
        ))?;

        serde_json::from_str(&content).context("Failed to parse deployment record JSON")
    }
}
