//! Compiled contract artifacts read from disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use alloy_core::primitives::Bytes;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Bytecode field of an artifact: a hex string, or an object holding one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BytecodeField {
    Hex(String),
    Object { object: String },
}

impl BytecodeField {
    fn hex(&self) -> &str {
        match self {
            Self::Hex(hex) | Self::Object { object: hex } => hex,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArtifactFile {
    bytecode: BytecodeField,
}

/// Reads `<dir>/<Name>.json` artifacts and caches their creation code.
#[derive(Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Bytes>>,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creation code of `name`.
    pub fn creation_code(&self, name: &str) -> Result<Bytes> {
        if let Some(code) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(code.clone());
        }

        let path = self.dir.join(format!("{name}.json"));
        let content = std::fs::read_to_string(&path)
            .context(format!("Failed to read artifact {}", path.display()))?;
        let code = parse_creation_code(&content)
            .with_context(|| format!("Invalid artifact {}", path.display()))?;

        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), code.clone());
        Ok(code)
    }
}

fn parse_creation_code(content: &str) -> Result<Bytes> {
    let artifact: ArtifactFile =
        serde_json::from_str(content).context("Failed to parse artifact JSON")?;
    let hex = artifact.bytecode.hex().trim_start_matches("0x");

    if hex.contains("__") {
        anyhow::bail!("bytecode has unlinked library placeholders");
    }
    if hex.is_empty() {
        anyhow::bail!("bytecode is empty, the contract may be abstract");
    }

    let code = hex::decode(hex).context("bytecode is not valid hex")?;
    Ok(code.into())
}
