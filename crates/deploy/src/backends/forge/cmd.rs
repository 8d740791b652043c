//! Command builder for `forge verify-contract`.

use std::path::Path;

use alloy_core::primitives::{Address, Bytes};

use crate::chains::VerificationBackend;

/// Builder for `forge verify-contract` arguments.
#[derive(Debug, Clone)]
pub struct ForgeVerifyCmdBuilder {
    address: Address,
    contract: String,
    backend: VerificationBackend,
    chain_id: Option<u64>,
    constructor_args: Option<Bytes>,
    api_key: Option<String>,
    root: Option<String>,
    watch: bool,
    extra_args: Vec<String>,
}

impl ForgeVerifyCmdBuilder {
    /// Create a new builder for verifying `contract` at `address`.
    pub fn new(address: Address, contract: impl Into<String>, backend: VerificationBackend) -> Self {
        Self {
            address,
            contract: contract.into(),
            backend,
            chain_id: None,
            constructor_args: None,
            api_key: None,
            root: None,
            watch: true,
            extra_args: Vec::new(),
        }
    }

    /// Set the EIP-155 chain id.
    pub fn chain_id(mut self, chain_id: Option<u64>) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Set the ABI-encoded constructor arguments. Empty arguments are omitted.
    pub fn constructor_args(mut self, args: &Bytes) -> Self {
        self.constructor_args = (!args.is_empty()).then(|| args.clone());
        self
    }

    /// Set the explorer API key.
    pub fn api_key(mut self, key: Option<impl Into<String>>) -> Self {
        self.api_key = key.map(Into::into);
        self
    }

    /// Set the project root forge compiles from.
    pub fn root(mut self, path: Option<impl AsRef<Path>>) -> Self {
        self.root = path.map(|p| p.as_ref().display().to_string());
        self
    }

    /// Wait for the verification result instead of returning after submission.
    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Add extra arguments.
    pub fn extra_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Build the command as a vector of strings, without the `forge` binary itself.
    pub fn build(self) -> Vec<String> {
        let verifier = match self.backend {
            VerificationBackend::Explorer => "etherscan",
            VerificationBackend::Sourcify => "sourcify",
        };

        let mut cmd = vec![
            "verify-contract".to_string(),
            self.address.to_string(),
            self.contract,
            "--verifier".to_string(),
            verifier.to_string(),
        ];

        if let Some(chain_id) = self.chain_id {
            cmd.push("--chain".to_string());
            cmd.push(chain_id.to_string());
        }

        if let Some(args) = self.constructor_args {
            cmd.push("--constructor-args".to_string());
            cmd.push(args.to_string());
        }

        if let (VerificationBackend::Explorer, Some(key)) = (self.backend, self.api_key) {
            cmd.push("--etherscan-api-key".to_string());
            cmd.push(key);
        }

        if let Some(root) = self.root {
            cmd.push("--root".to_string());
            cmd.push(root);
        }

        if self.watch {
            cmd.push("--watch".to_string());
        }

        cmd.extend(self.extra_args);
        cmd
    }
}
