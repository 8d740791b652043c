//! Static per-chain table: root dependency addresses and verification routing.

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, address};
use serde::{Deserialize, Serialize};

/// Vault address shared by celo and ftm.
const VAULT_CELO_FTM: Address = address!("0x76cb8cd4b0a55C6dE2bd864dEd2B55140bB56C18");
/// Vault address shared by fuse, aurora and harmony.
const VAULT_FUSE_AURORA_HARMONY: Address = address!("0xA5BCB9FdDE71e393978278999425ac42DA393d3D");
/// Zap address, identical on every chain that has one.
const ZAP: Address = address!("0xAfEf94984f3C3665e72F1a8d4634659621dA18A0");

/// External verification service a chain is routed to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum VerificationBackend {
    /// Etherscan-family block explorer API.
    Explorer,
    /// Sourcify metadata registry.
    Sourcify,
}

/// One row of the chain table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainEntry {
    /// Network name used to select the chain (e.g. `bsc`).
    pub name: &'static str,
    /// EIP-155 chain id.
    pub evm_chain_id: u64,
    /// Vault / registry-owner address.
    pub vault: Option<Address>,
    /// Shared zap utility address.
    pub zap: Option<Address>,
    pub explorer_verification: bool,
    pub sourcify_verification: bool,
}

impl ChainEntry {
    const fn new(name: &'static str, evm_chain_id: u64) -> Self {
        Self {
            name,
            evm_chain_id,
            vault: None,
            zap: None,
            explorer_verification: false,
            sourcify_verification: false,
        }
    }

    const fn roots(mut self, vault: Address, zap: Address) -> Self {
        self.vault = Some(vault);
        self.zap = Some(zap);
        self
    }

    const fn explorer(mut self) -> Self {
        self.explorer_verification = true;
        self
    }

    const fn sourcify(mut self) -> Self {
        self.sourcify_verification = true;
        self
    }
}

/// Built-in chain rows.
pub const BUILTIN_CHAINS: &[ChainEntry] = &[
    ChainEntry::new("avax", 43114)
        .roots(address!("0xF2188e17A3B33902CEAA645F8470904Eb0ce943f"), ZAP)
        .explorer(),
    ChainEntry::new("bsc", 56)
        .roots(address!("0x9166933Bd5c8A77E99B149c5A32f0936aD6aaE25"), ZAP)
        .explorer(),
    ChainEntry::new("celo", 42220).roots(VAULT_CELO_FTM, ZAP).sourcify(),
    ChainEntry::new("ftm", 250).roots(VAULT_CELO_FTM, ZAP).explorer(),
    ChainEntry::new("cro", 25).roots(address!("0x2926FaBf8eF4880B2C32Fc84B1CA7C38ee045F9b"), ZAP),
    ChainEntry::new("fuse", 122).roots(VAULT_FUSE_AURORA_HARMONY, ZAP),
    ChainEntry::new("aurora", 1313161554).roots(VAULT_FUSE_AURORA_HARMONY, ZAP),
    ChainEntry::new("harmony", 1666600000).roots(VAULT_FUSE_AURORA_HARMONY, ZAP),
    ChainEntry::new("poly", 137).explorer(),
    ChainEntry::new("poly_mumbai", 80001).explorer(),
    ChainEntry::new("arbitrum", 42161).explorer().sourcify(),
    ChainEntry::new("avax_fuji", 43113).explorer(),
    ChainEntry::new("xdai", 100).sourcify(),
];

/// Immutable chain table keyed by network name.
#[derive(Debug, Clone)]
pub struct ChainTable {
    entries: BTreeMap<&'static str, ChainEntry>,
}

impl ChainTable {
    /// Build and validate a table from rows.
    ///
    /// Fails on duplicate names, duplicate EVM chain ids, or zero addresses so a
    /// bad row is caught before any transaction is sent.
    pub fn from_entries(rows: &[ChainEntry]) -> anyhow::Result<Self> {
        let mut entries = BTreeMap::new();
        let mut evm_ids = BTreeMap::new();

        for row in rows {
            if row.vault == Some(Address::ZERO) || row.zap == Some(Address::ZERO) {
                anyhow::bail!("Chain `{}` has a zero root dependency address", row.name);
            }
            if let Some(other) = evm_ids.insert(row.evm_chain_id, row.name) {
                anyhow::bail!(
                    "Chains `{}` and `{}` share EVM chain id {}",
                    other,
                    row.name,
                    row.evm_chain_id
                );
            }
            if entries.insert(row.name, *row).is_some() {
                anyhow::bail!("Chain `{}` is listed twice", row.name);
            }
        }

        Ok(Self { entries })
    }

    /// The built-in table.
    pub fn builtin() -> Self {
        Self::from_entries(BUILTIN_CHAINS).expect("built-in chain table is valid")
    }

    pub fn get(&self, name: &str) -> Option<&ChainEntry> {
        self.entries.get(name)
    }

    /// Names of every known chain, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }
}

impl Default for ChainTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_is_valid() {
        let table = ChainTable::from_entries(BUILTIN_CHAINS).unwrap();
        assert_eq!(table.names().count(), BUILTIN_CHAINS.len());
    }

    #[test]
    fn test_bsc_row() {
        let table = ChainTable::builtin();
        let bsc = table.get("bsc").unwrap();
        assert_eq!(bsc.evm_chain_id, 56);
        assert_eq!(
            bsc.vault,
            Some(address!("0x9166933Bd5c8A77E99B149c5A32f0936aD6aaE25"))
        );
        assert_eq!(bsc.zap, Some(ZAP));
        assert!(bsc.explorer_verification);
        assert!(!bsc.sourcify_verification);
    }

    #[test]
    fn test_chains_without_roots() {
        let table = ChainTable::builtin();
        for name in ["poly", "poly_mumbai", "arbitrum", "avax_fuji", "xdai"] {
            let row = table.get(name).unwrap();
            assert!(row.vault.is_none(), "{name} should have no vault");
            assert!(row.zap.is_none(), "{name} should have no zap");
        }
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let rows = [ChainEntry::new("a", 1), ChainEntry::new("a", 2)];
        assert!(ChainTable::from_entries(&rows).is_err());
    }

    #[test]
    fn test_duplicate_evm_id_rejected() {
        let rows = [ChainEntry::new("a", 1), ChainEntry::new("b", 1)];
        assert!(ChainTable::from_entries(&rows).is_err());
    }

    #[test]
    fn test_zero_address_rejected() {
        let rows = [ChainEntry::new("a", 1).roots(Address::ZERO, ZAP)];
        assert!(ChainTable::from_entries(&rows).is_err());
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!(
            "sourcify".parse::<VerificationBackend>().unwrap(),
            VerificationBackend::Sourcify
        );
        assert_eq!(VerificationBackend::Explorer.to_string(), "explorer");
    }
}
