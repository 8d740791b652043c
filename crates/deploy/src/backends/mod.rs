//! Concrete deployment, registry and verification backends.

use alloy_core::primitives::{Address, address};

pub mod forge;
pub mod rpc;
pub mod simulated;

/// Canonical deterministic deployment proxy, present at the same address on every supported chain.
pub const CREATE2_DEPLOYER: Address = address!("0x4e59b44847b379578588920ca78fbf26c0b4956c");

/// Proxy artifact proxied components are deployed behind.
///
/// Constructed with `(implementation, owner, initializer calldata)`.
pub const PROXY_ARTIFACT: &str = "EIP173Proxy";
