//! Value types for the group-policy to fabric mapping crates.
//!
//! This crate provides type-safe representations of the primitives that
//! appear on both sides of the mapping:
//!
//! - [`IpAddress`] and [`IpPrefix`]: addresses and CIDR prefixes with host arithmetic
//! - [`PortRange`]: classifier L4 port ranges (`80`, `20:90`)
//! - [`Encap`]: access encapsulation of an external segment
//! - [`LeafInterface`]: `module/port` interface of a border leaf

mod interface;
mod ip;
mod port_range;
mod vlan;

pub use interface::LeafInterface;
pub use ip::{IpAddress, IpPrefix};
pub use port_range::PortRange;
pub use vlan::Encap;

/// Why a textual value was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IP address: {0}")]
    InvalidIpAddress(String),

    #[error("invalid CIDR prefix: {0}")]
    InvalidIpPrefix(String),

    #[error("VLAN {0} outside 1-4094")]
    InvalidVlanId(u16),

    #[error("invalid encapsulation: {0}")]
    InvalidEncap(String),

    #[error("invalid port range: {0}")]
    InvalidPortRange(String),

    #[error("invalid leaf interface (expected module/port): {0}")]
    InvalidInterface(String),
}
