//! Access encapsulation of a border interface.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const VLAN_RANGE: std::ops::RangeInclusive<u16> = 1..=4094;

/// Encapsulation written the way the fabric expects it, e.g. `vlan-100`.
///
/// ```
/// use gbp_types::Encap;
///
/// let encap: Encap = "vlan-100".parse().unwrap();
/// assert_eq!(encap.vlan(), 100);
/// assert!("vlan-4095".parse::<Encap>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Encap {
    Vlan(u16),
}

impl Encap {
    pub fn vlan_checked(id: u16) -> Result<Self, ParseError> {
        if VLAN_RANGE.contains(&id) {
            Ok(Encap::Vlan(id))
        } else {
            Err(ParseError::InvalidVlanId(id))
        }
    }

    pub const fn vlan(&self) -> u16 {
        match self {
            Encap::Vlan(id) => *id,
        }
    }
}

impl fmt::Display for Encap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encap::Vlan(id) => write!(f, "vlan-{}", id),
        }
    }
}

impl FromStr for Encap {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .strip_prefix("vlan-")
            .and_then(|id| id.parse::<u16>().ok())
            .ok_or_else(|| ParseError::InvalidEncap(s.to_string()))?;
        Encap::vlan_checked(id)
    }
}

impl TryFrom<String> for Encap {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Encap> for String {
    fn from(encap: Encap) -> String {
        encap.to_string()
    }
}
