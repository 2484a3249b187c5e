//! Addresses and CIDR prefixes as they appear in subnets and segment catalogs.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// A v4 or v6 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IpAddress(IpAddr);

impl IpAddress {
    pub const fn inner(&self) -> IpAddr {
        self.0
    }

    const fn width(&self) -> u8 {
        match self.0 {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        }
    }

    fn bits(&self) -> u128 {
        match self.0 {
            IpAddr::V4(v4) => u128::from(u32::from(v4)),
            IpAddr::V6(v6) => u128::from(v6),
        }
    }

    /// Same family as `self`, holding `bits`.
    fn rebuild(&self, bits: u128) -> Self {
        match self.0 {
            IpAddr::V4(_) => IpAddress(IpAddr::V4(Ipv4Addr::from(bits as u32))),
            IpAddr::V6(_) => IpAddress(IpAddr::V6(Ipv6Addr::from(bits))),
        }
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for IpAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<IpAddr>()
            .map(IpAddress)
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl From<IpAddr> for IpAddress {
    fn from(addr: IpAddr) -> Self {
        IpAddress(addr)
    }
}

/// `address/len`, with the address kept as written.
///
/// `192.168.0.2/24` therefore names both an interface address and the
/// network it lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    address: IpAddress,
    len: u8,
}

impl IpPrefix {
    pub fn new(address: IpAddress, len: u8) -> Result<Self, ParseError> {
        if len > address.width() {
            return Err(ParseError::InvalidIpPrefix(format!("{}/{}", address, len)));
        }
        Ok(IpPrefix { address, len })
    }

    pub const fn address(&self) -> &IpAddress {
        &self.address
    }

    pub const fn prefix_len(&self) -> u8 {
        self.len
    }

    fn host_bits(&self) -> u128 {
        match u32::from(self.address.width() - self.len) {
            128 => u128::MAX,
            n => (1u128 << n) - 1,
        }
    }

    /// The `n`-th address of the network; `host(1)` is the conventional
    /// gateway. `None` past the end of the prefix.
    pub fn host(&self, n: u128) -> Option<IpAddress> {
        let mask = self.host_bits();
        (n <= mask).then(|| self.address.rebuild((self.address.bits() & !mask) | n))
    }

    /// `addr` written with this prefix length, e.g. `10.0.0.1/24`.
    pub fn with_address(&self, addr: &IpAddress) -> String {
        format!("{}/{}", addr, self.len)
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidIpPrefix(s.to_string());
        let (address, len) = s.rsplit_once('/').ok_or_else(invalid)?;
        let len: u8 = len.parse().map_err(|_| invalid())?;
        IpPrefix::new(address.parse()?, len).map_err(|_| invalid())
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpPrefix> for String {
    fn from(prefix: IpPrefix) -> String {
        prefix.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prefix(s: &str) -> IpPrefix {
        s.parse().unwrap()
    }

    #[test]
    fn test_rejects_bad_prefixes() {
        for bad in ["10.0.0.0/33", "2001:db8::/129", "10.0.0.0", "10.0.0/8", "10.0.0.0/x"] {
            assert!(bad.parse::<IpPrefix>().is_err(), "{} accepted", bad);
        }
    }

    #[test]
    fn test_exposed_address_keeps_host_part() {
        let exposed = prefix("192.168.0.2/24");
        assert_eq!(exposed.address().to_string(), "192.168.0.2");
        assert_eq!(exposed.host(1).unwrap().to_string(), "192.168.0.1");
        assert_eq!(exposed.to_string(), "192.168.0.2/24");
    }

    #[test]
    fn test_host_out_of_range() {
        let small = prefix("10.0.0.0/30");
        assert_eq!(small.host(3).unwrap().to_string(), "10.0.0.3");
        assert_eq!(small.host(4), None);
        assert_eq!(prefix("10.0.0.9/32").host(1), None);
    }

    #[test]
    fn test_v6_gateway() {
        let net = prefix("2001:db8::55/64");
        let gateway = net.host(1).unwrap();
        assert_eq!(net.with_address(&gateway), "2001:db8::1/64");
    }

    #[test]
    fn test_default_route_hosts() {
        assert_eq!(prefix("0.0.0.0/0").host(1).unwrap().to_string(), "0.0.0.1");
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&prefix("172.16.0.0/12")).unwrap();
        assert_eq!(json, "\"172.16.0.0/12\"");
        assert!(serde_json::from_str::<IpPrefix>("\"bogus\"").is_err());
    }
}
