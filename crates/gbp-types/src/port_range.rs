//! Classifier L4 port ranges.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An inclusive L4 port range, written `80` or `20:90`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortRange {
    from: u16,
    to: u16,
}

impl PortRange {
    pub fn new(from: u16, to: u16) -> Result<Self, ParseError> {
        if from > to {
            return Err(ParseError::InvalidPortRange(format!("{}:{}", from, to)));
        }
        Ok(PortRange { from, to })
    }

    pub const fn single(port: u16) -> Self {
        PortRange {
            from: port,
            to: port,
        }
    }

    pub const fn from_port(&self) -> u16 {
        self.from
    }

    pub const fn to_port(&self) -> u16 {
        self.to
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from == self.to {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}:{}", self.from, self.to)
        }
    }
}

impl FromStr for PortRange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |p: &str| {
            p.trim()
                .parse::<u16>()
                .map_err(|_| ParseError::InvalidPortRange(s.to_string()))
        };
        match s.split_once(':') {
            Some((from, to)) => PortRange::new(parse(from)?, parse(to)?),
            None => parse(s).map(PortRange::single),
        }
    }
}

impl TryFrom<String> for PortRange {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PortRange> for String {
    fn from(range: PortRange) -> String {
        range.to_string()
    }
}
