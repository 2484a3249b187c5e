//! Border-leaf interface identifiers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A `module/port` interface on a border leaf switch, e.g. `1/48`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LeafInterface {
    module: String,
    port: String,
}

impl LeafInterface {
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn port(&self) -> &str {
        &self.port
    }
}

impl fmt::Display for LeafInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module, self.port)
    }
}

impl FromStr for LeafInterface {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((module, port)) if !module.is_empty() && !port.is_empty() => Ok(LeafInterface {
                module: module.to_string(),
                port: port.to_string(),
            }),
            _ => Err(ParseError::InvalidInterface(s.to_string())),
        }
    }
}

impl TryFrom<String> for LeafInterface {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LeafInterface> for String {
    fn from(iface: LeafInterface) -> String {
        iface.to_string()
    }
}
