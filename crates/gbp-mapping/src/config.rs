//! Mapping configuration.
//!
//! Loaded from YAML. The supported external segment catalog describes, per
//! segment name, where the segment attaches to the fabric:
//!
//! ```yaml
//! common_tenant: common
//! transparent_service_types: [FIREWALL_TRANSPARENT]
//! external_segments:
//!   supported:
//!     switch: "401"
//!     port: "1/48"
//!     encap: vlan-100
//!     router_id: 1.0.0.1
//!     cidr_exposed: 192.168.0.2/24
//! ```

use crate::error::{MappingError, MappingResult};
use gbp_types::{Encap, IpAddress, IpPrefix, LeafInterface};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// How one external segment attaches to the fabric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCatalogEntry {
    /// Border leaf node id
    pub switch: String,
    /// `module/port` on the border leaf
    pub port: LeafInterface,
    pub encap: Encap,
    pub router_id: IpAddress,
    /// Address the fabric exposes on the segment, with its prefix length
    pub cidr_exposed: IpPrefix,
    /// Next hop for routes without one; first host of `cidr_exposed` if unset
    #[serde(default)]
    pub gateway_ip: Option<IpAddress>,
}

impl SegmentCatalogEntry {
    pub fn default_gateway(&self) -> Option<IpAddress> {
        self.gateway_ip.or_else(|| self.cidr_exposed.host(1))
    }

    /// Address a routing context gets on this segment when it asks for none.
    pub fn exposed_address(&self) -> IpAddress {
        *self.cidr_exposed.address()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Fabric tenant hosting objects derived from shared policy objects
    #[serde(default = "default_common_tenant")]
    pub common_tenant: String,

    /// Service types spliced into the path through shadow segments
    #[serde(default = "default_transparent_service_types")]
    pub transparent_service_types: BTreeSet<String>,

    /// Supported external segments keyed by segment name
    #[serde(default)]
    pub external_segments: BTreeMap<String, SegmentCatalogEntry>,
}

fn default_common_tenant() -> String {
    "common".to_string()
}

fn default_transparent_service_types() -> BTreeSet<String> {
    BTreeSet::from(["FIREWALL_TRANSPARENT".to_string()])
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            common_tenant: default_common_tenant(),
            transparent_service_types: default_transparent_service_types(),
            external_segments: BTreeMap::new(),
        }
    }
}

impl MappingConfig {
    pub fn from_yaml_str(content: &str) -> MappingResult<Self> {
        let config: MappingConfig = serde_yaml::from_str(content)
            .map_err(|e| MappingError::InvalidConfig(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> MappingResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            MappingError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> MappingResult<()> {
        if self.common_tenant.is_empty() {
            return Err(MappingError::InvalidConfig(
                "common_tenant must not be empty".to_string(),
            ));
        }
        for (name, entry) in &self.external_segments {
            if entry.switch.is_empty() {
                return Err(MappingError::InvalidConfig(format!(
                    "external segment {}: switch must not be empty",
                    name
                )));
            }
            if entry.default_gateway().is_none() {
                return Err(MappingError::InvalidConfig(format!(
                    "external segment {}: no default gateway in {}",
                    name, entry.cidr_exposed
                )));
            }
        }
        Ok(())
    }

    /// Catalog entry for a segment name; `None` means the deployment does
    /// not handle that segment.
    pub fn supported_segment(&self, name: &str) -> Option<&SegmentCatalogEntry> {
        self.external_segments.get(name)
    }

    pub fn is_transparent(&self, service_type: &str) -> bool {
        self.transparent_service_types.contains(service_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const CATALOG: &str = r#"
external_segments:
  supported:
    switch: "401"
    port: "1/48"
    encap: vlan-100
    router_id: 1.0.0.1
    cidr_exposed: 192.168.0.2/24
"#;

    #[test]
    fn test_defaults() {
        let config = MappingConfig::default();
        assert_eq!(config.common_tenant, "common");
        assert!(config.is_transparent("FIREWALL_TRANSPARENT"));
        assert!(!config.is_transparent("LOADBALANCER"));
    }

    #[test]
    fn test_catalog_entry() {
        let config = MappingConfig::from_yaml_str(CATALOG).unwrap();
        let entry = config.supported_segment("supported").unwrap();
        assert_eq!(entry.port.module(), "1");
        assert_eq!(entry.port.port(), "48");
        assert_eq!(entry.encap.to_string(), "vlan-100");
        assert_eq!(entry.exposed_address().to_string(), "192.168.0.2");
        assert_eq!(entry.default_gateway().unwrap().to_string(), "192.168.0.1");
        assert!(config.supported_segment("unsupported").is_none());
    }

    #[test]
    fn test_explicit_gateway_wins() {
        let yaml = format!("{}    gateway_ip: 192.168.0.254\n", CATALOG);
        let config = MappingConfig::from_yaml_str(&yaml).unwrap();
        let entry = config.supported_segment("supported").unwrap();
        assert_eq!(entry.default_gateway().unwrap().to_string(), "192.168.0.254");
    }

    #[test]
    fn test_bad_encap_rejected() {
        let yaml = CATALOG.replace("vlan-100", "vxlan-100");
        let err = MappingConfig::from_yaml_str(&yaml).unwrap_err();
        assert_eq!(err.type_name(), "InvalidConfig");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "common_tenant: shared-infra").unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();

        let config = MappingConfig::load(file.path()).unwrap();
        assert_eq!(config.common_tenant, "shared-infra");
        assert_eq!(config.external_segments.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        assert!(MappingConfig::load("/nonexistent/gbp-mapping.yaml").is_err());
    }
}
