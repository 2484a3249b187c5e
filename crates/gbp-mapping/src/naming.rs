//! Fabric object naming.
//!
//! Identifiers pass through a [`NameMapper`] before they reach the fabric.
//! Derived names (shadow objects, reverse filters, the chain "any" contract)
//! are built from already-mapped identifiers.

/// Shadow endpoint group kept on every bridge domain.
pub const SHADOW_PREFIX: &str = "Shd-";
/// Filter matching return traffic of a one-way rule.
pub const REVERSE_PREFIX: &str = "reverse-";
/// Contract closing a service chain back onto its provider.
pub const ANY_PREFIX: &str = "any-";

/// Injective transform from policy identifiers to fabric-legal names.
pub trait NameMapper: Send + Sync {
    fn tenant(&self, tenant_id: &str) -> String;
    fn object(&self, id: &str) -> String;
}

/// Passes identifiers through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityNameMapper;

impl NameMapper for IdentityNameMapper {
    fn tenant(&self, tenant_id: &str) -> String {
        tenant_id.to_string()
    }

    fn object(&self, id: &str) -> String {
        id.to_string()
    }
}

pub fn shadow_epg_name(bridge_domain: &str) -> String {
    format!("{}{}", SHADOW_PREFIX, bridge_domain)
}

pub fn reverse_filter_name(rule: &str) -> String {
    format!("{}{}", REVERSE_PREFIX, rule)
}

pub fn any_contract_name(instance: &str) -> String {
    format!("{}{}", ANY_PREFIX, instance)
}

/// Shadow bridge domain / endpoint group of a chain segment.
pub fn chain_segment_name(ordinal: usize, instance: &str) -> String {
    format!("{}-{}", ordinal, instance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_derived_names() {
        assert_eq!(shadow_epg_name("l2p1"), "Shd-l2p1");
        assert_eq!(reverse_filter_name("r1"), "reverse-r1");
        assert_eq!(any_contract_name("sci1"), "any-sci1");
        assert_eq!(chain_segment_name(2, "sci1"), "2-sci1");
    }
}
