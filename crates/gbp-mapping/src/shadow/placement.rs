//! Which chain segment a service port lands on.
//!
//! Service node ports are policy targets named
//! `chain_<provider|consumer>_<position>_<transparent|notransparent>`, with
//! `position` counting nodes from 1 in the flattened chain.

use crate::naming::chain_segment_name;

const CHAIN_ROLE_PREFIX: &str = "chain_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainSide {
    Provider,
    Consumer,
}

/// Role of a service port, decoded from its endpoint name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainRole {
    pub side: ChainSide,
    pub position: usize,
    pub transparent: bool,
}

impl ChainRole {
    /// Decodes an endpoint name; `None` for ordinary endpoints.
    pub fn parse(name: &str) -> Option<Self> {
        let mut parts = name.strip_prefix(CHAIN_ROLE_PREFIX)?.split('_');
        let side = match parts.next()? {
            "provider" => ChainSide::Provider,
            "consumer" => ChainSide::Consumer,
            _ => return None,
        };
        let position: usize = parts.next()?.parse().ok().filter(|p| *p >= 1)?;
        let transparent = match parts.next()? {
            "transparent" => true,
            "notransparent" => false,
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(ChainRole {
            side,
            position,
            transparent,
        })
    }
}

/// Shadow segment ordinal for a role, given the chain's node kinds in order
/// (`true` = transparent). `None` when the chain has no transparent node.
pub fn segment_for(transparent_nodes: &[bool], role: &ChainRole) -> Option<usize> {
    if !transparent_nodes.iter().any(|t| *t) {
        return None;
    }
    let before = transparent_nodes
        .iter()
        .take(role.position - 1)
        .filter(|t| **t)
        .count();
    let egress = usize::from(role.side == ChainSide::Consumer && role.transparent);
    Some(before + egress)
}

/// Endpoint group a chain port is programmed into.
pub fn placement_epg(
    instance_id: &str,
    provider_epg: &str,
    transparent_nodes: &[bool],
    role: &ChainRole,
) -> String {
    match segment_for(transparent_nodes, role) {
        Some(segment) => chain_segment_name(segment, instance_id),
        None => provider_epg.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn role(name: &str) -> ChainRole {
        ChainRole::parse(name).unwrap()
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            role("chain_consumer_4_transparent"),
            ChainRole {
                side: ChainSide::Consumer,
                position: 4,
                transparent: true,
            }
        );
        assert!(ChainRole::parse("web-1").is_none());
        assert!(ChainRole::parse("chain_provider_0_transparent").is_none());
        assert!(ChainRole::parse("chain_middle_1_transparent").is_none());
        assert!(ChainRole::parse("chain_provider_1_opaque").is_none());
        assert!(ChainRole::parse("chain_provider_1_transparent_x").is_none());
    }

    #[test]
    fn test_mixed_chain_placement() {
        // LB, FW, LB, FW
        let nodes = [false, true, false, true];
        let cases = [
            ("chain_provider_1_notransparent", "0-sci1"),
            ("chain_provider_3_notransparent", "1-sci1"),
            ("chain_provider_2_transparent", "0-sci1"),
            ("chain_consumer_2_transparent", "1-sci1"),
            ("chain_provider_4_transparent", "1-sci1"),
            ("chain_consumer_4_transparent", "2-sci1"),
        ];
        for (name, expected) in cases {
            assert_eq!(placement_epg("sci1", "ptg1", &nodes, &role(name)), expected, "{}", name);
        }
    }

    #[test]
    fn test_no_transparent_nodes_stay_on_provider() {
        let nodes = [false, false];
        assert_eq!(
            placement_epg("sci1", "ptg1", &nodes, &role("chain_provider_2_notransparent")),
            "ptg1"
        );
    }
}
