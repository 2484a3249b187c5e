//! Shadow topology for transparent service chains.

mod placement;
mod topology;

pub use placement::{placement_epg, segment_for, ChainRole, ChainSide};
pub use topology::{ProviderExit, ShadowTopology};
