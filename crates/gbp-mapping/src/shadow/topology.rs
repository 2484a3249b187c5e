//! Shadow segments splicing transparent service nodes into a provider's path.
//!
//! For a chain with N transparent nodes the provider is moved onto shadow
//! bridge domain `0-<instance>`, each node bridges shadow segment k to k+1,
//! and shadow endpoint group `N-<instance>` sits on the provider's original
//! bridge domain, providing the original rule set to consumers there:
//!
//! ```text
//! provider ── BD 0 ── [node 1] ── BD 1 ── ... ── [node N] ── original BD
//!             EPG 0               EPG 1                       EPG N
//! ```
//!
//! The provider reaches EPG 0 through the synthetic `any-<instance>`
//! contract: the provider provides it and EPG 0 consumes it.

use crate::naming::{any_contract_name, chain_segment_name};
use gbp_fabric::{FabricOp, FilterEntry, SubjectDirection, Transaction};

/// Where the provider goes when a shadow path is torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderExit {
    /// The provider itself was deleted.
    Gone,
    /// Back onto its own bridge domain.
    Restore,
    /// Onto another chain's entry segment.
    Rebind { bd_owner: String, bd: String },
}

/// Names and owners needed to wire one chain instance.
///
/// All names are already mapped to fabric form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowTopology {
    pub instance_id: String,
    /// Owner of the shadow objects: the provider's routing context tenant
    pub tenant: String,
    pub context: String,
    pub provider_owner: String,
    pub provider: String,
    pub bd_owner: String,
    /// Provider's own bridge domain
    pub bd: String,
    pub rule_set_owner: String,
    pub rule_set: String,
    pub transparent_nodes: usize,
}

impl ShadowTopology {
    fn segment(&self, ordinal: usize) -> String {
        chain_segment_name(ordinal, &self.instance_id)
    }

    fn any_contract(&self) -> String {
        any_contract_name(&self.instance_id)
    }

    /// Shadow bridge domain names, ascending.
    pub fn bridge_domains(&self) -> Vec<String> {
        (0..self.transparent_nodes).map(|x| self.segment(x)).collect()
    }

    /// Shadow endpoint group names, ascending. Empty without transparent nodes.
    pub fn endpoint_groups(&self) -> Vec<String> {
        if self.transparent_nodes == 0 {
            return Vec::new();
        }
        (0..=self.transparent_nodes).map(|x| self.segment(x)).collect()
    }

    /// Exit that keeps the provider on this chain's entry segment.
    pub fn entry(&self) -> ProviderExit {
        ProviderExit::Rebind {
            bd_owner: self.tenant.clone(),
            bd: self.segment(0),
        }
    }

    fn provider_binding(&self, bd_owner: &str, bd_name: String) -> FabricOp {
        FabricOp::EnsureEpgCreated {
            owner: self.provider_owner.clone(),
            epg: self.provider.clone(),
            bd_owner: bd_owner.to_string(),
            bd_name,
        }
    }

    fn any_subject_filter(&self, direction: SubjectDirection, unset: bool) -> FabricOp {
        FabricOp::ManageContractSubjectFilter {
            owner: self.tenant.clone(),
            contract: self.any_contract(),
            subject: self.any_contract(),
            filter: self.any_contract(),
            rule_owner: self.tenant.clone(),
            direction,
            unset,
        }
    }

    /// Operations creating the shadow path, in dependency order.
    pub fn build_ops(&self) -> Vec<FabricOp> {
        let n = self.transparent_nodes;
        if n == 0 {
            return Vec::new();
        }
        let mut ops = Vec::new();

        for bd in self.bridge_domains() {
            ops.push(FabricOp::EnsureBdCreated {
                owner: self.tenant.clone(),
                bd,
                ctx_owner: self.tenant.clone(),
                ctx_name: self.context.clone(),
                allow_broadcast: true,
            });
        }
        for x in 0..n {
            ops.push(FabricOp::EnsureEpgCreated {
                owner: self.tenant.clone(),
                epg: self.segment(x),
                bd_owner: self.tenant.clone(),
                bd_name: self.segment(x),
            });
        }
        ops.push(self.provider_binding(&self.tenant, self.segment(0)));
        ops.push(FabricOp::EnsureEpgCreated {
            owner: self.tenant.clone(),
            epg: self.segment(n),
            bd_owner: self.bd_owner.clone(),
            bd_name: self.bd.clone(),
        });
        ops.push(FabricOp::SetContractForEpg {
            owner: self.tenant.clone(),
            epg: self.segment(n),
            contract: self.rule_set.clone(),
            contract_owner: self.rule_set_owner.clone(),
            provider: true,
        });

        ops.push(FabricOp::CreateContract {
            owner: self.tenant.clone(),
            contract: self.any_contract(),
        });
        ops.push(FabricOp::CreateTenantFilter {
            owner: self.tenant.clone(),
            filter: self.any_contract(),
            entry: FilterEntry::unspecified(),
        });
        ops.push(self.any_subject_filter(SubjectDirection::In, false));
        ops.push(self.any_subject_filter(SubjectDirection::Out, false));
        ops.push(FabricOp::SetContractForEpg {
            owner: self.tenant.clone(),
            epg: self.segment(0),
            contract: self.any_contract(),
            contract_owner: self.tenant.clone(),
            provider: false,
        });
        ops.push(FabricOp::SetContractForEpg {
            owner: self.provider_owner.clone(),
            epg: self.provider.clone(),
            contract: self.any_contract(),
            contract_owner: self.tenant.clone(),
            provider: true,
        });
        ops
    }

    /// Inverse of [`build_ops`](Self::build_ops), moving the provider to
    /// `exit`. A deleted provider is neither moved nor stripped of the
    /// "any" contract.
    pub fn teardown_ops(&self, exit: &ProviderExit) -> Vec<FabricOp> {
        let n = self.transparent_nodes;
        if n == 0 {
            return Vec::new();
        }
        let mut ops = Vec::new();

        if *exit != ProviderExit::Gone {
            ops.push(FabricOp::UnsetContractForEpg {
                owner: self.provider_owner.clone(),
                epg: self.provider.clone(),
                contract: self.any_contract(),
                contract_owner: self.tenant.clone(),
                provider: true,
            });
        }
        ops.push(FabricOp::UnsetContractForEpg {
            owner: self.tenant.clone(),
            epg: self.segment(0),
            contract: self.any_contract(),
            contract_owner: self.tenant.clone(),
            provider: false,
        });
        ops.push(self.any_subject_filter(SubjectDirection::Out, true));
        ops.push(self.any_subject_filter(SubjectDirection::In, true));
        ops.push(FabricOp::DeleteTenantFilter {
            owner: self.tenant.clone(),
            filter: self.any_contract(),
        });
        ops.push(FabricOp::DeleteContract {
            owner: self.tenant.clone(),
            contract: self.any_contract(),
        });

        ops.push(FabricOp::UnsetContractForEpg {
            owner: self.tenant.clone(),
            epg: self.segment(n),
            contract: self.rule_set.clone(),
            contract_owner: self.rule_set_owner.clone(),
            provider: true,
        });
        ops.push(FabricOp::DeleteEpg {
            owner: self.tenant.clone(),
            epg: self.segment(n),
        });
        match exit {
            ProviderExit::Gone => {}
            ProviderExit::Restore => {
                ops.push(self.provider_binding(&self.bd_owner, self.bd.clone()))
            }
            ProviderExit::Rebind { bd_owner, bd } => {
                ops.push(self.provider_binding(bd_owner, bd.clone()))
            }
        }
        for x in (0..n).rev() {
            ops.push(FabricOp::DeleteEpg {
                owner: self.tenant.clone(),
                epg: self.segment(x),
            });
        }
        for x in (0..n).rev() {
            ops.push(FabricOp::DeleteBd {
                owner: self.tenant.clone(),
                bd: self.segment(x),
            });
        }
        ops
    }

    pub fn build(&self, txn: &mut Transaction) {
        txn.extend(self.build_ops());
    }

    pub fn teardown(&self, txn: &mut Transaction, exit: &ProviderExit) {
        txn.extend(self.teardown_ops(exit));
    }
}
