use std::collections::{HashMap, HashSet};

use primitives::{priority, NodeAddress, Priority, Role};
use serde::{Deserialize, Serialize};

/// `(address, priority, roles)`. The local node's own entry is always
/// present once the table is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipEntry {
    pub address: NodeAddress,
    pub priority: Priority,
    pub roles: HashSet<Role>,
}

impl MembershipEntry {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertResult {
    pub added: bool,
    pub roles_changed: bool,
}

/// A priority-ranked split of the currently known membership relative to
/// the local node, used by the election engine to find who to challenge.
#[derive(Debug, Clone, Default)]
pub struct PriorityRank {
    pub higher: Vec<MembershipEntry>,
    pub lower: Vec<MembershipEntry>,
}

/// The known-nodes set. Entries are created on first contact with a peer
/// and removed only when a targeted unicast retry exhausts (spec §4.4).
/// Priority is always recomputed locally from `netmask` — never trusted
/// from the wire (spec §4.5, §9).
#[derive(Debug, Clone)]
pub struct MembershipTable {
    self_address: NodeAddress,
    netmask: NodeAddress,
    entries: HashMap<NodeAddress, MembershipEntry>,
}

impl MembershipTable {
    pub fn new(self_address: NodeAddress, netmask: NodeAddress) -> Self {
        let mut entries = HashMap::new();

        entries.insert(
            self_address,
            MembershipEntry {
                address: self_address,
                priority: priority(self_address, netmask),
                roles: HashSet::new(),
            },
        );

        Self {
            self_address,
            netmask,
            entries,
        }
    }

    pub fn self_address(&self) -> NodeAddress {
        self.self_address
    }

    pub fn self_priority(&self) -> Priority {
        priority(self.self_address, self.netmask)
    }

    pub fn self_entry(&self) -> &MembershipEntry {
        self.entries
            .get(&self.self_address)
            .expect("self entry always present")
    }

    pub fn contains(&self, address: NodeAddress) -> bool {
        self.entries.contains_key(&address)
    }

    pub fn get(&self, address: NodeAddress) -> Option<&MembershipEntry> {
        self.entries.get(&address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a newly observed peer, or merges `roles` into an existing
    /// one. Priority is always recomputed from the locally known netmask,
    /// regardless of what (if anything) the caller supplied.
    pub fn upsert(&mut self, address: NodeAddress, roles: HashSet<Role>) -> UpsertResult {
        let computed_priority = priority(address, self.netmask);

        match self.entries.get_mut(&address) {
            Some(entry) => {
                let roles_changed = entry.roles != roles;
                entry.roles = roles;
                entry.priority = computed_priority;

                UpsertResult {
                    added: false,
                    roles_changed,
                }
            },
            None => {
                self.entries.insert(
                    address,
                    MembershipEntry {
                        address,
                        priority: computed_priority,
                        roles,
                    },
                );

                UpsertResult {
                    added: true,
                    roles_changed: true,
                }
            },
        }
    }

    /// Merges a node-list received over the wire. The self-entry is never
    /// duplicated or overwritten from a peer's view (spec §4.5).
    pub fn merge_node_list(&mut self, nodes: impl IntoIterator<Item = (NodeAddress, HashSet<Role>)>) -> bool {
        let mut any_added = false;

        for (address, roles) in nodes {
            if address == self.self_address {
                continue;
            }

            let result = self.upsert(address, roles);
            any_added |= result.added;
        }

        any_added
    }

    /// Removed only when a targeted unicast retry exhausts (spec §4.4,
    /// §4.6 step 5). Removing the self-entry is never valid and is a no-op.
    pub fn remove(&mut self, address: NodeAddress) -> bool {
        if address == self.self_address {
            return false;
        }

        self.entries.remove(&address).is_some()
    }

    pub fn snapshot(&self) -> Vec<MembershipEntry> {
        let mut entries: Vec<_> = self.entries.values().cloned().collect();
        entries.sort_by_key(|e| e.address);
        entries
    }

    pub fn find_by_role(&self, role: Role) -> Option<&MembershipEntry> {
        self.entries.values().find(|e| e.has_role(role))
    }

    /// The member with the smallest priority currently known — the
    /// candidate for `GATEWAY` (spec §4.7).
    pub fn min_priority_member(&self) -> &MembershipEntry {
        self.entries
            .values()
            .min_by_key(|e| e.priority)
            .expect("self entry always present")
    }

    pub fn own_priority_rank(&self) -> PriorityRank {
        let self_priority = self.self_priority();
        let mut rank = PriorityRank::default();

        for entry in self.entries.values() {
            if entry.address == self.self_address {
                continue;
            }

            if entry.priority > self_priority {
                rank.higher.push(entry.clone());
            } else {
                rank.lower.push(entry.clone());
            }
        }

        rank
    }
}
