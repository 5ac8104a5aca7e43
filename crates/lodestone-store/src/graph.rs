//! The resolved, immutable privilege graph.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use lodestone_types::Privilege;
use serde::{Deserialize, Serialize};

/// An immutable snapshot of the fully composed policy.
///
/// Maps principals to groups to roles to privileges, flattened from the
/// global document and every successfully loaded delegated document. A
/// graph is never mutated after construction; a policy reload builds a
/// new graph and publishes it whole.
///
/// Privilege implication (coarser resource covers finer, `all` covers
/// every action) is evaluated by the authorizer at query time against the
/// stored sets; the graph never pre-expands them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyGraph {
    /// user → group names.
    users: BTreeMap<String, Vec<String>>,

    /// group → role names. Only resolvable role references survive
    /// graph construction.
    groups: BTreeMap<String, Vec<String>>,

    /// role → privileges.
    roles: BTreeMap<String, Vec<Privilege>>,

    /// Databases the store knows about: declared delegations plus any
    /// database named by a privilege. Used for the informational
    /// unknown-database deny reason.
    databases: BTreeSet<String>,
}

impl PolicyGraph {
    pub(crate) fn new(
        users: BTreeMap<String, Vec<String>>,
        groups: BTreeMap<String, Vec<String>>,
        roles: BTreeMap<String, Vec<Privilege>>,
        databases: BTreeSet<String>,
    ) -> Self {
        Self {
            users,
            groups,
            roles,
            databases,
        }
    }

    /// Returns the groups the principal belongs to, skipping group names
    /// that no document declared.
    ///
    /// An unknown group reference costs the principal only that grant
    /// path; it is not an error here (strict handling, when enabled,
    /// rejects it at load time instead).
    pub fn groups_of(&self, principal: &str) -> Vec<&str> {
        self.users
            .get(principal)
            .map(|names| {
                names
                    .iter()
                    .filter(|name| self.groups.contains_key(*name))
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Computes the full privilege set reachable by the principal through
    /// its groups and their roles.
    ///
    /// Deterministic and pure: the same graph and principal always yield
    /// the same set. A principal with no group mapping resolves to the
    /// empty set.
    pub fn resolve(&self, principal: &str) -> HashSet<&Privilege> {
        let mut privileges = HashSet::new();
        for group in self.groups_of(principal) {
            let Some(roles) = self.groups.get(group) else {
                continue;
            };
            for role in roles {
                if let Some(granted) = self.roles.get(role) {
                    privileges.extend(granted.iter());
                }
            }
        }
        privileges
    }

    /// Returns whether any policy document governs the named database.
    pub fn knows_database(&self, database: &str) -> bool {
        self.databases.contains(database)
    }

    /// Returns the number of principals with a user entry.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Returns the number of roles carrying at least one privilege.
    pub fn role_count(&self) -> usize {
        self.roles.len()
    }
}
