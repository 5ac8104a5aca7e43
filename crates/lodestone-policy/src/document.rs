//! The parsed form of one policy file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lodestone_types::Privilege;
use serde::{Deserialize, Serialize};

/// The parsed content of a single policy file.
///
/// One document holds the four section maps of the policy format. A
/// document is a short-lived value: the store folds documents into a
/// resolved policy graph and discards them.
///
/// Duplicate keys within a section merge their value lists (union); a
/// group declared twice accumulates roles rather than overwriting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// `[groups]`: group name → role names granted to the group.
    groups: BTreeMap<String, Vec<String>>,

    /// `[roles]`: role name → privileges the role grants.
    roles: BTreeMap<String, Vec<Privilege>>,

    /// `[users]`: user name → group names the user belongs to.
    users: BTreeMap<String, Vec<String>>,

    /// `[databases]`: database name → location of its delegated policy
    /// file. Only meaningful in the global document.
    databases: BTreeMap<String, PathBuf>,
}

impl PolicyDocument {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants roles to a group, merging with any earlier declaration.
    pub fn add_group(&mut self, group: impl Into<String>, roles: Vec<String>) {
        merge_names(self.groups.entry(group.into()).or_default(), roles);
    }

    /// Grants privileges to a role, merging with any earlier declaration.
    pub fn add_role(&mut self, role: impl Into<String>, privileges: Vec<Privilege>) {
        let slot = self.roles.entry(role.into()).or_default();
        for privilege in privileges {
            if !slot.contains(&privilege) {
                slot.push(privilege);
            }
        }
    }

    /// Adds a user's group memberships, merging with any earlier declaration.
    pub fn add_user(&mut self, user: impl Into<String>, groups: Vec<String>) {
        merge_names(self.users.entry(user.into()).or_default(), groups);
    }

    /// Records a per-database delegation. A repeated database name
    /// replaces the earlier location.
    pub fn add_database(&mut self, database: impl Into<String>, location: impl Into<PathBuf>) {
        self.databases.insert(database.into(), location.into());
    }

    /// Returns the group → roles map.
    pub fn groups(&self) -> &BTreeMap<String, Vec<String>> {
        &self.groups
    }

    /// Returns the role → privileges map.
    pub fn roles(&self) -> &BTreeMap<String, Vec<Privilege>> {
        &self.roles
    }

    /// Returns the user → groups map.
    pub fn users(&self) -> &BTreeMap<String, Vec<String>> {
        &self.users
    }

    /// Returns the database → delegated-file map.
    pub fn databases(&self) -> &BTreeMap<String, PathBuf> {
        &self.databases
    }

    /// Returns whether the document declares any delegations.
    pub fn has_delegations(&self) -> bool {
        !self.databases.is_empty()
    }

    /// Resolves the delegated file locations against `base` (the global
    /// document's parent directory). Absolute locations are unchanged.
    pub fn resolve_delegations(&mut self, base: &Path) {
        for location in self.databases.values_mut() {
            if location.is_relative() {
                *location = base.join(&*location);
            }
        }
    }
}

/// Appends names not already present, preserving declaration order.
fn merge_names(slot: &mut Vec<String>, names: Vec<String>) {
    for name in names {
        if !slot.contains(&name) {
            slot.push(name);
        }
    }
}
