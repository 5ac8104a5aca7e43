//! Loading and composing policy documents.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use lodestone_policy::{PolicyDocument, PolicyError, PolicyParser};
use lodestone_types::Privilege;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::graph::PolicyGraph;

/// Result type for store operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors that abort a policy load.
///
/// Only the global document and structural inconsistencies are fatal;
/// delegated-document failures degrade into the [`LoadReport`] instead.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The global policy file could not be read.
    #[error("failed to read policy file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The global policy file failed to parse.
    #[error("malformed policy file {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: PolicyError,
    },

    /// A group granted a role that no document defines.
    #[error("group {group:?} references undefined role {role:?}")]
    UnknownRoleReference { group: String, role: String },

    /// A user referenced a group that no document defines
    /// (strict mode only).
    #[error("user {user:?} references undefined group {group:?}")]
    UnknownGroupReference { user: String, group: String },
}

/// One degraded delegation from a load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationFailure {
    /// The database whose delegated document failed.
    pub database: String,
    /// Where the document was expected.
    pub location: PathBuf,
    /// Why it failed.
    pub reason: String,
}

/// Non-fatal findings from a policy load.
///
/// A load that returns `Ok` may still have degraded databases: their
/// delegated documents failed, so no grants flow through them, but the
/// rest of the policy is in force.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadReport {
    failures: Vec<DelegationFailure>,
}

impl LoadReport {
    /// Returns whether every delegated document loaded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the delegations that failed to load.
    pub fn failures(&self) -> &[DelegationFailure] {
        &self.failures
    }

    fn record(&mut self, database: &str, location: &Path, reason: impl ToString) {
        warn!(
            database = %database,
            location = %location.display(),
            reason = %reason.to_string(),
            "delegated policy document degraded"
        );
        self.failures.push(DelegationFailure {
            database: database.to_string(),
            location: location.to_path_buf(),
            reason: reason.to_string(),
        });
    }
}

/// Loads and composes policy documents into a [`PolicyGraph`].
///
/// The store itself holds only configuration (the global document's
/// location and parse options); every [`load`](PolicyStore::load) re-reads
/// the files and produces a fresh immutable graph, so the reload
/// coordinator can build off to the side and publish atomically.
#[derive(Debug, Clone)]
pub struct PolicyStore {
    global_path: PathBuf,
    parser: PolicyParser,
    strict_user_groups: bool,
}

impl PolicyStore {
    /// Creates a store rooted at the global policy file.
    pub fn new(global_path: impl Into<PathBuf>) -> Self {
        Self {
            global_path: global_path.into(),
            parser: PolicyParser::new(),
            strict_user_groups: false,
        }
    }

    /// Sets whether unknown policy sections are skipped instead of
    /// failing the parse.
    #[must_use]
    pub fn allow_unknown_sections(mut self, allow: bool) -> Self {
        self.parser = self.parser.clone().allow_unknown_sections(allow);
        self
    }

    /// Sets whether a user entry naming an undefined group fails the
    /// load. Off by default: the user simply gains nothing from that
    /// entry.
    #[must_use]
    pub fn strict_user_groups(mut self, strict: bool) -> Self {
        self.strict_user_groups = strict;
        self
    }

    /// Returns the global policy file location.
    pub fn global_path(&self) -> &Path {
        &self.global_path
    }

    /// Loads the global document, follows its delegations, and composes
    /// everything into a resolved graph.
    ///
    /// Global-document failures abort the load. Delegated-document
    /// failures degrade that database only and are recorded in the
    /// report.
    pub fn load(&self) -> LoadResult<(PolicyGraph, LoadReport)> {
        let mut global = self.read_document(&self.global_path)?;
        if let Some(base) = self.global_path.parent() {
            global.resolve_delegations(base);
        }

        let mut report = LoadReport::default();
        let delegations = global.databases().clone();
        let mut merged = Merged::from_global(&global);

        for (database, location) in &delegations {
            match self.read_delegated(database, location) {
                Ok(doc) => merged.absorb(database, &doc),
                Err(reason) => report.record(database, location, reason),
            }
        }

        let graph = merged.into_graph(&delegations, &report, self.strict_user_groups)?;
        info!(
            global = %self.global_path.display(),
            users = graph.user_count(),
            roles = graph.role_count(),
            degraded = report.failures().len(),
            "policy loaded"
        );
        Ok((graph, report))
    }

    fn read_document(&self, path: &Path) -> LoadResult<PolicyDocument> {
        let text = fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.parser.parse(&text).map_err(|source| LoadError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads one delegated document. Any failure here is degrading, so
    /// the error side is just the reason to report.
    fn read_delegated(&self, database: &str, location: &Path) -> Result<PolicyDocument, String> {
        let doc = self.read_document(location).map_err(|e| e.to_string())?;
        if doc.has_delegations() {
            return Err(format!(
                "delegated document for database {database:?} declares its own [databases] section"
            ));
        }
        Ok(doc)
    }
}

/// Working state while folding documents into one namespace.
///
/// Role and group names are global: a delegated document may re-open a
/// name the global document declared and add to it. This flat namespace
/// is inherited from the source system; see DESIGN.md.
struct Merged {
    users: BTreeMap<String, Vec<String>>,
    groups: BTreeMap<String, Vec<String>>,
    roles: BTreeMap<String, Vec<Privilege>>,
    privilege_databases: BTreeSet<String>,
}

impl Merged {
    fn from_global(global: &PolicyDocument) -> Self {
        let mut merged = Self {
            users: global.users().clone(),
            groups: global.groups().clone(),
            roles: BTreeMap::new(),
            privilege_databases: BTreeSet::new(),
        };
        for (role, privileges) in global.roles() {
            merged.add_role(role, privileges.iter().cloned());
        }
        merged
    }

    /// Folds a delegated document in, scoped to its database: privilege
    /// chains that name a different database (or none) are dropped.
    fn absorb(&mut self, database: &str, doc: &PolicyDocument) {
        for (user, groups) in doc.users() {
            merge_names(self.users.entry(user.clone()).or_default(), groups);
        }
        for (group, roles) in doc.groups() {
            merge_names(self.groups.entry(group.clone()).or_default(), roles);
        }
        for (role, privileges) in doc.roles() {
            let (in_scope, out_of_scope): (Vec<_>, Vec<_>) = privileges
                .iter()
                .cloned()
                .partition(|p| p.resource().db_name() == Some(database));
            for dropped in out_of_scope {
                warn!(
                    database = %database,
                    role = %role,
                    privilege = %dropped,
                    "ignoring out-of-scope privilege in delegated document"
                );
            }
            self.add_role(role, in_scope.into_iter());
        }
    }

    fn add_role(&mut self, role: &str, privileges: impl Iterator<Item = Privilege>) {
        let slot = self.roles.entry(role.to_string()).or_default();
        for privilege in privileges {
            if let Some(db) = privilege.resource().db_name() {
                self.privilege_databases.insert(db.to_string());
            }
            if !slot.contains(&privilege) {
                slot.push(privilege);
            }
        }
    }

    /// Validates references and seals the graph.
    ///
    /// A group naming an undefined role is a structural inconsistency and
    /// fails the load — unless a delegation already degraded, in which
    /// case the missing role may live in the failed document and the
    /// reference is dropped with a warning instead (one broken per-db
    /// file must not lock out every database).
    fn into_graph(
        mut self,
        delegations: &BTreeMap<String, PathBuf>,
        report: &LoadReport,
        strict_user_groups: bool,
    ) -> LoadResult<PolicyGraph> {
        for (group, roles) in &mut self.groups {
            if report.is_clean() {
                if let Some(role) = roles.iter().find(|r| !self.roles.contains_key(*r)) {
                    return Err(LoadError::UnknownRoleReference {
                        group: group.clone(),
                        role: role.clone(),
                    });
                }
            } else {
                roles.retain(|role| {
                    let known = self.roles.contains_key(role);
                    if !known {
                        warn!(
                            group = %group,
                            role = %role,
                            "dropping unresolved role reference after degraded load"
                        );
                    }
                    known
                });
            }
        }

        if strict_user_groups {
            for (user, groups) in &self.users {
                if let Some(group) = groups.iter().find(|g| !self.groups.contains_key(*g)) {
                    return Err(LoadError::UnknownGroupReference {
                        user: user.clone(),
                        group: group.clone(),
                    });
                }
            }
        }

        let mut databases = self.privilege_databases;
        databases.extend(delegations.keys().cloned());

        Ok(PolicyGraph::new(self.users, self.groups, self.roles, databases))
    }
}

fn merge_names(slot: &mut Vec<String>, names: &[String]) {
    for name in names {
        if !slot.contains(name) {
            slot.push(name.clone());
        }
    }
}
