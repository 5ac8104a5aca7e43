//! Privilege evaluation against a resolved policy graph.

use std::fmt::{self, Display};

use lodestone_store::PolicyGraph;
use lodestone_types::{Action, Resource};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// The outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// The principal may perform the action.
    Allow,
    /// The principal may not. The reason distinguishes why, without
    /// naming any privilege or role that would have permitted it.
    Deny(DenyReason),
}

impl Decision {
    /// Returns whether this decision grants access.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Why an authorization check denied access.
///
/// The `Display` form is safe to surface to the requesting user: it never
/// reveals which privilege or role would have permitted the action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenyReason {
    /// The principal resolves to zero groups.
    NoGroups,

    /// The principal's groups grant no privilege matching the request.
    NoMatchingPrivilege,

    /// The requested database is not governed by any loaded policy
    /// document. Informational only — the request is still denied.
    UnknownDatabase {
        /// The database the request named.
        database: String,
    },
}

impl Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::NoGroups => {
                write!(f, "access denied: principal has no group memberships")
            }
            DenyReason::NoMatchingPrivilege => write!(f, "access denied"),
            DenyReason::UnknownDatabase { database } => {
                write!(f, "access denied: database '{database}' is not governed by policy")
            }
        }
    }
}

/// Evaluates a privilege request against a policy graph.
///
/// Allow iff some privilege the principal resolves to sits at or above
/// the requested resource in the hierarchy and grants the requested
/// action (or `all`). Pure read: the only side effect is audit logging.
pub fn authorize(
    graph: &PolicyGraph,
    principal: &str,
    action: Action,
    resource: &Resource,
) -> Decision {
    if graph.groups_of(principal).is_empty() {
        warn!(
            principal = %principal,
            action = %action,
            resource = %resource,
            "access denied: no resolvable groups"
        );
        return Decision::Deny(DenyReason::NoGroups);
    }

    let privileges = graph.resolve(principal);
    if privileges.iter().any(|p| p.implies(action, resource)) {
        info!(
            principal = %principal,
            action = %action,
            resource = %resource,
            "access granted"
        );
        return Decision::Allow;
    }

    let reason = match resource.db_name() {
        Some(db) if !graph.knows_database(db) => DenyReason::UnknownDatabase {
            database: db.to_string(),
        },
        _ => DenyReason::NoMatchingPrivilege,
    };
    warn!(
        principal = %principal,
        action = %action,
        resource = %resource,
        reason = ?reason,
        "access denied"
    );
    Decision::Deny(reason)
}
