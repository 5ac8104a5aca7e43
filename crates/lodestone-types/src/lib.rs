//! # lodestone-types: Core types for the Lodestone authorization engine
//!
//! This crate contains the vocabulary shared across the engine:
//! - Actions ([`Action`]) — the closed set of SQL operations a policy can grant
//! - Resources ([`Resource`]) — the server ⊇ database ⊇ table hierarchy
//! - Privileges ([`Privilege`]) — a resource chain plus an action
//!
//! Privilege strings are parsed into their structured form at policy load
//! time, so malformed syntax is caught while loading a policy file rather
//! than while serving a live authorization request.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Errors produced while parsing privilege or resource strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrivilegeError {
    /// The string was empty or contained no parts.
    #[error("empty privilege string")]
    Empty,

    /// The chain did not start with a `server=` part.
    #[error("privilege must start with 'server=': {0:?}")]
    MissingServer(String),

    /// A part was not `key=value` or appeared out of hierarchy order.
    #[error("unexpected part {part:?} in privilege chain")]
    UnexpectedPart { part: String },

    /// A part had an empty value (e.g. `db=`).
    #[error("empty value for {key:?} in privilege chain")]
    EmptyValue { key: String },

    /// The action name is not in the recognized action set.
    #[error("unknown action {0:?}")]
    UnknownAction(String),
}

// ============================================================================
// Action
// ============================================================================

/// A SQL operation that a privilege can grant.
///
/// The set is closed: unknown action names are rejected at parse time.
/// [`Action::All`] implies every other action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Read rows from a table.
    Select,
    /// Insert rows into a table.
    Insert,
    /// Create a database or table.
    Create,
    /// Drop a database or table.
    Drop,
    /// Alter a table definition.
    Alter,
    /// Create or drop an index.
    Index,
    /// Lock a table.
    Lock,
    /// All of the above.
    All,
}

impl Action {
    /// Returns whether a grant of `self` satisfies a request for `requested`.
    pub fn implies(self, requested: Action) -> bool {
        self == Action::All || self == requested
    }

    /// Returns the lowercase policy-file spelling of this action.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Select => "select",
            Action::Insert => "insert",
            Action::Create => "create",
            Action::Drop => "drop",
            Action::Alter => "alter",
            Action::Index => "index",
            Action::Lock => "lock",
            Action::All => "all",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = PrivilegeError;

    /// Parses an action name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "select" => Ok(Action::Select),
            "insert" => Ok(Action::Insert),
            "create" => Ok(Action::Create),
            "drop" => Ok(Action::Drop),
            "alter" => Ok(Action::Alter),
            "index" => Ok(Action::Index),
            "lock" => Ok(Action::Lock),
            "all" | "*" => Ok(Action::All),
            _ => Err(PrivilegeError::UnknownAction(s.to_string())),
        }
    }
}

// ============================================================================
// Resource
// ============================================================================

/// A point in the server ⊇ database ⊇ table hierarchy.
///
/// A resource always names a server. It may additionally name a database,
/// and (only when a database is present) a table. Identifiers are
/// case-sensitive.
///
/// # Examples
///
/// ```
/// use lodestone_types::Resource;
///
/// let db = Resource::database("server1", "db1");
/// let tbl = Resource::table("server1", "db1", "tbl1");
/// assert!(db.contains(&tbl));
/// assert!(!tbl.contains(&db));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    server: String,
    db: Option<String>,
    table: Option<String>,
}

impl Resource {
    /// Creates a server-level resource.
    pub fn server(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            db: None,
            table: None,
        }
    }

    /// Creates a database-level resource.
    pub fn database(server: impl Into<String>, db: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            db: Some(db.into()),
            table: None,
        }
    }

    /// Creates a table-level resource.
    pub fn table(
        server: impl Into<String>,
        db: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            db: Some(db.into()),
            table: Some(table.into()),
        }
    }

    /// Returns the server name.
    pub fn server_name(&self) -> &str {
        &self.server
    }

    /// Returns the database name, if this resource names one.
    pub fn db_name(&self) -> Option<&str> {
        self.db.as_deref()
    }

    /// Returns the table name, if this resource names one.
    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Returns whether `self` is the same resource as `other` or an
    /// ancestor of it in the hierarchy.
    ///
    /// A grant on a coarser resource covers every finer resource beneath
    /// it: `server=s1` contains `server=s1->db=d1->table=t1`, but
    /// `server=s1->db=d1` does not contain `server=s1->db=d2`.
    pub fn contains(&self, other: &Resource) -> bool {
        if self.server != other.server {
            return false;
        }
        match (&self.db, &other.db) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(a), Some(b)) if a != b => false,
            _ => match (&self.table, &other.table) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(a), Some(b)) => a == b,
            },
        }
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "server={}", self.server)?;
        if let Some(db) = &self.db {
            write!(f, "->db={db}")?;
        }
        if let Some(table) = &self.table {
            write!(f, "->table={table}")?;
        }
        Ok(())
    }
}

impl FromStr for Resource {
    type Err = PrivilegeError;

    /// Parses a resource chain: `server=<id>(->db=<id>(->table=<id>)?)?`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chain = parse_chain(s)?;
        if let Some(action) = chain.action {
            return Err(PrivilegeError::UnexpectedPart {
                part: format!("action={action}"),
            });
        }
        Ok(chain.resource)
    }
}

// ============================================================================
// Privilege
// ============================================================================

/// A (resource, action) pair granting permission.
///
/// The textual grammar is
/// `server=<id>(->db=<id>(->table=<id>)?)?(->action=<action>)?`.
/// A chain with no trailing `action=` part grants all actions on the
/// resource, so `server=server1` is the conventional spelling of a
/// server-wide admin grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Privilege {
    resource: Resource,
    action: Action,
}

impl Privilege {
    /// Creates a privilege from its parts.
    pub fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }

    /// Returns the resource this privilege applies to.
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Returns the action this privilege grants.
    pub fn action(&self) -> Action {
        self.action
    }

    /// Returns whether this privilege satisfies a request to perform
    /// `action` on `resource`.
    ///
    /// Implication is evaluated here at query time; stored privilege sets
    /// are never pre-expanded.
    pub fn implies(&self, action: Action, resource: &Resource) -> bool {
        self.action.implies(action) && self.resource.contains(resource)
    }
}

impl Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->action={}", self.resource, self.action)
    }
}

impl FromStr for Privilege {
    type Err = PrivilegeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chain = parse_chain(s)?;
        Ok(Privilege {
            resource: chain.resource,
            action: chain.action.unwrap_or(Action::All),
        })
    }
}

// ============================================================================
// Chain parsing
// ============================================================================

struct Chain {
    resource: Resource,
    action: Option<Action>,
}

/// Splits a `->`-separated chain of `key=value` parts and validates the
/// hierarchy order: server, then db, then table, then action. The action
/// part may directly follow any resource level.
fn parse_chain(s: &str) -> Result<Chain, PrivilegeError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(PrivilegeError::Empty);
    }

    let mut parts = s.split("->").map(str::trim);

    let server = match parts.next().and_then(|p| p.strip_prefix("server=")) {
        Some(v) if !v.is_empty() => v.to_string(),
        Some(_) => return Err(PrivilegeError::EmptyValue { key: "server".into() }),
        None => return Err(PrivilegeError::MissingServer(s.to_string())),
    };

    let mut resource = Resource::server(server);
    let mut action = None;

    for part in parts {
        // Nothing may follow the action part.
        if action.is_some() {
            return Err(PrivilegeError::UnexpectedPart { part: part.into() });
        }
        let Some((key, value)) = part.split_once('=') else {
            return Err(PrivilegeError::UnexpectedPart { part: part.into() });
        };
        if value.is_empty() {
            return Err(PrivilegeError::EmptyValue { key: key.into() });
        }
        match key {
            "db" if resource.db.is_none() => resource.db = Some(value.to_string()),
            "table" if resource.db.is_some() && resource.table.is_none() => {
                resource.table = Some(value.to_string());
            }
            "action" => action = Some(value.parse()?),
            _ => return Err(PrivilegeError::UnexpectedPart { part: part.into() }),
        }
    }

    Ok(Chain { resource, action })
}
