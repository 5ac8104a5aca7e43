//! Engine error types.

use lodestone_store::LoadError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while serving engine calls.
///
/// A [`Decision::Deny`](crate::Decision::Deny) is not an error — it is a
/// valid negative authorization result. These variants cover caller
/// misuse and engine lifecycle instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine was closed; no further calls are served.
    #[error("policy engine is closed")]
    Closed,

    /// The request itself was malformed (unknown action, unparseable
    /// resource path, empty principal). Distinct from a deny: it
    /// indicates caller misuse, not an authorization outcome.
    #[error("invalid authorization request: {0}")]
    InvalidRequest(String),

    /// A triggered reload failed to build a new policy graph. The
    /// previously published graph remains authoritative; the engine
    /// stays serviceable.
    #[error("policy reload failed: {0}")]
    ReloadFailed(#[source] LoadError),

    /// Shared state was left unusable by a panicked thread.
    #[error("internal error: {0}")]
    Internal(&'static str),
}
