//! # lodestone-store: Policy composition and resolution
//!
//! Owns the set of policy documents behind a deployment: one global
//! document plus zero or more per-database documents the global one
//! delegates to. [`PolicyStore::load`] composes them into a single
//! immutable [`PolicyGraph`] answering `resolve(principal)` queries.
//!
//! ## Failure policy
//!
//! The global document is the trust root: any failure loading it aborts
//! the load. A missing or malformed delegated document degrades only that
//! one database — its grants are absent, the rest of the policy loads —
//! and the degradation is recorded in the returned [`LoadReport`].

pub mod graph;
pub mod store;

pub use graph::PolicyGraph;
pub use store::{DelegationFailure, LoadError, LoadReport, LoadResult, PolicyStore};
