//! # lodestone-engine: Privilege evaluation and atomic policy reload
//!
//! The engine surface the SQL execution layer consults before running a
//! statement:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Authorization Request                       │
//! │  (principal, action, resource)               │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  PolicyEngine                                │
//! │  ├─ Snapshot the published PolicyGraph       │
//! │  ├─ resolve(principal) → privilege set       │
//! │  └─ Test implication against the request     │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Decision                                    │
//! │  - Allow, or                                 │
//! │  - Deny with a non-leaking reason            │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! `check` is invoked from many concurrent sessions. The published graph
//! is an `Arc` snapshot behind a lock held only for the pointer clone or
//! swap; policy files are parsed entirely outside any lock, so readers
//! never wait on a reload. Concurrent reload triggers coalesce into the
//! reload already in flight.
//!
//! ## Examples
//!
//! ```no_run
//! use lodestone_engine::{Action, EngineConfig, PolicyEngine, Resource};
//!
//! let engine = PolicyEngine::open("/etc/lodestone/policy.ini", EngineConfig::default())?;
//!
//! let decision = engine.check(
//!     "user_1",
//!     Action::Select,
//!     &Resource::table("server1", "db1", "tbl1"),
//! )?;
//! assert!(decision.is_allowed());
//!
//! engine.trigger_reload()?;
//! engine.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod authorize;
pub mod config;
pub mod engine;
pub mod error;

// Re-export commonly used types
pub use authorize::{Decision, DenyReason, authorize};
pub use config::EngineConfig;
pub use engine::{PolicyEngine, ReloadOutcome};
pub use error::{EngineError, EngineResult};
pub use lodestone_types::{Action, Privilege, Resource};
