//! The policy engine: published graph, checks, and reload coordination.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use lodestone_store::{LoadError, PolicyGraph, PolicyStore};
use lodestone_types::{Action, Resource};
use tracing::{error, info};

use crate::authorize::{Decision, authorize};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// The outcome of a reload trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A fresh graph was built and published.
    Reloaded,
    /// A reload was already in flight; this trigger was absorbed by it.
    Coalesced,
}

/// The authorization engine consumed by the SQL execution layer.
///
/// Holds exactly one published [`PolicyGraph`] at a time. `check` calls
/// snapshot the current graph and evaluate against it; a concurrent
/// reload builds a replacement graph off to the side and swaps it in
/// atomically, so no check ever observes a half-updated policy.
///
/// Lifecycle: construction performs the initial load (failure is fatal —
/// there is no graph to serve). [`close`](PolicyEngine::close) is
/// terminal; subsequent calls fail with [`EngineError::Closed`].
pub struct PolicyEngine {
    store: PolicyStore,
    /// The published graph. The lock is held only to clone or swap the
    /// `Arc`; graph builds run entirely outside it.
    current: RwLock<Arc<PolicyGraph>>,
    /// True while a reload is in flight; concurrent triggers coalesce.
    reloading: AtomicBool,
    closed: AtomicBool,
}

impl PolicyEngine {
    /// Opens the engine by loading the global policy file at
    /// `global_path` and everything it delegates to.
    pub fn open(
        global_path: impl Into<PathBuf>,
        config: EngineConfig,
    ) -> Result<Self, LoadError> {
        let store = PolicyStore::new(global_path)
            .allow_unknown_sections(config.allow_unknown_sections)
            .strict_user_groups(config.strict_user_groups);
        let (graph, _report) = store.load()?;
        Ok(Self {
            store,
            current: RwLock::new(Arc::new(graph)),
            reloading: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Evaluates whether `principal` may perform `action` on `resource`.
    ///
    /// Always returns a [`Decision`] for a well-formed request; a deny is
    /// a result, not an error. The call is a pure read against the graph
    /// published at the moment it starts.
    pub fn check(
        &self,
        principal: &str,
        action: Action,
        resource: &Resource,
    ) -> EngineResult<Decision> {
        if self.is_closed() {
            return Err(EngineError::Closed);
        }
        if principal.is_empty() {
            return Err(EngineError::InvalidRequest("empty principal".to_string()));
        }
        let graph = self.snapshot()?;
        Ok(authorize(&graph, principal, action, resource))
    }

    /// Convenience surface for callers holding textual action and
    /// resource forms. Parse failures are [`EngineError::InvalidRequest`],
    /// never a deny.
    pub fn check_request(
        &self,
        principal: &str,
        action: &str,
        resource: &str,
    ) -> EngineResult<Decision> {
        let action: Action = action
            .parse()
            .map_err(|e| EngineError::InvalidRequest(format!("bad action: {e}")))?;
        let resource: Resource = resource
            .parse()
            .map_err(|e| EngineError::InvalidRequest(format!("bad resource: {e}")))?;
        self.check(principal, action, &resource)
    }

    /// Rebuilds the policy graph from the files on disk and publishes it.
    ///
    /// Only one reload runs at a time; a trigger arriving while one is in
    /// flight returns [`ReloadOutcome::Coalesced`] without duplicate I/O.
    /// A failed rebuild leaves the previously published graph
    /// authoritative and returns [`EngineError::ReloadFailed`]; the
    /// engine remains fully serviceable.
    pub fn trigger_reload(&self) -> EngineResult<ReloadOutcome> {
        if self.is_closed() {
            return Err(EngineError::Closed);
        }
        if self
            .reloading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(ReloadOutcome::Coalesced);
        }

        // Build outside any lock: checks keep serving the current graph.
        let result = self.store.load();
        let outcome = match result {
            Ok((graph, report)) => {
                let publish = self.publish(Arc::new(graph));
                match publish {
                    Ok(()) => {
                        info!(
                            degraded = report.failures().len(),
                            "policy reloaded and published"
                        );
                        Ok(ReloadOutcome::Reloaded)
                    }
                    Err(e) => Err(e),
                }
            }
            Err(source) => {
                error!(
                    error = %source,
                    "policy reload failed; previous policy remains in force"
                );
                Err(EngineError::ReloadFailed(source))
            }
        };

        self.reloading.store(false, Ordering::Release);
        outcome
    }

    /// Closes the engine. Idempotent; subsequent `check` and
    /// `trigger_reload` calls fail with [`EngineError::Closed`].
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("policy engine closed");
        }
    }

    /// Returns whether the engine has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn snapshot(&self) -> EngineResult<Arc<PolicyGraph>> {
        Ok(self
            .current
            .read()
            .map_err(|_| EngineError::Internal("policy snapshot lock poisoned"))?
            .clone())
    }

    fn publish(&self, graph: Arc<PolicyGraph>) -> EngineResult<()> {
        *self
            .current
            .write()
            .map_err(|_| EngineError::Internal("policy snapshot lock poisoned"))? = graph;
        Ok(())
    }
}
