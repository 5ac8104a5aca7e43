//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`PolicyEngine`](crate::PolicyEngine).
///
/// Both knobs are explicit policy decisions rather than silent behavior;
/// the defaults are the strict-parse, lenient-grant combination the
/// format's source system used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Skip unknown policy file sections (with a warning) instead of
    /// rejecting the document. Off by default.
    pub allow_unknown_sections: bool,

    /// Treat a user entry naming an undefined group as a load failure.
    /// Off by default: the user simply gains nothing from that entry.
    pub strict_user_groups: bool,
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether unknown policy sections are skipped instead of
    /// failing the load.
    #[must_use]
    pub fn with_allow_unknown_sections(mut self, allow: bool) -> Self {
        self.allow_unknown_sections = allow;
        self
    }

    /// Sets whether undefined group references from user entries fail
    /// the load.
    #[must_use]
    pub fn with_strict_user_groups(mut self, strict: bool) -> Self {
        self.strict_user_groups = strict;
        self
    }
}
