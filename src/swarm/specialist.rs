//! Specialist registration and per-specialist execution outcomes.

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, TerminalError};
use crate::trace::Trace;

/// A specialist agent registered under a swarm.
pub struct SpecialistDescriptor {
    /// Stable id, referenced by routing decisions and outcomes.
    pub id: String,
    /// The agent this specialist wraps.
    pub agent: Agent,
    /// One-line description of what this specialist is for; shown to the
    /// supervisor during routing and synthesis.
    pub specialization: String,
    /// Keywords matched against the task during keyword routing.
    pub keywords: Option<Vec<String>>,
    /// Tie-break priority during keyword routing; higher wins. Treated as
    /// 0 when absent.
    pub priority: Option<i32>,
    /// Whether this specialist may participate in a bounded-parallel swarm
    /// run; `None` defers to the swarm's own execution mode.
    pub concurrent: Option<bool>,
}

impl SpecialistDescriptor {
    /// Build a descriptor with no keywords, default priority, and no
    /// concurrency override.
    #[must_use]
    pub fn new(id: impl Into<String>, agent: Agent, specialization: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agent,
            specialization: specialization.into(),
            keywords: None,
            priority: None,
            concurrent: None,
        }
    }

    /// Attach keywords used by the default keyword router.
    #[must_use]
    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = Some(keywords);
        self
    }

    /// Set the tie-break priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub(crate) fn priority_or_default(&self) -> i32 {
        self.priority.unwrap_or(0)
    }
}

/// The result of running one specialist against a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistOutcome {
    /// The specialist that produced this outcome.
    pub specialist_id: String,
    /// That specialist's one-line specialization, copied for convenience
    /// when building synthesis prompts.
    pub specialization: String,
    /// The specialist's response text, empty on failure.
    pub response: String,
    /// The specialist's own execution trace.
    pub trace: Trace,
    /// `true` if the specialist completed without a terminal error.
    pub success: bool,
    /// Populated when `success` is `false`.
    pub error: Option<TerminalError>,
    /// Wall-clock time spent running this specialist, in milliseconds.
    pub duration_ms: u64,
}
