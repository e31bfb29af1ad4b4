//! Multi-agent routing and coordination: a supervisor agent dispatches a
//! task to one or more specialist [`crate::agent::Agent`]s (C6), runs them
//! (C7), and folds their outcomes into one response (C8).

pub mod coordinator;
pub mod routing;
pub mod specialist;
pub mod synthesizer;

pub use coordinator::{ExecutionMode, MergedTrace, MergedTraceEntry, NoopObserver, Swarm, SwarmBuilder, SwarmEvent, SwarmObserver, SwarmResult, SwarmStats};
pub use routing::{CustomRouter, RoutingDecision};
pub use specialist::{SpecialistDescriptor, SpecialistOutcome};
pub use synthesizer::CustomSynthesizer;
