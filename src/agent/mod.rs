//! Core agent logic.
//!
//! The agent orchestrates:
//! - The periodic perceive → think → decide → act → reflect → memorize → evolve cycle
//! - Routing of high-impact decisions to approval tasks
//! - Running routine actions through the secure executor

mod actions;
mod agent_loop;
mod decision;

pub use actions::{ActionRunner, ExecutorActionRunner};
pub use agent_loop::{
    AgentDeps, AgentLoop, CycleOutcome, CycleReport, LoopHandle, LoopStatus, Perception,
};
pub use decision::{ImpactPolicy, KeywordImpactPolicy, RoutedDecisions, route_decisions};
