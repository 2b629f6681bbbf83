pub mod agent;
pub mod corridor;
pub mod exploration;
pub mod prompts;
pub mod threat;

pub use agent::{Agent, DecisionRule, TurnOutcome};
