pub mod game;
pub mod infra;
pub mod perception;
pub mod planners;
pub mod state;

// Re-export commonly used types for convenience
pub use game::{Game, GameSummary, StopReason};
pub use infra::{Action, AgentConfig, AgentError, Direction, Environment, Position};
pub use planners::{Agent, DecisionRule, TurnOutcome};
pub use state::{DungeonTracker, LevelMap};
