mod composite_observer;
mod config;
mod default_observer;
mod environment;
mod error;
mod game_observer;
mod pathfinding;
pub mod sandbox;
mod transcript;
mod types;

pub use composite_observer::CompositeObserver;
pub use config::AgentConfig;
pub use default_observer::DefaultObserver;
pub use environment::Environment;
pub use error::AgentError;
pub use game_observer::GameObserver;
pub use pathfinding::{
    AStar, COST_CLOSED_DOOR, COST_MONSTER, COST_STEP, COST_TRAP, PathOptions, PathResult,
    is_legal_step, step_cost,
};
pub use sandbox::{DEMO_LAYOUT, SandboxEnvironment};
pub use transcript::{TranscriptFile, TranscriptObserver};
pub use types::{Action, CellKey, Direction, MAP_HEIGHT, MAP_WIDTH, Position};

// ============================================================================
// Helper functions
// ============================================================================

/// Movement that takes the first step of `path`.
pub fn path_to_action(path: &[Position]) -> Option<Action> {
    if path.len() < 2 {
        return None;
    }
    path[0].direction_to(&path[1]).map(Action::Move)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_to_action() {
        let path = [Position::new(2, 2), Position::new(3, 3), Position::new(4, 3)];
        assert_eq!(path_to_action(&path), Some(Action::Move(Direction::SouthEast)));
        assert_eq!(path_to_action(&path[..1]), None);
    }
}
