use crate::game::GameSummary;
use crate::infra::AgentConfig;
use crate::perception::Frame;
use crate::planners::TurnOutcome;

/// Trait for observing a run. Observers only read what they are given.
pub trait GameObserver {
    /// Called once before the first turn
    fn on_game_start(&mut self, label: &str, config: &AgentConfig);

    /// Called when the status strip reports a new depth
    fn on_new_level(&mut self, depth: i32, previous_depth: i32);

    /// Called after every decision, with the screen it was made on
    fn on_turn(&mut self, outcome: &TurnOutcome, frame: &Frame);

    /// Called when the run stops
    fn on_game_finished(&mut self, summary: &GameSummary);
}
