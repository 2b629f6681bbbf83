use crate::game::GameSummary;
use crate::infra::{AgentConfig, GameObserver};
use crate::perception::Frame;
use crate::planners::TurnOutcome;

/// Forwards every event to each wrapped observer in order.
pub struct CompositeObserver {
    observers: Vec<Box<dyn GameObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Box<dyn GameObserver>>) -> Self {
        Self { observers }
    }
}

impl GameObserver for CompositeObserver {
    fn on_game_start(&mut self, label: &str, config: &AgentConfig) {
        for observer in &mut self.observers {
            observer.on_game_start(label, config);
        }
    }

    fn on_new_level(&mut self, depth: i32, previous_depth: i32) {
        for observer in &mut self.observers {
            observer.on_new_level(depth, previous_depth);
        }
    }

    fn on_turn(&mut self, outcome: &TurnOutcome, frame: &Frame) {
        for observer in &mut self.observers {
            observer.on_turn(outcome, frame);
        }
    }

    fn on_game_finished(&mut self, summary: &GameSummary) {
        for observer in &mut self.observers {
            observer.on_game_finished(summary);
        }
    }
}
