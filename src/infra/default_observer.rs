use std::io::{self, Write};

use tracing::info;

use crate::game::GameSummary;
use crate::infra::{AgentConfig, GameObserver};
use crate::perception::Frame;
use crate::planners::TurnOutcome;

/// Logs every turn and optionally dumps the screen to stdout.
pub struct DefaultObserver {
    print_map: bool,
}

impl DefaultObserver {
    pub fn new(print_map: bool) -> Self {
        Self { print_map }
    }
}

impl GameObserver for DefaultObserver {
    fn on_game_start(&mut self, label: &str, config: &AgentConfig) {
        info!("Run {} started", label);
        if let Some(seed) = config.seed {
            info!("- seed: {}", seed);
        }
        match config.turn_budget {
            Some(budget) => info!("- turn budget: {}", budget),
            None => info!("- turn budget: unlimited"),
        }
    }

    fn on_new_level(&mut self, depth: i32, previous_depth: i32) {
        info!("Depth changed from {} to {}", previous_depth, depth);
    }

    fn on_turn(&mut self, outcome: &TurnOutcome, frame: &Frame) {
        let pos = outcome
            .position
            .map(|p| format!("({}, {})", p.x, p.y))
            .unwrap_or_else(|| "?".to_string());
        info!(
            "turn: {}, depth: {}, pos: {}, hp: {}/{}, rule: {}, action: {}",
            outcome.turn,
            outcome.depth,
            pos,
            outcome.status.hp,
            outcome.status.max_hp,
            outcome.rule.name(),
            outcome.action.describe(),
        );

        if self.print_map {
            let _ = writeln!(io::stdout(), "{}", frame.full_text());
        }
    }

    fn on_game_finished(&mut self, summary: &GameSummary) {
        info!("Run finished: {}", summary.reason.describe());
        info!(
            "Turns: {}, final depth: {}, deepest: {}",
            summary.turns, summary.final_depth, summary.max_depth
        );
    }
}
