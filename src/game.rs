use std::time::Instant;

use tracing::{info, warn};

use crate::infra::{AgentError, Environment, GameObserver};
use crate::planners::Agent;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The environment reported the session as over.
    Inactive,
    /// The environment could not produce a frame.
    NoFrame,
    TurnBudget,
    Cancelled,
}

impl StopReason {
    pub fn describe(self) -> &'static str {
        match self {
            StopReason::Inactive => "environment inactive",
            StopReason::NoFrame => "no frame available",
            StopReason::TurnBudget => "turn budget exhausted",
            StopReason::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSummary {
    pub turns: u64,
    pub final_depth: i32,
    pub max_depth: i32,
    pub reason: StopReason,
}

/// Drives one agent against one environment, one turn at a time.
pub struct Game<E: Environment> {
    environment: E,
    observer: Box<dyn GameObserver>,
    label: String,
}

impl<E: Environment> Game<E> {
    pub fn new(environment: E, observer: impl GameObserver + 'static) -> Self {
        Self {
            environment,
            observer: Box::new(observer),
            label: "delvebot".to_string(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn environment(&self) -> &E {
        &self.environment
    }

    /// Play until the environment stops, the turn budget runs out, or
    /// `should_stop` returns true at a turn boundary.
    pub async fn run(
        &mut self,
        agent: &mut Agent,
        mut should_stop: impl FnMut() -> bool,
    ) -> Result<GameSummary, AgentError> {
        self.observer.on_game_start(&self.label, agent.config());

        let budget = agent.config().turn_budget;
        let mut turns = 0u64;
        let mut current_depth: Option<i32> = None;

        let reason = loop {
            if !self.environment.is_active() {
                break StopReason::Inactive;
            }
            if should_stop() {
                break StopReason::Cancelled;
            }
            if budget.is_some_and(|budget| turns >= budget) {
                break StopReason::TurnBudget;
            }

            let tick_start = Instant::now();
            let Some(frame) = self.environment.read_frame().await? else {
                warn!("No frame after {} turns, stopping", turns);
                break StopReason::NoFrame;
            };

            let outcome = agent.step(&frame);
            if let Some(previous) = current_depth
                && previous != outcome.depth
            {
                self.observer.on_new_level(outcome.depth, previous);
            }
            current_depth = Some(outcome.depth);
            self.observer.on_turn(&outcome, &frame);

            self.environment.send_action(outcome.action).await?;
            turns += 1;

            let tick_duration = tick_start.elapsed();
            if tick_duration.as_millis() > 100 {
                warn!(
                    "Turn {} took {:.2}ms (depth {}, action: {})",
                    outcome.turn,
                    tick_duration.as_secs_f64() * 1000.0,
                    outcome.depth,
                    outcome.action.describe()
                );
            }
        };

        let summary = GameSummary {
            turns,
            final_depth: agent.dungeon().current_depth(),
            max_depth: agent.dungeon().max_depth(),
            reason,
        };
        info!("Stopped after {} turns: {}", turns, reason.describe());
        self.observer.on_game_finished(&summary);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::infra::{Action, AgentConfig, DEMO_LAYOUT, SandboxEnvironment};
    use crate::perception::Frame;
    use crate::planners::{DecisionRule, TurnOutcome};

    #[derive(Default)]
    struct Recorded {
        outcomes: Vec<TurnOutcome>,
        levels: Vec<(i32, i32)>,
        finished: Option<GameSummary>,
    }

    struct RecordingObserver(Rc<RefCell<Recorded>>);

    impl GameObserver for RecordingObserver {
        fn on_game_start(&mut self, _label: &str, _config: &AgentConfig) {}

        fn on_new_level(&mut self, depth: i32, previous_depth: i32) {
            self.0.borrow_mut().levels.push((depth, previous_depth));
        }

        fn on_turn(&mut self, outcome: &TurnOutcome, _frame: &Frame) {
            self.0.borrow_mut().outcomes.push(outcome.clone());
        }

        fn on_game_finished(&mut self, summary: &GameSummary) {
            self.0.borrow_mut().finished = Some(summary.clone());
        }
    }

    fn agent(budget: Option<u64>) -> Agent {
        Agent::new(AgentConfig {
            seed: Some(11),
            turn_budget: budget,
            ..AgentConfig::default()
        })
    }

    #[tokio::test]
    async fn test_walks_to_stairs_and_escapes() {
        let layout = "
 --------
 |@....>|
 --------
";
        let sandbox = SandboxEnvironment::from_layout(layout).unwrap();
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let mut game = Game::new(sandbox, RecordingObserver(Rc::clone(&recorded)));
        let mut agent = agent(Some(100));

        let summary = game.run(&mut agent, || false).await.unwrap();

        assert_eq!(summary.reason, StopReason::Inactive);
        assert_eq!(game.environment().ending(), Some("escaped"));
        let recorded = recorded.borrow();
        assert_eq!(recorded.outcomes.last().map(|o| o.action), Some(Action::Descend));
        assert_eq!(recorded.finished.as_ref(), Some(&summary));
    }

    #[tokio::test]
    async fn test_turn_budget_stops_the_run() {
        let layout = "
 -----
 |@..|
 -----
";
        let sandbox = SandboxEnvironment::from_layout(layout).unwrap();
        let mut game = Game::new(sandbox, RecordingObserver(Rc::default()));
        let mut agent = agent(Some(12));

        let summary = game.run(&mut agent, || false).await.unwrap();
        assert_eq!(summary.reason, StopReason::TurnBudget);
        assert_eq!(summary.turns, 12);
    }

    #[tokio::test]
    async fn test_cancellation_is_checked_each_turn() {
        let layout = "
 -----
 |@..|
 -----
";
        let sandbox = SandboxEnvironment::from_layout(layout).unwrap();
        let mut game = Game::new(sandbox, RecordingObserver(Rc::default()));
        let mut agent = agent(None);

        let mut calls = 0;
        let summary = game
            .run(&mut agent, || {
                calls += 1;
                calls > 3
            })
            .await
            .unwrap();
        assert_eq!(summary.reason, StopReason::Cancelled);
        assert_eq!(summary.turns, 3);
    }

    /// Session that stays open but never shows a screen.
    struct BlankScreen {
        sent: Vec<Action>,
    }

    impl Environment for BlankScreen {
        async fn read_frame(&mut self) -> Result<Option<Frame>, AgentError> {
            Ok(None)
        }

        async fn send_action(&mut self, action: Action) -> Result<(), AgentError> {
            self.sent.push(action);
            Ok(())
        }

        fn is_active(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_missing_frame_stops_the_run() {
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let mut game = Game::new(BlankScreen { sent: Vec::new() }, RecordingObserver(Rc::clone(&recorded)));
        let mut agent = agent(Some(10));

        let summary = game.run(&mut agent, || false).await.unwrap();

        assert_eq!(summary.reason, StopReason::NoFrame);
        assert_eq!(summary.turns, 0);
        assert!(game.environment().sent.is_empty());
        let recorded = recorded.borrow();
        assert!(recorded.outcomes.is_empty());
        assert_eq!(recorded.finished.as_ref(), Some(&summary));
    }

    #[tokio::test]
    async fn test_demo_dungeon_is_cleared() {
        let sandbox = SandboxEnvironment::from_layout(DEMO_LAYOUT).unwrap();
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let mut game = Game::new(sandbox, RecordingObserver(Rc::clone(&recorded)));
        let mut agent = agent(Some(2000));

        let summary = game.run(&mut agent, || false).await.unwrap();

        assert_eq!(game.environment().ending(), Some("escaped"), "{:?}", summary);
        assert_eq!(summary.max_depth, 2);
        let recorded = recorded.borrow();
        assert_eq!(recorded.levels, vec![(2, 1)]);
        // The hidden door on the second floor only shows up after searching
        assert!(recorded.outcomes.iter().any(|o| {
            o.depth == 2 && matches!(o.rule, DecisionRule::Search | DecisionRule::StuckSearch)
        }));
    }
}
