use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use tracing::{debug, info, warn};

use crate::infra::{
    AStar, Action, AgentConfig, Direction, PathOptions, Position, is_legal_step, path_to_action,
};
use crate::perception::{ClassifiedFrame, Frame, FrameClassifier, Status, StatusParser};
use crate::planners::corridor::analyze_corridor_position;
use crate::planners::exploration::{ExplorationQuery, ExplorationTuning, find_exploration_target};
use crate::planners::prompts::{displaced_ally, respond_to_prompt};
use crate::planners::threat::{NEVER_MELEE, ThreatContext, ThreatDecision, assess};
use crate::state::{AgentState, CellKind, DungeonTracker, LevelMap, PendingMove};

/// Hostiles at most this far away count as "nearby" for the threat policy.
const NEARBY_RADIUS: i32 = 3;
/// Stairs and frontier cells tried per routing attempt.
const ROUTE_ATTEMPTS: usize = 8;

/// Which priority rule produced a turn's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionRule {
    Prompt,
    NoPlayer,
    CriticalFlee,
    Combat,
    PickUp,
    Descend,
    LevelStuckStairs,
    StuckSearch,
    StuckStairs,
    StuckFrontier,
    StuckRandom,
    Explore,
    Stairs,
    Search,
    Random,
}

impl DecisionRule {
    pub fn name(self) -> &'static str {
        match self {
            DecisionRule::Prompt => "prompt",
            DecisionRule::NoPlayer => "no-player",
            DecisionRule::CriticalFlee => "critical-flee",
            DecisionRule::Combat => "combat",
            DecisionRule::PickUp => "pick-up",
            DecisionRule::Descend => "descend",
            DecisionRule::LevelStuckStairs => "level-stuck-stairs",
            DecisionRule::StuckSearch => "stuck-search",
            DecisionRule::StuckStairs => "stuck-stairs",
            DecisionRule::StuckFrontier => "stuck-frontier",
            DecisionRule::StuckRandom => "stuck-random",
            DecisionRule::Explore => "explore",
            DecisionRule::Stairs => "stairs",
            DecisionRule::Search => "search",
            DecisionRule::Random => "random",
        }
    }
}

/// Everything one call to [`Agent::step`] decided, for observers to inspect.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub turn: u64,
    pub depth: i32,
    pub position: Option<Position>,
    pub status: Status,
    pub rule: DecisionRule,
    pub action: Action,
    pub reason: String,
}

struct Decision {
    rule: DecisionRule,
    action: Action,
    reason: String,
}

impl Decision {
    fn new(rule: DecisionRule, action: Action, reason: impl Into<String>) -> Self {
        Self {
            rule,
            action,
            reason: reason.into(),
        }
    }
}

/// The perceive, remember, decide loop for one run.
pub struct Agent {
    config: AgentConfig,
    dungeon: DungeonTracker,
    state: AgentState,
    status_parser: StatusParser,
    rng: StdRng,
    steps: u64,
    last_seen: Option<Position>,
    came_from: Option<Position>,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let state = AgentState::new(config.recent_capacity);
        Self {
            config,
            dungeon: DungeonTracker::new(1),
            state,
            status_parser: StatusParser::new(),
            rng,
            steps: 0,
            last_seen: None,
            came_from: None,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn dungeon(&self) -> &DungeonTracker {
        &self.dungeon
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Run one turn against the given screen and return the chosen action.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn step(&mut self, frame: &Frame) -> TurnOutcome {
        self.steps += 1;
        let classified = FrameClassifier::classify(frame);

        // Prompts cover part of the map, so memory is left alone this turn
        if let Some(response) = respond_to_prompt(&classified.prompt) {
            let pending = self.state.pending_move.take();
            if response.refused_attack {
                // What we walked into is a better guess than the monster's name
                let glyph = pending.and_then(|pending| pending.occupant).or(response.ally);
                if let Some(glyph) = glyph {
                    self.state.add_ally(glyph);
                }
                if let Some(pending) = pending {
                    self.state.decline(pending.target());
                }
            }
            if let Some(pending) = pending {
                let position = classified.player.unwrap_or(pending.from);
                self.state
                    .observe_position(position, self.config.oscillation_window);
            }
            let status = self.status_parser.last();
            let decision = Decision::new(DecisionRule::Prompt, response.action, response.reason);
            return self.outcome(classified.player, status, decision);
        }

        let status = self.status_parser.parse(frame);
        if self.dungeon.observe_depth(status.depth) {
            self.state.reset_for_new_level();
            self.last_seen = None;
            self.came_from = None;
        }

        let Some(player) = classified.player else {
            warn!("No player glyph on screen at step {}", self.steps);
            let decision = Decision::new(DecisionRule::NoPlayer, Action::Escape, "player not visible");
            return self.outcome(None, status, decision);
        };

        let turn = status.turn.unwrap_or(self.steps);
        let level = self.dungeon.current_mut();
        level.update(&classified, turn);
        level.settle_rock_around(&classified, player);

        if let Some(glyph) = displaced_ally(&classified.message) {
            self.state.add_ally(glyph);
        }
        if self.state.last_position.is_none() {
            self.state
                .observe_position(player, self.config.oscillation_window);
        }
        self.check_pending_move(player);

        if self.last_seen != Some(player) {
            self.came_from = self.last_seen;
            self.last_seen = Some(player);
        }

        let decision = self.decide(player, &status, &classified);
        let decision = self.guard_forbidden_melee(player, decision);
        debug!(
            "Rule {} -> {} ({})",
            decision.rule.name(),
            decision.action.describe(),
            decision.reason
        );
        self.record(player, &decision);
        self.outcome(Some(player), status, decision)
    }

    fn outcome(&self, position: Option<Position>, status: Status, decision: Decision) -> TurnOutcome {
        TurnOutcome {
            turn: status.turn.unwrap_or(self.steps),
            depth: self.dungeon.current_depth(),
            position,
            status,
            rule: decision.rule,
            action: decision.action,
            reason: decision.reason,
        }
    }

    /// Compare the move sent last turn with where the player ended up.
    fn check_pending_move(&mut self, player: Position) {
        let Some(pending) = self.state.pending_move.take() else {
            return;
        };
        self.state
            .observe_position(player, self.config.oscillation_window);
        if player != pending.from {
            self.state.failed_moves_to_target = 0;
            return;
        }
        if let Some(glyph) = pending.occupant {
            debug!("Stayed put fighting '{}'", glyph);
            return;
        }

        let target = pending.target();
        warn!(
            "Move {} from {:?} did not happen",
            pending.dir.name(),
            pending.from
        );
        let level = self.dungeon.current_mut();
        if !level.is_explored(&target) {
            level.mark_blocked(&target);
        }
        if let Some(goal) = self.state.committed_target {
            self.state.failed_moves_to_target += 1;
            if self.state.failed_moves_to_target >= self.config.failed_move_blacklist {
                self.state.blacklist(goal);
                self.state.abandon_target();
            }
        }
    }

    fn record(&mut self, player: Position, decision: &Decision) {
        match decision.action {
            Action::Move(dir) => {
                let occupant = self
                    .dungeon
                    .current()
                    .get(&player.step(dir))
                    .and_then(|cell| cell.monster)
                    .map(|monster| monster.glyph);
                self.state.pending_move = Some(PendingMove {
                    from: player,
                    dir,
                    occupant,
                });
            }
            Action::Search => self.dungeon.current_mut().record_search(&player),
            _ => {}
        }
    }

    fn decide(&mut self, player: Position, status: &Status, frame: &ClassifiedFrame) -> Decision {
        if let Some(decision) = self.critical_flee(player, status) {
            return decision;
        }
        if let Some(decision) = self.combat(player, status) {
            return decision;
        }
        if let Some(decision) = self.pick_up(player, frame) {
            return decision;
        }
        if self.dungeon.current().kind_at(&player) == CellKind::StairsDown {
            return Decision::new(DecisionRule::Descend, Action::Descend, "standing on down stairs");
        }
        if self.state.level_stuck_turns > self.config.level_stuck_threshold {
            let options = self.path_options().allowing_unexplored();
            if let Some(decision) = self.route_to_stairs(player, options, DecisionRule::LevelStuckStairs) {
                return decision;
            }
        }
        if self.state.stuck_turns > self.config.stuck_threshold {
            return self.recover(player);
        }
        if let Some(decision) = self.explore(player) {
            return decision;
        }
        if let Some(decision) = self.route_to_stairs(player, self.path_options(), DecisionRule::Stairs) {
            return decision;
        }
        if let Some(decision) = self.search_for_hidden(player) {
            return decision;
        }
        self.random_step(player, DecisionRule::Random)
    }

    /// Routing costs from the config. Monsters we declined to attack are avoided.
    fn path_options(&self) -> PathOptions {
        let declined: Vec<Position> = self
            .dungeon
            .current()
            .monsters()
            .into_iter()
            .map(|(pos, _)| pos)
            .filter(|pos| self.state.has_declined(pos))
            .collect();
        PathOptions {
            unexplored_cost: self.config.unexplored_cost,
            avoid_penalty: self.config.avoid_penalty,
            ..PathOptions::default()
        }
        .avoiding(declined)
    }

    /// Visible monsters not known to be friendly.
    fn hostiles(&self) -> Vec<(Position, char)> {
        self.dungeon
            .current()
            .monsters()
            .into_iter()
            .filter(|(_, monster)| !self.state.is_ally(monster.glyph))
            .map(|(pos, monster)| (pos, monster.glyph))
            .collect()
    }

    fn critical_flee(&self, player: Position, status: &Status) -> Option<Decision> {
        if status.hp_ratio() >= self.config.critical_hp_ratio {
            return None;
        }
        let hostiles = self.hostiles();
        if hostiles.is_empty() {
            return None;
        }
        let level = self.dungeon.current();
        if level.kind_at(&player) == CellKind::StairsDown {
            return Some(Decision::new(
                DecisionRule::CriticalFlee,
                Action::Descend,
                format!("HP {}/{}, escaping downstairs", status.hp, status.max_hp),
            ));
        }
        let dir = flee_direction(level, player, &hostiles)?;
        Some(Decision::new(
            DecisionRule::CriticalFlee,
            Action::Move(dir),
            format!("HP {}/{}, retreating from {} hostiles", status.hp, status.max_hp, hostiles.len()),
        ))
    }

    fn combat(&mut self, player: Position, status: &Status) -> Option<Decision> {
        let hostiles = self.hostiles();
        let level = self.dungeon.current();
        let in_corridor = analyze_corridor_position(level, player, self.came_from).in_corridor();

        let adjacent: Vec<(Position, char)> = hostiles
            .iter()
            .copied()
            .filter(|(pos, _)| pos.is_adjacent(&player) && !self.state.has_declined(pos))
            .collect();

        for (pos, glyph) in adjacent {
            let nearby_hostiles = hostiles
                .iter()
                .filter(|(other, _)| *other != pos && other.distance(&player) <= NEARBY_RADIUS)
                .count();
            let ctx = ThreatContext {
                symbol: glyph,
                hp: status.hp,
                max_hp: status.max_hp,
                xp_level: status.xp_level,
                depth: status.depth,
                blocking: self.is_blocking(pos),
                nearby_hostiles,
                in_corridor,
            };
            let assessment = assess(&ctx);
            match assessment.decision {
                ThreatDecision::Engage => {
                    if let Some(dir) = player.direction_to(&pos)
                        && is_legal_step(level, player, pos)
                    {
                        return Some(Decision::new(DecisionRule::Combat, Action::Move(dir), assessment.reason));
                    }
                    debug!("Cannot reach '{}' at {:?} from here", glyph, pos);
                    self.state.decline(pos);
                }
                ThreatDecision::Flee => {
                    if let Some(dir) = flee_direction(level, player, &hostiles) {
                        return Some(Decision::new(DecisionRule::Combat, Action::Move(dir), assessment.reason));
                    }
                    debug!("Nowhere to flee from '{}', leaving it be", glyph);
                    self.state.decline(pos);
                }
                // Re-assessed every turn, it may start blocking later
                ThreatDecision::Ignore => {}
            }
        }
        None
    }

    fn is_blocking(&self, pos: Position) -> bool {
        self.state.committed_target == Some(pos)
            || self
                .state
                .committed_path
                .as_ref()
                .is_some_and(|path| path.contains(&pos))
    }

    fn pick_up(&mut self, player: Position, frame: &ClassifiedFrame) -> Option<Decision> {
        if !self.config.pickup {
            return None;
        }
        let level = self.dungeon.current();
        let has_items = level
            .get(&player)
            .is_some_and(|cell| !cell.items.is_empty())
            || frame.message.contains("You see here")
            || frame.message.contains("There are several objects here");
        let on_item = matches!(level.kind_at(&player), CellKind::Item | CellKind::Gold);
        if !(has_items || on_item) || !self.state.mark_picked_up(player) {
            return None;
        }
        Some(Decision::new(DecisionRule::PickUp, Action::PickUp, "item underfoot"))
    }

    fn route_to_stairs(&self, player: Position, options: PathOptions, rule: DecisionRule) -> Option<Decision> {
        let level = self.dungeon.current();
        let mut stairs: Vec<Position> = level.stairs_down().to_vec();
        stairs.sort_by_key(|pos| pos.distance(&player));

        stairs
            .into_iter()
            .filter(|pos| *pos != player)
            .take(ROUTE_ATTEMPTS)
            .find_map(|goal| {
                let path = AStar::find_path(level, player, goal, &options);
                let action = path_to_action(&path.path)?;
                Some(Decision::new(
                    rule,
                    action,
                    format!("routing to stairs at ({}, {}), cost {}", goal.x, goal.y, path.cost),
                ))
            })
    }

    /// Staged recovery once the short-term stuck counter passes its threshold.
    fn recover(&mut self, player: Position) -> Decision {
        self.state.abandon_target();

        if self.state.stuck_searches < self.config.search_in_place_cap {
            self.state.stuck_searches += 1;
            return Decision::new(
                DecisionRule::StuckSearch,
                Action::Search,
                format!(
                    "stuck for {} turns, searching ({}/{})",
                    self.state.stuck_turns, self.state.stuck_searches, self.config.search_in_place_cap
                ),
            );
        }

        if self.state.stuck_escalation == 0 {
            self.state.stuck_escalation = 1;
            let blocked = self.mark_probably_solid();
            if blocked > 0 {
                info!("Marked {} unexplored cells as solid rock", blocked);
            }
            if let Some(decision) = self.route_to_stairs(player, self.path_options(), DecisionRule::StuckStairs) {
                return decision;
            }
        }

        if self.state.stuck_escalation <= 1 {
            self.state.stuck_escalation = 2;
            if let Some(decision) = self.force_frontier(player) {
                return decision;
            }
        }

        // Start the chain over after one random step
        self.state.stuck_searches = 0;
        self.state.stuck_escalation = 0;
        self.random_step(player, DecisionRule::StuckRandom)
    }

    /// Unexplored neighbours of heavily searched cells are treated as rock.
    fn mark_probably_solid(&mut self) -> usize {
        let threshold = self.config.solid_search_threshold;
        let level = self.dungeon.current_mut();
        let solid: Vec<Position> = level
            .iter()
            .filter(|(_, cell)| cell.search_count >= threshold)
            .flat_map(|(pos, _)| pos.neighbors())
            .filter(|n| n.in_bounds())
            .collect();

        let mut marked = 0;
        for pos in solid {
            if !level.is_explored(&pos) {
                level.mark_blocked(&pos);
                marked += 1;
            }
        }
        marked
    }

    fn force_frontier(&self, player: Position) -> Option<Decision> {
        let level = self.dungeon.current();
        let options = self.path_options().allowing_unexplored();
        let mut frontier: Vec<Position> = level
            .frontier()
            .into_iter()
            .filter(|pos| *pos != player && !self.state.is_blacklisted(pos))
            .collect();
        frontier.sort_by_key(|pos| pos.distance(&player));

        frontier.into_iter().take(ROUTE_ATTEMPTS).find_map(|goal| {
            let path = AStar::find_path(level, player, goal, &options);
            let action = path_to_action(&path.path)?;
            Some(Decision::new(
                DecisionRule::StuckFrontier,
                action,
                format!("forcing a route to frontier ({}, {})", goal.x, goal.y),
            ))
        })
    }

    /// Follow or pick a frontier target. None when nothing is routable.
    fn explore(&mut self, player: Position) -> Option<Decision> {
        let options = self.path_options();

        if let Some(target) = self.state.committed_target {
            let level = self.dungeon.current();
            let still_valid =
                target != player && level.is_frontier(&target) && !self.state.is_blacklisted(&target);
            if still_valid {
                if let Some(dir) = self.follow_straight_corridor(player) {
                    return Some(Decision::new(
                        DecisionRule::Explore,
                        Action::Move(dir),
                        format!("following corridor toward ({}, {})", target.x, target.y),
                    ));
                }
                let path = AStar::find_path(level, player, target, &options);
                if let Some(action) = path_to_action(&path.path) {
                    self.state.commit(target, path.path);
                    return Some(Decision::new(
                        DecisionRule::Explore,
                        action,
                        format!("continuing to frontier ({}, {})", target.x, target.y),
                    ));
                }
                debug!("Committed target {:?} is no longer reachable", target);
            }
            self.state.abandon_target();
        }

        let level = self.dungeon.current();
        let recent = self.state.recent_keys();
        let query = ExplorationQuery {
            start: player,
            came_from: self.came_from,
            recent: &recent,
            prefer_far: self.config.prefer_far,
        };
        let tuning = ExplorationTuning {
            heavy_search_threshold: self.config.heavy_search_threshold,
            bias_margin: self.config.bias_margin,
        };

        let found = find_exploration_target(level, &query, &tuning, &options, |pos| {
            !self.state.is_blacklisted(pos)
        })?;

        let action = path_to_action(&found.path.path)?;
        let target = found.candidate.pos;
        self.state.commit(target, found.path.path);
        Some(Decision::new(
            DecisionRule::Explore,
            action,
            format!("new frontier target ({}, {})", target.x, target.y),
        ))
    }

    /// Next step of the cached path while walking a plain corridor.
    fn follow_straight_corridor(&self, player: Position) -> Option<Direction> {
        let level = self.dungeon.current();
        if !analyze_corridor_position(level, player, self.came_from).is_straight() {
            return None;
        }
        let path = self.state.committed_path.as_ref()?;
        let index = path.iter().position(|pos| *pos == player)?;
        let next = *path.get(index + 1)?;
        let free = level
            .get(&next)
            .is_some_and(|cell| cell.is_explored_walkable() && cell.monster.is_none());
        if !free || !is_legal_step(level, player, next) {
            return None;
        }
        player.direction_to(&next)
    }

    /// Probe for hidden passages once the level looks finished.
    fn search_for_hidden(&self, player: Position) -> Option<Decision> {
        let level = self.dungeon.current();
        let candidates = level.search_candidates(self.config.search_candidate_cap);
        let options = self.path_options();

        candidates.iter().take(ROUTE_ATTEMPTS).find_map(|candidate| {
            if candidate.pos == player {
                return Some(Decision::new(
                    DecisionRule::Search,
                    Action::Search,
                    format!("searching for hidden passages (priority {})", candidate.priority),
                ));
            }
            let path = AStar::find_path(level, player, candidate.pos, &options);
            let action = path_to_action(&path.path)?;
            Some(Decision::new(
                DecisionRule::Search,
                action,
                format!("heading to search spot ({}, {})", candidate.pos.x, candidate.pos.y),
            ))
        })
    }

    fn random_step(&mut self, player: Position, rule: DecisionRule) -> Decision {
        let level = self.dungeon.current();
        let mut options: Vec<Direction> = Direction::ALL
            .into_iter()
            .filter(|dir| {
                let next = player.step(*dir);
                level
                    .get(&next)
                    .is_some_and(|cell| cell.is_explored_walkable() && cell.monster.is_none())
                    && is_legal_step(level, player, next)
            })
            .collect();
        if options.is_empty() {
            options = Direction::ALL
                .into_iter()
                .filter(|dir| player.step(*dir).in_bounds())
                .collect();
        }

        match options.choose(&mut self.rng) {
            Some(dir) => Decision::new(rule, Action::Move(*dir), format!("random step {}", dir.name())),
            None => Decision::new(rule, Action::Search, "no legal direction"),
        }
    }

    /// Never walk into a monster that must not be touched, whatever rule asked for it.
    ///
    /// That covers never-melee monsters and monsters we already declined to
    /// attack. The wasted turn counts as being stuck so recovery kicks in.
    fn guard_forbidden_melee(&mut self, player: Position, decision: Decision) -> Decision {
        let Action::Move(dir) = decision.action else {
            return decision;
        };
        let target = player.step(dir);
        let Some(monster) = self.dungeon.current().get(&target).and_then(|cell| cell.monster) else {
            return decision;
        };
        let never_melee = NEVER_MELEE.contains(&monster.glyph) && !self.state.is_ally(monster.glyph);
        if !never_melee && !self.state.has_declined(&target) {
            return decision;
        }
        warn!("Refusing to walk into '{}' at {:?}", monster.glyph, target);
        self.state.note_blocked_turn();
        Decision::new(decision.rule, Action::Search, format!("waiting instead of touching '{}'", monster.glyph))
    }
}

/// Step that most increases the distance to the nearest hostile.
fn flee_direction(level: &LevelMap, player: Position, hostiles: &[(Position, char)]) -> Option<Direction> {
    let nearest = |pos: Position| {
        hostiles
            .iter()
            .map(|(hostile, _)| hostile.distance(&pos))
            .min()
            .unwrap_or(i32::MAX)
    };
    let current = nearest(player);

    Direction::ALL
        .into_iter()
        .filter_map(|dir| {
            let next = player.step(dir);
            let free = level
                .get(&next)
                .is_some_and(|cell| cell.is_explored_walkable() && cell.monster.is_none());
            (free && is_legal_step(level, player, next)).then(|| (dir, nearest(next)))
        })
        .filter(|(_, distance)| *distance > current)
        .max_by_key(|(_, distance)| *distance)
        .map(|(dir, _)| dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::{MAP_TOP, STATUS_ROWS};

    fn frame(rows: &[&str], status: &str) -> Frame {
        let mut frame = Frame::blank();
        for (y, row) in rows.iter().enumerate() {
            frame.write_text(MAP_TOP + y, row);
        }
        frame.write_text(STATUS_ROWS[0], "Agent the Delver       St:16 Dx:12 Co:14 In:9 Wi:10 Ch:8 Neutral");
        frame.write_text(STATUS_ROWS[1], status);
        frame
    }

    fn seeded() -> Agent {
        Agent::new(AgentConfig {
            seed: Some(7),
            ..AgentConfig::default()
        })
    }

    const HEALTHY: &str = "Dlvl:1 $:0 HP:16(16) Pw:2(2) AC:7 Xp:1/0";

    #[test]
    fn test_explores_toward_the_open_side() {
        let mut agent = seeded();
        let rows = ["------", "|@....", "|....|", "------"];
        let outcome = agent.step(&frame(&rows, HEALTHY));

        assert_eq!(outcome.rule, DecisionRule::Explore);
        assert_eq!(outcome.position, Some(Position::new(1, 1)));
        assert!(matches!(
            outcome.action,
            Action::Move(Direction::East) | Action::Move(Direction::SouthEast)
        ));
        assert!(agent.state().committed_target.is_some());
    }

    #[test]
    fn test_stuck_recovery_runs_in_order() {
        let mut agent = seeded();
        let rows = ["-------", "|@....", "|...>.", "------"];
        let screen = frame(&rows, HEALTHY);

        let rules: Vec<DecisionRule> = (0..20).map(|_| agent.step(&screen).rule).collect();

        let first = rules
            .iter()
            .position(|rule| *rule == DecisionRule::StuckSearch)
            .expect("stuck recovery never started");
        assert!(first >= 3, "recovery started too early: {:?}", rules);
        assert!(rules[first..first + 5].iter().all(|rule| *rule == DecisionRule::StuckSearch));
        assert_eq!(rules[first + 5], DecisionRule::StuckStairs);
        assert_eq!(rules[first + 6], DecisionRule::StuckFrontier);
        assert_eq!(rules[first + 7], DecisionRule::StuckRandom);
        assert_eq!(rules[first + 8], DecisionRule::StuckSearch);
        assert!(agent.state().stuck_turns > agent.config().stuck_threshold);
    }

    #[test]
    fn test_depth_change_resets_counters() {
        let mut agent = seeded();
        let rows = ["-------", "|@....", "|...>.", "------"];
        let screen = frame(&rows, HEALTHY);
        for _ in 0..8 {
            agent.step(&screen);
        }
        assert!(agent.state().stuck_turns > 0);
        assert!(agent.state().level_stuck_turns > 0);

        let deeper = frame(&rows, "Dlvl:2 $:0 HP:16(16) Pw:2(2) AC:7 Xp:1/0");
        let outcome = agent.step(&deeper);
        assert_eq!(outcome.depth, 2);
        assert_eq!(agent.state().stuck_turns, 0);
        assert_eq!(agent.state().level_stuck_turns, 0);
        assert_eq!(agent.dungeon().max_depth(), 2);
    }

    #[test]
    fn test_never_melee_neighbour_is_not_attacked() {
        let rows = ["-------", "|.@e..|", "|.....|", "|.....|", "-------"];
        for hp in ["16(16)", "9(16)", "2(16)"] {
            let mut agent = seeded();
            let status = format!("Dlvl:1 $:0 HP:{} Pw:2(2) AC:7 Xp:1/0", hp);
            let screen = frame(&rows, &status);
            for _ in 0..5 {
                let outcome = agent.step(&screen);
                assert_ne!(outcome.action, Action::Move(Direction::East), "HP {}: {:?}", hp, outcome);
            }
        }
    }

    #[test]
    fn test_blocking_rat_is_attacked() {
        let mut agent = seeded();
        let rows = ["-----", "|@r.", "-----"];
        let outcome = agent.step(&frame(&rows, HEALTHY));
        // The only route east runs through the rat
        assert_eq!(outcome.action, Action::Move(Direction::East));

        let outcome = agent.step(&frame(&rows, HEALTHY));
        assert_eq!(outcome.rule, DecisionRule::Combat);
        assert_eq!(outcome.action, Action::Move(Direction::East));
    }

    #[test]
    fn test_standing_on_stairs_descends() {
        let mut agent = seeded();
        let mut screen = frame(&["-----", "|.@.|", "-----"], HEALTHY);
        let outcome = agent.step(&screen);
        assert_ne!(outcome.rule, DecisionRule::Descend);

        // Stairs remembered under the player once seen
        screen = frame(&["-----", "|.>.|", "-----"], HEALTHY);
        screen.write_text(MAP_TOP + 1, "|@>.|");
        agent.step(&screen);
        screen.write_text(MAP_TOP + 1, "|.@.|");
        let outcome = agent.step(&screen);
        assert_eq!(outcome.rule, DecisionRule::Descend);
        assert_eq!(outcome.action, Action::Descend);
    }

    #[test]
    fn test_prompts_are_answered_without_touching_memory() {
        let mut agent = seeded();
        let mut screen = frame(&["-----", "|.@.|", "-----"], HEALTHY);
        screen.write_text(0, "Really attack the little dog? [yn] (n)");
        let outcome = agent.step(&screen);

        assert_eq!(outcome.rule, DecisionRule::Prompt);
        assert_eq!(outcome.action, Action::Key('n'));
        assert!(agent.state().is_ally('d'));
        assert!(!agent.dungeon().current().is_explored(&Position::new(2, 1)));
    }

    #[test]
    fn test_critical_hp_retreats_from_hostiles() {
        let mut agent = seeded();
        let rows = ["--------", "|..@.r.|", "|......|", "--------"];
        let outcome = agent.step(&frame(&rows, "Dlvl:1 $:0 HP:2(16) Pw:2(2) AC:7 Xp:1/0"));

        assert_eq!(outcome.rule, DecisionRule::CriticalFlee);
        assert!(matches!(
            outcome.action,
            Action::Move(Direction::West) | Action::Move(Direction::SouthWest)
        ));
    }

    #[test]
    fn test_finished_level_heads_for_stairs() {
        let mut agent = seeded();
        let outcome = agent.step(&frame(&["------", "|@..>|", "------"], HEALTHY));
        assert_eq!(outcome.rule, DecisionRule::Stairs);
        assert_eq!(outcome.action, Action::Move(Direction::East));
    }

    #[test]
    fn test_long_stuck_level_routes_to_stairs() {
        let mut agent = seeded();
        let rows = ["-------", "|@....", "|...>.", "------"];
        let screen = frame(&rows, HEALTHY);
        let outcome = agent.step(&screen);
        assert_eq!(outcome.rule, DecisionRule::Explore);

        agent.state.level_stuck_turns = agent.config.level_stuck_threshold + 1;
        let outcome = agent.step(&screen);
        assert_eq!(outcome.rule, DecisionRule::LevelStuckStairs);
        assert!(matches!(
            outcome.action,
            Action::Move(Direction::East) | Action::Move(Direction::SouthEast)
        ));
    }

    #[test]
    fn test_failed_move_into_unexplored_marks_it_blocked() {
        let mut agent = seeded();
        agent.step(&frame(&["-----", "|@..|", "-----"], HEALTHY));

        let from = Position::new(10, 10);
        let target = Position::new(11, 10);
        assert!(!agent.dungeon().current().is_explored(&target));
        agent.state.pending_move = Some(PendingMove {
            from,
            dir: Direction::East,
            occupant: None,
        });
        agent.check_pending_move(from);

        let level = agent.dungeon().current();
        assert!(level.is_explored(&target));
        assert_eq!(level.kind_at(&target), CellKind::Wall);
        assert!(agent.state().pending_move.is_none());
    }

    #[test]
    fn test_three_failed_moves_blacklist_the_target() {
        let mut agent = seeded();
        let screen = frame(&["------", "|@....", "|....|", "------"], HEALTHY);
        let target = Position::new(5, 1);

        for _ in 0..3 {
            agent.step(&screen);
        }
        assert_eq!(agent.state().committed_target, Some(target));
        assert_eq!(agent.state().failed_moves_to_target, 2);
        assert!(!agent.state().is_blacklisted(&target));

        agent.step(&screen);
        assert!(agent.state().is_blacklisted(&target));
        assert_ne!(agent.state().committed_target, Some(target));
    }

    #[test]
    fn test_successful_moves_reset_the_failure_count() {
        let mut agent = seeded();
        let target = Position::new(9, 1);
        let at = |x: usize| {
            let mut row: Vec<char> = "|.........".chars().collect();
            row[x] = '@';
            let row: String = row.into_iter().collect();
            frame(&["----------", row.as_str(), "----------"], HEALTHY)
        };

        // Each move toward the target fails once before it goes through
        for screen in [at(1), at(1), at(2), at(2), at(3), at(3)] {
            let outcome = agent.step(&screen);
            assert_eq!(outcome.action, Action::Move(Direction::East), "{:?}", outcome);
        }

        assert_eq!(agent.state().committed_target, Some(target));
        assert_eq!(agent.state().failed_moves_to_target, 1);
        assert!(!agent.state().is_blacklisted(&target));
    }

    #[test]
    fn test_peaceful_in_the_way_is_not_attacked_forever() {
        let mut agent = seeded();
        let rows = ["-----", "|@G.", "-----"];
        let screen = frame(&rows, HEALTHY);
        let mut prompt = frame(&rows, HEALTHY);
        prompt.write_text(0, "Really attack the gnome lord? [yn] (n)");

        let mut attacks = 0;
        let mut rules = Vec::new();
        for _ in 0..30 {
            let outcome = agent.step(&screen);
            rules.push(outcome.rule);
            if outcome.action == Action::Move(Direction::East) {
                attacks += 1;
                let answer = agent.step(&prompt);
                assert_eq!(answer.action, Action::Key('n'));
            }
        }

        // The glyph walked into is registered, not a guess from "gnome lord"
        assert!(agent.state().is_ally('G'));
        assert!(!agent.state().is_ally('g'));
        assert!(agent.state().has_declined(&Position::new(2, 1)));
        assert_eq!(attacks, 1, "{:?}", rules);
        assert!(rules.contains(&DecisionRule::StuckSearch), "{:?}", rules);
    }

    #[test]
    fn test_missing_player_is_reported() {
        let mut agent = seeded();
        let outcome = agent.step(&frame(&["-----", "|...|", "-----"], HEALTHY));
        assert_eq!(outcome.rule, DecisionRule::NoPlayer);
        assert_eq!(outcome.position, None);
    }
}
