use std::collections::{HashSet, VecDeque};

use tracing::{debug, warn};

use crate::infra::{CellKey, Direction, Position};

/// A movement sent last turn, checked against the next observed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMove {
    pub from: Position,
    pub dir: Direction,
    /// Monster glyph that stood on the destination when the move was sent.
    pub occupant: Option<char>,
}

impl PendingMove {
    pub fn target(&self) -> Position {
        self.from.step(self.dir)
    }
}

/// Mutable per-run agent memory. Everything except the ally registry is
/// scoped to the current depth.
#[derive(Debug, Clone)]
pub struct AgentState {
    pub last_position: Option<Position>,
    pub stuck_turns: u32,
    pub level_stuck_turns: u32,
    /// Searches issued by the stuck-recovery chain since progress was last made.
    pub stuck_searches: u32,
    /// How far down the recovery chain the current stuck episode has gone.
    pub stuck_escalation: u32,
    recent: VecDeque<CellKey>,
    recent_capacity: usize,
    pub committed_target: Option<Position>,
    pub committed_path: Option<Vec<Position>>,
    pub failed_moves_to_target: u32,
    blacklist: HashSet<CellKey>,
    allies: HashSet<char>,
    declined: HashSet<CellKey>,
    picked_up: HashSet<CellKey>,
    pub pending_move: Option<PendingMove>,
}

impl AgentState {
    pub fn new(recent_capacity: usize) -> Self {
        Self {
            last_position: None,
            stuck_turns: 0,
            level_stuck_turns: 0,
            stuck_searches: 0,
            stuck_escalation: 0,
            recent: VecDeque::with_capacity(recent_capacity),
            recent_capacity: recent_capacity.max(1),
            committed_target: None,
            committed_path: None,
            failed_moves_to_target: 0,
            blacklist: HashSet::new(),
            allies: HashSet::new(),
            declined: HashSet::new(),
            picked_up: HashSet::new(),
            pending_move: None,
        }
    }

    /// Forget everything tied to the previous depth. Known allies survive.
    pub fn reset_for_new_level(&mut self) {
        self.last_position = None;
        self.stuck_turns = 0;
        self.level_stuck_turns = 0;
        self.stuck_searches = 0;
        self.stuck_escalation = 0;
        self.recent.clear();
        self.committed_target = None;
        self.committed_path = None;
        self.failed_moves_to_target = 0;
        self.blacklist.clear();
        self.declined.clear();
        self.picked_up.clear();
        self.pending_move = None;
    }

    /// Record this turn's position and update the stuck counters.
    ///
    /// Standing still, or revisiting a position at least twice within the
    /// last `window` positions, counts as stuck. Anything else is progress.
    pub fn observe_position(&mut self, pos: Position, window: usize) {
        let unchanged = self.last_position == Some(pos);
        let key = CellKey::of(pos);
        let recurrences = self
            .recent
            .iter()
            .rev()
            .take(window)
            .filter(|k| Some(**k) == key)
            .count();

        if unchanged || recurrences >= 2 {
            self.stuck_turns += 1;
            self.level_stuck_turns += 1;
            if !unchanged {
                debug!("Oscillation at {:?} ({} recent visits)", pos, recurrences);
            }
        } else {
            self.stuck_turns = 0;
            self.stuck_searches = 0;
            self.stuck_escalation = 0;
        }

        if let Some(key) = key {
            if self.recent.len() >= self.recent_capacity {
                self.recent.pop_front();
            }
            self.recent.push_back(key);
        }
        self.last_position = Some(pos);
    }

    /// A turn spent waiting on something in the way makes no progress.
    pub fn note_blocked_turn(&mut self) {
        self.stuck_turns += 1;
        self.level_stuck_turns += 1;
    }

    pub fn recently_visited(&self, pos: &Position) -> bool {
        CellKey::of(*pos).is_some_and(|key| self.recent.contains(&key))
    }

    pub fn recent_keys(&self) -> HashSet<CellKey> {
        self.recent.iter().copied().collect()
    }

    pub fn commit(&mut self, target: Position, path: Vec<Position>) {
        if self.committed_target != Some(target) {
            self.failed_moves_to_target = 0;
        }
        self.committed_target = Some(target);
        self.committed_path = Some(path);
    }

    pub fn abandon_target(&mut self) {
        self.committed_target = None;
        self.committed_path = None;
        self.failed_moves_to_target = 0;
    }

    pub fn blacklist(&mut self, pos: Position) {
        if let Some(key) = CellKey::of(pos)
            && self.blacklist.insert(key)
        {
            warn!("Blacklisting unreachable target {:?}", pos);
        }
    }

    pub fn is_blacklisted(&self, pos: &Position) -> bool {
        CellKey::of(*pos).is_some_and(|key| self.blacklist.contains(&key))
    }

    pub fn add_ally(&mut self, glyph: char) {
        if self.allies.insert(glyph) {
            debug!("Registered '{}' as non-hostile", glyph);
        }
    }

    pub fn is_ally(&self, glyph: char) -> bool {
        self.allies.contains(&glyph)
    }

    pub fn decline(&mut self, pos: Position) {
        if let Some(key) = CellKey::of(pos) {
            self.declined.insert(key);
        }
    }

    pub fn has_declined(&self, pos: &Position) -> bool {
        CellKey::of(*pos).is_some_and(|key| self.declined.contains(&key))
    }

    /// Returns false if a pickup was already attempted here.
    pub fn mark_picked_up(&mut self, pos: Position) -> bool {
        CellKey::of(pos).is_some_and(|key| self.picked_up.insert(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standing_still_counts_as_stuck() {
        let mut state = AgentState::new(20);
        let pos = Position::new(5, 5);
        for _ in 0..5 {
            state.observe_position(pos, 6);
        }
        assert_eq!(state.stuck_turns, 4);
        assert_eq!(state.level_stuck_turns, 4);

        state.observe_position(Position::new(6, 5), 6);
        assert_eq!(state.stuck_turns, 0);
        assert_eq!(state.level_stuck_turns, 4);
    }

    #[test]
    fn test_oscillation_counts_as_stuck() {
        let mut state = AgentState::new(20);
        let a = Position::new(1, 1);
        let b = Position::new(2, 1);
        state.observe_position(a, 6);
        state.observe_position(b, 6);
        state.observe_position(a, 6);
        assert_eq!(state.stuck_turns, 0);
        state.observe_position(b, 6);
        assert_eq!(state.stuck_turns, 0);
        // Third visit to `a` within the window
        state.observe_position(a, 6);
        assert_eq!(state.stuck_turns, 1);
    }

    #[test]
    fn test_reset_keeps_allies() {
        let mut state = AgentState::new(20);
        state.observe_position(Position::new(1, 1), 6);
        state.observe_position(Position::new(1, 1), 6);
        state.add_ally('d');
        state.blacklist(Position::new(3, 3));
        state.decline(Position::new(4, 4));
        state.reset_for_new_level();

        assert_eq!(state.stuck_turns, 0);
        assert_eq!(state.level_stuck_turns, 0);
        assert!(!state.is_blacklisted(&Position::new(3, 3)));
        assert!(!state.has_declined(&Position::new(4, 4)));
        assert!(!state.recently_visited(&Position::new(1, 1)));
        assert!(state.is_ally('d'));
    }

    #[test]
    fn test_recency_is_bounded() {
        let mut state = AgentState::new(3);
        for x in 0..5 {
            state.observe_position(Position::new(x, 0), 6);
        }
        assert!(!state.recently_visited(&Position::new(1, 0)));
        assert!(state.recently_visited(&Position::new(4, 0)));
    }
}
