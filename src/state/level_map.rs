use tracing::{debug, warn};

use crate::infra::{CellKey, MAP_HEIGHT, MAP_WIDTH, Position};
use crate::perception::{ClassifiedFrame, classify_glyph, color};
use crate::state::cell::{CellKind, ItemRef, MonsterRef, TrackedCell};
use crate::state::feature_tracker::{Feature, FeatureTracker};

/// A cell worth probing for hidden passages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchCandidate {
    pub pos: Position,
    pub priority: u32,
    pub search_count: u32,
}

/// Remembered map of one dungeon depth.
#[derive(Clone, Debug)]
pub struct LevelMap {
    pub depth: i32,
    cells: Vec<TrackedCell>,
    pub features: FeatureTracker,
}

impl LevelMap {
    pub fn new(depth: i32) -> Self {
        Self {
            depth,
            cells: vec![TrackedCell::unexplored(); (MAP_WIDTH * MAP_HEIGHT) as usize],
            features: FeatureTracker::new(),
        }
    }

    pub fn get(&self, pos: &Position) -> Option<&TrackedCell> {
        CellKey::of(*pos).map(|key| &self.cells[key.index()])
    }

    pub fn get_mut(&mut self, pos: &Position) -> Option<&mut TrackedCell> {
        CellKey::of(*pos).map(|key| &mut self.cells[key.index()])
    }

    pub fn kind_at(&self, pos: &Position) -> CellKind {
        self.get(pos).map_or(CellKind::Stone, |cell| cell.kind())
    }

    pub fn is_explored(&self, pos: &Position) -> bool {
        self.get(pos).is_some_and(|cell| cell.explored)
    }

    pub fn is_explored_walkable(&self, pos: &Position) -> bool {
        self.get(pos).is_some_and(|cell| cell.is_explored_walkable())
    }

    pub fn is_door(&self, pos: &Position) -> bool {
        self.kind_at(pos).is_door()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Position, &TrackedCell)> {
        self.cells.iter().enumerate().map(|(idx, cell)| {
            let idx = idx as i32;
            (Position::new(idx % MAP_WIDTH, idx / MAP_WIDTH), cell)
        })
    }

    /// Merge a classified frame into remembered state.
    #[tracing::instrument(level = "trace", skip(self, frame), fields(depth = self.depth))]
    pub fn update(&mut self, frame: &ClassifiedFrame, turn: u64) {
        let mut new_features = Vec::new();

        for (pos, seen) in frame.iter() {
            let key = match CellKey::of(pos) {
                Some(key) => key,
                None => continue,
            };
            let cell = &mut self.cells[key.index()];

            // Transient references only describe the current frame
            cell.monster = None;
            cell.items.clear();

            match seen.kind {
                CellKind::Stone => {
                    if cell.explored {
                        cell.stale = true;
                    }
                }
                CellKind::Player | CellKind::Monster => {
                    if seen.kind == CellKind::Monster {
                        cell.monster = Some(MonsterRef {
                            glyph: seen.glyph,
                            color: seen.color,
                        });
                    }
                    if !cell.explored {
                        // Terrain under an occupant is unknown; assume floor until seen
                        cell.glyph = '.';
                        cell.color = color::GRAY;
                        cell.set_kind(CellKind::Floor);
                        cell.explored = true;
                    }
                    cell.stale = false;
                    cell.last_seen_turn = turn;
                }
                kind => {
                    if cell.explored && cell.kind() == CellKind::Wall && kind.is_walkable() {
                        warn!(
                            "SUSPICIOUS: wall at {:?} now shows as {:?} (turn {})",
                            pos, kind, turn
                        );
                    }
                    let changed = !cell.explored || cell.kind() != kind;
                    cell.glyph = seen.glyph;
                    cell.color = seen.color;
                    cell.set_kind(kind);
                    cell.explored = true;
                    cell.stale = false;
                    cell.last_seen_turn = turn;
                    if matches!(kind, CellKind::Item | CellKind::Gold) {
                        cell.items.push(ItemRef {
                            glyph: seen.glyph,
                            color: seen.color,
                        });
                    }
                    if changed && let Some(feature) = Feature::from_kind(kind) {
                        new_features.push((feature, pos));
                    }
                }
            }
        }

        for (feature, pos) in new_features {
            if self.features.record(feature, pos) {
                debug!("Discovered {:?} at {:?} on depth {}", feature, pos, self.depth);
            }
        }
    }

    /// Count of explored, walkable 8-neighbours.
    pub fn walkable_neighbor_count(&self, pos: &Position) -> usize {
        pos.neighbors()
            .iter()
            .filter(|n| self.is_explored_walkable(n))
            .count()
    }

    pub fn has_unexplored_neighbor(&self, pos: &Position) -> bool {
        pos.neighbors()
            .iter()
            .any(|n| n.in_bounds() && !self.is_explored(n))
    }

    pub fn is_frontier(&self, pos: &Position) -> bool {
        self.is_explored_walkable(pos) && self.has_unexplored_neighbor(pos)
    }

    /// Every frontier cell, least-searched first.
    pub fn frontier(&self) -> Vec<Position> {
        let mut frontier: Vec<(u32, Position)> = self
            .iter()
            .filter(|(pos, _)| self.is_frontier(pos))
            .map(|(pos, cell)| (cell.search_count, pos))
            .collect();
        frontier.sort_by_key(|(count, _)| *count);
        frontier.into_iter().map(|(_, pos)| pos).collect()
    }

    /// Cells worth searching for hidden doors, highest priority first.
    /// Cells searched `cap` times or more are treated as solid and left out.
    pub fn search_candidates(&self, cap: u32) -> Vec<SearchCandidate> {
        let mut candidates = Vec::new();
        for (pos, cell) in self.iter() {
            if !cell.is_explored_walkable() || cell.search_count >= cap {
                continue;
            }
            let touches_wall = pos.neighbors().iter().any(|n| {
                self.get(n)
                    .is_some_and(|c| c.explored && !c.walkable())
            });
            let touches_unexplored = self.has_unexplored_neighbor(&pos);
            if !touches_wall && !touches_unexplored {
                continue;
            }

            let mut priority = 1;
            if self.walkable_neighbor_count(&pos) <= 2 {
                priority += 3;
            }
            if self.is_corner(&pos) {
                priority += 1;
            }
            if touches_unexplored {
                priority += 1;
            }
            candidates.push(SearchCandidate {
                pos,
                priority,
                search_count: cell.search_count,
            });
        }
        candidates.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.search_count.cmp(&b.search_count))
        });
        candidates
    }

    /// Two orthogonally adjacent sides blocked, like the inside of a room corner.
    fn is_corner(&self, pos: &Position) -> bool {
        let blocked = |dx: i32, dy: i32| {
            let n = Position::new(pos.x + dx, pos.y + dy);
            !self.is_explored_walkable(&n)
        };
        (blocked(0, -1) || blocked(0, 1)) && (blocked(-1, 0) || blocked(1, 0))
    }

    pub fn record_search(&mut self, pos: &Position) {
        if let Some(cell) = self.get_mut(pos) {
            cell.search_count += 1;
        }
    }

    /// Remember an unexplored cell as solid so routing stops trying it.
    pub fn mark_blocked(&mut self, pos: &Position) {
        if let Some(cell) = self.get_mut(pos) {
            debug!("Marking {:?} as blocked", pos);
            cell.explored = true;
            cell.stale = true;
            cell.glyph = ' ';
            cell.set_kind(CellKind::Wall);
        }
    }

    /// Neighbours of `center` are always in view, so any still drawn blank
    /// are solid rock. Returns how many cells were newly settled.
    pub fn settle_rock_around(&mut self, frame: &ClassifiedFrame, center: Position) -> usize {
        let mut settled = 0;
        for neighbor in center.neighbors() {
            let blank = frame
                .cell(neighbor)
                .is_some_and(|cell| cell.kind == CellKind::Stone);
            if blank && neighbor.in_bounds() && !self.is_explored(&neighbor) {
                if let Some(cell) = self.get_mut(&neighbor) {
                    cell.explored = true;
                    cell.stale = true;
                    cell.set_kind(CellKind::Stone);
                    settled += 1;
                }
            }
        }
        settled
    }

    /// Monsters seen in the latest update.
    pub fn monsters(&self) -> Vec<(Position, MonsterRef)> {
        self.iter()
            .filter_map(|(pos, cell)| cell.monster.map(|m| (pos, m)))
            .collect()
    }

    pub fn stairs_down(&self) -> &[Position] {
        self.features.get_positions(Feature::StairsDown)
    }

    /// Build a fully-specified map from ASCII rows placed at the top-left corner.
    ///
    /// Legend: space is unexplored, `D` an open door, `+` a closed door,
    /// `M` floor with a monster on it; anything else uses the glyph table.
    pub fn from_rows(depth: i32, rows: &[&str]) -> Self {
        let mut map = LevelMap::new(depth);
        for (y, row) in rows.iter().enumerate() {
            for (x, glyph) in row.chars().enumerate() {
                let pos = Position::new(x as i32, y as i32);
                let kind = match glyph {
                    ' ' => continue,
                    'D' => CellKind::DoorOpen,
                    '+' => CellKind::DoorClosed,
                    'M' => CellKind::Floor,
                    other => classify_glyph(other, color::GRAY),
                };
                if let Some(cell) = map.get_mut(&pos) {
                    cell.glyph = glyph;
                    cell.set_kind(kind);
                    cell.explored = true;
                    if glyph == 'M' {
                        cell.monster = Some(MonsterRef {
                            glyph: 'M',
                            color: color::RED,
                        });
                    }
                }
                if let Some(feature) = Feature::from_kind(kind) {
                    map.features.record(feature, pos);
                }
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::{Frame, FrameCell, FrameClassifier, MAP_TOP};

    fn frame_with_map(rows: &[&str]) -> Frame {
        let mut frame = Frame::blank();
        for (y, row) in rows.iter().enumerate() {
            frame.write_text(MAP_TOP + y, row);
        }
        frame
    }

    #[test]
    fn test_update_remembers_fog_of_war() {
        let mut map = LevelMap::new(1);
        map.update(&FrameClassifier::classify(&frame_with_map(&["..@.>"])), 1);
        assert!(map.is_explored_walkable(&Position::new(4, 0)));

        // Cells drop out of view: remembered state stays, only stale toggles
        map.update(&FrameClassifier::classify(&frame_with_map(&["  @  "])), 2);
        let cell = map.get(&Position::new(4, 0)).unwrap();
        assert_eq!(cell.kind(), CellKind::StairsDown);
        assert!(cell.stale);
        assert_eq!(cell.last_seen_turn, 1);
        assert!(!map.is_explored(&Position::new(5, 0)));
    }

    #[test]
    fn test_entities_do_not_erase_terrain() {
        let mut map = LevelMap::new(1);
        map.update(&FrameClassifier::classify(&frame_with_map(&["@>.d"])), 1);
        // Monster seen first on an unknown cell gets a floor placeholder
        assert_eq!(map.kind_at(&Position::new(3, 0)), CellKind::Floor);
        assert!(map.get(&Position::new(3, 0)).unwrap().monster.is_some());

        // Monster steps onto the stairs; stairs remain remembered
        map.update(&FrameClassifier::classify(&frame_with_map(&["@d.."])), 2);
        assert_eq!(map.kind_at(&Position::new(1, 0)), CellKind::StairsDown);
        assert!(map.get(&Position::new(3, 0)).unwrap().monster.is_none());
        assert_eq!(map.monsters().len(), 1);
    }

    #[test]
    fn test_features_recorded_once() {
        let mut map = LevelMap::new(2);
        let frame = FrameClassifier::classify(&frame_with_map(&["@.>.{"]));
        map.update(&frame, 1);
        map.update(&frame, 2);
        map.update(&frame, 3);
        assert_eq!(map.stairs_down(), &[Position::new(2, 0)]);
        assert_eq!(map.features.get_positions(Feature::Fountain).len(), 1);
    }

    #[test]
    fn test_items_are_replaced_each_update() {
        let mut map = LevelMap::new(1);
        let mut frame = frame_with_map(&["@.)"]);
        map.update(&FrameClassifier::classify(&frame), 1);
        assert_eq!(map.get(&Position::new(2, 0)).unwrap().items.len(), 1);

        frame.set_map_cell(Position::new(2, 0), FrameCell::BLANK);
        map.update(&FrameClassifier::classify(&frame), 2);
        assert!(map.get(&Position::new(2, 0)).unwrap().items.is_empty());
    }

    #[test]
    fn test_enclosed_room_has_no_frontier_until_punctured() {
        let mut map = LevelMap::from_rows(
            1,
            &["|||||", "|...|", "|...|", "|...|", "|||||"],
        );
        // Outer ring beyond the walls is unexplored, but no walkable cell touches it
        assert!(map.frontier().is_empty());

        let hole = Position::new(4, 2);
        let cell = map.get_mut(&hole).unwrap();
        cell.explored = false;
        cell.set_kind(CellKind::Stone);
        assert_eq!(map.frontier(), vec![Position::new(3, 1), Position::new(3, 2), Position::new(3, 3)]);
    }

    #[test]
    fn test_frontier_prefers_less_searched_cells() {
        let mut map = LevelMap::from_rows(1, &["..."]);
        for _ in 0..5 {
            map.record_search(&Position::new(0, 0));
        }
        let frontier = map.frontier();
        assert_eq!(frontier.len(), 3);
        assert_eq!(frontier.last(), Some(&Position::new(0, 0)));
    }

    #[test]
    fn test_search_candidates_boost_dead_ends_and_respect_cap() {
        let mut map = LevelMap::from_rows(
            1,
            &["-------", "|.....|", "|.....|", "---#---", "---#---"],
        );
        // The corridor stub below the room is a dead end
        let candidates = map.search_candidates(25);
        assert_eq!(candidates[0].pos, Position::new(3, 4));

        for _ in 0..25 {
            map.record_search(&Position::new(3, 4));
        }
        let candidates = map.search_candidates(25);
        assert!(candidates.iter().all(|c| c.pos != Position::new(3, 4)));
    }

    #[test]
    fn test_blank_neighbours_settle_as_rock() {
        let mut map = LevelMap::new(1);
        let frame = FrameClassifier::classify(&frame_with_map(&["   ", "#@#", "   "]));
        map.update(&frame, 1);
        assert_eq!(map.settle_rock_around(&frame, Position::new(1, 1)), 6);
        assert!(!map.is_frontier(&Position::new(0, 1)));
        assert!(map.is_frontier(&Position::new(2, 1)));
        assert_eq!(map.settle_rock_around(&frame, Position::new(1, 1)), 0);
    }

    #[test]
    fn test_mark_blocked() {
        let mut map = LevelMap::from_rows(1, &[".."]);
        let target = Position::new(2, 0);
        map.mark_blocked(&target);
        assert!(map.is_explored(&target));
        assert_eq!(map.kind_at(&target), CellKind::Wall);
        assert!(!map.get(&target).unwrap().walkable());
    }
}
