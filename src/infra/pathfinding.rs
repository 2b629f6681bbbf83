use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::infra::{CellKey, Direction, Position};
use crate::state::{CellKind, LevelMap};

pub const COST_STEP: u32 = 1;
pub const COST_CLOSED_DOOR: u32 = 3;
pub const COST_TRAP: u32 = 8;
pub const COST_MONSTER: u32 = 15;

#[derive(Debug, Clone)]
pub struct PathOptions {
    /// Treat never-seen cells as passable at `unexplored_cost`.
    pub allow_unexplored: bool,
    pub unexplored_cost: u32,
    /// Cells that are passable but penalised by `avoid_penalty`.
    pub avoid: HashSet<CellKey>,
    pub avoid_penalty: u32,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            allow_unexplored: false,
            unexplored_cost: 2,
            avoid: HashSet::new(),
            avoid_penalty: 20,
        }
    }
}

impl PathOptions {
    pub fn allowing_unexplored(mut self) -> Self {
        self.allow_unexplored = true;
        self
    }

    pub fn avoiding(mut self, positions: impl IntoIterator<Item = Position>) -> Self {
        self.avoid
            .extend(positions.into_iter().filter_map(CellKey::of));
        self
    }
}

/// Route from start (inclusive) to goal (inclusive) and its total cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResult {
    pub path: Vec<Position>,
    pub cost: u32,
}

impl PathResult {
    pub fn not_found() -> Self {
        Self {
            path: Vec::new(),
            cost: u32::MAX,
        }
    }

    /// A route needs at least one step to count as found.
    pub fn found(&self) -> bool {
        self.path.len() >= 2
    }

    pub fn next_step(&self) -> Option<Position> {
        if !self.found() {
            return None;
        }
        self.path.get(1).copied()
    }

    pub fn first_direction(&self) -> Option<Direction> {
        let from = self.path.first()?;
        from.direction_to(&self.next_step()?)
    }
}

#[derive(Clone, Eq, PartialEq)]
struct Node {
    pos: Position,
    f_score: u32,
    seq: u64,
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lowest f first, then earliest pushed
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Whether a single step between adjacent cells is legal.
///
/// Doorways may only be entered, left or passed cardinally.
pub fn is_legal_step(map: &LevelMap, from: Position, to: Position) -> bool {
    if from.x == to.x || from.y == to.y {
        return true;
    }
    let corner_a = Position::new(to.x, from.y);
    let corner_b = Position::new(from.x, to.y);
    ![from, to, corner_a, corner_b]
        .iter()
        .any(|pos| map.is_door(pos))
}

/// Cost to enter `pos`, or None when it cannot be entered.
pub fn step_cost(map: &LevelMap, pos: Position, options: &PathOptions) -> Option<u32> {
    let cell = map.get(&pos)?;
    let mut cost = if !cell.explored {
        if !options.allow_unexplored {
            return None;
        }
        options.unexplored_cost
    } else {
        match cell.kind() {
            CellKind::Wall | CellKind::Stone => return None,
            CellKind::DoorClosed => COST_CLOSED_DOOR,
            CellKind::Trap => COST_TRAP,
            CellKind::Floor
            | CellKind::Corridor
            | CellKind::DoorOpen
            | CellKind::StairsUp
            | CellKind::StairsDown
            | CellKind::Fountain
            | CellKind::Altar
            | CellKind::Throne
            | CellKind::Grave
            | CellKind::Gold
            | CellKind::Item
            | CellKind::Monster
            | CellKind::Player => COST_STEP,
        }
    };
    if cell.monster.is_some() {
        cost = cost.max(COST_MONSTER);
    }
    if CellKey::of(pos).is_some_and(|key| options.avoid.contains(&key)) {
        cost += options.avoid_penalty;
    }
    Some(cost)
}

pub struct AStar;

impl AStar {
    /// Cheapest 8-connected route using Chebyshev distance as the heuristic.
    ///
    /// A route to the start itself is reported as not found.
    #[tracing::instrument(level = "trace", skip(map, options), fields(start_x = start.x, start_y = start.y, goal_x = goal.x, goal_y = goal.y))]
    pub fn find_path(
        map: &LevelMap,
        start: Position,
        goal: Position,
        options: &PathOptions,
    ) -> PathResult {
        if start == goal || !start.in_bounds() || !goal.in_bounds() {
            return PathResult::not_found();
        }

        let mut open_set = BinaryHeap::new();
        let mut came_from: HashMap<Position, Position> = HashMap::new();
        let mut g_score: HashMap<Position, u32> = HashMap::new();
        let mut closed_set: HashSet<Position> = HashSet::new();
        let mut seq = 0u64;

        g_score.insert(start, 0);
        open_set.push(Node {
            pos: start,
            f_score: heuristic(start, goal),
            seq,
        });

        const MAX_EXPANSIONS: usize = 5000;
        let mut expansions = 0;

        while let Some(Node { pos: current, .. }) = open_set.pop() {
            if current == goal {
                let cost = g_score.get(&current).copied().unwrap_or(u32::MAX);
                tracing::trace!(expansions, cost, "Path found");
                return PathResult {
                    path: reconstruct_path(&came_from, current),
                    cost,
                };
            }

            if !closed_set.insert(current) {
                continue;
            }

            expansions += 1;
            if expansions > MAX_EXPANSIONS {
                tracing::warn!(expansions, "Max expansions reached, target unreachable");
                return PathResult::not_found();
            }

            let current_g = g_score.get(&current).copied().unwrap_or(u32::MAX);

            for neighbor in current.neighbors() {
                if !neighbor.in_bounds() || closed_set.contains(&neighbor) {
                    continue;
                }
                if !is_legal_step(map, current, neighbor) {
                    continue;
                }
                let Some(cost) = step_cost(map, neighbor, options) else {
                    continue;
                };

                let tentative_g = current_g.saturating_add(cost);
                if tentative_g < g_score.get(&neighbor).copied().unwrap_or(u32::MAX) {
                    came_from.insert(neighbor, current);
                    g_score.insert(neighbor, tentative_g);
                    seq += 1;
                    open_set.push(Node {
                        pos: neighbor,
                        f_score: tentative_g + heuristic(neighbor, goal),
                        seq,
                    });
                }
            }
        }

        tracing::trace!(expansions, "No path found");
        PathResult::not_found()
    }
}

fn heuristic(a: Position, b: Position) -> u32 {
    a.distance(&b) as u32
}

fn reconstruct_path(came_from: &HashMap<Position, Position>, mut current: Position) -> Vec<Position> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(rows: &[&str], start: (i32, i32), goal: (i32, i32)) -> PathResult {
        let map = LevelMap::from_rows(1, rows);
        AStar::find_path(
            &map,
            Position::new(start.0, start.1),
            Position::new(goal.0, goal.1),
            &PathOptions::default(),
        )
    }

    #[test]
    fn test_straight_corridor() {
        let result = path(&["....."], (0, 0), (4, 0));
        assert!(result.found());
        assert_eq!(result.cost, 4);
        assert_eq!(result.path.len(), 5);
        assert_eq!(result.first_direction(), Some(Direction::East));
    }

    #[test]
    fn test_open_room_diagonal() {
        let result = path(&[".....", ".....", "....."], (0, 0), (2, 2));
        assert_eq!(result.path.len(), 3);
        assert_eq!(result.cost, 2);
        assert_eq!(result.first_direction(), Some(Direction::SouthEast));
        assert_eq!(result.first_direction().map(|d| d.name()), Some("southeast"));
    }

    #[test]
    fn test_self_path_is_not_found() {
        let result = path(&["..."], (1, 0), (1, 0));
        assert!(!result.found());
        assert!(result.path.is_empty());

        let empty = LevelMap::new(1);
        let p = Position::new(3, 3);
        assert!(!AStar::find_path(&empty, p, p, &PathOptions::default()).found());
    }

    #[test]
    fn test_enclosed_goal_is_not_found() {
        let result = path(&["..|||", "..|.|", "..|||"], (0, 0), (3, 1));
        assert!(!result.found());
        assert!(result.path.is_empty());
    }

    #[test]
    fn test_unexplored_blocks_unless_allowed() {
        let map = LevelMap::from_rows(1, &[".. .."]);
        let start = Position::new(0, 0);
        let goal = Position::new(4, 0);
        assert!(!AStar::find_path(&map, start, goal, &PathOptions::default()).found());

        let result = AStar::find_path(&map, start, goal, &PathOptions::default().allowing_unexplored());
        assert!(result.found());
        // Three known steps and one unexplored step at cost 2
        assert_eq!(result.cost, 5);
    }

    #[test]
    fn test_diagonal_through_door_is_illegal() {
        // Door at (1,1) between open cells on the diagonal (0,0) -> (2,2)
        let rows = ["...", ".D.", "..."];
        let map = LevelMap::from_rows(1, &rows);
        let start = Position::new(0, 1);
        let goal = Position::new(2, 1);
        let result = AStar::find_path(&map, start, goal, &PathOptions::default());
        assert!(result.found());
        for step in result.path.windows(2) {
            let involves_door = map.is_door(&step[0])
                || map.is_door(&step[1])
                || map.is_door(&Position::new(step[1].x, step[0].y))
                || map.is_door(&Position::new(step[0].x, step[1].y));
            if involves_door {
                assert!(step[0].x == step[1].x || step[0].y == step[1].y, "diagonal door step {:?}", step);
            }
        }
    }

    #[test]
    fn test_doorway_in_wall_requires_cardinal_approach() {
        let rows = [".....", "--D--", "....."];
        let map = LevelMap::from_rows(1, &rows);
        let result = AStar::find_path(&map, Position::new(1, 0), Position::new(3, 2), &PathOptions::default());
        assert!(result.found());
        // Must pass (2,0) -> (2,1) -> (2,2) cardinally
        assert!(result.path.contains(&Position::new(2, 0)));
        assert!(result.path.contains(&Position::new(2, 2)));
        assert_eq!(result.cost, 4);
        assert!(!is_legal_step(&map, Position::new(1, 0), Position::new(2, 1)));
        assert!(is_legal_step(&map, Position::new(2, 0), Position::new(2, 1)));
    }

    #[test]
    fn test_terrain_costs_are_exact() {
        // Single-row corridor forces every cell to be crossed
        let closed = path(&[".+."], (0, 0), (2, 0));
        assert_eq!(closed.cost, COST_CLOSED_DOOR + COST_STEP);

        let trap = path(&[".^."], (0, 0), (2, 0));
        assert_eq!(trap.cost, COST_TRAP + COST_STEP);

        let monster = path(&[".M."], (0, 0), (2, 0));
        assert!(monster.found());
        assert_eq!(monster.cost, COST_MONSTER + COST_STEP);
    }

    #[test]
    fn test_detours_around_expensive_cells_when_cheaper() {
        // Trap straight ahead costs 8; going around costs 2 extra steps
        let result = path(&["...", ".^.", "..."], (1, 0), (1, 2));
        assert_eq!(result.cost, 2);
        assert!(!result.path.contains(&Position::new(1, 1)));
    }

    #[test]
    fn test_avoid_set_adds_penalty_but_stays_passable() {
        let map = LevelMap::from_rows(1, &["..."]);
        let options = PathOptions::default().avoiding([Position::new(1, 0)]);
        let result = AStar::find_path(&map, Position::new(0, 0), Position::new(2, 0), &options);
        assert!(result.found());
        assert_eq!(result.cost, 2 + options.avoid_penalty);
    }

    #[test]
    fn test_matches_exhaustive_search_on_small_fixture() {
        let rows = ["..^..", ".|+|.", ".M...", "....."];
        let map = LevelMap::from_rows(1, &rows);
        let start = Position::new(0, 0);
        let options = PathOptions::default();

        // Bellman-Ford style relaxation over the same step rules
        let mut best: HashMap<Position, u32> = HashMap::new();
        best.insert(start, 0);
        for _ in 0..40 {
            let snapshot: Vec<(Position, u32)> = best.iter().map(|(p, c)| (*p, *c)).collect();
            for (pos, cost) in snapshot {
                for n in pos.neighbors() {
                    if !n.in_bounds() || !is_legal_step(&map, pos, n) {
                        continue;
                    }
                    if let Some(step) = step_cost(&map, n, &options) {
                        let entry = best.entry(n).or_insert(u32::MAX);
                        *entry = (*entry).min(cost + step);
                    }
                }
            }
        }

        for (y, row) in rows.iter().enumerate() {
            for x in 0..row.len() {
                let goal = Position::new(x as i32, y as i32);
                if goal == start {
                    continue;
                }
                let result = AStar::find_path(&map, start, goal, &options);
                match best.get(&goal) {
                    Some(cost) => assert_eq!(result.cost, *cost, "goal {:?}", goal),
                    None => assert!(!result.found(), "goal {:?}", goal),
                }
            }
        }
    }
}
