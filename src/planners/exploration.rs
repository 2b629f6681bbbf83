use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::infra::{AStar, CellKey, Direction, PathOptions, PathResult, Position, is_legal_step};
use crate::planners::corridor::analyze_corridor_position;
use crate::state::{CellKind, LevelMap};

/// Tunable parts of frontier ranking.
#[derive(Debug, Clone, Copy)]
pub struct ExplorationTuning {
    /// Frontier cells searched this often lose priority.
    pub heavy_search_threshold: u32,
    /// Minimum cosine between a candidate's bearing and the underexplored bias.
    pub bias_margin: f32,
}

impl Default for ExplorationTuning {
    fn default() -> Self {
        Self {
            heavy_search_threshold: 10,
            bias_margin: 0.5,
        }
    }
}

/// Where exploration starts from and what the agent remembers about its recent walk.
pub struct ExplorationQuery<'a> {
    pub start: Position,
    pub came_from: Option<Position>,
    pub recent: &'a HashSet<CellKey>,
    pub prefer_far: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrontierCandidate {
    pub pos: Position,
    pub bfs_distance: u32,
    pub chebyshev: i32,
    pub is_corridor: bool,
    pub continues_corridor: bool,
    pub bias_aligned: bool,
    pub room_aligned: bool,
    pub recently_visited: bool,
    pub search_count: u32,
}

#[derive(Debug, Clone)]
pub struct ExplorationTarget {
    pub candidate: FrontierCandidate,
    pub path: PathResult,
}

/// Reachable frontier cells, best first.
#[tracing::instrument(level = "trace", skip(map, query, tuning), fields(start_x = query.start.x, start_y = query.start.y))]
pub fn rank_exploration_targets(
    map: &LevelMap,
    query: &ExplorationQuery,
    tuning: &ExplorationTuning,
) -> Vec<FrontierCandidate> {
    let start = query.start;
    let heading = analyze_corridor_position(map, start, query.came_from).heading();
    let bias = underexplored_bias(map, start);
    let room_direction = predicted_room_direction(map, start);

    let mut visited: HashMap<Position, u32> = HashMap::new();
    let mut queue = VecDeque::new();
    let mut candidates = Vec::new();
    visited.insert(start, 0);
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        let dist = visited.get(&current).copied().unwrap_or(0);

        if current != start && map.is_frontier(&current) {
            let cell_kind = map.kind_at(&current);
            let (dx, dy) = (current.x - start.x, current.y - start.y);
            let continues_corridor = cell_kind == CellKind::Corridor
                && heading.is_some_and(|dir| {
                    let (hx, hy) = dir.delta();
                    dx * hx + dy * hy > 0
                });
            let bias_aligned = bias.is_some_and(|(bx, by)| {
                let len = ((dx * dx + dy * dy) as f32).sqrt();
                len > 0.0 && (dx as f32 * bx + dy as f32 * by) / len > tuning.bias_margin
            });
            let room_aligned =
                room_direction.is_some_and(|dir| Direction::from_delta(dx, dy) == Some(dir));

            candidates.push(FrontierCandidate {
                pos: current,
                bfs_distance: dist,
                chebyshev: start.distance(&current),
                is_corridor: cell_kind == CellKind::Corridor,
                continues_corridor,
                bias_aligned,
                room_aligned,
                recently_visited: CellKey::of(current).is_some_and(|k| query.recent.contains(&k)),
                search_count: map.get(&current).map_or(0, |c| c.search_count),
            });
        }

        for neighbor in current.neighbors() {
            if visited.contains_key(&neighbor)
                || !map.is_explored_walkable(&neighbor)
                || !is_legal_step(map, current, neighbor)
            {
                continue;
            }
            visited.insert(neighbor, dist + 1);
            queue.push_back(neighbor);
        }
    }

    let heavy = tuning.heavy_search_threshold;
    // Stable sort keeps BFS discovery order among equals
    candidates.sort_by(|a, b| {
        a.recently_visited
            .cmp(&b.recently_visited)
            .then(b.continues_corridor.cmp(&a.continues_corridor))
            .then(b.bias_aligned.cmp(&a.bias_aligned))
            .then(b.room_aligned.cmp(&a.room_aligned))
            .then(b.is_corridor.cmp(&a.is_corridor))
            .then((b.search_count < heavy).cmp(&(a.search_count < heavy)))
            .then(if query.prefer_far {
                b.bfs_distance.cmp(&a.bfs_distance)
            } else {
                a.bfs_distance.cmp(&b.bfs_distance)
            })
    });

    debug!("Ranked {} frontier candidates", candidates.len());
    candidates
}

/// Route to the best-ranked frontier cell that `accept` allows.
///
/// Candidates are tried in rank order until one has a path under `options`.
/// None means no acceptable frontier cell is reachable.
pub fn find_exploration_target(
    map: &LevelMap,
    query: &ExplorationQuery,
    tuning: &ExplorationTuning,
    options: &PathOptions,
    accept: impl Fn(&Position) -> bool,
) -> Option<ExplorationTarget> {
    rank_exploration_targets(map, query, tuning)
        .into_iter()
        .filter(|candidate| accept(&candidate.pos))
        .find_map(|candidate| {
            let path = AStar::find_path(map, query.start, candidate.pos, options);
            path.found().then_some(ExplorationTarget { candidate, path })
        })
}

/// Unit vector pointing toward the side of the map with the most unseen cells.
pub fn underexplored_bias(map: &LevelMap, start: Position) -> Option<(f32, f32)> {
    let (mut left, mut right, mut up, mut down) = (0u32, 0u32, 0u32, 0u32);
    let (mut left_area, mut right_area, mut up_area, mut down_area) = (0u32, 0u32, 0u32, 0u32);

    for (pos, cell) in map.iter() {
        let unexplored = u32::from(!cell.explored);
        if pos.x < start.x {
            left += unexplored;
            left_area += 1;
        } else if pos.x > start.x {
            right += unexplored;
            right_area += 1;
        }
        if pos.y < start.y {
            up += unexplored;
            up_area += 1;
        } else if pos.y > start.y {
            down += unexplored;
            down_area += 1;
        }
    }

    let ratio = |count: u32, area: u32| if area == 0 { 0.0 } else { count as f32 / area as f32 };
    let bx = ratio(right, right_area) - ratio(left, left_area);
    let by = ratio(down, down_area) - ratio(up, up_area);
    let len = (bx * bx + by * by).sqrt();
    if len < 0.1 {
        return None;
    }
    Some((bx / len, by / len))
}

/// Compass direction of the nearest known opening (door or corridor end)
/// that still leads into unseen space.
pub fn predicted_room_direction(map: &LevelMap, start: Position) -> Option<Direction> {
    map.iter()
        .filter(|(pos, cell)| {
            *pos != start
                && cell.explored
                && (cell.kind().is_door()
                    || (cell.kind() == CellKind::Corridor && map.walkable_neighbor_count(pos) <= 1))
                && map.has_unexplored_neighbor(pos)
        })
        .min_by_key(|(pos, _)| start.distance(pos))
        .and_then(|(pos, _)| Direction::from_delta(pos.x - start.x, pos.y - start.y))
}
