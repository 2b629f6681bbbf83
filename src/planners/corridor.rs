use crate::infra::{Direction, Position, is_legal_step};
use crate::state::{CellKind, LevelMap};

/// Shape of the corridor around the agent's cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorridorPosition {
    NotInCorridor,
    /// Inside a corridor with exactly one way forward.
    Corridor { direction: Direction },
    DeadEnd { exit: Direction },
    /// Fork, or the mouth of a room.
    Junction,
}

impl CorridorPosition {
    pub fn in_corridor(self) -> bool {
        !matches!(self, CorridorPosition::NotInCorridor)
    }

    /// Whether walking can continue without a fresh route search.
    pub fn is_straight(self) -> bool {
        matches!(self, CorridorPosition::Corridor { .. })
    }

    pub fn heading(self) -> Option<Direction> {
        match self {
            CorridorPosition::Corridor { direction } => Some(direction),
            CorridorPosition::DeadEnd { exit } => Some(exit),
            _ => None,
        }
    }
}

/// Room floor with at least this many walkable neighbours marks a room entrance.
const OPEN_FLOOR_NEIGHBORS: usize = 4;

pub fn analyze_corridor_position(
    map: &LevelMap,
    pos: Position,
    came_from: Option<Position>,
) -> CorridorPosition {
    if map.kind_at(&pos) != CellKind::Corridor {
        return CorridorPosition::NotInCorridor;
    }

    let exits: Vec<(Direction, Position)> = Direction::ALL
        .into_iter()
        .map(|dir| (dir, pos.step(dir)))
        .filter(|(_, next)| map.is_explored_walkable(next) && is_legal_step(map, pos, *next))
        .collect();

    match exits.len() {
        0 => CorridorPosition::NotInCorridor,
        1 => CorridorPosition::DeadEnd { exit: exits[0].0 },
        2 => {
            let opens_into_room = exits
                .iter()
                .any(|(_, next)| map.kind_at(next) == CellKind::Floor && is_open_floor(map, next));
            if opens_into_room {
                return CorridorPosition::Junction;
            }
            let forward = exits
                .iter()
                .find(|(_, next)| Some(*next) != came_from)
                .unwrap_or(&exits[0]);
            CorridorPosition::Corridor { direction: forward.0 }
        }
        _ => CorridorPosition::Junction,
    }
}

fn is_open_floor(map: &LevelMap, pos: &Position) -> bool {
    pos.neighbors()
        .iter()
        .filter(|n| map.is_explored_walkable(n))
        .count()
        >= OPEN_FLOOR_NEIGHBORS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_corridor_follows_heading() {
        let map = LevelMap::from_rows(1, &["#####"]);
        let here = Position::new(2, 0);
        assert_eq!(
            analyze_corridor_position(&map, here, Some(Position::new(1, 0))),
            CorridorPosition::Corridor {
                direction: Direction::East
            }
        );
        assert_eq!(
            analyze_corridor_position(&map, here, Some(Position::new(3, 0))),
            CorridorPosition::Corridor {
                direction: Direction::West
            }
        );
    }

    #[test]
    fn test_dead_end_and_room_floor() {
        let map = LevelMap::from_rows(1, &["##..."]);
        assert_eq!(
            analyze_corridor_position(&map, Position::new(0, 0), None),
            CorridorPosition::DeadEnd {
                exit: Direction::East
            }
        );
        assert_eq!(
            analyze_corridor_position(&map, Position::new(3, 0), None),
            CorridorPosition::NotInCorridor
        );
    }

    #[test]
    fn test_fork_is_junction() {
        let map = LevelMap::from_rows(1, &["#.#", " # ", " # "]);
        // (1,1) touches (0,0), (2,0), (1,0) floor and (1,2)
        assert_eq!(
            analyze_corridor_position(&map, Position::new(1, 1), None),
            CorridorPosition::Junction
        );
    }

    #[test]
    fn test_room_entrance_is_junction() {
        let map = LevelMap::from_rows(
            1,
            &[".....", "||.||", "--#--", "  #  "],
        );
        let below = Position::new(2, 3);
        assert_eq!(
            analyze_corridor_position(&map, below, None),
            CorridorPosition::DeadEnd {
                exit: Direction::North
            }
        );
        // Two exits, but one is open room floor
        assert_eq!(
            analyze_corridor_position(&map, Position::new(2, 2), Some(below)),
            CorridorPosition::Junction
        );
    }
}
