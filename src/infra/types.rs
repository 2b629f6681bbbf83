/// Width of the dungeon map area in cells.
pub const MAP_WIDTH: i32 = 80;
/// Height of the dungeon map area in cells.
pub const MAP_HEIGHT: i32 = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance, the step count for 8-directional movement.
    pub fn distance(&self, other: &Position) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// All eight neighbours in `Direction::ALL` order. May leave the map.
    pub fn neighbors(&self) -> [Position; 8] {
        Direction::ALL.map(|dir| self.step(dir))
    }

    pub fn step(&self, dir: Direction) -> Position {
        let (dx, dy) = dir.delta();
        Position::new(self.x + dx, self.y + dy)
    }

    pub fn is_adjacent(&self, other: &Position) -> bool {
        self.distance(other) == 1
    }

    /// Direction of a single step from `self` to `other`, if they are adjacent.
    pub fn direction_to(&self, other: &Position) -> Option<Direction> {
        if !self.is_adjacent(other) {
            return None;
        }
        Direction::from_delta(other.x - self.x, other.y - self.y)
    }

    pub fn in_bounds(&self) -> bool {
        self.x >= 0 && self.x < MAP_WIDTH && self.y >= 0 && self.y < MAP_HEIGHT
    }
}

/// Dense integer key for a map coordinate.
///
/// Sets of positions that live for many turns (recency, blacklist) store these
/// so the row stride is defined in exactly one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey(u32);

impl CellKey {
    pub fn of(pos: Position) -> Option<Self> {
        if !pos.in_bounds() {
            return None;
        }
        Some(Self((pos.y * MAP_WIDTH + pos.x) as u32))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn position(self) -> Position {
        let raw = self.0 as i32;
        Position::new(raw % MAP_WIDTH, raw / MAP_WIDTH)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::NorthEast => (1, -1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, 1),
            Direction::South => (0, 1),
            Direction::SouthWest => (-1, 1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, -1),
        }
    }

    pub fn from_delta(dx: i32, dy: i32) -> Option<Direction> {
        match (dx.signum(), dy.signum()) {
            (0, -1) => Some(Direction::North),
            (1, -1) => Some(Direction::NorthEast),
            (1, 0) => Some(Direction::East),
            (1, 1) => Some(Direction::SouthEast),
            (0, 1) => Some(Direction::South),
            (-1, 1) => Some(Direction::SouthWest),
            (-1, 0) => Some(Direction::West),
            (-1, -1) => Some(Direction::NorthWest),
            _ => None,
        }
    }

    pub fn is_diagonal(self) -> bool {
        let (dx, dy) = self.delta();
        dx != 0 && dy != 0
    }

    /// vi-keys movement letter.
    pub fn key(self) -> char {
        match self {
            Direction::North => 'k',
            Direction::NorthEast => 'u',
            Direction::East => 'l',
            Direction::SouthEast => 'n',
            Direction::South => 'j',
            Direction::SouthWest => 'b',
            Direction::West => 'h',
            Direction::NorthWest => 'y',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::NorthEast => "northeast",
            Direction::East => "east",
            Direction::SouthEast => "southeast",
            Direction::South => "south",
            Direction::SouthWest => "southwest",
            Direction::West => "west",
            Direction::NorthWest => "northwest",
        }
    }
}

/// One discrete input delivered to the environment per turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Move(Direction),
    PickUp,
    Search,
    Descend,
    Wait,
    Escape,
    /// Raw keystroke, used for prompt answers.
    Key(char),
}

impl Action {
    pub const RETURN: Action = Action::Key('\r');

    pub fn keystroke(self) -> char {
        match self {
            Action::Move(dir) => dir.key(),
            Action::PickUp => ',',
            Action::Search => 's',
            Action::Descend => '>',
            Action::Wait => '.',
            Action::Escape => '\x1b',
            Action::Key(key) => key,
        }
    }

    pub fn describe(self) -> String {
        match self {
            Action::Move(dir) => format!("move {}", dir.name()),
            Action::PickUp => "pick up".to_string(),
            Action::Search => "search".to_string(),
            Action::Descend => "descend".to_string(),
            Action::Wait => "wait".to_string(),
            Action::Escape => "escape".to_string(),
            Action::Key('\r') => "key <return>".to_string(),
            Action::Key(key) => format!("key '{}'", key),
        }
    }
}
