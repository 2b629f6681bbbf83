/// Closed set of cell categories a map cell can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    Floor,
    Corridor,
    DoorOpen,
    DoorClosed,
    Wall,
    /// Solid rock or nothing displayed.
    Stone,
    StairsUp,
    StairsDown,
    Fountain,
    Altar,
    Throne,
    Grave,
    Trap,
    Gold,
    Item,
    Monster,
    Player,
}

impl CellKind {
    pub fn is_walkable(self) -> bool {
        match self {
            CellKind::Floor
            | CellKind::Corridor
            | CellKind::DoorOpen
            | CellKind::DoorClosed
            | CellKind::StairsUp
            | CellKind::StairsDown
            | CellKind::Fountain
            | CellKind::Altar
            | CellKind::Throne
            | CellKind::Grave
            | CellKind::Trap
            | CellKind::Gold
            | CellKind::Item
            | CellKind::Monster
            | CellKind::Player => true,
            CellKind::Wall | CellKind::Stone => false,
        }
    }

    pub fn is_door(self) -> bool {
        matches!(self, CellKind::DoorOpen | CellKind::DoorClosed)
    }

    /// Dungeon features worth remembering by coordinate.
    pub fn is_feature(self) -> bool {
        matches!(
            self,
            CellKind::StairsUp
                | CellKind::StairsDown
                | CellKind::Fountain
                | CellKind::Altar
                | CellKind::Trap
        )
    }
}

/// A monster seen on a cell during the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonsterRef {
    pub glyph: char,
    pub color: u8,
}

/// An object seen on a cell during the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRef {
    pub glyph: char,
    pub color: u8,
}

/// Remembered state of one map cell on one level.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedCell {
    pub glyph: char,
    pub color: u8,
    kind: CellKind,
    walkable: bool,
    pub explored: bool,
    pub stale: bool,
    pub last_seen_turn: u64,
    pub monster: Option<MonsterRef>,
    pub items: Vec<ItemRef>,
    pub search_count: u32,
}

impl TrackedCell {
    pub fn unexplored() -> Self {
        Self {
            glyph: ' ',
            color: 0,
            kind: CellKind::Stone,
            walkable: false,
            explored: false,
            stale: false,
            last_seen_turn: 0,
            monster: None,
            items: Vec::new(),
            search_count: 0,
        }
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn walkable(&self) -> bool {
        self.walkable
    }

    /// Change the classified kind; walkability always follows it.
    pub fn set_kind(&mut self, kind: CellKind) {
        self.kind = kind;
        self.walkable = kind.is_walkable();
    }

    pub fn is_explored_walkable(&self) -> bool {
        self.explored && self.walkable
    }
}

impl Default for TrackedCell {
    fn default() -> Self {
        Self::unexplored()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walkable_follows_kind() {
        let mut cell = TrackedCell::unexplored();
        assert!(!cell.walkable());
        cell.set_kind(CellKind::Corridor);
        assert!(cell.walkable());
        cell.set_kind(CellKind::Wall);
        assert!(!cell.walkable());
        cell.set_kind(CellKind::DoorClosed);
        assert!(cell.walkable());
    }

    #[test]
    fn test_feature_and_door_sets() {
        assert!(CellKind::StairsDown.is_feature());
        assert!(CellKind::Trap.is_feature());
        assert!(!CellKind::Throne.is_feature());
        assert!(CellKind::DoorOpen.is_door());
        assert!(!CellKind::Floor.is_door());
    }
}
