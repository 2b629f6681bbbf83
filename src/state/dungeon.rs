use std::collections::BTreeMap;

use tracing::info;

use crate::state::LevelMap;

/// All level maps seen during one run.
#[derive(Debug, Clone)]
pub struct DungeonTracker {
    levels: BTreeMap<i32, LevelMap>,
    current_depth: i32,
    max_depth: i32,
}

impl DungeonTracker {
    pub fn new(start_depth: i32) -> Self {
        let mut levels = BTreeMap::new();
        levels.insert(start_depth, LevelMap::new(start_depth));
        Self {
            levels,
            current_depth: start_depth,
            max_depth: start_depth,
        }
    }

    pub fn current_depth(&self) -> i32 {
        self.current_depth
    }

    pub fn max_depth(&self) -> i32 {
        self.max_depth
    }

    /// Switch to the depth reported by the status strip.
    /// Returns true if the depth changed.
    pub fn observe_depth(&mut self, depth: i32) -> bool {
        if depth == self.current_depth {
            return false;
        }
        info!("Depth changed from {} to {}", self.current_depth, depth);
        self.current_depth = depth;
        self.max_depth = self.max_depth.max(depth);
        self.levels
            .entry(depth)
            .or_insert_with(|| LevelMap::new(depth));
        true
    }

    pub fn current(&self) -> &LevelMap {
        // observe_depth always creates the entry it switches to
        &self.levels[&self.current_depth]
    }

    pub fn current_mut(&mut self) -> &mut LevelMap {
        self.levels
            .entry(self.current_depth)
            .or_insert_with(|| LevelMap::new(self.current_depth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::Position;

    #[test]
    fn test_levels_are_created_lazily_and_kept() {
        let mut dungeon = DungeonTracker::new(1);
        dungeon.current_mut().record_search(&Position::new(0, 0));

        assert!(dungeon.observe_depth(2));
        assert!(!dungeon.observe_depth(2));
        assert_eq!(dungeon.current().depth, 2);

        assert!(dungeon.observe_depth(1));
        assert_eq!(
            dungeon
                .current()
                .get(&Position::new(0, 0))
                .unwrap()
                .search_count,
            1
        );
        assert_eq!(dungeon.max_depth(), 2);
    }
}
