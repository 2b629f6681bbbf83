mod agent_state;
mod cell;
mod dungeon;
mod feature_tracker;
mod level_map;

pub use agent_state::{AgentState, PendingMove};
pub use cell::{CellKind, ItemRef, MonsterRef, TrackedCell};
pub use dungeon::DungeonTracker;
pub use feature_tracker::{Feature, FeatureTracker};
pub use level_map::{LevelMap, SearchCandidate};
