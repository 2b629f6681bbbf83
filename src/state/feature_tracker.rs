use std::collections::HashMap;

use crate::infra::Position;
use crate::state::CellKind;

/// Dungeon features tracked per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    StairsUp,
    StairsDown,
    Fountain,
    Altar,
    Trap,
}

impl Feature {
    pub fn from_kind(kind: CellKind) -> Option<Feature> {
        match kind {
            CellKind::StairsUp => Some(Feature::StairsUp),
            CellKind::StairsDown => Some(Feature::StairsDown),
            CellKind::Fountain => Some(Feature::Fountain),
            CellKind::Altar => Some(Feature::Altar),
            CellKind::Trap => Some(Feature::Trap),
            _ => None,
        }
    }
}

/// Discovered feature positions, each recorded once in discovery order.
#[derive(Clone, Debug, Default)]
pub struct FeatureTracker {
    positions: HashMap<Feature, Vec<Position>>,
}

impl FeatureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a feature at `pos`. Returns false if it was already known.
    pub fn record(&mut self, feature: Feature, pos: Position) -> bool {
        let positions = self.positions.entry(feature).or_default();
        if positions.contains(&pos) {
            return false;
        }
        positions.push(pos);
        true
    }

    pub fn get_positions(&self, feature: Feature) -> &[Position] {
        self.positions
            .get(&feature)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}
