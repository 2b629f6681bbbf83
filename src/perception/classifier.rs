use crate::infra::{MAP_HEIGHT, MAP_WIDTH, Position};
use crate::perception::frame::{Frame, FrameCell, color};
use crate::state::CellKind;

const MORE_MARKER: &str = "--More--";
const YES_NO_MARKERS: [&str; 3] = ["[yn", "(yn)", "[ynaq"];
const TEXT_PROMPT_PREFIXES: [&str; 8] = [
    "What do you want",
    "In what direction",
    "Call ",
    "Name ",
    "What type of",
    "Pick up what",
    "Which ",
    "Where do you want",
];

/// What the message line is currently asking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptState {
    None,
    More,
    YesNo(String),
    Text(String),
}

impl PromptState {
    pub fn is_blocking(&self) -> bool {
        !matches!(self, PromptState::None)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            PromptState::YesNo(text) | PromptState::Text(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedCell {
    pub glyph: char,
    pub color: u8,
    pub kind: CellKind,
}

/// Typed view of one frame's map area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFrame {
    cells: Vec<ClassifiedCell>,
    pub player: Option<Position>,
    pub prompt: PromptState,
    pub message: String,
}

impl ClassifiedFrame {
    pub fn cell(&self, pos: Position) -> Option<&ClassifiedCell> {
        if !pos.in_bounds() {
            return None;
        }
        self.cells.get((pos.y * MAP_WIDTH + pos.x) as usize)
    }

    /// Map cells in row-major order with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (Position, &ClassifiedCell)> {
        self.cells.iter().enumerate().map(|(idx, cell)| {
            let idx = idx as i32;
            (Position::new(idx % MAP_WIDTH, idx / MAP_WIDTH), cell)
        })
    }

    pub fn monsters(&self) -> Vec<(Position, ClassifiedCell)> {
        self.iter()
            .filter(|(_, cell)| cell.kind == CellKind::Monster)
            .map(|(pos, cell)| (pos, *cell))
            .collect()
    }
}

/// Resolve one displayed glyph to a cell category.
///
/// Color only matters for glyphs that are drawn the same for different things.
pub fn classify_glyph(glyph: char, color: u8) -> CellKind {
    match glyph {
        ' ' => CellKind::Stone,
        '.' | '·' => {
            if color == color::BROWN {
                // doorless doorway / broken door
                CellKind::DoorOpen
            } else {
                CellKind::Floor
            }
        }
        '#' => match color {
            color::GREEN | color::BRIGHT_GREEN => CellKind::Wall, // tree
            color::CYAN | color::BRIGHT_CYAN => CellKind::Wall,   // iron bars
            _ => CellKind::Corridor,
        },
        '|' | '-' => match color {
            color::BROWN => CellKind::DoorOpen,
            color::WHITE if glyph == '|' => CellKind::Grave,
            _ => CellKind::Wall,
        },
        '─' | '│' | '┌' | '┐' | '└' | '┘' | '├' | '┤' | '┬' | '┴' | '┼' => CellKind::Wall,
        '+' => {
            if color == color::BROWN || color == color::YELLOW {
                CellKind::DoorClosed
            } else {
                // spellbook
                CellKind::Item
            }
        }
        '<' => CellKind::StairsUp,
        '>' => CellKind::StairsDown,
        '{' => CellKind::Fountain,
        '_' => CellKind::Altar,
        '\\' => CellKind::Throne,
        '^' => CellKind::Trap,
        '$' => CellKind::Gold,
        ')' | '[' | '%' | '?' | '/' | '=' | '!' | '(' | '"' | '*' | '`' | '0' => CellKind::Item,
        '@' | '&' | ';' | ':' | '\'' | '~' => CellKind::Monster,
        c if c.is_ascii_alphabetic() => CellKind::Monster,
        _ => CellKind::Stone,
    }
}

/// Stateless frame classifier.
pub struct FrameClassifier;

impl FrameClassifier {
    #[tracing::instrument(level = "trace", skip(frame))]
    pub fn classify(frame: &Frame) -> ClassifiedFrame {
        let player = Self::locate_player(frame);

        let mut cells = Vec::with_capacity((MAP_WIDTH * MAP_HEIGHT) as usize);
        for y in 0..MAP_HEIGHT {
            for x in 0..MAP_WIDTH {
                let pos = Position::new(x, y);
                let FrameCell { glyph, color } = frame.map_cell(pos);
                let kind = if Some(pos) == player {
                    CellKind::Player
                } else {
                    classify_glyph(glyph, color)
                };
                cells.push(ClassifiedCell { glyph, color, kind });
            }
        }

        let message = frame.message();
        ClassifiedFrame {
            cells,
            player,
            prompt: Self::detect_prompt(frame, &message),
            message,
        }
    }

    fn locate_player(frame: &Frame) -> Option<Position> {
        if let Some(pos) = frame.map_cursor()
            && frame.map_cell(pos).glyph == '@'
        {
            return Some(pos);
        }

        let mut first_at = None;
        for y in 0..MAP_HEIGHT {
            for x in 0..MAP_WIDTH {
                let pos = Position::new(x, y);
                let cell = frame.map_cell(pos);
                if cell.glyph != '@' {
                    continue;
                }
                if matches!(cell.color, color::GRAY | color::WHITE | color::NO_COLOR) {
                    return Some(pos);
                }
                first_at.get_or_insert(pos);
            }
        }
        first_at
    }

    fn detect_prompt(frame: &Frame, message: &str) -> PromptState {
        if frame.full_text().contains(MORE_MARKER) {
            return PromptState::More;
        }
        if YES_NO_MARKERS.iter().any(|marker| message.contains(marker)) {
            return PromptState::YesNo(message.to_string());
        }
        if TEXT_PROMPT_PREFIXES
            .iter()
            .any(|prefix| message.starts_with(prefix))
        {
            return PromptState::Text(message.to_string());
        }
        PromptState::None
    }
}
