use crate::infra::{MAP_HEIGHT, MAP_WIDTH, Position};

/// Terminal rows: one message line, the map, two status lines.
pub const TERM_ROWS: usize = 24;
pub const TERM_COLS: usize = 80;
pub const MESSAGE_ROW: usize = 0;
/// First terminal row of the map area.
pub const MAP_TOP: usize = 1;
pub const STATUS_ROWS: [usize; 2] = [22, 23];

/// Curses color indices as the game reports them.
pub mod color {
    pub const BLACK: u8 = 0;
    pub const RED: u8 = 1;
    pub const GREEN: u8 = 2;
    pub const BROWN: u8 = 3;
    pub const BLUE: u8 = 4;
    pub const MAGENTA: u8 = 5;
    pub const CYAN: u8 = 6;
    pub const GRAY: u8 = 7;
    pub const NO_COLOR: u8 = 8;
    pub const ORANGE: u8 = 9;
    pub const BRIGHT_GREEN: u8 = 10;
    pub const YELLOW: u8 = 11;
    pub const BRIGHT_BLUE: u8 = 12;
    pub const BRIGHT_MAGENTA: u8 = 13;
    pub const BRIGHT_CYAN: u8 = 14;
    pub const WHITE: u8 = 15;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameCell {
    pub glyph: char,
    pub color: u8,
}

impl FrameCell {
    pub const BLANK: FrameCell = FrameCell {
        glyph: ' ',
        color: color::GRAY,
    };

    pub fn new(glyph: char, color: u8) -> Self {
        Self { glyph, color }
    }
}

/// One observed terminal screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    cells: Vec<FrameCell>,
    /// Terminal (row, col) of the cursor, when the adapter knows it.
    pub cursor: Option<(usize, usize)>,
}

impl Frame {
    pub fn blank() -> Self {
        Self {
            cells: vec![FrameCell::BLANK; TERM_ROWS * TERM_COLS],
            cursor: None,
        }
    }

    pub fn get(&self, row: usize, col: usize) -> FrameCell {
        if row >= TERM_ROWS || col >= TERM_COLS {
            return FrameCell::BLANK;
        }
        self.cells[row * TERM_COLS + col]
    }

    pub fn set(&mut self, row: usize, col: usize, cell: FrameCell) {
        if row < TERM_ROWS && col < TERM_COLS {
            self.cells[row * TERM_COLS + col] = cell;
        }
    }

    /// Write `text` at the start of `row` in the default color, clearing the rest of the row.
    pub fn write_text(&mut self, row: usize, text: &str) {
        for col in 0..TERM_COLS {
            self.set(row, col, FrameCell::BLANK);
        }
        for (col, glyph) in text.chars().enumerate().take(TERM_COLS) {
            self.set(row, col, FrameCell::new(glyph, color::GRAY));
        }
    }

    pub fn row_text(&self, row: usize) -> String {
        let text: String = (0..TERM_COLS).map(|col| self.get(row, col).glyph).collect();
        text.trim_end().to_string()
    }

    /// Cell of the map area at a map coordinate.
    pub fn map_cell(&self, pos: Position) -> FrameCell {
        if !pos.in_bounds() {
            return FrameCell::BLANK;
        }
        self.get(pos.y as usize + MAP_TOP, pos.x as usize)
    }

    pub fn set_map_cell(&mut self, pos: Position, cell: FrameCell) {
        if pos.in_bounds() {
            self.set(pos.y as usize + MAP_TOP, pos.x as usize, cell);
        }
    }

    pub fn message(&self) -> String {
        self.row_text(MESSAGE_ROW)
    }

    pub fn status_lines(&self) -> [String; 2] {
        STATUS_ROWS.map(|row| self.row_text(row))
    }

    /// Map rows as text, used by transcripts.
    pub fn map_text(&self) -> Vec<String> {
        (0..MAP_HEIGHT as usize)
            .map(|y| self.row_text(y + MAP_TOP))
            .collect()
    }

    pub fn full_text(&self) -> String {
        (0..TERM_ROWS)
            .map(|row| self.row_text(row))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Map-area cursor position, if the cursor sits inside the map.
    pub fn map_cursor(&self) -> Option<Position> {
        let (row, col) = self.cursor?;
        if row < MAP_TOP || row >= MAP_TOP + MAP_HEIGHT as usize || col >= MAP_WIDTH as usize {
            return None;
        }
        Some(Position::new(col as i32, (row - MAP_TOP) as i32))
    }
}
