mod classifier;
mod frame;
mod status;

pub use classifier::{ClassifiedCell, ClassifiedFrame, FrameClassifier, PromptState, classify_glyph};
pub use frame::{Frame, FrameCell, MAP_TOP, MESSAGE_ROW, STATUS_ROWS, TERM_COLS, TERM_ROWS, color};
pub use status::{Status, StatusParser};
