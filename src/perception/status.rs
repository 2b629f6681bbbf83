use crate::perception::frame::Frame;

/// Fields read from the bottom status strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub depth: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub xp_level: i32,
    /// Game turn counter, when the strip shows one.
    pub turn: Option<u64>,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            depth: 1,
            hp: 1,
            max_hp: 1,
            xp_level: 1,
            turn: None,
        }
    }
}

impl Status {
    pub fn hp_ratio(&self) -> f32 {
        if self.max_hp <= 0 {
            return 1.0;
        }
        (self.hp as f32 / self.max_hp as f32).clamp(0.0, 1.0)
    }
}

/// Parses the status strip, keeping the last known value of any field it
/// cannot find in the current frame.
#[derive(Debug, Clone, Default)]
pub struct StatusParser {
    last: Status,
}

impl StatusParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Status {
        self.last
    }

    pub fn parse(&mut self, frame: &Frame) -> Status {
        let text = frame.status_lines().join(" ");
        let mut status = Status {
            turn: None,
            ..self.last
        };

        for token in text.split_whitespace() {
            if let Some(value) = token.strip_prefix("Dlvl:") {
                if let Some(depth) = leading_number(value) {
                    status.depth = depth;
                }
            } else if let Some(value) = token.strip_prefix("HP:") {
                if let Some((hp, max_hp)) = parse_pair(value) {
                    status.hp = hp;
                    status.max_hp = max_hp;
                }
            } else if let Some(value) = token
                .strip_prefix("Xp:")
                .or_else(|| token.strip_prefix("Exp:"))
            {
                if let Some(level) = leading_number(value) {
                    status.xp_level = level;
                }
            } else if let Some(value) = token.strip_prefix("T:") {
                status.turn = leading_number(value).map(|turn: i64| turn.max(0) as u64);
            }
        }

        self.last = status;
        status
    }
}

fn leading_number<T: std::str::FromStr>(text: &str) -> Option<T> {
    let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Parses `12(14)` into (12, 14).
fn parse_pair(text: &str) -> Option<(i32, i32)> {
    let (current, rest) = text.split_once('(')?;
    let current = current.parse().ok()?;
    let max = leading_number(rest)?;
    Some((current, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_status(line1: &str, line2: &str) -> Frame {
        let mut frame = Frame::blank();
        frame.write_text(22, line1);
        frame.write_text(23, line2);
        frame
    }

    #[test]
    fn test_parse_full_status() {
        let mut parser = StatusParser::new();
        let frame = frame_with_status(
            "Agent the Stripling   St:16 Dx:14 Co:17 In:8 Wi:9 Ch:7 Neutral",
            "Dlvl:3 $:42 HP:9(16) Pw:2(2) AC:6 Xp:2/31 T:812",
        );
        let status = parser.parse(&frame);
        assert_eq!(status.depth, 3);
        assert_eq!(status.hp, 9);
        assert_eq!(status.max_hp, 16);
        assert_eq!(status.xp_level, 2);
        assert_eq!(status.turn, Some(812));
        assert!((status.hp_ratio() - 0.5625).abs() < 1e-6);
    }

    #[test]
    fn test_missing_fields_keep_previous_values() {
        let mut parser = StatusParser::new();
        parser.parse(&frame_with_status("", "Dlvl:5 HP:20(20) Exp:4"));
        let status = parser.parse(&frame_with_status("", "garbled"));
        assert_eq!(status.depth, 5);
        assert_eq!(status.max_hp, 20);
        assert_eq!(status.xp_level, 4);
        assert_eq!(status.turn, None);
    }
}
