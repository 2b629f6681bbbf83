use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use time::format_description;
use tracing::warn;

use crate::game::GameSummary;
use crate::infra::{AgentConfig, AgentError, GameObserver};
use crate::perception::Frame;
use crate::planners::TurnOutcome;

/// Plain-text log of a run: the screen and the chosen action for every turn.
pub struct TranscriptFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl TranscriptFile {
    /// Create `<folder>/<label> - <YYYYmmdd-HHMMSS>.log`, making the folder if needed.
    pub fn new(folder: &str, label: &str) -> Result<Self, AgentError> {
        // The local offset is unavailable in some multi-threaded contexts
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let format =
            format_description::parse_borrowed::<2>("[year][month][day]-[hour][minute][second]")
                .map_err(|e| AgentError::Timestamp(e.to_string()))?;
        let date_time_str = now
            .format(format.as_slice())
            .map_err(|e| AgentError::Timestamp(e.to_string()))?;

        let path = Path::new(folder).join(format!("{} - {}.log", label, date_time_str));
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let writer = BufWriter::new(File::create(&path)?);
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_header(&mut self, label: &str, config: &AgentConfig) -> Result<(), AgentError> {
        writeln!(self.writer, "# run {}", label)?;
        writeln!(self.writer, "# seed {:?}, turn budget {:?}", config.seed, config.turn_budget)?;
        Ok(())
    }

    pub fn append_turn(&mut self, outcome: &TurnOutcome, frame: &Frame) -> Result<(), AgentError> {
        writeln!(
            self.writer,
            "=== turn {} depth {} rule {} action {} ({})",
            outcome.turn,
            outcome.depth,
            outcome.rule.name(),
            outcome.action.describe(),
            outcome.reason
        )?;
        let message = frame.message();
        if !message.trim().is_empty() {
            writeln!(self.writer, "{}", message.trim_end())?;
        }
        for row in frame.map_text() {
            writeln!(self.writer, "{}", row.trim_end())?;
        }
        for line in frame.status_lines() {
            writeln!(self.writer, "{}", line.trim_end())?;
        }
        Ok(())
    }

    pub fn append_summary(&mut self, summary: &GameSummary) -> Result<(), AgentError> {
        writeln!(
            self.writer,
            "# finished: {} after {} turns, deepest level {}",
            summary.reason.describe(),
            summary.turns,
            summary.max_depth
        )?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Observer that writes every turn to a [`TranscriptFile`].
pub struct TranscriptObserver {
    file: TranscriptFile,
}

impl TranscriptObserver {
    pub fn create(folder: &str, label: &str) -> Result<Self, AgentError> {
        Ok(Self {
            file: TranscriptFile::new(folder, label)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl GameObserver for TranscriptObserver {
    fn on_game_start(&mut self, label: &str, config: &AgentConfig) {
        if let Err(e) = self.file.append_header(label, config) {
            warn!("Transcript write failed: {}", e);
        }
    }

    fn on_new_level(&mut self, _depth: i32, _previous_depth: i32) {}

    fn on_turn(&mut self, outcome: &TurnOutcome, frame: &Frame) {
        if let Err(e) = self.file.append_turn(outcome, frame) {
            warn!("Transcript write failed: {}", e);
        }
    }

    fn on_game_finished(&mut self, summary: &GameSummary) {
        if let Err(e) = self.file.append_summary(summary) {
            warn!("Transcript write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::StopReason;
    use crate::infra::{Action, Position};
    use crate::perception::{MAP_TOP, Status};
    use crate::planners::DecisionRule;

    #[test]
    fn test_transcript_records_turns() {
        let folder = std::env::temp_dir().join(format!("delvebot-transcript-{}", std::process::id()));
        let folder = folder.to_string_lossy().to_string();
        let mut observer = TranscriptObserver::create(&folder, "unit").unwrap();

        let mut frame = Frame::blank();
        frame.write_text(MAP_TOP, "|.@.|");
        let outcome = TurnOutcome {
            turn: 4,
            depth: 1,
            position: Some(Position::new(2, 0)),
            status: Status::default(),
            rule: DecisionRule::Explore,
            action: Action::Search,
            reason: "testing".to_string(),
        };

        observer.on_game_start("unit", &AgentConfig::default());
        observer.on_turn(&outcome, &frame);
        observer.on_game_finished(&GameSummary {
            turns: 1,
            final_depth: 1,
            max_depth: 1,
            reason: StopReason::Inactive,
        });

        let path = observer.path().to_path_buf();
        let file_name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("unit - "));
        assert!(file_name.ends_with(".log"));

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("=== turn 4 depth 1 rule explore action search (testing)"));
        assert!(text.contains("|.@.|"));
        assert!(text.contains("# finished"));

        let _ = std::fs::remove_dir_all(&folder);
    }
}
