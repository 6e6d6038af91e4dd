use std::io::{BufRead, Write};

use crate::model::task::{DateRange, Task};
use crate::ops::conflict::DateConflict;
use crate::ops::resolve::{ConflictPrompt, Resolution};

/// Asks on a terminal how to settle a date conflict. Anything other than
/// `w`/`widen` or `c`/`clamp` (including end of input) cancels.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
    /// The subtask dates being saved, shown next to the suggestions
    pub requested: DateRange,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        LinePrompt {
            input,
            output,
            requested: DateRange::default(),
        }
    }
}

impl<R: BufRead, W: Write> ConflictPrompt for LinePrompt<R, W> {
    fn choose(&mut self, parent: &Task, conflict: &DateConflict) -> Resolution {
        let widened = conflict.widened_parent(parent.dates());
        let clamped = conflict.clamped_subtask(self.requested);
        let kind = conflict
            .conflict_type
            .map(|t| t.describe())
            .unwrap_or("dates conflict");
        // Terminal write errors fall through to reading, which then cancels
        let _ = writeln!(self.output, "{} ({}: {})", kind, parent.id, parent.title);
        let _ = writeln!(
            self.output,
            "  [w]iden parent to {}",
            super::output::format_range(widened)
        );
        let _ = writeln!(
            self.output,
            "  [c]lamp subtask to {}",
            super::output::format_range(clamped)
        );
        let _ = write!(self.output, "  anything else cancels > ");
        let _ = self.output.flush();

        let mut line = String::new();
        if self.input.read_line(&mut line).is_err() {
            return Resolution::Cancel;
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "w" | "widen" => Resolution::WidenParent,
            "c" | "clamp" => Resolution::ClampSubtask,
            _ => Resolution::Cancel,
        }
    }
}

/// Stdin is not a terminal and no `--resolve` was given: cancel.
pub struct NoTerminal;

impl ConflictPrompt for NoTerminal {
    fn choose(&mut self, parent: &Task, _conflict: &DateConflict) -> Resolution {
        tracing::warn!(parent_id = %parent.id, "date conflict needs --resolve when stdin is not a terminal");
        Resolution::Cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::conflict::validate_date_conflict;
    use chrono::NaiveDate;

    fn range(start: u32, due: u32) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, start),
            NaiveDate::from_ymd_opt(2024, 1, due),
        )
    }

    fn ask(answer: &str) -> (Resolution, String) {
        let mut parent = Task::new("T-001", "Paint the shed");
        parent.start_date = NaiveDate::from_ymd_opt(2024, 1, 10);
        parent.due_date = NaiveDate::from_ymd_opt(2024, 1, 20);
        let requested = range(5, 15);
        let conflict = validate_date_conflict(requested, parent.dates());

        let mut out = Vec::new();
        let mut prompt = LinePrompt::new(answer.as_bytes(), &mut out);
        prompt.requested = requested;
        let choice = prompt.choose(&parent, &conflict);
        (choice, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_answers() {
        assert_eq!(ask("w\n").0, Resolution::WidenParent);
        assert_eq!(ask("Clamp\n").0, Resolution::ClampSubtask);
        assert_eq!(ask("n\n").0, Resolution::Cancel);
        assert_eq!(ask("").0, Resolution::Cancel);
    }

    #[test]
    fn test_shows_both_suggestions() {
        let (_, shown) = ask("\n");
        assert!(shown.contains("T-001: Paint the shed"));
        assert!(shown.contains("[w]iden parent to 2024-01-05 .. 2024-01-20"));
        assert!(shown.contains("[c]lamp subtask to 2024-01-10 .. 2024-01-15"));
    }
}
