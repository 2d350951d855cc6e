//! Span-based source rewriting
//!
//! Rewriters never rebuild module text by hand; they collect replacement
//! spans and let the editor splice them into the original source in one pass.
//! Spans must not overlap — overlap means two rewrites disagree about the
//! same text, which is a configuration error, never something to merge
//! silently.

use crate::error::{BuildError, BuildResult};

/// One replacement: a half-open `(start_line, start_col)..(stop_line,
/// stop_col)` region of the original text and the text to put there.
/// Lines and columns are zero-indexed; columns are byte offsets.
#[derive(Debug, Clone)]
pub struct CodeRange {
    pub start_line: usize,
    pub start_col: usize,
    pub stop_line: usize,
    pub stop_col: usize,
    pub replacement: String,
}

impl CodeRange {
    /// Create a range, rejecting inverted positions up front.
    pub fn new(
        start_line: usize,
        start_col: usize,
        stop_line: usize,
        stop_col: usize,
        replacement: impl Into<String>,
    ) -> BuildResult<Self> {
        if (start_line, start_col) > (stop_line, stop_col) {
            return Err(BuildError::config(
                "code range has inverted start/stop positions",
            ));
        }
        Ok(Self {
            start_line,
            start_col,
            stop_line,
            stop_col,
            replacement: replacement.into(),
        })
    }

    fn start(&self) -> (usize, usize) {
        (self.start_line, self.start_col)
    }

    fn stop(&self) -> (usize, usize) {
        (self.stop_line, self.stop_col)
    }
}

/// Applies a set of non-overlapping replacement spans to one module's source.
#[derive(Debug, Default)]
pub struct SourceEditor {
    ranges: Vec<CodeRange>,
}

impl SourceEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a replacement span.
    pub fn push(&mut self, range: CodeRange) {
        self.ranges.push(range);
    }

    /// Whether any spans were queued.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Splice the queued replacements into `source`, left to right.
    ///
    /// Fails fast on overlapping spans before producing any text. The result
    /// always ends with a line terminator.
    pub fn apply(&self, source: &str) -> BuildResult<String> {
        let mut ranges: Vec<&CodeRange> = self.ranges.iter().collect();
        ranges.sort_by_key(|range| (range.start(), range.stop()));
        for pair in ranges.windows(2) {
            if pair[0].stop() > pair[1].start() {
                return Err(BuildError::config(
                    "overlapping source edits are not allowed",
                ));
            }
        }

        let lines: Vec<&str> = source.split_inclusive('\n').collect();
        let mut output = String::with_capacity(source.len());
        let mut cursor = (0usize, 0usize);
        for range in ranges {
            emit_segment(&lines, cursor, range.start(), &mut output);
            output.push_str(&range.replacement);
            cursor = range.stop();
        }
        emit_tail(&lines, cursor, &mut output);

        if !output.ends_with('\n') {
            output.push('\n');
        }
        Ok(output)
    }
}

/// Copy the original text between `from` (inclusive) and `to` (exclusive).
fn emit_segment(lines: &[&str], from: (usize, usize), to: (usize, usize), output: &mut String) {
    let (from_line, from_col) = from;
    let (to_line, to_col) = to;
    if from_line >= lines.len() {
        return;
    }
    let last = to_line.min(lines.len() - 1);
    for index in from_line..=last {
        let mut line = lines[index];
        if index == to_line {
            line = &line[..to_col.min(line.len())];
        }
        let start = if index == from_line {
            from_col.min(line.len())
        } else {
            0
        };
        output.push_str(&line[start..]);
    }
}

/// Copy everything from `from` to the end of the original text.
fn emit_tail(lines: &[&str], from: (usize, usize), output: &mut String) {
    let (from_line, from_col) = from;
    for (index, line) in lines.iter().enumerate().skip(from_line) {
        let start = if index == from_line {
            from_col.min(line.len())
        } else {
            0
        };
        output.push_str(&line[start..]);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn range(
        start: (usize, usize),
        stop: (usize, usize),
        replacement: &str,
    ) -> CodeRange {
        CodeRange::new(start.0, start.1, stop.0, stop.1, replacement).expect("valid range")
    }

    #[test]
    fn splices_non_overlapping_spans_left_to_right() {
        let mut editor = SourceEditor::new();
        editor.push(range((0, 0), (0, 1), "X"));
        editor.push(range((0, 3), (0, 4), "Y"));
        assert_eq!(editor.apply("abcdef").expect("clean apply"), "XbcYef\n");
    }

    #[test]
    fn spans_may_arrive_out_of_order() {
        let mut editor = SourceEditor::new();
        editor.push(range((0, 3), (0, 4), "Y"));
        editor.push(range((0, 0), (0, 1), "X"));
        assert_eq!(editor.apply("abcdef").expect("clean apply"), "XbcYef\n");
    }

    #[test]
    fn rejects_overlapping_spans_before_producing_text() {
        let mut editor = SourceEditor::new();
        editor.push(range((0, 0), (0, 3), "X"));
        editor.push(range((0, 2), (0, 4), "Y"));
        let err = editor.apply("abcdef").expect_err("overlap is fatal");
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn touching_spans_are_not_overlapping() {
        let mut editor = SourceEditor::new();
        editor.push(range((0, 0), (0, 2), "X"));
        editor.push(range((0, 2), (0, 4), "Y"));
        assert_eq!(editor.apply("abcdef").expect("clean apply"), "XYef\n");
    }

    #[test]
    fn spans_may_cross_lines() {
        let mut editor = SourceEditor::new();
        editor.push(range((0, 2), (1, 1), "-"));
        assert_eq!(editor.apply("ab__\n_cd\nef\n").expect("clean apply"), "ab-cd\nef\n");
    }

    #[test]
    fn appends_missing_line_terminator() {
        let editor = SourceEditor::new();
        assert_eq!(editor.apply("x = 1").expect("clean apply"), "x = 1\n");
    }

    #[test]
    fn preserves_text_with_no_spans() {
        let editor = SourceEditor::new();
        assert_eq!(editor.apply("x = 1\n").expect("clean apply"), "x = 1\n");
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(CodeRange::new(2, 0, 1, 0, "X").is_err());
    }
}
