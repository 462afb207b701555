//! Source locations attached to diagnostics.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A location inside a module file, used to point diagnostics at the
/// declaration that caused them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    /// File the declaration lives in.
    pub filename: PathBuf,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
}

impl SourceRange {
    /// Create a range pointing at `line`:`column` of `filename`.
    pub fn new(filename: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            filename: filename.into(),
            line,
            column,
        }
    }

    /// Translate a byte offset into `text` into a line/column position.
    ///
    /// Offsets past the end of `text` are clamped to its end.
    pub fn from_offset(filename: &Path, text: &str, offset: usize) -> Self {
        let mut offset = offset.min(text.len());
        while !text.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &text[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Self::new(filename, line, column)
    }
}

impl std::fmt::Display for SourceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{},{}", self.filename.display(), self.line, self.column)
    }
}
