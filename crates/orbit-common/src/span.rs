use std::fmt;

use serde::Serialize;

/// A 1-based source position: file, line, column.
///
/// Every AST node and every reportable error carries one of these. The
/// frontend assigns positions during parsing; the backend only threads them
/// through to diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourcePos {
    /// Path of the source file, as the frontend reported it.
    pub file: String,
    /// 1-based line number. 0 means "unknown".
    pub line: u32,
    /// 1-based column number. 0 means "unknown".
    pub column: u32,
}

impl SourcePos {
    /// Create a position from file, line and column.
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// A placeholder position for synthesised nodes (extension output,
    /// bootstrap declarations).
    pub fn unknown() -> Self {
        Self {
            file: String::new(),
            line: 0,
            column: 0,
        }
    }

    /// Whether this position points at real source text.
    pub fn is_known(&self) -> bool {
        !self.file.is_empty() && self.line > 0
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        } else {
            write!(f, "<unknown>")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_known_position() {
        let pos = SourcePos::new("main.orb", 3, 14);
        assert_eq!(pos.to_string(), "main.orb:3:14");
        assert!(pos.is_known());
    }

    #[test]
    fn display_unknown_position() {
        let pos = SourcePos::unknown();
        assert_eq!(pos.to_string(), "<unknown>");
        assert!(!pos.is_known());
    }
}
