//! Diagnostic rendering.
//!
//! Errors render as ariadne reports when the offending source text is on
//! hand, and as plain one-liners otherwise. Warnings drain from the session
//! sink. The embedding harness is expected to print these and exit non-zero
//! on error.

use ariadne::{Label, Report, ReportKind, Source};
use orbit_common::{CompileError, Session, SourcePos};

/// Byte offset of a 1-based (line, column) position in `text`.
fn offset_of(text: &str, pos: &SourcePos) -> usize {
    let mut offset = 0usize;
    for (index, line) in text.split_inclusive('\n').enumerate() {
        if index + 1 == pos.line as usize {
            return offset + (pos.column as usize).saturating_sub(1);
        }
        offset += line.len();
    }
    offset
}

/// Render an error, with an ariadne span when the source is available.
pub fn render(error: &CompileError, source: Option<&str>) -> String {
    match (&error.pos, source) {
        (Some(pos), Some(text)) if pos.is_known() => {
            let at = offset_of(text, pos);
            let end = (at + 1).min(text.len().max(at + 1));
            let mut buffer = Vec::new();
            let report = Report::<std::ops::Range<usize>>::build(ReportKind::Error, at..end)
                .with_message(error.kind.to_string())
                .with_label(Label::new(at..end).with_message(format!("at {pos}")))
                .finish();
            match report.write(Source::from(text), &mut buffer) {
                Ok(()) => String::from_utf8_lossy(&buffer).into_owned(),
                Err(_) => format!("error: {error}"),
            }
        }
        _ => format!("error: {error}"),
    }
}

/// Drain and render the session's warnings, oldest first.
pub fn render_warnings(session: &Session) -> Vec<String> {
    session
        .take_warnings()
        .into_iter()
        .map(|(warning, pos)| match pos {
            Some(pos) if pos.is_known() => format!("warning: {warning} at {pos}"),
            _ => format!("warning: {warning}"),
        })
        .collect()
}
