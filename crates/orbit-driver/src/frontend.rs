//! The frontend seam.
//!
//! Lexing and parsing are external to the backend: an embedding supplies a
//! [`Frontend`] and the driver calls it whenever a source import has to be
//! compiled recursively.

use std::path::Path;

use orbit_common::CompileError;
use orbit_typeck::ParsedProgram;

/// An external parser producing the backend's input.
pub trait Frontend {
    /// Parse `source` (read from `path`) into an arena and root expression.
    fn parse(&self, path: &Path, source: &str) -> Result<ParsedProgram, CompileError>;
}
