//! The compilation session.
//!
//! One [`Session`] is created per outer compilation and shared (read-only,
//! apart from the warning sink) with every phase, including recursive inner
//! compiles triggered by source imports.

use std::cell::RefCell;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use serde::Serialize;

use crate::span::SourcePos;

/// What the compilation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// A library of IR modules; no entry point required.
    Library,
    /// An executable; exactly one method must be designated as entry point.
    Executable,
}

/// Calling convention applied to every generated function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingConvention {
    /// The platform C convention.
    C,
    /// LLVM's fast internal convention.
    Fast,
}

impl CallingConvention {
    /// The LLVM numeric id for this convention.
    pub fn llvm_id(self) -> u32 {
        match self {
            Self::C => 0,
            Self::Fast => 8,
        }
    }
}

/// A non-fatal diagnostic pushed to the session sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Warning {
    /// An API lists itself in its own `with` clause; the edge is skipped.
    SelfImport { api: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfImport { api } => {
                write!(f, "API `{api}` imports itself; the import is ignored")
            }
        }
    }
}

/// Process-wide compilation state: read-only configuration plus a write-only
/// warning sink.
///
/// The session is threaded explicitly through every phase constructor; there
/// is no global mutable state anywhere in the backend.
pub struct Session {
    /// Directories probed when resolving `with` imports from disk.
    pub search_paths: Vec<PathBuf>,
    /// Library or executable output.
    pub output: OutputKind,
    /// Calling convention stamped onto generated functions.
    pub calling_convention: CallingConvention,
    warnings: RefCell<Vec<(Warning, Option<SourcePos>)>>,
}

impl Session {
    /// A library session with the given search paths.
    pub fn new(search_paths: Vec<PathBuf>) -> Rc<Self> {
        Rc::new(Self {
            search_paths,
            output: OutputKind::Library,
            calling_convention: CallingConvention::C,
            warnings: RefCell::new(Vec::new()),
        })
    }

    /// An executable session: codegen requires an entry point.
    pub fn executable(search_paths: Vec<PathBuf>) -> Rc<Self> {
        Rc::new(Self {
            search_paths,
            output: OutputKind::Executable,
            calling_convention: CallingConvention::C,
            warnings: RefCell::new(Vec::new()),
        })
    }

    /// Push a warning to the sink. Warnings never halt compilation.
    pub fn warn(&self, warning: Warning, pos: Option<SourcePos>) {
        log::warn!("{warning}");
        self.warnings.borrow_mut().push((warning, pos));
    }

    /// Drain all collected warnings, oldest first.
    pub fn take_warnings(&self) -> Vec<(Warning, Option<SourcePos>)> {
        self.warnings.borrow_mut().drain(..).collect()
    }

    /// Number of warnings currently in the sink.
    pub fn warning_count(&self) -> usize {
        self.warnings.borrow().len()
    }
}
