use std::fmt;

use crate::span::SourcePos;

/// A fatal compilation error: what went wrong, and where (when known).
///
/// Phases short-circuit on the first error and propagate it unchanged, so a
/// single value is enough; there is no error accumulation in the core.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub pos: Option<SourcePos>,
}

impl CompileError {
    /// An error with no position (structural and driver-level failures).
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, pos: None }
    }

    /// An error anchored at a source position.
    pub fn at(kind: ErrorKind, pos: SourcePos) -> Self {
        Self {
            kind,
            pos: Some(pos),
        }
    }

    /// Attach a position if the error does not already carry one.
    ///
    /// Used by callers that know the enclosing node when an inner lookup
    /// failed without location information.
    pub fn or_at(mut self, pos: &SourcePos) -> Self {
        if self.pos.is_none() && pos.is_known() {
            self.pos = Some(pos.clone());
        }
        self
    }
}

/// The specific kind of compilation error.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // ── Structural ───────────────────────────────────────────────────
    /// A serialised API map is missing a required key.
    MissingApiMapKey(String),
    /// A serialised API map declares a schema version this reader rejects.
    UnsupportedApiMapVersion(u64),
    /// A serialised API map is present but structurally invalid.
    MalformedApiMap(String),
    /// An annotation under a phase's namespace names no registered extension.
    UnknownExtension { phase: String, name: String },
    /// An extension was invoked with the wrong number of parameters.
    BadExtensionArity {
        extension: String,
        expected: usize,
        actual: usize,
    },
    /// An extension parameter had the wrong expression kind.
    BadExtensionParam {
        extension: String,
        index: usize,
        expected: String,
    },

    // ── Dependency ───────────────────────────────────────────────────
    /// The local import graph contains a cycle; the chain ends with the
    /// repeated name.
    CircularDependency(Vec<String>),
    /// A `with` import could not be resolved locally or on disk.
    DependencyNotFound(String),
    /// A `with` import resolved to files in more than one search root.
    AmbiguousDependency { name: String, candidates: Vec<String> },

    // ── Types ────────────────────────────────────────────────────────
    /// No type with this name is visible.
    UnknownType(String),
    /// A second type with the same full name was declared.
    DuplicateType(String),
    /// Several distinct types match this name.
    AmbiguousType { name: String, candidates: Vec<String> },
    /// No value binding with this name is in scope.
    UnboundName(String),
    /// A name was bound twice in the same scope.
    RedeclaredName(String),
    /// The declared type of an assignment does not match its value.
    AssignmentTypeMismatch { declared: String, actual: String },
    /// A call names a method that does not exist.
    UnknownMethod(String),
    /// A constructor call has the wrong number of arguments.
    ConstructorArityMismatch {
        type_name: String,
        expected: usize,
        actual: usize,
    },
    /// A constructor argument does not match the corresponding member type.
    ConstructorArgTypeMismatch {
        index: usize,
        expected: String,
        actual: String,
    },
    /// No operator method is declared for these operand types.
    UnsupportedOperator { symbol: String, operands: Vec<String> },
    /// A statement kind the resolver does not accept at this position.
    UnsupportedStatement(String),
    /// A node the checker requires to be typed carries no type annotation.
    MissingAnnotation { node: String },
    /// Two annotations the checker requires to agree do not.
    AnnotationMismatch {
        context: String,
        expected: String,
        actual: String,
    },
    /// A method returns a trait adopted by more than one concrete type.
    TraitReturnAmbiguous {
        trait_name: String,
        implementers: Vec<String>,
    },

    // ── Codegen ──────────────────────────────────────────────────────
    /// No IR type is registered for this full name.
    IrTypeMissing(String),
    /// A call site references a function never declared in the module.
    IrFunctionMissing(String),
    /// A float alias width outside {16, 32, 64, 80, 128}.
    BadFloatWidth(u64),
    /// An executable compilation designated no entry point.
    MissingMain,
    /// The IR builder failed; carries the builder's own message.
    Codegen(String),

    // ── Driver ───────────────────────────────────────────────────────
    /// A filesystem operation failed.
    Io { path: String, message: String },
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiMapKey(key) => write!(f, "serialised API map is missing key `{key}`"),
            Self::UnsupportedApiMapVersion(v) => {
                write!(f, "unsupported API map schema version {v}")
            }
            Self::MalformedApiMap(detail) => write!(f, "malformed API map: {detail}"),
            Self::UnknownExtension { phase, name } => {
                write!(f, "no extension named `{name}` is registered for {phase}")
            }
            Self::BadExtensionArity {
                extension,
                expected,
                actual,
            } => write!(
                f,
                "extension `{extension}` takes {expected} parameter(s), found {actual}"
            ),
            Self::BadExtensionParam {
                extension,
                index,
                expected,
            } => write!(
                f,
                "extension `{extension}` expects {expected} as parameter {index}"
            ),
            Self::CircularDependency(chain) => {
                write!(f, "circular dependency: {}", chain.join(" -> "))
            }
            Self::DependencyNotFound(name) => write!(f, "dependency `{name}` not found"),
            Self::AmbiguousDependency { name, candidates } => write!(
                f,
                "dependency `{name}` matches multiple files: {}",
                candidates.join(", ")
            ),
            Self::UnknownType(name) => write!(f, "unknown type `{name}`"),
            Self::DuplicateType(name) => write!(f, "duplicate type `{name}`"),
            Self::AmbiguousType { name, candidates } => write!(
                f,
                "ambiguous type `{name}`; candidates: {}",
                candidates.join(", ")
            ),
            Self::UnboundName(name) => write!(f, "unbound name `{name}`"),
            Self::RedeclaredName(name) => {
                write!(f, "`{name}` is already bound in this scope")
            }
            Self::AssignmentTypeMismatch { declared, actual } => write!(
                f,
                "assignment declared `{declared}` but the value has type `{actual}`"
            ),
            Self::UnknownMethod(name) => write!(f, "unknown method `{name}`"),
            Self::ConstructorArityMismatch {
                type_name,
                expected,
                actual,
            } => write!(
                f,
                "constructor for `{type_name}` takes {expected} argument(s), found {actual}"
            ),
            Self::ConstructorArgTypeMismatch {
                index,
                expected,
                actual,
            } => write!(
                f,
                "constructor argument {index} expected `{expected}`, found `{actual}`"
            ),
            Self::UnsupportedOperator { symbol, operands } => write!(
                f,
                "no operator `{symbol}` is declared for ({})",
                operands.join(", ")
            ),
            Self::UnsupportedStatement(kind) => {
                write!(f, "unsupported statement: {kind}")
            }
            Self::MissingAnnotation { node } => {
                write!(f, "{node} carries no type annotation")
            }
            Self::AnnotationMismatch {
                context,
                expected,
                actual,
            } => write!(f, "{context}: expected `{expected}`, found `{actual}`"),
            Self::TraitReturnAmbiguous {
                trait_name,
                implementers,
            } => write!(
                f,
                "method returns trait `{trait_name}`, which is adopted by multiple types ({}); \
                 a trait return is only well-defined with a single adopter",
                implementers.join(", ")
            ),
            Self::IrTypeMissing(name) => write!(f, "no IR type registered for `{name}`"),
            Self::IrFunctionMissing(name) => {
                write!(f, "call to undeclared function `{name}`")
            }
            Self::BadFloatWidth(w) => write!(
                f,
                "invalid float width {w}; supported widths are 16, 32, 64, 80 and 128"
            ),
            Self::MissingMain => write!(f, "executable output requires an entry point"),
            Self::Codegen(message) => write!(f, "ir emission failed: {message}"),
            Self::Io { path, message } => write!(f, "{path}: {message}"),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pos {
            Some(pos) if pos.is_known() => write!(f, "{} at {}", self.kind, pos),
            _ => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for CompileError {}
