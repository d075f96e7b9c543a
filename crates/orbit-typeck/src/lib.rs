//! The semantic phases of the Orbit backend.
//!
//! Four of the five pipeline stages live here: dependency ordering
//! ([`DependencyGraph`]), API-map extraction ([`TypeExtractor`]), scoped
//! type resolution ([`TypeResolver`]) and verification ([`TypeChecker`]),
//! together with the phase-extension registries they execute.
//!
//! The artifact structs below are the values flowing between stages; each
//! stage consumes the previous one's output by value, so the AST arena moves
//! through the pipeline without shared mutable state.

pub mod check;
pub mod deps;
pub mod extension;
pub mod extract;
pub mod resolve;

use orbit_ast::{Ast, ExprId};
use orbit_common::IrArtifact;
use orbit_types::{ApiMap, ScopeArena};

pub use check::TypeChecker;
pub use deps::DependencyGraph;
pub use extract::{
    CompiledImport, ImportResolver, NoImports, ResolvedImport, TypeExtractor,
};
pub use resolve::TypeResolver;

/// The frontend's output: an arena and its root expression.
pub struct ParsedProgram {
    pub ast: Ast,
    pub root: ExprId,
}

/// After dependency ordering: APIs listed dependencies-first.
#[derive(Debug)]
pub struct OrderedProgram {
    pub ast: Ast,
    pub apis: Vec<ExprId>,
}

/// After extraction: one API map per API, plus IR collected from
/// recursively compiled imports.
#[derive(Debug)]
pub struct ExtractedProgram {
    pub ast: Ast,
    pub apis: Vec<ExprId>,
    pub api_maps: Vec<ApiMap>,
    pub foreign_ir: Vec<IrArtifact>,
}

/// After resolution: the annotated arena and the scope tree it refers to.
#[derive(Debug)]
pub struct ResolvedProgram {
    pub ast: Ast,
    pub apis: Vec<ExprId>,
    pub api_maps: Vec<ApiMap>,
    pub scopes: ScopeArena,
    pub foreign_ir: Vec<IrArtifact>,
}
