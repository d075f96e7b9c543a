//! The Orbit AST: one owning arena of tagged expression nodes plus the
//! annotation store phases communicate through.
//!
//! The frontend allocates nodes via [`Ast::alloc`]; the backend reads kinds,
//! attaches annotations, and rewrites child slots through phase extensions.

pub mod annotation;
pub mod expr;

pub use annotation::{keys, Annotation, MetaValue};
pub use expr::{Ast, BinaryOp, ExprId, ExprKind, Expression, UnaryOp};
