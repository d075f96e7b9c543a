//! Type records, scopes and API maps for the Orbit backend.
//!
//! These are the shared semantic structures the phases communicate through:
//! [`TypeRecord`] is the canonical description of a type, [`ScopeArena`]
//! owns the lexical environment tree, and [`ApiMap`] is the exportable
//! surface of one API together with its JSON wire format.

pub mod api_map;
pub mod scope;
pub mod ty;

pub use api_map::{ApiMap, ExportedMethod, ExportedType, SCHEMA_VERSION};
pub use scope::{ScopeArena, ScopeId};
pub use ty::{builtins, SignatureRecord, TypeRecord};
