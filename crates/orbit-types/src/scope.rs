//! Lexical scopes.
//!
//! Scopes form a tree owned by a [`ScopeArena`]; a scope refers to its
//! parent by [`ScopeId`], so the tree has no reference cycles and scopes can
//! be handed around as plain copyable ids. Each scope carries value bindings,
//! a list of declared types, and an alias map.

use orbit_common::{CompileError, ErrorKind};
use rustc_hash::FxHashMap;

use crate::ty::{builtins, TypeRecord};

/// Index of a scope within its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

/// One lexical environment.
#[derive(Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    /// Value bindings, name -> type record. Declaration order is irrelevant
    /// for lookup but redeclaration within one scope is an error.
    bindings: FxHashMap<String, TypeRecord>,
    /// Types declared or made visible at this level.
    types: Vec<TypeRecord>,
    /// Aliases introduced at this level, short name -> aliased record.
    aliases: FxHashMap<String, TypeRecord>,
}

/// Owns every scope of one compilation.
///
/// Index 0 is always the global scope holding the bootstrap types; it is
/// built once by [`ScopeArena::new`] and never mutated afterwards.
#[derive(Debug)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    /// Create an arena whose root is the bootstrap global scope.
    pub fn new() -> Self {
        let global = Scope {
            parent: None,
            bindings: FxHashMap::default(),
            types: builtins::all(),
            aliases: FxHashMap::default(),
        };
        Self {
            scopes: vec![global],
        }
    }

    /// The global scope id.
    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Push a fresh child scope.
    pub fn push(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: Some(parent),
            ..Scope::default()
        });
        id
    }

    fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    /// Bind a value name in `scope`. Rebinding the same name in the same
    /// scope is an error; shadowing an outer scope is fine.
    pub fn bind(
        &mut self,
        scope: ScopeId,
        name: impl Into<String>,
        record: TypeRecord,
    ) -> Result<(), CompileError> {
        let name = name.into();
        let bindings = &mut self.scope_mut(scope).bindings;
        if bindings.contains_key(&name) {
            return Err(CompileError::new(ErrorKind::RedeclaredName(name)));
        }
        bindings.insert(name, record);
        Ok(())
    }

    /// Look up a value binding, innermost scope outward.
    pub fn lookup_binding(&self, scope: ScopeId, name: &str) -> Result<&TypeRecord, CompileError> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.scope(id);
            if let Some(record) = s.bindings.get(name) {
                return Ok(record);
            }
            current = s.parent;
        }
        Err(CompileError::new(ErrorKind::UnboundName(name.to_string())))
    }

    /// Declare a type at this level.
    pub fn declare_type(&mut self, scope: ScopeId, record: TypeRecord) {
        self.scope_mut(scope).types.push(record);
    }

    /// Introduce an alias: `short` resolves to `target` from this scope in.
    pub fn add_alias(&mut self, scope: ScopeId, short: impl Into<String>, target: TypeRecord) {
        self.scope_mut(scope).aliases.insert(short.into(), target);
    }

    /// Resolve a type name.
    ///
    /// Aliases win, innermost first. Otherwise the whole chain's type lists
    /// are filtered by short *or* full name; several matches are admissible
    /// only when they all share one full name (the same record seen through
    /// different paths).
    pub fn find_type(&self, scope: ScopeId, name: &str) -> Result<TypeRecord, CompileError> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.scope(id);
            if let Some(target) = s.aliases.get(name) {
                return Ok(target.clone());
            }
            current = s.parent;
        }

        let mut matches: Vec<&TypeRecord> = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.scope(id);
            for record in &s.types {
                if record.short_name() == name || record.full_name() == name {
                    matches.push(record);
                }
            }
            current = s.parent;
        }

        match matches.len() {
            0 => Err(CompileError::new(ErrorKind::UnknownType(name.to_string()))),
            1 => Ok(matches[0].clone()),
            _ => {
                let first_full = matches[0].full_name();
                if matches.iter().all(|m| m.full_name() == first_full) {
                    Ok(matches[0].clone())
                } else {
                    let candidates = matches.iter().map(|m| m.full_name()).collect();
                    Err(CompileError::new(ErrorKind::AmbiguousType {
                        name: name.to_string(),
                        candidates,
                    }))
                }
            }
        }
    }

    /// Number of scopes in the arena.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}
