//! Phase extensions.
//!
//! Source-level annotations whose names fall under a phase's namespace are
//! executed by that phase: the registered extension receives the annotation
//! node and returns a replacement expression, and the parent's child slot is
//! rewritten by identity. Each phase owns a registry; the shared pieces here
//! are name claiming and parameter-shape checking.

use orbit_ast::{keys, Annotation, Ast, ExprId, ExprKind};
use orbit_common::{CompileError, ErrorKind, SourcePos};
use orbit_types::{ApiMap, ScopeArena, ScopeId, TypeRecord};

/// How a registry relates to an annotation name.
pub enum Claim<'a> {
    /// The name is under this phase's namespace; the suffix selects the
    /// extension (unknown suffixes are fatal).
    Namespaced(&'a str),
    /// The bare name matches a registered extension.
    Bare(&'a str),
    /// Another phase's annotation; leave it alone.
    NotOurs,
}

/// Classify `name` against a phase prefix and the set of registered names.
pub fn claim<'a>(phase_prefix: &str, registered: &[&str], name: &'a str) -> Claim<'a> {
    if let Some(suffix) = name
        .strip_prefix(phase_prefix)
        .and_then(|rest| rest.strip_prefix('.'))
    {
        Claim::Namespaced(suffix)
    } else if registered.contains(&name) {
        Claim::Bare(name)
    } else {
        Claim::NotOurs
    }
}

// ── Parameter checking ───────────────────────────────────────────────

/// Enforce an exact parameter count.
pub fn expect_arity(
    extension: &str,
    params: &[ExprId],
    expected: usize,
    pos: &SourcePos,
) -> Result<(), CompileError> {
    if params.len() != expected {
        return Err(CompileError::at(
            ErrorKind::BadExtensionArity {
                extension: extension.to_string(),
                expected,
                actual: params.len(),
            },
            pos.clone(),
        ));
    }
    Ok(())
}

fn param_error(extension: &str, index: usize, expected: &str, pos: &SourcePos) -> CompileError {
    CompileError::at(
        ErrorKind::BadExtensionParam {
            extension: extension.to_string(),
            index,
            expected: expected.to_string(),
        },
        pos.clone(),
    )
}

/// Parameter `index` must be an identifier; returns its name.
pub fn ident_param(
    ast: &Ast,
    extension: &str,
    params: &[ExprId],
    index: usize,
) -> Result<String, CompileError> {
    let id = params[index];
    match ast.kind(id) {
        ExprKind::Identifier(name) => Ok(name.clone()),
        _ => Err(param_error(extension, index, "an identifier", ast.pos(id))),
    }
}

/// Parameter `index` must be a type identifier; returns (name, is_list).
pub fn type_ident_param(
    ast: &Ast,
    extension: &str,
    params: &[ExprId],
    index: usize,
) -> Result<(String, bool), CompileError> {
    let id = params[index];
    match ast.kind(id) {
        ExprKind::TypeIdentifier { name, is_list } => Ok((name.clone(), *is_list)),
        _ => Err(param_error(
            extension,
            index,
            "a type identifier",
            ast.pos(id),
        )),
    }
}

/// Parameter `index` must be an integer literal.
pub fn int_param(
    ast: &Ast,
    extension: &str,
    params: &[ExprId],
    index: usize,
) -> Result<i64, CompileError> {
    let id = params[index];
    match ast.kind(id) {
        ExprKind::IntLiteral(value) => Ok(*value),
        _ => Err(param_error(
            extension,
            index,
            "an integer literal",
            ast.pos(id),
        )),
    }
}

/// Parameter `index` must be a method expression.
pub fn method_param(
    ast: &Ast,
    extension: &str,
    params: &[ExprId],
    index: usize,
) -> Result<ExprId, CompileError> {
    let id = params[index];
    match ast.kind(id) {
        ExprKind::Method { .. } => Ok(id),
        _ => Err(param_error(extension, index, "a method", ast.pos(id))),
    }
}

// ── Extractor extensions ─────────────────────────────────────────────

/// Working state handed to a type-extractor extension.
pub struct ExtractContext<'a> {
    pub ast: &'a mut Ast,
    pub map: &'a mut ApiMap,
}

/// An extension executed by the type extractor.
pub trait ExtractorExtension: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Execute against the annotation node; the returned expression replaces
    /// it in the parent's child slot.
    fn run(&self, cx: &mut ExtractContext<'_>, annotation: ExprId) -> Result<ExprId, CompileError>;
}

/// The extractor's extension registry.
pub struct ExtractorRegistry {
    phase: &'static str,
    extensions: Vec<Box<dyn ExtractorExtension>>,
}

impl ExtractorRegistry {
    /// A registry holding the built-in extensions.
    pub fn with_builtins(phase: &'static str) -> Self {
        let mut registry = Self {
            phase,
            extensions: Vec::new(),
        };
        registry.register(Box::new(InsertType));
        registry
    }

    pub fn register(&mut self, extension: Box<dyn ExtractorExtension>) {
        self.extensions.push(extension);
    }

    fn find(&self, name: &str) -> Option<&dyn ExtractorExtension> {
        self.extensions
            .iter()
            .map(|e| e.as_ref())
            .find(|e| e.name() == name)
    }

    /// The extension claiming `name`, if this phase owns it.
    pub fn dispatch(&self, name: &str) -> Result<Option<&dyn ExtractorExtension>, CompileError> {
        let registered: Vec<&str> = self.extensions.iter().map(|e| e.name()).collect();
        match claim(self.phase, &registered, name) {
            Claim::Namespaced(suffix) => match self.find(suffix) {
                Some(ext) => Ok(Some(ext)),
                None => Err(CompileError::new(ErrorKind::UnknownExtension {
                    phase: self.phase.to_string(),
                    name: suffix.to_string(),
                })),
            },
            Claim::Bare(bare) => Ok(self.find(bare)),
            Claim::NotOurs => Ok(None),
        }
    }
}

/// `InsertType(Identifier)` — inject a synthetic type declaration.
///
/// The exported record carries the bare identifier as both short and full
/// name; the synthesised `TypeDef` replaces the annotation in the API body.
#[derive(Debug)]
struct InsertType;

impl ExtractorExtension for InsertType {
    fn name(&self) -> &'static str {
        "InsertType"
    }

    fn run(&self, cx: &mut ExtractContext<'_>, annotation: ExprId) -> Result<ExprId, CompileError> {
        let (params, pos) = match cx.ast.kind(annotation) {
            ExprKind::Annotation { params, .. } => (params.clone(), cx.ast.pos(annotation).clone()),
            _ => unreachable!("extensions only run on annotation nodes"),
        };
        expect_arity(self.name(), &params, 1, &pos)?;
        let name = ident_param(cx.ast, self.name(), &params, 0)?;

        if cx.map.find_type(&name).is_some() {
            return Err(CompileError::at(ErrorKind::DuplicateType(name), pos));
        }
        cx.map.export_type(TypeRecord::scalar(name.clone(), name.clone()));

        let type_def = cx.ast.alloc(
            ExprKind::TypeDef {
                name,
                properties: Vec::new(),
                adopted_traits: Vec::new(),
                constructors: Vec::new(),
            },
            pos,
        );
        cx.ast
            .annotate(type_def, keys::PHASE, Annotation::Phase(annotation));
        Ok(type_def)
    }
}

// ── Resolver extensions ──────────────────────────────────────────────

/// Working state handed to a type-resolver extension.
pub struct ResolveContext<'a> {
    pub ast: &'a mut Ast,
    pub scopes: &'a mut ScopeArena,
    /// The scope the annotation appeared in.
    pub scope: ScopeId,
}

/// An extension executed by the type resolver.
pub trait ResolverExtension: std::fmt::Debug {
    fn name(&self) -> &'static str;
    fn run(&self, cx: &mut ResolveContext<'_>, annotation: ExprId) -> Result<ExprId, CompileError>;
}

/// The resolver's extension registry.
pub struct ResolverRegistry {
    phase: &'static str,
    extensions: Vec<Box<dyn ResolverExtension>>,
}

impl ResolverRegistry {
    /// A registry holding the built-in extensions. `Special` is registered
    /// under its bare name.
    pub fn with_builtins(phase: &'static str) -> Self {
        let mut registry = Self {
            phase,
            extensions: Vec::new(),
        };
        registry.register(Box::new(AliasType));
        registry.register(Box::new(Special));
        registry
    }

    pub fn register(&mut self, extension: Box<dyn ResolverExtension>) {
        self.extensions.push(extension);
    }

    fn find(&self, name: &str) -> Option<&dyn ResolverExtension> {
        self.extensions
            .iter()
            .map(|e| e.as_ref())
            .find(|e| e.name() == name)
    }

    /// The extension claiming `name`, if this phase owns it.
    pub fn dispatch(&self, name: &str) -> Result<Option<&dyn ResolverExtension>, CompileError> {
        let registered: Vec<&str> = self.extensions.iter().map(|e| e.name()).collect();
        match claim(self.phase, &registered, name) {
            Claim::Namespaced(suffix) => match self.find(suffix) {
                Some(ext) => Ok(Some(ext)),
                None => Err(CompileError::new(ErrorKind::UnknownExtension {
                    phase: self.phase.to_string(),
                    name: suffix.to_string(),
                })),
            },
            Claim::Bare(bare) => Ok(self.find(bare)),
            Claim::NotOurs => Ok(None),
        }
    }
}

/// `AliasType(Identifier, TypeIdentifier)` — make `source` resolve to the
/// target record from the current scope inward.
#[derive(Debug)]
struct AliasType;

impl ResolverExtension for AliasType {
    fn name(&self) -> &'static str {
        "AliasType"
    }

    fn run(&self, cx: &mut ResolveContext<'_>, annotation: ExprId) -> Result<ExprId, CompileError> {
        let (params, pos) = match cx.ast.kind(annotation) {
            ExprKind::Annotation { params, .. } => (params.clone(), cx.ast.pos(annotation).clone()),
            _ => unreachable!("extensions only run on annotation nodes"),
        };
        expect_arity(self.name(), &params, 2, &pos)?;
        let source = ident_param(cx.ast, self.name(), &params, 0)?;
        let (target, _) = type_ident_param(cx.ast, self.name(), &params, 1)?;

        let record = cx.scopes.find_type(cx.scope, &target).map_err(|e| e.or_at(&pos))?;
        cx.scopes.add_alias(cx.scope, source, record);
        Ok(annotation)
    }
}

/// `Special(TypeIdentifier, TypeIdentifier+)` — instantiate a generic.
///
/// Declares `Base[P, …]` in the current scope and synthesises a `TypeDef`
/// node carrying the instantiation as its type annotation.
#[derive(Debug)]
struct Special;

impl ResolverExtension for Special {
    fn name(&self) -> &'static str {
        "Special"
    }

    fn run(&self, cx: &mut ResolveContext<'_>, annotation: ExprId) -> Result<ExprId, CompileError> {
        let (params, pos) = match cx.ast.kind(annotation) {
            ExprKind::Annotation { params, .. } => (params.clone(), cx.ast.pos(annotation).clone()),
            _ => unreachable!("extensions only run on annotation nodes"),
        };
        if params.len() < 2 {
            return Err(CompileError::at(
                ErrorKind::BadExtensionArity {
                    extension: self.name().to_string(),
                    expected: 2,
                    actual: params.len(),
                },
                pos,
            ));
        }

        let (base_name, _) = type_ident_param(cx.ast, self.name(), &params, 0)?;
        let base = cx
            .scopes
            .find_type(cx.scope, &base_name)
            .map_err(|e| e.or_at(&pos))?;

        let mut type_params = Vec::new();
        for index in 1..params.len() {
            let (name, _) = type_ident_param(cx.ast, self.name(), &params, index)?;
            let record = cx
                .scopes
                .find_type(cx.scope, &name)
                .map_err(|e| e.or_at(&pos))?;
            type_params.push(record);
        }

        let generic = TypeRecord::generic(base, type_params);
        cx.scopes.declare_type(cx.scope, generic.clone());

        let type_def = cx.ast.alloc(
            ExprKind::TypeDef {
                name: generic.short_name(),
                properties: Vec::new(),
                adopted_traits: Vec::new(),
                constructors: Vec::new(),
            },
            pos,
        );
        cx.ast
            .annotate(type_def, keys::TYPE, Annotation::Type(generic));
        cx.ast
            .annotate(type_def, keys::PHASE, Annotation::Phase(annotation));
        Ok(type_def)
    }
}
