//! Type extraction.
//!
//! Builds one [`ApiMap`] per API: every declared type, every exported method
//! signature, plus the surfaces of everything imported via `with`. Imports
//! resolve against earlier APIs of the same program first, then through the
//! driver-provided [`ImportResolver`] (precompiled `.api` maps or recursive
//! compilation of source files).

use std::rc::Rc;

use orbit_ast::{Ast, ExprId, ExprKind};
use orbit_common::{CompileError, ErrorKind, IrArtifact, Phase, Session};
use orbit_types::{builtins, ApiMap, SignatureRecord, TypeRecord};

use crate::extension::{ExtractContext, ExtractorRegistry};
use crate::{ExtractedProgram, OrderedProgram};

/// The annotation namespace this phase executes.
pub const PHASE_IDENT: &str = "Orb.Compiler.Backend.TypeExtractor";

pub const PHASE_NAME: &str = "TypeExtractor";

/// The result of resolving an import that is not local to the program.
pub enum ResolvedImport {
    /// Text of a precompiled `.api` file.
    Precompiled(String),
    /// The output of recursively compiling a source file.
    Compiled(CompiledImport),
}

/// Everything a recursive inner compilation produced.
pub struct CompiledImport {
    pub api_maps: Vec<ApiMap>,
    pub modules: Vec<IrArtifact>,
}

/// The seam to the driver: given a canonical API name, find and load its
/// surface. Implementations search the session's Orb paths.
pub trait ImportResolver {
    fn resolve(&self, name: &str) -> Result<ResolvedImport, CompileError>;
}

/// A resolver for self-contained programs: every lookup fails.
pub struct NoImports;

impl ImportResolver for NoImports {
    fn resolve(&self, name: &str) -> Result<ResolvedImport, CompileError> {
        Err(CompileError::new(ErrorKind::DependencyNotFound(
            name.to_string(),
        )))
    }
}

/// Phase 2: API-map production.
pub struct TypeExtractor<'r> {
    #[allow(dead_code)]
    session: Rc<Session>,
    resolver: &'r dyn ImportResolver,
    extensions: ExtractorRegistry,
}

impl<'r> TypeExtractor<'r> {
    pub fn new(session: Rc<Session>, resolver: &'r dyn ImportResolver) -> Self {
        Self {
            session,
            resolver,
            extensions: ExtractorRegistry::with_builtins(PHASE_IDENT),
        }
    }

    /// Register an additional extractor extension.
    pub fn register_extension(
        &mut self,
        extension: Box<dyn crate::extension::ExtractorExtension>,
    ) {
        self.extensions.register(extension);
    }
}

impl Phase for TypeExtractor<'_> {
    type Input = OrderedProgram;
    type Output = ExtractedProgram;

    fn name(&self) -> &'static str {
        PHASE_NAME
    }

    fn run(&mut self, input: Self::Input) -> Result<Self::Output, CompileError> {
        let OrderedProgram { mut ast, apis } = input;
        let mut api_maps: Vec<ApiMap> = Vec::new();
        let mut foreign_ir: Vec<IrArtifact> = Vec::new();

        for &api in &apis {
            let map = extract_api(
                &mut ast,
                api,
                &api_maps,
                self.resolver,
                &self.extensions,
                &mut foreign_ir,
            )?;
            log::debug!(
                "extracted api map `{}`: {} type(s), {} method(s)",
                map.canonical_name,
                map.types().len(),
                map.methods().len()
            );
            api_maps.push(map);
        }

        Ok(ExtractedProgram {
            ast,
            apis,
            api_maps,
            foreign_ir,
        })
    }
}

/// The canonical name of an API node: `within.name` when nested.
pub fn canonical_name(ast: &Ast, api: ExprId) -> String {
    match ast.kind(api) {
        ExprKind::Api { name, within, .. } => match within {
            Some(parent) => format!("{parent}.{name}"),
            None => name.clone(),
        },
        _ => String::new(),
    }
}

fn extract_api(
    ast: &mut Ast,
    api: ExprId,
    earlier: &[ApiMap],
    resolver: &dyn ImportResolver,
    extensions: &ExtractorRegistry,
    foreign_ir: &mut Vec<IrArtifact>,
) -> Result<ApiMap, CompileError> {
    let (name, with, body) = match ast.kind(api) {
        ExprKind::Api {
            name, with, body, ..
        } => (name.clone(), with.clone(), body.clone()),
        other => {
            return Err(CompileError::at(
                ErrorKind::UnsupportedStatement(format!("expected an api, found {}", other.tag())),
                ast.pos(api).clone(),
            ))
        }
    };
    let canonical = canonical_name(ast, api);
    let mut map = ApiMap::new(canonical.clone());

    // ── Imports ──────────────────────────────────────────────────────
    for import in &with {
        if *import == name || *import == canonical {
            // Self-import; the dependency phase already warned.
            continue;
        }
        if let Some(local) = earlier.iter().find(|m| m.canonical_name == *import) {
            map.import_all(local);
            continue;
        }
        match resolver.resolve(import)? {
            ResolvedImport::Precompiled(text) => {
                let mut imported = ApiMap::from_json_str(&text)?;
                imported.mark_imported();
                map.import_all(&imported);
            }
            ResolvedImport::Compiled(inner) => {
                for inner_map in &inner.api_maps {
                    map.import_all(inner_map);
                }
                foreign_ir.extend(inner.modules);
            }
        }
    }

    // ── Declarations, in body order ──────────────────────────────────
    for child in body {
        match ast.kind(child) {
            ExprKind::TypeDef { .. } => extract_type_def(ast, &canonical, &mut map, child)?,
            ExprKind::TraitDef { name, .. } => {
                let full = format!("{canonical}.{name}");
                if map.find_type(&full).is_some() {
                    return Err(CompileError::at(
                        ErrorKind::DuplicateType(full),
                        ast.pos(child).clone(),
                    ));
                }
                map.export_type(TypeRecord::scalar(name.clone(), full));
            }
            ExprKind::Method { signature, .. } => {
                let record = extract_signature(ast, &map, *signature)?;
                map.export_method(record);
            }
            ExprKind::Annotation {
                name: annotation_name,
                ..
            } => {
                let annotation_name = annotation_name.clone();
                if let Some(extension) = extensions.dispatch(&annotation_name)? {
                    let mut cx = ExtractContext {
                        ast: &mut *ast,
                        map: &mut map,
                    };
                    let replacement = extension.run(&mut cx, child)?;
                    ast.rewrite_child(api, child, replacement);
                }
            }
            _ => {}
        }
    }

    Ok(map)
}

/// Find a type by name in the map being built, falling back to the
/// bootstrap set.
fn lookup_type(map: &ApiMap, name: &str) -> Option<TypeRecord> {
    if let Some(record) = map.find_type(name) {
        return Some(record.clone());
    }
    builtins::all()
        .into_iter()
        .find(|b| b.short_name() == name || b.full_name() == name)
}

fn extract_type_def(
    ast: &Ast,
    canonical: &str,
    map: &mut ApiMap,
    type_def: ExprId,
) -> Result<(), CompileError> {
    let (name, properties) = match ast.kind(type_def) {
        ExprKind::TypeDef {
            name, properties, ..
        } => (name.clone(), properties.clone()),
        _ => unreachable!("caller matched TypeDef"),
    };
    let full = format!("{canonical}.{name}");
    if map.find_type(&full).is_some() {
        return Err(CompileError::at(
            ErrorKind::DuplicateType(full),
            ast.pos(type_def).clone(),
        ));
    }

    let mut members = Vec::new();
    for &property in &properties {
        let ty = match ast.kind(property) {
            ExprKind::Pair { ty, .. } => *ty,
            other => {
                return Err(CompileError::at(
                    ErrorKind::UnsupportedStatement(format!(
                        "expected a property pair, found {}",
                        other.tag()
                    )),
                    ast.pos(property).clone(),
                ))
            }
        };
        let (type_name, is_list) = match ast.kind(ty) {
            ExprKind::TypeIdentifier { name, is_list } => (name.clone(), *is_list),
            other => {
                return Err(CompileError::at(
                    ErrorKind::UnsupportedStatement(format!(
                        "expected a type identifier, found {}",
                        other.tag()
                    )),
                    ast.pos(ty).clone(),
                ))
            }
        };
        let record = lookup_type(map, &type_name).ok_or_else(|| {
            CompileError::at(ErrorKind::UnknownType(type_name), ast.pos(ty).clone())
        })?;
        members.push(if is_list {
            builtins::list_of(record)
        } else {
            record
        });
    }

    let record = if members.is_empty() {
        TypeRecord::scalar(name, full)
    } else {
        TypeRecord::compound(name, full, members)
    };
    map.export_type(record);
    Ok(())
}

/// Resolve a signature node against the map under construction.
///
/// Instance methods take their receiver as the first argument; signatures on
/// the `Operator` namespace carry only their declared operands, which keeps
/// binary dispatch names in the `Operator.<sym>.<lhs>.<rhs>` shape.
fn extract_signature(
    ast: &Ast,
    map: &ApiMap,
    signature: ExprId,
) -> Result<SignatureRecord, CompileError> {
    let (receiver, name, params, ret) = match ast.kind(signature) {
        ExprKind::Signature {
            receiver,
            name,
            params,
            ret,
        } => (*receiver, name.clone(), params.clone(), *ret),
        other => {
            return Err(CompileError::at(
                ErrorKind::UnsupportedStatement(format!(
                    "expected a signature, found {}",
                    other.tag()
                )),
                ast.pos(signature).clone(),
            ))
        }
    };

    let resolve_type_id = |id: ExprId| -> Result<TypeRecord, CompileError> {
        let (type_name, is_list) = match ast.kind(id) {
            ExprKind::TypeIdentifier { name, is_list } => (name.clone(), *is_list),
            other => {
                return Err(CompileError::at(
                    ErrorKind::UnsupportedStatement(format!(
                        "expected a type identifier, found {}",
                        other.tag()
                    )),
                    ast.pos(id).clone(),
                ))
            }
        };
        let record = lookup_type(map, &type_name).ok_or_else(|| {
            CompileError::at(ErrorKind::UnknownType(type_name), ast.pos(id).clone())
        })?;
        Ok(if is_list {
            builtins::list_of(record)
        } else {
            record
        })
    };

    let receiver_record = resolve_type_id(receiver)?;

    let mut args = Vec::new();
    if receiver_record.short_name() != "Operator" {
        args.push(receiver_record.clone());
    }
    for &param in &params {
        let ty = match ast.kind(param) {
            ExprKind::Pair { ty, .. } => *ty,
            other => {
                return Err(CompileError::at(
                    ErrorKind::UnsupportedStatement(format!(
                        "expected a parameter pair, found {}",
                        other.tag()
                    )),
                    ast.pos(param).clone(),
                ))
            }
        };
        args.push(resolve_type_id(ty)?);
    }

    let ret_record = match ret {
        Some(id) => resolve_type_id(id)?,
        None => builtins::unit(),
    };

    Ok(SignatureRecord::new(name, receiver_record, args, ret_record))
}
