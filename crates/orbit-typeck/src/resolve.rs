//! Scoped type resolution.
//!
//! Walks every API and annotates every resolvable expression with a type
//! record from the merged API-map surface. Methods get their own scopes;
//! unary and binary operators are rewritten into method dispatch by
//! synthesised name; call sites record the mangled name they resolved to so
//! codegen never repeats the lookup.

use std::rc::Rc;

use orbit_ast::{keys, Annotation, Ast, ExprId, ExprKind, MetaValue};
use orbit_common::{CompileError, ErrorKind, Phase, Session};
use orbit_types::{builtins, ApiMap, ScopeArena, ScopeId, SignatureRecord, TypeRecord};
use rustc_hash::FxHashMap;

use crate::extension::{ResolveContext, ResolverRegistry};
use crate::extract::canonical_name;
use crate::{ExtractedProgram, ResolvedProgram};

/// The annotation namespace this phase executes.
pub const PHASE_IDENT: &str = "Orb.Compiler.Backend.TypeResolver";

pub const PHASE_NAME: &str = "TypeResolver";

/// Phase 3: type resolution and annotation.
pub struct TypeResolver {
    #[allow(dead_code)]
    session: Rc<Session>,
    extensions: ResolverRegistry,
}

impl TypeResolver {
    pub fn new(session: Rc<Session>) -> Self {
        Self {
            session,
            extensions: ResolverRegistry::with_builtins(PHASE_IDENT),
        }
    }

    /// Register an additional resolver extension.
    pub fn register_extension(&mut self, extension: Box<dyn crate::extension::ResolverExtension>) {
        self.extensions.register(extension);
    }
}

impl Phase for TypeResolver {
    type Input = ExtractedProgram;
    type Output = ResolvedProgram;

    fn name(&self) -> &'static str {
        PHASE_NAME
    }

    fn run(&mut self, input: Self::Input) -> Result<Self::Output, CompileError> {
        let ExtractedProgram {
            mut ast,
            apis,
            api_maps,
            foreign_ir,
        } = input;
        let mut scopes = ScopeArena::new();

        let mut resolver = Resolver {
            ast: &mut ast,
            scopes: &mut scopes,
            extensions: &self.extensions,
            trait_impls: FxHashMap::default(),
        };
        resolver.collect_trait_adoptions(&apis);
        for &api in &apis {
            resolver.resolve_api(api, &api_maps)?;
        }

        Ok(ResolvedProgram {
            ast,
            apis,
            api_maps,
            scopes,
            foreign_ir,
        })
    }
}

struct Resolver<'a> {
    ast: &'a mut Ast,
    scopes: &'a mut ScopeArena,
    extensions: &'a ResolverRegistry,
    /// Trait short name -> full names of the concrete types adopting it.
    trait_impls: FxHashMap<String, Vec<String>>,
}

impl Resolver<'_> {
    /// Pre-scan all type definitions for adopted traits. The method return
    /// rejection needs the full adopter count before any method resolves.
    fn collect_trait_adoptions(&mut self, apis: &[ExprId]) {
        for &api in apis {
            let canonical = canonical_name(self.ast, api);
            let body = match self.ast.kind(api) {
                ExprKind::Api { body, .. } => body.clone(),
                _ => continue,
            };
            for child in body {
                if let ExprKind::TypeDef {
                    name,
                    adopted_traits,
                    ..
                } = self.ast.kind(child)
                {
                    let full = format!("{canonical}.{name}");
                    for adopted in adopted_traits {
                        self.trait_impls
                            .entry(adopted.clone())
                            .or_default()
                            .push(full.clone());
                    }
                }
            }
        }
    }

    fn resolve_api(&mut self, api: ExprId, api_maps: &[ApiMap]) -> Result<(), CompileError> {
        let canonical = canonical_name(self.ast, api);
        let body = match self.ast.kind(api) {
            ExprKind::Api { body, .. } => body.clone(),
            other => {
                return Err(CompileError::at(
                    ErrorKind::UnsupportedStatement(format!(
                        "expected an api, found {}",
                        other.tag()
                    )),
                    self.ast.pos(api).clone(),
                ))
            }
        };

        // The API scope sees the union of every map's exported surface,
        // deduplicated by full name.
        let scope = self.scopes.push(self.scopes.global());
        let mut seen = std::collections::HashSet::new();
        for map in api_maps {
            for exported in map.types() {
                if seen.insert(exported.record.full_name()) {
                    self.scopes.declare_type(scope, exported.record.clone());
                }
            }
            for exported in map.methods() {
                if seen.insert(exported.record.full_name()) {
                    self.scopes
                        .declare_type(scope, TypeRecord::Signature(exported.record.clone()));
                }
            }
        }
        self.ast.annotate(api, keys::SCOPE, Annotation::Scope(scope));
        log::debug!("resolving api `{canonical}`");

        for &child in &body {
            if matches!(self.ast.kind(child), ExprKind::TypeDef { .. }) {
                self.resolve_type_def(scope, &canonical, child)?;
            }
        }
        for &child in &body {
            if matches!(self.ast.kind(child), ExprKind::Method { .. }) {
                self.resolve_method(scope, child)?;
            }
        }
        for &child in &body {
            if matches!(self.ast.kind(child), ExprKind::Annotation { .. }) {
                self.resolve_api_annotation(scope, api, child)?;
            }
        }
        Ok(())
    }

    // ── Declarations ─────────────────────────────────────────────────

    fn resolve_type_def(
        &mut self,
        scope: ScopeId,
        canonical: &str,
        type_def: ExprId,
    ) -> Result<(), CompileError> {
        let (name, properties) = match self.ast.kind(type_def) {
            ExprKind::TypeDef {
                name, properties, ..
            } => (name.clone(), properties.clone()),
            _ => unreachable!("caller matched TypeDef"),
        };

        for property in properties {
            let (name_id, ty_id) = match self.ast.kind(property) {
                ExprKind::Pair { name, ty } => (*name, *ty),
                other => {
                    return Err(CompileError::at(
                        ErrorKind::UnsupportedStatement(format!(
                            "expected a property pair, found {}",
                            other.tag()
                        )),
                        self.ast.pos(property).clone(),
                    ))
                }
            };
            let record = self.resolve_type_identifier(scope, ty_id)?;
            self.ast
                .annotate(name_id, keys::TYPE, Annotation::Type(record.clone()));
            self.ast
                .annotate(property, keys::TYPE, Annotation::Type(record));
        }

        // Synthetic types (extension output) carry bare full names, so fall
        // back to the short name when the canonical form is absent.
        let own = self
            .scopes
            .find_type(scope, &format!("{canonical}.{name}"))
            .or_else(|_| self.scopes.find_type(scope, &name))
            .map_err(|e| e.or_at(self.ast.pos(type_def)))?;
        self.ast
            .annotate(type_def, keys::TYPE, Annotation::Type(own));
        Ok(())
    }

    fn resolve_method(&mut self, api_scope: ScopeId, method: ExprId) -> Result<(), CompileError> {
        let (signature, body) = match self.ast.kind(method) {
            ExprKind::Method { signature, body } => (*signature, *body),
            _ => unreachable!("caller matched Method"),
        };

        let (record, params) = self.resolve_signature(api_scope, signature)?;
        let method_record = TypeRecord::Method {
            name: record.name.clone(),
            signature: record.clone(),
        };
        self.scopes.declare_type(api_scope, method_record.clone());

        let method_scope = self.scopes.push(api_scope);
        for (param_name, param_record) in params {
            self.scopes
                .bind(method_scope, param_name, param_record)
                .map_err(|e| e.or_at(self.ast.pos(signature)))?;
        }

        self.resolve_block(method_scope, body)?;
        self.ast
            .annotate(method, keys::TYPE, Annotation::Type(method_record));
        self.ast
            .annotate(method, keys::SCOPE, Annotation::Scope(method_scope));
        Ok(())
    }

    /// Resolve a signature node to its record plus named parameter bindings.
    fn resolve_signature(
        &mut self,
        scope: ScopeId,
        signature: ExprId,
    ) -> Result<(SignatureRecord, Vec<(String, TypeRecord)>), CompileError> {
        let (receiver, name, params, ret) = match self.ast.kind(signature) {
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
                    self.ast.pos(signature).clone(),
                ))
            }
        };

        let receiver_record = self.resolve_type_identifier(scope, receiver)?;

        let mut named = Vec::new();
        for param in params {
            let (name_id, ty_id) = match self.ast.kind(param) {
                ExprKind::Pair { name, ty } => (*name, *ty),
                other => {
                    return Err(CompileError::at(
                        ErrorKind::UnsupportedStatement(format!(
                            "expected a parameter pair, found {}",
                            other.tag()
                        )),
                        self.ast.pos(param).clone(),
                    ))
                }
            };
            let param_name = match self.ast.kind(name_id) {
                ExprKind::Identifier(n) => n.clone(),
                other => {
                    return Err(CompileError::at(
                        ErrorKind::UnsupportedStatement(format!(
                            "expected a parameter name, found {}",
                            other.tag()
                        )),
                        self.ast.pos(name_id).clone(),
                    ))
                }
            };
            let record = self.resolve_type_identifier(scope, ty_id)?;
            self.ast
                .annotate(name_id, keys::TYPE, Annotation::Type(record.clone()));
            self.ast
                .annotate(param, keys::TYPE, Annotation::Type(record.clone()));
            named.push((param_name, record));
        }

        let ret_record = match ret {
            Some(ret_id) => self.resolve_type_identifier(scope, ret_id)?,
            None => builtins::unit(),
        };
        self.reject_ambiguous_trait_return(&ret_record, signature)?;

        let mut args: Vec<TypeRecord> = Vec::new();
        if receiver_record.short_name() != "Operator" {
            args.push(receiver_record.clone());
        }
        args.extend(named.iter().map(|(_, r)| r.clone()));

        let record = SignatureRecord::new(name, receiver_record, args, ret_record);
        self.ast.annotate(
            signature,
            keys::TYPE,
            Annotation::Type(TypeRecord::Signature(record.clone())),
        );
        Ok((record, named))
    }

    /// The open language limitation: a method whose return type is a trait
    /// with several concrete adopters has no well-defined concrete return.
    fn reject_ambiguous_trait_return(
        &self,
        ret: &TypeRecord,
        signature: ExprId,
    ) -> Result<(), CompileError> {
        if let Some(implementers) = self.trait_impls.get(&ret.short_name()) {
            if implementers.len() > 1 {
                return Err(CompileError::at(
                    ErrorKind::TraitReturnAmbiguous {
                        trait_name: ret.full_name(),
                        implementers: implementers.clone(),
                    },
                    self.ast.pos(signature).clone(),
                ));
            }
        }
        Ok(())
    }

    // ── Blocks and statements ────────────────────────────────────────

    fn resolve_block(&mut self, scope: ScopeId, block: ExprId) -> Result<(), CompileError> {
        let (statements, ret) = match self.ast.kind(block) {
            ExprKind::Block { statements, ret } => (statements.clone(), *ret),
            other => {
                return Err(CompileError::at(
                    ErrorKind::UnsupportedStatement(format!(
                        "expected a block, found {}",
                        other.tag()
                    )),
                    self.ast.pos(block).clone(),
                ))
            }
        };

        for statement in statements {
            self.resolve_statement(scope, statement)?;
        }

        let block_type = match ret {
            Some(ret_id) => {
                let value = match self.ast.kind(ret_id) {
                    ExprKind::Return { value } => *value,
                    other => {
                        return Err(CompileError::at(
                            ErrorKind::UnsupportedStatement(format!(
                                "expected a return, found {}",
                                other.tag()
                            )),
                            self.ast.pos(ret_id).clone(),
                        ))
                    }
                };
                let record = self.resolve_value(scope, value)?;
                self.ast
                    .annotate(ret_id, keys::TYPE, Annotation::Type(record.clone()));
                record
            }
            None => builtins::unit(),
        };
        self.ast
            .annotate(block, keys::TYPE, Annotation::Type(block_type));
        Ok(())
    }

    fn resolve_statement(&mut self, scope: ScopeId, statement: ExprId) -> Result<(), CompileError> {
        match self.ast.kind(statement) {
            ExprKind::Assignment { .. }
            | ExprKind::StaticCall { .. }
            | ExprKind::InstanceCall { .. }
            | ExprKind::ConstructorCall { .. }
            | ExprKind::Unary { .. }
            | ExprKind::Binary { .. }
            | ExprKind::Annotation { .. } => {
                self.resolve_value(scope, statement)?;
                Ok(())
            }
            other => Err(CompileError::at(
                ErrorKind::UnsupportedStatement(other.tag().to_string()),
                self.ast.pos(statement).clone(),
            )),
        }
    }

    // ── Values ───────────────────────────────────────────────────────

    fn resolve_value(&mut self, scope: ScopeId, id: ExprId) -> Result<TypeRecord, CompileError> {
        let kind = self.ast.kind(id).clone();
        let pos = self.ast.pos(id).clone();

        let record = match kind {
            ExprKind::IntLiteral(_) => builtins::int(),
            ExprKind::RealLiteral(_) => builtins::real(),
            ExprKind::StringLiteral(_) => builtins::string(),

            ExprKind::ListLiteral(items) => {
                let element = match items.first() {
                    Some(&first) => self.resolve_value(scope, first)?,
                    None => builtins::unit(),
                };
                for &item in items.iter().skip(1) {
                    self.resolve_value(scope, item)?;
                }
                builtins::list_of(element)
            }

            ExprKind::Identifier(name) => self
                .scopes
                .lookup_binding(scope, &name)
                .map(Clone::clone)
                .map_err(|e| e.or_at(&pos))?,

            ExprKind::TypeIdentifier { .. } => {
                return self.resolve_type_identifier(scope, id);
            }

            ExprKind::Unary { op, value } => {
                let operand = self.resolve_value(scope, value)?;
                let dispatch = format!(
                    "{}.{}.{}",
                    operand.full_name(),
                    op.symbol(),
                    operand.full_name()
                );
                let method = self.scopes.find_type(scope, &dispatch).map_err(|_| {
                    CompileError::at(
                        ErrorKind::UnsupportedOperator {
                            symbol: op.symbol().to_string(),
                            operands: vec![operand.full_name()],
                        },
                        pos.clone(),
                    )
                })?;
                let ret = self.callable_return(&method, &dispatch, &pos)?;
                self.ast
                    .set_metadata(id, keys::OPERATOR_FUNCTION, MetaValue::Type(method));
                ret
            }

            ExprKind::Binary { op, left, right } => {
                let lhs = self.resolve_value(scope, left)?;
                let rhs = self.resolve_value(scope, right)?;
                let dispatch = format!(
                    "Operator.{}.{}.{}",
                    op.symbol(),
                    lhs.full_name(),
                    rhs.full_name()
                );
                let method = self.scopes.find_type(scope, &dispatch).map_err(|_| {
                    CompileError::at(
                        ErrorKind::UnsupportedOperator {
                            symbol: op.symbol().to_string(),
                            operands: vec![lhs.full_name(), rhs.full_name()],
                        },
                        pos.clone(),
                    )
                })?;
                let ret = self.callable_return(&method, &dispatch, &pos)?;
                self.ast
                    .set_metadata(id, keys::OPERATOR_FUNCTION, MetaValue::Type(method));
                ret
            }

            ExprKind::StaticCall {
                receiver,
                method,
                args,
            } => {
                let receiver_record = self.resolve_value(scope, receiver)?;
                let mut expanded = format!("{}.{}", receiver_record.full_name(), method);
                for &arg in &args {
                    let arg_record = self.resolve_value(scope, arg)?;
                    expanded.push('.');
                    expanded.push_str(&arg_record.full_name());
                }
                let resolved = self
                    .scopes
                    .find_type(scope, &expanded)
                    .map_err(|_| CompileError::at(ErrorKind::UnknownMethod(expanded.clone()), pos.clone()))?;
                let ret = self.callable_return(&resolved, &expanded, &pos)?;
                self.ast
                    .set_metadata(id, keys::EXPANDED_METHOD_NAME, MetaValue::Str(expanded));
                ret
            }

            ExprKind::InstanceCall {
                receiver,
                method,
                args,
            } => {
                let receiver_record = self.resolve_value(scope, receiver)?;
                // The receiver is the implicit first argument.
                let mut expanded = format!(
                    "{}.{}.{}",
                    receiver_record.full_name(),
                    method,
                    receiver_record.full_name()
                );
                for &arg in &args {
                    let arg_record = self.resolve_value(scope, arg)?;
                    expanded.push('.');
                    expanded.push_str(&arg_record.full_name());
                }
                let resolved = self
                    .scopes
                    .find_type(scope, &expanded)
                    .map_err(|_| CompileError::at(ErrorKind::UnknownMethod(expanded.clone()), pos.clone()))?;
                let ret = self.callable_return(&resolved, &expanded, &pos)?;
                self.ast
                    .set_metadata(id, keys::EXPANDED_METHOD_NAME, MetaValue::Str(expanded));
                ret
            }

            ExprKind::ConstructorCall { ty, args } => {
                let record = self.resolve_type_identifier(scope, ty)?;
                if let TypeRecord::Compound { members, .. } = &record {
                    if args.len() != members.len() {
                        return Err(CompileError::at(
                            ErrorKind::ConstructorArityMismatch {
                                type_name: record.full_name(),
                                expected: members.len(),
                                actual: args.len(),
                            },
                            pos,
                        ));
                    }
                    for (index, (&arg, member)) in args.iter().zip(members.iter()).enumerate() {
                        let arg_record = self.resolve_value(scope, arg)?;
                        if arg_record != *member {
                            return Err(CompileError::at(
                                ErrorKind::ConstructorArgTypeMismatch {
                                    index,
                                    expected: member.full_name(),
                                    actual: arg_record.full_name(),
                                },
                                self.ast.pos(arg).clone(),
                            ));
                        }
                    }
                } else {
                    for &arg in &args {
                        self.resolve_value(scope, arg)?;
                    }
                }
                record
            }

            ExprKind::Assignment {
                name,
                declared_ty,
                value,
            } => {
                let value_record = self.resolve_value(scope, value)?;
                // The declared type, when present, is what the name means;
                // annotation values (whose record only materialises during
                // codegen) are exempt from the mismatch check.
                let bound = match declared_ty {
                    Some(declared) => {
                        let declared_record = self.resolve_type_identifier(scope, declared)?;
                        let value_is_annotation =
                            matches!(self.ast.kind(value), ExprKind::Annotation { .. });
                        if declared_record != value_record && !value_is_annotation {
                            return Err(CompileError::at(
                                ErrorKind::AssignmentTypeMismatch {
                                    declared: declared_record.full_name(),
                                    actual: value_record.full_name(),
                                },
                                pos,
                            ));
                        }
                        declared_record
                    }
                    None => value_record,
                };
                self.scopes
                    .bind(scope, name, bound.clone())
                    .map_err(|e| e.or_at(&pos))?;
                bound
            }

            ExprKind::Annotation { params, .. } => {
                // Parameters resolve best-effort: an annotation may name
                // things that only materialise in its executing phase. A
                // wrapped method is real code and must resolve fully.
                for param in params {
                    if matches!(self.ast.kind(param), ExprKind::Method { .. }) {
                        self.resolve_method(scope, param)?;
                    } else {
                        let _ = self.resolve_value(scope, param);
                    }
                }
                self.ast.annotate(id, keys::SCOPE, Annotation::Scope(scope));
                builtins::unit()
            }

            ExprKind::Return { value } => {
                let record = self.resolve_value(scope, value)?;
                self.ast
                    .annotate(id, keys::TYPE, Annotation::Type(record.clone()));
                return Ok(record);
            }

            other => {
                return Err(CompileError::at(
                    ErrorKind::UnsupportedStatement(other.tag().to_string()),
                    pos,
                ))
            }
        };

        self.ast
            .annotate(id, keys::TYPE, Annotation::Type(record.clone()));
        Ok(record)
    }

    /// The return type of a signature or method record found by dispatch.
    fn callable_return(
        &self,
        record: &TypeRecord,
        dispatch: &str,
        pos: &orbit_common::SourcePos,
    ) -> Result<TypeRecord, CompileError> {
        record.return_type().cloned().ok_or_else(|| {
            CompileError::at(ErrorKind::UnknownMethod(dispatch.to_string()), pos.clone())
        })
    }

    /// Resolve a type identifier node, wrapping list-flagged types.
    fn resolve_type_identifier(
        &mut self,
        scope: ScopeId,
        id: ExprId,
    ) -> Result<TypeRecord, CompileError> {
        let (name, is_list) = match self.ast.kind(id) {
            ExprKind::TypeIdentifier { name, is_list } => (name.clone(), *is_list),
            other => {
                return Err(CompileError::at(
                    ErrorKind::UnsupportedStatement(format!(
                        "expected a type identifier, found {}",
                        other.tag()
                    )),
                    self.ast.pos(id).clone(),
                ))
            }
        };
        let record = self
            .scopes
            .find_type(scope, &name)
            .map_err(|e| e.or_at(self.ast.pos(id)))?;
        let record = if is_list {
            builtins::list_of(record)
        } else {
            record
        };
        self.ast
            .annotate(id, keys::TYPE, Annotation::Type(record.clone()));
        Ok(record)
    }

    // ── API-level annotations ────────────────────────────────────────

    fn resolve_api_annotation(
        &mut self,
        scope: ScopeId,
        api: ExprId,
        annotation: ExprId,
    ) -> Result<(), CompileError> {
        let name = match self.ast.kind(annotation) {
            ExprKind::Annotation { name, .. } => name.clone(),
            _ => unreachable!("caller matched Annotation"),
        };

        if let Some(extension) = self.extensions.dispatch(&name)? {
            let mut cx = ResolveContext {
                ast: &mut *self.ast,
                scopes: &mut *self.scopes,
                scope,
            };
            let replacement = extension.run(&mut cx, annotation)?;
            if replacement != annotation {
                self.ast.rewrite_child(api, annotation, replacement);
            }
            return Ok(());
        }

        // Another phase's annotation: resolve what resolves, attach the
        // scope, and leave execution to its owner.
        self.resolve_value(scope, annotation)?;
        Ok(())
    }
}
