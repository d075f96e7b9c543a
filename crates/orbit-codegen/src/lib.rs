//! LLVM IR generation for the Orbit backend.
//!
//! The final phase: one IR module per API, emitted through `inkwell` and
//! returned as textual artifacts. Each module pre-declares every type and
//! method visible from the merged API maps, fills in local struct bodies,
//! executes LLVM-namespaced annotation extensions, then generates method
//! bodies from the resolver's annotations.

pub mod context;
pub mod expr;
pub mod extensions;
pub mod mangle;
pub mod types;

use std::rc::Rc;

use inkwell::context::Context;
use orbit_ast::{keys, Annotation, Ast, ExprId, ExprKind};
use orbit_common::{CompileError, ErrorKind, IrArtifact, OutputKind, Phase, Session};
use orbit_typeck::extract::canonical_name;
use orbit_typeck::ResolvedProgram;
use orbit_types::{ApiMap, TypeRecord};

use crate::context::CompContext;
use crate::extensions::LlvmRegistry;
pub use crate::extensions::PHASE_IDENT;

pub const PHASE_NAME: &str = "LLVMGen";

/// Phase 5: IR emission.
pub struct LlvmGen {
    session: Rc<Session>,
    registry: LlvmRegistry,
}

impl LlvmGen {
    pub fn new(session: Rc<Session>) -> Self {
        Self {
            session,
            registry: LlvmRegistry::with_builtins(),
        }
    }
}

impl Phase for LlvmGen {
    type Input = ResolvedProgram;
    type Output = Vec<IrArtifact>;

    fn name(&self) -> &'static str {
        PHASE_NAME
    }

    fn run(&mut self, input: Self::Input) -> Result<Self::Output, CompileError> {
        let ResolvedProgram {
            mut ast,
            apis,
            api_maps,
            foreign_ir,
            ..
        } = input;

        let llvm = Context::create();
        let mut artifacts = foreign_ir;
        let mut have_entry = false;

        for &api in &apis {
            let name = canonical_name(&ast, api);
            let mut cx = CompContext::new(&llvm, &name, self.session.clone());
            generate_api(&mut cx, &mut ast, api, &api_maps, &self.registry)?;
            have_entry |= cx.entry_point.is_some();
            log::debug!("emitted module `{name}`");
            artifacts.push(IrArtifact::new(
                name,
                cx.module.print_to_string().to_string(),
            ));
        }

        if self.session.output == OutputKind::Executable && !have_entry {
            return Err(CompileError::new(ErrorKind::MissingMain));
        }
        Ok(artifacts)
    }
}

fn generate_api(
    cx: &mut CompContext<'_>,
    ast: &mut Ast,
    api: ExprId,
    api_maps: &[ApiMap],
    registry: &LlvmRegistry,
) -> Result<(), CompileError> {
    types::register_builtins(cx);

    // Forward-declare every exported type as a named struct, imports and
    // other APIs' locals alike; local definitions fill their bodies below.
    for map in api_maps {
        for exported in map.types() {
            let full = exported.record.full_name();
            if cx.has_type(&full) {
                continue;
            }
            let mangled = cx.mangle(&full);
            let st = cx.llvm.opaque_struct_type(&mangled);
            cx.register_struct(full, st);
        }
    }

    // Prototype every exported method so call sites and cross-API calls
    // resolve before any body is generated.
    for map in api_maps {
        for exported in map.methods() {
            let full = exported.record.full_name();
            if cx.function(&full).is_ok() {
                continue;
            }
            let fn_ty = types::fn_type(cx, &exported.record)?;
            let mangled = cx.mangle(&full);
            let function = cx.module.add_function(&mangled, fn_ty, None);
            function.set_call_conventions(cx.session.calling_convention.llvm_id());
            cx.register_function(full, function);
        }
    }

    let body = api_body(ast, api)?;
    for &child in &body {
        if matches!(ast.kind(child), ExprKind::TypeDef { .. }) {
            generate_type_def(cx, ast, child)?;
        }
    }

    // Annotation extensions may rewrite body slots (EntryPoint swaps itself
    // for its wrapped method), so the body is re-read afterwards.
    for &child in &body {
        if let ExprKind::Annotation { name, .. } = ast.kind(child) {
            let name = name.clone();
            if let Some(extension) = registry.dispatch(&name)? {
                if let Some(replacement) = extension.run(cx, ast, child)? {
                    ast.rewrite_child(api, child, replacement);
                }
            }
        }
    }

    let body = api_body(ast, api)?;
    for &child in &body {
        if matches!(ast.kind(child), ExprKind::Method { .. }) {
            generate_method(cx, ast, child, registry)?;
        }
    }
    Ok(())
}

fn api_body(ast: &Ast, api: ExprId) -> Result<Vec<ExprId>, CompileError> {
    match ast.kind(api) {
        ExprKind::Api { body, .. } => Ok(body.clone()),
        other => Err(CompileError::at(
            ErrorKind::Codegen(format!("expected an api, found {}", other.tag())),
            ast.pos(api).clone(),
        )),
    }
}

/// Fill in the struct body for a locally declared type.
fn generate_type_def(
    cx: &mut CompContext<'_>,
    ast: &Ast,
    type_def: ExprId,
) -> Result<(), CompileError> {
    let record = ast.type_of(type_def).cloned().ok_or_else(|| {
        CompileError::at(
            ErrorKind::Codegen("type definition without a type annotation".into()),
            ast.pos(type_def).clone(),
        )
    })?;

    match &record {
        TypeRecord::Compound { members, .. } => {
            let field_types = members
                .iter()
                .map(|member| types::ir_type(cx, member))
                .collect::<Result<Vec<_>, _>>()?;
            let st = cx.struct_type(&record.full_name()).ok_or_else(|| {
                CompileError::at(
                    ErrorKind::IrTypeMissing(record.full_name()),
                    ast.pos(type_def).clone(),
                )
            })?;
            st.set_body(&field_types, false);
        }
        TypeRecord::Scalar { .. } => {
            if let Some(st) = cx.struct_type(&record.full_name()) {
                st.set_body(&[], false);
            }
        }
        // Generic instantiations (Special output) lower to pointers.
        _ => {}
    }
    Ok(())
}

fn generate_method(
    cx: &mut CompContext<'_>,
    ast: &mut Ast,
    method: ExprId,
    registry: &LlvmRegistry,
) -> Result<(), CompileError> {
    let (signature, body) = match ast.kind(method) {
        ExprKind::Method { signature, body } => (*signature, *body),
        _ => unreachable!("caller matched Method"),
    };
    let record = match ast.annotation(signature, keys::TYPE) {
        Some(Annotation::Type(TypeRecord::Signature(sig))) => sig.clone(),
        _ => {
            return Err(CompileError::at(
                ErrorKind::Codegen("method signature is not resolved".into()),
                ast.pos(signature).clone(),
            ))
        }
    };
    let full = record.full_name();
    let is_entry = cx.entry_point.as_deref() == Some(full.as_str());

    let function = if is_entry {
        let fn_ty = types::fn_type(cx, &record)?;
        let function = cx.module.add_function("main", fn_ty, None);
        cx.register_function(full.clone(), function);
        function
    } else if let Ok(declared) = cx.function(&full) {
        declared
    } else {
        let fn_ty = types::fn_type(cx, &record)?;
        let mangled = cx.mangle(&full);
        let function = cx.module.add_function(&mangled, fn_ty, None);
        function.set_call_conventions(cx.session.calling_convention.llvm_id());
        cx.register_function(full.clone(), function);
        function
    };

    cx.clear_bindings();
    cx.current_ret_is_void = types::is_unit(&record.ret);

    // Instance methods carry the receiver as argument 0 with no name to
    // bind; declared parameters start after it.
    let params = match ast.kind(signature) {
        ExprKind::Signature { params, .. } => params.clone(),
        _ => Vec::new(),
    };
    let offset = record.args.len().saturating_sub(params.len());
    for (index, &param) in params.iter().enumerate() {
        let name_id = match ast.kind(param) {
            ExprKind::Pair { name, .. } => *name,
            _ => continue,
        };
        let param_name = match ast.kind(name_id) {
            ExprKind::Identifier(n) => n.clone(),
            _ => continue,
        };
        let value = function
            .get_nth_param((offset + index) as u32)
            .ok_or_else(|| {
                CompileError::at(
                    ErrorKind::Codegen(format!("missing parameter {index}")),
                    ast.pos(param).clone(),
                )
            })?;
        cx.bind(param_name, value);
    }

    let entry = cx.llvm.append_basic_block(function, "entry");
    cx.builder.position_at_end(entry);

    let returned = expr::gen_block(cx, ast, registry, body)?;
    if returned.is_none() {
        if cx.current_ret_is_void {
            cx.builder
                .build_return(None)
                .map_err(|e| CompileError::at(ErrorKind::Codegen(e.to_string()), ast.pos(body).clone()))?;
        } else {
            return Err(CompileError::at(
                ErrorKind::Codegen("non-unit method falls off the end of its body".into()),
                ast.pos(method).clone(),
            ));
        }
    }
    Ok(())
}
