//! LLVM-phase annotation extensions.
//!
//! These run during codegen, against the live module: `EntryPoint` swaps
//! the annotation for its wrapped method and marks it for emission as
//! `main`; the alias extensions feed the context's alias pool;
//! `Add` inlines an integer add and attaches the result to the annotation
//! node through the context's IR-value table.

use orbit_ast::{keys, Annotation, Ast, ExprId, ExprKind};
use orbit_common::{CompileError, ErrorKind};
use orbit_typeck::extension::{
    claim, expect_arity, ident_param, int_param, method_param, type_ident_param, Claim,
};
use orbit_types::TypeRecord;

use crate::context::CompContext;

/// The annotation namespace this phase executes.
pub const PHASE_IDENT: &str = "Orb.Compiler.Backend.LLVM";

/// An extension executed during IR generation.
///
/// Returning `Some(id)` rewrites the annotation's parent slot to `id`.
pub trait LlvmExtension {
    fn name(&self) -> &'static str;

    fn run<'ctx>(
        &self,
        cx: &mut CompContext<'ctx>,
        ast: &mut Ast,
        annotation: ExprId,
    ) -> Result<Option<ExprId>, CompileError>;
}

/// The codegen extension registry. `Add` is registered under its bare name.
pub struct LlvmRegistry {
    extensions: Vec<Box<dyn LlvmExtension>>,
}

impl LlvmRegistry {
    pub fn with_builtins() -> Self {
        Self {
            extensions: vec![
                Box::new(EntryPoint),
                Box::new(IntegerAlias),
                Box::new(FloatAlias),
                Box::new(Add),
            ],
        }
    }

    fn find(&self, name: &str) -> Option<&dyn LlvmExtension> {
        self.extensions
            .iter()
            .map(|e| e.as_ref())
            .find(|e| e.name() == name)
    }

    /// The extension claiming `name`, if this phase owns it.
    pub fn dispatch(&self, name: &str) -> Result<Option<&dyn LlvmExtension>, CompileError> {
        let registered: Vec<&str> = self.extensions.iter().map(|e| e.name()).collect();
        match claim(PHASE_IDENT, &registered, name) {
            Claim::Namespaced(suffix) => match self.find(suffix) {
                Some(ext) => Ok(Some(ext)),
                None => Err(CompileError::new(ErrorKind::UnknownExtension {
                    phase: PHASE_IDENT.to_string(),
                    name: suffix.to_string(),
                })),
            },
            Claim::Bare(bare) => Ok(self.find(bare)),
            Claim::NotOurs => Ok(None),
        }
    }
}

fn annotation_parts(ast: &Ast, annotation: ExprId) -> (Vec<ExprId>, orbit_common::SourcePos) {
    match ast.kind(annotation) {
        ExprKind::Annotation { params, .. } => (params.clone(), ast.pos(annotation).clone()),
        _ => unreachable!("extensions only run on annotation nodes"),
    }
}

/// `EntryPoint(Method)` — designate the wrapped method as `main`.
struct EntryPoint;

impl LlvmExtension for EntryPoint {
    fn name(&self) -> &'static str {
        "EntryPoint"
    }

    fn run<'ctx>(
        &self,
        cx: &mut CompContext<'ctx>,
        ast: &mut Ast,
        annotation: ExprId,
    ) -> Result<Option<ExprId>, CompileError> {
        let (params, pos) = annotation_parts(ast, annotation);
        expect_arity(self.name(), &params, 1, &pos)?;
        let method = method_param(ast, self.name(), &params, 0)?;

        let signature = match ast.kind(method) {
            ExprKind::Method { signature, .. } => *signature,
            _ => unreachable!("method_param checked the kind"),
        };
        let record = match ast.annotation(signature, keys::TYPE) {
            Some(Annotation::Type(TypeRecord::Signature(sig))) => sig.clone(),
            _ => {
                return Err(CompileError::at(
                    ErrorKind::MissingAnnotation {
                        node: "entry point signature".into(),
                    },
                    pos,
                ))
            }
        };
        cx.entry_point = Some(record.full_name());
        Ok(Some(method))
    }
}

/// `IntegerAlias(TypeIdentifier, IntLiteral)` — alias a type name to an
/// integer primitive of the given width.
struct IntegerAlias;

impl LlvmExtension for IntegerAlias {
    fn name(&self) -> &'static str {
        "IntegerAlias"
    }

    fn run<'ctx>(
        &self,
        cx: &mut CompContext<'ctx>,
        ast: &mut Ast,
        annotation: ExprId,
    ) -> Result<Option<ExprId>, CompileError> {
        let (params, pos) = annotation_parts(ast, annotation);
        expect_arity(self.name(), &params, 2, &pos)?;
        let (_, full_name) = alias_target(ast, self.name(), &params)?;
        let width = int_param(ast, self.name(), &params, 1)?;
        if width <= 0 {
            return Err(CompileError::at(
                ErrorKind::Codegen(format!("invalid integer width {width}")),
                pos,
            ));
        }

        let ty = cx.llvm.custom_width_int_type(width as u32);
        cx.add_alias(full_name, ty.into());
        Ok(None)
    }
}

/// `FloatAlias(TypeIdentifier, IntLiteral)` — alias a type name to a float
/// primitive; widths outside {16, 32, 64, 80, 128} are rejected.
struct FloatAlias;

impl LlvmExtension for FloatAlias {
    fn name(&self) -> &'static str {
        "FloatAlias"
    }

    fn run<'ctx>(
        &self,
        cx: &mut CompContext<'ctx>,
        ast: &mut Ast,
        annotation: ExprId,
    ) -> Result<Option<ExprId>, CompileError> {
        let (params, pos) = annotation_parts(ast, annotation);
        expect_arity(self.name(), &params, 2, &pos)?;
        let (_, full_name) = alias_target(ast, self.name(), &params)?;
        let width = int_param(ast, self.name(), &params, 1)?;

        let ty = match width {
            16 => cx.llvm.f16_type(),
            32 => cx.llvm.f32_type(),
            64 => cx.llvm.f64_type(),
            80 => cx.llvm.x86_f80_type(),
            128 => cx.llvm.f128_type(),
            other => {
                return Err(CompileError::at(
                    ErrorKind::BadFloatWidth(other.unsigned_abs()),
                    pos,
                ))
            }
        };
        cx.add_alias(full_name, ty.into());
        Ok(None)
    }
}

/// The aliased type's (short, full) names. Uses the resolver's annotation
/// when the name resolved; a name that only exists through the alias falls
/// back to its literal spelling.
fn alias_target(
    ast: &Ast,
    extension: &str,
    params: &[ExprId],
) -> Result<(String, String), CompileError> {
    let (name, _) = type_ident_param(ast, extension, params, 0)?;
    match ast.type_of(params[0]) {
        Some(record) => Ok((record.short_name(), record.full_name())),
        None => Ok((name.clone(), name)),
    }
}

/// `Add(Identifier, Identifier)` — inline an integer add over two bound
/// values and attach the result to the annotation node.
struct Add;

impl LlvmExtension for Add {
    fn name(&self) -> &'static str {
        "Add"
    }

    fn run<'ctx>(
        &self,
        cx: &mut CompContext<'ctx>,
        ast: &mut Ast,
        annotation: ExprId,
    ) -> Result<Option<ExprId>, CompileError> {
        let (params, pos) = annotation_parts(ast, annotation);
        expect_arity(self.name(), &params, 2, &pos)?;
        let lhs_name = ident_param(ast, self.name(), &params, 0)?;
        let rhs_name = ident_param(ast, self.name(), &params, 1)?;

        let lhs = cx.lookup(&lhs_name).map_err(|e| e.or_at(&pos))?;
        let rhs = cx.lookup(&rhs_name).map_err(|e| e.or_at(&pos))?;
        let (lhs, rhs) = match (lhs, rhs) {
            (
                inkwell::values::BasicValueEnum::IntValue(l),
                inkwell::values::BasicValueEnum::IntValue(r),
            ) => (l, r),
            _ => {
                return Err(CompileError::at(
                    ErrorKind::Codegen("Add expects two integer values".into()),
                    pos,
                ))
            }
        };

        let sum = cx
            .builder
            .build_int_add(lhs, rhs, "add")
            .map_err(|e| CompileError::at(ErrorKind::Codegen(e.to_string()), pos.clone()))?;
        cx.attach_ir_value(annotation, sum.into());
        Ok(None)
    }
}
