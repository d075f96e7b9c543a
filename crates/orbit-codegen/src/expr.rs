//! Value generation.
//!
//! Mirrors the resolver's value switch but produces IR: literals become
//! constants of their (possibly alias-overridden) annotated type, operator
//! and call nodes call the functions their resolution metadata names, and
//! annotation values execute their LLVM extension and read the IR-value
//! table back.

use inkwell::types::BasicType;
use inkwell::values::{AggregateValueEnum, BasicMetadataValueEnum, BasicValueEnum};
use orbit_ast::{keys, Ast, ExprId, ExprKind};
use orbit_common::{CompileError, ErrorKind, SourcePos};

use crate::context::CompContext;
use crate::extensions::LlvmRegistry;

fn builder_error(e: inkwell::builder::BuilderError, pos: &SourcePos) -> CompileError {
    CompileError::at(ErrorKind::Codegen(e.to_string()), pos.clone())
}

/// The zero-sized value standing in for `Unit`.
fn unit_value<'ctx>(cx: &CompContext<'ctx>) -> BasicValueEnum<'ctx> {
    cx.llvm.struct_type(&[], false).const_named_struct(&[]).into()
}

/// Generate a method body block.
///
/// Returns the value of the block's return statement, or `None` when the
/// block falls through (the caller emits the implicit `ret void`).
pub fn gen_block<'ctx>(
    cx: &mut CompContext<'ctx>,
    ast: &mut Ast,
    registry: &LlvmRegistry,
    block: ExprId,
) -> Result<Option<BasicValueEnum<'ctx>>, CompileError> {
    let (statements, ret) = match ast.kind(block) {
        ExprKind::Block { statements, ret } => (statements.clone(), *ret),
        other => {
            return Err(CompileError::at(
                ErrorKind::Codegen(format!("expected a block, found {}", other.tag())),
                ast.pos(block).clone(),
            ))
        }
    };

    for statement in statements {
        gen_value(cx, ast, registry, statement)?;
    }

    match ret {
        Some(ret_id) => Ok(Some(gen_value(cx, ast, registry, ret_id)?)),
        None => Ok(None),
    }
}

/// Generate one value expression.
pub fn gen_value<'ctx>(
    cx: &mut CompContext<'ctx>,
    ast: &mut Ast,
    registry: &LlvmRegistry,
    id: ExprId,
) -> Result<BasicValueEnum<'ctx>, CompileError> {
    let kind = ast.kind(id).clone();
    let pos = ast.pos(id).clone();

    match kind {
        ExprKind::IntLiteral(value) => {
            // The annotated type wins so alias extensions can widen Int.
            let ty = ast
                .type_of(id)
                .and_then(|record| cx.ir_type(&record.full_name()).ok());
            let int_ty = match ty {
                Some(inkwell::types::BasicTypeEnum::IntType(t)) => t,
                _ => cx.llvm.i32_type(),
            };
            Ok(int_ty.const_int(value as u64, true).into())
        }

        ExprKind::RealLiteral(value) => {
            let ty = ast
                .type_of(id)
                .and_then(|record| cx.ir_type(&record.full_name()).ok());
            let float_ty = match ty {
                Some(inkwell::types::BasicTypeEnum::FloatType(t)) => t,
                _ => cx.llvm.f32_type(),
            };
            Ok(float_ty.const_float(value).into())
        }

        ExprKind::StringLiteral(value) => {
            let global = cx
                .builder
                .build_global_string_ptr(&value, "str")
                .map_err(|e| builder_error(e, &pos))?;
            Ok(global.as_pointer_value().into())
        }

        ExprKind::ListLiteral(items) => {
            let mut values = Vec::with_capacity(items.len());
            for &item in &items {
                values.push(gen_value(cx, ast, registry, item)?);
            }
            let Some(first) = values.first().copied() else {
                return Ok(unit_value(cx));
            };
            let element_ty = first.get_type();
            let array_ty = element_ty.array_type(values.len() as u32);
            let mut aggregate: AggregateValueEnum = array_ty.get_undef().into();
            for (index, value) in values.into_iter().enumerate() {
                aggregate = cx
                    .builder
                    .build_insert_value(aggregate, value, index as u32, "list")
                    .map_err(|e| builder_error(e, &pos))?;
            }
            match aggregate {
                AggregateValueEnum::ArrayValue(array) => Ok(array.into()),
                AggregateValueEnum::StructValue(st) => Ok(st.into()),
            }
        }

        ExprKind::Identifier(name) => cx.lookup(&name).map_err(|e| e.or_at(&pos)),

        ExprKind::Unary { value, .. } => {
            let operand = gen_value(cx, ast, registry, value)?;
            let record = ast
                .metadata(id, keys::OPERATOR_FUNCTION)
                .and_then(|m| m.as_type())
                .cloned()
                .ok_or_else(|| {
                    CompileError::at(
                        ErrorKind::Codegen("unary node without dispatch metadata".into()),
                        pos.clone(),
                    )
                })?;
            call_function(cx, &record.full_name(), &[operand], &pos)
        }

        ExprKind::Binary { left, right, .. } => {
            let lhs = gen_value(cx, ast, registry, left)?;
            let rhs = gen_value(cx, ast, registry, right)?;
            let record = ast
                .metadata(id, keys::OPERATOR_FUNCTION)
                .and_then(|m| m.as_type())
                .cloned()
                .ok_or_else(|| {
                    CompileError::at(
                        ErrorKind::Codegen("binary node without dispatch metadata".into()),
                        pos.clone(),
                    )
                })?;
            call_function(cx, &record.full_name(), &[lhs, rhs], &pos)
        }

        ExprKind::StaticCall { args, .. } => {
            let expanded = expanded_name(ast, id, &pos)?;
            let mut values = Vec::with_capacity(args.len());
            for &arg in &args {
                values.push(gen_value(cx, ast, registry, arg)?);
            }
            call_function(cx, &expanded, &values, &pos)
        }

        ExprKind::InstanceCall { receiver, args, .. } => {
            let expanded = expanded_name(ast, id, &pos)?;
            let mut values = Vec::with_capacity(args.len() + 1);
            values.push(gen_value(cx, ast, registry, receiver)?);
            for &arg in &args {
                values.push(gen_value(cx, ast, registry, arg)?);
            }
            call_function(cx, &expanded, &values, &pos)
        }

        ExprKind::ConstructorCall { args, .. } => {
            let record = ast.type_of(id).cloned().ok_or_else(|| {
                CompileError::at(
                    ErrorKind::Codegen("constructor without a type annotation".into()),
                    pos.clone(),
                )
            })?;
            let struct_ty = cx.struct_type(&record.full_name()).ok_or_else(|| {
                CompileError::at(ErrorKind::IrTypeMissing(record.full_name()), pos.clone())
            })?;
            let mut aggregate: AggregateValueEnum = struct_ty.get_undef().into();
            for (index, &arg) in args.iter().enumerate() {
                let value = gen_value(cx, ast, registry, arg)?;
                aggregate = cx
                    .builder
                    .build_insert_value(aggregate, value, index as u32, "ctor")
                    .map_err(|e| builder_error(e, &pos))?;
            }
            match aggregate {
                AggregateValueEnum::StructValue(st) => Ok(st.into()),
                AggregateValueEnum::ArrayValue(array) => Ok(array.into()),
            }
        }

        ExprKind::Assignment { name, value, .. } => {
            let result = gen_value(cx, ast, registry, value)?;
            cx.bind(name, result);
            Ok(result)
        }

        ExprKind::Annotation { name, .. } => {
            if let Some(extension) = registry.dispatch(&name)? {
                extension.run(cx, ast, id)?;
                if let Some(attached) = cx.ir_value(id) {
                    return Ok(attached);
                }
            }
            Ok(unit_value(cx))
        }

        ExprKind::Return { value } => {
            let result = gen_value(cx, ast, registry, value)?;
            if cx.current_ret_is_void {
                cx.builder
                    .build_return(None)
                    .map_err(|e| builder_error(e, &pos))?;
            } else {
                cx.builder
                    .build_return(Some(&result))
                    .map_err(|e| builder_error(e, &pos))?;
            }
            Ok(result)
        }

        other => Err(CompileError::at(
            ErrorKind::Codegen(format!("cannot generate a value for {}", other.tag())),
            pos,
        )),
    }
}

fn expanded_name(ast: &Ast, id: ExprId, pos: &SourcePos) -> Result<String, CompileError> {
    ast.metadata(id, keys::EXPANDED_METHOD_NAME)
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            CompileError::at(
                ErrorKind::Codegen("call without dispatch metadata".into()),
                pos.clone(),
            )
        })
}

/// Emit a call to the function declared under `full_name`.
fn call_function<'ctx>(
    cx: &mut CompContext<'ctx>,
    full_name: &str,
    args: &[BasicValueEnum<'ctx>],
    pos: &SourcePos,
) -> Result<BasicValueEnum<'ctx>, CompileError> {
    let function = cx.function(full_name).map_err(|e| e.or_at(pos))?;
    let arguments: Vec<BasicMetadataValueEnum<'ctx>> =
        args.iter().map(|&a| a.into()).collect();
    let site = cx
        .builder
        .build_call(function, &arguments, "call")
        .map_err(|e| builder_error(e, pos))?;
    Ok(site
        .try_as_basic_value()
        .basic()
        .unwrap_or_else(|| unit_value(cx)))
}
