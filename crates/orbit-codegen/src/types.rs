//! Type record to LLVM type mapping.
//!
//! Primitive widths follow the backend defaults (`Int` = i32, `Real` = f32)
//! unless an alias extension overrides them through the context's alias
//! pool. Compound types are named structs; generic instantiations (lists)
//! lower to opaque pointers; `Unit` is the empty struct, except in return
//! position where it lowers to `void`.

use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FunctionType};
use orbit_common::CompileError;
use orbit_types::{builtins, SignatureRecord, TypeRecord};

use crate::context::CompContext;

/// Register the bootstrap primitive types into a fresh context.
pub fn register_builtins(cx: &mut CompContext<'_>) {
    cx.register_type(builtins::int().full_name(), cx.llvm.i32_type().into());
    cx.register_type(builtins::real().full_name(), cx.llvm.f32_type().into());
    cx.register_type(
        builtins::unit().full_name(),
        cx.llvm.struct_type(&[], false).into(),
    );
    cx.register_type(
        builtins::string().full_name(),
        cx.llvm.ptr_type(inkwell::AddressSpace::default()).into(),
    );
    cx.register_type(
        builtins::list().full_name(),
        cx.llvm.ptr_type(inkwell::AddressSpace::default()).into(),
    );
}

/// The IR type for a record.
///
/// Lookup order: alias pool, type registry, then the generic fallback
/// (instantiated generics are reference values behind opaque pointers).
pub fn ir_type<'ctx>(
    cx: &CompContext<'ctx>,
    record: &TypeRecord,
) -> Result<BasicTypeEnum<'ctx>, CompileError> {
    let full = record.full_name();
    if cx.has_type(&full) {
        return cx.ir_type(&full);
    }
    if let TypeRecord::Generic { .. } = record {
        return Ok(cx.llvm.ptr_type(inkwell::AddressSpace::default()).into());
    }
    cx.ir_type(&full)
}

/// Whether a record is the `Unit` bootstrap type.
pub fn is_unit(record: &TypeRecord) -> bool {
    record.full_name() == builtins::unit().full_name()
}

/// Build the LLVM function type for a signature record.
///
/// `Unit` returns lower to `void` so implicit returns can emit `ret void`.
pub fn fn_type<'ctx>(
    cx: &CompContext<'ctx>,
    signature: &SignatureRecord,
) -> Result<FunctionType<'ctx>, CompileError> {
    let params: Vec<BasicMetadataTypeEnum<'ctx>> = signature
        .args
        .iter()
        .map(|arg| ir_type(cx, arg).map(Into::into))
        .collect::<Result<_, _>>()?;

    if is_unit(&signature.ret) {
        Ok(cx.llvm.void_type().fn_type(&params, false))
    } else {
        Ok(ir_type(cx, &signature.ret)?.fn_type(&params, false))
    }
}
