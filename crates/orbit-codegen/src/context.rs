//! The per-module codegen context.
//!
//! One [`CompContext`] exists per emitted IR module. It owns the module
//! handle and builder, the registries mapping record full names to IR types
//! and functions, the value bindings of the function being generated, the
//! alias pool fed by alias extensions, and the IR-value table that stands in
//! for IR-value annotations (inkwell values carry the context lifetime, so
//! they cannot live on the arena).

use std::rc::Rc;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::types::{BasicTypeEnum, StructType};
use inkwell::values::{BasicValueEnum, FunctionValue};
use orbit_ast::ExprId;
use orbit_common::{CompileError, ErrorKind, Session};
use rustc_hash::FxHashMap;

use crate::mangle::Mangler;

pub struct CompContext<'ctx> {
    pub llvm: &'ctx Context,
    pub module: Module<'ctx>,
    pub builder: Builder<'ctx>,
    pub session: Rc<Session>,

    /// Record full name -> IR type.
    types: FxHashMap<String, BasicTypeEnum<'ctx>>,
    /// Record full name -> named struct (kept separately so bodies can be
    /// filled in after forward declaration).
    structs: FxHashMap<String, StructType<'ctx>>,
    /// Signature full name -> declared function.
    functions: FxHashMap<String, FunctionValue<'ctx>>,
    /// Value bindings of the function currently being generated.
    bindings: FxHashMap<String, BasicValueEnum<'ctx>>,
    /// Alias-extension overrides, consulted before `types`.
    alias_pool: FxHashMap<String, BasicTypeEnum<'ctx>>,
    /// IR values attached to annotation nodes by extensions.
    ir_values: FxHashMap<ExprId, BasicValueEnum<'ctx>>,

    mangler: Mangler,
    /// Signature full name of the method designated as entry point.
    pub entry_point: Option<String>,
    /// Whether the function being generated returns void.
    pub current_ret_is_void: bool,
}

impl<'ctx> CompContext<'ctx> {
    pub fn new(llvm: &'ctx Context, module_name: &str, session: Rc<Session>) -> Self {
        let module = llvm.create_module(module_name);
        let builder = llvm.create_builder();
        Self {
            llvm,
            module,
            builder,
            session,
            types: FxHashMap::default(),
            structs: FxHashMap::default(),
            functions: FxHashMap::default(),
            bindings: FxHashMap::default(),
            alias_pool: FxHashMap::default(),
            ir_values: FxHashMap::default(),
            mangler: Mangler::new(),
            entry_point: None,
            current_ret_is_void: false,
        }
    }

    /// Digest a source-level name for the IR layer; memoised.
    pub fn mangle(&mut self, name: &str) -> String {
        self.mangler.mangle(name)
    }

    // ── Types ────────────────────────────────────────────────────────

    pub fn register_type(&mut self, full_name: impl Into<String>, ty: BasicTypeEnum<'ctx>) {
        self.types.insert(full_name.into(), ty);
    }

    pub fn register_struct(&mut self, full_name: impl Into<String>, ty: StructType<'ctx>) {
        let full_name = full_name.into();
        self.types.insert(full_name.clone(), ty.into());
        self.structs.insert(full_name, ty);
    }

    pub fn struct_type(&self, full_name: &str) -> Option<StructType<'ctx>> {
        self.structs.get(full_name).copied()
    }

    pub fn has_type(&self, full_name: &str) -> bool {
        self.alias_pool.contains_key(full_name) || self.types.contains_key(full_name)
    }

    /// The IR type for a record full name: alias pool first, then the type
    /// registry.
    pub fn ir_type(&self, full_name: &str) -> Result<BasicTypeEnum<'ctx>, CompileError> {
        if let Some(aliased) = self.alias_pool.get(full_name) {
            return Ok(*aliased);
        }
        self.types
            .get(full_name)
            .copied()
            .ok_or_else(|| CompileError::new(ErrorKind::IrTypeMissing(full_name.to_string())))
    }

    /// Install an alias-pool override.
    pub fn add_alias(&mut self, full_name: impl Into<String>, ty: BasicTypeEnum<'ctx>) {
        self.alias_pool.insert(full_name.into(), ty);
    }

    // ── Functions ────────────────────────────────────────────────────

    pub fn register_function(&mut self, full_name: impl Into<String>, f: FunctionValue<'ctx>) {
        self.functions.insert(full_name.into(), f);
    }

    pub fn function(&self, full_name: &str) -> Result<FunctionValue<'ctx>, CompileError> {
        self.functions
            .get(full_name)
            .copied()
            .ok_or_else(|| CompileError::new(ErrorKind::IrFunctionMissing(full_name.to_string())))
    }

    // ── Bindings ─────────────────────────────────────────────────────

    /// Bind an identifier to a value in the current function.
    pub fn bind(&mut self, name: impl Into<String>, value: BasicValueEnum<'ctx>) {
        self.bindings.insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Result<BasicValueEnum<'ctx>, CompileError> {
        self.bindings
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::new(ErrorKind::UnboundName(name.to_string())))
    }

    /// Drop all bindings; called when generation moves to the next function.
    pub fn clear_bindings(&mut self) {
        self.bindings.clear();
    }

    // ── IR-value annotations ─────────────────────────────────────────

    pub fn attach_ir_value(&mut self, id: ExprId, value: BasicValueEnum<'ctx>) {
        self.ir_values.insert(id, value);
    }

    pub fn ir_value(&self, id: ExprId) -> Option<BasicValueEnum<'ctx>> {
        self.ir_values.get(&id).copied()
    }
}
