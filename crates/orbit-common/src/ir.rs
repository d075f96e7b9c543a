/// A generated IR module in textual form.
///
/// Codegen prints each LLVM module to text before returning it, so artifacts
/// outlive the LLVM context that produced them and recursive inner compiles
/// can hand their modules to the outer compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct IrArtifact {
    /// Canonical name of the API the module was generated from.
    pub name: String,
    /// The module body as textual LLVM IR.
    pub ir: String,
}

impl IrArtifact {
    pub fn new(name: impl Into<String>, ir: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ir: ir.into(),
        }
    }
}
