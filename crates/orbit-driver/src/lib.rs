//! Pipeline assembly for the Orbit backend.
//!
//! Chains the five phases over a frontend-supplied [`ParsedProgram`] and
//! returns the program's API maps and textual IR modules. The driver also
//! owns everything that touches the filesystem: import discovery, recursive
//! compilation of source imports, and `.api`/`.ll` write-back.

pub mod diagnostics;
pub mod discovery;
pub mod frontend;
pub mod resolver;

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use orbit_codegen::LlvmGen;
use orbit_common::{Chain, CompileError, ErrorKind, IrArtifact, Phase, Session};
use orbit_typeck::{
    DependencyGraph, ImportResolver, ParsedProgram, TypeChecker, TypeExtractor, TypeResolver,
};
use orbit_types::ApiMap;

pub use frontend::Frontend;
pub use resolver::FileImportResolver;

/// Everything one compilation produced.
pub struct CompiledProgram {
    pub api_maps: Vec<ApiMap>,
    pub modules: Vec<IrArtifact>,
}

/// Run the full pipeline over a parsed program.
///
/// The session is shared with any recursive inner compilations the resolver
/// performs; each invocation otherwise owns its artifacts.
pub fn compile(
    parsed: ParsedProgram,
    session: Rc<Session>,
    resolver: &dyn ImportResolver,
) -> Result<CompiledProgram, CompileError> {
    let mut front = Chain::new(
        Chain::new(
            DependencyGraph::new(session.clone()),
            TypeExtractor::new(session.clone(), resolver),
        ),
        Chain::new(
            TypeResolver::new(session.clone()),
            TypeChecker::new(session.clone()),
        ),
    );
    let resolved = front.run(parsed)?;
    let api_maps = resolved.api_maps.clone();
    let modules = LlvmGen::new(session).run(resolved)?;
    Ok(CompiledProgram { api_maps, modules })
}

fn write_file(path: &Path, contents: &str) -> Result<(), CompileError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            CompileError::new(ErrorKind::Io {
                path: parent.display().to_string(),
                message: e.to_string(),
            })
        })?;
    }
    fs::write(path, contents).map_err(|e| {
        CompileError::new(ErrorKind::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    })
}

/// Serialise every API map under `dir` as `.api` files, dotted names
/// becoming directories. Returns the written paths.
pub fn write_api_maps(program: &CompiledProgram, dir: &Path) -> Result<Vec<PathBuf>, CompileError> {
    let mut written = Vec::new();
    for map in &program.api_maps {
        let path = dir
            .join(discovery::name_to_path(&map.canonical_name))
            .with_extension("api");
        write_file(&path, &map.to_json_string())?;
        written.push(path);
    }
    Ok(written)
}

/// Write every IR module under `dir` as `.ll` files. Returns the written
/// paths.
pub fn write_ir_modules(
    program: &CompiledProgram,
    dir: &Path,
) -> Result<Vec<PathBuf>, CompileError> {
    let mut written = Vec::new();
    for module in &program.modules {
        let path = dir
            .join(discovery::name_to_path(&module.name))
            .with_extension("ll");
        write_file(&path, &module.ir)?;
        written.push(path);
    }
    Ok(written)
}
