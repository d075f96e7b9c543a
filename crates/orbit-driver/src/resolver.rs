//! Import resolution against the filesystem.
//!
//! The extractor asks for a canonical name; this resolver finds the file,
//! and either hands back precompiled API-map text or runs the whole
//! pipeline recursively over the source through the linked [`Frontend`].
//! Recursive compilations share the session and nothing else.

use std::fs;
use std::path::Path;
use std::rc::Rc;

use orbit_common::{CompileError, ErrorKind, Session};
use orbit_typeck::{CompiledImport, ImportResolver, ResolvedImport};

use crate::discovery::{find_orbit_file, ImportFormat};
use crate::frontend::Frontend;

/// Resolves imports from the session's search paths.
pub struct FileImportResolver<'f> {
    session: Rc<Session>,
    /// Needed only for `.orb` imports; precompiled maps load without one.
    frontend: Option<&'f dyn Frontend>,
}

impl<'f> FileImportResolver<'f> {
    pub fn new(session: Rc<Session>, frontend: Option<&'f dyn Frontend>) -> Self {
        Self { session, frontend }
    }
}

fn read(path: &Path) -> Result<String, CompileError> {
    fs::read_to_string(path).map_err(|e| {
        CompileError::new(ErrorKind::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    })
}

impl ImportResolver for FileImportResolver<'_> {
    fn resolve(&self, name: &str) -> Result<ResolvedImport, CompileError> {
        let (path, format) = find_orbit_file(&self.session, name)?;
        log::debug!("import `{name}` resolved to {}", path.display());

        match format {
            ImportFormat::Precompiled => Ok(ResolvedImport::Precompiled(read(&path)?)),
            ImportFormat::Source => {
                let frontend = self.frontend.ok_or_else(|| {
                    CompileError::new(ErrorKind::Io {
                        path: path.display().to_string(),
                        message: "source import requires a linked frontend".into(),
                    })
                })?;
                let source = read(&path)?;
                let parsed = frontend.parse(&path, &source)?;
                // Inner compile failures propagate verbatim.
                let compiled = crate::compile(parsed, self.session.clone(), self)?;
                Ok(ResolvedImport::Compiled(CompiledImport {
                    api_maps: compiled.api_maps,
                    modules: compiled.modules,
                }))
            }
        }
    }
}
