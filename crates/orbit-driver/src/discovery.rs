//! File discovery.
//!
//! Maps a canonical API name to a file on disk: dots become directory
//! separators, and every session search path is probed for a precompiled
//! `.api` map first, then an `.orb` source file. A name found in more than
//! one search root is ambiguous and rejected.

use std::path::{Path, PathBuf};

use orbit_common::{CompileError, ErrorKind, Session};

/// The on-disk form an import resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    /// A serialised API map (`.api`).
    Precompiled,
    /// A source file requiring a recursive compile (`.orb`).
    Source,
}

/// The relative path a canonical name maps to, without extension.
///
/// `"Orb.Core.Types"` becomes `"Orb/Core/Types"`.
pub fn name_to_path(canonical_name: &str) -> PathBuf {
    canonical_name.split('.').collect()
}

/// Probe the session's search paths for `canonical_name`.
///
/// Within one root the precompiled map wins over the source file; hits in
/// several roots are ambiguous.
pub fn find_orbit_file(
    session: &Session,
    canonical_name: &str,
) -> Result<(PathBuf, ImportFormat), CompileError> {
    let relative = name_to_path(canonical_name);
    let mut hits: Vec<(PathBuf, ImportFormat)> = Vec::new();

    for root in &session.search_paths {
        if let Some(hit) = probe_root(root, &relative) {
            hits.push(hit);
        }
    }

    match hits.len() {
        0 => Err(CompileError::new(ErrorKind::DependencyNotFound(
            canonical_name.to_string(),
        ))),
        1 => Ok(hits.remove(0)),
        _ => Err(CompileError::new(ErrorKind::AmbiguousDependency {
            name: canonical_name.to_string(),
            candidates: hits
                .iter()
                .map(|(path, _)| path.display().to_string())
                .collect(),
        })),
    }
}

fn probe_root(root: &Path, relative: &Path) -> Option<(PathBuf, ImportFormat)> {
    let precompiled = root.join(relative).with_extension("api");
    if precompiled.is_file() {
        return Some((precompiled, ImportFormat::Precompiled));
    }
    let source = root.join(relative).with_extension("orb");
    if source.is_file() {
        return Some((source, ImportFormat::Source));
    }
    None
}
