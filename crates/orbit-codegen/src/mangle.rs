//! IR name mangling.
//!
//! User-facing identifiers and type names pass through a stable hex digest
//! before reaching the IR layer: operator symbols and dotted paths are not
//! legal IR identifiers, and the digest only has to be collision-free per
//! module. Digests are memoised per codegen context.

use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};

/// Digest a full name into an identifier-safe IR name.
pub fn digest(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    // Leading letter keeps the name valid wherever identifiers must not
    // start with a digit.
    format!("o{:x}", hasher.finalize())
}

/// A memoising wrapper around [`digest`].
#[derive(Debug, Default)]
pub struct Mangler {
    cache: FxHashMap<String, String>,
}

impl Mangler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mangle(&mut self, name: &str) -> String {
        if let Some(hit) = self.cache.get(name) {
            return hit.clone();
        }
        let mangled = digest(name);
        self.cache.insert(name.to_string(), mangled.clone());
        mangled
    }
}
