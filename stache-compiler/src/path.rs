use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

/// Sigil that opens a block helper call site, `{{#name}}`.
pub const BLOCK_SIGIL: char = '#';

/// Sigil that opens an inverted section, `{{^name}}`.
pub const INVERSE_SIGIL: char = '^';

/// Canonical data behind an interned helper name.
#[derive(Debug)]
pub struct PathInfo {
    name: String,
}

impl PathInfo {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Interned helper name. Two ids are equal only when they point at the same
/// [`PathInfo`], so comparison and hashing never look at the string.
#[derive(Clone)]
pub struct PathId(Arc<PathInfo>);

impl PathId {
    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl PartialEq for PathId {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl Eq for PathId {}

impl Hash for PathId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

impl fmt::Debug for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathId({:?})", self.name())
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Default)]
pub struct PathStore {
    paths: RwLock<HashMap<String, PathId>>,
}

static GLOBAL_STORE: OnceLock<PathStore> = OnceLock::new();

impl PathStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide store shared by every engine.
    pub fn global() -> &'static PathStore {
        GLOBAL_STORE.get_or_init(PathStore::new)
    }

    /// Intern through the global store.
    pub fn intern(name: &str) -> PathId {
        Self::global().get_or_add(name)
    }

    /// Returns the canonical id for `name`. A leading block or inverse sigil
    /// is ignored, so `#each`, `^each` and `each` share one id.
    pub fn get_or_add(&self, name: &str) -> PathId {
        let trimmed = trim_sigil(name);
        {
            let paths = self.paths.read();
            if let Some(id) = paths.get(trimmed) {
                return id.clone();
            }
        }

        let mut paths = self.paths.write();
        if let Some(id) = paths.get(trimmed) {
            return id.clone();
        }
        let id = PathId(Arc::new(PathInfo {
            name: trimmed.to_string(),
        }));
        paths.insert(trimmed.to_string(), id.clone());
        id
    }

    pub fn len(&self) -> usize {
        self.paths.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn trim_sigil(name: &str) -> &str {
    name.strip_prefix(&[BLOCK_SIGIL, INVERSE_SIGIL][..])
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigil_and_bare_name_share_identity() {
        let store = PathStore::new();
        let block = store.get_or_add("#each");
        let bare = store.get_or_add("each");
        assert!(PathId::ptr_eq(&block, &bare));
        assert_eq!(block.name(), "each");
        assert_eq!(store.len(), 1);
        assert!(PathId::ptr_eq(&block, &store.get_or_add("^each")));
    }

    #[test]
    fn inline_marker_keeps_its_star() {
        let store = PathStore::new();
        let inline = store.get_or_add("#*inline");
        assert_eq!(inline.name(), "*inline");
        assert_ne!(inline, store.get_or_add("inline"));
    }
}
