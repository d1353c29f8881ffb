//! Module cache with dependency edges
//!
//! Every loaded module is recorded under its canonical path together with
//! the modules it required. Eviction walks those edges from a root, so
//! reloading an entry module also reloads everything it pulled in.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use boa_gc::{Finalize, Trace};

/// A cached module and the modules it required, in first-require order.
#[derive(Debug, Clone, Trace, Finalize)]
pub struct ModuleRecord<T> {
    pub value: T,
    pub children: Vec<PathBuf>,
}

/// Arena of loaded modules keyed by canonical path.
///
/// Edges are plain paths, so cycles between modules need no reference
/// counting and an edge to a module that was never loaded is harmless.
#[derive(Debug, Clone, Trace, Finalize)]
pub struct ModuleGraph<T> {
    records: HashMap<PathBuf, ModuleRecord<T>>,
}

impl<T> Default for ModuleGraph<T> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

impl<T> ModuleGraph<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.records.contains_key(path)
    }

    pub fn get(&self, path: &Path) -> Option<&T> {
        self.records.get(path).map(|record| &record.value)
    }

    /// Modules required by `path`, empty when `path` is not cached.
    pub fn children(&self, path: &Path) -> &[PathBuf] {
        self.records
            .get(path)
            .map(|record| record.children.as_slice())
            .unwrap_or(&[])
    }

    /// Cache a module, replacing any previous record and its edges.
    pub fn insert(&mut self, path: PathBuf, value: T) {
        self.records.insert(
            path,
            ModuleRecord {
                value,
                children: Vec::new(),
            },
        );
    }

    /// Record that `parent` required `child`.
    ///
    /// Returns `false` when the edge already exists or `parent` is not cached.
    pub fn add_dependency(&mut self, parent: &Path, child: &Path) -> bool {
        match self.records.get_mut(parent) {
            Some(record) if !record.children.iter().any(|c| c == child) => {
                record.children.push(child.to_path_buf());
                true
            }
            _ => false,
        }
    }

    /// Evict `root` and every module reachable from it.
    ///
    /// Each module is visited at most once, so shared dependencies and
    /// require cycles terminate. Returns the evicted paths in visit order.
    pub fn evict(&mut self, root: &Path) -> Vec<PathBuf> {
        let mut evicted = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![root.to_path_buf()];

        while let Some(path) = stack.pop() {
            if !visited.insert(path.clone()) {
                continue;
            }
            if let Some(mut record) = self.records.remove(&path) {
                stack.extend(std::mem::take(&mut record.children).into_iter().rev());
                evicted.push(path);
            }
        }

        evicted
    }
}
