use fnv::FnvHashMap;
use std::sync::{PoisonError, RwLock};

/// Append-only bijection between feature names and dense positions.
///
/// Indices are never reassigned, so dense arrays built against an older
/// snapshot stay valid (they are simply shorter).
#[derive(Debug, Default)]
pub struct FeatureIndex {
    inner: RwLock<IndexInner>,
}

#[derive(Debug, Default)]
struct IndexInner {
    ids: FnvHashMap<String, usize>,
    names: Vec<String>,
}

impl FeatureIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `name`, registering it if unseen.
    pub fn index_of(&self, name: &str) -> usize {
        if let Some(id) = self.get(name) {
            return id;
        }
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(&id) = inner.ids.get(name) {
            return id;
        }
        let id = inner.names.len();
        inner.names.push(name.to_string());
        inner.ids.insert(name.to_string(), id);
        id
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.ids.get(name).copied()
    }

    pub fn name(&self, id: usize) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.names.get(id).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.names.clone()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sparse feature values keyed by `FeatureIndex` position, sorted by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(usize, f64)>,
}

impl FeatureVector {
    /// Builds a vector from named values. Repeated names are summed.
    pub fn from_named<'a, I>(pairs: I, index: &FeatureIndex) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut entries: Vec<(usize, f64)> = pairs
            .into_iter()
            .map(|(name, value)| (index.index_of(name), value))
            .collect();
        entries.sort_by_key(|&(id, _)| id);

        let mut merged: Vec<(usize, f64)> = Vec::with_capacity(entries.len());
        for (id, value) in entries {
            match merged.last_mut() {
                Some(last) if last.0 == id => last.1 += value,
                _ => merged.push((id, value)),
            }
        }
        Self { entries: merged }
    }

    #[inline(always)]
    pub fn dot(&self, dense: &[f64]) -> f64 {
        self.entries
            .iter()
            .map(|&(id, v)| dense.get(id).copied().unwrap_or(0.0) * v)
            .sum()
    }

    pub fn get(&self, id: usize) -> f64 {
        self.entries
            .binary_search_by_key(&id, |&(i, _)| i)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
