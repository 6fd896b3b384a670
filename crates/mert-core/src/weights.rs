use crate::error::{MertError, MertResult};
use crate::features::FeatureIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Named feature weights. Absent features weigh 0.
///
/// Backed by a `BTreeMap` so iteration order (and everything derived from it,
/// such as coordinate sweeps and seeds) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightVector {
    weights: BTreeMap<String, f64>,
}

impl WeightVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> f64 {
        self.weights.get(name).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.weights.insert(name.to_string(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<f64> {
        self.weights.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.weights.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.weights.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.weights.keys().map(|k| k.as_str())
    }

    pub fn l1_norm(&self) -> f64 {
        self.weights.values().map(|v| v.abs()).sum()
    }

    pub fn l2_norm(&self) -> f64 {
        self.weights.values().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Scales to unit L1 norm. Returns `None` for the zero vector.
    pub fn normalized_l1(&self) -> Option<Self> {
        let norm = self.l1_norm();
        if norm == 0.0 || !norm.is_finite() {
            return None;
        }
        Some(self.scaled(1.0 / norm))
    }

    pub fn scaled(&self, factor: f64) -> Self {
        self.weights
            .iter()
            .map(|(k, v)| (k.clone(), v * factor))
            .collect()
    }

    /// `self += scale * other`
    pub fn add_scaled(&mut self, other: &WeightVector, scale: f64) {
        for (name, value) in &other.weights {
            *self.weights.entry(name.clone()).or_insert(0.0) += scale * value;
        }
    }

    pub fn dot(&self, other: &WeightVector) -> f64 {
        self.weights
            .iter()
            .map(|(name, v)| v * other.get(name))
            .sum()
    }

    /// Copy without any feature named in `fixed`.
    pub fn without(&self, fixed: &WeightVector) -> Self {
        self.weights
            .iter()
            .filter(|(k, _)| !fixed.contains(k))
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Copy with every feature of `fixed` attached at its fixed value.
    pub fn with(&self, fixed: &WeightVector) -> Self {
        let mut out = self.clone();
        for (name, value) in &fixed.weights {
            out.weights.insert(name.clone(), *value);
        }
        out
    }

    /// Sum of squared differences over the union of both supports.
    pub fn ssd(&self, other: &WeightVector) -> f64 {
        let mut total = 0.0;
        for (name, v) in &self.weights {
            let d = v - other.get(name);
            total += d * d;
        }
        for (name, v) in &other.weights {
            if !self.weights.contains_key(name) {
                total += v * v;
            }
        }
        total
    }

    /// Registers missing names at weight 0.
    pub fn extend_zero<'a, I: IntoIterator<Item = &'a str>>(&mut self, names: I) {
        for name in names {
            self.weights.entry(name.to_string()).or_insert(0.0);
        }
    }

    /// Dense view over `index`. Features unknown to the index cannot affect any
    /// candidate score and are dropped.
    pub fn to_dense(&self, index: &FeatureIndex) -> Vec<f64> {
        let mut dense = vec![0.0; index.len()];
        for (name, &value) in &self.weights {
            if let Some(id) = index.get(name) {
                if id < dense.len() {
                    dense[id] = value;
                }
            }
        }
        dense
    }

    pub fn from_dense(dense: &[f64], index: &FeatureIndex) -> Self {
        dense
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.0)
            .filter_map(|(id, v)| index.name(id).map(|name| (name, *v)))
            .collect()
    }

    /// Weight values in ascending order, used for seed derivation.
    pub fn sorted_values(&self) -> Vec<f64> {
        let mut values: Vec<f64> = self.weights.values().copied().collect();
        values.sort_by(f64::total_cmp);
        values
    }

    pub fn is_finite(&self) -> bool {
        self.weights.values().all(|v| v.is_finite())
    }
}

impl FromIterator<(String, f64)> for WeightVector {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            weights: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<(&'a str, f64)> for WeightVector {
    fn from_iter<I: IntoIterator<Item = (&'a str, f64)>>(iter: I) -> Self {
        Self {
            weights: iter.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }
}

// ── File I/O ──

fn is_json<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Reads a weights file. `.json` files hold a JSON object, anything else is
/// the `name value` text format.
pub fn read_weights<P: AsRef<Path>>(path: P) -> MertResult<WeightVector> {
    let content = fs::read_to_string(&path)?;
    if is_json(&path) {
        return Ok(serde_json::from_str(&content)?);
    }
    parse_weights(&content, &path.as_ref().display().to_string())
}

pub fn parse_weights(content: &str, file: &str) -> MertResult<WeightVector> {
    let mut wts = WeightVector::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (name, value) = match (fields.next(), fields.next(), fields.next()) {
            (Some(name), Some(value), None) => (name, value),
            _ => {
                return Err(MertError::load(
                    file,
                    line_no + 1,
                    format!("expected 'name value', got '{}'", line),
                ))
            }
        };
        let value: f64 = match value.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            Ok(_) => {
                return Err(MertError::load(
                    file,
                    line_no + 1,
                    format!("non-finite weight for '{}': '{}'", name, value),
                ))
            }
            Err(_) => {
                return Err(MertError::load(
                    file,
                    line_no + 1,
                    format!("bad weight value '{}'", value),
                ))
            }
        };
        wts.set(name, value);
    }
    Ok(wts)
}

/// Text rendering: descending |value|, then name; zero weights omitted.
pub fn format_weights(wts: &WeightVector) -> String {
    let mut entries: Vec<(&str, f64)> = wts.iter().filter(|(_, v)| *v != 0.0).collect();
    entries.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then_with(|| a.0.cmp(b.0)));

    let mut out = String::new();
    for (name, value) in entries {
        out.push_str(&format!("{} {}\n", name, value));
    }
    out
}

pub fn write_weights<P: AsRef<Path>>(path: P, wts: &WeightVector) -> MertResult<()> {
    if is_json(&path) {
        let nonzero: WeightVector = wts
            .iter()
            .filter(|(_, v)| *v != 0.0)
            .collect();
        fs::write(&path, serde_json::to_string_pretty(&nonzero)?)?;
    } else {
        fs::write(&path, format_weights(wts))?;
    }
    Ok(())
}
