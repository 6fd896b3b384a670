use crate::error::{MertError, MertResult};
use crate::features::{FeatureIndex, FeatureVector};
use crate::util;
use crate::weights::WeightVector;
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString};
use tracing::{debug, info};

/// One hypothesis for one sentence. Immutable once the list is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub sentence: usize,
    /// Position within its sentence's list.
    pub rank: usize,
    pub tokens: Vec<String>,
    pub features: FeatureVector,
    /// Total score reported by the decoder.
    pub decoder_score: f64,
}

impl Candidate {
    pub fn new(tokens: Vec<String>, features: FeatureVector) -> Self {
        Self {
            sentence: 0,
            rank: 0,
            tokens,
            features,
            decoder_score: 0.0,
        }
    }

    /// Linear model score under dense weights.
    #[inline(always)]
    pub fn score(&self, dense: &[f64]) -> f64 {
        self.features.dot(dense)
    }
}

/// What to do with cumulative n-best entries the current model can no longer reach.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, EnumIter, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Reachability {
    #[default]
    KeepAll,
    /// Drop entries scoring above the worst local candidate, then add the local list.
    Unreachable,
    /// Drop entries scoring above the best local candidate.
    StrictlyUnreachable,
}

/// Per-sentence candidate lists. Every sentence has at least one candidate.
#[derive(Debug, Clone)]
pub struct NBestList {
    lists: Vec<Vec<Candidate>>,
    index: Arc<FeatureIndex>,
}

impl NBestList {
    /// Takes ownership of `lists`, stamping sentence ids and ranks.
    pub fn from_lists(mut lists: Vec<Vec<Candidate>>, index: Arc<FeatureIndex>) -> MertResult<Self> {
        for (sentence, list) in lists.iter_mut().enumerate() {
            if list.is_empty() {
                return Err(MertError::EmptyNBest { sentence });
            }
            for (rank, cand) in list.iter_mut().enumerate() {
                cand.sentence = sentence;
                cand.rank = rank;
            }
        }
        Ok(Self { lists, index })
    }

    pub fn load<P: AsRef<Path>>(path: P, index: Arc<FeatureIndex>) -> MertResult<Self> {
        let label = path.as_ref().display().to_string();
        info!("📂 Loading n-best list: {}", label);

        let content = fs::read_to_string(&path)?;
        let list = Self::parse(&content, &label, index)?;

        let digest = util::calculate_file_hash(&path)?;
        info!(
            "   {} sentences, {} candidates, {} features (sha256 {})",
            list.len(),
            list.candidate_count(),
            list.index.len(),
            &digest[..12]
        );
        Ok(list)
    }

    /// Loads a per-iteration n-best list that must line up with `self`.
    pub fn load_local<P: AsRef<Path>>(&self, path: P) -> MertResult<Self> {
        let local = Self::load(path, self.index.clone())?;
        if local.len() != self.len() {
            return Err(MertError::LengthMismatch {
                what: "local n-best list".to_string(),
                expected: self.len(),
                found: local.len(),
            });
        }
        Ok(local)
    }

    /// Parses `id ||| tokens ||| features [||| score]` lines.
    pub fn parse(content: &str, file: &str, index: Arc<FeatureIndex>) -> MertResult<Self> {
        let mut lists: Vec<Vec<Candidate>> = Vec::new();

        for (line_no, line) in content.lines().enumerate() {
            let line_no = line_no + 1;
            if line.trim().is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split("|||").map(str::trim).collect();
            if fields.len() < 3 {
                return Err(MertError::load(
                    file,
                    line_no,
                    "expected 'id ||| tokens ||| features [||| score]'",
                ));
            }

            let id: usize = fields[0].parse().map_err(|_| {
                MertError::load(file, line_no, format!("bad sentence id '{}'", fields[0]))
            })?;
            if id > lists.len() {
                return Err(MertError::load(
                    file,
                    line_no,
                    format!("sentence id {} skips ahead of {}", id, lists.len()),
                ));
            }

            let named = parse_features(fields[2], file, line_no)?;
            let features =
                FeatureVector::from_named(named.iter().map(|(n, v)| (n.as_str(), *v)), &index);

            let decoder_score = match fields.get(3) {
                Some(s) if !s.is_empty() => match s.parse::<f64>() {
                    Ok(v) if v.is_finite() => v,
                    Ok(_) => {
                        return Err(MertError::load(
                            file,
                            line_no,
                            format!("non-finite total score '{}'", s),
                        ))
                    }
                    Err(_) => {
                        return Err(MertError::load(
                            file,
                            line_no,
                            format!("bad total score '{}'", s),
                        ))
                    }
                },
                _ => 0.0,
            };

            if id == lists.len() {
                lists.push(Vec::new());
            }
            lists[id].push(Candidate {
                sentence: id,
                rank: 0,
                tokens: fields[1].split_whitespace().map(String::from).collect(),
                features,
                decoder_score,
            });
        }

        debug!("Parsed {} n-best lists from {}", lists.len(), file);
        Self::from_lists(lists, index)
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn get(&self, sentence: usize) -> &[Candidate] {
        &self.lists[sentence]
    }

    pub fn sentences(&self) -> &[Vec<Candidate>] {
        &self.lists
    }

    pub fn index(&self) -> &Arc<FeatureIndex> {
        &self.index
    }

    pub fn candidate_count(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    /// Number of sentence lists each feature occurs in, keyed by feature index.
    pub fn feature_occurrences(&self) -> FnvHashMap<usize, usize> {
        let mut counts: FnvHashMap<usize, usize> = FnvHashMap::default();
        for list in &self.lists {
            let mut seen: Vec<usize> = list
                .iter()
                .flat_map(|c| c.features.iter().map(|(id, _)| id))
                .collect();
            seen.sort_unstable();
            seen.dedup();
            for id in seen {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Names of all features occurring anywhere in the list, sorted.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .feature_occurrences()
            .keys()
            .filter_map(|&id| self.index.name(id))
            .collect();
        names.sort();
        names
    }

    /// Prunes cumulative entries against a local list under `weights`.
    pub fn filter_reachable(
        &self,
        local: &NBestList,
        weights: &WeightVector,
        policy: Reachability,
    ) -> MertResult<NBestList> {
        if local.len() != self.len() {
            return Err(MertError::LengthMismatch {
                what: "local n-best list".to_string(),
                expected: self.len(),
                found: local.len(),
            });
        }
        if !Arc::ptr_eq(&self.index, &local.index) {
            return Err(MertError::Config(
                "local n-best list must share the cumulative list's feature index".to_string(),
            ));
        }
        if policy == Reachability::KeepAll {
            return Ok(self.clone());
        }

        let dense = weights.to_dense(&self.index);
        let mut dropped = 0usize;

        let lists: Vec<Vec<Candidate>> = self
            .lists
            .iter()
            .zip(&local.lists)
            .map(|(cumulative, loc)| {
                let (lo, hi) = loc.iter().map(|c| c.score(&dense)).fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), s| (lo.min(s), hi.max(s)),
                );
                let bound = match policy {
                    Reachability::Unreachable => lo,
                    _ => hi,
                };
                let mut kept: Vec<Candidate> = cumulative
                    .iter()
                    .filter(|c| c.score(&dense) <= bound)
                    .cloned()
                    .collect();
                dropped += cumulative.len() - kept.len();

                if policy == Reachability::Unreachable || kept.is_empty() {
                    kept.extend(loc.iter().cloned());
                }
                kept
            })
            .collect();

        info!("✂️  Reachability filter ({}): dropped {} entries", policy, dropped);
        NBestList::from_lists(lists, self.index.clone())
    }
}

/// `name=value` pairs, or Moses-style `name: v1 v2 ...` groups.
fn parse_features(field: &str, file: &str, line: usize) -> MertResult<Vec<(String, f64)>> {
    let mut out = Vec::new();
    let mut group: Option<(String, usize)> = None;

    let parse_value = |s: &str| -> MertResult<f64> {
        match s.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            Ok(_) => Err(MertError::load(file, line, format!("non-finite feature value '{}'", s))),
            Err(_) => Err(MertError::load(file, line, format!("bad feature value '{}'", s))),
        }
    };

    let close_group = |group: &Option<(String, usize)>| -> MertResult<()> {
        match group {
            Some((label, 0)) => Err(MertError::load(
                file,
                line,
                format!("feature '{}:' has no values", label),
            )),
            _ => Ok(()),
        }
    };

    for tok in field.split_whitespace() {
        if let Some(label) = tok.strip_suffix(':') {
            close_group(&group)?;
            group = Some((label.to_string(), 0));
        } else if let Some((name, value)) = tok.split_once('=') {
            close_group(&group)?;
            group = None;
            if name.is_empty() {
                return Err(MertError::load(file, line, format!("empty feature name in '{}'", tok)));
            }
            out.push((name.to_string(), parse_value(value)?));
        } else if let Some((label, count)) = group.as_mut() {
            let name = if *count == 0 {
                label.clone()
            } else {
                format!("{}_{}", label, count)
            };
            out.push((name, parse_value(tok)?));
            *count += 1;
        } else {
            return Err(MertError::load(
                file,
                line,
                format!("value '{}' has no feature name", tok),
            ));
        }
    }
    close_group(&group)?;
    Ok(out)
}
