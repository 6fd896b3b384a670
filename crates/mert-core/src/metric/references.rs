use crate::error::{MertError, MertResult};
use std::fs;
use std::path::Path;
use tracing::info;

/// Tokenized references, indexed `[sentence][reference]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct References {
    sentences: Vec<Vec<Vec<String>>>,
}

impl References {
    pub fn new(sentences: Vec<Vec<Vec<String>>>) -> Self {
        Self { sentences }
    }

    /// Builds single-reference data from raw lines.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        Self {
            sentences: lines.iter().map(|l| vec![tokenize(l.as_ref())]).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn get(&self, sentence: usize) -> &[Vec<String>] {
        self.sentences
            .get(sentence)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(String::from).collect()
}

/// Loads parallel reference files, one reference per line.
/// Every file must have the same number of lines.
pub fn load_references<P: AsRef<Path>>(paths: &[P]) -> MertResult<References> {
    let mut sentences: Vec<Vec<Vec<String>>> = Vec::new();

    for (i, path) in paths.iter().enumerate() {
        info!("📂 Loading references: {}", path.as_ref().display());
        let content = fs::read_to_string(path)?;
        let lines: Vec<&str> = content.lines().collect();

        if i == 0 {
            sentences = vec![Vec::with_capacity(paths.len()); lines.len()];
        } else if lines.len() != sentences.len() {
            return Err(MertError::LengthMismatch {
                what: format!("reference file {}", path.as_ref().display()),
                expected: sentences.len(),
                found: lines.len(),
            });
        }

        for (refs, line) in sentences.iter_mut().zip(lines) {
            refs.push(tokenize(line));
        }
    }

    Ok(References { sentences })
}
