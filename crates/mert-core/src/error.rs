use thiserror::Error;

#[derive(Error, Debug)]
pub enum MertError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Load Error in {file}:{line}: {msg}")]
    Load {
        file: String,
        line: usize,
        msg: String,
    },

    #[error("Load Error: sentence {sentence} has an empty candidate list")]
    EmptyNBest { sentence: usize },

    #[error("Load Error: {what} has {found} entries, expected {expected}")]
    LengthMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("Search Exhausted: {0}")]
    SearchExhausted(String),

    #[error("Numeric Error: {0}")]
    Numeric(String),

    #[error("Unknown optimizer '{0}'")]
    UnknownOptimizer(String),

    #[error("Unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("No starting point produced a usable weight vector")]
    NoSuccessfulPoint,
}

impl MertError {
    pub fn load(file: &str, line: usize, msg: impl Into<String>) -> Self {
        MertError::Load {
            file: file.to_string(),
            line,
            msg: msg.into(),
        }
    }

    /// Errors that indicate a defect rather than a bad starting point.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MertError::Numeric(_) | MertError::SearchExhausted(_)
        )
    }
}

pub type MertResult<T> = Result<T, MertError>;
