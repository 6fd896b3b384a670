pub mod config;
pub mod consts;
pub mod context;
pub mod error;
pub mod eval;
pub mod features;
pub mod line_search;
pub mod maximizer;
pub mod metric;
pub mod nbest;
pub mod online;
pub mod optimizer;
pub mod tuner;
pub mod util;
pub mod weights;

pub use crate::context::TuneContext;
pub use crate::error::{MertError, MertResult};
pub use crate::nbest::{Candidate, NBestList};
pub use crate::weights::WeightVector;
