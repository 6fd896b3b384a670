use crate::consts::*;
use crate::error::MertResult;
use crate::line_search::Smoothing;
use crate::maximizer::MaximizerKind;
use crate::nbest::Reachability;
use crate::tuner::TieBreak;
use clap::{parser::ValueSource, ArgMatches, Args};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Args, Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[command(flatten)]
    #[serde(default)]
    pub tune: TuneParams,
    #[command(flatten)]
    #[serde(default)]
    pub line_search: LineSearchParams,
    #[command(flatten)]
    #[serde(default)]
    pub search: MaximizerParams,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TuneParams {
    /// Number of starting points (initial + previous + random)
    #[arg(short = 'p', long, default_value_t = DEFAULT_STARTING_POINTS)]
    pub starting_points: usize,

    /// Per-point optimizer, e.g. "koehn", "cer+powell", "random-better~"
    #[arg(short = 'o', long, default_value = "koehn")]
    pub optimizer: String,

    /// Worker threads (0 = all cores)
    #[arg(short = 't', long, default_value_t = DEFAULT_THREADS)]
    pub threads: usize,

    #[arg(short = 's', long, default_value = DEFAULT_SEED)]
    pub seed: String,

    /// Feature to exclude from tuning (held at weight 0); repeatable
    #[arg(short = 'D', long = "disable")]
    pub disabled: Vec<String>,

    #[arg(long, default_value = "lowest-point")]
    pub tie_break: TieBreak,

    #[arg(long, default_value = "keep-all")]
    pub reachability: Reachability,

    /// Cap on sweeps of iterative per-point optimizers
    #[arg(long, default_value_t = 100)]
    pub max_sweeps: usize,
}

impl Default for TuneParams {
    fn default() -> Self {
        Self {
            starting_points: DEFAULT_STARTING_POINTS,
            optimizer: "koehn".to_string(),
            threads: DEFAULT_THREADS,
            seed: DEFAULT_SEED.to_string(),
            disabled: Vec::new(),
            tie_break: TieBreak::default(),
            reachability: Reachability::default(),
            max_sweeps: 100,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSearchParams {
    /// Segments on each side used to smooth segment scores (0 = off)
    #[arg(long, default_value_t = DEFAULT_SEARCH_WINDOW)]
    pub search_window: usize,

    #[arg(long, default_value = "min")]
    pub smoothing: Smoothing,

    /// L1-normalize weights after each line search
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub normalize: bool,
}

impl Default for LineSearchParams {
    fn default() -> Self {
        Self {
            search_window: DEFAULT_SEARCH_WINDOW,
            smoothing: Smoothing::default(),
            normalize: true,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaximizerParams {
    /// Strategy for oracle selections
    #[arg(long, default_value = "hill-climbing")]
    pub maximizer: MaximizerKind,

    #[arg(long, default_value_t = 10)]
    pub beam_width: usize,

    #[arg(long, default_value_t = 5)]
    pub agenda_window: usize,
}

impl Default for MaximizerParams {
    fn default() -> Self {
        Self {
            maximizer: MaximizerKind::default(),
            beam_width: 10,
            agenda_window: 5,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> MertResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Overrides fields that were given explicitly on the command line.
    pub fn merge_from_cli(&mut self, cli: &Config, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($section:ident . $field:ident) => {
                if matches.value_source(stringify!($field)) == Some(ValueSource::CommandLine) {
                    self.$section.$field = cli.$section.$field.clone();
                }
            };
        }

        update_if_present!(tune.starting_points);
        update_if_present!(tune.optimizer);
        update_if_present!(tune.threads);
        update_if_present!(tune.seed);
        update_if_present!(tune.disabled);
        update_if_present!(tune.tie_break);
        update_if_present!(tune.reachability);
        update_if_present!(tune.max_sweeps);

        update_if_present!(line_search.search_window);
        update_if_present!(line_search.smoothing);
        update_if_present!(line_search.normalize);

        update_if_present!(search.maximizer);
        update_if_present!(search.beam_width);
        update_if_present!(search.agenda_window);
    }
}
