use super::{load_metric, load_nbest, path_list};
use crate::reports;
use clap::{ArgMatches, Args};
use mert_core::config::Config;
use mert_core::line_search::LineSearch;
use mert_core::nbest::Reachability;
use mert_core::optimizer::OptimizerRegistry;
use mert_core::tuner::{PointReport, TuneCallback, TuneOptions, Tuner};
use mert_core::weights::{read_weights, write_weights};
use mert_core::{eval, maximizer, MertResult, TuneContext, WeightVector};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Args, Debug, Clone)]
pub struct TuneArgs {
    /// Metric name, e.g. "bleu" or "bleu:4"
    pub metric: String,

    /// Cumulative n-best list
    pub nbest: String,

    /// N-best list of the latest decoder run ("-" for none)
    pub local_nbest: String,

    /// Comma-separated starting weight files; the first is the initial point
    pub initial: String,

    /// Comma-separated reference files, parallel to the n-best sentences
    pub refs: String,

    /// Where to write the tuned weights (".json" for JSON)
    pub out: PathBuf,

    #[command(flatten)]
    pub config: Config,

    /// JSON config file; explicit command-line flags take precedence
    #[arg(long = "config")]
    pub config_file: Option<PathBuf>,

    /// Weights file of features held at fixed values
    #[arg(long)]
    pub fixed: Option<PathBuf>,

    /// Per-point results as CSV
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Write the model 1-best translations under the tuned weights
    #[arg(long)]
    pub argmax_out: Option<PathBuf>,
}

struct CliProgress {
    total: usize,
    done: AtomicUsize,
}

impl TuneCallback for CliProgress {
    fn on_point(&self, report: &PointReport) -> bool {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "➡️  {}/{} points done (point {}: {:.6})",
            done, self.total, report.point, report.final_score
        );
        true
    }
}

fn resolve_config(args: &TuneArgs, matches: &ArgMatches) -> MertResult<Config> {
    match &args.config_file {
        Some(path) => {
            info!("⚖️  Loading config from: {}", path.display());
            let mut config = Config::load_from_file(path)?;
            config.merge_from_cli(&args.config, matches);
            Ok(config)
        }
        None => Ok(args.config.clone()),
    }
}

fn fixed_weights(args: &TuneArgs, config: &Config) -> MertResult<WeightVector> {
    let mut fixed = match &args.fixed {
        Some(path) => read_weights(path)?,
        None => WeightVector::new(),
    };
    for name in &config.tune.disabled {
        if !fixed.contains(name) {
            fixed.set(name, 0.0);
        }
    }
    Ok(fixed)
}

pub fn run(args: TuneArgs, matches: &ArgMatches) -> MertResult<()> {
    info!("🚀 Initializing MERT...");
    let config = resolve_config(&args, matches)?;

    let initial: Vec<WeightVector> = path_list(&args.initial)
        .iter()
        .map(read_weights)
        .collect::<MertResult<_>>()?;
    let first = initial.first().cloned().unwrap_or_default();

    let mut nbest = load_nbest(&args.nbest)?;
    if args.local_nbest != "-" {
        let local = nbest.load_local(&args.local_nbest)?;
        if config.tune.reachability != Reachability::KeepAll {
            let before = nbest.candidate_count();
            nbest = nbest.filter_reachable(&local, &first, config.tune.reachability)?;
            info!(
                "✂️  Reachability '{}': {} -> {} candidates",
                config.tune.reachability,
                before,
                nbest.candidate_count()
            );
        }
    }
    let nbest = Arc::new(nbest);

    let metric = load_metric(&args.metric, &args.refs, &nbest)?;
    let fixed = fixed_weights(&args, &config)?;
    if !fixed.is_empty() {
        info!("⚖️  {} fixed feature(s)", fixed.len());
    }

    let ctx = Arc::new(
        TuneContext::builder()
            .nbest(Arc::clone(&nbest))
            .metric(metric)
            .fixed(fixed)
            .line_search(LineSearch::from(&config.line_search))
            .max_sweeps(config.tune.max_sweeps)
            .build(),
    );

    let optimizer = OptimizerRegistry::default().resolve(&config.tune.optimizer)?;
    let options = TuneOptions::from(&config);
    let progress = CliProgress {
        total: options.starting_points.max(initial.len()).max(1),
        done: AtomicUsize::new(0),
    };

    let outcome = Tuner::new(Arc::clone(&ctx), optimizer, options).run(initial, &progress)?;

    info!("\n=== 🏆 FINAL RESULT ===");
    info!(
        "{}: {:.6} -> {:.6} (point {})",
        ctx.metric.name(),
        outcome.initial_score,
        outcome.final_score,
        outcome.best_point
    );
    if outcome.final_score < outcome.initial_score {
        warn!("⚠️  Tuned weights score below the initial point");
    }

    let strategy = maximizer::build(&config.search);
    let (_, oracle) = eval::oracle(&nbest, ctx.metric.as_ref(), strategy.as_ref())?;
    info!(
        "🎯 Oracle ({}): {:.6}, tuned weights reach {:.1}%",
        config.search.maximizer,
        oracle,
        if oracle > 0.0 { 100.0 * outcome.final_score / oracle } else { 100.0 }
    );

    write_weights(&args.out, &outcome.best_weights)?;
    info!("Weights written to {}", args.out.display());

    if let Some(path) = &args.report {
        let mut writer = csv::Writer::from_path(path)?;
        for report in &outcome.points {
            writer.serialize(report)?;
        }
        writer.flush()?;
        info!("Report written to {}", path.display());
    }

    if let Some(path) = &args.argmax_out {
        let mut out = BufWriter::new(File::create(path)?);
        for cand in eval::argmax(&nbest, &outcome.best_weights) {
            writeln!(out, "{}", cand.tokens.join(" "))?;
        }
        out.flush()?;
    }

    reports::print_weights(&outcome.best_weights);
    reports::print_points(&outcome.points);
    println!("{} oracle ({}): {:.6}", ctx.metric.name(), config.search.maximizer, oracle);
    Ok(())
}
