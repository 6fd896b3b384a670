use super::{load_metric, load_nbest};
use clap::Args;
use mert_core::config::MaximizerParams;
use mert_core::weights::read_weights;
use mert_core::{eval, maximizer, MertResult};
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct EvalArgs {
    /// Metric name, e.g. "bleu" or "bleu:4"
    pub metric: String,

    pub nbest: String,

    pub weights: PathBuf,

    /// Comma-separated reference files
    pub refs: String,

    #[command(flatten)]
    pub search: MaximizerParams,
}

pub fn run(args: EvalArgs) -> MertResult<()> {
    let nbest = load_nbest(&args.nbest)?;
    let metric = load_metric(&args.metric, &args.refs, &nbest)?;
    let weights = read_weights(&args.weights)?;

    let model = eval::evaluate(&nbest, metric.as_ref(), &weights);
    info!("Computing oracle with '{}'", args.search.maximizer);
    let strategy = maximizer::build(&args.search);
    let (_, oracle) = eval::oracle(&nbest, metric.as_ref(), strategy.as_ref())?;

    println!("{} model 1-best: {:.6}", metric.name(), model);
    println!("{} oracle: {:.6}", metric.name(), oracle);
    Ok(())
}
