pub mod eval;
pub mod tune;

use mert_core::features::FeatureIndex;
use mert_core::metric::{self, load_references, Metric};
use mert_core::{MertResult, NBestList};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Splits a comma-separated path list.
pub fn path_list(arg: &str) -> Vec<PathBuf> {
    arg.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Loads references for `nbest` and resolves the metric over them.
pub fn load_metric(name: &str, refs: &str, nbest: &NBestList) -> MertResult<Arc<dyn Metric>> {
    let paths = path_list(refs);
    info!("📂 Loading {} reference file(s)", paths.len());
    let references = load_references(&paths)?;
    let metric = metric::create(name, Arc::new(references))?;
    metric.prepare(nbest)?;
    Ok(metric)
}

pub fn load_nbest(path: &str) -> MertResult<NBestList> {
    info!("📂 Loading n-best list: {}", path);
    NBestList::load(path, Arc::new(FeatureIndex::new()))
}
