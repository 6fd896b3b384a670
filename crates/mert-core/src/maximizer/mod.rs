pub mod agenda;
pub mod beam;
pub mod greedy;
pub mod hill_climbing;
pub mod state;

pub use self::agenda::Agenda;
pub use self::beam::Beam;
pub use self::greedy::Greedy;
pub use self::hill_climbing::{ClimbTrace, HillClimbing};
pub use self::state::MultiTranslationState;

use crate::config::MaximizerParams;
use crate::error::MertResult;
use crate::metric::Metric;
use crate::nbest::{Candidate, NBestList};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Picks one candidate per sentence so that the corpus metric is maximal.
///
/// Implementations return exactly `nbest.len()` candidates in sentence order
/// and never modify the list.
pub trait MetricMaximizer: Send + Sync {
    fn maximize<'a>(
        &self,
        nbest: &'a NBestList,
        metric: &dyn Metric,
    ) -> MertResult<Vec<&'a Candidate>>;
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, EnumIter, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum MaximizerKind {
    Greedy,
    #[default]
    HillClimbing,
    Beam,
    Agenda,
}

pub fn build(params: &MaximizerParams) -> Box<dyn MetricMaximizer> {
    match params.maximizer {
        MaximizerKind::Greedy => Box::new(Greedy),
        MaximizerKind::HillClimbing => Box::new(HillClimbing::new()),
        MaximizerKind::Beam => Box::new(Beam::new(params.beam_width)),
        MaximizerKind::Agenda => Box::new(Agenda::new(params.agenda_window)),
    }
}
