//! Forecast evaluator
//!
//! Maps rolled-up step state onto the 10 forecast readiness dimensions.

pub mod dimension;

pub use dimension::ForecastDimension;

use crate::config::ForecastConfig;
use crate::graph::{DealId, StepId};
use crate::rollup::RollupSnapshot;
use serde::{Deserialize, Serialize};

/// Per-dimension result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionReport {
    pub dimension: ForecastDimension,
    pub closed: bool,
    /// At least one step is tagged with this dimension
    pub covered: bool,
    pub blocking_steps: Vec<StepId>,
}

/// 10-dimension breakdown for one deal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub deal: DealId,
    pub dimensions: Vec<DimensionReport>,
    pub forecast_ready: bool,
}

impl Scorecard {
    pub fn dimension(&self, dimension: ForecastDimension) -> Option<&DimensionReport> {
        self.dimensions.iter().find(|d| d.dimension == dimension)
    }

    pub fn closed_count(&self) -> usize {
        self.dimensions.iter().filter(|d| d.closed).count()
    }
}

pub struct ForecastEvaluator<'a> {
    config: &'a ForecastConfig,
}

impl<'a> ForecastEvaluator<'a> {
    pub fn new(config: &'a ForecastConfig) -> Self {
        ForecastEvaluator { config }
    }

    pub fn scorecard(&self, deal: &DealId, snapshot: &RollupSnapshot) -> Scorecard {
        let dimensions: Vec<DimensionReport> = ForecastDimension::ALL
            .into_iter()
            .map(|dimension| {
                let tagged: Vec<_> = snapshot
                    .steps
                    .iter()
                    .filter(|(_, step)| step.dimension == Some(dimension))
                    .collect();
                let blocking_steps: Vec<StepId> = tagged
                    .iter()
                    .filter(|(_, step)| !step.effective.is_closed())
                    .map(|(id, _)| (*id).clone())
                    .collect();
                let covered = !tagged.is_empty();
                let closed = if covered {
                    blocking_steps.is_empty()
                } else {
                    self.config.uncovered_dimension_closed
                };
                DimensionReport {
                    dimension,
                    closed,
                    covered,
                    blocking_steps,
                }
            })
            .collect();

        let forecast_ready = dimensions.iter().all(|d| d.closed);
        Scorecard {
            deal: deal.clone(),
            dimensions,
            forecast_ready,
        }
    }
}
