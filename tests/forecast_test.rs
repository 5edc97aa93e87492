//! Forecast readiness across the 10 dimensions

mod common;

use common::*;
use salesbrain::graph::{CriterionId, DealOutcome, SignOff, Status, StepId};
use salesbrain::{DealEngine, EngineConfig, ForecastDimension, StepAttributes};
use std::sync::Arc;

/// One step per dimension, all bypassed except Technical which is worked to completion
fn ten_dimension_deal() -> (DealEngine, StepId) {
    let mut deal = new_deal("forecast");
    for dimension in ForecastDimension::ALL {
        if dimension == ForecastDimension::Technical {
            continue;
        }
        let id = format!("{:?}", dimension).to_lowercase();
        deal.create_step(
            id.as_str(),
            StepAttributes::named(dimension.label()).dimension(dimension),
        )
        .unwrap();
        deal.set_status(StepId::new(id.as_str()), Status::Bypassed)
            .unwrap();
    }

    let (step, actor, criterion) = simple_step(&mut deal, "technical", ForecastDimension::Technical);
    deal.set_status(step.clone(), Status::InProgress).unwrap();
    deal.set_status(criterion, Status::Completed).unwrap();
    evidence(&mut deal, &step);
    deal.record_sign_off(&actor, SignOff::Granted).unwrap();
    (deal, step)
}

#[test]
fn test_every_dimension_closed_makes_deal_forecastable() {
    let (deal, _) = ten_dimension_deal();
    let card = deal.forecast_scorecard();

    assert_eq!(card.dimensions.len(), 10);
    assert_eq!(card.closed_count(), 10);
    assert!(card.dimensions.iter().all(|d| d.covered));
    assert!(card.forecast_ready);
    assert_eq!(deal.outcome(), DealOutcome::ClosedWon);
}

#[test]
fn test_reopened_step_blocks_its_dimension() {
    let (mut deal, step) = ten_dimension_deal();
    deal.set_status(CriterionId::new("technical-c"), Status::InProgress)
        .unwrap();

    let card = deal.forecast_scorecard();
    assert!(!card.forecast_ready);
    assert_eq!(card.closed_count(), 9);
    let technical = card.dimension(ForecastDimension::Technical).unwrap();
    assert!(!technical.closed);
    assert_eq!(technical.blocking_steps, vec![step]);
    assert_eq!(deal.outcome(), DealOutcome::Open);
}

#[test]
fn test_uncovered_dimension_policy() {
    let mut deal = new_deal("uncovered");
    let (step, actor, criterion) = simple_step(&mut deal, "budget", ForecastDimension::Budget);
    deal.set_status(step.clone(), Status::InProgress).unwrap();
    deal.set_status(criterion, Status::Completed).unwrap();
    evidence(&mut deal, &step);
    deal.record_sign_off(&actor, SignOff::Granted).unwrap();

    // Every step is closed but nine dimensions have no step at all
    assert_eq!(deal.outcome(), DealOutcome::ClosedWon);
    let card = deal.forecast_scorecard();
    assert!(!card.forecast_ready);
    assert_eq!(card.closed_count(), 1);

    let mut lenient = EngineConfig::default();
    lenient.forecast.uncovered_dimension_closed = true;
    let reloaded = DealEngine::import(&deal.export(), Arc::new(lenient)).unwrap();
    let card = reloaded.forecast_scorecard();
    assert!(card.forecast_ready);
    assert!(!card.dimension(ForecastDimension::Contract).unwrap().covered);
}
