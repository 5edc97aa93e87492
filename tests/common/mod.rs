//! Builders shared by the integration tests
#![allow(dead_code)]

use chrono::NaiveDate;
use salesbrain::graph::{ActorId, CriterionId, EvidenceArtifact, Person, Role, StepId};
use salesbrain::{
    CriterionAttributes, DealEngine, EngineConfig, ForecastDimension, StepAttributes,
};
use std::sync::Arc;

pub const PRODUCT: &str = "analytics";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn config() -> Arc<EngineConfig> {
    Arc::new(EngineConfig::default())
}

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, month, day).unwrap()
}

/// A deal offering one product
pub fn new_deal(id: &str) -> DealEngine {
    init_tracing();
    let mut deal = DealEngine::new(id, format!("{} deal", id), config()).unwrap();
    deal.add_product(PRODUCT, "Analytics").unwrap();
    deal
}

/// A step carrying every attribute needed to start it
pub fn usable_step(deal: &mut DealEngine, id: &str, dimension: ForecastDimension) -> StepId {
    deal.create_step(
        id,
        StepAttributes::named(format!("Step {}", id))
            .due(date(12, 31))
            .products([PRODUCT])
            .dimension(dimension)
            .buyer_owner("Procurement")
            .seller_owner("Account Executive"),
    )
    .unwrap();
    StepId::new(id)
}

pub fn signatory(deal: &mut DealEngine, step: &StepId, id: &str) -> ActorId {
    deal.assign_actor(step, id, Person::new(id.to_uppercase()), Role::Signatory)
        .unwrap();
    ActorId::new(id)
}

pub fn evaluator(deal: &mut DealEngine, step: &StepId, id: &str) -> ActorId {
    deal.assign_actor(step, id, Person::new(id.to_uppercase()), Role::Evaluator)
        .unwrap();
    ActorId::new(id)
}

pub fn mandatory(deal: &mut DealEngine, owner: &ActorId, id: &str) -> CriterionId {
    deal.create_criterion(owner, id, CriterionAttributes::mandatory(format!("criterion {}", id)))
        .unwrap();
    CriterionId::new(id)
}

pub fn optional(deal: &mut DealEngine, owner: &ActorId, id: &str) -> CriterionId {
    deal.create_criterion(owner, id, CriterionAttributes::optional(format!("criterion {}", id)))
        .unwrap();
    CriterionId::new(id)
}

pub fn evidence(deal: &mut DealEngine, step: &StepId) {
    deal.attach_evidence(step.clone(), EvidenceArtifact::new(format!("notes for {}", step)))
        .unwrap();
}

/// Usable step with one signatory owning one mandatory criterion
pub fn simple_step(
    deal: &mut DealEngine,
    id: &str,
    dimension: ForecastDimension,
) -> (StepId, ActorId, CriterionId) {
    let step = usable_step(deal, id, dimension);
    let actor = signatory(deal, &step, &format!("{}-sig", id));
    let criterion = mandatory(deal, &actor, &format!("{}-c", id));
    (step, actor, criterion)
}
