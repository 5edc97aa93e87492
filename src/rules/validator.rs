//! Structural rules checked at write time
//!
//! The validator only reads the store; callers run it against the staged
//! copy of a deal before committing.

use crate::config::RuleConfig;
use crate::error::ValidationError;
use crate::graph::{
    ActorId, ActorRole, CriterionId, CriterionKind, Direction, EdgeKind, GraphStore, NodeId,
    NodeKind, ProductId, Role, StepId, TimelineId,
};
use chrono::NaiveDate;
use indexmap::{IndexMap, IndexSet};

pub type RuleResult = Result<(), ValidationError>;

pub struct RuleValidator<'a> {
    store: &'a GraphStore,
    config: &'a RuleConfig,
}

impl<'a> RuleValidator<'a> {
    pub fn new(store: &'a GraphStore, config: &'a RuleConfig) -> Self {
        RuleValidator { store, config }
    }

    fn targets(&self, node: &NodeId, kind: EdgeKind) -> Vec<NodeId> {
        self.store
            .neighbors(node, kind, Direction::Outgoing)
            .into_iter()
            .cloned()
            .collect()
    }

    fn sources(&self, node: &NodeId, kind: EdgeKind) -> Vec<NodeId> {
        self.store
            .neighbors(node, kind, Direction::Incoming)
            .into_iter()
            .cloned()
            .collect()
    }

    fn due(&self, node: &NodeId) -> Option<NaiveDate> {
        self.store
            .neighbors(node, EdgeKind::HasTimeline, Direction::Outgoing)
            .into_iter()
            .find_map(|id| {
                let timeline = TimelineId::from_node(id)?;
                self.store.timeline(&timeline).map(|t| t.due)
            })
    }

    fn products(&self, node: &NodeId, kind: EdgeKind) -> IndexSet<ProductId> {
        self.targets(node, kind)
            .iter()
            .filter_map(ProductId::from_node)
            .collect()
    }

    /// The step an actor is assigned to
    pub fn step_of_actor(&self, actor: &ActorId) -> Option<StepId> {
        self.sources(&actor.node(), EdgeKind::AssignsActor)
            .iter()
            .find_map(StepId::from_node)
    }

    /// The actor owning a criterion
    pub fn owner_of(&self, criterion: &CriterionId) -> Option<ActorId> {
        self.sources(&criterion.node(), EdgeKind::OwnsCriterion)
            .iter()
            .find_map(ActorId::from_node)
    }

    /// Products a criterion applies to; untagged criteria apply to all of
    /// their step's products.
    fn criterion_products(&self, criterion: &CriterionId) -> IndexSet<ProductId> {
        let own = self.products(&criterion.node(), EdgeKind::CriterionProduct);
        if !own.is_empty() {
            return own;
        }
        self.owner_of(criterion)
            .and_then(|actor| self.step_of_actor(&actor))
            .map(|step| self.products(&step.node(), EdgeKind::StepProduct))
            .unwrap_or_default()
    }

    /// Attributes carried by a step, checked on every create or update
    pub fn check_step_attributes(&self, step: &StepId) -> RuleResult {
        let node = step.node();
        let payload = self
            .store
            .step(step)
            .ok_or_else(|| ValidationError::IncompleteEntity {
                entity: node.clone(),
                missing: vec!["step"],
            })?;
        if payload.name.trim().is_empty() {
            return Err(ValidationError::IncompleteEntity {
                entity: node,
                missing: vec!["name"],
            });
        }

        let offered = self
            .store
            .deal()
            .map(|deal| self.products(&deal.id.node(), EdgeKind::OffersProduct))
            .unwrap_or_default();
        for product in self.products(&node, EdgeKind::StepProduct) {
            if !offered.contains(&product) {
                return Err(ValidationError::UntaggedProduct {
                    entity: node,
                    product,
                });
            }
        }

        self.check_timelines(&node)
    }

    /// Full usability check, run when a step leaves NotStarted
    pub fn validate_step(&self, step: &StepId) -> RuleResult {
        self.check_step_attributes(step)?;

        let node = step.node();
        let mut missing = Vec::new();
        if let Some(payload) = self.store.step(step) {
            if payload.dimension.is_none() {
                missing.push("dimension");
            }
            if payload.buyer_owner.as_deref().map_or(true, |s| s.trim().is_empty()) {
                missing.push("buyer owner");
            }
            if payload.seller_owner.as_deref().map_or(true, |s| s.trim().is_empty()) {
                missing.push("seller owner");
            }
        }
        if self.due(&node).is_none() {
            missing.push("timeline");
        }
        if self.products(&node, EdgeKind::StepProduct).is_empty() {
            missing.push("products");
        }
        if !missing.is_empty() {
            return Err(ValidationError::IncompleteEntity {
                entity: node,
                missing,
            });
        }

        let actors: Vec<ActorId> = self
            .targets(&node, EdgeKind::AssignsActor)
            .iter()
            .filter_map(ActorId::from_node)
            .collect();
        let has_signatory = actors.iter().any(|a| {
            self.store
                .actor(a)
                .map(|actor| actor.role.role() == Role::Signatory)
                .unwrap_or(false)
        });
        if !has_signatory {
            return Err(ValidationError::MissingSignatory { step: step.clone() });
        }

        for actor in &actors {
            self.validate_actor(actor)?;
            for criterion in self
                .targets(&actor.node(), EdgeKind::OwnsCriterion)
                .iter()
                .filter_map(CriterionId::from_node)
            {
                self.check_criterion(&criterion)?;
            }
        }

        self.check_product_actor_sets(step)
    }

    /// Identity attributes of an actor, checked when it is assigned
    pub fn check_actor_attributes(&self, actor: &ActorId) -> RuleResult {
        let node = actor.node();
        match self.store.actor(actor) {
            Some(payload) if !payload.person.name.trim().is_empty() => self.check_timelines(&node),
            _ => Err(ValidationError::IncompleteEntity {
                entity: node,
                missing: vec!["name"],
            }),
        }
    }

    /// An actor can carry its role: evaluators need a mandatory criterion,
    /// signatories need an evaluation basis.
    pub fn validate_actor(&self, actor: &ActorId) -> RuleResult {
        self.check_actor_attributes(actor)?;
        let Some(payload) = self.store.actor(actor) else {
            return Ok(());
        };

        let owned: Vec<CriterionId> = self
            .targets(&actor.node(), EdgeKind::OwnsCriterion)
            .iter()
            .filter_map(CriterionId::from_node)
            .collect();
        let mandatory = owned.iter().any(|c| {
            self.store
                .criterion(c)
                .map(|c| c.kind == CriterionKind::Mandatory)
                .unwrap_or(false)
        });

        match payload.role {
            ActorRole::Evaluator if !mandatory => Err(ValidationError::MissingCriterion {
                actor: actor.clone(),
                role: Role::Evaluator,
            }),
            ActorRole::Signatory { .. } => {
                let inherited = self
                    .targets(&actor.node(), EdgeKind::InheritsFrom)
                    .iter()
                    .any(|source| !self.targets(source, EdgeKind::OwnsCriterion).is_empty());
                if owned.is_empty() && !inherited {
                    Err(ValidationError::MissingCriterion {
                        actor: actor.clone(),
                        role: Role::Signatory,
                    })
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// Attributes of a criterion, checked on create
    pub fn check_criterion(&self, criterion: &CriterionId) -> RuleResult {
        let node = criterion.node();
        let payload = match self.store.criterion(criterion) {
            Some(payload) if !payload.description.trim().is_empty() => payload,
            _ => {
                return Err(ValidationError::IncompleteEntity {
                    entity: node,
                    missing: vec!["description"],
                })
            }
        };

        if let Some(owner) = self.owner_of(criterion) {
            let influencer = self
                .store
                .actor(&owner)
                .map(|a| a.role.role() == Role::Influencer)
                .unwrap_or(false);
            if influencer && payload.kind == CriterionKind::Mandatory {
                return Err(ValidationError::CriterionKindMismatch {
                    actor: owner,
                    criterion: criterion.clone(),
                });
            }

            if let Some(step) = self.step_of_actor(&owner) {
                let step_products = self.products(&step.node(), EdgeKind::StepProduct);
                for product in self.products(&node, EdgeKind::CriterionProduct) {
                    if !step_products.contains(&product) {
                        return Err(ValidationError::UntaggedProduct {
                            entity: node,
                            product,
                        });
                    }
                }
            }
        }

        self.check_timelines(&node)
    }

    /// Every product on a step must need the same set of signatories and
    /// evaluators; otherwise the step has to be split per product.
    pub fn check_product_actor_sets(&self, step: &StepId) -> RuleResult {
        let products = self.products(&step.node(), EdgeKind::StepProduct);
        if products.len() < 2 {
            return Ok(());
        }

        let mut required: IndexMap<ProductId, IndexSet<ActorId>> = products
            .iter()
            .map(|p| (p.clone(), IndexSet::new()))
            .collect();

        for actor in self
            .targets(&step.node(), EdgeKind::AssignsActor)
            .iter()
            .filter_map(ActorId::from_node)
        {
            let blocking = self
                .store
                .actor(&actor)
                .map(|a| a.role.role() != Role::Influencer)
                .unwrap_or(false);
            if !blocking {
                continue;
            }
            let owned: Vec<CriterionId> = self
                .targets(&actor.node(), EdgeKind::OwnsCriterion)
                .iter()
                .filter_map(CriterionId::from_node)
                .collect();
            let applies_to: IndexSet<ProductId> = if owned.is_empty() {
                products.clone()
            } else {
                owned
                    .iter()
                    .flat_map(|c| self.criterion_products(c))
                    .collect()
            };
            for product in applies_to {
                if let Some(set) = required.get_mut(&product) {
                    set.insert(actor.clone());
                }
            }
        }

        let mut sets = required.values();
        let first = sets.next().cloned().unwrap_or_default();
        let consistent = sets.all(|set| set.len() == first.len() && set.iter().all(|a| first.contains(a)));
        if consistent {
            Ok(())
        } else {
            Err(ValidationError::ActorMismatchAcrossProducts {
                step: step.clone(),
                products: products.into_iter().collect(),
            })
        }
    }

    /// Owners whose due date bounds `entity`'s, and entities bounded by it
    fn timeline_pairs(&self, entity: &NodeId) -> Vec<(NodeId, NodeId)> {
        let mut pairs = Vec::new();
        match entity.kind() {
            NodeKind::Criterion => {
                if let Some(actor) = CriterionId::from_node(entity).and_then(|c| self.owner_of(&c)) {
                    pairs.push((entity.clone(), actor.node()));
                    if let Some(step) = self.step_of_actor(&actor) {
                        pairs.push((entity.clone(), step.node()));
                    }
                }
            }
            NodeKind::Actor => {
                if let Some(actor) = ActorId::from_node(entity) {
                    if let Some(step) = self.step_of_actor(&actor) {
                        pairs.push((entity.clone(), step.node()));
                    }
                    for criterion in self.targets(entity, EdgeKind::OwnsCriterion) {
                        pairs.push((criterion, entity.clone()));
                    }
                }
            }
            NodeKind::Step => {
                for actor in self.targets(entity, EdgeKind::AssignsActor) {
                    for criterion in self.targets(&actor, EdgeKind::OwnsCriterion) {
                        pairs.push((criterion, entity.clone()));
                    }
                    pairs.push((actor, entity.clone()));
                }
            }
            _ => {}
        }
        pairs
    }

    /// criterion <= actor <= step, for every pair involving `entity`
    pub fn check_timelines(&self, entity: &NodeId) -> RuleResult {
        if !self.config.enforce_timelines {
            return Ok(());
        }
        for (inner, outer) in self.timeline_pairs(entity) {
            if let (Some(due), Some(limit)) = (self.due(&inner), self.due(&outer)) {
                if due > limit {
                    return Err(ValidationError::TimelineViolation {
                        entity: inner,
                        due,
                        limit_owner: outer,
                        limit,
                    });
                }
            }
        }
        Ok(())
    }

    /// Every violation in the deal, not just the first
    pub fn validate_deal(&self) -> Vec<ValidationError> {
        let mut violations = Vec::new();

        if let Some(deal) = self.store.deal() {
            if self.products(&deal.id.node(), EdgeKind::OffersProduct).is_empty() {
                violations.push(ValidationError::IncompleteEntity {
                    entity: deal.id.node(),
                    missing: vec!["products"],
                });
            }
        }

        for step in self
            .store
            .ids_of_kind(NodeKind::Step)
            .into_iter()
            .filter_map(StepId::from_node)
        {
            if let Err(err) = self.validate_step(&step) {
                violations.push(err);
            }
        }

        // Timelines are reported regardless of the write-time switch
        let always = RuleConfig {
            enforce_timelines: true,
            ..self.config.clone()
        };
        let strict = RuleValidator::new(self.store, &always);
        for kind in [NodeKind::Criterion, NodeKind::Actor] {
            for node in self.store.ids_of_kind(kind) {
                if let Err(err) = strict.check_timelines(node) {
                    if !violations.contains(&err) {
                        violations.push(err);
                    }
                }
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        Actor, BuyingStep, Criterion, Deal, Node, Person, Product, Status, Timeline,
    };
    use crate::forecast::ForecastDimension;
    use chrono::Utc;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    struct Fixture {
        store: GraphStore,
        config: RuleConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let mut store = GraphStore::new();
            store
                .add_node(Node::Deal(Deal {
                    id: "d1".into(),
                    name: "Acme".to_string(),
                    created_at: Utc::now(),
                    lost_reason: None,
                }))
                .unwrap();
            for p in ["p1", "p2"] {
                store
                    .add_node(Node::Product(Product {
                        id: p.into(),
                        name: p.to_string(),
                    }))
                    .unwrap();
                store
                    .add_edge(
                        EdgeKind::OffersProduct,
                        crate::graph::DealId::new("d1").node(),
                        ProductId::new(p).node(),
                    )
                    .unwrap();
            }
            store
                .add_node(Node::Step(BuyingStep {
                    id: "s1".into(),
                    name: "Security review".to_string(),
                    status: Status::NotStarted,
                    dimension: Some(ForecastDimension::SecurityCompliance),
                    buyer_owner: Some("CISO".to_string()),
                    seller_owner: Some("SE".to_string()),
                }))
                .unwrap();
            Fixture {
                store,
                config: RuleConfig::default(),
            }
        }

        fn validator(&self) -> RuleValidator<'_> {
            RuleValidator::new(&self.store, &self.config)
        }

        fn link(&mut self, kind: EdgeKind, from: NodeId, to: NodeId) {
            self.store.add_edge(kind, from, to).unwrap();
        }

        fn timeline(&mut self, owner: NodeId, due: NaiveDate) {
            let id = TimelineId::for_owner(&owner);
            let node = self.store.add_node(Node::Timeline(Timeline { id, due })).unwrap();
            self.link(EdgeKind::HasTimeline, owner, node);
        }

        fn actor(&mut self, id: &str, role: Role) {
            self.store
                .add_node(Node::Actor(Actor {
                    id: id.into(),
                    person: Person::new(id),
                    role: role.into(),
                }))
                .unwrap();
            self.link(EdgeKind::AssignsActor, StepId::new("s1").node(), ActorId::new(id).node());
        }

        fn criterion(&mut self, actor: &str, id: &str, kind: CriterionKind) {
            self.store
                .add_node(Node::Criterion(Criterion {
                    id: id.into(),
                    description: format!("criterion {}", id),
                    kind,
                    status: Status::NotStarted,
                }))
                .unwrap();
            self.link(
                EdgeKind::OwnsCriterion,
                ActorId::new(actor).node(),
                CriterionId::new(id).node(),
            );
        }

        fn usable(&mut self) {
            self.timeline(StepId::new("s1").node(), date(20));
            for p in ["p1", "p2"] {
                self.link(EdgeKind::StepProduct, StepId::new("s1").node(), ProductId::new(p).node());
            }
        }
    }

    #[test]
    fn test_incomplete_step_lists_missing_attributes() {
        let fx = Fixture::new();
        let err = fx.validator().validate_step(&StepId::new("s1")).unwrap_err();
        assert_eq!(
            err,
            ValidationError::IncompleteEntity {
                entity: StepId::new("s1").node(),
                missing: vec!["timeline", "products"],
            }
        );
    }

    #[test]
    fn test_missing_signatory_then_missing_criterion() {
        let mut fx = Fixture::new();
        fx.usable();
        fx.actor("eve", Role::Evaluator);
        assert_eq!(
            fx.validator().validate_step(&StepId::new("s1")),
            Err(ValidationError::MissingSignatory { step: StepId::new("s1") })
        );

        fx.actor("sam", Role::Signatory);
        fx.criterion("sam", "c1", CriterionKind::Mandatory);
        assert!(matches!(
            fx.validator().validate_step(&StepId::new("s1")),
            Err(ValidationError::MissingCriterion { role: Role::Evaluator, .. })
        ));

        fx.criterion("eve", "c2", CriterionKind::Mandatory);
        assert_eq!(fx.validator().validate_step(&StepId::new("s1")), Ok(()));
    }

    #[test]
    fn test_signatory_basis_may_be_inherited() {
        let mut fx = Fixture::new();
        fx.usable();
        fx.actor("eve", Role::Evaluator);
        fx.criterion("eve", "c1", CriterionKind::Mandatory);
        fx.actor("sam", Role::Signatory);
        assert!(fx.validator().validate_actor(&ActorId::new("sam")).is_err());

        fx.link(EdgeKind::InheritsFrom, ActorId::new("sam").node(), ActorId::new("eve").node());
        assert_eq!(fx.validator().validate_actor(&ActorId::new("sam")), Ok(()));
    }

    #[test]
    fn test_influencer_criterion_must_be_non_mandatory() {
        let mut fx = Fixture::new();
        fx.actor("ian", Role::Influencer);
        fx.criterion("ian", "c1", CriterionKind::Mandatory);
        assert!(matches!(
            fx.validator().check_criterion(&CriterionId::new("c1")),
            Err(ValidationError::CriterionKindMismatch { .. })
        ));
    }

    #[test]
    fn test_timeline_violation() {
        let mut fx = Fixture::new();
        fx.actor("sam", Role::Signatory);
        fx.criterion("sam", "c1", CriterionKind::Mandatory);
        fx.timeline(ActorId::new("sam").node(), date(10));
        fx.timeline(CriterionId::new("c1").node(), date(12));

        let err = fx
            .validator()
            .check_timelines(&CriterionId::new("c1").node())
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::TimelineViolation {
                entity: CriterionId::new("c1").node(),
                due: date(12),
                limit_owner: ActorId::new("sam").node(),
                limit: date(10),
            }
        );

        fx.config.enforce_timelines = false;
        assert!(fx.validator().check_timelines(&CriterionId::new("c1").node()).is_ok());
        assert_eq!(fx.validator().validate_deal().len(), 2);
    }

    #[test]
    fn test_actor_mismatch_across_products() {
        let mut fx = Fixture::new();
        fx.usable();
        fx.actor("sam", Role::Signatory);
        fx.criterion("sam", "c1", CriterionKind::Mandatory);
        fx.actor("eve", Role::Evaluator);
        fx.criterion("eve", "c2", CriterionKind::Mandatory);
        assert_eq!(fx.validator().validate_step(&StepId::new("s1")), Ok(()));

        // eve only evaluates p2: p1 and p2 now need different actors
        fx.link(
            EdgeKind::CriterionProduct,
            CriterionId::new("c2").node(),
            ProductId::new("p2").node(),
        );
        assert_eq!(
            fx.validator().validate_step(&StepId::new("s1")),
            Err(ValidationError::ActorMismatchAcrossProducts {
                step: StepId::new("s1"),
                products: vec![ProductId::new("p1"), ProductId::new("p2")],
            })
        );
    }
}
