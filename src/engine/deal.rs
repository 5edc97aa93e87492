//! One deal's mutation pipeline
//!
//! Every mutation is staged against a copy of the deal's graph: rules and the
//! cycle guard run first, then the rollup cascades over the staged graph.
//! Only when all of them succeed are the graph, the snapshot and the history
//! swapped in together; a rejected mutation leaves no trace.

use super::history::{History, HistoryEvent};
use super::query::{ActorsByRole, BlockingLink, ChainBuilder};
use super::request::{CriterionAttributes, DependencyTarget, StepAttributes, TrackedEntity};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, ValidationError};
use crate::forecast::{ForecastEvaluator, Scorecard};
use crate::graph::{
    Actor, ActorId, ActorRole, BuyingProcess, BuyingStep, Criterion, CriterionId, Deal, DealId,
    DealOutcome, Direction, Edge, EdgeKind, EngagementEvent, EventId, EvidenceArtifact, EvidenceId,
    GraphError, GraphStore, Node, NodeId, Person, ProcessId, Product, ProductId, Role, SignOff,
    Status, StepId, Timeline, TimelineId,
};
use crate::guard::{CycleGuard, ProposedEdge};
use crate::persistence::GraphSnapshot;
use crate::rollup::plan::inherited_basis;
use crate::rollup::{ActorRollup, CriterionRollup, RollupEngine, RollupSnapshot, StepRollup};
use crate::rules::RuleValidator;
use chrono::{NaiveDate, Utc};
use indexmap::IndexSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Working copy of a deal during one mutation
struct Staged<'a> {
    store: GraphStore,
    config: &'a EngineConfig,
    /// Nodes whose own inputs changed; the rollup cascades from these
    seeds: Vec<NodeId>,
    events: Vec<HistoryEvent>,
}

impl Staged<'_> {
    fn rules(&self) -> RuleValidator<'_> {
        RuleValidator::new(&self.store, &self.config.rules)
    }

    fn guard(&self) -> CycleGuard<'_> {
        CycleGuard::new(&self.store)
    }

    fn touch(&mut self, node: NodeId) {
        self.seeds.push(node);
    }

    fn edited(&mut self, operation: &str, entity: NodeId) {
        self.events.push(HistoryEvent::Edited {
            operation: operation.to_string(),
            entity,
        });
    }

    fn require(&self, node: &NodeId) -> EngineResult<()> {
        if self.store.contains(node) {
            Ok(())
        } else {
            Err(GraphError::UnknownReference(node.clone()).into())
        }
    }

    /// A started step must stay usable after every structural change to it
    fn revalidate_started(&self, step: Option<&StepId>) -> EngineResult<()> {
        let Some(step) = step else {
            return Ok(());
        };
        let started = self
            .store
            .step(step)
            .map(|st| st.status != Status::NotStarted)
            .unwrap_or(false);
        if started && self.config.rules.validate_on_start {
            self.rules().validate_step(step)?;
        }
        Ok(())
    }

    fn set_due(&mut self, owner: &NodeId, due: NaiveDate) -> EngineResult<()> {
        let id = TimelineId::for_owner(owner);
        if let Some(timeline) = self.store.timeline_mut(&id) {
            timeline.due = due;
            return Ok(());
        }
        let node = self.store.add_node(Node::Timeline(Timeline { id, due }))?;
        self.store.add_edge(EdgeKind::HasTimeline, owner.clone(), node)?;
        Ok(())
    }

    /// Replace the product tags of a step or criterion
    fn set_products(
        &mut self,
        node: &NodeId,
        kind: EdgeKind,
        products: &[ProductId],
    ) -> EngineResult<()> {
        let existing: Vec<NodeId> = self
            .store
            .neighbors(node, kind, Direction::Outgoing)
            .into_iter()
            .cloned()
            .collect();
        for product in existing {
            self.store.remove_edge(kind, node, &product)?;
        }
        for product in products {
            self.store.add_edge(kind, node.clone(), product.node())?;
        }
        Ok(())
    }

    fn apply_step_attributes(&mut self, id: &StepId, attrs: &StepAttributes) -> EngineResult<()> {
        let node = id.node();
        let step = self
            .store
            .step_mut(id)
            .ok_or_else(|| GraphError::UnknownReference(node.clone()))?;
        if let Some(name) = &attrs.name {
            step.name = name.clone();
        }
        if let Some(dimension) = attrs.dimension {
            step.dimension = Some(dimension);
        }
        if let Some(owner) = &attrs.buyer_owner {
            step.buyer_owner = Some(owner.clone());
        }
        if let Some(owner) = &attrs.seller_owner {
            step.seller_owner = Some(owner.clone());
        }
        if let Some(products) = &attrs.products {
            self.set_products(&node, EdgeKind::StepProduct, products)?;
        }
        if let Some(due) = attrs.due {
            self.set_due(&node, due)?;
        }
        Ok(())
    }

    /// Remove `root` and everything it owns.
    ///
    /// Rejected while a dependency edge from outside the removed set targets
    /// any node inside it.
    fn remove_subtree(&mut self, root: &NodeId) -> EngineResult<Vec<NodeId>> {
        let mut members: IndexSet<NodeId> = IndexSet::new();
        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            if !members.insert(node.clone()) {
                continue;
            }
            for kind in EdgeKind::ALL.iter().filter(|k| k.is_ownership()) {
                stack.extend(
                    self.store
                        .neighbors(&node, *kind, Direction::Outgoing)
                        .into_iter()
                        .cloned(),
                );
            }
        }

        for member in &members {
            let outside: Vec<NodeId> = self
                .store
                .dependents(member)
                .into_iter()
                .filter(|d| !members.contains(d))
                .collect();
            if !outside.is_empty() {
                return Err(GraphError::ReferentialIntegrity {
                    node: member.clone(),
                    dependents: outside,
                }
                .into());
            }
        }

        for member in &members {
            for kind in EdgeKind::ALL.iter().filter(|k| k.is_dependency()) {
                let targets: Vec<NodeId> = self
                    .store
                    .neighbors(member, *kind, Direction::Outgoing)
                    .into_iter()
                    .cloned()
                    .collect();
                for target in targets {
                    self.store.remove_edge(*kind, member, &target)?;
                }
            }
        }
        for member in members.iter().rev() {
            self.store.remove_node(member)?;
        }
        Ok(members.into_iter().collect())
    }
}

/// The engine for one deal: its graph, current rollup and history
#[derive(Debug, Clone)]
pub struct DealEngine {
    id: DealId,
    store: GraphStore,
    rollup: RollupEngine,
    history: History,
    config: Arc<EngineConfig>,
}

impl DealEngine {
    /// createDeal: a deal with its (empty) buying process
    pub fn new(
        id: impl Into<DealId>,
        name: impl Into<String>,
        config: Arc<EngineConfig>,
    ) -> EngineResult<Self> {
        let id = id.into();
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::IncompleteEntity {
                entity: id.node(),
                missing: vec!["name"],
            }
            .into());
        }

        let mut store = GraphStore::new();
        store.add_node(Node::Deal(Deal {
            id: id.clone(),
            name,
            created_at: Utc::now(),
            lost_reason: None,
        }))?;
        let process = ProcessId::for_deal(&id);
        store.add_node(Node::Process(BuyingProcess {
            id: process.clone(),
        }))?;
        store.add_edge(EdgeKind::OwnsProcess, id.node(), process.node())?;

        let rollup = RollupEngine::full(&store)?;
        let mut history = History::new(config.history.max_entries);
        history.record([HistoryEvent::Edited {
            operation: "create_deal".to_string(),
            entity: id.node(),
        }]);
        info!(deal = %id, "deal created");

        Ok(DealEngine {
            id,
            store,
            rollup,
            history,
            config,
        })
    }

    /// Rebuild a deal from a snapshot, re-checking acyclicity and recomputing
    /// the rollup from scratch.
    pub fn import(snapshot: &GraphSnapshot, config: Arc<EngineConfig>) -> EngineResult<Self> {
        let store = snapshot
            .restore()
            .map_err(|e| EngineError::Snapshot(e.to_string()))?;
        CycleGuard::new(&store).verify()?;
        let rollup = RollupEngine::full(&store)?;
        let history = History::from_entries(snapshot.history.clone(), config.history.max_entries);
        info!(
            deal = %snapshot.deal,
            nodes = store.node_count(),
            edges = store.edge_count(),
            "deal imported"
        );
        Ok(DealEngine {
            id: snapshot.deal.clone(),
            store,
            rollup,
            history,
            config,
        })
    }

    pub fn export(&self) -> GraphSnapshot {
        GraphSnapshot::capture(&self.id, &self.store, self.history.to_vec())
    }

    /// Run `apply` against a staged copy and swap the result in
    fn commit<T>(
        &mut self,
        operation: &'static str,
        apply: impl FnOnce(&mut Staged<'_>) -> EngineResult<T>,
    ) -> EngineResult<T> {
        if self.outcome() == DealOutcome::ClosedLost {
            warn!(deal = %self.id, operation, "mutation on closed-lost deal rejected");
            return Err(EngineError::DealClosed(self.id.clone()));
        }

        let config = Arc::clone(&self.config);
        let mut staged = Staged {
            store: self.store.clone(),
            config: &config,
            seeds: Vec::new(),
            events: Vec::new(),
        };

        let result = apply(&mut staged).and_then(|value| {
            let rollup = self.rollup.cascade(&staged.store, &staged.seeds)?;
            Ok((value, rollup))
        });

        match result {
            Ok((value, rollup)) => {
                let previous = self.rollup.snapshot();
                let next = rollup.snapshot();
                let transitions = next.transitions(&previous);
                if previous.outcome != next.outcome {
                    info!(deal = %self.id, from = %previous.outcome, to = %next.outcome, "deal outcome changed");
                }
                debug!(deal = %self.id, operation, transitions = transitions.len(), "rollup transitions");

                let Staged { store, events, .. } = staged;
                self.store = store;
                self.rollup = rollup;
                self.history.record(
                    events
                        .into_iter()
                        .chain(transitions.into_iter().map(HistoryEvent::Derived)),
                );
                info!(deal = %self.id, operation, "mutation committed");
                Ok(value)
            }
            Err(err) => {
                warn!(deal = %self.id, operation, error = %err, "mutation rejected");
                Err(err)
            }
        }
    }

    // Mutations

    pub fn add_product(&mut self, id: impl Into<ProductId>, name: impl Into<String>) -> EngineResult<()> {
        let id = id.into();
        let name = name.into();
        let deal = self.id.node();
        self.commit("add_product", move |s| {
            if name.trim().is_empty() {
                return Err(ValidationError::IncompleteEntity {
                    entity: id.node(),
                    missing: vec!["name"],
                }
                .into());
            }
            let node = s.store.add_node(Node::Product(Product { id, name }))?;
            s.store.add_edge(EdgeKind::OffersProduct, deal, node.clone())?;
            s.edited("add_product", node);
            Ok(())
        })
    }

    pub fn create_step(&mut self, id: impl Into<StepId>, attrs: StepAttributes) -> EngineResult<()> {
        let id = id.into();
        let process = ProcessId::for_deal(&self.id).node();
        self.commit("create_step", move |s| {
            let node = s.store.add_node(Node::Step(BuyingStep {
                id: id.clone(),
                name: String::new(),
                status: Status::NotStarted,
                dimension: None,
                buyer_owner: None,
                seller_owner: None,
            }))?;
            s.store.add_edge(EdgeKind::ContainsStep, process, node.clone())?;
            s.apply_step_attributes(&id, &attrs)?;
            s.rules().check_step_attributes(&id)?;
            s.touch(node.clone());
            s.edited("create_step", node);
            Ok(())
        })
    }

    /// Update step attributes. A step that has already started must stay usable.
    pub fn set_step_attributes(&mut self, step: &StepId, attrs: StepAttributes) -> EngineResult<()> {
        let step = step.clone();
        self.commit("set_step_attributes", move |s| {
            s.apply_step_attributes(&step, &attrs)?;
            let started = s
                .store
                .step(&step)
                .map(|st| st.status != Status::NotStarted)
                .unwrap_or(false);
            if started && s.config.rules.validate_on_start {
                s.rules().validate_step(&step)?;
            } else {
                s.rules().check_step_attributes(&step)?;
            }
            s.touch(step.node());
            s.edited("set_step_attributes", step.node());
            Ok(())
        })
    }

    /// `step` cannot complete before `prerequisite` is completed or bypassed
    pub fn add_step_dependency(&mut self, step: &StepId, prerequisite: &StepId) -> EngineResult<()> {
        let (step, prerequisite) = (step.clone(), prerequisite.clone());
        self.commit("add_step_dependency", move |s| {
            s.require(&step.node())?;
            s.require(&prerequisite.node())?;
            s.guard().check_step_dependency(&step, &prerequisite)?;
            s.store
                .add_edge(EdgeKind::StepDependsOn, step.node(), prerequisite.node())?;
            s.touch(step.node());
            s.edited("add_step_dependency", step.node());
            Ok(())
        })
    }

    pub fn remove_step_dependency(&mut self, step: &StepId, prerequisite: &StepId) -> EngineResult<()> {
        let (step, prerequisite) = (step.clone(), prerequisite.clone());
        self.commit("remove_step_dependency", move |s| {
            s.store
                .remove_edge(EdgeKind::StepDependsOn, &step.node(), &prerequisite.node())?;
            s.touch(step.node());
            s.edited("remove_step_dependency", step.node());
            Ok(())
        })
    }

    /// Remove a step with its actors, criteria, timelines and evidence
    pub fn remove_step(&mut self, step: &StepId) -> EngineResult<()> {
        let step = step.clone();
        let process = ProcessId::for_deal(&self.id).node();
        self.commit("remove_step", move |s| {
            s.require(&step.node())?;
            let removed = s.remove_subtree(&step.node())?;
            debug!(step = %step, removed = removed.len(), "step subtree removed");
            s.touch(process);
            s.edited("remove_step", step.node());
            Ok(())
        })
    }

    /// assignActor: a new actor-role assignment on `step`
    pub fn assign_actor(
        &mut self,
        step: &StepId,
        actor: impl Into<ActorId>,
        person: Person,
        role: Role,
    ) -> EngineResult<()> {
        let step = step.clone();
        let actor = actor.into();
        self.commit("assign_actor", move |s| {
            s.require(&step.node())?;
            let node = s.store.add_node(Node::Actor(Actor {
                id: actor.clone(),
                person,
                role: role.into(),
            }))?;
            s.store
                .add_edge(EdgeKind::AssignsActor, step.node(), node.clone())?;
            s.rules().check_actor_attributes(&actor)?;
            s.revalidate_started(Some(&step))?;
            s.touch(node.clone());
            s.edited("assign_actor", node);
            Ok(())
        })
    }

    /// Remove an actor assignment with the criteria it owns
    pub fn remove_actor(&mut self, actor: &ActorId) -> EngineResult<()> {
        let actor = actor.clone();
        self.commit("remove_actor", move |s| {
            s.require(&actor.node())?;
            let step = s.rules().step_of_actor(&actor);
            s.remove_subtree(&actor.node())?;
            s.revalidate_started(step.as_ref())?;
            if let Some(step) = step {
                s.touch(step.node());
            }
            s.edited("remove_actor", actor.node());
            Ok(())
        })
    }

    /// Organizational lookup only; `None` clears the relation
    pub fn set_reports_to(&mut self, actor: &ActorId, manager: Option<&ActorId>) -> EngineResult<()> {
        let actor = actor.clone();
        let manager = manager.cloned();
        self.commit("set_reports_to", move |s| {
            s.require(&actor.node())?;
            let current: Vec<NodeId> = s
                .store
                .neighbors(&actor.node(), EdgeKind::ReportsTo, Direction::Outgoing)
                .into_iter()
                .cloned()
                .collect();
            for old in current {
                s.store.remove_edge(EdgeKind::ReportsTo, &actor.node(), &old)?;
            }
            if let Some(manager) = manager {
                s.require(&manager.node())?;
                if manager == actor {
                    return Err(GraphError::InvalidEndpoint {
                        kind: EdgeKind::ReportsTo,
                        from: actor.node(),
                        to: manager.node(),
                    }
                    .into());
                }
                s.store
                    .add_edge(EdgeKind::ReportsTo, actor.node(), manager.node())?;
            }
            s.edited("set_reports_to", actor.node());
            Ok(())
        })
    }

    /// A signatory evaluates against the criteria `source` owns (not
    /// transitively through `source`'s own inheritance).
    pub fn inherit_evaluation(&mut self, signatory: &ActorId, source: &ActorId) -> EngineResult<()> {
        let (signatory, source) = (signatory.clone(), source.clone());
        self.commit("inherit_evaluation", move |s| {
            let role = s
                .store
                .actor(&signatory)
                .map(|a| a.role.role())
                .ok_or_else(|| GraphError::UnknownReference(signatory.node()))?;
            if role != Role::Signatory {
                return Err(ValidationError::NotSignatory { actor: signatory }.into());
            }
            let source_role = s
                .store
                .actor(&source)
                .map(|a| a.role.role())
                .ok_or_else(|| GraphError::UnknownReference(source.node()))?;
            let reason = if source == signatory {
                Some("an actor cannot inherit from itself")
            } else if source_role == Role::Influencer {
                Some("influencers carry no evaluation")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(ValidationError::InvalidInheritance {
                    actor: signatory,
                    source_actor: source,
                    reason,
                }
                .into());
            }

            s.store
                .add_edge(EdgeKind::InheritsFrom, signatory.node(), source.node())?;
            s.touch(signatory.node());
            s.edited("inherit_evaluation", signatory.node());
            Ok(())
        })
    }

    /// createCriterion: a criterion owned by `owner`. Criteria inheriting from
    /// `owner` pick it up immediately, so the expansion is cycle-checked too.
    pub fn create_criterion(
        &mut self,
        owner: &ActorId,
        id: impl Into<CriterionId>,
        attrs: CriterionAttributes,
    ) -> EngineResult<()> {
        let owner = owner.clone();
        let id = id.into();
        self.commit("create_criterion", move |s| {
            s.require(&owner.node())?;
            if s.store.contains(&id.node()) {
                return Err(GraphError::DuplicateNode(id.node()).into());
            }
            s.guard().check_criterion_edges(&[ProposedEdge::Owns {
                actor: owner.clone(),
                criterion: id.clone(),
            }])?;

            let node = s.store.add_node(Node::Criterion(Criterion {
                id: id.clone(),
                description: attrs.description,
                kind: attrs.kind,
                status: Status::NotStarted,
            }))?;
            s.store
                .add_edge(EdgeKind::OwnsCriterion, owner.node(), node.clone())?;
            s.set_products(&node, EdgeKind::CriterionProduct, &attrs.products)?;
            if let Some(due) = attrs.due {
                s.set_due(&node, due)?;
            }
            s.rules().check_criterion(&id)?;
            let step = s.rules().step_of_actor(&owner);
            s.revalidate_started(step.as_ref())?;
            s.touch(node.clone());
            s.edited("create_criterion", node);
            Ok(())
        })
    }

    /// Remove a criterion with its timeline and evidence. Criteria that only
    /// inherit it through its owner let go of it automatically.
    pub fn remove_criterion(&mut self, criterion: &CriterionId) -> EngineResult<()> {
        let criterion = criterion.clone();
        self.commit("remove_criterion", move |s| {
            s.require(&criterion.node())?;
            let owner = s.rules().owner_of(&criterion);
            s.remove_subtree(&criterion.node())?;
            if let Some(owner) = owner {
                let step = s.rules().step_of_actor(&owner);
                s.revalidate_started(step.as_ref())?;
                s.touch(owner.node());
            }
            s.edited("remove_criterion", criterion.node());
            Ok(())
        })
    }

    /// addCriterionDependency: on another criterion, or on every criterion an
    /// actor owns now and later.
    pub fn add_criterion_dependency(
        &mut self,
        criterion: &CriterionId,
        target: impl Into<DependencyTarget>,
    ) -> EngineResult<()> {
        let criterion = criterion.clone();
        let target = target.into();
        self.commit("add_criterion_dependency", move |s| {
            s.require(&criterion.node())?;
            let (kind, to, proposed) = match target {
                DependencyTarget::Criterion(other) => (
                    EdgeKind::CriterionDependsOn,
                    other.node(),
                    ProposedEdge::DependsOn {
                        criterion: criterion.clone(),
                        target: other,
                    },
                ),
                DependencyTarget::Actor(actor) => (
                    EdgeKind::InheritsFrom,
                    actor.node(),
                    ProposedEdge::Inherits {
                        criterion: criterion.clone(),
                        actor,
                    },
                ),
            };
            s.require(&to)?;
            let edge_from = criterion.node();
            if s.store.has_edge(kind, &edge_from, &to) {
                return Err(GraphError::DuplicateEdge(Edge::new(kind, edge_from, to)).into());
            }

            let derived = s.guard().check_criterion_edges(&[proposed])?;
            debug!(criterion = %criterion, derived = derived.len(), "criterion dependency accepted");
            s.store.add_edge(kind, criterion.node(), to)?;
            s.touch(criterion.node());
            s.edited("add_criterion_dependency", criterion.node());
            Ok(())
        })
    }

    pub fn remove_criterion_dependency(
        &mut self,
        criterion: &CriterionId,
        target: impl Into<DependencyTarget>,
    ) -> EngineResult<()> {
        let criterion = criterion.clone();
        let (kind, to) = match target.into() {
            DependencyTarget::Criterion(other) => (EdgeKind::CriterionDependsOn, other.node()),
            DependencyTarget::Actor(actor) => (EdgeKind::InheritsFrom, actor.node()),
        };
        self.commit("remove_criterion_dependency", move |s| {
            s.store.remove_edge(kind, &criterion.node(), &to)?;
            s.touch(criterion.node());
            s.edited("remove_criterion_dependency", criterion.node());
            Ok(())
        })
    }

    /// setStatus on a step or criterion.
    ///
    /// Criterion marks are always accepted; the rollup decides the effective
    /// status. A step leaving NotStarted must be usable, and a step can only
    /// be marked Completed when every completion condition holds.
    pub fn set_status(&mut self, entity: impl Into<TrackedEntity>, status: Status) -> EngineResult<()> {
        let entity = entity.into();
        let blockers = match &entity {
            TrackedEntity::Step(id) if status == Status::Completed => self
                .rollup
                .snapshot()
                .steps
                .get(id)
                .map(|step| step.blockers.clone())
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        self.commit("set_status", move |s| {
            match &entity {
                TrackedEntity::Criterion(id) => {
                    let criterion = s
                        .store
                        .criterion_mut(id)
                        .ok_or_else(|| GraphError::UnknownReference(id.node()))?;
                    criterion.status = status;
                }
                TrackedEntity::Step(id) => {
                    let current = s
                        .store
                        .step(id)
                        .map(|step| step.status)
                        .ok_or_else(|| GraphError::UnknownReference(id.node()))?;
                    let starting = current == Status::NotStarted
                        && matches!(status, Status::InProgress | Status::Completed);
                    if starting && s.config.rules.validate_on_start {
                        s.rules().validate_step(id)?;
                    }
                    if !blockers.is_empty() {
                        return Err(EngineError::StepNotReady {
                            step: id.clone(),
                            blockers,
                        });
                    }
                    if let Some(step) = s.store.step_mut(id) {
                        step.status = status;
                    }
                }
            }
            s.touch(entity.node());
            s.events.push(HistoryEvent::Marked {
                entity: entity.node(),
                status,
            });
            Ok(())
        })
    }

    /// attachEvidence to a step or criterion
    pub fn attach_evidence(
        &mut self,
        entity: impl Into<TrackedEntity>,
        artifact: EvidenceArtifact,
    ) -> EngineResult<EvidenceId> {
        let entity = entity.into();
        self.commit("attach_evidence", move |s| {
            s.require(&entity.node())?;
            let id = artifact.id.clone();
            if artifact.artifact.trim().is_empty() {
                return Err(ValidationError::IncompleteEntity {
                    entity: id.node(),
                    missing: vec!["artifact"],
                }
                .into());
            }
            let node = s.store.add_node(Node::Evidence(artifact))?;
            s.store.add_edge(EdgeKind::HasEvidence, entity.node(), node)?;
            s.touch(entity.node());
            s.events.push(HistoryEvent::Evidence {
                entity: entity.node(),
                evidence: id.clone(),
            });
            Ok(id)
        })
    }

    /// Record an interaction with its participants and the evidence it produced
    pub fn record_engagement(
        &mut self,
        event: EngagementEvent,
        participants: &[ActorId],
        evidence: &[EvidenceId],
    ) -> EngineResult<EventId> {
        let participants = participants.to_vec();
        let evidence = evidence.to_vec();
        self.commit("record_engagement", move |s| {
            let id = event.id.clone();
            let node = s.store.add_node(Node::Event(event))?;
            for actor in &participants {
                s.store
                    .add_edge(EdgeKind::ParticipatedIn, actor.node(), node.clone())?;
            }
            for artifact in &evidence {
                s.store
                    .add_edge(EdgeKind::EvidencedBy, artifact.node(), node.clone())?;
            }
            s.edited("record_engagement", node);
            Ok(id)
        })
    }

    /// recordSignOff. Granting or rejecting needs an evaluation basis;
    /// revoking back to Pending reopens the step.
    pub fn record_sign_off(&mut self, signatory: &ActorId, decision: SignOff) -> EngineResult<()> {
        let signatory = signatory.clone();
        self.commit("record_sign_off", move |s| {
            let role = s
                .store
                .actor(&signatory)
                .map(|a| a.role.role())
                .ok_or_else(|| GraphError::UnknownReference(signatory.node()))?;
            if role != Role::Signatory {
                return Err(ValidationError::NotSignatory { actor: signatory }.into());
            }

            if matches!(decision, SignOff::Granted | SignOff::Rejected) {
                let owns = !s
                    .store
                    .neighbors(&signatory.node(), EdgeKind::OwnsCriterion, Direction::Outgoing)
                    .is_empty();
                if !owns && inherited_basis(&s.store, &signatory).is_empty() {
                    return Err(EngineError::NoEvaluationBasis { signatory });
                }
            }

            if let Some(actor) = s.store.actor_mut(&signatory) {
                actor.role = ActorRole::Signatory { sign_off: decision };
            }
            s.touch(signatory.node());
            s.events.push(HistoryEvent::SignOff {
                actor: signatory,
                decision,
            });
            Ok(())
        })
    }

    /// Close the deal as lost. Sticky: later mutations are rejected.
    pub fn mark_closed_lost(&mut self, reason: impl Into<String>) -> EngineResult<()> {
        let reason = reason.into();
        let deal = self.id.node();
        self.commit("mark_closed_lost", move |s| {
            if let Some(payload) = s.store.deal_mut() {
                payload.lost_reason = Some(reason.clone());
            }
            s.touch(deal);
            s.events.push(HistoryEvent::ClosedLost { reason });
            Ok(())
        })
    }

    /// Set the due date of a step, actor or criterion
    pub fn set_due(&mut self, entity: impl Into<NodeId>, due: NaiveDate) -> EngineResult<()> {
        let owner = entity.into();
        self.commit("set_due", move |s| {
            s.require(&owner)?;
            s.set_due(&owner, due)?;
            s.rules().check_timelines(&owner)?;
            s.edited("set_due", owner);
            Ok(())
        })
    }

    // Queries

    pub fn id(&self) -> &DealId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.store.deal().map(|d| d.name.as_str()).unwrap_or_default()
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The committed rollup; never a partial cascade
    pub fn snapshot(&self) -> Arc<RollupSnapshot> {
        self.rollup.snapshot()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn outcome(&self) -> DealOutcome {
        self.rollup.snapshot().outcome
    }

    pub fn step_status(&self, step: &StepId) -> EngineResult<StepRollup> {
        self.rollup
            .snapshot()
            .steps
            .get(step)
            .cloned()
            .ok_or_else(|| GraphError::UnknownReference(step.node()).into())
    }

    pub fn criterion_status(&self, criterion: &CriterionId) -> EngineResult<CriterionRollup> {
        self.rollup
            .snapshot()
            .criteria
            .get(criterion)
            .cloned()
            .ok_or_else(|| GraphError::UnknownReference(criterion.node()).into())
    }

    pub fn actor_status(&self, actor: &ActorId) -> EngineResult<ActorRollup> {
        self.rollup
            .snapshot()
            .actors
            .get(actor)
            .cloned()
            .ok_or_else(|| GraphError::UnknownReference(actor.node()).into())
    }

    pub fn forecast_scorecard(&self) -> Scorecard {
        ForecastEvaluator::new(&self.config.forecast).scorecard(&self.id, &self.rollup.snapshot())
    }

    /// The unmet prerequisite and criterion chain holding up `step`
    pub fn blocking_chain(&self, step: &StepId) -> EngineResult<Vec<BlockingLink>> {
        if self.store.step(step).is_none() {
            return Err(GraphError::UnknownReference(step.node()).into());
        }
        let snapshot = self.rollup.snapshot();
        Ok(ChainBuilder::new(&snapshot).build(step))
    }

    pub fn actors_by_role(&self, step: &StepId) -> EngineResult<ActorsByRole> {
        if self.store.step(step).is_none() {
            return Err(GraphError::UnknownReference(step.node()).into());
        }
        let mut grouped = ActorsByRole::default();
        for actor in self
            .store
            .neighbors(&step.node(), EdgeKind::AssignsActor, Direction::Outgoing)
            .into_iter()
            .filter_map(ActorId::from_node)
        {
            if let Some(payload) = self.store.actor(&actor) {
                grouped.push(payload.clone());
            }
        }
        Ok(grouped)
    }

    /// Every rule violation in the deal
    pub fn validate(&self) -> Vec<ValidationError> {
        RuleValidator::new(&self.store, &self.config.rules).validate_deal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::ForecastDimension;
    use crate::rollup::Transition;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, day).unwrap()
    }

    /// Deal with one usable step "s1": signatory "sam" (c1) and evaluator "eve" (c2)
    fn deal() -> DealEngine {
        let mut deal = DealEngine::new("acme", "Acme renewal", Arc::new(EngineConfig::default())).unwrap();
        deal.add_product("p1", "Analytics").unwrap();
        deal.create_step(
            "s1",
            StepAttributes::named("Security review")
                .due(date(30))
                .products(["p1"])
                .dimension(ForecastDimension::SecurityCompliance)
                .buyer_owner("CISO")
                .seller_owner("SE"),
        )
        .unwrap();
        let s1 = StepId::new("s1");
        deal.assign_actor(&s1, "sam", Person::new("Sam"), Role::Signatory).unwrap();
        deal.assign_actor(&s1, "eve", Person::new("Eve"), Role::Evaluator).unwrap();
        deal.create_criterion(&ActorId::new("sam"), "c1", CriterionAttributes::mandatory("Budget approved"))
            .unwrap();
        deal.create_criterion(&ActorId::new("eve"), "c2", CriterionAttributes::mandatory("Pen test passed"))
            .unwrap();
        deal
    }

    #[test]
    fn test_rejected_mutation_leaves_no_trace() {
        let mut deal = deal();
        deal.create_criterion(
            &ActorId::new("sam"),
            "c3",
            CriterionAttributes::mandatory("Legal sign-off").due(date(30)),
        )
        .unwrap();

        let nodes = deal.store().node_count();
        let edges = deal.store().edge_count();
        let history = deal.history().len();
        let snapshot = deal.snapshot();

        // The actor's date would fall before its criterion's
        let result = deal.set_due(ActorId::new("sam"), date(10));
        assert!(matches!(
            result,
            Err(EngineError::Validation(ValidationError::TimelineViolation { .. }))
        ));

        assert_eq!(deal.store().node_count(), nodes);
        assert_eq!(deal.store().edge_count(), edges);
        assert!(deal
            .store()
            .timeline(&TimelineId::for_owner(&ActorId::new("sam").node()))
            .is_none());
        assert_eq!(deal.history().len(), history);
        assert_eq!(*deal.snapshot(), *snapshot);
    }

    #[test]
    fn test_step_not_ready_lists_blockers() {
        let mut deal = deal();
        let s1 = StepId::new("s1");
        deal.set_status(s1.clone(), Status::InProgress).unwrap();

        let err = deal.set_status(s1.clone(), Status::Completed).unwrap_err();
        match err {
            EngineError::StepNotReady { step, blockers } => {
                assert_eq!(step, s1);
                assert!(blockers.contains(&crate::rollup::Blocker::NoEvidence));
                assert_eq!(blockers.len(), 3);
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(deal.store().step(&s1).unwrap().status, Status::InProgress);
    }

    #[test]
    fn test_sign_off_needs_basis_and_signatory() {
        let mut deal = deal();
        deal.assign_actor(&StepId::new("s1"), "bob", Person::new("Bob"), Role::Signatory)
            .unwrap();
        assert_eq!(
            deal.record_sign_off(&ActorId::new("bob"), SignOff::Granted),
            Err(EngineError::NoEvaluationBasis { signatory: ActorId::new("bob") })
        );
        // Bypass needs no basis
        deal.record_sign_off(&ActorId::new("bob"), SignOff::Bypassed).unwrap();

        assert!(matches!(
            deal.record_sign_off(&ActorId::new("eve"), SignOff::Granted),
            Err(EngineError::Validation(ValidationError::NotSignatory { .. }))
        ));

        deal.inherit_evaluation(&ActorId::new("bob"), &ActorId::new("eve")).unwrap();
        deal.record_sign_off(&ActorId::new("bob"), SignOff::Granted).unwrap();
        let bob = deal.actor_status(&ActorId::new("bob")).unwrap();
        assert_eq!(bob.open_criteria, vec![CriterionId::new("c2")]);
    }

    #[test]
    fn test_revoked_sign_off_reopens_step() {
        let mut deal = deal();
        let s1 = StepId::new("s1");
        deal.set_status(s1.clone(), Status::InProgress).unwrap();
        deal.set_status(CriterionId::new("c1"), Status::Completed).unwrap();
        deal.set_status(CriterionId::new("c2"), Status::Completed).unwrap();
        deal.attach_evidence(s1.clone(), EvidenceArtifact::new("signed security questionnaire"))
            .unwrap();
        deal.record_sign_off(&ActorId::new("sam"), SignOff::Granted).unwrap();
        assert_eq!(deal.step_status(&s1).unwrap().effective, Status::Completed);
        assert_eq!(deal.outcome(), DealOutcome::ClosedWon);

        deal.record_sign_off(&ActorId::new("sam"), SignOff::Pending).unwrap();
        assert_eq!(deal.step_status(&s1).unwrap().effective, Status::InProgress);
        assert_eq!(deal.outcome(), DealOutcome::Open);

        let reopened = deal.history().iter().any(|entry| {
            entry.event
                == HistoryEvent::Derived(Transition::Status {
                    entity: s1.node(),
                    from: Some(Status::Completed),
                    to: Status::InProgress,
                })
        });
        assert!(reopened);
    }

    #[test]
    fn test_started_step_stays_usable() {
        let mut deal = deal();
        let s1 = StepId::new("s1");
        deal.set_status(s1.clone(), Status::InProgress).unwrap();
        let edges = deal.store().edge_count();

        assert_eq!(
            deal.remove_actor(&ActorId::new("sam")),
            Err(EngineError::Validation(ValidationError::MissingSignatory { step: s1.clone() }))
        );
        assert!(matches!(
            deal.remove_criterion(&CriterionId::new("c2")),
            Err(EngineError::Validation(ValidationError::MissingCriterion { .. }))
        ));
        assert!(matches!(
            deal.assign_actor(&s1, "ivan", Person::new("Ivan"), Role::Evaluator),
            Err(EngineError::Validation(ValidationError::MissingCriterion { .. }))
        ));
        assert_eq!(deal.store().edge_count(), edges);
        assert!(deal.validate().is_empty());

        // Unstarted steps may pass through incomplete states
        deal.create_step("s2", StepAttributes::named("Contract")).unwrap();
        let s2 = StepId::new("s2");
        deal.assign_actor(&s2, "gc", Person::new("Gina"), Role::Signatory).unwrap();
        deal.remove_actor(&ActorId::new("gc")).unwrap();
    }

    #[test]
    fn test_closed_lost_is_sticky() {
        let mut deal = deal();
        deal.mark_closed_lost("budget frozen").unwrap();
        assert_eq!(deal.outcome(), DealOutcome::ClosedLost);
        assert_eq!(
            deal.set_status(CriterionId::new("c1"), Status::Completed),
            Err(EngineError::DealClosed(DealId::new("acme")))
        );
    }

    #[test]
    fn test_remove_step_respects_outside_dependents() {
        let mut deal = deal();
        deal.create_step("s2", StepAttributes::named("Contract")).unwrap();
        deal.assign_actor(&StepId::new("s2"), "gc", Person::new("Gina"), Role::Signatory)
            .unwrap();
        deal.create_criterion(&ActorId::new("gc"), "c9", CriterionAttributes::mandatory("Redlines closed"))
            .unwrap();
        deal.add_criterion_dependency(&CriterionId::new("c9"), ActorId::new("eve"))
            .unwrap();

        let err = deal.remove_step(&StepId::new("s1")).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Graph(GraphError::ReferentialIntegrity { .. })
        ));

        // Removing the dependent step first frees s1
        deal.remove_step(&StepId::new("s2")).unwrap();
        deal.remove_step(&StepId::new("s1")).unwrap();
        assert!(deal.store().criterion(&CriterionId::new("c1")).is_none());
        assert!(deal.snapshot().steps.is_empty());
        assert!(deal.snapshot().criteria.is_empty());
    }

    #[test]
    fn test_blocking_chain_walks_prerequisites() {
        let mut deal = deal();
        deal.create_step("s2", StepAttributes::named("Contract")).unwrap();
        deal.add_step_dependency(&StepId::new("s2"), &StepId::new("s1")).unwrap();
        deal.set_status(StepId::new("s1"), Status::InProgress).unwrap();

        let chain = deal.blocking_chain(&StepId::new("s2")).unwrap();
        assert!(chain.iter().any(|link| link.depth == 0 && link.node == StepId::new("s1").node()));
        assert!(chain
            .iter()
            .any(|link| link.depth > 0 && link.node == CriterionId::new("c1").node()));

        let actors = deal.actors_by_role(&StepId::new("s1")).unwrap();
        assert_eq!(actors.signatories.len(), 1);
        assert_eq!(actors.evaluators.len(), 1);
    }
}
