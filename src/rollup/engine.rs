//! Derived status rollup
//!
//! Evaluates the rollup plan in topological order and produces an immutable
//! [`RollupSnapshot`]. A cascade re-evaluates only the forward closure of the
//! changed nodes, reading every other value from the previous snapshot, and
//! always yields the same snapshot a full recomputation would.

use super::plan::{inherited_basis, RollupPlan};
use crate::forecast::ForecastDimension;
use crate::graph::{
    ActorId, ActorRole, CriterionId, CriterionKind, DealOutcome, Direction, EdgeKind, GraphStore,
    NodeId, NodeKind, Role, SignOff, Status, StepId,
};
use crate::guard::{CriterionGraph, CycleDetected};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionRollup {
    pub kind: CriterionKind,
    pub marked: Status,
    pub effective: Status,
    /// Expanded dependencies that are neither completed nor bypassed
    pub open_dependencies: Vec<CriterionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorRollup {
    pub role: Role,
    pub complete: bool,
    /// Criteria (own or inherited basis) that still block this actor
    pub open_criteria: Vec<CriterionId>,
    pub sign_off: Option<SignOff>,
    /// Signatory: own or inherited criteria exist. Evaluator: owns a mandatory criterion.
    pub has_basis: bool,
}

impl ActorRollup {
    /// Influencers are tracked but never hold up their step
    pub fn is_blocking(&self) -> bool {
        self.role != Role::Influencer
    }
}

/// One reason a step cannot be completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "blocker", rename_all = "snake_case")]
pub enum Blocker {
    NoSignatory,
    NoEvidence,
    Actor {
        actor: ActorId,
        role: Role,
        open_criteria: Vec<CriterionId>,
        sign_off: Option<SignOff>,
        has_basis: bool,
    },
    Prerequisite { step: StepId, status: Status },
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Blocker::NoSignatory => f.write_str("no signatory assigned"),
            Blocker::NoEvidence => f.write_str("no evidence attached"),
            Blocker::Actor {
                actor,
                role,
                open_criteria,
                sign_off,
                has_basis,
            } => {
                write!(f, "{} {} incomplete", role, actor)?;
                if !has_basis {
                    f.write_str(" (no evaluation basis)")?;
                }
                if !open_criteria.is_empty() {
                    let ids: Vec<&str> = open_criteria.iter().map(|c| c.as_str()).collect();
                    write!(f, " (open criteria: {})", ids.join(", "))?;
                }
                if let Some(decision) = sign_off.filter(|s| !s.is_closed()) {
                    write!(f, " (sign-off {})", decision)?;
                }
                Ok(())
            }
            Blocker::Prerequisite { step, status } => {
                write!(f, "prerequisite {} is {}", step, status)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRollup {
    pub marked: Status,
    pub effective: Status,
    pub dimension: Option<ForecastDimension>,
    pub evidenced: bool,
    pub blockers: Vec<Blocker>,
}

impl StepRollup {
    /// Every completion condition holds
    pub fn is_ready(&self) -> bool {
        self.blockers.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessRollup {
    pub steps: usize,
    pub completed: usize,
    pub bypassed: usize,
    pub complete: bool,
}

/// Derived state of one deal at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollupSnapshot {
    pub criteria: IndexMap<CriterionId, CriterionRollup>,
    pub actors: IndexMap<ActorId, ActorRollup>,
    pub steps: IndexMap<StepId, StepRollup>,
    pub process: ProcessRollup,
    pub outcome: DealOutcome,
}

impl RollupSnapshot {
    fn criterion_closed(&self, id: &CriterionId) -> bool {
        self.criteria
            .get(id)
            .map(|c| c.effective.is_closed())
            .unwrap_or(false)
    }

    fn step_status(&self, id: &StepId) -> Status {
        self.steps
            .get(id)
            .map(|s| s.effective)
            .unwrap_or_default()
    }

    /// Drop entries for nodes the store no longer holds
    fn retain_live(&mut self, store: &GraphStore) {
        self.criteria.retain(|id, _| store.criterion(id).is_some());
        self.actors.retain(|id, _| store.actor(id).is_some());
        self.steps.retain(|id, _| store.step(id).is_some());
    }

    /// Derived-state changes from `previous` to `self`
    pub fn transitions(&self, previous: &RollupSnapshot) -> Vec<Transition> {
        let mut changes = Vec::new();

        for (id, now) in &self.criteria {
            let before = previous.criteria.get(id).map(|c| c.effective);
            if before != Some(now.effective) {
                changes.push(Transition::Status {
                    entity: id.node(),
                    from: before,
                    to: now.effective,
                });
            }
        }
        for (id, now) in &self.actors {
            let before = previous.actors.get(id).map(|a| a.complete);
            if before.is_some() && before != Some(now.complete) {
                changes.push(Transition::ActorCompletion {
                    actor: id.clone(),
                    complete: now.complete,
                });
            }
        }
        for (id, now) in &self.steps {
            let before = previous.steps.get(id).map(|s| s.effective);
            if before != Some(now.effective) {
                changes.push(Transition::Status {
                    entity: id.node(),
                    from: before,
                    to: now.effective,
                });
            }
        }
        if self.outcome != previous.outcome {
            changes.push(Transition::Outcome {
                from: previous.outcome,
                to: self.outcome,
            });
        }
        changes
    }
}

/// A change of derived state between two snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum Transition {
    /// Effective status of a step or criterion; `from` is `None` for new entities
    Status {
        entity: NodeId,
        from: Option<Status>,
        to: Status,
    },
    ActorCompletion { actor: ActorId, complete: bool },
    Outcome { from: DealOutcome, to: DealOutcome },
}

/// Current rollup state of a deal: the plan plus the snapshot it produced
#[derive(Debug, Clone)]
pub struct RollupEngine {
    plan: RollupPlan,
    snapshot: Arc<RollupSnapshot>,
}

impl RollupEngine {
    /// Evaluate every node
    pub fn full(store: &GraphStore) -> Result<Self, CycleDetected> {
        let criteria = CriterionGraph::materialize(store);
        let plan = RollupPlan::build(store, &criteria)?;
        let mut snapshot = RollupSnapshot::default();
        let order = plan.order().to_vec();
        Evaluator {
            store,
            criteria: &criteria,
        }
        .run(&order, &mut snapshot);
        debug!(nodes = order.len(), "full rollup");
        Ok(RollupEngine {
            plan,
            snapshot: Arc::new(snapshot),
        })
    }

    /// Re-evaluate what `seeds` (and any rewiring since the last plan) can
    /// reach, producing the next engine state. `self` is left untouched.
    pub fn cascade(&self, store: &GraphStore, seeds: &[NodeId]) -> Result<Self, CycleDetected> {
        let criteria = CriterionGraph::materialize(store);
        let plan = RollupPlan::build(store, &criteria)?;

        let mut roots = plan.rewired_since(&self.plan);
        roots.extend(seeds.iter().cloned());
        let affected = plan.affected(&roots);

        let mut snapshot = (*self.snapshot).clone();
        snapshot.retain_live(store);
        Evaluator {
            store,
            criteria: &criteria,
        }
        .run(&affected, &mut snapshot);
        debug!(
            seeds = roots.len(),
            evaluated = affected.len(),
            total = plan.order().len(),
            "rollup cascade"
        );

        Ok(RollupEngine {
            plan,
            snapshot: Arc::new(snapshot),
        })
    }

    pub fn snapshot(&self) -> Arc<RollupSnapshot> {
        Arc::clone(&self.snapshot)
    }
}

struct Evaluator<'a> {
    store: &'a GraphStore,
    criteria: &'a CriterionGraph,
}

impl Evaluator<'_> {
    fn run(&self, order: &[NodeId], snapshot: &mut RollupSnapshot) {
        for node in order {
            match node.kind() {
                NodeKind::Criterion => {
                    if let Some(id) = CriterionId::from_node(node) {
                        if let Some(rollup) = self.criterion(&id, snapshot) {
                            snapshot.criteria.insert(id, rollup);
                        }
                    }
                }
                NodeKind::Actor => {
                    if let Some(id) = ActorId::from_node(node) {
                        if let Some(rollup) = self.actor(&id, snapshot) {
                            snapshot.actors.insert(id, rollup);
                        }
                    }
                }
                NodeKind::Step => {
                    if let Some(id) = StepId::from_node(node) {
                        if let Some(rollup) = self.step(&id, snapshot) {
                            snapshot.steps.insert(id, rollup);
                        }
                    }
                }
                NodeKind::Process => snapshot.process = self.process(node, snapshot),
                NodeKind::Deal => snapshot.outcome = self.outcome(snapshot),
                _ => {}
            }
        }
    }

    fn criterion(&self, id: &CriterionId, snapshot: &RollupSnapshot) -> Option<CriterionRollup> {
        let criterion = self.store.criterion(id)?;
        let open_dependencies: Vec<CriterionId> = self
            .criteria
            .dependencies(id)
            .into_iter()
            .map(|edge| edge.to)
            .filter(|dep| !snapshot.criterion_closed(dep))
            .collect();

        let effective = match criterion.status {
            Status::Completed if !open_dependencies.is_empty() => Status::InProgress,
            marked => marked,
        };

        Some(CriterionRollup {
            kind: criterion.kind,
            marked: criterion.status,
            effective,
            open_dependencies,
        })
    }

    fn owned(&self, id: &ActorId) -> Vec<CriterionId> {
        self.store
            .neighbors(&id.node(), EdgeKind::OwnsCriterion, Direction::Outgoing)
            .into_iter()
            .filter_map(CriterionId::from_node)
            .collect()
    }

    fn is_mandatory(&self, id: &CriterionId) -> bool {
        self.store
            .criterion(id)
            .map(|c| c.kind == CriterionKind::Mandatory)
            .unwrap_or(false)
    }

    /// A decision was recorded or one of the actor's criteria was marked
    fn actor_engaged(&self, id: &ActorId) -> bool {
        let Some(actor) = self.store.actor(id) else {
            return false;
        };
        let decided = actor
            .role
            .sign_off()
            .map(|s| s != SignOff::Pending)
            .unwrap_or(false);
        decided
            || self.owned(id).iter().any(|c| {
                self.store
                    .criterion(c)
                    .map(|c| c.status != Status::NotStarted)
                    .unwrap_or(false)
            })
    }

    fn actor(&self, id: &ActorId, snapshot: &RollupSnapshot) -> Option<ActorRollup> {
        let actor = self.store.actor(id)?;
        let owned = self.owned(id);

        let (basis, has_basis) = match actor.role {
            ActorRole::Signatory { .. } => {
                let mut basis = owned;
                for inherited in inherited_basis(self.store, id) {
                    if !basis.contains(&inherited) {
                        basis.push(inherited);
                    }
                }
                // Signatories answer for every criterion in their basis
                let has_basis = !basis.is_empty();
                (basis, has_basis)
            }
            ActorRole::Evaluator => {
                let mandatory: Vec<CriterionId> =
                    owned.into_iter().filter(|c| self.is_mandatory(c)).collect();
                let has_basis = !mandatory.is_empty();
                (mandatory, has_basis)
            }
            ActorRole::Influencer => (owned, true),
        };

        let open_criteria: Vec<CriterionId> = basis
            .into_iter()
            .filter(|c| !snapshot.criterion_closed(c))
            .collect();
        let sign_off = actor.role.sign_off();
        let complete = has_basis
            && open_criteria.is_empty()
            && sign_off.map(|s| s.is_closed()).unwrap_or(true);

        Some(ActorRollup {
            role: actor.role.role(),
            complete,
            open_criteria,
            sign_off,
            has_basis,
        })
    }

    fn step(&self, id: &StepId, snapshot: &RollupSnapshot) -> Option<StepRollup> {
        let step = self.store.step(id)?;
        let node = id.node();
        let mut blockers = Vec::new();

        let actors: Vec<ActorId> = self
            .store
            .neighbors(&node, EdgeKind::AssignsActor, Direction::Outgoing)
            .into_iter()
            .filter_map(ActorId::from_node)
            .collect();

        let has_signatory = actors
            .iter()
            .filter_map(|a| snapshot.actors.get(a))
            .any(|a| a.role == Role::Signatory);
        if !has_signatory {
            blockers.push(Blocker::NoSignatory);
        }

        for actor in &actors {
            if let Some(rollup) = snapshot.actors.get(actor) {
                if rollup.is_blocking() && !rollup.complete {
                    blockers.push(Blocker::Actor {
                        actor: actor.clone(),
                        role: rollup.role,
                        open_criteria: rollup.open_criteria.clone(),
                        sign_off: rollup.sign_off,
                        has_basis: rollup.has_basis,
                    });
                }
            }
        }

        let evidenced = !self
            .store
            .neighbors(&node, EdgeKind::HasEvidence, Direction::Outgoing)
            .is_empty();
        if !evidenced {
            blockers.push(Blocker::NoEvidence);
        }

        for prerequisite in self
            .store
            .neighbors(&node, EdgeKind::StepDependsOn, Direction::Outgoing)
            .into_iter()
            .filter_map(StepId::from_node)
        {
            let status = snapshot.step_status(&prerequisite);
            if !status.is_closed() {
                blockers.push(Blocker::Prerequisite {
                    step: prerequisite,
                    status,
                });
            }
        }

        // Work on an actor's criteria or sign-off starts the step
        let started = match step.status {
            Status::NotStarted => actors.iter().any(|actor| self.actor_engaged(actor)),
            _ => true,
        };
        let effective = match step.status {
            Status::Bypassed => Status::Bypassed,
            _ if !started => Status::NotStarted,
            _ if blockers.is_empty() => Status::Completed,
            _ => Status::InProgress,
        };

        Some(StepRollup {
            marked: step.status,
            effective,
            dimension: step.dimension,
            evidenced,
            blockers,
        })
    }

    fn process(&self, node: &NodeId, snapshot: &RollupSnapshot) -> ProcessRollup {
        let mut rollup = ProcessRollup::default();
        for step in self
            .store
            .neighbors(node, EdgeKind::ContainsStep, Direction::Outgoing)
            .into_iter()
            .filter_map(StepId::from_node)
        {
            rollup.steps += 1;
            match snapshot.step_status(&step) {
                Status::Completed => rollup.completed += 1,
                Status::Bypassed => rollup.bypassed += 1,
                _ => {}
            }
        }
        rollup.complete = rollup.steps > 0 && rollup.completed + rollup.bypassed == rollup.steps;
        rollup
    }

    fn outcome(&self, snapshot: &RollupSnapshot) -> DealOutcome {
        let lost = self
            .store
            .deal()
            .map(|deal| deal.lost_reason.is_some())
            .unwrap_or(false);
        if lost {
            DealOutcome::ClosedLost
        } else if snapshot.process.complete {
            DealOutcome::ClosedWon
        } else {
            DealOutcome::Open
        }
    }
}
