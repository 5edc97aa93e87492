//! Read-side views over a deal's committed state

use crate::graph::{Actor, ActorId, CriterionId, NodeId, Role, SignOff, Status, StepId};
use crate::rollup::{Blocker, RollupSnapshot};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a node in a blocking chain holds up its parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockReason {
    NoSignatory,
    NoEvidence,
    ActorIncomplete { role: Role },
    NoEvaluationBasis,
    SignOffPending { sign_off: SignOff },
    CriterionOpen { status: Status },
    PrerequisiteOpen { status: Status },
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::NoSignatory => f.write_str("no signatory assigned"),
            BlockReason::NoEvidence => f.write_str("no evidence attached"),
            BlockReason::ActorIncomplete { role } => write!(f, "{} incomplete", role),
            BlockReason::NoEvaluationBasis => f.write_str("no evaluation basis"),
            BlockReason::SignOffPending { sign_off } => write!(f, "sign-off {}", sign_off),
            BlockReason::CriterionOpen { status } => write!(f, "criterion {}", status),
            BlockReason::PrerequisiteOpen { status } => write!(f, "prerequisite {}", status),
        }
    }
}

/// One link of a blocking chain; `depth` 0 blocks the queried step directly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingLink {
    pub depth: usize,
    pub node: NodeId,
    pub reason: BlockReason,
}

/// Actors of one step grouped by role
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorsByRole {
    pub signatories: Vec<Actor>,
    pub evaluators: Vec<Actor>,
    pub influencers: Vec<Actor>,
}

impl ActorsByRole {
    pub fn push(&mut self, actor: Actor) {
        match actor.role.role() {
            Role::Signatory => self.signatories.push(actor),
            Role::Evaluator => self.evaluators.push(actor),
            Role::Influencer => self.influencers.push(actor),
        }
    }

    pub fn len(&self) -> usize {
        self.signatories.len() + self.evaluators.len() + self.influencers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Walks a snapshot from a step down to the unmet leaves
pub(crate) struct ChainBuilder<'a> {
    snapshot: &'a RollupSnapshot,
    visited: IndexSet<NodeId>,
    links: Vec<BlockingLink>,
}

impl<'a> ChainBuilder<'a> {
    pub(crate) fn new(snapshot: &'a RollupSnapshot) -> Self {
        ChainBuilder {
            snapshot,
            visited: IndexSet::new(),
            links: Vec::new(),
        }
    }

    pub(crate) fn build(mut self, step: &StepId) -> Vec<BlockingLink> {
        self.visited.insert(step.node());
        self.step(step, 0);
        self.links
    }

    fn link(&mut self, depth: usize, node: NodeId, reason: BlockReason) {
        self.links.push(BlockingLink { depth, node, reason });
    }

    fn step(&mut self, step: &StepId, depth: usize) {
        let snapshot = self.snapshot;
        let Some(rollup) = snapshot.steps.get(step) else {
            return;
        };
        if rollup.effective.is_closed() {
            return;
        }

        for blocker in &rollup.blockers {
            match blocker {
                Blocker::NoSignatory => self.link(depth, step.node(), BlockReason::NoSignatory),
                Blocker::NoEvidence => self.link(depth, step.node(), BlockReason::NoEvidence),
                Blocker::Actor {
                    actor,
                    role,
                    open_criteria,
                    sign_off,
                    has_basis,
                } => {
                    self.actor(actor, *role, open_criteria, *sign_off, *has_basis, depth);
                }
                Blocker::Prerequisite { step: prerequisite, status } => {
                    self.link(
                        depth,
                        prerequisite.node(),
                        BlockReason::PrerequisiteOpen { status: *status },
                    );
                    if self.visited.insert(prerequisite.node()) {
                        self.step(prerequisite, depth + 1);
                    }
                }
            }
        }
    }

    fn actor(
        &mut self,
        actor: &ActorId,
        role: Role,
        open_criteria: &[CriterionId],
        sign_off: Option<SignOff>,
        has_basis: bool,
        depth: usize,
    ) {
        let node = actor.node();
        self.link(depth, node.clone(), BlockReason::ActorIncomplete { role });
        if !has_basis {
            self.link(depth + 1, node.clone(), BlockReason::NoEvaluationBasis);
        }
        if let Some(decision) = sign_off.filter(|s| !s.is_closed()) {
            self.link(
                depth + 1,
                node,
                BlockReason::SignOffPending { sign_off: decision },
            );
        }
        for criterion in open_criteria {
            if self.visited.insert(criterion.node()) {
                self.criterion(criterion, depth + 1);
            }
        }
    }

    fn criterion(&mut self, criterion: &CriterionId, depth: usize) {
        let snapshot = self.snapshot;
        let Some(rollup) = snapshot.criteria.get(criterion) else {
            return;
        };
        self.link(
            depth,
            criterion.node(),
            BlockReason::CriterionOpen {
                status: rollup.effective,
            },
        );
        for dependency in &rollup.open_dependencies {
            if self.visited.insert(dependency.node()) {
                self.criterion(dependency, depth + 1);
            }
        }
    }
}
