//! Node payloads for the buying-process graph
//!
//! Every entity of a deal is one node. Relationships (products, prerequisites,
//! ownership, timelines, evidence) are edges, never fields, so the store stays
//! the single source of truth for structure.

use super::types::{
    ActorId, CriterionId, DealId, EventId, EvidenceId, NodeId, NodeKind, ProcessId, ProductId,
    StepId, TimelineId,
};
use crate::forecast::ForecastDimension;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Progress status shared by steps and criteria
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Status {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Bypassed,
}

impl Status {
    /// Completed or Bypassed: counts as closure for rollup purposes
    pub fn is_closed(&self) -> bool {
        matches!(self, Status::Completed | Status::Bypassed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::NotStarted => "Not Started",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
            Status::Bypassed => "Bypassed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-', ' '], "").as_str() {
            "notstarted" => Ok(Status::NotStarted),
            "inprogress" => Ok(Status::InProgress),
            "completed" => Ok(Status::Completed),
            "bypassed" => Ok(Status::Bypassed),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// Outcome of a deal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DealOutcome {
    #[default]
    Open,
    ClosedWon,
    ClosedLost,
}

impl fmt::Display for DealOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DealOutcome::Open => "Open",
            DealOutcome::ClosedWon => "Closed Won",
            DealOutcome::ClosedLost => "Closed Lost",
        })
    }
}

/// A sales deal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Reason recorded by the external close-lost action; `Some` means closed lost
    pub lost_reason: Option<String>,
}

/// The buying process owned by a deal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyingProcess {
    pub id: ProcessId,
}

/// A buying step
///
/// Products, prerequisites, timeline, evidence and actors hang off the step as edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyingStep {
    pub id: StepId,
    pub name: String,
    /// Status as set by the caller; the rollup derives the effective status
    pub status: Status,
    pub dimension: Option<ForecastDimension>,
    pub buyer_owner: Option<String>,
    pub seller_owner: Option<String>,
}

/// Identity of a stakeholder behind an actor assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Person {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub department: String,
}

impl Person {
    pub fn new(name: impl Into<String>) -> Self {
        Person {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = department.into();
        self
    }
}

/// Sign-off decision of a signatory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SignOff {
    #[default]
    Pending,
    Granted,
    Rejected,
    Bypassed,
}

impl SignOff {
    pub fn is_closed(&self) -> bool {
        matches!(self, SignOff::Granted | SignOff::Bypassed)
    }
}

impl fmt::Display for SignOff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignOff::Pending => "Pending",
            SignOff::Granted => "Granted",
            SignOff::Rejected => "Rejected",
            SignOff::Bypassed => "Bypassed",
        })
    }
}

impl FromStr for SignOff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(SignOff::Pending),
            "granted" | "approved" => Ok(SignOff::Granted),
            "rejected" => Ok(SignOff::Rejected),
            "bypassed" => Ok(SignOff::Bypassed),
            other => Err(format!("unknown sign-off decision '{}'", other)),
        }
    }
}

/// Role requested when assigning an actor to a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Signatory,
    Evaluator,
    Influencer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Signatory => "Signatory",
            Role::Evaluator => "Evaluator",
            Role::Influencer => "Influencer",
        })
    }
}

/// Role of an actor on its step; only signatories carry sign-off state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum ActorRole {
    Signatory { sign_off: SignOff },
    Evaluator,
    Influencer,
}

impl ActorRole {
    pub fn role(&self) -> Role {
        match self {
            ActorRole::Signatory { .. } => Role::Signatory,
            ActorRole::Evaluator => Role::Evaluator,
            ActorRole::Influencer => Role::Influencer,
        }
    }

    pub fn sign_off(&self) -> Option<SignOff> {
        match self {
            ActorRole::Signatory { sign_off } => Some(*sign_off),
            _ => None,
        }
    }
}

impl From<Role> for ActorRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Signatory => ActorRole::Signatory {
                sign_off: SignOff::Pending,
            },
            Role::Evaluator => ActorRole::Evaluator,
            Role::Influencer => ActorRole::Influencer,
        }
    }
}

/// A stakeholder assigned to one step in one role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub person: Person,
    pub role: ActorRole,
}

/// Whether a criterion blocks its actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CriterionKind {
    Mandatory,
    NonMandatory,
}

impl fmt::Display for CriterionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CriterionKind::Mandatory => "Mandatory",
            CriterionKind::NonMandatory => "Non-Mandatory",
        })
    }
}

/// A condition an actor must satisfy on its step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: CriterionId,
    pub description: String,
    pub kind: CriterionKind,
    /// Status as set by the caller; the rollup derives the effective status
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
}

/// Target date attached to a step, actor or criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub id: TimelineId,
    pub due: NaiveDate,
}

/// Evidence attached to a step or criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceArtifact {
    pub id: EvidenceId,
    pub artifact: String,
    pub last_updated: DateTime<Utc>,
}

impl EvidenceArtifact {
    pub fn new(artifact: impl Into<String>) -> Self {
        EvidenceArtifact {
            id: EvidenceId::generate(),
            artifact: artifact.into(),
            last_updated: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<EvidenceId>) -> Self {
        self.id = id.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Call,
    Email,
    Meeting,
}

/// A dated interaction actors took part in; provenance for evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub id: EventId,
    pub channel: Channel,
    pub occurred_at: DateTime<Utc>,
    pub summary: String,
}

/// A node in the buying-process graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Deal(Deal),
    Process(BuyingProcess),
    Step(BuyingStep),
    Actor(Actor),
    Criterion(Criterion),
    Product(Product),
    Timeline(Timeline),
    Evidence(EvidenceArtifact),
    Event(EngagementEvent),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Deal(n) => n.id.node(),
            Node::Process(n) => n.id.node(),
            Node::Step(n) => n.id.node(),
            Node::Actor(n) => n.id.node(),
            Node::Criterion(n) => n.id.node(),
            Node::Product(n) => n.id.node(),
            Node::Timeline(n) => n.id.node(),
            Node::Evidence(n) => n.id.node(),
            Node::Event(n) => n.id.node(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Deal(_) => NodeKind::Deal,
            Node::Process(_) => NodeKind::Process,
            Node::Step(_) => NodeKind::Step,
            Node::Actor(_) => NodeKind::Actor,
            Node::Criterion(_) => NodeKind::Criterion,
            Node::Product(_) => NodeKind::Product,
            Node::Timeline(_) => NodeKind::Timeline,
            Node::Evidence(_) => NodeKind::Evidence,
            Node::Event(_) => NodeKind::Event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_closure() {
        assert!(Status::Completed.is_closed());
        assert!(Status::Bypassed.is_closed());
        assert!(!Status::InProgress.is_closed());
        assert!(!Status::NotStarted.is_closed());
    }

    #[test]
    fn test_status_parse_labels() {
        assert_eq!("Not Started".parse::<Status>(), Ok(Status::NotStarted));
        assert_eq!("in_progress".parse::<Status>(), Ok(Status::InProgress));
        assert_eq!("completed".parse::<Status>(), Ok(Status::Completed));
        assert!("done".parse::<Status>().is_err());
    }

    #[test]
    fn test_sign_off_parse_accepts_approved() {
        assert_eq!("Approved".parse::<SignOff>(), Ok(SignOff::Granted));
        assert!(SignOff::Bypassed.is_closed());
        assert!(!SignOff::Rejected.is_closed());
    }

    #[test]
    fn test_only_signatory_carries_sign_off() {
        let sig: ActorRole = Role::Signatory.into();
        assert_eq!(sig.sign_off(), Some(SignOff::Pending));
        assert_eq!(ActorRole::Evaluator.sign_off(), None);
        assert_eq!(ActorRole::Influencer.role(), Role::Influencer);
    }

    #[test]
    fn test_node_id_and_kind() {
        let node = Node::Criterion(Criterion {
            id: CriterionId::new("c1"),
            description: "SOC2 report reviewed".to_string(),
            kind: CriterionKind::Mandatory,
            status: Status::NotStarted,
        });
        assert_eq!(node.kind(), NodeKind::Criterion);
        assert_eq!(node.id(), CriterionId::new("c1").node());
    }

    #[test]
    fn test_node_serde_tagged() {
        let node = Node::Product(Product {
            id: ProductId::new("p1"),
            name: "Analytics".to_string(),
        });
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["node"], "product");
        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }
}
