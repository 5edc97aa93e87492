//! Argument types for engine mutations

use crate::forecast::ForecastDimension;
use crate::graph::{ActorId, CriterionId, CriterionKind, NodeId, ProductId, StepId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Step attributes; `None` leaves an attribute unchanged on update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepAttributes {
    pub name: Option<String>,
    pub due: Option<NaiveDate>,
    /// Replaces the step's product tags
    pub products: Option<Vec<ProductId>>,
    pub dimension: Option<ForecastDimension>,
    pub buyer_owner: Option<String>,
    pub seller_owner: Option<String>,
}

impl StepAttributes {
    pub fn named(name: impl Into<String>) -> Self {
        StepAttributes {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn due(mut self, due: NaiveDate) -> Self {
        self.due = Some(due);
        self
    }

    pub fn products<I, P>(mut self, products: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ProductId>,
    {
        self.products = Some(products.into_iter().map(Into::into).collect());
        self
    }

    pub fn dimension(mut self, dimension: ForecastDimension) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub fn buyer_owner(mut self, owner: impl Into<String>) -> Self {
        self.buyer_owner = Some(owner.into());
        self
    }

    pub fn seller_owner(mut self, owner: impl Into<String>) -> Self {
        self.seller_owner = Some(owner.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionAttributes {
    pub description: String,
    pub kind: CriterionKind,
    /// Empty means every product of the owning step
    #[serde(default)]
    pub products: Vec<ProductId>,
    #[serde(default)]
    pub due: Option<NaiveDate>,
}

impl CriterionAttributes {
    pub fn mandatory(description: impl Into<String>) -> Self {
        CriterionAttributes {
            description: description.into(),
            kind: CriterionKind::Mandatory,
            products: Vec::new(),
            due: None,
        }
    }

    pub fn optional(description: impl Into<String>) -> Self {
        CriterionAttributes {
            kind: CriterionKind::NonMandatory,
            ..Self::mandatory(description)
        }
    }

    pub fn products<I, P>(mut self, products: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ProductId>,
    {
        self.products = products.into_iter().map(Into::into).collect();
        self
    }

    pub fn due(mut self, due: NaiveDate) -> Self {
        self.due = Some(due);
        self
    }
}

/// What a criterion can depend on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyTarget {
    Criterion(CriterionId),
    /// Every criterion the actor owns, now and later
    Actor(ActorId),
}

impl From<CriterionId> for DependencyTarget {
    fn from(id: CriterionId) -> Self {
        DependencyTarget::Criterion(id)
    }
}

impl From<ActorId> for DependencyTarget {
    fn from(id: ActorId) -> Self {
        DependencyTarget::Actor(id)
    }
}

/// An entity carrying status and evidence
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackedEntity {
    Step(StepId),
    Criterion(CriterionId),
}

impl TrackedEntity {
    pub fn node(&self) -> NodeId {
        match self {
            TrackedEntity::Step(id) => id.node(),
            TrackedEntity::Criterion(id) => id.node(),
        }
    }
}

impl From<StepId> for TrackedEntity {
    fn from(id: StepId) -> Self {
        TrackedEntity::Step(id)
    }
}

impl From<CriterionId> for TrackedEntity {
    fn from(id: CriterionId) -> Self {
        TrackedEntity::Criterion(id)
    }
}

impl fmt::Display for TrackedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node())
    }
}

impl FromStr for TrackedEntity {
    type Err = String;

    /// `step:<id>` or `criterion:<id>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("step", id)) if !id.is_empty() => Ok(TrackedEntity::Step(id.into())),
            Some(("criterion", id)) if !id.is_empty() => Ok(TrackedEntity::Criterion(id.into())),
            _ => Err(format!(
                "expected step:<id> or criterion:<id>, got '{}'",
                s
            )),
        }
    }
}
