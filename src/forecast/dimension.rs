//! The fixed forecast readiness dimensions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the 10 categories a deal must close before it can be forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ForecastDimension {
    Budget,
    FunctionUsage,
    Technical,
    SecurityCompliance,
    BusinessCase,
    Commercial,
    Contract,
    ImplementationReadiness,
    AdoptionReadiness,
    OperationalClosure,
}

impl ForecastDimension {
    pub const ALL: [ForecastDimension; 10] = [
        ForecastDimension::Budget,
        ForecastDimension::FunctionUsage,
        ForecastDimension::Technical,
        ForecastDimension::SecurityCompliance,
        ForecastDimension::BusinessCase,
        ForecastDimension::Commercial,
        ForecastDimension::Contract,
        ForecastDimension::ImplementationReadiness,
        ForecastDimension::AdoptionReadiness,
        ForecastDimension::OperationalClosure,
    ];

    /// Display label as used in deal documents
    pub fn label(&self) -> &'static str {
        match self {
            ForecastDimension::Budget => "Budget Closure",
            ForecastDimension::FunctionUsage => "Function Usage Closure",
            ForecastDimension::Technical => "Technical Closure",
            ForecastDimension::SecurityCompliance => "Security & Compliance Closure",
            ForecastDimension::BusinessCase => "Business Case Closure",
            ForecastDimension::Commercial => "Commercial Closure",
            ForecastDimension::Contract => "Contract Closure",
            ForecastDimension::ImplementationReadiness => "Implementation Readiness Closure",
            ForecastDimension::AdoptionReadiness => "Adoption Readiness Closure",
            ForecastDimension::OperationalClosure => "Operational Closure",
        }
    }

    fn normalize(s: &str) -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase()
    }
}

impl fmt::Display for ForecastDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ForecastDimension {
    type Err = String;

    /// Accepts the label ("Security & Compliance Closure"), the label without
    /// its "Closure" suffix, or the snake_case name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = Self::normalize(s);
        let wanted = wanted.strip_suffix("closure").unwrap_or(&wanted);
        ForecastDimension::ALL
            .into_iter()
            .find(|dim| {
                let label = Self::normalize(dim.label());
                let short = label.strip_suffix("closure").unwrap_or(&label);
                short == wanted
                    || Self::normalize(&format!("{:?}", dim)) == wanted
            })
            .ok_or_else(|| format!("unknown forecast dimension '{}'", s.trim()))
    }
}
