//! Care-gap status classification

use octofhir_cr_model::fhir::{ImprovementNotation, Measure, MeasureReport, PopulationKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Care-gap status of one (subject, measure) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapStatus {
    OpenGap,
    ClosedGap,
    /// Accepted as a filter value; never produced by [`gap_status`]
    NotApplicable,
}

impl GapStatus {
    pub const ALL: [GapStatus; 3] = [Self::OpenGap, Self::ClosedGap, Self::NotApplicable];

    pub fn code(self) -> &'static str {
        match self {
            Self::OpenGap => "open-gap",
            Self::ClosedGap => "closed-gap",
            Self::NotApplicable => "not-applicable",
        }
    }

    /// Narrative of the composition section reporting this status
    pub fn narrative(self) -> &'static str {
        match self {
            Self::ClosedGap => "No detected issues.",
            _ => "Issues detected.",
        }
    }
}

impl fmt::Display for GapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown gap status: {0}")]
pub struct UnknownGapStatus(pub String);

impl FromStr for GapStatus {
    type Err = UnknownGapStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.code() == s)
            .ok_or_else(|| UnknownGapStatus(s.to_string()))
    }
}

/// Gap status of an individual report.
///
/// The subject is in the numerator when a numerator population has count 1.
/// A gap is open when the measure improves upward and the subject is not in
/// the numerator, or improves downward and the subject is in it.
pub fn gap_status(measure: &Measure, report: &MeasureReport) -> GapStatus {
    let in_numerator = report
        .group
        .iter()
        .flat_map(|group| &group.population)
        .any(|population| population.kind() == Some(PopulationKind::Numerator) && population.count == 1);

    let positive = measure
        .improvement_notation
        .as_ref()
        .and_then(ImprovementNotation::from_concept)
        == Some(ImprovementNotation::Increase);

    if positive != in_numerator {
        GapStatus::OpenGap
    } else {
        GapStatus::ClosedGap
    }
}
