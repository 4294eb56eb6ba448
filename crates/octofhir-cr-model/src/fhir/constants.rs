//! Fixed code systems and population codes

use super::datatypes::CodeableConcept;
use std::fmt;

/// Code system URIs
pub mod systems {
    pub const MEASURE_POPULATION: &str = "http://terminology.hl7.org/CodeSystem/measure-population";
    pub const MEASURE_IMPROVEMENT_NOTATION: &str =
        "http://terminology.hl7.org/CodeSystem/measure-improvement-notation";
    pub const MEASURE_SCORING: &str = "http://terminology.hl7.org/CodeSystem/measure-scoring";
    pub const LOINC: &str = "http://loinc.org";
    pub const V3_ACT_CODE: &str = "http://terminology.hl7.org/CodeSystem/v3-ActCode";
}

/// Population kinds of a measure group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PopulationKind {
    InitialPopulation,
    Denominator,
    DenominatorExclusion,
    DenominatorException,
    Numerator,
    NumeratorExclusion,
    MeasurePopulation,
    MeasurePopulationExclusion,
    MeasureObservation,
}

impl PopulationKind {
    pub const ALL: [PopulationKind; 9] = [
        Self::InitialPopulation,
        Self::Denominator,
        Self::DenominatorExclusion,
        Self::DenominatorException,
        Self::Numerator,
        Self::NumeratorExclusion,
        Self::MeasurePopulation,
        Self::MeasurePopulationExclusion,
        Self::MeasureObservation,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::InitialPopulation => "initial-population",
            Self::Denominator => "denominator",
            Self::DenominatorExclusion => "denominator-exclusion",
            Self::DenominatorException => "denominator-exception",
            Self::Numerator => "numerator",
            Self::NumeratorExclusion => "numerator-exclusion",
            Self::MeasurePopulation => "measure-population",
            Self::MeasurePopulationExclusion => "measure-population-exclusion",
            Self::MeasureObservation => "measure-observation",
        }
    }

    pub fn display(self) -> &'static str {
        match self {
            Self::InitialPopulation => "Initial Population",
            Self::Denominator => "Denominator",
            Self::DenominatorExclusion => "Denominator Exclusion",
            Self::DenominatorException => "Denominator Exception",
            Self::Numerator => "Numerator",
            Self::NumeratorExclusion => "Numerator Exclusion",
            Self::MeasurePopulation => "Measure Population",
            Self::MeasurePopulationExclusion => "Measure Population Exclusion",
            Self::MeasureObservation => "Measure Observation",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }
}

impl fmt::Display for PopulationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Direction of improvement declared by a measure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImprovementNotation {
    Increase,
    Decrease,
}

impl ImprovementNotation {
    pub fn code(self) -> &'static str {
        match self {
            Self::Increase => "increase",
            Self::Decrease => "decrease",
        }
    }

    /// Read the notation from its measure-improvement-notation coding
    pub fn from_concept(concept: &CodeableConcept) -> Option<Self> {
        if concept.has_coding(systems::MEASURE_IMPROVEMENT_NOTATION, "increase") {
            Some(Self::Increase)
        } else if concept.has_coding(systems::MEASURE_IMPROVEMENT_NOTATION, "decrease") {
            Some(Self::Decrease)
        } else {
            None
        }
    }
}
