//! FHIR resources read and produced by the pipeline
//!
//! Only the elements the pipeline uses are modelled; everything else in the
//! source JSON is ignored on read.

use super::datatypes::{
    Attachment, CodeableConcept, Coding, Extension, Meta, Narrative, Period, Reference,
};
use super::constants::{PopulationKind, systems};
use serde::{Deserialize, Serialize};

/// Library resource carrying logic content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Library {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Attachment>,
}

/// Measure definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improvement_notation: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub library: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group: Vec<MeasureGroup>,
}

impl Measure {
    /// `Measure/<id>`
    pub fn reference(&self) -> String {
        format!("Measure/{}", self.id.as_deref().unwrap_or_default())
    }

    /// Canonical reference, falling back to the resource reference
    pub fn canonical(&self) -> String {
        match (&self.url, &self.version) {
            (Some(url), Some(version)) => format!("{}|{}", url, version),
            (Some(url), None) => url.clone(),
            _ => self.reference(),
        }
    }

    pub fn scoring_code(&self) -> Option<&str> {
        self.scoring
            .as_ref()?
            .coding
            .iter()
            .find_map(|c| c.code.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasureGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub population: Vec<MeasureGroupPopulation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasureGroupPopulation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Expression>,
}

impl MeasureGroupPopulation {
    /// Population kind declared by the measure-population coding
    pub fn kind(&self) -> Option<PopulationKind> {
        self.code.as_ref()?.coding.iter().find_map(|c| {
            (c.system.as_deref() == Some(systems::MEASURE_POPULATION))
                .then(|| c.code.as_deref().and_then(PopulationKind::from_code))
                .flatten()
        })
    }
}

/// FHIR `Expression` datatype
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expression {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

/// MeasureReport produced by measure evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureReport {
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
    pub status: String,
    #[serde(rename = "type")]
    pub report_type: String,
    pub measure: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter: Option<Reference>,
    pub period: Period,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improvement_notation: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group: Vec<MeasureReportGroup>,
}

impl MeasureReport {
    pub fn new(measure: impl Into<String>, report_type: impl Into<String>, period: Period) -> Self {
        Self {
            resource_type: "MeasureReport".to_string(),
            id: None,
            meta: None,
            extension: Vec::new(),
            status: "complete".to_string(),
            report_type: report_type.into(),
            measure: measure.into(),
            subject: None,
            date: None,
            reporter: None,
            period,
            improvement_notation: None,
            group: Vec::new(),
        }
    }

    /// Count recorded for a population kind, summed across groups
    pub fn population_count(&self, kind: PopulationKind) -> Option<u32> {
        let counts: Vec<u32> = self
            .group
            .iter()
            .flat_map(|g| g.population.iter())
            .filter(|p| p.kind() == Some(kind))
            .map(|p| p.count)
            .collect();
        (!counts.is_empty()).then(|| counts.iter().sum())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureReportGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub population: Vec<MeasureReportPopulation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measure_score: Option<Quantity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureReportPopulation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,
    pub count: u32,
    /// Ids of member subjects (subject-list reports only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subject_results: Vec<Reference>,
}

impl MeasureReportPopulation {
    pub fn new(kind: PopulationKind, count: u32) -> Self {
        Self {
            code: Some(CodeableConcept::from_coding(Coding::new(
                systems::MEASURE_POPULATION,
                kind.code(),
                Some(kind.display()),
            ))),
            count,
            subject_results: Vec::new(),
        }
    }

    pub fn kind(&self) -> Option<PopulationKind> {
        self.code.as_ref()?.coding.iter().find_map(|c| {
            (c.system.as_deref() == Some(systems::MEASURE_POPULATION))
                .then(|| c.code.as_deref().and_then(PopulationKind::from_code))
                .flatten()
        })
    }
}

/// DetectedIssue describing a care gap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedIssue {
    pub resource_type: String,
    pub id: String,
    pub meta: Meta,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifier_extension: Vec<Extension>,
    pub status: String,
    pub code: CodeableConcept,
    pub patient: Reference,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<DetectedIssueEvidence>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectedIssueEvidence {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detail: Vec<Reference>,
}

/// Composition heading a care-gaps document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    pub resource_type: String,
    pub id: String,
    pub meta: Meta,
    pub status: String,
    #[serde(rename = "type")]
    pub composition_type: CodeableConcept,
    pub subject: Reference,
    pub date: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub author: Vec<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custodian: Option<Reference>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub section: Vec<CompositionSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionSection {
    pub title: String,
    pub focus: Reference,
    pub text: Narrative,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<Reference>,
}

/// Bundle; entries hold arbitrary resources as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(rename = "type")]
    pub bundle_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    pub fn new(bundle_type: impl Into<String>) -> Self {
        Self {
            resource_type: "Bundle".to_string(),
            id: None,
            meta: None,
            bundle_type: bundle_type.into(),
            timestamp: None,
            entry: Vec::new(),
        }
    }

    /// Collection bundle wrapping the given resources
    pub fn collection(resources: impl IntoIterator<Item = serde_json::Value>) -> Self {
        let mut bundle = Self::new("collection");
        bundle.entry = resources
            .into_iter()
            .map(|resource| BundleEntry {
                full_url: None,
                resource,
            })
            .collect();
        bundle
    }

    pub fn resources(&self) -> impl Iterator<Item = &serde_json::Value> {
        self.entry.iter().map(|e| &e.resource)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    pub resource: serde_json::Value,
}

/// Endpoint naming a remote data or terminology server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,
    /// `Name: value` pairs attached to outbound calls
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub header: Vec<String>,
}

impl Endpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            header: Vec::new(),
        }
    }
}

/// Group of subjects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub member: Vec<GroupMember>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub entity: Reference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inactive: Option<bool>,
}
