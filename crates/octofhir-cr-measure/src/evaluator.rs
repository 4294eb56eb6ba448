//! Measure evaluation into population counts

use crate::constants::extensions;
use crate::error::MeasureError;
use crate::subject::{Subject, all_patient_ids};
use futures::future::join_all;
use indexmap::IndexMap;
use octofhir_cr_eval::{
    BundleContentProvider, CompiledLibrary, ContentProvider, EvaluationContext, ExpressionOutcome,
    LibraryCache, LibraryEvaluator, ParameterSet, RetrievalComposer, RetrievalOptions,
    StoreContentProvider, resolve_request_date,
};
use octofhir_cr_model::fhir::{
    Endpoint, Extension, Measure, MeasureGroupPopulation, MeasureReport, MeasureReportGroup,
    MeasureReportPopulation, Period, PopulationKind, Quantity, Reference,
};
use octofhir_cr_model::{
    LibraryIdentifier, ResourceStore, SearchParams, StoreError, Value, select_from_list,
    split_canonical,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::sync::Arc;

/// Kind of report to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    /// One subject
    Subject,
    /// Population counts with the member subjects of each population
    SubjectList,
    /// Population counts only
    Population,
}

impl ReportType {
    /// `MeasureReport.type` code
    pub fn report_code(self) -> &'static str {
        match self {
            Self::Subject => "individual",
            Self::SubjectList => "subject-list",
            Self::Population => "summary",
        }
    }
}

impl FromStr for ReportType {
    type Err = MeasureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subject" | "individual" | "patient" => Ok(Self::Subject),
            "subject-list" | "patient-list" => Ok(Self::SubjectList),
            "population" | "summary" => Ok(Self::Population),
            other => Err(MeasureError::validation(format!(
                "Unsupported report type: {}",
                other
            ))),
        }
    }
}

/// Parameters of `$evaluate-measure`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MeasureRequest {
    /// `Measure/<id>`, a bare id, or a canonical `url|version`
    pub measure: String,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub report_type: Option<String>,
    pub subject: Option<String>,
    pub last_received_on: Option<String>,
    pub product_line: Option<String>,
    /// Resource or bundle consulted after the primary data source
    pub additional_data: Option<JsonValue>,
    pub terminology_endpoint: Option<Endpoint>,
    pub data_endpoint: Option<Endpoint>,
}

impl MeasureRequest {
    pub fn new(measure: impl Into<String>) -> Self {
        Self {
            measure: measure.into(),
            ..Self::default()
        }
    }

    pub fn with_period(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.period_start = Some(start.into());
        self.period_end = Some(end.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_report_type(mut self, report_type: impl Into<String>) -> Self {
        self.report_type = Some(report_type.into());
        self
    }

    /// Report type requested, defaulting on whether a subject is given
    pub fn resolved_report_type(&self) -> Result<ReportType, MeasureError> {
        match self.report_type.as_deref() {
            Some(report_type) => report_type.parse(),
            None if self.subject.is_some() => Ok(ReportType::Subject),
            None => Ok(ReportType::Population),
        }
    }
}

/// Evaluates measures against the store and the request's data sources
#[derive(Clone)]
pub struct MeasureEvaluator {
    store: Arc<dyn ResourceStore>,
    cache: Arc<LibraryCache>,
    debug: bool,
}

impl MeasureEvaluator {
    pub fn new(store: Arc<dyn ResourceStore>, cache: Arc<LibraryCache>) -> Self {
        Self {
            store,
            cache,
            debug: false,
        }
    }

    /// Log every criteria outcome at debug level
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    /// Resolve a measure by id, `Measure/<id>` or canonical `url|version`
    pub async fn resolve_measure(&self, reference: &str) -> Result<Measure, MeasureError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(MeasureError::validation("A measure reference is required"));
        }

        let json = if reference.contains("://") {
            let (url, version) = split_canonical(reference);
            let candidates = self
                .store
                .search("Measure", &SearchParams::by_url(url, None))
                .await?;
            let found = match version {
                Some(version) => candidates.iter().find(|m| version_of(m) == Some(version)),
                None => select_from_list(&candidates, None, version_of),
            };
            found
                .cloned()
                .ok_or_else(|| MeasureError::NotFound(reference.to_string()))?
        } else {
            let id = reference.strip_prefix("Measure/").unwrap_or(reference);
            match self.store.read("Measure", id).await {
                Ok(json) => json,
                Err(StoreError::NotFound { .. }) => {
                    return Err(MeasureError::NotFound(format!("Measure/{}", id)));
                }
                Err(e) => return Err(e.into()),
            }
        };

        serde_json::from_value(json).map_err(|e| MeasureError::InvalidResource {
            reference: reference.to_string(),
            message: e.to_string(),
        })
    }

    /// Resolve the measure named by the request and evaluate it
    pub async fn evaluate_measure(
        &self,
        request: &MeasureRequest,
    ) -> Result<MeasureReport, MeasureError> {
        let measure = self.resolve_measure(&request.measure).await?;
        self.evaluate(&measure, request).await
    }

    /// Evaluate an already resolved measure
    pub async fn evaluate(
        &self,
        measure: &Measure,
        request: &MeasureRequest,
    ) -> Result<MeasureReport, MeasureError> {
        let report_type = request.resolved_report_type()?;
        let subject = request.subject.as_deref().map(Subject::parse).transpose()?;
        if report_type == ReportType::Subject && !matches!(subject, Some(Subject::Patient(_))) {
            return Err(MeasureError::validation(
                "An individual report requires a Patient subject",
            ));
        }

        let parameters = ParameterSet::new()
            .with_period(request.period_start.as_deref(), request.period_end.as_deref())?
            .with_product_line(request.product_line.as_deref());
        let period = report_period(request)?;

        let evaluator = self.library_evaluator(request)?;
        let identifier = self.library_identifier(measure).await?;
        let library = evaluator.resolve(&identifier).await?;

        let subjects = match &subject {
            Some(subject) => subject.patient_ids(self.store.as_ref()).await?,
            None => all_patient_ids(self.store.as_ref()).await?,
        };
        let criteria = criteria_names(measure);
        log::debug!(
            "evaluating {} with {} for {} subject(s)",
            measure.reference(),
            identifier,
            subjects.len()
        );

        let outcomes = join_all(subjects.iter().map(|id| {
            let evaluator = &evaluator;
            let library: &CompiledLibrary = &library;
            let criteria = criteria.as_slice();
            let parameters = &parameters;
            let context = EvaluationContext::patient(id.as_str());
            async move {
                evaluator
                    .evaluate_expressions(library, criteria, &context, parameters)
                    .await
            }
        }))
        .await;

        if self.debug {
            for (id, results) in subjects.iter().zip(&outcomes) {
                for (name, outcome) in results {
                    match outcome {
                        ExpressionOutcome::Value(value) => {
                            log::debug!("Patient/{} {} = {}", id, name, value)
                        }
                        ExpressionOutcome::Error(error) => {
                            log::debug!("Patient/{} {} failed: {}", id, name, error.report())
                        }
                    }
                }
            }
        }

        let mut report = MeasureReport::new(measure.canonical(), report_type.report_code(), period);
        report.date = Some(now());
        report.subject = subject.as_ref().map(|s| Reference::to(s.reference()));
        report.improvement_notation = measure.improvement_notation.clone();
        report.group = report_groups(measure, report_type, &subjects, &outcomes);

        if let Some(last_received_on) = &request.last_received_on {
            report.extension.push(Extension::date_time(
                extensions::LAST_RECEIVED_ON,
                last_received_on.as_str(),
            ));
        }
        if let Some(product_line) = &request.product_line {
            report
                .extension
                .push(Extension::string(extensions::PRODUCT_LINE, product_line.as_str()));
        }
        Ok(report)
    }

    /// Request-scoped evaluator; embedded libraries get a private cache
    fn library_evaluator(&self, request: &MeasureRequest) -> Result<LibraryEvaluator, MeasureError> {
        let options = RetrievalOptions {
            terminology_endpoint: request.terminology_endpoint.clone(),
            data_endpoint: request.data_endpoint.clone(),
            data: request.additional_data.clone(),
        };
        let providers = RetrievalComposer::new(Arc::clone(&self.store)).compose(&options)?;
        let stored: Arc<dyn ContentProvider> =
            Arc::new(StoreContentProvider::new(Arc::clone(&self.store)));

        let embedded = request
            .additional_data
            .as_ref()
            .map(BundleContentProvider::from_json)
            .filter(|provider| !provider.is_empty());
        Ok(match embedded {
            Some(embedded) => LibraryEvaluator::new(
                Arc::new(LibraryCache::new()),
                vec![Arc::new(embedded), stored],
                providers,
            ),
            None => LibraryEvaluator::new(Arc::clone(&self.cache), vec![stored], providers),
        })
    }

    /// Identifier of the measure's primary library.
    ///
    /// The canonical is looked up by url; when no stored library matches,
    /// the name is taken from the last url segment.
    async fn library_identifier(&self, measure: &Measure) -> Result<LibraryIdentifier, MeasureError> {
        let canonical = measure.library.first().ok_or_else(|| MeasureError::InvalidResource {
            reference: measure.reference(),
            message: "measure does not reference a library".to_string(),
        })?;
        let (url, version) = split_canonical(canonical);

        let candidates = self
            .store
            .search("Library", &SearchParams::by_url(url, None))
            .await?;
        let text = |library: &JsonValue, key: &str| -> Option<String> {
            library.get(key).and_then(JsonValue::as_str).map(str::to_string)
        };
        if let Some(library) = select_from_list(&candidates, version, version_of) {
            if let Some(name) = text(library, "name") {
                return Ok(LibraryIdentifier::new(name, text(library, "version")));
            }
        }

        let name = url.rsplit('/').next().unwrap_or(url);
        Ok(LibraryIdentifier::new(name, version))
    }
}

fn version_of(resource: &JsonValue) -> Option<&str> {
    resource.get("version").and_then(JsonValue::as_str)
}

fn criteria_name(population: &MeasureGroupPopulation) -> Option<&str> {
    population.criteria.as_ref()?.expression.as_deref()
}

/// Fold per-subject criteria outcomes into report groups.
///
/// Groups without any member across their populations are left out.
fn report_groups(
    measure: &Measure,
    report_type: ReportType,
    subjects: &[String],
    outcomes: &[IndexMap<String, ExpressionOutcome>],
) -> Vec<MeasureReportGroup> {
    let mut groups = Vec::new();
    for group in &measure.group {
        let mut populations = Vec::new();
        for population in &group.population {
            let (Some(kind), Some(name)) = (population.kind(), criteria_name(population)) else {
                continue;
            };
            if kind == PopulationKind::MeasureObservation {
                continue;
            }

            let mut entry = MeasureReportPopulation::new(kind, 0);
            for (id, results) in subjects.iter().zip(outcomes) {
                if is_member(results.get(name), name, id) {
                    entry.count += 1;
                    if report_type == ReportType::SubjectList {
                        entry
                            .subject_results
                            .push(Reference::to(format!("Patient/{}", id)));
                    }
                }
            }
            populations.push(entry);
        }

        let total: u32 = populations.iter().map(|p| p.count).sum();
        if total == 0 {
            log::debug!(
                "{} group {} has no members",
                measure.reference(),
                group.id.as_deref().unwrap_or("-")
            );
            continue;
        }

        let measure_score = match measure.scoring_code() {
            Some("proportion") => proportion_score(&populations),
            _ => None,
        };
        groups.push(MeasureReportGroup {
            id: group.id.clone(),
            population: populations,
            measure_score,
        });
    }
    groups
}

/// Distinct criteria expressions of every group, in declaration order
fn criteria_names(measure: &Measure) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for population in measure.group.iter().flat_map(|g| &g.population) {
        if let Some(name) = criteria_name(population) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

fn is_member(outcome: Option<&ExpressionOutcome>, name: &str, subject: &str) -> bool {
    match outcome {
        Some(ExpressionOutcome::Value(value)) => value.is_truthy(),
        Some(ExpressionOutcome::Error(error)) => {
            log::warn!(
                "Population criteria {} failed for Patient/{}: {}",
                name,
                subject,
                error.report()
            );
            false
        }
        None => false,
    }
}

/// `(numerator - numerator exclusion) / (denominator - exclusion - exception)`
fn proportion_score(populations: &[MeasureReportPopulation]) -> Option<Quantity> {
    let count = |kind: PopulationKind| -> f64 {
        populations
            .iter()
            .filter(|p| p.kind() == Some(kind))
            .map(|p| f64::from(p.count))
            .sum()
    };
    let denominator = count(PopulationKind::Denominator)
        - count(PopulationKind::DenominatorExclusion)
        - count(PopulationKind::DenominatorException);
    if denominator <= 0.0 {
        return None;
    }
    let numerator = count(PopulationKind::Numerator) - count(PopulationKind::NumeratorExclusion);
    Some(Quantity {
        value: numerator / denominator,
    })
}

fn report_period(request: &MeasureRequest) -> Result<Period, MeasureError> {
    let bound = |date: Option<&str>, start: bool| -> Result<Option<String>, MeasureError> {
        date.map(|d| resolve_request_date(d, start).map(|dt| Value::DateTime(dt).to_string()))
            .transpose()
            .map_err(MeasureError::from)
    };
    Ok(Period {
        start: bound(request.period_start.as_deref(), true)?,
        end: bound(request.period_end.as_deref(), false)?,
    })
}

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_cr_model::fhir::{CodeableConcept, Coding, Expression, MeasureGroup, systems};
    use rstest::rstest;

    fn population(kind: PopulationKind, count: u32) -> MeasureReportPopulation {
        MeasureReportPopulation::new(kind, count)
    }

    #[rstest]
    #[case("subject", ReportType::Subject)]
    #[case("individual", ReportType::Subject)]
    #[case("subject-list", ReportType::SubjectList)]
    #[case("population", ReportType::Population)]
    #[case("summary", ReportType::Population)]
    fn test_report_type_codes(#[case] input: &str, #[case] expected: ReportType) {
        assert_eq!(input.parse::<ReportType>().unwrap(), expected);
    }

    #[test]
    fn test_default_report_type_follows_subject() {
        let with_subject = MeasureRequest::new("m").with_subject("Patient/1");
        assert_eq!(with_subject.resolved_report_type().unwrap(), ReportType::Subject);
        assert_eq!(
            MeasureRequest::new("m").resolved_report_type().unwrap(),
            ReportType::Population
        );
        assert!(MeasureRequest::new("m").with_report_type("everyone").resolved_report_type().is_err());
    }

    #[test]
    fn test_proportion_score() {
        let score = proportion_score(&[
            population(PopulationKind::Denominator, 4),
            population(PopulationKind::DenominatorExclusion, 1),
            population(PopulationKind::DenominatorException, 1),
            population(PopulationKind::Numerator, 1),
        ]);
        assert_eq!(score, Some(Quantity { value: 0.5 }));

        let empty = proportion_score(&[
            population(PopulationKind::Denominator, 1),
            population(PopulationKind::DenominatorExclusion, 1),
        ]);
        assert_eq!(empty, None);
    }

    #[test]
    fn test_criteria_names_are_distinct() {
        let criteria = |kind: PopulationKind, name: &str| MeasureGroupPopulation {
            code: Some(CodeableConcept::from_coding(Coding::new(
                systems::MEASURE_POPULATION,
                kind.code(),
                None,
            ))),
            criteria: Some(Expression {
                language: Some("text/cql-identifier".to_string()),
                expression: Some(name.to_string()),
            }),
        };
        let measure = Measure {
            group: vec![
                MeasureGroup {
                    id: Some("a".to_string()),
                    population: vec![
                        criteria(PopulationKind::InitialPopulation, "Initial Population"),
                        criteria(PopulationKind::Numerator, "Numerator"),
                    ],
                },
                MeasureGroup {
                    id: Some("b".to_string()),
                    population: vec![criteria(PopulationKind::InitialPopulation, "Initial Population")],
                },
            ],
            ..Measure::default()
        };
        assert_eq!(criteria_names(&measure), vec!["Initial Population", "Numerator"]);
    }

    #[test]
    fn test_report_period_bounds() {
        let request = MeasureRequest::new("m").with_period("2019", "2019");
        let period = report_period(&request).unwrap();
        assert_eq!(period.start.as_deref(), Some("2019-01-01T00:00:00.000"));
        assert_eq!(period.end.as_deref(), Some("2019-12-31T23:59:59.999"));
    }
}
