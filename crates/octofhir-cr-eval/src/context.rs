//! Evaluation context and parameter resolution

use crate::error::EvaluateError;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use octofhir_cr_model::{Interval, Value, parse_date_time};

/// Name of the measurement period parameter
pub const MEASUREMENT_PERIOD: &str = "Measurement Period";

/// Name of the product line parameter
pub const PRODUCT_LINE: &str = "Product Line";

/// Context an evaluation runs in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationContext {
    /// Context type, e.g. `Patient` or `Unfiltered`
    pub context_type: String,
    /// Subject id for subject contexts
    pub context_id: Option<String>,
}

impl EvaluationContext {
    pub fn patient(id: impl Into<String>) -> Self {
        Self {
            context_type: "Patient".to_string(),
            context_id: Some(id.into()),
        }
    }

    pub fn unfiltered() -> Self {
        Self {
            context_type: "Unfiltered".to_string(),
            context_id: None,
        }
    }

    /// Context from an optional subject reference (`Patient/123` or `123`)
    pub fn for_subject(subject: Option<&str>) -> Self {
        match subject {
            Some(subject) => {
                let (context_type, id) = subject.split_once('/').unwrap_or(("Patient", subject));
                Self {
                    context_type: context_type.to_string(),
                    context_id: Some(id.to_string()),
                }
            }
            None => Self::unfiltered(),
        }
    }

    /// A subject context must carry a subject id
    pub fn validate(&self) -> Result<(), EvaluateError> {
        let needs_subject = self.context_type == "Patient";
        match &self.context_id {
            Some(id) if id.trim().is_empty() => Err(EvaluateError::validation(format!(
                "{} context requires a non-empty subject id",
                self.context_type
            ))),
            None if needs_subject => Err(EvaluateError::validation(format!(
                "{} context requires a subject",
                self.context_type
            ))),
            _ => Ok(()),
        }
    }
}

/// Parameter values for one evaluation.
///
/// Precedence, lowest first: caller named parameters, the measurement period,
/// the product line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    values: IndexMap<String, Value>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from caller supplied named parameters
    pub fn from_named(named: IndexMap<String, Value>) -> Self {
        Self { values: named }
    }

    /// Set the measurement period from period strings. Both bounds are
    /// required for the period to be set.
    pub fn with_period(
        mut self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Self, EvaluateError> {
        if let (Some(start), Some(end)) = (start, end) {
            let period = measurement_period(start, end)?;
            self.values
                .insert(MEASUREMENT_PERIOD.to_string(), Value::Interval(period));
        }
        Ok(self)
    }

    pub fn with_product_line(mut self, product_line: Option<&str>) -> Self {
        if let Some(product_line) = product_line {
            self.values
                .insert(PRODUCT_LINE.to_string(), Value::string(product_line));
        }
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }
}

/// Closed measurement period interval from request strings
pub fn measurement_period(start: &str, end: &str) -> Result<Interval, EvaluateError> {
    let low = resolve_request_date(start, true)?;
    let high = resolve_request_date(end, false)?;
    if low > high {
        return Err(EvaluateError::validation(format!(
            "Invalid interval - the ending boundary: {} must be greater than or equal to the starting boundary: {}",
            end, start
        )));
    }
    Ok(Interval::closed(Value::DateTime(low), Value::DateTime(high)))
}

/// Resolve a request date string to a point in time.
///
/// Accepts `YYYY`, `YYYY-MM`, `YYYY-MM-DD` and full date-times. Partial dates
/// resolve to their earliest instant when `start` is set and to their last
/// millisecond otherwise.
pub fn resolve_request_date(date: &str, start: bool) -> Result<NaiveDateTime, EvaluateError> {
    let date = date.trim();
    let invalid = || EvaluateError::validation(format!("Invalid date: {}", date));
    let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).ok_or_else(invalid)?;

    let parts: Vec<&str> = date.split('-').collect();
    let is_digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());

    match parts.as_slice() {
        [year] if is_digits(*year, 4) => {
            let year: i32 = year.parse().map_err(|_| invalid())?;
            let day = if start {
                NaiveDate::from_ymd_opt(year, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(year, 12, 31)
            }
            .ok_or_else(invalid)?;
            Ok(day.and_time(if start { NaiveTime::MIN } else { end_of_day }))
        }
        [year, month] if is_digits(*year, 4) && is_digits(*month, 2) => {
            let year: i32 = year.parse().map_err(|_| invalid())?;
            let month: u32 = month.parse().map_err(|_| invalid())?;
            let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
            if start {
                return Ok(first.and_time(NaiveTime::MIN));
            }
            let next_month = if month == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(year, month + 1, 1)
            }
            .ok_or_else(invalid)?;
            let last = next_month - Duration::days(1);
            Ok(last.and_time(end_of_day))
        }
        [_, _, day] if day.len() == 2 => {
            let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| invalid())?;
            Ok(day.and_time(if start { NaiveTime::MIN } else { end_of_day }))
        }
        _ => parse_date_time(date).ok_or_else(invalid),
    }
}
