//! Quality measure evaluation and care-gaps reporting
//!
//! This crate consumes the evaluation pipeline of `octofhir-cr-eval`:
//!
//! - **Measures**: resolve a measure and its logic, evaluate population
//!   criteria per subject, and fold the results into a `MeasureReport`
//! - **Gap status**: classify an individual report as an open or closed gap
//! - **Care gaps**: per-subject document bundles of detected issues and
//!   their measure reports
//!
//! # Example
//!
//! ```ignore
//! use octofhir_cr_measure::{MeasureEvaluator, MeasureRequest};
//!
//! let evaluator = MeasureEvaluator::new(store, cache);
//! let report = evaluator
//!     .evaluate_measure(&MeasureRequest::new("Measure/screening").with_subject("Patient/123"))
//!     .await?;
//! ```

pub mod care_gaps;
pub mod constants;
pub mod error;
pub mod evaluator;
pub mod gap_status;
pub mod subject;

pub use care_gaps::{CareGapsAggregator, CareGapsReport, CareGapsRequest};
pub use constants::Profile;
pub use error::{CareGapsError, MeasureError};
pub use evaluator::{MeasureEvaluator, MeasureRequest, ReportType};
pub use gap_status::{GapStatus, UnknownGapStatus, gap_status};
pub use subject::Subject;
