//! Clinical reasoning operations for Rust
//!
//! This crate ties the evaluation pipeline together behind one service:
//! - `$evaluate`: evaluate every expression of a logic library
//! - `$evaluate-measure`: evaluate a quality measure into a `MeasureReport`
//! - `$care-gaps`: per-subject care-gap documents
//!
//! Operations are reachable directly or by name through
//! [`CrService::dispatch`].
//!
//! # Example
//!
//! ```ignore
//! use octofhir_cr::{CrConfig, CrService};
//!
//! let service = CrService::new(store, CrConfig::default());
//! let report = service
//!     .dispatch("$evaluate-measure", json!({"measure": "Measure/screening", "subject": "Patient/123"}))
//!     .await?;
//! ```

// Re-export the pipeline crates
pub use octofhir_cr_eval as eval;
pub use octofhir_cr_measure as measure;
pub use octofhir_cr_model as model;

pub mod config;
pub mod error;
pub mod service;

pub use config::CrConfig;
pub use error::CrError;
pub use service::{CrService, EvaluateRequest};

// CLI module (only available with cli feature)
#[cfg(feature = "cli")]
pub mod cli;
