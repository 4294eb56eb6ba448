//! Clinical reasoning data model
//!
//! This crate provides:
//! - Runtime values produced by logic evaluation
//! - Versioned logic identifiers and version selection
//! - The FHIR resources the evaluation pipeline reads and produces
//! - The resource store seam and an in-memory store
//! - Data source and terminology provider traits

pub mod fhir;
pub mod identifier;
pub mod provider;
pub mod store;
pub mod value;

pub use identifier::*;
pub use provider::*;
pub use store::*;
pub use value::*;
