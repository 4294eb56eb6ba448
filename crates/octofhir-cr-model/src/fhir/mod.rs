//! FHIR resources and constants used by the clinical reasoning pipeline

pub mod constants;
pub mod datatypes;
pub mod resources;

pub use constants::*;
pub use datatypes::*;
pub use resources::*;
