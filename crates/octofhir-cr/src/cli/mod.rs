//! Command-line interface for the clinical reasoning operations

#[cfg(feature = "cli")]
pub mod care_gaps;
#[cfg(feature = "cli")]
pub mod evaluate;
#[cfg(feature = "cli")]
pub mod measure;
#[cfg(feature = "cli")]
pub mod output;
#[cfg(feature = "cli")]
pub mod session;
