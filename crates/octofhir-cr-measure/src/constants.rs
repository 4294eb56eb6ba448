//! Fixed profile, extension and code URIs used in measure and care-gaps output

use octofhir_cr_model::fhir::Meta;

/// Profiles stamped on care-gaps documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    MeasureReport,
    Bundle,
    Composition,
    DetectedIssue,
}

impl Profile {
    pub fn url(self) -> &'static str {
        match self {
            Self::MeasureReport => {
                "http://hl7.org/fhir/us/davinci-deqm/StructureDefinition/indv-measurereport-deqm"
            }
            Self::Bundle => "http://hl7.org/fhir/us/davinci-deqm/StructureDefinition/gaps-bundle-deqm",
            Self::Composition => {
                "http://hl7.org/fhir/us/davinci-deqm/StructureDefinition/gaps-composition-deqm"
            }
            Self::DetectedIssue => {
                "http://hl7.org/fhir/us/davinci-deqm/StructureDefinition/gaps-detectedissue-deqm"
            }
        }
    }

    pub fn meta(self) -> Meta {
        Meta::with_profile(self.url())
    }
}

/// Extension URLs
pub mod extensions {
    pub const GAP_STATUS: &str =
        "http://hl7.org/fhir/us/davinci-deqm/StructureDefinition/extension-gapStatus";
    pub const PRODUCT_LINE: &str =
        "http://hl7.org/fhir/us/cqframework/cqfmeasures/StructureDefinition/cqfm-productLine";
    pub const LAST_RECEIVED_ON: &str =
        "http://hl7.org/fhir/us/davinci-deqm/StructureDefinition/extension-lastReceivedOn";
}

/// Codes and code systems of care-gaps documents
pub mod codes {
    pub const GAP_STATUS_SYSTEM: &str = "http://hl7.org/fhir/us/davinci-deqm/CodeSystem/gaps-status";
    /// LOINC "Gaps in care report"
    pub const GAPS_IN_CARE_REPORT: &str = "96315-7";
    /// v3 ActCode "Care Gaps"
    pub const CARE_GAP: &str = "CAREGAP";
}
