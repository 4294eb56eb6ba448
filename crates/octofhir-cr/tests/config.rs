use octofhir_cr::{CrConfig, CrError};
use pretty_assertions::assert_eq;
use std::io::Write;

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"measure_report": {{"reporter": "Organization/acme"}}, "cache": {{"enabled": false}}}}"#
    )
    .unwrap();

    let config = CrConfig::from_file(file.path()).unwrap();
    assert_eq!(
        config.measure_report.reporter.as_deref(),
        Some("Organization/acme")
    );
    assert!(!config.cache.enabled);
    assert!(!config.evaluation.debug);
}

#[test]
fn test_overrides_replace_file_values() {
    let config = CrConfig::from_json(r#"{"measure_report": {"reporter": "Organization/file"}}"#)
        .unwrap()
        .with_overrides(Some("Organization/env".to_string()), Some("true".to_string()))
        .unwrap();
    assert_eq!(
        config.measure_report.reporter.as_deref(),
        Some("Organization/env")
    );
    assert!(config.evaluation.debug);
}

#[test]
fn test_blank_reporter_override_is_ignored() {
    let config = CrConfig::from_json(r#"{"measure_report": {"reporter": "Organization/file"}}"#)
        .unwrap()
        .with_overrides(Some("  ".to_string()), None)
        .unwrap();
    assert_eq!(
        config.measure_report.reporter.as_deref(),
        Some("Organization/file")
    );
}

#[test]
fn test_missing_and_invalid_files() {
    let dir = tempfile::tempdir().unwrap();
    let missing = CrConfig::from_file(&dir.path().join("absent.json"));
    assert!(matches!(missing, Err(CrError::Configuration(_))));

    let invalid = CrConfig::from_json("{not json");
    assert!(matches!(invalid, Err(CrError::Configuration(_))));
}
