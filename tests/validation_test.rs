use std::fs;
use std::path::Path;

use moodlens::{decide, Calibration, Classifier, ClassifierError, ConfigError, ConfigPaths, LabelConfig};
use tempfile::TempDir;

const CLASSES: &str = "admiration\namusement\nanger\nsadness\n";
const THRESHOLDS: &str = r#"{"thresholds": [0.45, 0.3, 0.5, 0.25]}"#;
const RETUNE: &str = r#"{
    "calibration": {
        "mode": "platt",
        "artifacts": {
            "0": {"a": 1.2, "b": -0.3},
            "1": {"a": 0.9, "b": 0.1},
            "2": {"a": 1.0, "b": 0.0},
            "3": {"a": 1.5, "b": -1.0}
        }
    },
    "scut": {"strategy": "per-class"}
}"#;

fn write_config(dir: &Path, classes: &str, thresholds: &str, retune: &str) -> ConfigPaths {
    fs::write(dir.join("classes.txt"), classes).unwrap();
    fs::write(dir.join("thresholds.json"), thresholds).unwrap();
    fs::write(dir.join("retune_config.json"), retune).unwrap();
    ConfigPaths::in_dir(dir)
}

#[test]
fn test_load_complete_config() -> Result<(), ConfigError> {
    let dir = TempDir::new().unwrap();
    let config = LabelConfig::load(&write_config(dir.path(), CLASSES, THRESHOLDS, RETUNE))?;

    assert_eq!(config.num_classes(), 4);
    assert_eq!(config.classes().get(3), Some("sadness"));
    assert_eq!(config.thresholds().as_slice(), &[0.45, 0.3, 0.5, 0.25]);
    assert!((config.thresholds().mean() - 0.375).abs() < 1e-6);
    match config.calibration() {
        Calibration::Platt { scale, bias } => {
            assert_eq!(scale, &vec![1.2, 0.9, 1.0, 1.5]);
            assert_eq!(bias, &vec![-0.3, 0.1, 0.0, -1.0]);
        }
        other => panic!("expected Platt calibration, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_loaded_config_drives_decisions() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new().unwrap();
    let config = LabelConfig::load(&write_config(dir.path(), CLASSES, THRESHOLDS, RETUNE))?;

    // sigmoid(1.0 * 2.0 + 0.0) = 0.881 for anger, everything else far below
    let prediction = decide(&[-4.0, -4.0, 2.0, -4.0], &config, 3)?;
    assert!(!prediction.fallback);
    assert_eq!(prediction.selected.len(), 1);
    assert_eq!(prediction.selected[0].label, "anger");
    assert!((prediction.selected[0].probability - 0.8808).abs() < 1e-3);
    assert_eq!(prediction.probabilities.len(), 4);
    Ok(())
}

#[test]
fn test_missing_file_reports_path() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("classes.txt"), CLASSES).unwrap();

    let err = LabelConfig::load(&ConfigPaths::in_dir(dir.path())).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("thresholds.json"));
}

#[test]
fn test_threshold_count_must_match_classes() {
    let dir = TempDir::new().unwrap();
    let paths = write_config(dir.path(), CLASSES, r#"{"thresholds": [0.5, 0.5, 0.5]}"#, RETUNE);

    let err = LabelConfig::load(&paths).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::LengthMismatch { expected: 4, actual: 3, .. }
    ));
}

#[test]
fn test_threshold_out_of_range() {
    let dir = TempDir::new().unwrap();
    let paths = write_config(dir.path(), CLASSES, r#"{"thresholds": [0.5, 1.5, 0.5, 0.5]}"#, RETUNE);

    let err = LabelConfig::load(&paths).unwrap_err();
    assert!(matches!(err, ConfigError::ThresholdOutOfRange { index: 1, .. }));
}

#[test]
fn test_missing_calibration_artifact() {
    let dir = TempDir::new().unwrap();
    let retune = r#"{"calibration": {"artifacts": {"0": {"a": 1.0, "b": 0.0}, "1": {"a": 1.0, "b": 0.0}}}}"#;
    let paths = write_config(dir.path(), CLASSES, THRESHOLDS, retune);

    let err = LabelConfig::load(&paths).unwrap_err();
    assert!(matches!(err, ConfigError::MissingArtifact(2)));
}

#[test]
fn test_identity_mode_skips_artifacts() -> Result<(), ConfigError> {
    let dir = TempDir::new().unwrap();
    let paths = write_config(dir.path(), CLASSES, THRESHOLDS, r#"{"calibration": {"mode": "none"}}"#);

    let config = LabelConfig::load(&paths)?;
    assert_eq!(config.calibration(), &Calibration::Identity);
    Ok(())
}

#[test]
fn test_empty_class_list() {
    let dir = TempDir::new().unwrap();
    let paths = write_config(dir.path(), "\n  \n", r#"{"thresholds": []}"#, RETUNE);

    let err = LabelConfig::load(&paths).unwrap_err();
    assert!(matches!(err, ConfigError::EmptyClassList));
}

#[test]
fn test_malformed_json() {
    let dir = TempDir::new().unwrap();
    let paths = write_config(dir.path(), CLASSES, "{\"thresholds\": [0.5,", RETUNE);

    let err = LabelConfig::load(&paths).unwrap_err();
    assert!(matches!(err, ConfigError::Json { .. }));
}

#[test]
fn test_builder_surfaces_config_errors() {
    let dir = TempDir::new().unwrap();
    let paths = write_config(dir.path(), CLASSES, r#"{"thresholds": [0.5]}"#, RETUNE);

    let result = Classifier::builder().with_config_paths(&paths);
    assert!(matches!(result, Err(ClassifierError::ConfigError(_))));
}

#[test]
fn test_builder_rejects_missing_model_files() {
    let dir = TempDir::new().unwrap();
    let paths = write_config(dir.path(), CLASSES, THRESHOLDS, RETUNE);

    let result = Classifier::builder()
        .with_config_paths(&paths)
        .and_then(|builder| builder.with_model_dir(dir.path()));
    match result {
        Err(ClassifierError::BuildError(msg)) => assert!(msg.contains("Model file not found")),
        other => panic!("expected a build error, got {:?}", other.map(|_| ())),
    }
}
