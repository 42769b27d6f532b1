//! Static label configuration: class list, per-class thresholds and Platt
//! calibration parameters.
//!
//! Everything here is read once at startup. The three files are validated
//! against each other so that every per-class array is index-aligned with
//! the class list before the classifier ever sees it.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Deserialize;

use crate::classifier::Calibration;

pub const CLASSES_FILE: &str = "classes.txt";
pub const THRESHOLDS_FILE: &str = "thresholds.json";
pub const CALIBRATION_FILE: &str = "retune_config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Class list is empty")]
    EmptyClassList,
    #[error("{what} has {actual} entries but the class list has {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Threshold {index} is {value}, expected a value in [0, 1]")]
    ThresholdOutOfRange { index: usize, value: f64 },
    #[error("Calibration artifacts are missing class index {0}")]
    MissingArtifact(usize),
    #[error("Calibration parameters for class {0} are not finite")]
    NonFiniteCalibration(usize),
    #[error("Unknown calibration mode '{0}' (expected 'platt' or 'none')")]
    UnknownMode(String),
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Ordered emotion labels. The position of a label is its class index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassList(Vec<String>);

impl ClassList {
    pub fn new(labels: Vec<String>) -> Result<Self, ConfigError> {
        if labels.is_empty() {
            return Err(ConfigError::EmptyClassList);
        }
        let mut seen = std::collections::HashSet::new();
        for label in &labels {
            if !seen.insert(label.as_str()) {
                warn!("Duplicate class label '{}' in class list", label);
            }
        }
        Ok(Self(labels))
    }

    /// Parses a newline-delimited list. Lines are trimmed and blank lines skipped.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let labels = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        Self::new(labels)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::parse(&read_file(path)?)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

#[derive(Deserialize)]
struct ThresholdsFile {
    thresholds: Vec<f64>,
}

/// Per-class decision boundaries in `[0, 1]`, kept at double precision.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds(Vec<f64>);

impl Thresholds {
    pub fn new(values: Vec<f64>) -> Result<Self, ConfigError> {
        if let Some((index, &value)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0 || **v > 1.0)
        {
            return Err(ConfigError::ThresholdOutOfRange { index, value });
        }
        Ok(Self(values))
    }

    pub fn parse_json(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: ThresholdsFile = serde_json::from_str(text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(file.thresholds)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::parse_json(&read_file(path)?, path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn mean(&self) -> f64 {
        if self.0.is_empty() {
            return 0.0;
        }
        self.0.iter().sum::<f64>() / self.0.len() as f64
    }
}

#[derive(Deserialize)]
struct RetuneFile {
    calibration: CalibrationSection,
}

#[derive(Deserialize)]
struct CalibrationSection {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    artifacts: HashMap<String, PlattArtifact>,
}

#[derive(Deserialize)]
struct PlattArtifact {
    a: f32,
    b: f32,
}

/// Parses the `calibration` section of a retune config into fixed,
/// index-aligned parameter vectors for `num_classes` classes.
pub fn parse_calibration(text: &str, path: &Path, num_classes: usize) -> Result<Calibration, ConfigError> {
    let file: RetuneFile = serde_json::from_str(text).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let section = file.calibration;

    match section.mode.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("platt") => {}
        Some("none") | Some("identity") => return Ok(Calibration::Identity),
        Some(other) => return Err(ConfigError::UnknownMode(other.to_string())),
    }

    let mut scale = Vec::with_capacity(num_classes);
    let mut bias = Vec::with_capacity(num_classes);
    for index in 0..num_classes {
        let artifact = section
            .artifacts
            .get(&index.to_string())
            .ok_or(ConfigError::MissingArtifact(index))?;
        if !artifact.a.is_finite() || !artifact.b.is_finite() {
            return Err(ConfigError::NonFiniteCalibration(index));
        }
        scale.push(artifact.a);
        bias.push(artifact.b);
    }

    let extra = section
        .artifacts
        .keys()
        .filter(|key| key.parse::<usize>().map_or(true, |i| i >= num_classes))
        .count();
    if extra > 0 {
        warn!("Ignoring {} calibration artifact(s) with no matching class", extra);
    }

    Ok(Calibration::Platt { scale, bias })
}

pub fn load_calibration(path: &Path, num_classes: usize) -> Result<Calibration, ConfigError> {
    parse_calibration(&read_file(path)?, path, num_classes)
}

/// Locations of the three configuration files.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub classes: PathBuf,
    pub thresholds: PathBuf,
    pub calibration: PathBuf,
}

impl ConfigPaths {
    /// Uses the conventional file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            classes: dir.join(CLASSES_FILE),
            thresholds: dir.join(THRESHOLDS_FILE),
            calibration: dir.join(CALIBRATION_FILE),
        }
    }
}

/// Class list, thresholds and calibration, validated to share one length.
#[derive(Debug, Clone)]
pub struct LabelConfig {
    classes: ClassList,
    thresholds: Thresholds,
    calibration: Calibration,
}

impl LabelConfig {
    pub fn new(classes: ClassList, thresholds: Thresholds, calibration: Calibration) -> Result<Self, ConfigError> {
        let expected = classes.len();
        if thresholds.len() != expected {
            return Err(ConfigError::LengthMismatch {
                what: "Thresholds",
                expected,
                actual: thresholds.len(),
            });
        }
        if let Some(actual) = calibration.num_classes() {
            if actual != expected {
                return Err(ConfigError::LengthMismatch {
                    what: "Calibration",
                    expected,
                    actual,
                });
            }
        }
        Ok(Self {
            classes,
            thresholds,
            calibration,
        })
    }

    pub fn load(paths: &ConfigPaths) -> Result<Self, ConfigError> {
        info!("Loading class list from {:?}", paths.classes);
        let classes = ClassList::load(&paths.classes)?;
        info!("Loading thresholds from {:?}", paths.thresholds);
        let thresholds = Thresholds::load(&paths.thresholds)?;
        info!("Loading calibration from {:?}", paths.calibration);
        let calibration = load_calibration(&paths.calibration, classes.len())?;

        let config = Self::new(classes, thresholds, calibration)?;
        info!(
            "Label configuration ready: {} classes, calibration '{}', mean threshold {:.3}",
            config.num_classes(),
            config.calibration.mode_name(),
            config.thresholds.mean()
        );
        Ok(config)
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn classes(&self) -> &ClassList {
        &self.classes
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn nowhere() -> &'static Path {
        Path::new("test.json")
    }

    #[test]
    fn test_class_list_skips_blank_lines() {
        let classes = ClassList::parse("joy\n\n  anger \n\t\nfear\n").unwrap();
        assert_eq!(classes.as_slice(), &["joy", "anger", "fear"]);
        assert_eq!(classes.get(1), Some("anger"));
        assert_eq!(classes.get(3), None);
    }

    #[test]
    fn test_empty_class_list_is_rejected() {
        assert!(matches!(ClassList::parse("\n \n"), Err(ConfigError::EmptyClassList)));
    }

    #[test]
    fn test_duplicate_labels_are_kept() {
        let classes = ClassList::parse("joy\njoy\n").unwrap();
        assert_eq!(classes.len(), 2);
    }

    #[test]
    fn test_thresholds_parse_and_mean() {
        let thresholds = Thresholds::parse_json(r#"{"thresholds": [0.2, 0.4], "f1": 0.5}"#, nowhere()).unwrap();
        assert_eq!(thresholds.as_slice(), &[0.2, 0.4]);
        assert!((thresholds.mean() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_out_of_range() {
        let err = Thresholds::parse_json(r#"{"thresholds": [0.2, 1.5]}"#, nowhere()).unwrap_err();
        assert!(matches!(err, ConfigError::ThresholdOutOfRange { index: 1, .. }));
    }

    #[test]
    fn test_missing_thresholds_field() {
        let err = Thresholds::parse_json(r#"{"values": [0.2]}"#, nowhere()).unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
    }

    #[test]
    fn test_calibration_artifacts_become_arrays() {
        let json = r#"{"calibration": {"artifacts": {
            "1": {"a": 2.0, "b": -0.5},
            "0": {"a": 1.0, "b": 0.25},
            "7": {"a": 9.0, "b": 9.0}
        }}}"#;
        let cal = parse_calibration(json, nowhere(), 2).unwrap();
        assert_eq!(
            cal,
            Calibration::Platt {
                scale: vec![1.0, 2.0],
                bias: vec![0.25, -0.5]
            }
        );
    }

    #[test]
    fn test_calibration_missing_index() {
        let json = r#"{"calibration": {"artifacts": {"0": {"a": 1.0, "b": 0.0}}}}"#;
        let err = parse_calibration(json, nowhere(), 2).unwrap_err();
        assert!(matches!(err, ConfigError::MissingArtifact(1)));
    }

    #[test]
    fn test_calibration_mode_none() {
        let json = r#"{"calibration": {"mode": "none"}}"#;
        assert_eq!(parse_calibration(json, nowhere(), 3).unwrap(), Calibration::Identity);

        let json = r#"{"calibration": {"mode": "isotonic"}}"#;
        assert!(matches!(
            parse_calibration(json, nowhere(), 3),
            Err(ConfigError::UnknownMode(_))
        ));
    }

    #[test]
    fn test_label_config_length_mismatch() {
        let classes = ClassList::parse("joy\nfear\n").unwrap();
        let thresholds = Thresholds::new(vec![0.5]).unwrap();
        let err = LabelConfig::new(classes, thresholds, Calibration::Identity).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::LengthMismatch {
                what: "Thresholds",
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CLASSES_FILE), "joy\nsadness\n").unwrap();
        fs::write(dir.path().join(THRESHOLDS_FILE), r#"{"thresholds": [0.5, 0.3]}"#).unwrap();
        fs::write(
            dir.path().join(CALIBRATION_FILE),
            r#"{"calibration": {"artifacts": {"0": {"a": 1.0, "b": 0.0}, "1": {"a": 0.8, "b": 0.1}}}}"#,
        )
        .unwrap();

        let config = LabelConfig::load(&ConfigPaths::in_dir(dir.path())).unwrap();
        assert_eq!(config.num_classes(), 2);
        assert_eq!(config.calibration().mode_name(), "platt");
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = LabelConfig::load(&ConfigPaths::in_dir(dir.path())).unwrap_err();
        match err {
            ConfigError::Io { path, .. } => assert!(path.ends_with(CLASSES_FILE)),
            other => panic!("unexpected error: {other}"),
        }
    }
}
