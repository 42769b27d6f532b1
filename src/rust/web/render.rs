//! HTML rendering for the single-page front end.
//!
//! Everything here is derived display logic: it never calls the classifier,
//! it only lays out a [`Prediction`] (or the reason there isn't one). The
//! markup itself lives in `templates/page.html`.

use std::cmp::Ordering;

use minijinja::Environment;
use serde::Serialize;

use super::input::InputWarning;
use crate::classifier::{ClassifierInfo, LabelScore, Prediction};

pub const MIN_TOP_K: usize = 1;
pub const MAX_TOP_K: usize = 10;

/// Confidence band of a reported emotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    pub fn of(probability: f32) -> Self {
        if probability >= 0.7 {
            Self::High
        } else if probability >= 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            Self::High => "high-confidence",
            Self::Medium => "medium-confidence",
            Self::Low => "low-confidence",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::High => "#2ecc71",
            Self::Medium => "#f39c12",
            Self::Low => "#e74c3c",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "High confidence",
            Self::Medium => "Medium confidence",
            Self::Low => "Low confidence",
        }
    }
}

/// What happened to the last submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing submitted yet
    Idle,
    Warning(InputWarning),
    Failure(String),
    Success(Prediction),
}

/// Everything needed to draw the page.
#[derive(Debug)]
pub struct PageView<'a> {
    pub info: &'a ClassifierInfo,
    pub text: &'a str,
    pub top_k: usize,
    pub show_all: bool,
    pub outcome: Outcome,
}

const PAGE_TEMPLATE: &str = "page.html";

/// Builds the template environment. The `.html` name turns on HTML auto-escaping.
pub fn environment() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template(PAGE_TEMPLATE, include_str!("templates/page.html"))?;
    Ok(env)
}

/// Selected emotions ordered for display, most probable first.
pub fn by_probability(selected: &[LabelScore]) -> Vec<&LabelScore> {
    let mut sorted: Vec<&LabelScore> = selected.iter().collect();
    sorted.sort_by(|a, b| b.probability.partial_cmp(&a.probability).unwrap_or(Ordering::Equal));
    sorted
}

#[derive(Serialize)]
struct ModelContext<'a> {
    calibration: &'a str,
    num_classes: usize,
    mean_threshold: String,
    class_labels: &'a [String],
}

#[derive(Serialize)]
struct CardContext<'a> {
    label: &'a str,
    probability: String,
    css_class: &'static str,
    color: &'static str,
    tier: &'static str,
    width: String,
}

#[derive(Serialize)]
struct RowContext<'a> {
    passed: bool,
    label: &'a str,
    probability: String,
    threshold: String,
}

#[derive(Serialize)]
struct PageContext<'a> {
    model: ModelContext<'a>,
    text: &'a str,
    char_count: usize,
    top_k: usize,
    min_top_k: usize,
    max_top_k: usize,
    show_all: bool,
    warning: Option<&'static str>,
    failure: Option<&'a str>,
    cards: Option<Vec<CardContext<'a>>>,
    rows: Option<Vec<RowContext<'a>>>,
}

fn cards(prediction: &Prediction) -> Vec<CardContext<'_>> {
    by_probability(&prediction.selected)
        .into_iter()
        .map(|score| {
            let tier = ConfidenceTier::of(score.probability);
            CardContext {
                label: &score.label,
                probability: format!("{:.3}", score.probability),
                css_class: tier.css_class(),
                color: tier.color(),
                tier: tier.label(),
                width: format!("{:.1}", score.probability * 100.0),
            }
        })
        .collect()
}

fn rows<'a>(info: &'a ClassifierInfo, prediction: &Prediction) -> Vec<RowContext<'a>> {
    prediction
        .probabilities
        .iter()
        .enumerate()
        .map(|(i, &probability)| {
            let threshold = info.thresholds.get(i).copied().unwrap_or(f64::NAN);
            RowContext {
                passed: f64::from(probability) >= threshold,
                label: info.class_labels.get(i).map(String::as_str).unwrap_or("?"),
                probability: format!("{:.3}", probability),
                threshold: format!("{:.3}", threshold),
            }
        })
        .collect()
}

/// Renders the whole page for `view`.
pub fn page(env: &Environment<'_>, view: &PageView<'_>) -> Result<String, minijinja::Error> {
    let (warning, failure, cards, rows) = match &view.outcome {
        Outcome::Idle => (None, None, None, None),
        Outcome::Warning(warning) => (Some(warning.message()), None, None, None),
        Outcome::Failure(message) => (None, Some(message.as_str()), None, None),
        Outcome::Success(prediction) => (
            None,
            None,
            Some(cards(prediction)),
            view.show_all.then(|| rows(view.info, prediction)),
        ),
    };

    let context = PageContext {
        model: ModelContext {
            calibration: &view.info.calibration,
            num_classes: view.info.num_classes,
            mean_threshold: format!("{:.3}", view.info.mean_threshold),
            class_labels: &view.info.class_labels,
        },
        text: view.text,
        char_count: view.text.chars().count(),
        top_k: view.top_k,
        min_top_k: MIN_TOP_K,
        max_top_k: MAX_TOP_K,
        show_all: view.show_all,
        warning,
        failure,
        cards,
        rows,
    };
    env.get_template(PAGE_TEMPLATE)?.render(&context)
}
