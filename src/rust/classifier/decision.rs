use std::cmp::Ordering;

use super::error::ClassifierError;
use super::{LabelScore, Prediction};
use crate::config::LabelConfig;

/// Turns raw logits into a [`Prediction`]: calibrate, sigmoid, compare each
/// class against its threshold, and fall back to the `top_k` most probable
/// classes when nothing passes.
///
/// # Errors
/// - `PredictionError` if the number of logits differs from the class count
/// - `PredictionError` if any logit is not finite
pub fn decide(logits: &[f32], config: &LabelConfig, top_k: usize) -> Result<Prediction, ClassifierError> {
    let num_classes = config.num_classes();
    if logits.len() != num_classes {
        return Err(ClassifierError::PredictionError(format!(
            "Model produced {} logits but {} classes are configured",
            logits.len(),
            num_classes
        )));
    }
    if let Some(index) = logits.iter().position(|z| !z.is_finite()) {
        return Err(ClassifierError::PredictionError(format!(
            "Model produced a non-finite logit for class {}",
            index
        )));
    }

    let probabilities = config.calibration().probabilities(logits);
    let (indices, fallback) = select(&probabilities, config.thresholds().as_slice(), top_k);

    let classes = config.classes();
    let selected = indices
        .into_iter()
        .filter_map(|i| {
            classes.get(i).map(|label| LabelScore {
                label: label.to_string(),
                probability: probabilities[i],
            })
        })
        .collect();

    Ok(Prediction {
        selected,
        probabilities,
        fallback,
    })
}

/// Indices of the selected classes and whether the top-K fallback produced them.
///
/// Threshold hits come back in class order. Fallback picks come back by
/// descending probability, ties by ascending index.
pub(crate) fn select(probabilities: &[f32], thresholds: &[f64], top_k: usize) -> (Vec<usize>, bool) {
    let picked: Vec<usize> = probabilities
        .iter()
        .zip(thresholds)
        .enumerate()
        .filter(|(_, (&p, &t))| f64::from(p) >= t)
        .map(|(i, _)| i)
        .collect();

    if !picked.is_empty() || top_k == 0 {
        return (picked, false);
    }

    let mut ranked: Vec<usize> = (0..probabilities.len()).collect();
    ranked.sort_by(|&a, &b| {
        probabilities[b]
            .partial_cmp(&probabilities[a])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    ranked.truncate(top_k);
    (ranked, true)
}
