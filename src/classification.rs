//! Decides whether a frame shows a normal print or an error.
//!
//! The reserved "printing" label is the only label that never raises an
//! alert. Both the error count and the alert subset come from here.

use crate::detection::{Detection, DetectionSet};

/// Label the model emits while a print is progressing normally.
pub const NORMAL_LABEL: &str = "imprimiendo";

/// Outcome of classifying one frame's detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationResult {
    pub total_count: usize,
    pub error_count: usize,
    pub is_alertable: bool,
}

/// True when `label` is the reserved normal-state label, ignoring case.
pub fn is_normal_label(label: &str) -> bool {
    label.to_lowercase() == NORMAL_LABEL
}

/// Count detections and decide whether the frame warrants an alert.
///
/// An empty set is never alertable.
pub fn classify(detections: &DetectionSet) -> ClassificationResult {
    let error_count = error_detections(detections).len();

    ClassificationResult {
        total_count: detections.len(),
        error_count,
        is_alertable: error_count > 0,
    }
}

/// Detections that describe an error, in their original order.
pub fn error_detections(detections: &DetectionSet) -> Vec<&Detection> {
    detections
        .iter()
        .filter(|detection| !is_normal_label(&detection.label))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;

    fn set(labels: &[&str]) -> DetectionSet {
        labels
            .iter()
            .map(|label| Detection {
                label: label.to_string(),
                confidence: 0.9,
                bounding_box: BoundingBox::from_corners([0.0, 0.0, 10.0, 10.0]),
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn normal_label_in_any_case_is_not_alertable() {
        let result = classify(&set(&["imprimiendo", "Imprimiendo", "IMPRIMIENDO"]));
        assert_eq!(result.total_count, 3);
        assert_eq!(result.error_count, 0);
        assert!(!result.is_alertable);
    }

    #[test]
    fn empty_set_is_not_alertable() {
        let result = classify(&DetectionSet::default());
        assert_eq!(
            result,
            ClassificationResult {
                total_count: 0,
                error_count: 0,
                is_alertable: false,
            }
        );
    }

    #[test]
    fn counts_every_non_normal_label() {
        let detections = set(&["spaghetti", "imprimiendo", "stringing", "spaghetti"]);
        let result = classify(&detections);
        assert_eq!(result.error_count, 3);
        assert!(result.is_alertable);

        let labels: Vec<_> = error_detections(&detections)
            .iter()
            .map(|d| d.label.as_str())
            .collect();
        assert_eq!(labels, ["spaghetti", "stringing", "spaghetti"]);
    }

    #[test]
    fn classification_is_repeatable() {
        let detections = set(&["IMPRIMIENDO", "warping"]);
        assert_eq!(classify(&detections), classify(&detections));
    }

    #[test]
    fn similar_labels_are_still_errors() {
        assert!(!is_normal_label("imprimiendo "));
        assert!(!is_normal_label("imprimiendo_lento"));
        assert!(is_normal_label("ImPrImIeNdO"));
    }
}
