// src/severity.rs
//
// Overall severity classification from the mean detection confidence.
//
// Piecewise-linear mapping with breakpoints at 0.5 and 0.8. The branch
// formulas do not join continuously at the breakpoints; that seam is part of
// the scoring contract and must not be smoothed over.

use crate::types::SeverityLevel;

/// Classify the aggregate severity of one image's detections.
///
/// Empty input means no damage was observed and yields `(Minor, 0.0)`, which
/// is distinct from a detector reporting "no result" (that case never reaches
/// this function; the source-selection policy handles it).
pub fn classify_severity(confidences: &[f32]) -> (SeverityLevel, f32) {
    if confidences.is_empty() {
        return (SeverityLevel::Minor, 0.0);
    }

    let mean = confidences.iter().sum::<f32>() / confidences.len() as f32;

    let (level, score) = if mean > 0.8 {
        (SeverityLevel::Severe, 80.0 + (mean - 0.8) * 20.0)
    } else if mean > 0.5 {
        (SeverityLevel::Moderate, 50.0 + (mean - 0.5) * 60.0)
    } else {
        (SeverityLevel::Minor, mean * 50.0)
    };

    (level, score.min(100.0))
}

/// Human-readable summary for the review UI.
pub fn describe(level: SeverityLevel, has_damages: bool) -> String {
    if has_damages {
        format!("{} vehicle damage detected", level.display_name())
    } else {
        "No damages detected".to_string()
    }
}
