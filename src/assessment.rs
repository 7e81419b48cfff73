// src/assessment.rs
//
// Combines the per-region cost model and the severity classifier into the
// full assessment for one image. Pure computation over immutable inputs; the
// persistence layer must treat the output as final and never re-derive it.

use crate::estimate::{estimate_cost, CostEstimate};
use crate::severity::classify_severity;
use crate::types::{DamageObservation, SeverityLevel};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateAssessment {
    pub total_cost: f32,
    pub mean_confidence: f32,
    pub severity_level: SeverityLevel,
    pub severity_score: f32,
}

#[derive(Debug, Clone)]
pub struct DamageAssessment {
    /// Same length and order as the input observations.
    pub costs: Vec<CostEstimate>,
    pub aggregate: AggregateAssessment,
}

/// Assess one image's worth of damage observations.
pub fn assess(observations: &[DamageObservation]) -> DamageAssessment {
    let costs: Vec<CostEstimate> = observations
        .iter()
        .map(|obs| estimate_cost(obs.damage_type, obs.confidence, obs.area_px))
        .collect();

    let total_cost = costs.iter().map(|c| c.total).sum();

    let confidences: Vec<f32> = observations.iter().map(|obs| obs.confidence).collect();
    let (severity_level, severity_score) = classify_severity(&confidences);

    let mean_confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32
    };

    DamageAssessment {
        costs,
        aggregate: AggregateAssessment {
            total_cost,
            mean_confidence,
            severity_level,
            severity_score,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, DamageType};

    fn obs(damage_type: DamageType, confidence: f32, area_px: f32) -> DamageObservation {
        DamageObservation {
            damage_type,
            confidence,
            area_px,
            bbox: BoundingBox {
                x: 0.0,
                y: 0.0,
                width: area_px.max(0.0).sqrt(),
                height: area_px.max(0.0).sqrt(),
            },
        }
    }

    #[test]
    fn test_empty_set_yields_canonical_empty_assessment() {
        let result = assess(&[]);
        assert!(result.costs.is_empty());
        assert_eq!(result.aggregate.total_cost, 0.0);
        assert_eq!(result.aggregate.mean_confidence, 0.0);
        assert_eq!(result.aggregate.severity_level, SeverityLevel::Minor);
        assert_eq!(result.aggregate.severity_score, 0.0);
    }

    #[test]
    fn test_cost_list_preserves_input_order_and_length() {
        let observations = vec![
            obs(DamageType::Missing, 1.0, 0.0),
            obs(DamageType::Scratch, 1.0, 0.0),
            obs(DamageType::Crack, 1.0, 0.0),
        ];
        let result = assess(&observations);

        assert_eq!(result.costs.len(), 3);
        // Emission order, not sorted by cost
        assert!(result.costs[0].total > result.costs[2].total);
        assert!(result.costs[2].total > result.costs[1].total);
    }

    #[test]
    fn test_total_cost_is_sum_of_region_totals() {
        let observations = vec![
            obs(DamageType::Dent, 0.9, 2000.0),
            obs(DamageType::Shatter, 0.85, 30000.0),
        ];
        let result = assess(&observations);

        let expected: f32 = result.costs.iter().map(|c| c.total).sum();
        assert!((result.aggregate.total_cost - expected).abs() < 0.01);
        assert!(result.aggregate.total_cost > 0.0);
    }

    #[test]
    fn test_aggregate_uses_mean_confidence() {
        let observations = vec![
            obs(DamageType::Dent, 0.9, 1000.0),
            obs(DamageType::Dent, 0.9, 1000.0),
        ];
        let result = assess(&observations);

        assert!((result.aggregate.mean_confidence - 0.9).abs() < 1e-5);
        assert_eq!(result.aggregate.severity_level, SeverityLevel::Severe);
    }
}
