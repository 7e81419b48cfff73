// src/pipeline.rs
//
// Detection-source selection: exactly one of two sources feeds an image's
// assessment, chosen by strict priority, never merged.
//
//   1. Primary (local model), used iff it yields at least one observation
//      at or above the confidence threshold.
//   2. Secondary (cloud), used iff it yields a non-empty damage list.
//   3. Otherwise the canonical empty outcome.
//
// Each source is invoked at most once per image; a source error counts as
// "no result" for that source and never escapes the pipeline.

use crate::claim_image::ClaimImage;
use crate::types::DamageObservation;
use anyhow::Result;
use tracing::{info, warn};

/// Which source produced an image's damage list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    LocalVisionCore,
    CloudNeuralEngine,
    FallbackEmpty,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::LocalVisionCore => "Local-Vision-Core",
            Engine::CloudNeuralEngine => "Cloud-Neural-Engine",
            Engine::FallbackEmpty => "Fallback-Empty",
        }
    }
}

/// A damage source the pipeline can query. Implemented by the local detector
/// and the cloud client; tests inject stubs.
#[allow(async_fn_in_trait)]
pub trait DamageSource {
    fn name(&self) -> &'static str;

    async fn detect(&mut self, image: &ClaimImage) -> Result<Vec<DamageObservation>>;
}

#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub observations: Vec<DamageObservation>,
    pub engine: Engine,
}

impl DetectionOutcome {
    fn empty() -> Self {
        Self {
            observations: Vec::new(),
            engine: Engine::FallbackEmpty,
        }
    }
}

/// Pick the damage source for one image.
pub async fn select_damage_source<P, S>(
    primary: &mut P,
    secondary: &mut S,
    image: &ClaimImage,
    confidence_threshold: f32,
) -> DetectionOutcome
where
    P: DamageSource,
    S: DamageSource,
{
    match primary.detect(image).await {
        Ok(observations)
            if observations
                .iter()
                .any(|obs| obs.confidence >= confidence_threshold) =>
        {
            info!(
                "{}: {} confident damage region(s) for {}",
                primary.name(),
                observations.len(),
                image.analysis_id
            );
            return DetectionOutcome {
                observations,
                engine: Engine::LocalVisionCore,
            };
        }
        Ok(observations) => {
            info!(
                "{}: no detections above {:.2} ({} low-confidence), falling back for {}",
                primary.name(),
                confidence_threshold,
                observations.len(),
                image.analysis_id
            );
        }
        Err(e) => {
            warn!(
                "{} failed for {}: {:#}; falling back",
                primary.name(),
                image.analysis_id,
                e
            );
        }
    }

    match secondary.detect(image).await {
        Ok(observations) if !observations.is_empty() => {
            info!(
                "{}: {} damage region(s) for {}",
                secondary.name(),
                observations.len(),
                image.analysis_id
            );
            DetectionOutcome {
                observations,
                engine: Engine::CloudNeuralEngine,
            }
        }
        Ok(_) => {
            info!(
                "{} returned no damages for {}; recording empty result",
                secondary.name(),
                image.analysis_id
            );
            DetectionOutcome::empty()
        }
        Err(e) => {
            warn!(
                "{} failed for {}: {:#}; recording empty result",
                secondary.name(),
                image.analysis_id,
                e
            );
            DetectionOutcome::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, DamageType};
    use anyhow::anyhow;

    fn test_image() -> ClaimImage {
        ClaimImage {
            analysis_id: "test-claim".to_string(),
            width: 4,
            height: 4,
            rgb: vec![0u8; 4 * 4 * 3],
            jpeg_bytes: Vec::new(),
        }
    }

    fn observation(confidence: f32) -> DamageObservation {
        DamageObservation {
            damage_type: DamageType::Dent,
            confidence,
            area_px: 400.0,
            bbox: BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 20.0,
                height: 20.0,
            },
        }
    }

    /// Stub source: `None` means the source errors, otherwise it returns the
    /// given observations. Counts invocations.
    struct StubSource {
        label: &'static str,
        result: Option<Vec<DamageObservation>>,
        calls: u32,
    }

    impl StubSource {
        fn returning(label: &'static str, observations: Vec<DamageObservation>) -> Self {
            Self {
                label,
                result: Some(observations),
                calls: 0,
            }
        }

        fn failing(label: &'static str) -> Self {
            Self {
                label,
                result: None,
                calls: 0,
            }
        }
    }

    impl DamageSource for StubSource {
        fn name(&self) -> &'static str {
            self.label
        }

        async fn detect(&mut self, _image: &ClaimImage) -> Result<Vec<DamageObservation>> {
            self.calls += 1;
            match &self.result {
                Some(obs) => Ok(obs.clone()),
                None => Err(anyhow!("detector offline")),
            }
        }
    }

    #[tokio::test]
    async fn test_confident_primary_is_used_and_secondary_never_invoked() {
        let mut primary = StubSource::returning("local", vec![observation(0.9), observation(0.3)]);
        let mut secondary = StubSource::returning("cloud", vec![observation(0.7)]);

        let outcome = select_damage_source(&mut primary, &mut secondary, &test_image(), 0.4).await;

        assert_eq!(outcome.engine, Engine::LocalVisionCore);
        assert_eq!(outcome.observations.len(), 2);
        assert_eq!(primary.calls, 1);
        assert_eq!(secondary.calls, 0);
    }

    #[tokio::test]
    async fn test_failing_primary_falls_back_to_secondary() {
        let mut primary = StubSource::failing("local");
        let mut secondary = StubSource::returning("cloud", vec![observation(0.7)]);

        let outcome = select_damage_source(&mut primary, &mut secondary, &test_image(), 0.4).await;

        assert_eq!(outcome.engine, Engine::CloudNeuralEngine);
        assert_eq!(outcome.observations.len(), 1);
        assert_eq!(primary.calls, 1);
        assert_eq!(secondary.calls, 1);
    }

    #[tokio::test]
    async fn test_low_confidence_primary_falls_back() {
        // Primary returns detections, but none reach the threshold
        let mut primary = StubSource::returning("local", vec![observation(0.2), observation(0.35)]);
        let mut secondary = StubSource::returning("cloud", vec![observation(0.6)]);

        let outcome = select_damage_source(&mut primary, &mut secondary, &test_image(), 0.4).await;

        assert_eq!(outcome.engine, Engine::CloudNeuralEngine);
        assert_eq!(secondary.calls, 1);
    }

    #[tokio::test]
    async fn test_both_sources_empty_yields_fallback_empty() {
        let mut primary = StubSource::failing("local");
        let mut secondary = StubSource::returning("cloud", Vec::new());

        let outcome = select_damage_source(&mut primary, &mut secondary, &test_image(), 0.4).await;

        assert_eq!(outcome.engine, Engine::FallbackEmpty);
        assert!(outcome.observations.is_empty());
    }

    #[tokio::test]
    async fn test_both_sources_failing_yields_fallback_empty() {
        let mut primary = StubSource::failing("local");
        let mut secondary = StubSource::failing("cloud");

        let outcome = select_damage_source(&mut primary, &mut secondary, &test_image(), 0.4).await;

        assert_eq!(outcome.engine, Engine::FallbackEmpty);
        assert!(outcome.observations.is_empty());
        assert_eq!(primary.calls, 1);
        assert_eq!(secondary.calls, 1);
    }

    #[tokio::test]
    async fn test_each_source_invoked_at_most_once() {
        let mut primary = StubSource::returning("local", Vec::new());
        let mut secondary = StubSource::failing("cloud");

        let _ = select_damage_source(&mut primary, &mut secondary, &test_image(), 0.4).await;

        assert_eq!(primary.calls, 1);
        assert_eq!(secondary.calls, 1);
    }
}
