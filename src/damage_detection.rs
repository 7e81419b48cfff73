// src/damage_detection.rs
//
// Local damage detector: a YOLO-style ONNX model fine-tuned on the six
// damage classes, run through ONNX Runtime. Raw model output is normalized
// into DamageObservation records at this boundary; nothing downstream ever
// sees detector-native tensors.

use crate::claim_image::ClaimImage;
use crate::types::{BoundingBox, Config, DamageObservation, DamageType};
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use tracing::{debug, info};

/// Class index order the damage model was trained with.
const DAMAGE_CLASSES: [DamageType; 6] = [
    DamageType::Scratch,
    DamageType::Dent,
    DamageType::Crack,
    DamageType::Shatter,
    DamageType::Deformation,
    DamageType::Missing,
];

/// Raw per-box floor applied during decoding. The acceptance threshold for
/// the whole result is the pipeline's concern, not the detector's.
const DECODE_CONFIDENCE_FLOOR: f32 = 0.25;

pub struct DamageDetector {
    session: Session,
    input_size: usize,
    num_anchors: usize,
    nms_iou_threshold: f32,
}

impl DamageDetector {
    pub fn new(config: &Config) -> Result<Self> {
        info!("Loading damage model: {}", config.model.path);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&config.model.path)
            .context("Failed to load damage detection model")?;

        info!("✓ Damage detector initialized");

        Ok(Self {
            session,
            input_size: config.model.input_size,
            num_anchors: config.model.num_anchors,
            nms_iou_threshold: config.detection.nms_iou_threshold,
        })
    }

    /// Run detection on one claim image.
    ///
    /// Returns every decoded region (post-NMS); an empty vec means the model
    /// ran fine but found nothing above the decode floor.
    pub fn detect(&mut self, image: &ClaimImage) -> Result<Vec<DamageObservation>> {
        let (input, scale, pad_x, pad_y) = self.preprocess(&image.rgb, image.width, image.height);

        let output = self.infer(&input)?;

        let observations = self.postprocess(&output, scale, pad_x, pad_y);

        debug!(
            "Local detector: {} damage region(s) in {}",
            observations.len(),
            image.analysis_id
        );
        Ok(observations)
    }

    /// Letterbox the RGB frame into the model's square input, normalized to
    /// [0, 1] CHW. Returns the scale and padding needed to map boxes back to
    /// native image coordinates.
    fn preprocess(&self, src: &[u8], src_w: usize, src_h: usize) -> (Vec<f32>, f32, f32, f32) {
        let target = self.input_size;

        let scale = (target as f32 / src_w as f32).min(target as f32 / src_h as f32);
        let scaled_w = (src_w as f32 * scale) as usize;
        let scaled_h = (src_h as f32 * scale) as usize;

        let pad_x = (target - scaled_w) as f32 / 2.0;
        let pad_y = (target - scaled_h) as f32 / 2.0;

        let resized = resize_bilinear(src, src_w, src_h, scaled_w, scaled_h);

        // Gray letterbox background
        let mut canvas = vec![114u8; target * target * 3];
        for y in 0..scaled_h {
            for x in 0..scaled_w {
                let src_idx = (y * scaled_w + x) * 3;
                let dst_x = x + pad_x as usize;
                let dst_y = y + pad_y as usize;
                let dst_idx = (dst_y * target + dst_x) * 3;
                canvas[dst_idx..dst_idx + 3].copy_from_slice(&resized[src_idx..src_idx + 3]);
            }
        }

        // HWC u8 -> CHW f32 in [0, 1]
        let mut input = vec![0.0f32; 3 * target * target];
        for c in 0..3 {
            for h in 0..target {
                for w in 0..target {
                    let hwc_idx = (h * target + w) * 3 + c;
                    let chw_idx = c * target * target + h * target + w;
                    input[chw_idx] = canvas[hwc_idx] as f32 / 255.0;
                }
            }
        }

        (input, scale, pad_x, pad_y)
    }

    fn infer(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let shape = [1, 3, self.input_size, self.input_size];
        let input_value =
            ort::value::Value::from_array((shape.as_slice(), input.to_vec().into_boxed_slice()))?;

        let outputs = self.session.run(ort::inputs!["images" => input_value])?;
        let output = &outputs[0];
        let (_, data) = output.try_extract_tensor::<f32>()?;

        Ok(data.to_vec())
    }

    /// Decode the model output ([1, 4 + classes, anchors]) into observations
    /// in native image coordinates, then suppress overlapping duplicates.
    fn postprocess(
        &self,
        output: &[f32],
        scale: f32,
        pad_x: f32,
        pad_y: f32,
    ) -> Vec<DamageObservation> {
        let anchors = self.num_anchors;
        let mut decoded = Vec::new();

        for i in 0..anchors {
            let cx = output[i];
            let cy = output[anchors + i];
            let w = output[anchors * 2 + i];
            let h = output[anchors * 3 + i];

            let mut max_conf = 0.0f32;
            let mut best_class = 0;
            for c in 0..DAMAGE_CLASSES.len() {
                let conf = output[anchors * (4 + c) + i];
                if conf > max_conf {
                    max_conf = conf;
                    best_class = c;
                }
            }

            if max_conf < DECODE_CONFIDENCE_FLOOR {
                continue;
            }

            // Center format -> corners, then reverse the letterbox transform
            let x1 = (cx - w / 2.0 - pad_x) / scale;
            let y1 = (cy - h / 2.0 - pad_y) / scale;
            let x2 = (cx + w / 2.0 - pad_x) / scale;
            let y2 = (cy + h / 2.0 - pad_y) / scale;

            let bbox = BoundingBox {
                x: x1,
                y: y1,
                width: x2 - x1,
                height: y2 - y1,
            };

            decoded.push(DamageObservation {
                damage_type: DAMAGE_CLASSES[best_class],
                confidence: max_conf,
                area_px: bbox.area(),
                bbox,
            });
        }

        suppress_overlaps(decoded, self.nms_iou_threshold)
    }
}

impl crate::pipeline::DamageSource for DamageDetector {
    fn name(&self) -> &'static str {
        "local-damage-model"
    }

    async fn detect(&mut self, image: &ClaimImage) -> Result<Vec<DamageObservation>> {
        DamageDetector::detect(self, image)
    }
}

fn resize_bilinear(src: &[u8], src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> Vec<u8> {
    let mut dst = vec![0u8; dst_h * dst_w * 3];
    let x_ratio = src_w as f32 / dst_w as f32;
    let y_ratio = src_h as f32 / dst_h as f32;

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let sx = dx as f32 * x_ratio;
            let sy = dy as f32 * y_ratio;
            let sx0 = sx.floor() as usize;
            let sy0 = sy.floor() as usize;
            let sx1 = (sx0 + 1).min(src_w - 1);
            let sy1 = (sy0 + 1).min(src_h - 1);
            let fx = sx - sx0 as f32;
            let fy = sy - sy0 as f32;

            for c in 0..3 {
                let p00 = src[(sy0 * src_w + sx0) * 3 + c] as f32;
                let p10 = src[(sy0 * src_w + sx1) * 3 + c] as f32;
                let p01 = src[(sy1 * src_w + sx0) * 3 + c] as f32;
                let p11 = src[(sy1 * src_w + sx1) * 3 + c] as f32;

                let val = p00 * (1.0 - fx) * (1.0 - fy)
                    + p10 * fx * (1.0 - fy)
                    + p01 * (1.0 - fx) * fy
                    + p11 * fx * fy;

                dst[(dy * dst_w + dx) * 3 + c] = val.round() as u8;
            }
        }
    }
    dst
}

/// Greedy non-maximum suppression keyed on confidence.
fn suppress_overlaps(
    mut observations: Vec<DamageObservation>,
    iou_threshold: f32,
) -> Vec<DamageObservation> {
    observations.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<DamageObservation> = Vec::new();

    'outer: for obs in observations {
        for kept in &keep {
            if box_iou(&kept.bbox, &obs.bbox) >= iou_threshold {
                continue 'outer;
            }
        }
        keep.push(obs);
    }

    keep
}

fn box_iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs_at(x: f32, y: f32, size: f32, confidence: f32) -> DamageObservation {
        let bbox = BoundingBox {
            x,
            y,
            width: size,
            height: size,
        };
        DamageObservation {
            damage_type: DamageType::Dent,
            confidence,
            area_px: bbox.area(),
            bbox,
        }
    }

    #[test]
    fn test_nms_keeps_highest_confidence_of_overlapping_pair() {
        let observations = vec![obs_at(10.0, 10.0, 100.0, 0.6), obs_at(12.0, 12.0, 100.0, 0.9)];
        let kept = suppress_overlaps(observations, 0.45);

        assert_eq!(kept.len(), 1);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_nms_keeps_disjoint_regions() {
        let observations = vec![obs_at(0.0, 0.0, 50.0, 0.8), obs_at(300.0, 300.0, 50.0, 0.7)];
        let kept = suppress_overlaps(observations, 0.45);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_iou_of_identical_boxes_is_one() {
        let b = BoundingBox {
            x: 5.0,
            y: 5.0,
            width: 20.0,
            height: 20.0,
        };
        assert!((box_iou(&b, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
        };
        let b = BoundingBox {
            x: 100.0,
            y: 100.0,
            width: 10.0,
            height: 10.0,
        };
        assert_eq!(box_iou(&a, &b), 0.0);
    }

    #[test]
    fn test_resize_preserves_uniform_color() {
        let src = vec![200u8; 8 * 8 * 3];
        let dst = resize_bilinear(&src, 8, 8, 4, 4);
        assert_eq!(dst.len(), 4 * 4 * 3);
        assert!(dst.iter().all(|&v| v == 200));
    }
}
