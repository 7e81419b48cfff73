// src/cloud_client.rs
//
// Async HTTP client for the cloud damage-analysis service, used when the
// local detector yields nothing confident. Sends the claim photo as a
// base64-encoded JPEG with request metadata, and normalizes the service's
// damage list into DamageObservation records.

use crate::claim_image::ClaimImage;
use crate::types::{BoundingBox, CloudConfig, DamageObservation, DamageType};
use anyhow::{anyhow, Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageAnalysisRequest {
    pub analysis_id: String,
    pub captured_at: String,
    pub width: i32,
    pub height: i32,
    pub mime_type: String,
    pub base64_image: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageAnalysisResponse {
    #[serde(default)]
    pub damages: Vec<CloudDamage>,
    /// Overall confidence reported by the service; informational only, the
    /// aggregate is always re-derived from the per-damage confidences.
    #[serde(default)]
    pub confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudDamage {
    #[serde(default)]
    pub part: Option<String>,
    pub damage_type: String,
    pub confidence: f32,
    pub bounding_box: CloudBoundingBox,
}

#[derive(Debug, Deserialize)]
pub struct CloudBoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct CloudClient {
    server_url: String,
    http_client: reqwest::Client,
    enabled: bool,
}

impl CloudClient {
    pub fn new(config: &CloudConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        if !config.enabled {
            warn!("Cloud analysis disabled in config; fallback will yield empty results");
        }

        Ok(Self {
            server_url: config.server_url.clone(),
            http_client,
            enabled: config.enabled,
        })
    }

    /// Send one claim image for analysis and return the normalized damages.
    ///
    /// A disabled client reports an empty damage list rather than an error,
    /// so the pipeline lands on its canonical empty outcome.
    pub async fn analyze(&self, image: &ClaimImage) -> Result<Vec<DamageObservation>> {
        if !self.enabled {
            debug!("Cloud analysis skipped (disabled)");
            return Ok(Vec::new());
        }

        let request = self.build_request(image);
        let url = format!("{}/api/v1/analyze", self.server_url);

        info!(
            "🌐 Sending cloud analysis request: {} ({}x{})",
            request.analysis_id, request.width, request.height
        );

        let resp = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to reach cloud analysis server")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!("🌐 Cloud server error {}: {}", status, body);
            return Err(anyhow!("Cloud analysis failed with HTTP {}", status));
        }

        let analysis: DamageAnalysisResponse = resp
            .json()
            .await
            .context("Failed to parse cloud analysis response")?;

        let observations = normalize_cloud_damages(analysis.damages);
        info!(
            "🌐 Cloud analysis returned {} damage region(s)",
            observations.len()
        );

        Ok(observations)
    }

    fn build_request(&self, image: &ClaimImage) -> DamageAnalysisRequest {
        let b64 = base64::engine::general_purpose::STANDARD.encode(&image.jpeg_bytes);

        DamageAnalysisRequest {
            analysis_id: image.analysis_id.clone(),
            captured_at: chrono::Utc::now().to_rfc3339(),
            width: image.width as i32,
            height: image.height as i32,
            mime_type: "image/jpeg".to_string(),
            base64_image: b64,
        }
    }
}

impl crate::pipeline::DamageSource for CloudClient {
    fn name(&self) -> &'static str {
        "cloud-analysis"
    }

    async fn detect(&mut self, image: &ClaimImage) -> Result<Vec<DamageObservation>> {
        self.analyze(image).await
    }
}

/// Convert the service's loosely-typed damage entries into observations.
/// Unknown damage-type labels fall back to the default rate class.
fn normalize_cloud_damages(damages: Vec<CloudDamage>) -> Vec<DamageObservation> {
    damages
        .into_iter()
        .map(|d| {
            let bbox = BoundingBox {
                x: d.bounding_box.x,
                y: d.bounding_box.y,
                width: d.bounding_box.width,
                height: d.bounding_box.height,
            };
            DamageObservation {
                damage_type: DamageType::from_label(&d.damage_type),
                confidence: d.confidence,
                area_px: bbox.area(),
                bbox,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud_damage(damage_type: &str, confidence: f32, w: f32, h: f32) -> CloudDamage {
        CloudDamage {
            part: Some("Front Bumper".to_string()),
            damage_type: damage_type.to_string(),
            confidence,
            bounding_box: CloudBoundingBox {
                x: 50.0,
                y: 100.0,
                width: w,
                height: h,
            },
        }
    }

    #[test]
    fn test_normalize_maps_fields_and_area() {
        let obs = normalize_cloud_damages(vec![cloud_damage("shatter", 0.82, 200.0, 150.0)]);

        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].damage_type, DamageType::Shatter);
        assert!((obs[0].confidence - 0.82).abs() < 1e-6);
        assert!((obs[0].area_px - 30000.0).abs() < 1e-3);
    }

    #[test]
    fn test_normalize_defaults_unknown_label() {
        let obs = normalize_cloud_damages(vec![cloud_damage("paint-transfer", 0.5, 10.0, 10.0)]);
        assert_eq!(obs[0].damage_type, DamageType::Dent);
    }

    #[test]
    fn test_response_parses_with_missing_optional_fields() {
        let json = r#"{
            "damages": [
                {
                    "damageType": "crack",
                    "confidence": 0.7,
                    "boundingBox": {"x": 0, "y": 0, "width": 40, "height": 20}
                }
            ]
        }"#;

        let parsed: DamageAnalysisResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.damages.len(), 1);
        assert!(parsed.confidence.is_none());
        assert!(parsed.damages[0].part.is_none());

        let obs = normalize_cloud_damages(parsed.damages);
        assert_eq!(obs[0].damage_type, DamageType::Crack);
        assert!((obs[0].area_px - 800.0).abs() < 1e-3);
    }

    #[test]
    fn test_empty_response_normalizes_to_empty() {
        let parsed: DamageAnalysisResponse = serde_json::from_str("{}").unwrap();
        assert!(normalize_cloud_damages(parsed.damages).is_empty());
    }
}
