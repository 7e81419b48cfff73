// src/types.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub detection: DetectionConfig,
    pub cloud: CloudConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: String,
    pub input_size: usize,
    pub num_anchors: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Minimum confidence for the local detector's result to be accepted
    /// as the image's damage source. Below this, the cloud fallback runs.
    pub confidence_threshold: f32,
    pub nms_iou_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    pub enabled: bool,
    pub server_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub input_dir: String,
    pub report_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

// ============================================================================
// DOMAIN TYPES
// ============================================================================

/// The closed set of damage kinds the cost model knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    Scratch,
    Dent,
    Crack,
    Shatter,
    Deformation,
    Missing,
}

impl DamageType {
    pub const ALL: [DamageType; 6] = [
        DamageType::Scratch,
        DamageType::Dent,
        DamageType::Crack,
        DamageType::Shatter,
        DamageType::Deformation,
        DamageType::Missing,
    ];

    /// Parse a detector-supplied label. Unrecognized labels map to `Dent`,
    /// the mid-range default rate; detector vocabulary drift must not turn
    /// into an error at this boundary.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "scratch" => DamageType::Scratch,
            "dent" => DamageType::Dent,
            "crack" => DamageType::Crack,
            "shatter" => DamageType::Shatter,
            "deformation" => DamageType::Deformation,
            "missing" => DamageType::Missing,
            _ => DamageType::Dent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DamageType::Scratch => "scratch",
            DamageType::Dent => "dent",
            DamageType::Crack => "crack",
            DamageType::Shatter => "shatter",
            DamageType::Deformation => "deformation",
            DamageType::Missing => "missing",
        }
    }
}

/// Axis-aligned box in the image's native pixel coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// One detected damage region, normalized from whatever the underlying
/// detector returned. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct DamageObservation {
    pub damage_type: DamageType,
    pub confidence: f32,
    pub area_px: f32,
    pub bbox: BoundingBox,
}

/// Coarse three-level classification derived from mean detection confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Minor,
    Moderate,
    Severe,
}

impl SeverityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Minor => "minor",
            SeverityLevel::Moderate => "moderate",
            SeverityLevel::Severe => "severe",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SeverityLevel::Minor => "Minor",
            SeverityLevel::Moderate => "Moderate",
            SeverityLevel::Severe => "Severe",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_labels_round_trip() {
        for dt in DamageType::ALL {
            assert_eq!(DamageType::from_label(dt.as_str()), dt);
        }
    }

    #[test]
    fn test_unknown_label_defaults_to_dent() {
        assert_eq!(DamageType::from_label("rust-hole"), DamageType::Dent);
        assert_eq!(DamageType::from_label(""), DamageType::Dent);
    }

    #[test]
    fn test_label_parse_is_case_insensitive() {
        assert_eq!(DamageType::from_label("Shatter"), DamageType::Shatter);
        assert_eq!(DamageType::from_label("SCRATCH"), DamageType::Scratch);
    }
}
