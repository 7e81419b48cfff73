// src/estimate.rs
//
// Per-region repair-cost model.
//
// Cost = base_rate(type) * size_factor(area) * confidence_factor, split into
// parts and labor. Rates are INR per incident, calibrated against typical
// Indian market repair quotes.

use crate::types::DamageType;
use serde::Serialize;

/// Reference detection resolution: 640x640 px.
const REFERENCE_AREA_PX: f32 = 640.0 * 640.0;

/// Cap the size multiplier so a full-frame detection cannot explode the quote.
const SIZE_FACTOR_CAP: f32 = 4.0;

/// Confidence never reduces cost below the 0.8-confidence baseline. A shaky
/// detection still gets quoted as if we were reasonably sure of it; only
/// confidence above the floor scales the cost up.
const CONFIDENCE_FLOOR: f32 = 0.8;

/// Labor is quoted as 40% of parts.
const LABOR_MULTIPLIER: f32 = 0.4;

/// Cost breakdown for a single damage region. `total` is always
/// `parts_cost + labor_cost`, rounded to 2 decimals.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub parts_cost: f32,
    pub labor_cost: f32,
    pub total: f32,
}

/// Base repair rate per damage type, before size/confidence adjustment.
pub fn base_rate(damage_type: DamageType) -> f32 {
    match damage_type {
        DamageType::Scratch => 1500.0,
        DamageType::Dent => 2500.0,
        DamageType::Crack => 5000.0,
        DamageType::Shatter => 8000.0,
        DamageType::Deformation => 12000.0,
        DamageType::Missing => 15000.0,
    }
}

/// Size multiplier from the region's pixel area, relative to a 640x640 frame.
/// Small damage (~1% of frame) stays near 0.8x; large damage is capped at 4x.
/// Non-positive area means the detector gave us no usable region size, so the
/// multiplier stays neutral at 1.0.
fn size_factor(area_px: f32) -> f32 {
    if area_px > 0.0 {
        let ratio = area_px / REFERENCE_AREA_PX;
        (0.8 + ratio * 10.0).min(SIZE_FACTOR_CAP)
    } else {
        1.0
    }
}

/// Estimate the repair cost of one damage region.
///
/// Total over its whole input domain: out-of-range confidence or area values
/// flow through the formula rather than erroring.
pub fn estimate_cost(damage_type: DamageType, confidence: f32, area_px: f32) -> CostEstimate {
    let parts_cost = base_rate(damage_type) * size_factor(area_px) * confidence.max(CONFIDENCE_FLOOR);
    let labor_cost = parts_cost * LABOR_MULTIPLIER;
    let total = round2(parts_cost + labor_cost);

    CostEstimate {
        parts_cost,
        labor_cost,
        total,
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
