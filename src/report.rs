// src/report.rs
//
// Final damage report for one claim image, and its JSON persistence.
// Reports carry the estimator's output verbatim; nothing downstream may
// re-derive costs or severity.

use crate::assessment::DamageAssessment;
use crate::pipeline::Engine;
use crate::severity;
use crate::types::{BoundingBox, DamageObservation, DamageType, SeverityLevel};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageReport {
    pub analysis_id: String,
    pub status: String,
    pub engine: String,
    pub processed_at: String,
    pub damages: Vec<DamageEntry>,
    pub total_estimated_cost: f32,
    pub ai_confidence: f32,
    pub overall_severity_level: SeverityLevel,
    pub overall_severity_score: f32,
    pub overall_severity_description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageEntry {
    pub damage_type: DamageType,
    pub confidence_score: f32,
    pub bounding_box: BoundingBox,
    pub parts_cost: f32,
    pub labor_cost: f32,
    pub estimated_cost: f32,
}

impl DamageReport {
    /// Assemble the report from the chosen source's observations and the
    /// assessment computed over them. Entries keep the detector's emission
    /// order.
    pub fn build(
        analysis_id: &str,
        engine: Engine,
        observations: &[DamageObservation],
        assessment: &DamageAssessment,
    ) -> Self {
        let damages: Vec<DamageEntry> = observations
            .iter()
            .zip(&assessment.costs)
            .map(|(obs, cost)| DamageEntry {
                damage_type: obs.damage_type,
                confidence_score: obs.confidence,
                bounding_box: obs.bbox,
                parts_cost: cost.parts_cost,
                labor_cost: cost.labor_cost,
                estimated_cost: cost.total,
            })
            .collect();

        let aggregate = &assessment.aggregate;

        Self {
            analysis_id: analysis_id.to_string(),
            status: "completed".to_string(),
            engine: engine.as_str().to_string(),
            processed_at: chrono::Utc::now().to_rfc3339(),
            overall_severity_description: severity::describe(
                aggregate.severity_level,
                !damages.is_empty(),
            ),
            damages,
            total_estimated_cost: aggregate.total_cost,
            ai_confidence: aggregate.mean_confidence,
            overall_severity_level: aggregate.severity_level,
            overall_severity_score: aggregate.severity_score,
        }
    }
}

/// Writes one JSON report per analysis id into the report directory.
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create report directory: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Persist a report. Writes to a temp file and renames into place, so a
    /// report file is either absent or complete; re-saving the same id is an
    /// idempotent overwrite.
    pub fn save(&self, report: &DamageReport) -> Result<PathBuf> {
        let path = self.dir.join(format!("{}.json", report.analysis_id));
        let tmp = self.dir.join(format!(".{}.json.tmp", report.analysis_id));

        let json = serde_json::to_vec_pretty(report).context("Failed to serialize report")?;
        fs::write(&tmp, json)
            .with_context(|| format!("Failed to write report: {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to finalize report: {}", path.display()))?;

        info!("💾 Report saved: {}", path.display());
        Ok(path)
    }
}
