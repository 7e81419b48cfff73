// src/main.rs

mod assessment;
mod claim_image;
mod cloud_client;
mod config;
mod damage_detection;
mod estimate;
mod pipeline;
mod report;
mod severity;
mod types;

use anyhow::Result;
use claim_image::ClaimImage;
use cloud_client::CloudClient;
use damage_detection::DamageDetector;
use pipeline::{select_damage_source, Engine};
use report::{DamageReport, ReportStore};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("autoguard_assess=info,ort=warn")
        .init();

    info!("🚗 AutoGuard damage assessment starting");

    let config = types::Config::load("config.yaml")?;
    info!("✓ Configuration loaded");
    info!(
        "Detection threshold: {:.2}, cloud fallback: {}",
        config.detection.confidence_threshold,
        if config.cloud.enabled { "enabled" } else { "disabled" }
    );

    let mut detector = DamageDetector::new(&config)?;
    let mut cloud = CloudClient::new(&config.cloud)?;
    let store = ReportStore::new(Path::new(&config.storage.report_dir))?;

    let images = find_claim_images(&config.storage.input_dir);
    if images.is_empty() {
        error!("No claim images found in {}", config.storage.input_dir);
        return Ok(());
    }
    info!("Found {} claim image(s) to assess", images.len());

    let mut stats = RunStats::default();

    for (idx, path) in images.iter().enumerate() {
        info!(
            "Processing image {}/{}: {}",
            idx + 1,
            images.len(),
            path.display()
        );

        let image = match ClaimImage::load(path) {
            Ok(img) => img,
            Err(e) => {
                error!("Failed to load {}: {:#}", path.display(), e);
                stats.failed += 1;
                continue;
            }
        };

        let outcome = select_damage_source(
            &mut detector,
            &mut cloud,
            &image,
            config.detection.confidence_threshold,
        )
        .await;

        let assessment = assessment::assess(&outcome.observations);
        let damage_report = DamageReport::build(
            &image.analysis_id,
            outcome.engine,
            &outcome.observations,
            &assessment,
        );

        match store.save(&damage_report) {
            Ok(_) => {
                stats.record(outcome.engine, assessment.aggregate.total_cost);
                info!(
                    "  {} | {} damage(s) | {} | ₹{:.2}",
                    outcome.engine.as_str(),
                    damage_report.damages.len(),
                    damage_report.overall_severity_description,
                    damage_report.total_estimated_cost
                );
            }
            Err(e) => {
                error!("Failed to persist report for {}: {:#}", image.analysis_id, e);
                stats.failed += 1;
            }
        }
    }

    info!("\n========================================");
    info!("✓ Assessment run complete");
    info!("  Images assessed: {}", stats.assessed);
    info!("  Local model results: {}", stats.local);
    info!("  Cloud fallback results: {}", stats.cloud);
    info!("  Empty results: {}", stats.empty);
    if stats.failed > 0 {
        warn!("  Failed images: {}", stats.failed);
    }
    info!("  Total estimated cost: ₹{:.2}", stats.total_cost);
    info!("========================================");

    Ok(())
}

#[derive(Default)]
struct RunStats {
    assessed: usize,
    local: usize,
    cloud: usize,
    empty: usize,
    failed: usize,
    total_cost: f32,
}

impl RunStats {
    fn record(&mut self, engine: Engine, cost: f32) {
        self.assessed += 1;
        self.total_cost += cost;
        match engine {
            Engine::LocalVisionCore => self.local += 1,
            Engine::CloudNeuralEngine => self.cloud += 1,
            Engine::FallbackEmpty => self.empty += 1,
        }
    }
}

fn find_claim_images(input_dir: &str) -> Vec<PathBuf> {
    let image_extensions = ["jpg", "jpeg", "png", "bmp", "webp"];
    let mut images = Vec::new();

    for entry in WalkDir::new(input_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if image_extensions.contains(&ext.to_ascii_lowercase().as_str()) {
                images.push(path.to_path_buf());
            }
        }
    }

    images.sort();
    images
}
