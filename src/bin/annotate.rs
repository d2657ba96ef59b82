// src/bin/annotate.rs

use alert_overlay::{
    load_font, AnnotationsPayload, DetectionStats, Frame, LineCrossingConfig, OverlayRenderer,
    RasterSurface, RenderOptions,
};
use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// File-in/file-out harness for the overlay pipeline: decode a snapshot,
/// parse its annotations payload, render, write a PNG.
///
/// Usage: annotate <image> <annotations.json> <out.png> [lines.json]
///
/// Set `OVERLAY_FONT` to a TTF/OTF path to get label text; without it the
/// overlay renders boxes and paths only.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("alert_overlay=info,annotate=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        anyhow::bail!("usage: annotate <image> <annotations.json> <out.png> [lines.json]");
    }

    let image = image::open(&args[1])
        .with_context(|| format!("opening image {}", args[1]))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    let frame = Frame::from_rgba(image.into_raw(), width, height)?;
    info!(width, height, "decoded snapshot");

    let payload_json = std::fs::read_to_string(&args[2])
        .with_context(|| format!("reading annotations {}", args[2]))?;
    let payload: AnnotationsPayload =
        serde_json::from_str(&payload_json).context("parsing annotations payload")?;

    let line_crossings: Option<LineCrossingConfig> = match args.get(4) {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading line configuration {path}"))?;
            Some(serde_json::from_str(&json).context("parsing line configuration")?)
        }
        None => None,
    };

    let mut surface = RasterSurface::new();
    if let Ok(font_path) = std::env::var("OVERLAY_FONT") {
        let bytes = std::fs::read(&font_path)
            .with_context(|| format!("reading font {font_path}"))?;
        surface = surface.with_font(load_font(bytes)?);
    }

    let options = RenderOptions {
        line_crossings,
        ..Default::default()
    };
    let mut renderer = OverlayRenderer::new();
    renderer.render(&mut surface, Some(&frame), None, Some(&payload), &options);

    if let Some(detections) = payload.data.as_ref().and_then(|d| d.detections.as_ref()) {
        let records =
            alert_overlay::adapter::normalize(detections, width as f32, height as f32);
        let stats = DetectionStats::from_records(&records);
        info!(
            total = stats.total,
            unique_ids = stats.unique_ids,
            mean_score = ?stats.mean_score,
            "detection summary"
        );
    }

    surface
        .canvas()
        .save(&args[3])
        .with_context(|| format!("writing {}", args[3]))?;
    info!(out = %args[3], "overlay written");
    Ok(())
}
