// src/main.rs

use anyhow::{Context, Result};
use segtrack::detections::load_detections;
use segtrack::export::{PerTrackExporter, SegmentExporter};
use segtrack::pipeline::FanOut;
use segtrack::registry::TrackRegistry;
use segtrack::sink::FsSinkFactory;
use segtrack::types::{Config, Frame};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use walkdir::WalkDir;

fn main() -> Result<()> {
    let config = Config::load("config.yaml")?;

    // RUST_LOG wins over the configured level when both are set.
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| format!("segtrack={}", config.logging.level)),
        )
        .init();

    info!("Segmented tracking exporter starting");
    info!("Configuration loaded");
    info!(
        "Tracking: cap={}, match_overlap={:.2}, backend={:?}",
        config.tracking.max_active_tracks,
        config.tracking.match_overlap_threshold,
        config.tracking.backend
    );
    info!(
        "Export: threshold={} frames, session={}, per_track={}",
        config.export.min_frames_threshold,
        config.export.session_segments,
        config.export.per_track_segments
    );

    let sequences = find_sequences(&config.video.input_dir)?;
    if sequences.is_empty() {
        error!("No frame sequences found under {}", config.video.input_dir);
        return Ok(());
    }
    info!("Found {} sequence(s) to process", sequences.len());

    for (idx, seq_dir) in sequences.iter().enumerate() {
        info!(
            "Processing sequence {}/{}: {}",
            idx + 1,
            sequences.len(),
            seq_dir.display()
        );
        match process_sequence(seq_dir, &config) {
            Ok(stats) => {
                info!("Sequence processed");
                info!("  Frames: {}", stats.frames);
                info!(
                    "  Tracks started: {} / finished: {}",
                    stats.tracks_started, stats.tracks_finished
                );
                info!(
                    "  Detections: {} seen, {} dropped",
                    stats.detections_seen, stats.detections_dropped
                );
                info!("  Segments committed: {}", stats.segments_committed);
                info!("  Processing speed: {:.1} FPS", stats.avg_fps);
            }
            Err(e) => {
                // One bad sequence never halts the session.
                error!("Failed to process {}: {:#}", seq_dir.display(), e);
            }
        }
    }

    Ok(())
}

struct SequenceStats {
    frames: u64,
    tracks_started: u64,
    tracks_finished: u64,
    detections_seen: u64,
    detections_dropped: u64,
    segments_committed: u64,
    avg_fps: f64,
}

/// A sequence is any directory holding a `detections.jsonl` sidecar
/// next to its frame images.
fn find_sequences(input_dir: &str) -> Result<Vec<PathBuf>> {
    let mut sequences = Vec::new();
    for entry in WalkDir::new(input_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_dir() && entry.path().join("detections.jsonl").is_file() {
            sequences.push(entry.path().to_path_buf());
        }
    }
    sequences.sort();
    Ok(sequences)
}

fn frame_files(seq_dir: &Path) -> Result<Vec<PathBuf>> {
    let image_extensions = ["jpg", "jpeg", "png", "JPG", "JPEG", "PNG"];
    let mut frames: Vec<PathBuf> = std::fs::read_dir(seq_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map_or(false, |ext| image_extensions.contains(&ext))
        })
        .collect();
    frames.sort();
    Ok(frames)
}

fn process_sequence(seq_dir: &Path, config: &Config) -> Result<SequenceStats> {
    let start_time = Instant::now();

    let detections = load_detections(&seq_dir.join("detections.jsonl"))?;
    let frames = frame_files(seq_dir)?;
    if frames.is_empty() {
        warn!("No frame images in {}", seq_dir.display());
    }

    let seq_name = seq_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "sequence".to_string());
    let output_dir = Path::new(&config.export.output_dir).join(&seq_name);
    std::fs::create_dir_all(&output_dir)?;

    let mut registry = TrackRegistry::new(config.tracking.clone());
    let mut fanout = FanOut::new();

    if config.export.session_segments {
        fanout.register(Box::new(SegmentExporter::new(
            config.export.min_frames_threshold,
            Box::new(FsSinkFactory::new(output_dir.clone())),
        )));
    }
    if config.export.per_track_segments {
        fanout.register(Box::new(PerTrackExporter::new(
            config.export.min_frames_threshold,
            Box::new(FsSinkFactory::new(output_dir.join("per_track"))),
        )));
    }

    let frame_interval_ms = 1000.0 / config.video.fps.max(1.0);
    let empty: Vec<segtrack::BoundingBox> = Vec::new();

    for (index, path) in frames.iter().enumerate() {
        let frame_id = index as u64 + 1;
        let image = image::open(path)
            .with_context(|| format!("decoding {}", path.display()))?
            .to_rgb8();
        let frame = Arc::new(Frame::new(
            image.as_raw().clone(),
            image.width() as usize,
            image.height() as usize,
            frame_id as f64 * frame_interval_ms,
        ));

        let dets = detections.get(&frame_id).unwrap_or(&empty);
        let snapshot = registry
            .process_frame(frame, dets)
            .context("malformed detection geometry")?;
        fanout.dispatch(&snapshot);

        if frame_id % 50 == 0 {
            info!(
                "Progress: frame {}/{} | live tracks: {} | started: {} finished: {}",
                frame_id,
                frames.len(),
                snapshot.tracks.len(),
                snapshot.total_started,
                snapshot.total_finished
            );
        }
    }

    fanout.finalize();

    let stats = registry.stats();
    let duration = start_time.elapsed().as_secs_f64();

    Ok(SequenceStats {
        frames: stats.frames_processed,
        tracks_started: stats.total_started,
        tracks_finished: stats.total_finished,
        detections_seen: stats.detections_seen,
        detections_dropped: stats.detections_dropped,
        segments_committed: committed_segment_count(&output_dir)?,
        avg_fps: stats.frames_processed as f64 / duration.max(f64::EPSILON),
    })
}

/// Counts segment directories that made it to a final name. Staging
/// leftovers are not committed output.
fn committed_segment_count(output_dir: &Path) -> Result<u64> {
    let mut count = 0;
    for entry in WalkDir::new(output_dir)
        .min_depth(1)
        .max_depth(2)
        .into_iter()
        .filter_entry(|e| e.file_name().to_str().map_or(true, |n| n != ".staging"))
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_dir() && entry.path().join("annotations.json").is_file() {
            count += 1;
        }
    }
    Ok(count)
}
