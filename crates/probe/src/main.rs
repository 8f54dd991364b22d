//! mt-probe: report whether a media file's track list is complete and
//! which video/audio tracks it declares.

use anyhow::{Context, Result};
use clap::Parser;
use mt_common::{ContainerFormat, DemuxConfig};
use mt_demux::iso::boxes::{fourcc_to_string, FtypBox};
use mt_demux::traversal::find_ftyp;
use mt_demux::{SegmentReader, Tracks};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Probe an MP4/MOV or Matroska/WebM file for its tracks
#[derive(Parser)]
#[command(name = "mt-probe")]
#[command(version, about)]
struct Cli {
    /// Media file to inspect
    file: PathBuf,

    /// Print a JSON report instead of text
    #[arg(long)]
    json: bool,

    /// Reader configuration (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Skip expanding ISO sample tables
    #[arg(long)]
    no_sample_positions: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Brands {
    major: String,
    compatible: Vec<String>,
}

impl From<&FtypBox> for Brands {
    fn from(ftyp: &FtypBox) -> Self {
        Self {
            major: fourcc_to_string(ftyp.major_brand),
            compatible: ftyp.compatible_brands.iter().copied().map(fourcc_to_string).collect(),
        }
    }
}

#[derive(Serialize)]
struct Report {
    format: ContainerFormat,
    complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    brands: Option<Brands>,
    #[serde(flatten)]
    tracks: Tracks,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::builder().from_env_lossy()
    } else {
        EnvFilter::builder().parse_lossy(if cli.verbose { "debug" } else { "warn" })
    };
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => DemuxConfig::default(),
    };
    if cli.no_sample_positions {
        config.sample_positions = false;
    }
    debug!("Using {:?}", config);

    let mut reader = SegmentReader::open(&cli.file, config)
        .with_context(|| format!("Failed to open {}", cli.file.display()))?;
    let complete = reader
        .read_until_complete()
        .with_context(|| format!("Failed to read {}", cli.file.display()))?;

    let report = Report {
        format: reader.format(),
        complete,
        brands: find_ftyp(reader.segments()).map(Brands::from),
        tracks: reader.tracks(),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&cli.file, &report);
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<DemuxConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
}

fn print_report(path: &Path, report: &Report) {
    println!("{}: {:?}", path.display(), report.format);
    println!(
        "  tracks: {}",
        if report.complete { "complete" } else { "incomplete" }
    );
    if let Some(brands) = &report.brands {
        println!(
            "  brands: {} [{}]",
            brands.major,
            brands.compatible.join(", ")
        );
    }

    for v in &report.tracks.video_tracks {
        println!(
            "  video #{}: {} {}x{} (coded {}x{}, sar {}), timescale {}{}",
            v.track_id,
            v.codec_string,
            v.width,
            v.height,
            v.untransformed_width,
            v.untransformed_height,
            v.sample_aspect_ratio,
            v.timescale,
            samples_suffix(v.sample_positions.as_deref().map(<[_]>::len)),
        );
    }
    for a in &report.tracks.audio_tracks {
        println!(
            "  audio #{}: {}, timescale {}{}",
            a.track_id,
            a.codec_string.as_deref().unwrap_or("unknown codec"),
            a.timescale,
            samples_suffix(a.sample_positions.as_deref().map(<[_]>::len)),
        );
    }
    if report.tracks.is_empty() {
        println!("  no video or audio tracks");
    }
}

fn samples_suffix(count: Option<usize>) -> String {
    count.map(|n| format!(", {n} samples")).unwrap_or_default()
}
