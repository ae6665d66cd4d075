mod fs_provider;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use fs_provider::FsProvider;
use vidstamp_core::{Confidence, ExtractOptions, ExtractionMethod, Extractor, MetadataResult};

#[derive(Parser)]
#[command(
    name = "vidstamp",
    version,
    about = "Recover original capture timestamps from video files"
)]
struct Cli {
    /// Video files or directories to scan (directories are not recursed)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Emit one JSON object per file instead of text lines
    #[arg(long)]
    json: bool,

    /// Write recovered timestamps back as file mtimes (medium confidence or better)
    #[arg(long)]
    apply: bool,

    /// Disable date guessing from filenames
    #[arg(long)]
    no_guess: bool,

    /// Disable interpolation between neighboring sequence numbers
    #[arg(long)]
    no_interpolate: bool,

    /// Process files serially with this many milliseconds between them
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Log strategy-level detail to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let files = fs_provider::collect_video_files(&cli.paths)?;
    tracing::debug!(files = files.len(), "collected inputs");
    if files.is_empty() {
        eprintln!("No video files found. Nothing to do.");
        return Ok(());
    }

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        ctrlc::set_handler(move || cancelled.store(true, Ordering::SeqCst))?;
    }

    let options = ExtractOptions {
        filename_guess: !cli.no_guess,
        sequence_interpolation: !cli.no_interpolate,
        prefix_cap: None,
    };
    let extractor = Extractor::with_options(FsProvider, options);

    let started = Instant::now();
    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(ProgressStyle::default_bar().template("[{bar:40}] {pos}/{len} {msg}")?);

    let results: Vec<(PathBuf, MetadataResult)> = if let Some(delay) = cli.delay_ms {
        // Serial with an inter-file pause, for metered storage backends.
        let mut out = Vec::with_capacity(files.len());
        for (index, path) in files.iter().enumerate() {
            if cancelled.load(Ordering::SeqCst) {
                break;
            }
            if index > 0 {
                std::thread::sleep(Duration::from_millis(delay));
            }
            out.push((path.clone(), extract_one(&extractor, path)));
            bar.inc(1);
        }
        out
    } else {
        files
            .par_iter()
            .filter_map(|path| {
                if cancelled.load(Ordering::SeqCst) {
                    return None;
                }
                let result = extract_one(&extractor, path);
                bar.inc(1);
                Some((path.clone(), result))
            })
            .collect()
    };
    bar.finish_and_clear();

    let mut applied = 0usize;
    for (path, result) in &results {
        if cli.json {
            println!("{}", json_line(path, result)?);
        } else {
            println!("{}", format_line(path, result));
        }
        if cli.apply && apply_mtime(path, result) {
            applied += 1;
        }
    }

    if cancelled.load(Ordering::SeqCst) {
        eprintln!(
            "Interrupted: {} of {} files processed.",
            results.len(),
            files.len()
        );
    }

    let dated = results
        .iter()
        .filter(|(_, result)| result.original_timestamp.is_some())
        .count();
    let by_method = |method: ExtractionMethod| {
        results
            .iter()
            .filter(|(_, result)| result.extraction_method == method)
            .count()
    };
    eprintln!(
        "Done! {} files in {:.1}s: {} dated ({} from atoms, {} from names, {} interpolated, {} from file times), {} undated.",
        results.len(),
        started.elapsed().as_secs_f64(),
        dated,
        by_method(ExtractionMethod::AtomParse),
        by_method(ExtractionMethod::FilenamePattern),
        by_method(ExtractionMethod::SequenceInterpolation),
        by_method(ExtractionMethod::ProviderFallback),
        results.len() - dated,
    );
    if cli.apply {
        eprintln!("Applied {applied} mtimes.");
    }

    Ok(())
}

fn extract_one(extractor: &Extractor<FsProvider>, path: &Path) -> MetadataResult {
    let file_id = path.to_string_lossy();
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    extractor.extract(&file_id, file_name)
}

fn json_line(path: &Path, result: &MetadataResult) -> Result<String> {
    let mut value = serde_json::to_value(result)?;
    if let Some(map) = value.as_object_mut() {
        map.insert(
            "path".to_string(),
            serde_json::Value::String(path.display().to_string()),
        );
    }
    Ok(value.to_string())
}

fn format_line(path: &Path, result: &MetadataResult) -> String {
    let when = result
        .original_timestamp
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "---------- --:--:--".to_string());
    let confidence = result
        .confidence
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut line = format!(
        "{when}  {confidence:>6}  {:<22}  {}",
        result.extraction_method.to_string(),
        path.display()
    );
    if let Some(gps) = &result.gps {
        line.push_str(&format!("  ({:.4}, {:.4})", gps.latitude, gps.longitude));
    }
    if let Some(device) = &result.device_info {
        line.push_str(&format!("  [{device}]"));
    }
    line
}

/// Write the recovered timestamp back as the file's mtime. Low-confidence
/// dates are reported but never written.
fn apply_mtime(path: &Path, result: &MetadataResult) -> bool {
    let Some(ts) = result.original_timestamp else {
        return false;
    };
    if !matches!(
        result.confidence,
        Some(Confidence::Medium | Confidence::High)
    ) {
        return false;
    }
    let mtime = filetime::FileTime::from_unix_time(ts.timestamp(), 0);
    filetime::set_file_mtime(path, mtime).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn dated_result(confidence: Confidence) -> MetadataResult {
        MetadataResult::dated(
            Utc.with_ymd_and_hms(2023, 11, 5, 14, 30, 0).unwrap(),
            ExtractionMethod::AtomParse,
            confidence,
        )
    }

    #[test]
    fn test_json_line_carries_path_and_fields() {
        let line = json_line(Path::new("/videos/clip.mov"), &dated_result(Confidence::High)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["path"], "/videos/clip.mov");
        assert_eq!(value["extraction_method"], "atom-parse");
        assert_eq!(value["confidence"], "high");
        assert_eq!(value["original_timestamp"], "2023-11-05T14:30:00Z");
    }

    #[test]
    fn test_format_line_for_undated_file() {
        let line = format_line(Path::new("clip.mov"), &MetadataResult::none());
        assert!(line.contains("none"));
        assert!(line.contains("clip.mov"));
    }

    #[test]
    fn test_apply_writes_mtime_for_medium_and_better() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mov");
        std::fs::write(&path, b"x").unwrap();

        assert!(apply_mtime(&path, &dated_result(Confidence::Medium)));
        let meta = std::fs::metadata(&path).unwrap();
        let mtime: chrono::DateTime<Utc> = meta.modified().unwrap().into();
        assert_eq!(
            mtime,
            Utc.with_ymd_and_hms(2023, 11, 5, 14, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_apply_skips_low_confidence_and_undated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mov");
        std::fs::write(&path, b"x").unwrap();

        assert!(!apply_mtime(&path, &dated_result(Confidence::Low)));
        assert!(!apply_mtime(&path, &MetadataResult::none()));
    }
}
