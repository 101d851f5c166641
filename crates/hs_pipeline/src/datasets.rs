//! Input headline datasets and published prediction files.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use hs_core::{Error, HeadlineRecord, PredictionBatch, PredictionRecord, Result};
use hs_storage::write_atomic;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const TIMESTAMP_FIELD: &str = "timestamp";
pub const SOURCE_FIELD: &str = "source";
pub const UNKNOWN_SOURCE: &str = "unknown";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const OUTPUT_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
/// Marker directory inside the output directory, one file per scored input.
pub const SCORED_DIR: &str = ".scored";

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl DatasetFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Regular files in `dir` with the given extension. A missing directory
/// simply holds no datasets.
pub fn list_inputs(dir: &Path, extension: &str) -> Result<Vec<DatasetFile>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let matches = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        let metadata = entry.metadata()?;
        if !matches || !metadata.is_file() {
            continue;
        }
        files.push(DatasetFile {
            path,
            modified: metadata.modified()?,
        });
    }
    Ok(files)
}

/// `<file name>@<mtime in ns>`: rewriting an input gives it a new marker.
fn scored_marker(output_dir: &Path, file: &DatasetFile) -> PathBuf {
    let modified = file
        .modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    output_dir
        .join(SCORED_DIR)
        .join(format!("{}@{}", file.file_name(), modified))
}

/// Whether a batch was already published for this version of the input.
pub fn is_scored(output_dir: &Path, file: &DatasetFile) -> bool {
    scored_marker(output_dir, file).is_file()
}

/// Records that `output` holds the predictions for `file`.
pub fn mark_scored(output_dir: &Path, file: &DatasetFile, output: &Path) -> Result<()> {
    let published = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    write_atomic(&scored_marker(output_dir, file), published.as_bytes())
}

/// Most recently modified dataset; equal times fall back to the file name.
/// Modification time is a best-effort ordering when writers race.
pub fn select_latest(files: &[DatasetFile]) -> Option<&DatasetFile> {
    files
        .iter()
        .max_by(|a, b| (a.modified, a.file_name()).cmp(&(b.modified, b.file_name())))
}

fn parse_capture_time(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Reads the headline rows of a dataset. Returns `None` when the text field
/// is absent or the dataset has no rows.
pub fn read_headlines(file: &DatasetFile, text_field: &str) -> Result<Option<Vec<HeadlineRecord>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(&file.path)?;

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|h| String::from_utf8_lossy(h).trim().to_string())
        .collect();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let Some(text_idx) = column(text_field) else {
        return Ok(None);
    };
    let time_idx = column(TIMESTAMP_FIELD);
    let source_idx = column(SOURCE_FIELD);
    let fallback_time: DateTime<Utc> = file.modified.into();

    let mut records = Vec::new();
    for row in reader.byte_records() {
        let row = row?;
        let field = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(|v| String::from_utf8_lossy(v).into_owned())
        };
        records.push(HeadlineRecord {
            text: field(Some(text_idx)).unwrap_or_default(),
            capture_time: field(time_idx)
                .and_then(|v| parse_capture_time(&v))
                .unwrap_or(fallback_time),
            source_label: field(source_idx)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
        });
    }

    if records.is_empty() {
        return Ok(None);
    }
    Ok(Some(records))
}

/// `<prefix><YYYYmmdd_HHMMSS_mmm>.csv`; names sort in creation order.
pub fn output_file_name(prefix: &str, created_at: DateTime<Utc>) -> String {
    format!(
        "{}{}_{:03}.csv",
        prefix,
        created_at.format(OUTPUT_STAMP_FORMAT),
        created_at.timestamp_subsec_millis()
    )
}

/// Collision suffixes are zero padded so they keep sorting by attempt.
fn collision_name(prefix: &str, created_at: DateTime<Utc>, attempt: usize) -> String {
    let base = output_file_name(prefix, created_at);
    match attempt {
        0 => base,
        n => format!("{}_{:04}.csv", base.trim_end_matches(".csv"), n),
    }
}

/// Writes the batch to a temp file in `dir` and publishes it under a fresh
/// name without replacing any existing file. Returns the published path.
pub fn write_predictions_atomic(dir: &Path, prefix: &str, batch: &PredictionBatch) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".predictions-")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(tmp.as_file_mut());
        writer.write_record(["headline", "predicted_sentiment"])?;
        for record in &batch.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    let mut attempt = 0;
    loop {
        let target = dir.join(collision_name(prefix, batch.created_at, attempt));
        match tmp.persist_noclobber(&target) {
            Ok(_) => return Ok(target),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                tmp = e.file;
                attempt += 1;
            }
            Err(e) => return Err(Error::Io(e.error)),
        }
    }
}

/// Published prediction files in `dir`, oldest name first.
pub fn list_outputs(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut outputs = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(prefix) && name.ends_with(".csv") && entry.file_type()?.is_file() {
            outputs.push(entry.path());
        }
    }
    outputs.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
    Ok(outputs)
}

pub fn latest_output(dir: &Path, prefix: &str) -> Result<Option<PathBuf>> {
    Ok(list_outputs(dir, prefix)?.pop())
}

fn created_at_from_name(path: &Path, prefix: &str) -> Option<DateTime<Utc>> {
    let name = path.file_name()?.to_str()?;
    let stamp = name.strip_prefix(prefix)?;
    let naive = NaiveDateTime::parse_from_str(stamp.get(..15)?, OUTPUT_STAMP_FORMAT).ok()?;
    let millis: i64 = stamp.get(16..19)?.parse().ok()?;
    Some(Utc.from_utc_datetime(&naive) + chrono::Duration::milliseconds(millis))
}

/// Reads back a published prediction file.
pub fn read_predictions(path: &Path, prefix: &str) -> Result<PredictionBatch> {
    let mut reader = csv::Reader::from_path(path)?;
    let records = reader
        .deserialize::<PredictionRecord>()
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let created_at = match created_at_from_name(path, prefix) {
        Some(ts) => ts,
        None => std::fs::metadata(path)?.modified()?.into(),
    };
    Ok(PredictionBatch::new(created_at, records))
}
