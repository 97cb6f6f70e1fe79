use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::review::{Review, ReviewRow};

fn create_output_file(dir: &Path, filename: &str) -> Result<(PathBuf, BufWriter<File>)> {
    if !dir.exists() {
        create_dir_all(dir).with_context(|| format!("Cannot create directory {}", dir.display()))?;
    }
    let path = dir.join(filename);
    let file = File::create(&path).with_context(|| format!("Cannot create {}", path.display()))?;
    Ok((path, BufWriter::new(file)))
}

/// Pretty-printed UTF-8 JSON; CJK text is written as-is, not `\u` escaped.
pub fn save_json<T: Serialize + ?Sized>(data: &T, dir: &Path, filename: &str) -> Result<PathBuf> {
    let (path, mut writer) = create_output_file(dir, filename)?;
    serde_json::to_writer_pretty(&mut writer, data)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    info!(path = %path.display(), "saved JSON");
    Ok(path)
}

/// Writes one row per review. Returns `None` without touching the disk when
/// there is nothing to write.
pub fn save_csv(reviews: &[Review], dir: &Path, filename: &str) -> Result<Option<PathBuf>> {
    if reviews.is_empty() {
        warn!(filename, "no reviews, CSV not written");
        return Ok(None);
    }

    let (path, writer) = create_output_file(dir, filename)?;
    let mut csv_writer = csv::Writer::from_writer(writer);
    for review in reviews {
        csv_writer.serialize(ReviewRow::from(review))?;
    }
    csv_writer.flush()?;
    info!(path = %path.display(), rows = reviews.len(), "saved CSV");
    Ok(Some(path))
}
