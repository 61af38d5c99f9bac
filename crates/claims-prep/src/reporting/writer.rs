//! Atomic CSV output.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Write `df` as a comma separated file with a header row.
///
/// The table is written to a temporary file in the destination directory
/// (created if needed) and renamed over `path` only once every byte is on
/// disk. On any failure the temporary file is removed and `path` is left
/// untouched.
pub fn write_csv_atomic(df: &mut DataFrame, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    debug!("Writing {} rows to {}", df.height(), tmp.path().display());

    CsvWriter::new(tmp.as_file_mut())
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(df)?;
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| PipelineError::Io(e.error))?;

    info!("Saved {} rows to {}", df.height(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("processed").join("out.csv");
        let mut df = df![
            "sum_insured" => [100.0, 0.0],
            "province" => [Some("Gauteng"), None],
        ]
        .unwrap();

        write_csv_atomic(&mut df, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("sum_insured,province"));
        assert_eq!(lines.next(), Some("100.0,Gauteng"));
        assert_eq!(lines.next(), Some("0.0,"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "stale").unwrap();

        let mut df = df![
            "total_claims" => [1.0],
        ]
        .unwrap();
        write_csv_atomic(&mut df, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("total_claims\n"));
        // only the target file remains
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
