//! Raw delimited file reading.

use crate::config::IngestOptions;
use crate::error::{PipelineError, Result};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::info;

fn read_options(options: &IngestOptions) -> CsvReadOptions {
    let parse_options = CsvParseOptions::default()
        .with_separator(options.separator_byte())
        .with_quote_char(options.quote_byte());

    // Every column is read as a string; typing happens in coercion so that
    // bad values are reported with their column and row.
    CsvReadOptions::default()
        .with_has_header(options.has_header)
        .with_infer_schema_length(Some(0))
        .with_parse_options(parse_options)
}

fn malformed(path: &Path, err: PolarsError) -> PipelineError {
    PipelineError::MalformedInput {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Read a raw delimited file with every column as a string.
pub fn read_raw(path: &Path, options: &IngestOptions) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(PipelineError::InputNotFound(path.to_path_buf()));
    }

    info!("Loading data from {} ...", path.display());

    let df = read_options(options)
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))
        .map_err(|e| malformed(path, e))?
        .finish()
        .map_err(|e| malformed(path, e))?;

    info!("Loaded {} rows and {} columns.", df.height(), df.width());
    Ok(df)
}

/// Parse delimited text already held in memory.
pub fn read_raw_str(content: &str, options: &IngestOptions) -> Result<DataFrame> {
    let cursor = Cursor::new(content.to_string());
    read_options(options)
        .into_reader_with_file_handle(cursor)
        .finish()
        .map_err(|e| malformed(Path::new("<memory>"), e))
}
