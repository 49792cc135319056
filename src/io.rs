//! CSV loading and saving for [`Dataset`]s.
//!
//! Column types come from the polars CSV reader's schema inference over the first
//! [`INFER_SCHEMA_ROWS`] rows: integer, float, boolean (`true`/`false`) or text. Empty
//! cells are missing. Datetimes are never inferred; convert them explicitly.

use crate::engine::dataset::{DATETIME_DISPLAY_FORMAT, Dataset};
use crate::error::{EngineError, Result};
use polars::prelude::*;
use std::io::{Cursor, Read, Write};
use std::path::Path;

pub const INFER_SCHEMA_ROWS: usize = 10_000;

fn csv_error(err: PolarsError) -> EngineError {
    match err {
        PolarsError::IO { error, .. } => {
            EngineError::Io(std::io::Error::new(error.kind(), error.to_string()))
        }
        other => EngineError::Io(std::io::Error::other(other.to_string())),
    }
}

fn read_options() -> CsvReadOptions {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
}

pub fn read_csv(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        EngineError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })?;
    let frame = read_options()
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(csv_error)?;
    let df = from_frame(frame)?;
    tracing::info!(
        "Read {} rows x {} columns from {}",
        df.n_rows(),
        df.n_cols(),
        path.display()
    );
    Ok(df)
}

pub fn read_csv_from<R: Read>(mut reader: R) -> Result<Dataset> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(EngineError::validation("CSV input has no header row"));
    }
    let frame = read_options()
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(csv_error)?;
    from_frame(frame)
}

/// Trims header names and normalizes the inferred column types.
fn from_frame(mut frame: DataFrame) -> Result<Dataset> {
    let names: Vec<String> = frame
        .get_column_names()
        .into_iter()
        .map(|n| n.trim().to_owned())
        .collect();
    frame
        .set_column_names(names)
        .map_err(|e| EngineError::validation(e.to_string()))?;
    Dataset::new(frame)
}

pub fn write_csv(df: &Dataset, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)?;
    write_csv_to(df, file)?;
    tracing::info!("Wrote {} rows to {}", df.n_rows(), path.display());
    Ok(())
}

/// Writes the header and every row; missing cells become empty fields.
pub fn write_csv_to<W: Write>(df: &Dataset, mut writer: W) -> Result<()> {
    CsvWriter::new(&mut writer)
        .include_header(true)
        .with_datetime_format(Some(DATETIME_DISPLAY_FORMAT.to_owned()))
        .finish(&mut df.frame().clone())
        .map_err(csv_error)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used)]
    use super::*;
    use crate::engine::{DType, Value};

    const SAMPLE: &str = "id,price,active,city,note\n\
                          1,2.5,true,Oslo,\n\
                          2,,false,Rome,x\n\
                          3,4,true,,y\n";

    #[test]
    fn test_infers_column_types() {
        let df = read_csv_from(SAMPLE.as_bytes()).unwrap();
        assert_eq!(
            df.dtypes(),
            [DType::Integer, DType::Float, DType::Boolean, DType::Text, DType::Text]
        );
        assert_eq!(df.missing_count(), 3);
        assert_eq!(df.value("price", 2).unwrap(), Some(Value::Float(4.0)));
        assert_eq!(df.value("active", 1).unwrap(), Some(Value::Bool(false)));
    }

    #[test]
    fn test_write_then_read_preserves_values() {
        let df = read_csv_from(SAMPLE.as_bytes()).unwrap();
        let mut buf = Vec::new();
        write_csv_to(&df, &mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert_eq!(text.lines().nth(1), Some("1,2.5,true,Oslo,"));
        let back = read_csv_from(buf.as_slice()).unwrap();
        assert_eq!(back, df);
    }

    #[test]
    fn test_header_names_are_trimmed() {
        let df = read_csv_from(" a , b\n1,2\n".as_bytes()).unwrap();
        assert_eq!(df.column_names(), ["a", "b"]);
    }

    #[test]
    fn test_ragged_rows_fail() {
        let err = read_csv_from("a,b\n1,2\n3,4,5\n".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let err = read_csv_from("".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }
}
