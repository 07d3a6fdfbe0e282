//! CSV input: one hourly count per row.
//!
//! The first row is a header (unless `has_header = false`); column
//! `count_column` holds a non-negative integer. Other columns (typically a
//! timestamp) are ignored. Rows are kept in file order.

use crate::config::DataConfig;
use rf_common::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read every count from the CSV at `path`.
pub fn load_counts(path: &Path, config: &DataConfig) -> Result<Vec<u64>> {
    let file = File::open(path).map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let counts = read_counts(file, config)?;
    tracing::debug!(path = %path.display(), rows = counts.len(), "csv read");
    Ok(counts)
}

/// Read every count from CSV text supplied by `reader`.
pub fn read_counts<R: Read>(reader: R, config: &DataConfig) -> Result<Vec<u64>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(config.has_header)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let column = config.count_column;
    let mut counts = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(from_csv_error)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = record
            .get(column)
            .ok_or(Error::MissingColumn { line, column })?;
        let count = field.parse::<u64>().map_err(|_| Error::InvalidCount {
            line,
            column,
            value: field.to_string(),
        })?;
        counts.push(count);
    }
    Ok(counts)
}

fn from_csv_error(err: csv::Error) -> Error {
    if err.is_io_error() {
        return Error::Io(err.into());
    }
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    Error::MalformedRow {
        line,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn read(text: &str) -> Result<Vec<u64>> {
        read_counts(text.as_bytes(), &DataConfig::default())
    }

    #[test]
    fn reads_second_column_after_header() {
        let text = "time,count\n2019-01-01 00:00,5\n2019-01-01 01:00,7\n2019-01-01 02:00,0\n";
        assert_eq!(read(text).unwrap(), vec![5, 7, 0]);
    }

    #[test]
    fn trims_whitespace() {
        let text = "time,count\na, 12 \nb,\t3\n";
        assert_eq!(read(text).unwrap(), vec![12, 3]);
    }

    #[test]
    fn extra_columns_are_ignored() {
        let text = "time,count,note\na,1,x\nb,2,y,z\n";
        assert_eq!(read(text).unwrap(), vec![1, 2]);
    }

    #[test]
    fn header_only_is_empty() {
        assert!(read("time,count\n").unwrap().is_empty());
        assert!(read("").unwrap().is_empty());
    }

    #[test]
    fn missing_column_names_the_line() {
        let text = "time,count\na,1\nb\n";
        let err = read(text).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { line: 3, column: 1 }), "{err:?}");
    }

    #[test]
    fn non_numeric_count_is_rejected() {
        let text = "time,count\na,1\nb,n/a\n";
        match read(text).unwrap_err() {
            Error::InvalidCount { line, column, value } => {
                assert_eq!(line, 3);
                assert_eq!(column, 1);
                assert_eq!(value, "n/a");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn negative_count_is_rejected() {
        let err = read("time,count\na,-4\n").unwrap_err();
        assert!(matches!(err, Error::InvalidCount { .. }));
    }

    #[test]
    fn headerless_input_and_other_column() {
        let config = DataConfig {
            count_column: 0,
            has_header: false,
            ..DataConfig::default()
        };
        let counts = read_counts("4,x\n9,y\n".as_bytes(), &config).unwrap();
        assert_eq!(counts, vec![4, 9]);
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "time,count").unwrap();
        for i in 0..48 {
            writeln!(file, "h{i},{}", i % 5).unwrap();
        }
        file.flush().unwrap();

        let counts = load_counts(file.path(), &DataConfig::default()).unwrap();
        assert_eq!(counts.len(), 48);
        assert_eq!(counts[7], 2);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = load_counts(Path::new("/definitely/not/here.csv"), &DataConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
        assert_eq!(err.category(), rf_common::ErrorCategory::Io);
    }
}
