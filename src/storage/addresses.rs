use std::collections::HashSet;
use std::path::Path;

use csv::ReaderBuilder;

use crate::errors::StorageError;

pub const ADDRESS_COLUMN: &str = "address";

/// Read wallet addresses from the `address` column of a CSV file.
///
/// Values are trimmed, blanks dropped, duplicates removed keeping the first
/// occurrence. A missing file is an error: the run has nothing to do.
pub fn load_addresses(path: &Path) -> Result<Vec<String>, StorageError> {
    let file = std::fs::File::open(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let csv_err = |source| StorageError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);
    let column = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(ADDRESS_COLUMN))
        .ok_or_else(|| StorageError::MissingColumn {
            path: path.to_path_buf(),
            column: ADDRESS_COLUMN,
        })?;

    let mut seen = HashSet::new();
    let mut addresses = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let Some(address) = record.get(column).map(str::trim) else {
            continue;
        };
        if address.is_empty() {
            continue;
        }
        if seen.insert(address.to_string()) {
            addresses.push(address.to_string());
        }
    }

    tracing::info!(path = %path.display(), count = addresses.len(), "Loaded wallet addresses");
    Ok(addresses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_trims_drops_blanks_and_dedupes() {
        let file = csv_file("label,address\nfirst, AAA \nblank,\nsecond,BBB\nagain,AAA\nshort\n");
        let addresses = load_addresses(file.path()).unwrap();
        assert_eq!(addresses, vec!["AAA".to_string(), "BBB".to_string()]);
    }

    #[test]
    fn test_missing_column() {
        let file = csv_file("wallet\nAAA\n");
        let err = load_addresses(file.path()).unwrap_err();
        assert!(matches!(err, StorageError::MissingColumn { column: "address", .. }));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_addresses(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }
}
