//! Test case import
//!
//! Turns a tabular file into an ordered list of [`TestCase`]s and splits it
//! into a training prefix and a testing remainder.
//!
//! # Formats
//!
//! - **Delimited**: CSV-like text, delimiter detected from the header line
//! - **Spreadsheet**: first worksheet of an xlsx/xls/xlsm/ods workbook
//! - **JSON rows**: an array of row arrays, header first
//!
//! In every format the header row is skipped, the first column becomes the
//! user prompt, the second the expected output, and rows with fewer than two
//! columns are ignored.

pub mod delimited;
pub mod json_rows;
pub mod spreadsheet;

use std::path::Path;
use std::str::FromStr;

use crate::error::{GardenError, Result};
use crate::types::{CaseSplit, TestCase};

/// Encodings a case file may arrive in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Delimited,
    Spreadsheet,
    JsonRows,
}

impl ImportFormat {
    /// Infer the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" | "tsv" | "txt" => Ok(Self::Delimited),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Ok(Self::Spreadsheet),
            "json" => Ok(Self::JsonRows),
            other => Err(GardenError::parse(format!(
                "cannot infer import format from extension '{}' (expected csv, xlsx, xls, ods or json)",
                other
            ))),
        }
    }
}

impl FromStr for ImportFormat {
    type Err = GardenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" | "tsv" | "delimited" | "text" => Ok(Self::Delimited),
            "xlsx" | "xls" | "ods" | "excel" | "spreadsheet" => Ok(Self::Spreadsheet),
            "json" | "json-rows" => Ok(Self::JsonRows),
            _ => Err(GardenError::parse(format!("unknown import format: {}", s))),
        }
    }
}

impl std::fmt::Display for ImportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportFormat::Delimited => write!(f, "delimited text"),
            ImportFormat::Spreadsheet => write!(f, "spreadsheet"),
            ImportFormat::JsonRows => write!(f, "JSON rows"),
        }
    }
}

/// Parse every data row of `content` into test cases, in file order
pub fn parse_cases(content: &[u8], format: ImportFormat) -> Result<Vec<TestCase>> {
    match format {
        ImportFormat::Delimited => delimited::parse(content),
        ImportFormat::Spreadsheet => spreadsheet::parse(content),
        ImportFormat::JsonRows => json_rows::parse(content),
    }
}

/// Parse `content` and split it into training and testing sets
pub fn import(content: &[u8], format: ImportFormat, training_count: usize) -> Result<CaseSplit> {
    if training_count == 0 {
        return Err(GardenError::invalid_state(
            "at least one case must be reserved for training",
        ));
    }
    let cases = parse_cases(content, format)?;
    let split = split(cases, training_count)?;
    crate::info_log!(
        "Imported {} {} cases ({} training, {} testing)",
        split.total(),
        format,
        split.training.len(),
        split.testing.len()
    );
    Ok(split)
}

/// Read a case file from disk, inferring the format unless one is given
pub async fn import_file(
    path: &Path,
    format: Option<ImportFormat>,
    training_count: usize,
) -> Result<CaseSplit> {
    let format = match format {
        Some(format) => format,
        None => ImportFormat::from_path(path)?,
    };
    let content = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => GardenError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => GardenError::Io(e),
    })?;
    import(&content, format, training_count)
}

/// Rows `[0, training_count)` train, the remainder test
pub fn split(mut cases: Vec<TestCase>, training_count: usize) -> Result<CaseSplit> {
    if cases.is_empty() {
        return Err(GardenError::EmptyDataset);
    }
    if cases.len() < training_count {
        return Err(GardenError::InsufficientData {
            available: cases.len(),
            requested: training_count,
        });
    }
    let testing = cases.split_off(training_count);
    Ok(CaseSplit {
        training: cases,
        testing,
    })
}

/// Build a case from the first two cells of a row, if it has two
pub(crate) fn case_from_row<I, S>(row: I) -> Option<TestCase>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut cells = row.into_iter();
    let prompt = cells.next()?;
    let expected = cells.next()?;
    Some(TestCase::new(
        prompt.as_ref().trim(),
        expected.as_ref().trim(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_skipped_and_split() {
        let content = b"prompt,output\na,b\nc,d\n";
        let split = import(content, ImportFormat::Delimited, 1).unwrap();
        assert_eq!(split.training, vec![TestCase::new("a", "b")]);
        assert_eq!(split.testing, vec![TestCase::new("c", "d")]);
    }

    #[test]
    fn test_split_preserves_total_and_order() {
        let cases: Vec<TestCase> = (0..5)
            .map(|i| TestCase::new(format!("p{}", i), format!("o{}", i)))
            .collect();
        let split = split(cases.clone(), 3).unwrap();
        assert_eq!(split.total(), 5);
        assert_eq!(split.training, cases[..3].to_vec());
        assert_eq!(split.testing, cases[3..].to_vec());
    }

    #[test]
    fn test_all_rows_for_training() {
        let split = import(b"h1,h2\nx,y\n", ImportFormat::Delimited, 1).unwrap();
        assert_eq!(split.training.len(), 1);
        assert!(split.testing.is_empty());
    }

    #[test]
    fn test_insufficient_data() {
        let err = import(b"prompt,output\na,b\n", ImportFormat::Delimited, 2).unwrap_err();
        assert!(matches!(
            err,
            GardenError::InsufficientData {
                available: 1,
                requested: 2
            }
        ));
    }

    #[test]
    fn test_empty_dataset() {
        let err = import(b"prompt,output\n", ImportFormat::Delimited, 1).unwrap_err();
        assert!(matches!(err, GardenError::EmptyDataset));

        let err = import(b"", ImportFormat::Delimited, 1).unwrap_err();
        assert!(matches!(err, GardenError::EmptyDataset));
    }

    #[test]
    fn test_zero_training_count_rejected() {
        let err = import(b"p,o\na,b\n", ImportFormat::Delimited, 0).unwrap_err();
        assert!(matches!(err, GardenError::InvalidState { .. }));
    }

    #[test]
    fn test_format_inference() {
        assert_eq!(
            ImportFormat::from_path(Path::new("cases.CSV")).unwrap(),
            ImportFormat::Delimited
        );
        assert_eq!(
            ImportFormat::from_path(Path::new("cases.xlsx")).unwrap(),
            ImportFormat::Spreadsheet
        );
        assert_eq!(
            ImportFormat::from_path(Path::new("cases.json")).unwrap(),
            ImportFormat::JsonRows
        );
        assert!(ImportFormat::from_path(Path::new("cases.pdf")).is_err());
        assert!(ImportFormat::from_path(Path::new("cases")).is_err());
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("CSV".parse::<ImportFormat>().unwrap(), ImportFormat::Delimited);
        assert_eq!("excel".parse::<ImportFormat>().unwrap(), ImportFormat::Spreadsheet);
        assert!("yaml".parse::<ImportFormat>().is_err());
    }

    #[tokio::test]
    async fn test_import_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.csv");
        std::fs::write(&path, "prompt;output\nsum 1 and 2;3\nsum 2 and 2;4\n").unwrap();

        let split = import_file(&path, None, 1).await.unwrap();
        assert_eq!(split.training, vec![TestCase::new("sum 1 and 2", "3")]);
        assert_eq!(split.testing, vec![TestCase::new("sum 2 and 2", "4")]);

        let missing = import_file(&dir.path().join("nope.csv"), None, 1).await;
        assert!(matches!(missing, Err(GardenError::FileNotFound { .. })));
    }
}
