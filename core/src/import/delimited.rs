//! Delimited text (CSV and friends)

use csv::{ReaderBuilder, Trim};

use super::case_from_row;
use crate::error::{GardenError, Result};
use crate::types::TestCase;

/// Delimiters tried against the header line, in priority order
pub const DELIMITER_CANDIDATES: [u8; 3] = [b';', b',', b'\t'];

/// Pick the delimiter used by `header`
///
/// A semicolon anywhere in the header wins, then a comma, then a tab.
/// Defaults to a comma for single-column headers.
pub fn detect_delimiter(header: &str) -> u8 {
    DELIMITER_CANDIDATES
        .iter()
        .copied()
        .find(|d| header.as_bytes().contains(d))
        .unwrap_or(b',')
}

pub fn parse(content: &[u8]) -> Result<Vec<TestCase>> {
    let text = std::str::from_utf8(content)
        .map_err(|e| GardenError::parse(format!("file is not valid UTF-8: {}", e)))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let header = text.lines().next().unwrap_or_default();
    let delimiter = detect_delimiter(header);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut cases = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        if let Some(case) = case_from_row(record.iter()) {
            cases.push(case);
        }
    }
    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("prompt;output"), b';');
        assert_eq!(detect_delimiter("prompt,output"), b',');
        // semicolon takes priority even when commas are present
        assert_eq!(detect_delimiter("prompt, long;output"), b';');
        assert_eq!(detect_delimiter("prompt\toutput"), b'\t');
        assert_eq!(detect_delimiter("prompt"), b',');
    }

    #[test]
    fn test_semicolon_file() {
        let cases = parse(b"prompt;output\nTranslate hi; Bonjour\n").unwrap();
        assert_eq!(cases, vec![TestCase::new("Translate hi", "Bonjour")]);
    }

    #[test]
    fn test_crlf_blank_lines_and_short_rows() {
        let content = b"prompt,output\r\n\r\na,b\r\nonly-one-column\r\n   \r\nc , d ,extra\r\n";
        let cases = parse(content).unwrap();
        assert_eq!(cases, vec![TestCase::new("a", "b"), TestCase::new("c", "d")]);
    }

    #[test]
    fn test_quoted_fields_keep_delimiters() {
        let content = b"prompt,output\n\"Summarize: a, b, c\",\"a short, crisp summary\"\n";
        let cases = parse(content).unwrap();
        assert_eq!(
            cases,
            vec![TestCase::new("Summarize: a, b, c", "a short, crisp summary")]
        );
    }

    #[test]
    fn test_byte_order_mark_is_ignored() {
        let mut content = "\u{feff}prompt;output\nx;y\n".as_bytes().to_vec();
        content.extend_from_slice(b"z;w\n");
        let cases = parse(&content).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0], TestCase::new("x", "y"));
    }

    #[test]
    fn test_invalid_utf8() {
        let err = parse(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, GardenError::Parse { .. }));
    }
}
