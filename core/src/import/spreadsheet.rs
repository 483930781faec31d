//! Spreadsheet workbooks (xlsx, xls, xlsm, xlsb, ods)
//!
//! Only the first worksheet is read. Cells are stringified, empty cells
//! become empty strings.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use super::case_from_row;
use crate::error::{GardenError, Result};
use crate::types::TestCase;

pub fn parse(content: &[u8]) -> Result<Vec<TestCase>> {
    let cursor = Cursor::new(content.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| GardenError::parse(format!("failed to open workbook: {}", e)))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range
            .map_err(|e| GardenError::parse(format!("failed to read first worksheet: {}", e)))?,
        None => return Ok(Vec::new()),
    };

    Ok(rows_to_cases(range.rows().map(|row| row.iter().map(cell_text).collect())))
}

/// Header-skipping conversion shared with tests
fn rows_to_cases<I>(rows: I) -> Vec<TestCase>
where
    I: Iterator<Item = Vec<String>>,
{
    rows.skip(1)
        .filter_map(|row| case_from_row(row.iter()))
        .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}
