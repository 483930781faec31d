//! JSON row arrays: `[["prompt", "output"], ["a", "b"], ...]`

use serde_json::Value;

use super::case_from_row;
use crate::error::{GardenError, Result};
use crate::types::TestCase;

pub fn parse(content: &[u8]) -> Result<Vec<TestCase>> {
    let value: Value = serde_json::from_slice(content)
        .map_err(|e| GardenError::parse(format!("invalid JSON: {}", e)))?;

    let rows = match value {
        Value::Array(rows) => rows,
        _ => return Err(GardenError::parse("expected a JSON array of rows")),
    };

    Ok(rows
        .iter()
        .skip(1)
        .filter_map(|row| match row {
            Value::Array(cells) => case_from_row(cells.iter().map(cell_text)),
            _ => None,
        })
        .collect())
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rows() {
        let content = br#"[
            ["prompt", "output"],
            ["double 2", 4],
            ["nothing", null],
            ["short"],
            "not a row",
            ["flag", true, "extra"]
        ]"#;
        let cases = parse(content).unwrap();
        assert_eq!(
            cases,
            vec![
                TestCase::new("double 2", "4"),
                TestCase::new("nothing", ""),
                TestCase::new("flag", "true"),
            ]
        );
    }

    #[test]
    fn test_rejects_non_array() {
        assert!(matches!(
            parse(br#"{"rows": []}"#),
            Err(GardenError::Parse { .. })
        ));
        assert!(matches!(parse(b"[1, 2"), Err(GardenError::Parse { .. })));
    }
}
