//! CSV export. The input is usually a JSON array of flat objects; plain
//! text falls back to one row per line.

use crate::single;
use chrono::Utc;
use scraperuntime::{StepContext, StepError, StepOutputs};
use serde_json::{Map, Value};

pub(crate) fn to_csv(step: StepContext<'_>) -> Result<StepOutputs, StepError> {
    let data = step.require_input("Data")?;
    let include_metadata = step
        .input("Include metadata")
        .map(|v| v == "true")
        .unwrap_or(false);

    let mut rows = parse_rows(data);
    if rows.is_empty() {
        return Err(StepError::Failed("no data to export".to_string()));
    }

    if include_metadata {
        let exported_at = Utc::now().to_rfc3339();
        for (index, row) in rows.iter_mut().enumerate() {
            row.insert("exported_at".to_string(), Value::String(exported_at.clone()));
            row.insert("row_number".to_string(), Value::from(index as u64 + 1));
        }
    }

    // Column set comes from the first row, like a spreadsheet header.
    let headers: Vec<String> = rows[0].keys().cloned().collect();
    let mut csv = headers
        .iter()
        .map(|h| escape_field(h))
        .collect::<Vec<_>>()
        .join(",");
    for row in &rows {
        let line = headers
            .iter()
            .map(|h| escape_field(&render_cell(row.get(h))))
            .collect::<Vec<_>>()
            .join(",");
        csv.push('\n');
        csv.push_str(&line);
    }

    step.logs.info(format!(
        "Generated CSV with {} rows and {} columns",
        rows.len(),
        headers.len()
    ));
    Ok(single("Csv", csv))
}

fn parse_rows(data: &str) -> Vec<Map<String, Value>> {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::Array(items)) => items.into_iter().map(as_row).collect(),
        Ok(Value::Object(map)) => vec![map],
        Ok(other) => vec![as_row(other)],
        Err(_) => data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(index, line)| {
                let mut row = Map::new();
                row.insert("id".to_string(), Value::from(index as u64 + 1));
                row.insert("content".to_string(), Value::String(line.to_string()));
                row
            })
            .collect(),
    }
}

fn as_row(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            let mut row = Map::new();
            row.insert("value".to_string(), other);
            row
        }
    }
}

fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Quote a field when it contains a comma, quote, or newline; embedded
/// quotes are doubled.
fn escape_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapecore::{LogCollector, NodeSpec, PhaseId, TaskType};
    use scraperuntime::Environment;
    use scraperuntime::MemoryCredentialStore;
    use std::collections::HashMap;

    fn run_export(data: &str, metadata: Option<&str>) -> Result<StepOutputs, StepError> {
        let node = NodeSpec::new(TaskType::ExportToCsv);
        let mut inputs = HashMap::from([("Data".to_string(), data.to_string())]);
        if let Some(metadata) = metadata {
            inputs.insert("Include metadata".to_string(), metadata.to_string());
        }
        let mut env = Environment::new(10);
        let logs = LogCollector::new(PhaseId::new_v4(), None);
        let credentials = MemoryCredentialStore::new();
        to_csv(StepContext {
            node: &node,
            inputs: &inputs,
            env: &mut env,
            logs: &logs,
            credentials: &credentials,
        })
    }

    #[test]
    fn exports_json_array() {
        let outputs =
            run_export(r#"[{"name":"a","price":"1"},{"name":"b","price":"2"}]"#, None).unwrap();
        let csv = &outputs["Csv"];
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec!["name,price", "a,1", "b,2"]);
    }

    #[test]
    fn quotes_fields_with_commas_and_quotes() {
        let outputs = run_export(r#"[{"title":"a, \"quoted\" title"}]"#, None).unwrap();
        let csv = &outputs["Csv"];
        assert_eq!(csv.lines().nth(1), Some("\"a, \"\"quoted\"\" title\""));
    }

    #[test]
    fn plain_text_becomes_one_row_per_line() {
        let outputs = run_export("first\n\nsecond\n", None).unwrap();
        let csv = &outputs["Csv"];
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec!["content,id", "first,1", "second,2"]);
    }

    #[test]
    fn metadata_adds_columns() {
        let outputs = run_export(r#"[{"name":"a"}]"#, Some("true")).unwrap();
        let header = outputs["Csv"].lines().next().unwrap().to_string();
        assert!(header.contains("exported_at"));
        assert!(header.contains("row_number"));
    }

    #[test]
    fn empty_input_fails() {
        let err = run_export("   \n  ", None).unwrap_err();
        assert!(err.to_string().contains("no data"));
    }
}
