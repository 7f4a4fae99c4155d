//! JSON shuttle tasks: read a property out of a JSON payload, add one to
//! it. Values between nodes are strings, so payloads are often multiply
//! stringified; reads unwrap up to a bounded number of layers.

use crate::single;
use scraperuntime::{StepContext, StepError, StepOutputs};
use serde_json::Value;

const MAX_PARSE_ATTEMPTS: usize = 5;

pub(crate) fn read_property(step: StepContext<'_>) -> Result<StepOutputs, StepError> {
    let raw = step.require_input("JSON")?;
    let name = step.require_input("Property name")?;

    let (value, layers) = parse_nested(raw)
        .ok_or_else(|| StepError::Failed("input is not valid JSON".to_string()))?;
    if layers > 1 {
        step.logs
            .info(format!("Unwrapped {layers} layers of JSON encoding"));
    }
    let object = value
        .as_object()
        .ok_or_else(|| StepError::Failed("JSON input is not an object".to_string()))?;

    let Some(property) = object.get(name) else {
        step.logs.info(format!(
            "Available properties: {}",
            object.keys().cloned().collect::<Vec<_>>().join(", ")
        ));
        return Err(StepError::Failed(format!("property '{name}' not found")));
    };

    Ok(single("Property value", render(property)))
}

pub(crate) fn add_property(step: StepContext<'_>) -> Result<StepOutputs, StepError> {
    let raw = step.require_input("JSON")?;
    let name = step.require_input("Property name")?;
    let value = step.require_input("Property value")?;

    let mut parsed: Value = serde_json::from_str(raw)
        .map_err(|e| StepError::Failed(format!("input is not valid JSON: {e}")))?;
    let object = parsed
        .as_object_mut()
        .ok_or_else(|| StepError::Failed("JSON input is not an object".to_string()))?;
    object.insert(name.to_string(), Value::String(value.to_string()));

    let updated = serde_json::to_string(&parsed)
        .map_err(|e| StepError::Failed(format!("failed to serialize JSON: {e}")))?;
    Ok(single("Updated JSON", updated))
}

/// Parse a string that may itself contain JSON-encoded JSON, bounded so a
/// pathological payload cannot loop.
fn parse_nested(raw: &str) -> Option<(Value, usize)> {
    let mut value: Value = serde_json::from_str(raw).ok()?;
    let mut layers = 1;
    while layers < MAX_PARSE_ATTEMPTS {
        let Value::String(inner) = &value else { break };
        match serde_json::from_str(inner) {
            Ok(parsed) => {
                value = parsed;
                layers += 1;
            }
            Err(_) => break,
        }
    }
    Some((value, layers))
}

/// Strings pass through bare; everything else is re-serialized.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapecore::{LogCollector, NodeSpec, PhaseId, TaskType};
    use scraperuntime::{Environment, MemoryCredentialStore};
    use std::collections::HashMap;

    fn run(
        task: TaskType,
        pairs: &[(&str, &str)],
        f: fn(StepContext<'_>) -> Result<StepOutputs, StepError>,
    ) -> Result<StepOutputs, StepError> {
        let node = NodeSpec::new(task);
        let inputs: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut env = Environment::new(10);
        let logs = LogCollector::new(PhaseId::new_v4(), None);
        let credentials = MemoryCredentialStore::new();
        f(StepContext {
            node: &node,
            inputs: &inputs,
            env: &mut env,
            logs: &logs,
            credentials: &credentials,
        })
    }

    #[test]
    fn reads_plain_property() {
        let outputs = run(
            TaskType::ReadPropertyFromJson,
            &[("JSON", r#"{"name":"alice","age":30}"#), ("Property name", "name")],
            read_property,
        )
        .unwrap();
        assert_eq!(outputs["Property value"], "alice");
    }

    #[test]
    fn unwraps_double_stringified_json() {
        let doubly = serde_json::to_string(&r#"{"price":"42"}"#).unwrap();
        let outputs = run(
            TaskType::ReadPropertyFromJson,
            &[("JSON", doubly.as_str()), ("Property name", "price")],
            read_property,
        )
        .unwrap();
        assert_eq!(outputs["Property value"], "42");
    }

    #[test]
    fn structured_property_is_reserialized() {
        let outputs = run(
            TaskType::ReadPropertyFromJson,
            &[("JSON", r#"{"items":[1,2,3]}"#), ("Property name", "items")],
            read_property,
        )
        .unwrap();
        assert_eq!(outputs["Property value"], "[1,2,3]");
    }

    #[test]
    fn missing_property_fails() {
        let err = run(
            TaskType::ReadPropertyFromJson,
            &[("JSON", r#"{"a":1}"#), ("Property name", "b")],
            read_property,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn adds_property_to_object() {
        let outputs = run(
            TaskType::AddPropertyToJson,
            &[
                ("JSON", r#"{"a":"1"}"#),
                ("Property name", "b"),
                ("Property value", "2"),
            ],
            add_property,
        )
        .unwrap();
        let parsed: Value = serde_json::from_str(&outputs["Updated JSON"]).unwrap();
        assert_eq!(parsed["a"], "1");
        assert_eq!(parsed["b"], "2");
    }

    #[test]
    fn non_object_input_fails() {
        let err = run(
            TaskType::AddPropertyToJson,
            &[("JSON", "[1,2]"), ("Property name", "x"), ("Property value", "y")],
            add_property,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not an object"));
    }
}
