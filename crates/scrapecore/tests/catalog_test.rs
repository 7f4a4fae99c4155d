use scrapecore::{GraphError, ParamType, TaskType};
use std::collections::HashSet;
use std::str::FromStr;

#[test]
fn wire_ids_round_trip() {
    for task in TaskType::ALL {
        assert_eq!(TaskType::from_str(task.id()).unwrap(), task);
    }
}

#[test]
fn serde_uses_the_wire_id() {
    for task in TaskType::ALL {
        let json = serde_json::to_string(&task).unwrap();
        assert_eq!(json, format!("\"{}\"", task.id()));
        assert_eq!(serde_json::from_str::<TaskType>(&json).unwrap(), task);
    }
}

#[test]
fn unknown_wire_id_is_rejected() {
    assert_eq!(
        TaskType::from_str("LAUNCH").unwrap_err(),
        GraphError::UnknownTaskType("LAUNCH".to_string())
    );
}

#[test]
fn launch_browser_is_the_only_entry_point() {
    let entries: Vec<TaskType> = TaskType::ALL
        .into_iter()
        .filter(|t| t.descriptor().entry_point)
        .collect();
    assert_eq!(entries, vec![TaskType::LaunchBrowser]);
}

#[test]
fn every_task_has_a_positive_credit_cost() {
    for task in TaskType::ALL {
        assert!(task.descriptor().credits > 0, "{task} costs nothing");
    }
}

#[test]
fn handle_names_are_unique_per_side() {
    for task in TaskType::ALL {
        let descriptor = task.descriptor();
        let inputs: HashSet<&str> = descriptor.inputs.iter().map(|p| p.name).collect();
        let outputs: HashSet<&str> = descriptor.outputs.iter().map(|p| p.name).collect();
        assert_eq!(inputs.len(), descriptor.inputs.len(), "{task} inputs");
        assert_eq!(outputs.len(), descriptor.outputs.len(), "{task} outputs");
    }
}

#[test]
fn descriptor_lookups_find_declared_handles() {
    let descriptor = TaskType::ExtractTextFromElement.descriptor();
    assert_eq!(
        descriptor.input("Selector").unwrap().param_type,
        ParamType::String
    );
    assert_eq!(
        descriptor.output("Extracted text").unwrap().param_type,
        ParamType::String
    );
    assert!(descriptor.input("No such handle").is_none());
}

#[test]
fn scroll_and_translate_are_cataloged() {
    let scroll = TaskType::ScrollToElement.descriptor();
    assert_eq!(
        scroll.input("Selector").unwrap().param_type,
        ParamType::String
    );
    assert!(!scroll.entry_point);

    let translate = TaskType::TranslateText.descriptor();
    assert!(translate.input("Credentials").unwrap().hide_handle);
    assert_eq!(
        translate.output("Translated text").unwrap().param_type,
        ParamType::String
    );
}

#[test]
fn hidden_handles_never_accept_connections_by_type() {
    // Hidden inputs are literal-only; the launch URL is the canonical case.
    let launch = TaskType::LaunchBrowser.descriptor();
    let url = launch.input("Website Url").unwrap();
    assert!(url.hide_handle);
    assert!(url.required);
}
