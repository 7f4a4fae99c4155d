use scrapecore::{GraphError, SynthesisError, TaskType};
use scraperuntime::parse_workflow_response;

const TWO_NODE_PAYLOAD: &str = r#"{
  "nodes": [
    {"id": "n1", "data": {"type": "LAUNCH_BROWSER", "inputs": {"Website Url": "https://example.com"}}, "position": {"x": 0, "y": 0}},
    {"id": "n2", "data": {"type": "PAGE_TO_HTML", "inputs": {}}, "position": {"x": 0, "y": 150}}
  ],
  "edges": [
    {"source": "n1", "target": "n2", "sourceHandle": "Web page", "targetHandle": "Web page"}
  ]
}"#;

#[test]
fn parses_json_embedded_in_prose() {
    let text = format!(
        "Sure! Here is a workflow that scrapes the page:\n```json\n{}\n```\nLet me know if you want changes.",
        TWO_NODE_PAYLOAD
    );
    let synthesized = parse_workflow_response(&text, false).unwrap();
    let graph = synthesized.graph;

    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.nodes[0].task, TaskType::LaunchBrowser);
    assert_eq!(
        graph.nodes[0].inputs["Website Url"],
        "https://example.com"
    );
}

#[test]
fn model_node_ids_are_replaced_consistently() {
    let graph = parse_workflow_response(TWO_NODE_PAYLOAD, false)
        .unwrap()
        .graph;

    // Edges follow the freshly minted ids, never the model's.
    let edge = &graph.edges[0];
    assert_eq!(edge.source, graph.nodes[0].id);
    assert_eq!(edge.target, graph.nodes[1].id);

    let again = parse_workflow_response(TWO_NODE_PAYLOAD, false)
        .unwrap()
        .graph;
    assert_ne!(graph.nodes[0].id, again.nodes[0].id);
}

#[test]
fn wrapped_workflow_with_explanation() {
    let text = format!(
        r#"{{"explanation": "Opens the page and grabs its HTML.", "workflow": {}}}"#,
        TWO_NODE_PAYLOAD
    );
    let synthesized = parse_workflow_response(&text, false).unwrap();

    assert_eq!(
        synthesized.explanation.as_deref(),
        Some("Opens the page and grabs its HTML.")
    );
    assert_eq!(synthesized.graph.nodes.len(), 2);
}

#[test]
fn single_entry_node_needs_no_edges() {
    let text = r#"{"nodes": [{"id": "a", "data": {"type": "LAUNCH_BROWSER", "inputs": {"Website Url": "https://example.com"}}}]}"#;
    let graph = parse_workflow_response(text, false).unwrap().graph;

    assert_eq!(graph.nodes.len(), 1);
    assert!(graph.edges.is_empty());
}

#[test]
fn unknown_task_type_is_surfaced() {
    let text = r#"{"nodes": [{"id": "a", "data": {"type": "LAUNCH", "inputs": {}}}]}"#;
    match parse_workflow_response(text, false).unwrap_err() {
        SynthesisError::Invalid(GraphError::UnknownTaskType(name)) => assert_eq!(name, "LAUNCH"),
        other => panic!("expected UnknownTaskType, got {other:?}"),
    }
}

#[test]
fn unbalanced_braces_mean_still_streaming() {
    let text = r#"{"nodes": [{"id": "a", "data": {"type": "LAUNCH_BROWSER""#;
    assert_eq!(
        parse_workflow_response(text, true).unwrap_err(),
        SynthesisError::StillStreaming
    );

    // The same text as a finished response is just malformed.
    assert!(matches!(
        parse_workflow_response(text, false).unwrap_err(),
        SynthesisError::NoJsonFound | SynthesisError::MalformedJson(_)
    ));
}

#[test]
fn text_without_json_is_rejected() {
    assert_eq!(
        parse_workflow_response("I could not produce a workflow, sorry.", false).unwrap_err(),
        SynthesisError::NoJsonFound
    );
}

#[test]
fn malformed_json_is_rejected() {
    let text = r#"{"nodes": [}]}"#;
    assert!(matches!(
        parse_workflow_response(text, false).unwrap_err(),
        SynthesisError::MalformedJson(_)
    ));
}

#[test]
fn non_workflow_object_is_rejected() {
    assert_eq!(
        parse_workflow_response(r#"{"answer": 42}"#, false).unwrap_err(),
        SynthesisError::InvalidShape
    );
}

#[test]
fn edges_without_handles_fall_back_to_positional_chaining() {
    let text = r#"{
      "nodes": [
        {"id": "a", "data": {"type": "LAUNCH_BROWSER", "inputs": {"Website Url": "https://example.com"}}},
        {"id": "b", "data": {"type": "PAGE_TO_HTML", "inputs": {}}},
        {"id": "c", "data": {"type": "EXTRACT_TEXT_FROM_ELEMENT", "inputs": {"Selector": "h1"}}}
      ],
      "edges": [
        {"source": "a", "target": "b"}
      ]
    }"#;
    let graph = parse_workflow_response(text, false).unwrap().graph;

    assert_eq!(graph.edges.len(), 2);
    assert_eq!(graph.edges[0].source_handle, "Web page");
    assert_eq!(graph.edges[0].target_handle, "Web page");
    assert_eq!(graph.edges[1].source_handle, "Html");
    assert_eq!(graph.edges[1].target_handle, "Html");
}

#[test]
fn edges_to_unknown_nodes_fall_back_to_positional_chaining() {
    let text = r#"{
      "nodes": [
        {"id": "a", "data": {"type": "LAUNCH_BROWSER", "inputs": {"Website Url": "https://example.com"}}},
        {"id": "b", "data": {"type": "PAGE_TO_HTML", "inputs": {}}}
      ],
      "edges": [
        {"source": "a", "target": "ghost", "sourceHandle": "Web page", "targetHandle": "Web page"}
      ]
    }"#;
    let graph = parse_workflow_response(text, false).unwrap().graph;

    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].source, graph.nodes[0].id);
    assert_eq!(graph.edges[0].target, graph.nodes[1].id);
}

#[test]
fn synthesized_graph_is_validated() {
    // Structurally fine JSON, but no entry point task.
    let text = r#"{"nodes": [{"id": "a", "data": {"type": "PAGE_TO_HTML", "inputs": {}}}]}"#;
    assert_eq!(
        parse_workflow_response(text, false).unwrap_err(),
        SynthesisError::Invalid(GraphError::NoEntryPoint)
    );
}

#[test]
fn scalar_inputs_are_coerced_to_strings() {
    let text = r#"{"nodes": [{"id": "a", "data": {"type": "LAUNCH_BROWSER", "inputs": {"Website Url": "https://example.com", "retries": 3, "fast": true, "skip": null}}}]}"#;
    let graph = parse_workflow_response(text, false).unwrap().graph;
    let inputs = &graph.nodes[0].inputs;

    assert_eq!(inputs["retries"], "3");
    assert_eq!(inputs["fast"], "true");
    assert!(!inputs.contains_key("skip"));
}
