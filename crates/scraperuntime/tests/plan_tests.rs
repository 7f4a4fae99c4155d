use scrapecore::{Edge, Graph, GraphError, NodeSpec, TaskType};
use scraperuntime::{build_plan, validate_graph};
use uuid::Uuid;

fn linear_graph() -> Graph {
    let mut graph = Graph::new("linear");
    let launch = graph.add_node(
        NodeSpec::new(TaskType::LaunchBrowser)
            .with_input("Website Url", "https://example.com")
            .with_position(0.0, 0.0),
    );
    let html = graph.add_node(NodeSpec::new(TaskType::PageToHtml).with_position(0.0, 100.0));
    let extract = graph.add_node(
        NodeSpec::new(TaskType::ExtractTextFromElement)
            .with_input("Selector", "h1")
            .with_position(0.0, 200.0),
    );
    graph.connect(launch, "Web page", html, "Web page");
    graph.connect(html, "Html", extract, "Html");
    graph
}

#[test]
fn linear_chain_compiles_to_one_phase_per_node() {
    let graph = linear_graph();
    let plan = build_plan(&graph).unwrap();

    assert_eq!(plan.phases.len(), 3);
    assert!(plan.phases.iter().all(|p| p.nodes.len() == 1));
    assert_eq!(plan.phases[0].number, 1);
    assert_eq!(plan.phases[0].nodes[0], graph.nodes[0].id);
    assert_eq!(plan.phases[2].nodes[0], graph.nodes[2].id);
    assert_eq!(plan.node_count(), 3);
    assert_eq!(plan.total_credits(&graph), 9);
}

#[test]
fn independent_nodes_share_a_phase() {
    let mut graph = Graph::new("fan out");
    let launch = graph.add_node(
        NodeSpec::new(TaskType::LaunchBrowser)
            .with_input("Website Url", "https://example.com")
            .with_position(0.0, 0.0),
    );
    let html = graph.add_node(NodeSpec::new(TaskType::PageToHtml).with_position(0.0, 100.0));
    let left = graph.add_node(
        NodeSpec::new(TaskType::ExtractTextFromElement)
            .with_input("Selector", ".title")
            .with_position(0.0, 200.0),
    );
    let right = graph.add_node(
        NodeSpec::new(TaskType::ExtractTextFromElement)
            .with_input("Selector", ".price")
            .with_position(150.0, 200.0),
    );
    graph.connect(launch, "Web page", html, "Web page");
    graph.connect(html, "Html", left, "Html");
    graph.connect(html, "Html", right, "Html");

    let plan = build_plan(&graph).unwrap();
    assert_eq!(plan.phases.len(), 3);
    assert_eq!(plan.phases[2].nodes, vec![left, right]);
}

#[test]
fn nodes_within_a_phase_are_ordered_row_major() {
    let mut graph = Graph::new("ordering");
    let launch = graph.add_node(
        NodeSpec::new(TaskType::LaunchBrowser)
            .with_input("Website Url", "https://example.com")
            .with_position(0.0, 0.0),
    );
    let html = graph.add_node(NodeSpec::new(TaskType::PageToHtml).with_position(0.0, 100.0));
    // Same row, reversed x; then a node on a lower row.
    let far = graph.add_node(
        NodeSpec::new(TaskType::ExtractTextFromElement)
            .with_input("Selector", "a")
            .with_position(300.0, 200.0),
    );
    let near = graph.add_node(
        NodeSpec::new(TaskType::ExtractTextFromElement)
            .with_input("Selector", "b")
            .with_position(100.0, 200.0),
    );
    let below = graph.add_node(
        NodeSpec::new(TaskType::ExtractTextFromElement)
            .with_input("Selector", "c")
            .with_position(0.0, 300.0),
    );
    graph.connect(launch, "Web page", html, "Web page");
    graph.connect(html, "Html", far, "Html");
    graph.connect(html, "Html", near, "Html");
    graph.connect(html, "Html", below, "Html");

    let plan = build_plan(&graph).unwrap();
    assert_eq!(plan.phases[2].nodes, vec![near, far, below]);
}

#[test]
fn planning_is_deterministic() {
    let graph = linear_graph();
    let first = build_plan(&graph).unwrap();
    let second = build_plan(&graph).unwrap();

    let nodes = |plan: &scraperuntime::ExecutionPlan| {
        plan.phases
            .iter()
            .map(|p| p.nodes.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(nodes(&first), nodes(&second));

    assert!(validate_graph(&graph).is_ok());
    assert!(validate_graph(&graph).is_ok());
}

#[test]
fn graph_without_entry_point_is_rejected() {
    let mut graph = Graph::new("no entry");
    graph.add_node(NodeSpec::new(TaskType::PageToHtml));

    assert_eq!(build_plan(&graph).unwrap_err(), GraphError::NoEntryPoint);
}

#[test]
fn dangling_edge_is_rejected() {
    let mut graph = linear_graph();
    let ghost = Uuid::new_v4();
    graph
        .edges
        .push(Edge::new(graph.nodes[0].id, "Web page", ghost, "Web page"));

    match build_plan(&graph).unwrap_err() {
        GraphError::DanglingEdge { node, .. } => assert_eq!(node, ghost.to_string()),
        other => panic!("expected DanglingEdge, got {other:?}"),
    }
}

#[test]
fn self_connection_is_rejected() {
    let mut graph = linear_graph();
    let id = graph.nodes[1].id;
    graph.edges.push(Edge::new(id, "Web page", id, "Web page"));

    assert!(matches!(
        build_plan(&graph).unwrap_err(),
        GraphError::SelfConnection { .. }
    ));
}

#[test]
fn type_mismatch_is_rejected() {
    let mut graph = Graph::new("mismatch");
    let launch = graph.add_node(
        NodeSpec::new(TaskType::LaunchBrowser).with_input("Website Url", "https://example.com"),
    );
    let extract = graph.add_node(
        NodeSpec::new(TaskType::ExtractTextFromElement).with_input("Selector", "h1"),
    );
    // BrowserInstance output into a String input.
    graph.connect(launch, "Web page", extract, "Html");

    assert!(matches!(
        build_plan(&graph).unwrap_err(),
        GraphError::TypeMismatch { .. }
    ));
}

#[test]
fn unknown_handle_is_a_type_mismatch() {
    let mut graph = Graph::new("bad handle");
    let launch = graph.add_node(
        NodeSpec::new(TaskType::LaunchBrowser).with_input("Website Url", "https://example.com"),
    );
    let html = graph.add_node(NodeSpec::new(TaskType::PageToHtml));
    graph.connect(launch, "No such output", html, "Web page");

    assert!(matches!(
        build_plan(&graph).unwrap_err(),
        GraphError::TypeMismatch { .. }
    ));
}

#[test]
fn edge_into_hidden_input_is_rejected() {
    let mut graph = Graph::new("hidden target");
    let extract = graph.add_node(
        NodeSpec::new(TaskType::ExtractTextFromElement)
            .with_input("Html", "<h1>x</h1>")
            .with_input("Selector", "h1"),
    );
    let launch = graph.add_node(
        NodeSpec::new(TaskType::LaunchBrowser).with_input("Website Url", "https://example.com"),
    );
    // Type-compatible (String to String), but the launch URL is literal-only.
    graph.connect(extract, "Extracted text", launch, "Website Url");

    match build_plan(&graph).unwrap_err() {
        GraphError::HiddenInput { input, .. } => assert_eq!(input, "Website Url"),
        other => panic!("expected HiddenInput, got {other:?}"),
    }
}

#[test]
fn cycle_is_rejected() {
    let mut graph = Graph::new("cycle");
    let launch = graph.add_node(
        NodeSpec::new(TaskType::LaunchBrowser).with_input("Website Url", "https://example.com"),
    );
    let a = graph.add_node(NodeSpec::new(TaskType::NavigateUrl).with_input("Url", "https://a"));
    let b = graph.add_node(NodeSpec::new(TaskType::NavigateUrl).with_input("Url", "https://b"));
    graph.connect(launch, "Web page", a, "Web page");
    graph.connect(a, "Web page", b, "Web page");
    graph.connect(b, "Web page", a, "Web page");

    assert_eq!(build_plan(&graph).unwrap_err(), GraphError::CyclicGraph);
}

#[test]
fn validation_does_not_mutate_the_graph() {
    let graph = linear_graph();
    let before = serde_json::to_string(&graph).unwrap();
    let _ = validate_graph(&graph);
    let after = serde_json::to_string(&graph).unwrap();
    assert_eq!(before, after);
}
