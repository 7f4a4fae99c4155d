// crates/scrapecli/src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use scrapecore::{ExecutionTrigger, Graph, LogLevel, NodeSpec, TaskType};
use scraperuntime::{
    build_plan, MemoryCredentialStore, MemoryStore, RuntimeConfig, WorkflowRuntime,
};
use scrapetasks::TaskRunner;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "scrapeflow")]
#[command(about = "ScrapeFlow workflow CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Credit budget for the execution
        #[arg(short, long)]
        budget: Option<u32>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// Show the phase plan for a workflow file
    Plan {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available task types
    Tasks,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            budget,
            verbose,
        } => {
            let level = if verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::WARN
            };
            tracing_subscriber::fmt().with_max_level(level).init();

            run_workflow(file, budget).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(file)?;
        }

        Commands::Plan { file } => {
            plan_workflow(file)?;
        }

        Commands::Tasks => {
            list_tasks();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

fn load_graph(file: &PathBuf) -> Result<Graph> {
    let json = std::fs::read_to_string(file)?;
    Ok(serde_json::from_str(&json)?)
}

async fn run_workflow(file: PathBuf, budget: Option<u32>) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let graph = load_graph(&file)?;
    println!("📋 Workflow: {}", graph.name);
    println!("   Nodes: {}", graph.nodes.len());
    println!("   Edges: {}", graph.edges.len());
    println!();

    let store = Arc::new(MemoryStore::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
        credentials.insert("openrouter", key).await;
    }

    let runtime = WorkflowRuntime::new(
        store,
        credentials,
        Arc::new(TaskRunner::new()),
        RuntimeConfig::default(),
    );

    let outcome = runtime
        .run_to_completion(graph, ExecutionTrigger::Manual, budget)
        .await?;

    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", outcome.execution_id);
    println!("   Status: {:?}", outcome.status);
    println!("   Credits consumed: {}", outcome.credits_consumed);
    if let Some(failure) = &outcome.failure {
        println!("   Failure: {}", failure);
    }

    if let Some(record) = runtime.get(outcome.execution_id).await? {
        for phase in &record.phases {
            println!();
            println!(
                "  Phase {} — {} [{:?}]",
                phase.number, phase.name, phase.status
            );
            for entry in &phase.logs {
                let icon = match entry.level {
                    LogLevel::Info => "ℹ️ ",
                    LogLevel::Success => "✅",
                    LogLevel::Warning => "⚠️ ",
                    LogLevel::Error => "❌",
                };
                println!("     {} {}", icon, entry.message);
            }
            for (handle, value) in &phase.outputs {
                let preview: String = value.chars().take(120).collect();
                println!("     📤 {}: {}", handle, preview);
            }
        }
    }

    Ok(())
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let graph = load_graph(&file)?;
    scraperuntime::validate_graph(&graph)?;

    println!("✅ Workflow is valid:");
    println!("   Name: {}", graph.name);
    println!("   Nodes: {}", graph.nodes.len());
    println!("   Edges: {}", graph.edges.len());

    Ok(())
}

fn plan_workflow(file: PathBuf) -> Result<()> {
    let graph = load_graph(&file)?;
    let plan = build_plan(&graph)?;

    println!("📋 Plan for {} ({} phases)", graph.name, plan.phases.len());
    println!("   Total credits: {}", plan.total_credits(&graph));
    for phase in &plan.phases {
        println!();
        println!("  Phase {}:", phase.number);
        for node_id in &phase.nodes {
            if let Some(node) = graph.find_node(*node_id) {
                let descriptor = node.task.descriptor();
                println!(
                    "    • {} ({} credits)",
                    descriptor.label, descriptor.credits
                );
            }
        }
    }

    Ok(())
}

fn list_tasks() {
    println!("📦 Available Task Types:");
    println!();

    for task in TaskType::ALL {
        let descriptor = task.descriptor();
        let entry = if descriptor.entry_point {
            " (entry point)"
        } else {
            ""
        };
        println!(
            "  • {} — {}{}, {} credits",
            task.id(),
            descriptor.label,
            entry,
            descriptor.credits
        );
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let mut graph = Graph::new("Example scrape workflow");
    graph.description = Some("Opens a page and extracts its title".to_string());

    let launch = graph.add_node(
        NodeSpec::new(TaskType::LaunchBrowser)
            .with_input("Website Url", "https://example.com")
            .with_position(0.0, 0.0),
    );
    let html = graph.add_node(NodeSpec::new(TaskType::PageToHtml).with_position(0.0, 200.0));
    let extract = graph.add_node(
        NodeSpec::new(TaskType::ExtractTextFromElement)
            .with_input("Selector", "h1")
            .with_position(0.0, 400.0),
    );

    graph.connect(launch, "Web page", html, "Web page");
    graph.connect(html, "Html", extract, "Html");

    let json = serde_json::to_string_pretty(&graph)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  scrapeflow run --file {}", output.display());

    Ok(())
}
