use actix_cors::Cors;
use actix_web::{
    get, post, web, App, HttpResponse, HttpServer, Responder, Result as ActixResult,
};
use actix_ws::Message;
use scrapecore::{ExecutionTrigger, Graph, GraphId, PhaseId, TaskType};
use scraperuntime::{
    parse_workflow_response, MemoryCredentialStore, MemoryStore, RuntimeConfig, SynthesizedWorkflow,
    WorkflowRuntime,
};
use scrapetasks::TaskRunner;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

const WS_HEARTBEAT: Duration = Duration::from_secs(30);

/// Application state shared across handlers
struct AppState {
    runtime: Arc<WorkflowRuntime>,
    workflows: Arc<RwLock<HashMap<GraphId, Graph>>>,
}

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    #[serde(default)]
    credit_budget: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SynthesisRequest {
    text: String,
    #[serde(default)]
    streaming: bool,
}

#[derive(Debug, Serialize)]
struct WorkflowResponse {
    id: Uuid,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "scrapeflow"
    }))
}

/// Task catalog: everything the editor needs to render nodes.
#[get("/api/tasks")]
async fn list_tasks() -> ActixResult<impl Responder> {
    let tasks: Vec<_> = TaskType::ALL.iter().map(|t| t.descriptor()).collect();
    Ok(HttpResponse::Ok().json(tasks))
}

/// List all workflows
#[get("/api/workflows")]
async fn list_workflows(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    let workflows = data.workflows.read().await;
    let workflow_list: Vec<_> = workflows
        .values()
        .map(|w| {
            serde_json::json!({
                "id": w.id,
                "name": w.name,
                "description": w.description,
                "nodes": w.nodes.len(),
                "edges": w.edges.len(),
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(workflow_list))
}

/// Create a new workflow
#[post("/api/workflows")]
async fn create_workflow(
    data: web::Data<AppState>,
    workflow: web::Json<Graph>,
) -> ActixResult<impl Responder> {
    let workflow = workflow.into_inner();
    let workflow_id = workflow.id;

    info!("Creating workflow: {} ({})", workflow.name, workflow_id);
    data.workflows.write().await.insert(workflow_id, workflow);

    Ok(HttpResponse::Created().json(WorkflowResponse {
        id: workflow_id,
        message: "Workflow created successfully".to_string(),
    }))
}

/// Get a specific workflow
#[get("/api/workflows/{id}")]
async fn get_workflow(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let workflows = data.workflows.read().await;

    match workflows.get(&workflow_id) {
        Some(workflow) => Ok(HttpResponse::Ok().json(workflow)),
        None => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("Workflow {} not found", workflow_id),
        })),
    }
}

/// Delete a workflow
#[actix_web::delete("/api/workflows/{id}")]
async fn delete_workflow(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let mut workflows = data.workflows.write().await;

    match workflows.remove(&workflow_id) {
        Some(_) => {
            info!("Deleted workflow: {}", workflow_id);
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "message": "Workflow deleted successfully"
            })))
        }
        None => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("Workflow {} not found", workflow_id),
        })),
    }
}

/// Compile a workflow into its phase plan without running it.
#[post("/api/workflows/{id}/plan")]
async fn plan_workflow(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let workflows = data.workflows.read().await;
    let Some(workflow) = workflows.get(&workflow_id) else {
        return Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("Workflow {} not found", workflow_id),
        }));
    };

    match data.runtime.plan(workflow) {
        Ok(plan) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "phases": plan.phases,
            "total_credits": plan.total_credits(workflow),
        }))),
        Err(e) => Ok(HttpResponse::UnprocessableEntity().json(ErrorResponse {
            error: e.to_string(),
        })),
    }
}

/// Start executing a workflow in the background.
#[post("/api/workflows/{id}/execute")]
async fn execute_workflow(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<ExecuteRequest>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let Some(workflow) = data.workflows.read().await.get(&workflow_id).cloned() else {
        return Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("Workflow {} not found", workflow_id),
        }));
    };

    info!("Executing workflow: {}", workflow_id);
    match data
        .runtime
        .start(workflow, ExecutionTrigger::Manual, req.credit_budget)
        .await
    {
        Ok(execution_id) => Ok(HttpResponse::Accepted().json(serde_json::json!({
            "execution_id": execution_id,
        }))),
        Err(e) => {
            error!("Workflow {} rejected: {}", workflow_id, e);
            Ok(HttpResponse::UnprocessableEntity().json(ErrorResponse {
                error: e.to_string(),
            }))
        }
    }
}

/// Fetch an execution with its phases and logs.
#[get("/api/executions/{id}")]
async fn get_execution(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<impl Responder> {
    let execution_id = path.into_inner();
    match data.runtime.get(execution_id).await {
        Ok(Some(record)) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "execution": record.execution,
            "phases": record.phases,
        }))),
        Ok(None) => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("Execution {} not found", execution_id),
        })),
        Err(e) => Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: e.to_string(),
        })),
    }
}

/// Request a cooperative stop. Safe to call repeatedly.
#[post("/api/executions/{id}/stop")]
async fn stop_execution(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<impl Responder> {
    let execution_id = path.into_inner();
    match data.runtime.stop(execution_id).await {
        Ok(status) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "execution_id": execution_id,
            "status": status,
        }))),
        Err(e) => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: e.to_string(),
        })),
    }
}

/// Synthesize a workflow graph from model-generated text.
#[post("/api/ai/workflow")]
async fn synthesize_workflow(
    data: web::Data<AppState>,
    req: web::Json<SynthesisRequest>,
) -> ActixResult<impl Responder> {
    let req = req.into_inner();
    match parse_workflow_response(&req.text, req.streaming) {
        Ok(SynthesizedWorkflow { graph, explanation }) => {
            let graph_id = graph.id;
            data.workflows.write().await.insert(graph_id, graph.clone());
            info!("Synthesized workflow {} from AI response", graph_id);
            Ok(HttpResponse::Created().json(serde_json::json!({
                "workflow": graph,
                "explanation": explanation,
            })))
        }
        Err(scrapecore::SynthesisError::StillStreaming) => {
            Ok(HttpResponse::Accepted().json(serde_json::json!({
                "status": "streaming"
            })))
        }
        Err(e) => Ok(HttpResponse::UnprocessableEntity().json(ErrorResponse {
            error: e.to_string(),
        })),
    }
}

/// WebSocket endpoint streaming one phase's logs live.
#[get("/api/phases/{id}/logs/ws")]
async fn phase_log_stream(
    req: actix_web::HttpRequest,
    stream: web::Payload,
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let phase_id: PhaseId = path.into_inner();
    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    info!("Log stream client connected for phase {}", phase_id);
    let hub = data.runtime.hub();
    let mut entries = hub.subscribe(phase_id).await;

    actix_web::rt::spawn(async move {
        let mut heartbeat = tokio::time::interval(WS_HEARTBEAT);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                entry = entries.recv() => {
                    match entry {
                        Ok(entry) => {
                            if let Ok(json) = serde_json::to_string(&entry) {
                                if session.text(json).await.is_err() {
                                    break;
                                }
                            }
                        }
                        // A lagged receiver just skips entries; the durable
                        // copy on the phase record stays complete.
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }

                _ = heartbeat.tick() => {
                    if session.ping(b"").await.is_err() {
                        break;
                    }
                }

                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }

                else => break,
            }
        }

        info!("Log stream client disconnected for phase {}", phase_id);
        // Without this, a phase watched to the end of its run would keep
        // its channel alive forever: no further publish will ever arrive
        // to notice the dead receivers.
        drop(entries);
        hub.prune(phase_id).await;
        let _ = session.close(None).await;
    });

    Ok(res)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("🚀 Starting ScrapeFlow Server");

    let store = Arc::new(MemoryStore::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
        credentials.insert("openrouter", key).await;
        info!("Registered 'openrouter' credential from environment");
    }

    let runtime = WorkflowRuntime::new(
        store,
        credentials,
        Arc::new(TaskRunner::new()),
        RuntimeConfig::default(),
    );

    info!("✅ Runtime initialized with built-in task library");

    let app_state = web::Data::new(AppState {
        runtime: Arc::new(runtime),
        workflows: Arc::new(RwLock::new(HashMap::new())),
    });

    let bind_address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    info!("🌐 Server starting on http://{}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .service(health_check)
            .service(list_tasks)
            .service(list_workflows)
            .service(create_workflow)
            .service(get_workflow)
            .service(delete_workflow)
            .service(plan_workflow)
            .service(execute_workflow)
            .service(get_execution)
            .service(stop_execution)
            .service(synthesize_workflow)
            .service(phase_log_stream)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
