//! Daybook HTTP transport
//!
//! Receives raw text plus user/thread ids, runs one turn through the
//! controller, and returns the response message. Turns for the same thread
//! are serialized; distinct threads run concurrently with isolated state.
//!
//! Run with: daybook-server

use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use daybook::agent::TurnController;
use daybook::config::Settings;
use daybook::llm::OpenAiChat;
use daybook::storage::{SqliteRecordStore, Storage};
use daybook::sync::create_document_sync;

#[derive(Parser, Debug)]
#[command(name = "daybook-server")]
#[command(about = "Daybook conversational logging server")]
#[command(version)]
struct Args {
    /// Database path (defaults to the platform data directory)
    #[arg(long, env = "DAYBOOK_DB_PATH")]
    db_path: Option<String>,

    /// Address to listen on
    #[arg(long, env = "DAYBOOK_BIND", default_value = "127.0.0.1:8787")]
    bind: String,
}

struct AppState {
    controller: TurnController,
    storage: Arc<Storage>,
    /// One guard per thread id; a thread's turns must run sequentially.
    thread_locks: DashMap<String, Arc<Mutex<()>>>,
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    user_id: String,
    /// Defaults to the user id when the transport has no thread concept
    #[serde(default)]
    thread_id: Option<String>,
    text: String,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    response: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let mut settings = Settings::from_env().context("loading settings")?;
    if let Some(db_path) = args.db_path {
        settings.db_path = shellexpand::tilde(&db_path).to_string();
    }

    let storage = Arc::new(Storage::open(&settings.db_path).context("opening database")?);
    let llm = Arc::new(OpenAiChat::from_settings(&settings).context("configuring chat model")?);
    let records = Arc::new(SqliteRecordStore::new(storage.clone()));
    let documents = create_document_sync(&settings.notion);
    let controller = TurnController::new(
        llm,
        records,
        documents,
        settings.max_clarification_turns,
    );

    let app_state = Arc::new(AppState {
        controller,
        storage,
        thread_locks: DashMap::new(),
    });

    let app = Router::new()
        .route("/message", post(message_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    tracing::info!(bind = %args.bind, "daybook server listening");
    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": daybook::VERSION,
    }))
}

async fn message_handler(
    State(app): State<Arc<AppState>>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let thread_id = request
        .thread_id
        .clone()
        .unwrap_or_else(|| request.user_id.clone());

    let turn_id = uuid::Uuid::new_v4();
    tracing::info!(%turn_id, %thread_id, user_id = %request.user_id, "turn started");

    let lock = app
        .thread_locks
        .entry(thread_id.clone())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone();
    let _turn_guard = lock.lock().await;

    let mut state = app
        .storage
        .load_conversation_state(&thread_id)
        .map_err(internal_error)?
        .unwrap_or_default();

    let response = app
        .controller
        .handle_turn(&mut state, &request.user_id, &request.text)
        .await
        .map_err(internal_error)?;

    app.storage
        .save_conversation_state(&thread_id, &state)
        .map_err(internal_error)?;

    Ok(Json(MessageResponse { response }))
}

fn internal_error(err: daybook::DaybookError) -> (StatusCode, String) {
    tracing::error!(%err, "turn failed");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
