//! Daybook CLI
//!
//! Chat against a local database from the terminal, or inspect what has
//! been logged.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use daybook::agent::{ConversationState, TurnController};
use daybook::config::Settings;
use daybook::llm::OpenAiChat;
use daybook::storage::{RecordStore, SqliteRecordStore, Storage};
use daybook::sync::create_document_sync;

#[derive(Parser)]
#[command(name = "daybook")]
#[command(about = "Conversational wellness logging")]
#[command(version)]
struct Cli {
    /// Database path (defaults to the platform data directory)
    #[arg(long, env = "DAYBOOK_DB_PATH")]
    db_path: Option<String>,

    /// User id records are logged under
    #[arg(long, env = "DAYBOOK_USER", default_value = "local")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat loop
    Chat,
    /// Send a single message and print the reply
    Send {
        /// Message text
        text: String,
    },
    /// List recent records of one type
    Recent {
        /// Record type: sleep, exercise, wellness, task, reading_link, journal
        #[arg(short, long, default_value = "sleep")]
        r#type: String,
        /// Maximum number to return
        #[arg(short, long, default_value = "10")]
        limit: i64,
    },
    /// Per-type record counts
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env().context("loading settings")?;
    if let Some(db_path) = cli.db_path {
        settings.db_path = shellexpand::tilde(&db_path).to_string();
    }

    let storage = Arc::new(Storage::open(&settings.db_path).context("opening database")?);
    let records = Arc::new(SqliteRecordStore::new(storage.clone()));

    match cli.command {
        Commands::Chat => {
            let controller = build_controller(&settings, records)?;
            chat_loop(&controller, &storage, &cli.user).await?;
        }
        Commands::Send { text } => {
            let controller = build_controller(&settings, records)?;
            let mut state = storage
                .load_conversation_state(&cli.user)?
                .unwrap_or_default();
            let reply = controller.handle_turn(&mut state, &cli.user, &text).await?;
            storage.save_conversation_state(&cli.user, &state)?;
            println!("{}", reply);
        }
        Commands::Recent { r#type, limit } => {
            let rows = records.recent(&cli.user, &r#type, limit).await?;
            if rows.is_empty() {
                println!("No {} records yet.", r#type);
            }
            for row in rows {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
        Commands::Stats => {
            let counts = records.type_counts(&cli.user).await?;
            if counts.is_empty() {
                println!("Nothing logged yet.");
            }
            for (record_type, count) in counts {
                println!("{:>6}  {}", count, record_type);
            }
        }
    }

    Ok(())
}

fn build_controller(
    settings: &Settings,
    records: Arc<SqliteRecordStore>,
) -> anyhow::Result<TurnController> {
    let llm = Arc::new(OpenAiChat::from_settings(settings).context("configuring chat model")?);
    let documents = create_document_sync(&settings.notion);
    Ok(TurnController::new(
        llm,
        records,
        documents,
        settings.max_clarification_turns,
    ))
}

async fn chat_loop(
    controller: &TurnController,
    storage: &Storage,
    user: &str,
) -> anyhow::Result<()> {
    println!("daybook {} - type a message, or 'exit' to quit", daybook::VERSION);
    let mut state: ConversationState = storage.load_conversation_state(user)?.unwrap_or_default();

    loop {
        print!("you> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        let reply = controller.handle_turn(&mut state, user, line).await?;
        storage.save_conversation_state(user, &state)?;
        println!("daybook> {}\n", reply);
    }

    Ok(())
}
