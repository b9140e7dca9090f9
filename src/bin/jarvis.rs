//! jarvis CLI — operator interface to the Jarvis memory engine.

use clap::{Parser, Subcommand};
use jarvis_rs::commands::{self, Directive};
use jarvis_rs::config::Config;
use jarvis_rs::db::Db;
use jarvis_rs::import::Importer;
use jarvis_rs::llm;
use jarvis_rs::memory::embedding::OllamaEmbedding;
use jarvis_rs::memory::store::{MemoryStore, PgMemoryStore};
use jarvis_rs::model::memory::MemoryFilters;
use jarvis_rs::telemetry::{TelemetryConfig, genai, init_telemetry};
use rig::client::CompletionClient;
use rig::completion::Prompt;
use secrecy::ExposeSecret;
use std::io::Write as _;
use std::path::PathBuf;
use tokio::io::AsyncBufReadExt;
use tracing::Instrument;

const PERSONA: &str = "You are J.A.R.V.I.S., a personal assistant. You remember past \
conversations; when memories are provided, weigh them before answering. Reply in the \
user's language, concisely.";

#[derive(Parser)]
#[command(name = "jarvis", about = "Memory engine for the Jarvis assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat. Directives (import_chat, sleep, ...) are routed
    /// to the import pipeline; everything else goes to the LLM.
    Chat,
    /// Import a chat-history JSON file
    Import {
        /// Path to a JSON array of exported chat records
        file: PathBuf,
        /// Records per store submission
        #[arg(long, default_value_t = commands::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
        /// Submit everything as a single chunk
        #[arg(long)]
        no_batch: bool,
    },
    /// Memory operations
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
    /// Run a consolidation pass now
    Sleep {
        /// Only consolidate the short-term tier
        #[arg(long)]
        short: bool,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Search memories by similarity
    Search {
        query: String,
        /// Maximum results to show
        #[arg(long, default_value_t = 5)]
        limit: i64,
        /// Filter by talker
        #[arg(long)]
        talker: Option<String>,
        /// Filter by room
        #[arg(long)]
        room: Option<String>,
    },
    /// Show memories by id
    Get {
        /// Memory entry ids
        ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Chat => cmd_chat(config).await,
        Command::Import {
            file,
            batch_size,
            no_batch,
        } => {
            let store = open_store(&config).await?;
            let importer = Importer::new(&store, config.self_talker.clone());
            let report = importer.import_file(&file, !no_batch, batch_size).await?;
            println!("{report}");
            Ok(())
        }
        Command::Memory { action } => {
            let store = open_store(&config).await?;
            match action {
                MemoryAction::Search {
                    query,
                    limit,
                    talker,
                    room,
                } => cmd_memory_search(&store, query, limit, talker, room).await,
                MemoryAction::Get { ids } => cmd_memory_get(&store, ids).await,
            }
        }
        Command::Sleep { short } => {
            let store = open_store(&config).await?;
            let merged = store.consolidate(short).await?;
            println!("Merged {merged} similar memories.");
            Ok(())
        }
    }
}

/// Connect, migrate, and assemble the pgvector-backed store.
async fn open_store(config: &Config) -> anyhow::Result<PgMemoryStore> {
    let db = Db::connect(config.database_url.expose_secret()).await?;
    db.migrate().await?;
    let embedder = OllamaEmbedding::new(&config.ollama_url, &config.embedding_model);
    Ok(PgMemoryStore::new(
        db,
        Box::new(embedder),
        config.merge_threshold,
    ))
}

async fn cmd_chat(config: Config) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "jarvis".to_string(),
    })?;

    let store = open_store(&config).await?;
    let importer = Importer::new(&store, config.self_talker.clone());

    let client = llm::openrouter_client(&config.openrouter_api_key)?;
    let agent = client.agent(&config.chat_model).preamble(PERSONA).build();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    prompt_marker()?;
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            prompt_marker()?;
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        let reply = match Directive::parse(input) {
            Some(Ok(directive)) => commands::handle(directive, &importer).await,
            Some(Err(e)) => e.to_string(),
            None => answer(&agent, &store, &config.chat_model, input).await,
        };
        println!("{reply}");
        prompt_marker()?;
    }

    Ok(())
}

fn prompt_marker() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}

/// Answer a plain chat line: recall related memories, then ask the model.
async fn answer(
    agent: &rig::agent::Agent<rig::providers::openrouter::CompletionModel>,
    store: &dyn MemoryStore,
    model: &str,
    input: &str,
) -> String {
    let memories = match store.query(input, &MemoryFilters::default(), 5).await {
        Ok(memories) => memories,
        Err(e) => {
            tracing::warn!(error = %e, "memory recall failed, answering without context");
            Vec::new()
        }
    };

    let prompt = if memories.is_empty() {
        input.to_string()
    } else {
        let mut p = String::from("Relevant memories:\n");
        for m in &memories {
            p.push_str(&format!(
                "- [{} | {}] {}\n",
                m.timestamp.format("%Y-%m-%d %H:%M"),
                m.context.talker,
                m.content
            ));
        }
        p.push_str("\nUser: ");
        p.push_str(input);
        p
    };

    let span = genai::start_chat_span(model, "openrouter");
    match async { agent.prompt(prompt.as_str()).await }
        .instrument(span)
        .await
    {
        Ok(reply) => reply,
        Err(e) => format!("Sorry, I hit an error talking to the model: {e}"),
    }
}

async fn cmd_memory_search(
    store: &PgMemoryStore,
    query: String,
    limit: i64,
    talker: Option<String>,
    room: Option<String>,
) -> anyhow::Result<()> {
    let filters = MemoryFilters {
        talker,
        room_name: room,
        ..Default::default()
    };
    let entries = store.query(&query, &filters, limit).await?;

    if entries.is_empty() {
        println!("No memories found.");
        return Ok(());
    }

    // Header
    println!(
        "{:<36}  {:<6}  {:<14}  {:<16}  CONTENT",
        "ID", "ROLE", "TALKER", "TIME"
    );
    println!("{}", "-".repeat(100));

    for entry in &entries {
        let content_display: String = entry.content.chars().take(40).collect();
        println!(
            "{:<36}  {:<6}  {:<14}  {:<16}  {}",
            entry.id,
            entry.speaker_role,
            entry.context.talker,
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            content_display
        );
    }

    println!("\n{} memor(ies)", entries.len());
    Ok(())
}

async fn cmd_memory_get(store: &PgMemoryStore, ids: Vec<String>) -> anyhow::Result<()> {
    let entries = store.get(&ids).await?;
    if entries.is_empty() {
        println!("No memories found.");
        return Ok(());
    }

    for entry in &entries {
        println!("ID:        {}", entry.id);
        println!("Role:      {}", entry.speaker_role);
        println!("Talker:    {}", entry.context.talker);
        println!("Room:      {}", entry.context.room_name);
        println!("Tier:      {}", entry.tier);
        println!("Source:    {}", entry.source.as_deref().unwrap_or("-"));
        println!("Server ID: {}", entry.server_id.as_deref().unwrap_or("-"));
        println!("Time:      {}", entry.timestamp);
        println!("Content:   {}", entry.content);
        println!("Metadata:  {}", serde_json::to_string_pretty(&entry.metadata)?);
        println!("---");
    }

    Ok(())
}
