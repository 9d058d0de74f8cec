use std::io::{self, Write};
use std::path::Path;

use clap::Parser;
use etwsense::collection::{CancellationToken, SearchOptions};
use etwsense::config::Settings;
use etwsense::model::Topic;
use etwsense::parser::{self, Command};
use etwsense::{ProgressSink, TopicRecords, VectorDatabase};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about = "Interactive shell over the ETW manifest and event collections", long_about = None)]
struct Args {
    #[clap(flatten)]
    settings: Settings,
}

struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn report(&self, message: &str) {
        println!("[\u{2713}] {}", message);
    }
}

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "warn,etwsense=warn");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();
    print_banner();

    let db = VectorDatabase::from_settings(args.settings.clone());
    match db.initialize(&ConsoleProgress).await {
        Ok(()) if args.settings.in_memory => println!("[\u{2713}] Using the in-memory store."),
        Ok(()) => println!("[\u{2713}] Connected to {}", args.settings.qdrant_url),
        Err(e) => {
            println!("[\u{2717}] Could not prepare collections: {}", e);
            println!("    Start Qdrant or rerun with --in-memory.");
            return;
        }
    }
    println!("Type 'HELP' for supported commands or 'EXIT' to quit.\n");

    let stdin = io::stdin();
    let mut buffer = String::new();

    loop {
        print!("etw> ");
        if io::stdout().flush().is_err() { break; }
        buffer.clear();

        match stdin.read_line(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if buffer.trim().is_empty() { continue; }

        match parser::parse_command(&buffer) {
            Ok(Command::Exit) => break,
            Ok(cmd) => {
                if let Err(e) = execute_command(&db, cmd).await {
                    println!("[\u{26a0}\u{fe0f} Error] {}", e);
                }
            }
            Err(e) => {
                println!("[\u{2717} Syntax Error] {}", e);
                if buffer.to_uppercase().starts_with("SEARCH") {
                    println!("    \u{2139}\u{fe0f}  Hint: Try 'SEARCH manifests \"file system provider\" LIMIT 3'");
                } else if buffer.to_uppercase().starts_with("IMPORT") {
                    println!("    \u{2139}\u{fe0f}  Hint: Paths are quoted: IMPORT events FROM \"events.json\"");
                }
            }
        }
    }
}

fn print_banner() {
    println!("\n==================================================");
    println!("   etwsense - semantic search over ETW metadata");
    println!("==================================================\n");
}

fn print_help() {
    println!("\n--- Available Commands ---");
    println!("Topics: MANIFESTS, EVENTS (or EVENTDATA)");
    println!("1. COUNT:   COUNT <topic>");
    println!("2. SEARCH:  SEARCH <topic> \"free text\" [LIMIT n]");
    println!("3. IMPORT:  IMPORT <topic> FROM \"records.json\"   (Ctrl-C stops after the current batch)");
    println!("4. ERASE:   ERASE <topic>");
    println!("5. SAVE:    SAVE <topic> TO \"backup.snap\"");
    println!("6. RESTORE: RESTORE <topic> FROM \"backup.snap\"");
    println!("7. EXIT:    Quit\n");
}

async fn execute_command(db: &VectorDatabase, cmd: Command) -> Result<(), String> {
    match cmd {
        Command::Help => { print_help(); Ok(()) },
        Command::Count { topic } => {
            let n = db.get_record_count(topic).await.map_err(|e| e.to_string())?;
            println!("{} {} record(s)", n, topic);
            Ok(())
        },
        Command::Search { topic, query, limit } => perform_search(db, topic, &query, limit).await,
        Command::Import { topic, path } => perform_import(db, topic, Path::new(&path)).await,
        Command::Erase { topic } => {
            db.erase(topic).await.map_err(|e| e.to_string())?;
            println!("[\u{2713} OK] Erased {}", topic);
            Ok(())
        },
        Command::Save { topic, path } => {
            let n = db.save_collection(topic, Path::new(&path)).await.map_err(|e| e.to_string())?;
            println!("[\u{2713} OK] Saved {} {} record(s) to {}", n, topic, path);
            Ok(())
        },
        Command::Restore { topic, path } => {
            let n = db.restore_collection(topic, Path::new(&path)).await.map_err(|e| e.to_string())?;
            println!("[\u{2713} OK] Restored {} {} record(s) from {}", n, topic, path);
            Ok(())
        },
        Command::Exit => Ok(()),
    }
}

async fn perform_search(db: &VectorDatabase, topic: Topic, query: &str, limit: usize) -> Result<(), String> {
    if limit <= 1 {
        let best = db.search(topic, query, &SearchOptions::default()).await.map_err(|e| e.to_string())?;
        if best.is_empty() {
            println!("No match.");
        } else {
            println!("\n{}\n", best);
        }
        return Ok(());
    }

    let hits = db.search_top_k(topic, query, &SearchOptions::top(limit)).await.map_err(|e| e.to_string())?;
    println!("\nFound {} matches:", hits.len());
    for hit in hits {
        println!("  • ({:.4}) {}", hit.score, hit.description);
    }
    println!();
    Ok(())
}

async fn perform_import(db: &VectorDatabase, topic: Topic, path: &Path) -> Result<(), String> {
    let data = tokio::fs::read(path).await.map_err(|e| format!("{}: {}", path.display(), e))?;
    let records = match topic {
        Topic::Manifests => TopicRecords::Manifests(serde_json::from_slice(&data).map_err(|e| e.to_string())?),
        Topic::EventData => TopicRecords::EventData(serde_json::from_slice(&data).map_err(|e| e.to_string())?),
    };
    println!("Importing {} {} record(s)...", records.len(), topic);

    let token = CancellationToken::new();
    let import = db.import_data(&records, &token);
    tokio::pin!(import);

    let summary = tokio::select! {
        res = &mut import => res,
        _ = tokio::signal::ctrl_c() => {
            println!("Cancelling after the current batch...");
            token.cancel();
            import.await
        }
    }
    .map_err(|e| e.to_string())?;

    if summary.cancelled {
        println!("[\u{26a0}\u{fe0f}] Import cancelled after {} record(s)", summary.imported);
    } else {
        println!("[\u{2713} OK] Imported {} record(s)", summary.imported);
    }
    Ok(())
}
