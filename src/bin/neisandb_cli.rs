//! Interactive REPL over a single on-disk database.
//!
//! Supports a handful of line commands against one collection:
//! `insert <json>`, `find <field> <value>`, `delete <field> <value>`,
//! and `.exit`. Ctrl-C flushes the active collection before the
//! process exits, same as a normal `.exit`.
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use neisandb::{CollectionOptions, Database, DatabaseOptions};
use serde_json::Value;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory the database lives in.
    #[arg(default_value = "./neisandb-data")]
    directory: PathBuf,

    /// Collection to open.
    #[arg(default_value = "default")]
    collection: String,
}

enum Line {
    Exit,
    Insert(Value),
    Find(String, Value),
    Delete(String, Value),
    Blank,
    Unrecognized(String),
}

fn parse_line(s: &str) -> Line {
    let s = s.trim();
    if s == ".exit" {
        return Line::Exit;
    }
    if s.is_empty() {
        return Line::Blank;
    }

    let mut parts = s.splitn(2, ' ');
    match parts.next() {
        Some("insert") => match parts.next().map(serde_json::from_str) {
            Some(Ok(payload)) => Line::Insert(payload),
            _ => Line::Unrecognized(s.to_string()),
        },
        Some("find") => match parts.next() {
            Some(rest) => {
                let mut fv = rest.splitn(2, ' ');
                match (fv.next(), fv.next().map(serde_json::from_str)) {
                    (Some(field), Some(Ok(value))) => Line::Find(field.to_string(), value),
                    _ => Line::Unrecognized(s.to_string()),
                }
            }
            None => Line::Unrecognized(s.to_string()),
        },
        Some("delete") => match parts.next() {
            Some(rest) => {
                let mut fv = rest.splitn(2, ' ');
                match (fv.next(), fv.next().map(serde_json::from_str)) {
                    (Some(field), Some(Ok(value))) => Line::Delete(field.to_string(), value),
                    _ => Line::Unrecognized(s.to_string()),
                }
            }
            None => Line::Unrecognized(s.to_string()),
        },
        _ => Line::Unrecognized(s.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let database = Database::open(DatabaseOptions {
        directory: cli.directory,
        ..DatabaseOptions::default()
    })
    .await?;
    let collection = database
        .open_collection(CollectionOptions::new(cli.collection))
        .await?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_signal = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        shutdown_signal.store(true, Ordering::SeqCst);
    })
    .expect("failed to set Ctrl-C signal handler");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        write!(stdout, "> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match parse_line(&line) {
            Line::Exit => break,
            Line::Blank => continue,
            Line::Insert(payload) => match collection.insert(payload).await {
                Ok(record) => println!("inserted id {}", record.id),
                Err(e) => eprintln!("error: {e}"),
            },
            Line::Find(field, value) => {
                match collection.find(move |v| v[field.as_str()] == value).await {
                    Ok(records) => {
                        for record in records {
                            println!("{}: {}", record.id, record.payload);
                        }
                    }
                    Err(e) => eprintln!("error: {e}"),
                }
            }
            Line::Delete(field, value) => {
                match collection
                    .find_one_and_delete(move |v| v[field.as_str()] == value)
                    .await
                {
                    Ok(record) => println!("deleted id {}", record.id),
                    Err(e) => eprintln!("error: {e}"),
                }
            }
            Line::Unrecognized(s) => eprintln!("unrecognized command '{s}'"),
        }
    }

    collection.flush().await?;
    Ok(())
}
