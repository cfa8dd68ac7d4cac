//! Alvorecer - read and search the Bible offline
//!
//! Loads the dataset and the cache policy, then runs one lookup or cache
//! command and prints the result.

use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use alvorecer::cache::{CacheManager, CacheStats, FileStore};
use alvorecer::cli::{parse_testament_arg, CacheCommand, Cli, Command};
use alvorecer::data::{spawn_load, Book, Chapter, VerseMatch};
use alvorecer::service::BibleService;

/// Sends logs to stderr, filtered by `RUST_LOG` (default: warnings only)
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_books(books: &[Book]) {
    for book in books {
        println!("{:<12} {}", book.id, book.name);
    }
}

fn print_chapter(chapter: &Chapter) {
    println!("{} {} ({})", chapter.name, chapter.chapter, chapter.version);
    for (verse, text) in &chapter.verses {
        println!("{:>3} {}", verse, text);
    }
}

fn print_matches(matches: &[VerseMatch]) {
    for m in matches {
        println!("{} {}:{} {}", m.book, m.chapter, m.verse, m.text);
    }
    println!("{} result(s)", matches.len());
}

fn print_stats(stats: &CacheStats) {
    println!("Entries:          {}", stats.entry_count);
    println!("Priority entries: {}", stats.priority_entry_count);
    println!("Estimated size:   {} bytes", stats.estimated_bytes);
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Wires cache, dataset and service together and runs the requested command
async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let testament = match &cli.command {
        Command::Books {
            testament: Some(t),
        } => Some(parse_testament_arg(t)?),
        _ => None,
    };

    // Start loading the dataset while the cache policy is fetched
    let dataset = spawn_load(cli.data.clone());

    let store = match &cli.cache_dir {
        Some(dir) => FileStore::with_dir(dir.clone()),
        None => FileStore::new().ok_or("Could not determine a cache directory; pass --cache-dir")?,
    };
    let cache = Arc::new(CacheManager::new(store));
    cache.initialize(&cli.config_source()).await;

    let service = BibleService::new(Arc::clone(&cache), dataset);

    match &cli.command {
        Command::Books { .. } => {
            let books = service.books(testament).await?;
            if cli.json {
                print_json(&books)?;
            } else {
                print_books(&books);
            }
        }
        Command::Chapters { book } => {
            let chapters = service.chapters(book).await?;
            if cli.json {
                print_json(&chapters)?;
            } else {
                let list: Vec<String> = chapters.iter().map(u32::to_string).collect();
                println!("{}", list.join(" "));
            }
        }
        Command::Read { book, chapter } => {
            let chapter = service.load_chapter(book, *chapter).await?;
            if cli.json {
                print_json(&chapter)?;
            } else {
                print_chapter(&chapter);
            }
        }
        Command::Search { term } => {
            let matches = service.search(term).await?;
            if cli.json {
                print_json(&matches)?;
            } else {
                print_matches(&matches);
            }
        }
        Command::Cache(CacheCommand::Stats) => {
            let stats = cache.stats();
            if cli.json {
                print_json(&stats)?;
            } else {
                print_stats(&stats);
            }
        }
        Command::Cache(CacheCommand::Clear) => {
            if !cache.clear_all() {
                return Err("Failed to clear cache".into());
            }
            println!("Cache cleared");
        }
        Command::Cache(CacheCommand::Preload) => {
            let loaded = service.preload_priority_chapters().await?;
            println!("Preloaded {} chapter(s)", loaded);
        }
    }

    Ok(())
}
