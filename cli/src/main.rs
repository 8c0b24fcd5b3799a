//! stakeindex CLI: inspect and manage index state.
//!
//! Usage:
//! ```bash
//! stakeindex status ./index.db
//! stakeindex info
//! ```

use std::env;
use std::process;

use stakeindex_core::IndexProgress;
use stakeindex_storage::sqlite::SqliteStore;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "info" => cmd_info(),
        "status" => {
            let Some(path) = args.get(2) else {
                eprintln!("Usage: stakeindex status <db-path>");
                process::exit(2);
            };
            if let Err(e) = cmd_status(path).await {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
        "version" | "--version" | "-V" => {
            println!("stakeindex {}", env!("CARGO_PKG_VERSION"));
        }
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("stakeindex {}", env!("CARGO_PKG_VERSION"));
    println!("Indexing pipeline for delegated-proof-of-stake chains\n");
    println!("USAGE:");
    println!("    stakeindex <COMMAND>\n");
    println!("COMMANDS:");
    println!("    status <db>  Show indexing progress of a SQLite index database");
    println!("    info         Show StakeIndex configuration info");
    println!("    version      Print version");
    println!("    help         Print this help");
}

fn cmd_info() {
    println!("StakeIndex v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default sync poll interval: 15s");
    println!("  Default reconcile interval: 30s");
    println!("  Default validator refresh interval: 5m");
    println!("  Storage backends: memory, SQLite (feature: sqlite)");
    println!("  Built-in processors: token:transfer, pos:registerValidator, pos:stake");
}

async fn cmd_status(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteStore::open(path).await?;
    let stats = IndexProgress::load(&store).await?.stats();

    println!("Index status ({path})");
    println!("  Genesis height: {}", stats.genesis_height);
    println!("  Chain height:   {}", stats.current_chain_height);
    println!(
        "  Blocks indexed: {} / {} ({}%)",
        stats.num_blocks_indexed, stats.chain_length, stats.percentage
    );
    match stats.last_indexed_block {
        Some(last) => println!("  Last block:     {} ({})", last.height, last.id),
        None => println!("  Last block:     none"),
    }
    Ok(())
}
