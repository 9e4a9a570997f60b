//! StrataKV CLI
//!
//! Command-line interface for operating on a local StrataKV data directory.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use stratakv::tree::LEVEL_COUNT;
use stratakv::{Config, Engine, Lookup};
use tracing_subscriber::{fmt, EnvFilter};

/// StrataKV CLI
#[derive(Parser, Debug)]
#[command(name = "stratakv-cli")]
#[command(about = "CLI for the StrataKV storage engine")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./stratakv_data")]
    data_dir: String,

    /// MemTable flush threshold in KB
    #[arg(short, long, default_value = "4096")]
    threshold_kb: usize,

    /// Level 0 capacity in KB
    #[arg(long, default_value = "10240")]
    level0_kb: u64,

    /// Max tables per level before compaction
    #[arg(short, long, default_value = "4")]
    part_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Flush the memtable and run a compaction check
    Compact,

    /// Print per-level table counts and sizes
    Stats,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,stratakv=info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // One-shot commands; the scheduler would only race the exit
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .threshold(args.threshold_kb * 1024)
        .level0_size(args.level0_kb * 1024)
        .part_size(args.part_size)
        .check_interval(Duration::ZERO)
        .build();

    let engine = match Engine::open(config) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = run(&engine, args.command).and_then(|code| engine.close().map(|_| code));
    match outcome {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(engine: &Engine, command: Commands) -> stratakv::Result<ExitCode> {
    match command {
        Commands::Get { key } => match engine.get(&key)? {
            Lookup::Found(value) => println!("{}", String::from_utf8_lossy(&value)),
            Lookup::NotFound => {
                println!("(not found)");
                return Ok(ExitCode::from(1));
            }
            Lookup::Tombstoned => {
                println!("(deleted)");
                return Ok(ExitCode::from(1));
            }
        },
        Commands::Set { key, value } => {
            engine.set(&key, value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            engine.delete(&key)?;
            println!("OK");
        }
        Commands::Compact => {
            engine.flush()?;
            let levels = engine.compact()?;
            println!("compacted {} level(s)", levels);
        }
        Commands::Stats => {
            let tree = engine.tree();
            println!("memtable: {} entries, ~{} bytes", engine.memtable_len(), engine.memtable_size());
            for level in 0..LEVEL_COUNT {
                let count = tree.level_count(level);
                if count > 0 {
                    println!(
                        "level {}: {} table(s), {} / {} bytes",
                        level,
                        count,
                        tree.level_size(level),
                        tree.level_capacity(level)
                    );
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
