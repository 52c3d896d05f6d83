//! pmkv CLI
//!
//! Inspect and edit pool files from the command line.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pmkv::stree::StreeEngine;
use pmkv::{Config, Db, KeyBound, KvError};
use tracing_subscriber::{fmt, EnvFilter};

/// pmkv CLI
#[derive(Parser, Debug)]
#[command(name = "pmkv-cli")]
#[command(about = "Inspect and edit pmkv pools")]
#[command(version)]
struct Args {
    /// Pool file
    #[arg(short, long)]
    path: String,

    /// Engine to open the pool with
    #[arg(short, long, default_value = "stree")]
    engine: String,

    /// Create the pool if it does not exist
    #[arg(short, long)]
    create: bool,

    /// Pool size in MB when creating
    #[arg(short, long, default_value = "64")]
    size_mb: u64,

    /// Extra engine configuration as a JSON object
    #[arg(long)]
    config_json: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the value stored under a key
    Get {
        key: String,
    },

    /// Store a value
    Put {
        key: String,
        value: String,
    },

    /// Remove a key
    Del {
        key: String,
    },

    /// Print the number of stored pairs
    Count,

    /// Print every pair
    List,

    /// Print pairs with keys greater than KEY
    Above {
        key: String,
    },

    /// Print pairs with keys less than KEY
    Below {
        key: String,
    },

    /// Print pairs with keys strictly between LOWER and UPPER
    Between {
        lower: String,
        upper: String,
    },

    /// Verify the tree structure and print its shape (stree only)
    Check,
}

fn main() -> ExitCode {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,pmkv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(status = %e.status(), "Command failed");
            eprintln!("error: {e} ({})", e.status());
            ExitCode::from(e.status().code() as u8)
        }
    }
}

fn build_config(args: &Args) -> Result<Config, KvError> {
    let mut config = match &args.config_json {
        Some(json) => Config::from_json(json)?,
        None => Config::new(),
    };
    config.put_string(pmkv::config::PATH, args.path.clone());
    config.put_uint64(pmkv::config::SIZE, args.size_mb * 1024 * 1024);
    config.put_int64(pmkv::config::CREATE_IF_MISSING, i64::from(args.create));
    Ok(config)
}

fn print_pair(key: &[u8], value: &[u8]) {
    println!(
        "{}\t{}",
        String::from_utf8_lossy(key),
        String::from_utf8_lossy(value)
    );
}

fn run(args: &Args) -> Result<(), KvError> {
    let config = build_config(args)?;
    let db = match args.command {
        Commands::Check => return check(config),
        _ => Db::open(&args.engine, config)?,
    };
    tracing::debug!(engine = db.engine_name(), "Opened {}", args.path);

    match &args.command {
        Commands::Get { key } => {
            let value = db.get_vec(key)?;
            println!("{}", String::from_utf8_lossy(&value));
        }
        Commands::Put { key, value } => db.put(key, value)?,
        Commands::Del { key } => db.remove(key)?,
        Commands::Count => println!("{}", db.count_all()?),
        Commands::List => db.get_all(print_pair)?,
        Commands::Above { key } => db.get_above(key, print_pair)?,
        Commands::Below { key } => db.get_below(key, print_pair)?,
        Commands::Between { lower, upper } => {
            db.get_between(KeyBound::from(lower), KeyBound::from(upper), print_pair)?
        }
        Commands::Check => {}
    }

    db.close();
    Ok(())
}

fn check(config: Config) -> Result<(), KvError> {
    let engine = StreeEngine::open(config)?;
    engine.check_invariants()?;
    println!("ok");
    println!("height:    {}", engine.height()?);
    println!("entries:   {}", pmkv::Engine::count_all(&engine)?);
    println!("heap used: {} bytes", engine.heap_used()?);
    Ok(())
}
