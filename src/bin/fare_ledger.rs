//! Ledger inspector
//!
//! Prints the lowest recorded price per date from a file or sqlite ledger.
//!
//! Usage:
//!   cargo run --bin fare-ledger                              # ledger from config/dev.toml
//!   cargo run --bin fare-ledger -- --backend sqlite --path lowest_prices.db
//!   cargo run --bin fare-ledger -- --json

use clap::{Parser, ValueEnum};
use fare_watch::infra::config::{Config, LedgerBackendKind};
use fare_watch::services::dispatcher::format_price;
use fare_watch::services::PriceLedger;
use serde_json::json;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    File,
    Sqlite,
}

impl From<Backend> for LedgerBackendKind {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::File => LedgerBackendKind::File,
            Backend::Sqlite => LedgerBackendKind::Sqlite,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "fare-ledger")]
#[command(about = "Print the lowest recorded fare per date")]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE or config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Ledger backend (overrides config)
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// Ledger path (overrides config)
    #[arg(short, long)]
    path: Option<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut config = Config::load_from_path(&Config::resolve_config_path(args.config.as_deref()));

    let backend: LedgerBackendKind = match args.backend {
        Some(backend) => backend.into(),
        None => config.ledger_backend(),
    };
    if backend == LedgerBackendKind::Memory {
        return Err("the configured ledger is in-memory; pass --backend file|sqlite".into());
    }
    let path = args.path.unwrap_or_else(|| config.ledger_path().to_string());
    config = config.with_ledger(backend, &path);

    let ledger = PriceLedger::open(&config).await?;
    let entries = ledger.entries().await?;

    if args.json {
        let floors: Vec<_> = entries
            .iter()
            .map(|(date, price)| json!({ "date": date.to_string(), "price": price }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&floors)?);
        return Ok(());
    }

    println!("{} ({} ledger at {})", config.route_label(), backend.as_str(), path);
    if entries.is_empty() {
        println!("No prices recorded yet.");
        return Ok(());
    }
    println!("{:<12} {:>12}", "Date", "Lowest");
    for (date, price) in &entries {
        println!(
            "{:<12} {:>12}",
            date.to_string(),
            format!("{}{}", config.currency_symbol(), format_price(*price))
        );
    }
    Ok(())
}
