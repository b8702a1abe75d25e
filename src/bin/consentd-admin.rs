use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use consentd::analytics::AnalyticsAggregator;
use consentd::clock::SystemClock;
use consentd::config::Config;
use consentd::rate_limit::RateLimiter;
use consentd::storage;
use consentd::validation::{parse_date, validate_domain};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "consentd-admin")]
#[command(about = "consentd store administration CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the analytics report for a domain
    Report {
        #[arg(long)]
        domain: String,
        /// First day, YYYY-MM-DD
        #[arg(long)]
        from: String,
        /// Last day (inclusive), YYYY-MM-DD
        #[arg(long)]
        to: String,
    },
    /// Inspect or clear rate-limit windows
    RateLimit {
        #[command(subcommand)]
        command: RateLimitCommands,
    },
    /// List stored keys
    Keys {
        #[arg(long, default_value = "")]
        prefix: String,
    },
}

#[derive(Subcommand)]
enum RateLimitCommands {
    /// Show the stored window for an identity
    Show { identity: String },
    /// Delete the stored window for an identity
    Reset { identity: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let store = storage::connect(&config.store).await?;
    let clock = Arc::new(SystemClock);

    match cli.command {
        Commands::Report { domain, from, to } => {
            let domain = validate_domain(&domain)?;
            let from = parse_date(&from, "from")?;
            let to = parse_date(&to, "to")?;

            let aggregator = AnalyticsAggregator::new(store, clock);
            let report = aggregator
                .report(&domain, from, to)
                .await
                .context("failed to build analytics report")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::RateLimit { command } => {
            let limiter = RateLimiter::new(store, clock);
            match command {
                RateLimitCommands::Show { identity } => match limiter.inspect(&identity).await? {
                    Some(state) => println!(
                        "{}: {} request(s), window resets at {}",
                        identity, state.count, state.reset_at
                    ),
                    None => println!("No rate-limit state for '{}'", identity),
                },
                RateLimitCommands::Reset { identity } => {
                    if limiter.reset(&identity).await? {
                        println!("✓ Cleared rate-limit window for '{}'", identity);
                    } else {
                        println!("⚠ No rate-limit window stored for '{}'", identity);
                    }
                }
            }
        }
        Commands::Keys { prefix } => {
            let keys = store.list(&prefix).await?;
            if keys.is_empty() {
                println!("No keys found.");
            } else {
                for key in keys {
                    println!("{}", key);
                }
            }
        }
    }

    Ok(())
}
