//! # AlgoPulse
//!
//! Morning: one problem per (topic, difficulty) bucket to every subscriber.
//! Evening: the solution, generated once per (problem, language).
//!
//! Usage:
//!   algopulse run challenge              # Morning dispatch
//!   algopulse run solution               # Evening dispatch
//!   algopulse run                        # Pick the mode from the UTC hour
//!   algopulse --dry-run run challenge    # Log emails instead of sending
//!   algopulse enroll dev@example.com --topic Graphs --difficulty Hard
//!   algopulse bank                       # Bank inventory per bucket

use anyhow::{Context, Result};
use chrono::{Timelike, Utc};
use clap::{Parser, Subcommand};
use pulse_channels::{EmailChannel, LogMailer};
use pulse_core::traits::store::{Fields, Filter};
use pulse_core::types::{Difficulty, Mode, Subscriber, SubscriberStatus, fields};
use pulse_core::{Mailer, PulseConfig, PulseError, Store};
use pulse_dispatch::{Coordinator, ItemBank};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "algopulse",
    version,
    about = "📬 AlgoPulse: daily DSA challenges and solutions by email"
)]
struct Cli {
    /// Config file (default: ~/.algopulse/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Print the run summary as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Log emails instead of sending them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one dispatch (challenge | morning | solution)
    Run {
        /// Mode; inferred from the UTC hour when absent or unrecognised
        mode: Option<String>,
    },
    /// Add an active subscriber
    Enroll {
        email: String,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        difficulty: Option<String>,
        #[arg(long)]
        language: Option<String>,
    },
    /// Stop sending to a subscriber
    Cancel { email: String },
    /// Delete a subscriber record
    Remove { email: String },
    /// Show unused / used counts per bucket
    Bank,
}

/// Startup / configuration failure.
const EXIT_CONFIG: u8 = 1;
/// The run could not make meaningful progress.
const EXIT_FATAL: u8 = 2;

/// Default directives when `RUST_LOG` is unset. Dependencies stay at warn.
fn log_filter(verbose: bool) -> &'static str {
    if verbose {
        "warn,algopulse=debug,pulse_core=debug,pulse_dispatch=debug,pulse_providers=debug,\
         pulse_channels=debug,pulse_store=debug"
    } else {
        "warn,algopulse=info,pulse_core=info,pulse_dispatch=info,pulse_providers=info,\
         pulse_channels=info,pulse_store=info"
    }
}

fn init_logging(verbose: bool, json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(verbose)));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }
}

/// Resolve the run mode. Anything unrecognised falls back to the clock:
/// 04:00–13:59 UTC is morning.
fn select_mode(arg: Option<&str>, utc_hour: u32) -> Mode {
    if let Some(raw) = arg {
        match raw.parse::<Mode>() {
            Ok(mode) => return mode,
            Err(_) => tracing::warn!("⚠️ Unknown mode '{raw}', inferring from the clock"),
        }
    }
    if (4..14).contains(&utc_hour) {
        Mode::Challenge
    } else {
        Mode::Solution
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<PulseConfig> {
    let mut config = match path {
        Some(p) => PulseConfig::load_from(p)
            .with_context(|| format!("loading config from {}", p.display()))?,
        None => PulseConfig::load().context("loading default config")?,
    };
    config.resolve_env();
    Ok(config)
}

/// SMTP mailer, or a logging one for `--dry-run` (returned again so the
/// caller can list what would have gone out).
fn build_mailer(
    config: &PulseConfig,
    dry_run: bool,
) -> Result<(Arc<dyn Mailer>, Option<Arc<LogMailer>>)> {
    if dry_run {
        tracing::info!("📭 Dry run: emails are logged, not sent");
        let log = Arc::new(LogMailer::new());
        return Ok((log.clone(), Some(log)));
    }
    Ok((Arc::new(EmailChannel::new(&config.email)?), None))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let fatal = e
                .downcast_ref::<PulseError>()
                .is_some_and(PulseError::is_fatal);
            tracing::error!("❌ {e:#}");
            if fatal {
                ExitCode::from(EXIT_FATAL)
            } else {
                ExitCode::from(EXIT_CONFIG)
            }
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;
    let store = pulse_store::open_store(&config.store)?;
    tracing::debug!("💾 Store backend: {}", store.name());

    match cli.command {
        Command::Run { mode } => {
            let mode = select_mode(mode.as_deref(), Utc::now().hour());
            let gateway = Arc::new(pulse_providers::build_gateway(&config.generation)?);
            let (mailer, dry_run_log) = build_mailer(&config, cli.dry_run)?;

            let coordinator = Coordinator::new(&config, store, gateway, mailer);
            let summary = coordinator.run(mode).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("✅ {summary}");
                for failure in &summary.failures {
                    println!(
                        "   ⚠️  {} [{}]: {}",
                        failure.scope, failure.kind, failure.message
                    );
                }
                if let Some(log) = &dry_run_log {
                    for email in log.sent() {
                        println!("   📭 {} ← {}", email.to, email.subject);
                    }
                }
            }
        }
        Command::Enroll {
            email,
            topic,
            difficulty,
            language,
        } => {
            let defaults = config.subscribers.defaults();
            let difficulty = match difficulty {
                Some(d) => d.parse::<Difficulty>()?,
                None => defaults.difficulty,
            };
            let record = Subscriber::new_fields(
                email.trim(),
                topic.as_deref().unwrap_or(defaults.topic.as_str()),
                difficulty,
                language.as_deref().unwrap_or(defaults.language.as_str()),
            );
            let id = store.insert(&config.subscribers.collection, record).await?;
            println!("✅ Enrolled {email} ({id})");
        }
        Command::Cancel { email } => {
            let mut patch = Fields::new();
            patch.insert(
                fields::STATUS.into(),
                Value::from(SubscriberStatus::Cancelled.as_str()),
            );
            let mut changed = 0;
            for id in find_by_email(store.as_ref(), &config, &email).await? {
                let collection = &config.subscribers.collection;
                if store
                    .update_if_matches(collection, &id, &Filter::new(), patch.clone())
                    .await?
                {
                    changed += 1;
                }
            }
            println!("🛑 Cancelled {changed} subscription(s) for {email}");
        }
        Command::Remove { email } => {
            let ids = find_by_email(store.as_ref(), &config, &email).await?;
            for id in &ids {
                store.delete(&config.subscribers.collection, id).await?;
            }
            println!("🗑️ Removed {} record(s) for {email}", ids.len());
        }
        Command::Bank => {
            // Stats only read the store; the gateway is never called.
            let gateway = Arc::new(pulse_providers::GenerationGateway::new(Vec::new()));
            let bank = ItemBank::new(&config.bank, store, gateway);
            let stats = bank.stats().await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else if stats.is_empty() {
                println!("📭 Question bank is empty");
            } else {
                println!("{:<28} {:>8} {:>8}", "BUCKET", "UNUSED", "USED");
                for s in &stats {
                    println!("{:<28} {:>8} {:>8}", s.bucket.to_string(), s.unused, s.used);
                }
            }
        }
    }
    Ok(())
}

async fn find_by_email(
    store: &dyn Store,
    config: &PulseConfig,
    email: &str,
) -> Result<Vec<String>> {
    let filter = Filter::new().eq(fields::EMAIL, email.trim());
    let records = store.query(&config.subscribers.collection, &filter).await?;
    Ok(records.into_iter().map(|r| r.id).collect())
}
