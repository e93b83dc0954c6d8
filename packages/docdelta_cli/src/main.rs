//! docdelta - inspect, replay and invert change logs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docdelta::change::{Affected, RandomIds};
use docdelta::config::StoreConfig;
use docdelta::store::{open_store, ChangeStore};
use docdelta::{Change, DocDeltaConfig, Document};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docdelta", about = "Work with serialized document change logs")]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the changes in a log
    Inspect {
        /// Change log (defaults to the configured store path)
        log: Option<PathBuf>,
    },
    /// Apply every change to an empty document and report what each touched
    Replay { log: Option<PathBuf> },
    /// Print the inverse of every change, newest first
    Invert { log: Option<PathBuf> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DocDeltaConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => DocDeltaConfig::default(),
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.clone()),
    )
    .init();

    match cli.command {
        Command::Inspect { log } => {
            for change in load(&config, log).await? {
                println!(
                    "{}\t{}\t{} ops\t{}",
                    change.id(),
                    change.timestamp(),
                    change.len(),
                    change.digest()?
                );
            }
        }
        Command::Replay { log } => {
            let mut doc = Document::default();
            for change in load(&config, log).await? {
                doc.apply_change(&change)
                    .with_context(|| format!("applying {}", change))?;
                if let Some(affected) = change.affected() {
                    print_affected(&change, affected);
                }
            }
            log::info!("replayed into {} nodes", doc.len());
        }
        Command::Invert { log } => {
            let changes = load(&config, log).await?;
            for change in changes.iter().rev() {
                let inverse = change.invert(&RandomIds);
                println!("{}", String::from_utf8(inverse.serialize()?)?);
            }
        }
    }
    Ok(())
}

async fn load(config: &DocDeltaConfig, log: Option<PathBuf>) -> Result<Vec<Change>> {
    let path = log
        .or_else(|| config.store.path.clone())
        .context("no change log given and none configured")?;
    let store = open_store(&StoreConfig {
        path: Some(path.clone()),
    });
    let changes = store
        .load_all()
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    log::debug!("loaded {} changes from {}", changes.len(), path.display());
    Ok(changes)
}

fn print_affected(change: &Change, affected: &Affected) {
    let created: Vec<&str> = affected.created.keys().map(String::as_str).collect();
    let deleted: Vec<&str> = affected.deleted.keys().map(String::as_str).collect();
    let updated: Vec<&str> = affected.updated.iter().map(|k| k.as_str()).collect();
    println!("{}", change.id());
    println!("  created: {}", created.join(", "));
    println!("  deleted: {}", deleted.join(", "));
    println!("  updated: {}", updated.join(", "));
}
