use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use feedkey::{CredentialStore, FeedConfig, KeyringVault};

/// Manage stored package-feed credentials.
#[derive(Parser)]
#[command(name = "feedkey", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store credentials for a feed URL
    Add {
        url: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// Press the dialog's submit button after filling
        #[arg(long)]
        auto_submit: bool,
    },
    /// List stored feeds
    List,
    /// Show the stored credentials for a feed
    Get {
        url: String,
        /// Print the password instead of masking it
        #[arg(long)]
        reveal: bool,
    },
    /// Remove a feed and its keychain entry
    Remove { url: String },
    /// Enable autofill for a feed
    Enable { url: String },
    /// Disable autofill for a feed without removing it
    Disable { url: String },
    /// Turn auto-submit on or off for a feed
    AutoSubmit {
        url: String,
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
    /// Check stored credentials against the feed
    Test { url: String },
}

// --- Config locations ----------------------------------------------------

fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME env var not set")?;
    Ok(Path::new(&home).join(".config").join("feedkey"))
}

fn open_store(dir: &Path) -> CredentialStore {
    let mut store = CredentialStore::new(Box::new(KeyringVault), dir.join("feeds.backup.toml"));
    let primary = FeedConfig::load(&dir.join("feeds.toml"));
    store.load_state(primary.feeds);
    store
}

fn save_store(store: &CredentialStore, dir: &Path) -> Result<()> {
    store.to_config().save(&dir.join("feeds.toml"))
}

// --- Commands ------------------------------------------------------------

fn run(cli: Cli) -> Result<()> {
    let dir = config_dir()?;
    let mut store = open_store(&dir);

    match cli.command {
        Command::Add {
            url,
            username,
            password,
            auto_submit,
        } => {
            let record = store
                .store_credentials(&url, &username, &password, auto_submit)
                .context("credentials were not saved; check that your system keychain is unlocked")?;
            save_store(&store, &dir)?;
            println!("stored credentials for {}", record.url);
        }
        Command::List => {
            if store.is_empty() {
                println!("no feeds stored");
                return Ok(());
            }
            for record in store.feeds() {
                let enabled = if record.enabled { "enabled" } else { "disabled" };
                let auto = if record.auto_submit { ", auto-submit" } else { "" };
                println!("{}  {} ({}{})", record.url, record.username, enabled, auto);
            }
        }
        Command::Get { url, reveal } => {
            let view = store
                .get_credentials(&url)
                .with_context(|| format!("no credentials found for {url}"))?;
            let password = if reveal { view.password.as_str() } else { "********" };
            println!("{}  {} / {}", view.url, view.username, password);
        }
        Command::Remove { url } => {
            anyhow::ensure!(store.remove_credentials(&url), "no stored feed matches {url}");
            save_store(&store, &dir)?;
            println!("removed {url}");
        }
        Command::Enable { url } => {
            anyhow::ensure!(store.set_feed_enabled(&url, true), "no stored feed matches {url}");
            save_store(&store, &dir)?;
        }
        Command::Disable { url } => {
            anyhow::ensure!(store.set_feed_enabled(&url, false), "no stored feed matches {url}");
            save_store(&store, &dir)?;
        }
        Command::AutoSubmit { url, state } => {
            let on = state == "on";
            anyhow::ensure!(store.set_auto_submit(&url, on), "no stored feed matches {url}");
            save_store(&store, &dir)?;
        }
        Command::Test { url } => {
            let view = store
                .get_credentials(&url)
                .with_context(|| format!("no credentials found for {url}"))?;
            let record = store
                .feeds()
                .find(|record| record.url == view.url)
                .cloned()
                .with_context(|| format!("no stored feed matches {url}"))?;
            if store.test_credentials(&record) {
                println!("credentials for {} look valid", record.url);
            } else {
                println!("credentials for {} were rejected", record.url);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    run(Cli::parse())
}
