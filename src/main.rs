//! Spese Trasferta - offline-first business trip expense tracking.
//!
//! Command-line companion to the mobile app: reads trips and expenses
//! from the managed backend, exports them as CSV or as a ZIP bundle
//! with all receipt photos, and maintains the versioned offline cache
//! of the application shell.

mod api;
mod cache;
mod config;
mod export;
mod models;
mod utils;

use std::io;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use api::BackendClient;
use cache::{
    CacheStore, FetchRequest, HttpNetwork, InstallPolicy, ShellCache, ShellMessage,
    PRECACHE_MANIFEST,
};
use config::Config;
use models::Trip;

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Set up logging with environment-based filter
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    info!("Spese Trasferta starting");

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    let config = Config::load()?;

    let result = match command {
        "list" => cmd_list(&config).await,
        "export" if args.len() == 4 => cmd_export(&config, &args[2], &args[3]).await,
        "export-selected" if args.len() >= 4 && args.len() % 2 == 0 => {
            cmd_export_selected(&config, &args[2..]).await
        }
        "export-csv" => cmd_export_csv(&config).await,
        "shell-sync" => cmd_shell_sync(&config).await,
        "shell-status" => cmd_shell_status(&config),
        "shell-fetch" if args.len() >= 3 => {
            let navigate = args.iter().any(|a| a == "--navigate");
            cmd_shell_fetch(&config, &args[2], navigate).await
        }
        "config-init" => cmd_config_init(&config),
        _ => {
            print_usage();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Errore: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

fn print_usage() {
    println!("Spese Trasferta - gestione spese di trasferta");
    println!();
    println!("Comandi:");
    println!("  list                                  elenca le trasferte registrate");
    println!("  export <luogo> <data>                 esporta una trasferta (ZIP con foto)");
    println!("  export-selected <luogo> <data> [...]  esporta le trasferte indicate in un unico ZIP");
    println!("  export-csv                            esporta tutte le spese in CSV");
    println!("  shell-sync                            installa e attiva la cache offline corrente");
    println!("  shell-status                          mostra lo stato della cache offline");
    println!("  shell-fetch <url> [--navigate]        instrada una richiesta attraverso la cache");
    println!("  config-init                           scrive il file di configurazione predefinito");
    println!();
    println!("Le date sono in formato ISO (aaaa-mm-gg).");
}

/// Build the backend client from the environment. Authentication itself
/// happens elsewhere; this just carries the resulting credentials.
fn backend_client() -> Result<BackendClient> {
    let base_url =
        std::env::var("SPESE_BACKEND_URL").context("SPESE_BACKEND_URL non impostata")?;
    let api_key = std::env::var("SPESE_BACKEND_KEY").context("SPESE_BACKEND_KEY non impostata")?;
    let access_token = std::env::var("SPESE_ACCESS_TOKEN").unwrap_or_else(|_| api_key.clone());
    BackendClient::new(&base_url, &api_key, &access_token)
}

/// Token cancelled by ctrl-c, honored at every photo-fetch boundary.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let child = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    cancel
}

async fn cmd_list(_config: &Config) -> Result<()> {
    let client = backend_client()?;
    let trips = client.fetch_trips().await?;

    if trips.is_empty() {
        println!("Nessuna trasferta registrata");
        return Ok(());
    }

    for trip in &trips {
        println!(
            "{}  {}  {} spese  € {:.2}",
            trip.location,
            trip.formatted_date(),
            trip.expenses.len(),
            trip.total()
        );
    }
    Ok(())
}

async fn cmd_export(config: &Config, location: &str, date: &str) -> Result<()> {
    let client = backend_client()?;
    let trip = client
        .fetch_trip(location, date)
        .await?
        .with_context(|| format!("Trasferta non trovata: {location} {date}"))?;

    let cancel = cancel_on_ctrl_c();
    let path = export::export_trip(&client, &trip, &config.download_dir(), &cancel)
        .await
        .context("Errore durante l'esportazione")?;

    println!("Esportazione completata: {}", path.display());
    Ok(())
}

async fn cmd_export_selected(config: &Config, pairs: &[String]) -> Result<()> {
    let client = backend_client()?;

    let mut trips: Vec<Trip> = Vec::new();
    for pair in pairs.chunks(2) {
        let (location, date) = (&pair[0], &pair[1]);
        let trip = client
            .fetch_trip(location, date)
            .await?
            .with_context(|| format!("Trasferta non trovata: {location} {date}"))?;
        trips.push(trip);
    }

    let cancel = cancel_on_ctrl_c();
    let path = export::export_selected(&client, &trips, &config.download_dir(), &cancel)
        .await
        .context("Errore durante l'esportazione")?;

    println!("Esportazione completata: {}", path.display());
    Ok(())
}

async fn cmd_export_csv(config: &Config) -> Result<()> {
    let client = backend_client()?;
    let trips = client.fetch_trips().await?;

    let path = export::export_all_csv(&trips, &config.download_dir())
        .context("Errore durante l'esportazione")?;

    println!("Esportazione completata: {}", path.display());
    Ok(())
}

async fn cmd_shell_sync(config: &Config) -> Result<()> {
    let network = HttpNetwork::new()?;
    let mut shell = ShellCache::new(
        network,
        &config.cache_root()?,
        config.shell_origin(),
        config.shell_version(),
        InstallPolicy::Strict,
    )?;

    shell
        .install()
        .await
        .context("Installazione della cache offline fallita")?;
    shell.handle_message(ShellMessage::SkipWaiting)?;
    info!(state = ?shell.state(), version = shell.version(), "Shell sync complete");

    println!("Cache offline aggiornata alla versione {}", shell.version());
    Ok(())
}

fn cmd_shell_status(config: &Config) -> Result<()> {
    let cache_root = config.cache_root()?;
    let versions = CacheStore::list_versions(&cache_root)?;

    if versions.is_empty() {
        println!("Nessuna cache offline installata");
        return Ok(());
    }

    println!("Versioni presenti: {}", versions.join(", "));

    let store = CacheStore::open(&cache_root, config.shell_version())?;
    println!("Versione corrente: {} ({} voci)", store.version(), store.len());

    if store.is_empty() {
        println!("La cache corrente è vuota: eseguire shell-sync");
        return Ok(());
    }

    let origin = config.shell_origin().trim_end_matches('/');
    for path in PRECACHE_MANIFEST {
        let present = store.contains(&format!("{origin}{path}"));
        println!("  {path}: {}", if present { "ok" } else { "mancante" });
    }
    Ok(())
}

async fn cmd_shell_fetch(config: &Config, url: &str, navigate: bool) -> Result<()> {
    let network = HttpNetwork::new()?;
    let mut shell = ShellCache::resume(
        network,
        &config.cache_root()?,
        config.shell_origin(),
        config.shell_version(),
        InstallPolicy::Strict,
    )?;

    let request = if navigate {
        FetchRequest::navigate(url)
    } else {
        FetchRequest::get(url)
    };

    let response = shell
        .handle_fetch(&request)
        .await
        .context("Richiesta non instradabile")?;

    println!(
        "{} {} ({} byte, {})",
        response.status,
        url,
        response.body.len(),
        response.content_type.as_deref().unwrap_or("tipo sconosciuto")
    );
    Ok(())
}

fn cmd_config_init(config: &Config) -> Result<()> {
    config.save()?;
    println!(
        "Configurazione scritta in {}",
        Config::config_path()?.display()
    );
    Ok(())
}
