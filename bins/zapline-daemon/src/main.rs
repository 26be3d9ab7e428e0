mod clients;
mod config;
mod ws;


use crate::clients::supabase::{SupabaseClient, SupabaseCredentialStore, SupabaseLeadStore};
use crate::config::DaemonConfig;
use crate::ws::{router, AppState};
use log::LevelFilter;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use zapline_core::auth::{CredentialStore, FileCredentialStore};
use zapline_core::leads::{InMemoryLeadStore, LeadStore};
use zapline_core::network::MockNetwork;
use zapline_core::session::SessionManager;

#[derive(thiserror::Error, Debug)]
enum DaemonError {
    #[error("config")]
    Config,
    #[error("bind")]
    Bind,
    #[error("serve")]
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    let args: Vec<String> = std::env::args().collect();
    let mut path = PathBuf::from("zapline.toml");
    let mut i = 1;
    while i + 1 < args.len() {
        if args[i] == "--config" {
            path = PathBuf::from(&args[i + 1]);
        }
        i += 1;
    }
    let cfg = if path.exists() {
        config::load_config(&path).map_err(|_| DaemonError::Config)?
    } else {
        DaemonConfig::default()
    };
    init_logging(&cfg);
    let (manager, mode) = init_bridge(&cfg)?;
    manager.start();
    let state = AppState {
        manager: manager.clone(),
        mode,
    };
    let listener = TcpListener::bind(&cfg.listen)
        .await
        .map_err(|_| DaemonError::Bind)?;
    log::info!("bridge listening on {}", cfg.listen);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|_| DaemonError::Serve)?;
    manager.stop();
    Ok(())
}

fn init_logging(cfg: &DaemonConfig) {
    let level = match cfg.logging.level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

fn init_bridge(cfg: &DaemonConfig) -> Result<(SessionManager, &'static str), DaemonError> {
    let network = Arc::new(MockNetwork::new());
    let (credentials, leads, mode): (Arc<dyn CredentialStore>, Arc<dyn LeadStore>, &'static str) =
        match &cfg.supabase {
            Some(supabase) => {
                let client =
                    Arc::new(SupabaseClient::new(supabase).map_err(|_| DaemonError::Config)?);
                (
                    Arc::new(SupabaseCredentialStore::new(
                        client.clone(),
                        supabase.sessions_table.clone(),
                    )),
                    Arc::new(SupabaseLeadStore::new(
                        client,
                        supabase.leads_table.clone(),
                    )),
                    "cloud",
                )
            }
            None => (
                Arc::new(FileCredentialStore::new(cfg.auth_dir.clone())),
                Arc::new(InMemoryLeadStore::new()),
                "local",
            ),
        };
    log::info!("credential store: {}", mode);
    Ok((
        SessionManager::new(cfg.bridge.clone(), network, credentials, leads),
        mode,
    ))
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
}
