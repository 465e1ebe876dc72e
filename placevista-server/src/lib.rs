use anyhow::Context;
use axum::http::StatusCode;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

pub mod config;
pub mod controllers;
pub mod error;
pub mod registry;
pub mod relay;
pub mod routes;
pub mod store;

pub use config::ServerConfig;
pub use error::{DeliveryError, RelayError};
pub use registry::{
    BroadcastReport, ConnectionId, ConnectionInfo, ConnectionRegistry, Delivery, Outbox,
};
pub use relay::RelayEngine;
pub use store::MessageStore;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub relay: RelayEngine,
    pub config: ServerConfig,
}

impl AppState {
    /// Collega store, registry e relay sopra un pool già migrato.
    pub fn new(pool: SqlitePool, config: ServerConfig) -> Self {
        let store = MessageStore::new(pool.clone());
        // stesso limite della coda in uscita per i broadcast trattenuti prima dello snapshot
        let registry = ConnectionRegistry::with_pending_limit(config.outbox_capacity);
        let relay = RelayEngine::new(store, registry, config.history_limit);
        Self { pool, relay, config }
    }
}

// Dato un percorso di file, restituisce un URL SQLite valido. Crea le directory genitrici se non esistono.
pub fn sqlite_url_for_path(p: &Path) -> anyhow::Result<String> {
    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };
    if let Some(parent) = abs.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent dirs for {:?}", parent))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&abs)
        .with_context(|| format!("create/open sqlite file {:?}", abs))?;
    let s = abs.to_string_lossy().replace('\\', "/");
    Ok(format!("sqlite:///{}", s.trim_start_matches('/')))
}

/// Costruisce un DB URL SQLite a partire dal valore configurato (DATABASE_URL).
/// "sqlite::memory:" viene restituito così com'è.
pub fn build_sqlite_url(raw: &str) -> anyhow::Result<String> {
    if raw == "sqlite::memory:" {
        return Ok(raw.to_string());
    }
    // Rimuovi il prefisso "sqlite://" se presente, per ottenere il percorso del file.
    let path_part = if raw.starts_with("sqlite://") {
        raw.trim_start_matches("sqlite:///")
            .trim_start_matches("sqlite://")
            .to_string()
    } else {
        raw.to_string()
    };
    // "sqlite:///tmp/x.db" indica un percorso assoluto
    let path_part = if raw.starts_with("sqlite:///") {
        format!("/{}", path_part)
    } else {
        path_part
    };
    sqlite_url_for_path(&PathBuf::from(path_part))
}

// Connect to the database and return a connection pool.
// Un DB in memoria vive in una sola connessione, quindi il pool ne tiene una.
pub async fn connect_pool(db_url: &str) -> anyhow::Result<SqlitePool> {
    let pool = if db_url.contains(":memory:") {
        SqlitePoolOptions::new().max_connections(1).connect(db_url).await
    } else {
        SqlitePool::connect(db_url).await
    }
    .with_context(|| format!("connect to sqlite via {}", db_url))?;
    Ok(pool)
}

// Esegue le migrazioni del database. Crea le tabelle se non esistono.
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    // WAL: le letture dello storico non bloccano l'unico scrittore
    sqlx::query("PRAGMA journal_mode = WAL;")
        .execute(pool)
        .await
        .context("enable WAL journal")?;

    // AUTOINCREMENT: gli id non vengono mai riusati, neanche dopo una cancellazione
    let stmts = [r#"
        CREATE TABLE IF NOT EXISTS messages (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            author_id      TEXT NOT NULL,
            text           TEXT,
            attachment_ref TEXT,
            location       TEXT,
            created_at     TEXT NOT NULL,
            CHECK (text IS NOT NULL OR attachment_ref IS NOT NULL OR location IS NOT NULL)
        );"#];
    // applica ogni statement di migrazione
    for s in &stmts {
        sqlx::query(s)
            .execute(pool)
            .await
            .with_context(|| {
                format!("apply migration: {}", &s[..s.len().min(40)].replace('\n', " "))
            })?;
    }
    Ok(())
}

/// Controlla lo stato di salute del database tentando di acquisire una connessione dal pool.
pub async fn health_with_pool(pool: &SqlitePool) -> StatusCode {
    match pool.acquire().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
