//! Configurazione del server letta dalle variabili d'ambiente all'avvio.

use anyhow::Context;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Quanti messaggi vengono inviati come storico a chi si connette.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
/// Capacità della coda in uscita di ogni connessione.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub history_limit: i64,
    pub outbox_capacity: usize,
    /// Tempo massimo per una singola scrittura sul socket.
    pub send_timeout: Duration,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: "placevista.db".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            history_limit: DEFAULT_HISTORY_LIMIT,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            allowed_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

impl ServerConfig {
    /// Legge DATABASE_URL, BIND_ADDR, HISTORY_LIMIT, OUTBOX_CAPACITY, SEND_TIMEOUT_MS, ALLOWED_ORIGINS.
    /// Valori presenti ma non validi sono un errore, non un default silenzioso.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Come `from_env`, ma con una sorgente di variabili arbitraria.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(addr) = lookup("BIND_ADDR") {
            config.bind_addr = parse_var("BIND_ADDR", &addr)?;
        }
        if let Some(limit) = lookup("HISTORY_LIMIT") {
            config.history_limit = parse_var("HISTORY_LIMIT", &limit)?;
            anyhow::ensure!(config.history_limit > 0, "HISTORY_LIMIT must be positive");
        }
        if let Some(capacity) = lookup("OUTBOX_CAPACITY") {
            config.outbox_capacity = parse_var("OUTBOX_CAPACITY", &capacity)?;
            anyhow::ensure!(config.outbox_capacity > 0, "OUTBOX_CAPACITY must be positive");
        }
        if let Some(ms) = lookup("SEND_TIMEOUT_MS") {
            config.send_timeout = Duration::from_millis(parse_var("SEND_TIMEOUT_MS", &ms)?);
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(config)
    }
}

fn parse_var<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("parse {} = {:?}", key, raw))
}
