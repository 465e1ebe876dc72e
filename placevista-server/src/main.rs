use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ri-utilizziamo le funzioni e strutture definite in lib.rs
use placevista_server::{
    build_sqlite_url, connect_pool, routes, run_migrations, AppState, ServerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG decide il livello, default info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env().context("read configuration")?;
    // Costruisci l'URL del database SQLite
    let db_url = build_sqlite_url(&config.database_url).context("build sqlite DATABASE_URL")?;
    tracing::info!(%db_url, "using database");
    // Connetti al database
    let pool = connect_pool(&db_url).await.context("connect to sqlite")?;
    // Esegui le migrazioni del database
    run_migrations(&pool).await.context("run migrations")?;

    let addr = config.bind_addr;
    let state = Arc::new(AppState::new(pool, config));
    let app = routes::router(state);

    // Crea il listener TCP e lo lega all'indirizzo configurato
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind tcp listener")?;
    tracing::info!("listening on http://{}", addr);
    axum::serve(listener, app.into_make_service())
        .await
        .context("server shutdown")?;

    Ok(())
}
