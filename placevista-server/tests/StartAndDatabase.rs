use anyhow::Result;
use placevista_server::{
    build_sqlite_url, connect_pool, health_with_pool, run_migrations, sqlite_url_for_path,
    ServerConfig,
};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

// Funzione di utilità per costruire l'URL SQLite da un percorso di file
fn sqlite_url_for(p: &PathBuf) -> String {
    sqlite_url_for_path(p.as_path()).expect("build sqlite url")
}

// Test che verifica che le migrazioni creino la tabella dei messaggi
#[tokio::test]
async fn run_migrations_creates_messages_table() -> Result<()> {
    let td = TempDir::new()?;
    let db_path = td.path().join("placevista.db");
    fs::File::create(&db_path)?;

    let url = sqlite_url_for(&db_path);
    let pool = connect_pool(&url).await?;
    run_migrations(&pool).await?;

    let names: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM pragma_table_info('messages') ORDER BY cid",
    )
    .fetch_all(&pool)
    .await?;
    assert_eq!(
        names,
        ["id", "author_id", "text", "attachment_ref", "location", "created_at"]
    );
    Ok(())
}

// Le migrazioni si possono rieseguire senza perdere dati
#[tokio::test]
async fn migrations_are_idempotent() -> Result<()> {
    let td = TempDir::new()?;
    let url = sqlite_url_for(&td.path().join("placevista.db"));
    let pool = connect_pool(&url).await?;
    run_migrations(&pool).await?;
    sqlx::query("INSERT INTO messages (author_id, text, created_at) VALUES ('u1', 'hi', '2025-01-01T00:00:00Z')")
        .execute(&pool)
        .await?;
    run_migrations(&pool).await?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages").fetch_one(&pool).await?;
    assert_eq!(count, 1);
    Ok(())
}

// Il vincolo CHECK impedisce righe senza contenuto anche fuori dal relay
#[tokio::test]
async fn schema_rejects_rows_without_content() -> Result<()> {
    let td = TempDir::new()?;
    let url = sqlite_url_for(&td.path().join("placevista.db"));
    let pool = connect_pool(&url).await?;
    run_migrations(&pool).await?;

    let res = sqlx::query("INSERT INTO messages (author_id, created_at) VALUES ('u1', '2025-01-01T00:00:00Z')")
        .execute(&pool)
        .await;
    assert!(res.is_err(), "row without content must be rejected");
    Ok(())
}

// Test che verifica che l'handler di health funzioni dopo le migrazioni
#[tokio::test]
async fn health_handler_works_after_migrations() -> Result<()> {
    let td = TempDir::new()?;
    let url = sqlite_url_for(&td.path().join("placevista.db"));
    let pool = connect_pool(&url).await?;
    run_migrations(&pool).await?;

    let status = health_with_pool(&pool).await;
    assert!(status.is_success(), "health should return 200 OK");

    pool.close().await;
    let status = health_with_pool(&pool).await;
    assert_eq!(status.as_u16(), 503, "closed pool should be unavailable");
    Ok(())
}

// Test che verifica che la creazione del file DB e delle directory genitrici sia idempotente
#[tokio::test]
async fn creating_db_file_and_parent_dirs_is_idempotent() -> Result<()> {
    let td = TempDir::new()?;
    let nested = td.path().join("a").join("b").join("placevista.db");
    let parent = nested.parent().unwrap().to_path_buf();
    assert!(!parent.exists());

    // usa la funzione di libreria che creerà le directory genitrici e il file
    let url = sqlite_url_for_path(nested.as_path())?;
    let pool = connect_pool(&url).await?;
    run_migrations(&pool).await?;

    assert!(parent.exists(), "parent dir should have been created");
    assert!(nested.exists(), "db file should have been created");

    // una seconda volta non deve fallire
    let again = sqlite_url_for_path(nested.as_path())?;
    assert_eq!(url, again);
    Ok(())
}

#[tokio::test]
async fn build_sqlite_url_accepts_prefixed_absolute_paths() -> Result<()> {
    let td = TempDir::new()?;
    let path = td.path().join("x").join("chat.db");
    let raw = format!("sqlite://{}", path.to_string_lossy());

    let url = build_sqlite_url(&raw)?;
    assert!(path.exists(), "db file should have been created at {:?}", path);
    assert_eq!(build_sqlite_url("sqlite::memory:")?, "sqlite::memory:");

    let pool = connect_pool(&url).await?;
    run_migrations(&pool).await?;
    Ok(())
}

#[test]
fn config_reads_overrides_and_rejects_garbage() {
    let config = ServerConfig::from_lookup(|key| match key {
        "BIND_ADDR" => Some("0.0.0.0:8080".to_string()),
        "HISTORY_LIMIT" => Some("20".to_string()),
        "SEND_TIMEOUT_MS" => Some("250".to_string()),
        "ALLOWED_ORIGINS" => Some("http://a.test, https://b.test,".to_string()),
        _ => None,
    })
    .expect("valid config");
    assert_eq!(config.bind_addr.port(), 8080);
    assert_eq!(config.history_limit, 20);
    assert_eq!(config.send_timeout, Duration::from_millis(250));
    assert_eq!(config.allowed_origins, ["http://a.test", "https://b.test"]);
    assert_eq!(config.outbox_capacity, ServerConfig::default().outbox_capacity);

    let bad = ServerConfig::from_lookup(|key| (key == "HISTORY_LIMIT").then(|| "lots".to_string()));
    assert!(bad.is_err());
    let zero = ServerConfig::from_lookup(|key| (key == "OUTBOX_CAPACITY").then(|| "0".to_string()));
    assert!(zero.is_err());
}
