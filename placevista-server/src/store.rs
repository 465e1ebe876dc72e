//! MessageStore: registro durevole e append-only dei messaggi, fonte di verità per l'ordine.

use placevista_core::{now_timestamp, Location, Message, MessageId, MessageInput};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{RelayError, Result};

const LIST_AFTER: &str = "SELECT id, author_id, text, attachment_ref, location, created_at \
     FROM messages WHERE id > ? ORDER BY id ASC LIMIT ?";
const LIST_OLDEST: &str = "SELECT id, author_id, text, attachment_ref, location, created_at \
     FROM messages ORDER BY id ASC LIMIT ?";
const LIST_RECENT: &str = "SELECT * FROM (SELECT id, author_id, text, attachment_ref, location, created_at \
     FROM messages ORDER BY id DESC LIMIT ?) ORDER BY id ASC";

#[derive(Clone)]
pub struct MessageStore {
    pool: SqlitePool,
    /// Un solo scrittore alla volta: assegnazione dell'id e INSERT sono atomiche
    /// rispetto agli altri `append`.
    write_lock: Arc<Mutex<()>>,
}

impl MessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Valida l'input, assegna `id` e `createdAt` e lo scrive su disco.
    /// In caso di errore non è stato scritto nulla.
    pub async fn append(&self, input: MessageInput) -> Result<Message> {
        let input = validate(input)?;
        let location = input
            .location
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let _writer = self.write_lock.lock().await;
        // generato dentro la sezione critica: l'ordine dei createdAt segue quello degli id
        let created_at = now_timestamp();
        let id: MessageId = sqlx::query_scalar(
            "INSERT INTO messages (author_id, text, attachment_ref, location, created_at) VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&input.author_id)
        .bind(&input.text)
        .bind(&input.attachment_ref)
        .bind(&location)
        .bind(&created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(Message {
            id,
            author_id: input.author_id,
            text: input.text,
            attachment_ref: input.attachment_ref,
            location: input.location,
            created_at,
        })
    }

    /// Messaggi con id strettamente maggiore di `after` (o i più vecchi se `after` è assente),
    /// al massimo `limit`, in ordine di id crescente.
    pub async fn list_since(&self, after: Option<MessageId>, limit: i64) -> Result<Vec<Message>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let rows = match after {
            Some(after) => {
                sqlx::query(LIST_AFTER)
                    .bind(after)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query(LIST_OLDEST)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(message_from_row).collect()
    }

    /// Gli ultimi `limit` messaggi, restituiti comunque in ordine di id crescente.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Message>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(LIST_RECENT)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(message_from_row).collect()
    }
}

/// Controlla che ci siano autore e almeno un contenuto. Le stringhe vuote o di soli spazi
/// contano come assenti e vengono normalizzate a `None`.
pub fn validate(input: MessageInput) -> Result<MessageInput> {
    let author_id = input.author_id.trim();
    if author_id.is_empty() {
        return Err(RelayError::Validation("authorId is required".to_string()));
    }
    let author_id = author_id.to_string();

    let text = input.text.filter(|t| !t.trim().is_empty());
    let attachment_ref = input.attachment_ref.filter(|a| !a.trim().is_empty());
    let location = match input.location {
        Some(Location::Place(place)) if place.trim().is_empty() => None,
        Some(location) if !location.is_valid() => {
            return Err(RelayError::Validation(
                "location coordinates out of range".to_string(),
            ));
        }
        other => other,
    };

    if text.is_none() && attachment_ref.is_none() && location.is_none() {
        return Err(RelayError::Validation(
            "one of text, attachmentRef or location is required".to_string(),
        ));
    }

    Ok(MessageInput {
        author_id,
        text,
        attachment_ref,
        location,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<Message> {
    let location: Option<String> = row.try_get("location")?;
    let location = location
        .as_deref()
        .map(serde_json::from_str::<Location>)
        .transpose()?;
    Ok(Message {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        text: row.try_get("text")?,
        attachment_ref: row.try_get("attachment_ref")?,
        location,
        created_at: row.try_get("created_at")?,
    })
}
