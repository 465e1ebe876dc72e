//! RelayEngine: unico punto d'ingresso per i messaggi in arrivo e per l'apertura delle sessioni.

use placevista_core::{History, Message, MessageId, MessageInput};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::registry::{ConnectionId, ConnectionRegistry, Delivery};
use crate::store::{self, MessageStore};

#[derive(Clone)]
pub struct RelayEngine {
    store: MessageStore,
    registry: ConnectionRegistry,
    /// Copre append + broadcast, così i broadcast partono nello stesso ordine degli id.
    /// Il registry non viene mai bloccato durante la scrittura su disco.
    sequencer: Arc<Mutex<()>>,
    history_limit: i64,
}

impl RelayEngine {
    pub fn new(store: MessageStore, registry: ConnectionRegistry, history_limit: i64) -> Self {
        Self {
            store,
            registry,
            sequencer: Arc::new(Mutex::new(())),
            history_limit,
        }
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn history_limit(&self) -> i64 {
        self.history_limit
    }

    /// validate → append → broadcast. Se la persistenza fallisce non parte nessun broadcast
    /// e l'errore torna solo a chi ha inviato.
    pub async fn submit(&self, input: MessageInput) -> Result<Message> {
        let input = store::validate(input).map_err(|e| {
            warn!(error = %e, "rejected submission");
            e
        })?;

        let _turn = self.sequencer.lock().await;
        let message = self.store.append(input).await.map_err(|e| {
            error!(error = %e, "append failed, nothing broadcast");
            e
        })?;
        let report = self.registry.broadcast(&message);
        debug!(
            message_id = message.id,
            delivered = report.delivered,
            deferred = report.deferred,
            evicted = report.evicted.len(),
            "message relayed"
        );
        Ok(message)
    }

    /// Registra la connessione e le consegna lo storico prima di qualsiasi messaggio live.
    pub async fn on_connect(
        &self,
        user_id: impl Into<String>,
        sink: impl Delivery,
    ) -> Result<ConnectionId> {
        self.connect(user_id.into(), sink, None).await
    }

    /// Come `on_connect`, ma lo storico parte dopo `last_delivered_id`, l'ultimo messaggio
    /// che il client ha già ricevuto prima di cadere. L'id serve solo a scegliere lo
    /// snapshot: i push live non vengono filtrati in base a un valore dichiarato dal client.
    pub async fn on_resume(
        &self,
        user_id: impl Into<String>,
        sink: impl Delivery,
        last_delivered_id: MessageId,
    ) -> Result<ConnectionId> {
        self.connect(user_id.into(), sink, Some(last_delivered_id)).await
    }

    async fn connect(
        &self,
        user_id: String,
        sink: impl Delivery,
        after: Option<MessageId>,
    ) -> Result<ConnectionId> {
        // registrata prima di leggere lo storico: ciò che viene persistito da qui in poi
        // resta in attesa nel registry e non va perso
        let connection_id = self.registry.register_deferred(user_id.clone(), sink);
        // una riga in più per sapere se lo snapshot è troncato
        let mut messages = match self
            .store
            .list_since(after, self.history_limit.saturating_add(1))
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                error!(connection_id = %connection_id, error = %e, "history read failed");
                self.registry.unregister(&connection_id);
                return Err(e);
            }
        };
        let has_more = messages.len() as i64 > self.history_limit;
        messages.truncate(self.history_limit.max(0) as usize);
        let snapshot_len = messages.len();
        self.registry.open(&connection_id, History { messages, has_more })?;
        info!(
            connection_id = %connection_id,
            user_id = %user_id,
            history = snapshot_len,
            has_more,
            "connection opened"
        );
        Ok(connection_id)
    }

    pub fn on_disconnect(&self, connection_id: &str) {
        if self.registry.unregister(connection_id) {
            info!(connection_id, "connection closed");
        }
    }

    /// Storico per il REST: dopo `after` se presente, altrimenti i più recenti.
    pub async fn history(&self, after: Option<MessageId>, limit: i64) -> Result<Vec<Message>> {
        match after {
            Some(_) => self.store.list_since(after, limit).await,
            None => self.store.list_recent(limit).await,
        }
    }
}
