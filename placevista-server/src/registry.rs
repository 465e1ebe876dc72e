//! ConnectionRegistry: insieme delle sessioni live e dei loro canali di consegna.
//!
//! Ogni connessione ha una coda in uscita propria. La consegna non blocca mai:
//! o il frame entra nella coda o la connessione viene rimossa.

use dashmap::DashMap;
use placevista_core::{new_connection_id, History, Message, MessageId, WsMessage};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::warn;

use crate::config::DEFAULT_OUTBOX_CAPACITY;
use crate::error::DeliveryError;

pub type ConnectionId = String;

/// Canale verso il trasporto di una connessione.
pub trait Delivery: Send + Sync + 'static {
    /// Accoda un frame senza attendere. Un errore rimuove la connessione.
    fn deliver(&self, frame: WsMessage) -> Result<(), DeliveryError>;
}

impl Delivery for mpsc::Sender<WsMessage> {
    fn deliver(&self, frame: WsMessage) -> Result<(), DeliveryError> {
        self.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Lagged,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Coda in uscita di una sessione di trasporto. Quando il registry la scarta
/// (unregister o eviction) il ricevitore restituito da [`Outbox::new`] si sblocca,
/// così il trasporto può chiudere la sessione.
pub struct Outbox {
    tx: mpsc::Sender<WsMessage>,
    _evicted: oneshot::Sender<()>,
}

impl Outbox {
    pub fn new(tx: mpsc::Sender<WsMessage>) -> (Self, oneshot::Receiver<()>) {
        let (evicted_tx, evicted_rx) = oneshot::channel();
        (
            Self {
                tx,
                _evicted: evicted_tx,
            },
            evicted_rx,
        )
    }
}

impl Delivery for Outbox {
    fn deliver(&self, frame: WsMessage) -> Result<(), DeliveryError> {
        self.tx.deliver(frame)
    }
}

enum Phase {
    /// Registrata ma senza snapshot: i broadcast restano in attesa qui.
    AwaitingSnapshot(Vec<Message>),
    Live,
}

struct Entry {
    user_id: String,
    sink: Box<dyn Delivery>,
    phase: Phase,
    last_delivered_id: Option<MessageId>,
}

enum Offer {
    Delivered,
    Deferred,
    Duplicate,
}

impl Entry {
    fn new(user_id: String, sink: Box<dyn Delivery>, phase: Phase) -> Self {
        Self {
            user_id,
            sink,
            phase,
            last_delivered_id: None,
        }
    }

    fn is_new(&self, id: MessageId) -> bool {
        self.last_delivered_id.map_or(true, |last| id > last)
    }

    fn mark_delivered(&mut self, id: MessageId) {
        self.last_delivered_id = Some(self.last_delivered_id.map_or(id, |last| last.max(id)));
    }

    fn offer(&mut self, msg: &Message, pending_limit: usize) -> Result<Offer, DeliveryError> {
        if !self.is_new(msg.id) {
            return Ok(Offer::Duplicate);
        }
        match &mut self.phase {
            Phase::AwaitingSnapshot(pending) => {
                if pending.len() >= pending_limit {
                    return Err(DeliveryError::Lagged);
                }
                pending.push(msg.clone());
                Ok(Offer::Deferred)
            }
            Phase::Live => {
                self.sink.deliver(WsMessage::Message(msg.clone()))?;
                self.mark_delivered(msg.id);
                Ok(Offer::Delivered)
            }
        }
    }

    /// Snapshot prima di tutto, poi i broadcast arrivati nel frattempo che lo snapshot non copre.
    /// lastDeliveredId parte solo da ciò che è stato davvero consegnato.
    fn open(&mut self, snapshot: History) -> Result<(), DeliveryError> {
        let last = snapshot.last_id();
        self.sink.deliver(WsMessage::History(snapshot))?;
        if let Some(id) = last {
            self.mark_delivered(id);
        }

        let pending = match std::mem::replace(&mut self.phase, Phase::Live) {
            Phase::AwaitingSnapshot(pending) => pending,
            Phase::Live => Vec::new(),
        };
        for msg in pending {
            if self.is_new(msg.id) {
                let id = msg.id;
                self.sink.deliver(WsMessage::Message(msg))?;
                self.mark_delivered(id);
            }
        }
        Ok(())
    }
}

/// Stato diagnostico di una connessione.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub connection_id: ConnectionId,
    pub user_id: String,
    pub last_delivered_id: Option<MessageId>,
    pub live: bool,
}

/// Esito di un broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// accodati su connessioni ancora in attesa dello snapshot
    pub deferred: usize,
    /// già consegnati in precedenza (id <= lastDeliveredId)
    pub skipped: usize,
    pub evicted: Vec<ConnectionId>,
}

#[derive(Clone)]
pub struct ConnectionRegistry {
    connections: Arc<DashMap<ConnectionId, Entry>>,
    /// Quanti broadcast una connessione può trattenere in attesa dello snapshot.
    pending_limit: usize,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::with_pending_limit(DEFAULT_OUTBOX_CAPACITY)
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oltre `pending_limit` broadcast trattenuti la connessione è considerata in ritardo
    /// e viene rimossa.
    pub fn with_pending_limit(pending_limit: usize) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            pending_limit,
        }
    }

    /// Aggiunge una connessione già live: riceve ogni broadcast successivo.
    pub fn register(&self, user_id: impl Into<String>, sink: impl Delivery) -> ConnectionId {
        self.insert(Entry::new(user_id.into(), Box::new(sink), Phase::Live))
    }

    /// Aggiunge una connessione che trattiene i broadcast finché non riceve lo snapshot
    /// tramite [`ConnectionRegistry::open`].
    pub fn register_deferred(
        &self,
        user_id: impl Into<String>,
        sink: impl Delivery,
    ) -> ConnectionId {
        self.insert(Entry::new(
            user_id.into(),
            Box::new(sink),
            Phase::AwaitingSnapshot(Vec::new()),
        ))
    }

    fn insert(&self, entry: Entry) -> ConnectionId {
        let id = new_connection_id();
        self.connections.insert(id.clone(), entry);
        id
    }

    /// Consegna lo snapshot e rende la connessione live.
    /// Se la consegna fallisce la connessione viene rimossa.
    pub fn open(&self, connection_id: &str, snapshot: History) -> Result<(), DeliveryError> {
        let outcome = match self.connections.get_mut(connection_id) {
            Some(mut entry) => entry.open(snapshot),
            None => Err(DeliveryError::Closed),
        };
        if let Err(e) = &outcome {
            warn!(connection_id, error = %e, "snapshot delivery failed");
            self.unregister(connection_id);
        }
        outcome
    }

    /// Rimuove la connessione. Idempotente: true solo se era presente.
    /// Scartare la entry chiude anche il suo [`Outbox`].
    pub fn unregister(&self, connection_id: &str) -> bool {
        self.connections.remove(connection_id).is_some()
    }

    /// Consegna `msg` a tutte le connessioni registrate. Un fallimento su una connessione
    /// la rimuove senza toccare le altre.
    pub fn broadcast(&self, msg: &Message) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for mut entry in self.connections.iter_mut() {
            match entry.offer(msg, self.pending_limit) {
                Ok(Offer::Delivered) => report.delivered += 1,
                Ok(Offer::Deferred) => report.deferred += 1,
                Ok(Offer::Duplicate) => report.skipped += 1,
                Err(e) => {
                    warn!(
                        connection_id = %entry.key(),
                        user_id = %entry.user_id,
                        message_id = msg.id,
                        error = %e,
                        "delivery failed, dropping connection"
                    );
                    report.evicted.push(entry.key().clone());
                }
            }
        }
        // fuori dall'iterazione: remove sullo stesso shard andrebbe in deadlock
        for id in &report.evicted {
            self.unregister(id);
        }
        report
    }

    /// Membri correnti, solo per diagnostica e test.
    pub fn snapshot(&self) -> HashSet<ConnectionId> {
        self.connections.iter().map(|e| e.key().clone()).collect()
    }

    pub fn connection(&self, connection_id: &str) -> Option<ConnectionInfo> {
        self.connections.get(connection_id).map(|entry| ConnectionInfo {
            connection_id: connection_id.to_string(),
            user_id: entry.user_id.clone(),
            last_delivered_id: entry.last_delivered_id,
            live: matches!(entry.phase, Phase::Live),
        })
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
