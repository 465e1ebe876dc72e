/* This file defines how data "travel" through the web socket
    WsMessage is the envelope { type, payload } with these variants:
    SendMessage -> message from client
    History -> snapshot sent by the server right after connect
    Message -> live message pushed by the server
    Ack -> server reply to a SendMessage
    Error -> for errors not related to a command
*/
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    models::{Location, Message, MessageId, MessageInput},
};

/// Messaggio WS con envelope { type, payload }.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum WsMessage {
    /// Client → Server: richiesta di inviare un messaggio.
    #[serde(rename = "sendMessage")]
    SendMessage(SendMessage),
    /// Server → Client: storico ordinato, sempre il primo frame dopo la connessione.
    #[serde(rename = "history")]
    History(History),
    /// Server → Client: evento di nuovo messaggio.
    #[serde(rename = "message")]
    Message(Message),
    /// Server → Client: riscontro ad un sendMessage.
    #[serde(rename = "ack")]
    Ack(Ack),
    /// Server → Client: errore fuori banda.
    #[serde(rename = "error")]
    Error(Error),
}

/// Payload per l'intento di invio messaggio (C→S).
/// L'autore non viaggia qui: è l'identità della sessione.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_msg_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Solo per visualizzazione, mai usato per l'ordinamento.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<String>, // RFC3339 (opzionale)
}

impl SendMessage {
    /// Costruisce l'input per il relay usando l'identità della sessione come autore.
    pub fn into_input(self, author_id: impl Into<String>) -> MessageInput {
        MessageInput {
            author_id: author_id.into(),
            text: self.text,
            attachment_ref: self.attachment_ref,
            location: self.location,
        }
    }
}

/// Snapshot dello storico (S→C), ordinato per id crescente.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    pub messages: Vec<Message>,
    /// Lo snapshot è stato troncato al limite: il client recupera il resto con
    /// GET /messages?after=<ultimo id dello snapshot> prima di fidarsi dei push live.
    #[serde(default)]
    pub has_more: bool,
}

impl History {
    /// Id dell'ultimo messaggio dello snapshot, se presente.
    pub fn last_id(&self) -> Option<MessageId> {
        self.messages.last().map(|m| m.id)
    }
}

/// Stato dell'acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "error")]
    Error,
}

/// Risposta del server ad un sendMessage (S→C).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    /// clientMsgId del comando a cui rispondiamo, se il client l'ha fornito.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    pub status: AckStatus,
    /// Presente se status = ok
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    /// Presente se status = ok
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Presente se status = error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Error>,
}

impl Ack {
    pub fn ok(in_reply_to: Option<String>, message: &Message) -> Self {
        Self {
            in_reply_to,
            status: AckStatus::Ok,
            message_id: Some(message.id),
            created_at: Some(message.created_at.clone()),
            error: None,
        }
    }

    pub fn error(in_reply_to: Option<String>, error: Error) -> Self {
        Self {
            in_reply_to,
            status: AckStatus::Error,
            message_id: None,
            created_at: None,
            error: Some(error),
        }
    }
}
