//! placevista-core: tipi condivisi tra client e server (modelli, DTO HTTP, messaggi WS, errori).
//! Niente I/O.

pub mod models;
pub mod protocol;
pub mod error;
pub mod utils;

// Re-export utili per ridurre i percorsi nei crate client/server
pub use error::Error;
pub use models::{Location, Message, MessageId, MessageInput};
pub use protocol::ws::{Ack, AckStatus, History, SendMessage, WsMessage};
pub use protocol::http::{ConnectQuery, ListMessagesQuery, ListMessagesResponse};
pub use utils::{new_client_msg_id, new_connection_id, now_timestamp};
