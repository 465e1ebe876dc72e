pub mod ws;
pub mod http;

// Re-export comodi
pub use ws::{Ack, AckStatus, History, SendMessage, WsMessage};
pub use http::{ConnectQuery, ListMessagesQuery, ListMessagesResponse};
