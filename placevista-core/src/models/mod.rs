pub mod message;

// Re-export per comodità
pub use message::{Location, Message, MessageId, MessageInput};
