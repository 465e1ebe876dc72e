pub mod ids;
pub mod time;

pub use ids::{new_client_msg_id, new_connection_id};
pub use time::now_timestamp;
