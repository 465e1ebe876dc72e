use serde::{Deserialize, Serialize};

use crate::models::{Message, MessageId};
/*
    http dto for http requests
*/
// POST /messages usa direttamente MessageInput come body.

// GET /messages?after=<id>&limit=<n> (query params, non nel body)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    pub messages: Vec<Message>,
}

// GET /ws?userId=<id>&after=<id>
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    /// lastDeliveredId noto al client che si riconnette
    #[serde(default)]
    pub after: Option<MessageId>,
}
