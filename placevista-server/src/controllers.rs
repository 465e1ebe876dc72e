use axum::extract::ws::{Message as WsFrame, WebSocket};
use axum::{
    extract::{Extension, Query, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use futures_util::{SinkExt, StreamExt};
use placevista_core::{
    Ack, ConnectQuery, Error as WireError, ListMessagesQuery, ListMessagesResponse, Message,
    MessageInput, WsMessage,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::registry::Outbox;
use crate::{health_with_pool, AppState};

/// Pagina di default per GET /messages, come il vecchio "ultimi 50".
pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 500;

/// Handler per GET /health
pub async fn health(Extension(state): Extension<Arc<AppState>>) -> StatusCode {
    health_with_pool(&state.pool).await
}

/// Handler per GET /messages?after=&limit=
pub async fn list_messages(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<ListMessagesResponse>, RelayError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let messages = state.relay.history(query.after, limit).await?;
    Ok(Json(ListMessagesResponse { messages }))
}

/// Handler per POST /messages: submit request/response, con broadcast a tutte le sessioni live.
pub async fn post_message(
    Extension(state): Extension<Arc<AppState>>,
    Json(input): Json<MessageInput>,
) -> Result<(StatusCode, Json<Message>), RelayError> {
    let message = state.relay.submit(input).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Handler per /ws?userId=<id>[&after=<messageId>]
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query))
}

async fn send_frame(socket: &mut WebSocket, frame: &WsMessage) {
    if let Ok(text) = serde_json::to_string(frame) {
        let _ = socket.send(WsFrame::Text(text.into())).await;
    }
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, query: ConnectQuery) {
    // L'identità arriva dal collaboratore di autenticazione a monte
    let user_id = match query
        .user_id
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
    {
        Some(u) => u,
        None => {
            let err = WireError::new("unauthorized", "userId is required");
            send_frame(&mut socket, &WsMessage::Error(err)).await;
            return;
        }
    };

    // `tx` è la coda in uscita di questa sessione: il registry ne tiene un clone dentro
    // l'Outbox e ci accoda snapshot e broadcast senza mai attendere. Quando il registry
    // scarta l'Outbox (eviction), `evicted` si sblocca e la sessione si chiude.
    let (tx, mut rx) = mpsc::channel::<WsMessage>(state.config.outbox_capacity);
    let (outbox, mut evicted) = Outbox::new(tx.clone());
    let connected = match query.after {
        Some(after) => state.relay.on_resume(user_id.clone(), outbox, after).await,
        None => state.relay.on_connect(user_id.clone(), outbox).await,
    };
    let connection_id = match connected {
        Ok(id) => id,
        Err(e) => {
            send_frame(&mut socket, &WsMessage::Error(e.to_wire())).await;
            return;
        }
    };

    /* socket.split() divide il WebSocket in due metà indipendenti:
        sender (Sink) per scrivere verso il client,
        receiver (Stream) per leggere dal client. */
    let (mut sender, mut receiver) = socket.split();

    // Task: rx -> websocket. Una scrittura più lenta di send_timeout chiude la sessione.
    // Quando rx si esaurisce manda il frame di chiusura.
    let send_timeout = state.config.send_timeout;
    let writer_id = connection_id.clone();
    let mut forward_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    warn!(connection_id = %writer_id, error = %e, "cannot encode frame");
                    continue;
                }
            };
            let write = sender.send(WsFrame::Text(text.into()));
            match tokio::time::timeout(send_timeout, write).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => return,
                Err(_) => {
                    warn!(connection_id = %writer_id, "socket write timed out");
                    return;
                }
            }
        }
        let _ = tokio::time::timeout(send_timeout, sender.send(WsFrame::Close(None))).await;
    });

    let mut writer_done = false;
    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(WsFrame::Text(t))) => {
                    handle_text(&state, &user_id, &tx, t.as_str()).await
                }
                Some(Ok(WsFrame::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            // rimossa dal registry (coda piena, unregister esterno): niente più push live
            _ = &mut evicted => {
                info!(connection_id = %connection_id, "connection evicted, closing session");
                break;
            }
            // il writer è terminato: client lento o socket chiuso
            _ = &mut forward_task => {
                writer_done = true;
                break;
            }
        }
    }

    // cleanup: senza più mittenti il writer svuota la coda e chiude il socket
    state.relay.on_disconnect(&connection_id);
    drop(tx);
    if !writer_done && tokio::time::timeout(send_timeout, &mut forward_task).await.is_err() {
        forward_task.abort();
    }
    info!(connection_id = %connection_id, user_id = %user_id, "session ended");
}

async fn handle_text(state: &AppState, user_id: &str, tx: &mpsc::Sender<WsMessage>, text: &str) {
    let reply = match serde_json::from_str::<WsMessage>(text) {
        Ok(WsMessage::SendMessage(sm)) => {
            let client_msg_id = sm.client_msg_id.clone();
            let ack = match state.relay.submit(sm.into_input(user_id)).await {
                Ok(message) => Ack::ok(client_msg_id, &message),
                Err(e) => Ack::error(client_msg_id, e.to_wire()),
            };
            WsMessage::Ack(ack)
        }
        Ok(_) => WsMessage::Error(WireError::new(
            "unexpected_message",
            "only sendMessage is accepted from clients",
        )),
        Err(e) => {
            debug!(user_id, error = %e, "malformed frame");
            WsMessage::Error(WireError::new("bad_request", format!("invalid frame: {}", e)))
        }
    };
    // attesa limitata: se il writer si ferma, rx viene chiuso e send fallisce
    let _ = tx.send(reply).await;
}
