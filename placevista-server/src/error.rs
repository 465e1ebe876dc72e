use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use placevista_core::Error as WireError;
use tracing::error;

/// Errori restituiti a chi invia un messaggio o apre una sessione.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Input senza autore o senza alcun contenuto: rifiutato prima di toccare il DB.
    #[error("invalid message: {0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    /// Colonna `location` non (de)serializzabile.
    #[error("storage encoding failure: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Lo snapshot iniziale non è arrivato alla connessione appena registrata.
    #[error("snapshot delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

pub type Result<T> = core::result::Result<T, RelayError>;

impl RelayError {
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Validation(_) => "validation_error",
            RelayError::Storage(_) | RelayError::Encoding(_) => "storage_error",
            RelayError::Delivery(_) => "delivery_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::Storage(_) | RelayError::Encoding(_) | RelayError::Delivery(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Forma wire condivisa con i client. I dettagli dei guasti interni restano nei log.
    pub fn to_wire(&self) -> WireError {
        match self {
            RelayError::Validation(_) => WireError::new(self.code(), self.to_string()),
            RelayError::Storage(_) | RelayError::Encoding(_) => {
                WireError::new(self.code(), "message storage is unavailable")
            }
            RelayError::Delivery(_) => WireError::new(self.code(), "could not deliver history"),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            error!(error = %self, "request failed");
        }
        (self.status(), Json(self.to_wire())).into_response()
    }
}

/// Fallimento di consegna verso una singola connessione. Resta isolato:
/// non arriva mai a chi ha inviato il messaggio.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("connection closed")]
    Closed,
    #[error("outbound queue full")]
    Lagged,
}
