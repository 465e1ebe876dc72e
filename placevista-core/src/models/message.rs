use serde::{Deserialize, Serialize};

/// Posizione totale di un messaggio, assegnata dal server al momento della persistenza.
pub type MessageId = i64;

/// Messaggio persistito dal server e notificato via WS.
/// Immutabile una volta salvato: `id` e `created_at` non arrivano mai dal client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub author_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub created_at: String, // RFC3339 UTC
}

/// Contenuto proposto da un client, prima della validazione e della persistenza.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInput {
    #[serde(default)]
    pub author_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl MessageInput {
    pub fn text(author_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn attachment(author_id: impl Into<String>, attachment_ref: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            attachment_ref: Some(attachment_ref.into()),
            ..Self::default()
        }
    }
}

/// Geolocalizzazione: coordinate strutturate oppure descrizione libera del luogo.
/// Sul wire una descrizione è una semplice stringa JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    Coordinates { latitude: f64, longitude: f64 },
    Place(String),
}

impl Location {
    /// True se le coordinate sono finite e dentro i limiti geografici.
    /// Una descrizione testuale è valida se non è vuota.
    pub fn is_valid(&self) -> bool {
        match self {
            Location::Coordinates { latitude, longitude } => {
                latitude.is_finite()
                    && longitude.is_finite()
                    && (-90.0..=90.0).contains(latitude)
                    && (-180.0..=180.0).contains(longitude)
            }
            Location::Place(place) => !place.trim().is_empty(),
        }
    }
}
