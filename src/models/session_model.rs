use serde::{Deserialize, Serialize};

use crate::models::campaign_model::MediaAttachment;

/// Estados de la sesión de mensajería. Solo en `Connected` se puede disparar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Initializing,
    AwaitingScan,
    Connected,
    Disconnected,
}

/// Notificaciones del gateway (webhook) que mueven la máquina de estados
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Qr,
    Ready { number: Option<String> },
    Disconnected { reason: Option<String> },
    Restart,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessagePayload {
    Text(String),
    Media(MediaAttachment),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Leyenda en el mismo mensaje (solo imágenes)
    pub caption: Option<String>,
    pub send_audio_as_voice: bool,
}

/// Body de POST /api/sessions
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionRequest {
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatusResponse {
    pub username: String,
    pub state: SessionState,
    pub tenant_address: Option<String>,
}
