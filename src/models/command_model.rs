use serde::{Deserialize, Serialize};

/// Mensaje recibido por el bot central (webhook del gateway)
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    /// Número del remitente, con o sin sufijo "@c.us"
    pub from: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub handled: bool,
    pub command: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    Audio,
    Image,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    SetTemplate(String),
    ShowTemplate,
    StartCampaign { start: usize, end: usize },
    Search(String),
    Delete(DeleteTarget),
    /// Comando reconocido pero con argumentos inválidos; lleva la respuesta
    Invalid(String),
}
