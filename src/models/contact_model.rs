use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contacto persistido en la base del tenant (clave única: identifier).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub identifier: String,
    pub name: String,
    pub branch: String,
    /// Dirección que funcionó en el último envío
    pub chosen_address: String,
    /// "dd/mm/yyyy" o vacío
    pub birth_date: String,
    pub last_sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendOutcome {
    #[serde(rename = "SENT")]
    Sent,
    #[serde(rename = "NO_WHATSAPP")]
    NoWhatsapp,
    #[serde(rename = "FAILED")]
    Failed,
}

impl SendOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendOutcome::Sent => "SENT",
            SendOutcome::NoWhatsapp => "NO_WHATSAPP",
            SendOutcome::Failed => "FAILED",
        }
    }

    pub fn parse(raw: &str) -> Option<SendOutcome> {
        match raw {
            "SENT" => Some(SendOutcome::Sent),
            "NO_WHATSAPP" => Some(SendOutcome::NoWhatsapp),
            "FAILED" => Some(SendOutcome::Failed),
            _ => None,
        }
    }
}

/// Registro de auditoría (solo se agrega, nunca se modifica)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendLogEntry {
    pub contact_identifier: String,
    pub outcome: SendOutcome,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactFilter {
    #[default]
    Recent,
    BirthdaysToday,
    BirthdaysMonth,
    OldestHundred,
}

/// Query de GET /api/contacts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactQuery {
    pub filter: Option<ContactFilter>,
    pub search: Option<String>,
}
