use serde::{Deserialize, Serialize};

use crate::error::CampaignError;

/// Petición de inicio de campaña (HTTP, comando o canal en vivo)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCampaignRequest {
    /// Opcional si se resuelve desde la identidad del canal
    pub tenant_address: Option<String>,
    pub actor_username: Option<String>,
    /// Primera fila de datos (base 1, inclusiva)
    pub range_start: usize,
    /// Última fila de datos (base 1, inclusiva)
    pub range_end: usize,
    /// Acepta @fullname, @name, @id, @branch (y @nomecompleto, @nome, @cpf, @agencia)
    pub message_template: String,
    pub list_source: ListSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListSource {
    File {
        #[serde(rename = "fileName")]
        file_name: String,
    },
    Table {
        #[serde(rename = "tableName")]
        table_name: String,
    },
}

impl ListSource {
    pub fn describe(&self) -> &str {
        match self {
            ListSource::File { file_name } => file_name,
            ListSource::Table { table_name } => table_name,
        }
    }
}

/// Celda cruda tal como llega de la lista importada.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Empty,
}

impl CellValue {
    pub fn from_json(value: &serde_json::Value) -> CellValue {
        match value {
            serde_json::Value::Null => CellValue::Empty,
            serde_json::Value::String(s) if s.is_empty() => CellValue::Empty,
            serde_json::Value::String(s) => CellValue::Text(s.clone()),
            serde_json::Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Empty),
            serde_json::Value::Bool(b) => CellValue::Text(b.to_string()),
            other => CellValue::Text(other.to_string()),
        }
    }

    /// Representación textual; los números enteros van sin decimales.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Empty => String::new(),
        }
    }
}

/// Fila efímera de la campaña, ya normalizada. Nunca contiene nulos.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampaignRow {
    pub name: String,
    pub identifier: String,
    pub branch: String,
    pub birth_date: String,
    pub area_codes: [String; 3],
    pub local_numbers: [String; 3],
    pub phones: [String; 3],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CampaignStats {
    pub processed: u32,
    pub succeeded: u32,
    pub no_channel_presence: u32,
    pub skipped_recent: u32,
    pub no_contact_info: u32,
    pub missing_identifier: u32,
    pub failed: u32,
}

impl CampaignStats {
    pub fn record(&mut self, outcome: &RowOutcome) {
        self.processed += 1;
        match outcome {
            RowOutcome::Sent { .. } => self.succeeded += 1,
            RowOutcome::NoChannelPresence => self.no_channel_presence += 1,
            // los intentos fallidos ya suman en `failed`
            RowOutcome::DeliveryFailed => {}
            RowOutcome::IgnoredRecent => self.skipped_recent += 1,
            RowOutcome::NoContactInfo => self.no_contact_info += 1,
            RowOutcome::MissingIdentifier => self.missing_identifier += 1,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "\n---------------------------------\n\
             🏁 *¡Campaña finalizada!* 🏁\n\
             - *Total procesado:* {}\n\
             - *✅ Enviados con éxito:* {}\n\
             - *⭕ Sin WhatsApp:* {}\n\
             - *🟡 Ignorados (envío reciente):* {}\n\
             - *🚫 Sin contacto válido:* {}\n\
             - *❔ Sin CPF:* {}\n\
             - *❗ Fallos de envío:* {}\n\
             ---------------------------------",
            self.processed,
            self.succeeded,
            self.no_channel_presence,
            self.skipped_recent,
            self.no_contact_info,
            self.missing_identifier,
            self.failed
        )
    }
}

/// Resultado de despachar una fila
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Sent { address: String },
    NoChannelPresence,
    /// Hubo candidatos en la red pero todos los envíos fallaron
    DeliveryFailed,
    IgnoredRecent,
    NoContactInfo,
    MissingIdentifier,
}

/// Lo que devuelve `start_campaign`; ningún error escapa como `Err`.
#[derive(Debug)]
pub enum CampaignOutcome {
    Rejected(CampaignError),
    Completed(CampaignStats),
    Aborted {
        stats: CampaignStats,
        error: CampaignError,
    },
}

impl CampaignOutcome {
    pub fn stats(&self) -> Option<&CampaignStats> {
        match self {
            CampaignOutcome::Rejected(_) => None,
            CampaignOutcome::Completed(stats) => Some(stats),
            CampaignOutcome::Aborted { stats, .. } => Some(stats),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    pub mimetype: String,
    pub filename: String,
    pub data: Vec<u8>,
}

/// Respuesta de POST /api/campaigns/start
#[derive(Debug, Clone, Serialize)]
pub struct StartCampaignResponse {
    pub accepted: bool,
    pub tenant_address: String,
    pub message: String,
}
