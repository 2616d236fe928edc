//! error.rs
//! Errores del motor de campañas. Cada variante tiene un único mensaje
//! legible para el operador (ver `user_message`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("identidad no resuelta: {0}")]
    IdentityUnresolved(&'static str),

    #[error("ya hay una campaña en curso para {0}")]
    CampaignAlreadyRunning(String),

    #[error("la sesión de {0} no está lista")]
    SessionNotReady(String),

    #[error("lista vacía o inexistente: {0}")]
    EmptyOrMissingList(String),

    #[error("falta la columna obligatoria '{0}'")]
    MissingRequiredColumn(String),

    #[error("rango inválido: {start}..{end}")]
    InvalidRange { start: usize, end: usize },

    #[error("fallo inesperado durante la campaña: {0:#}")]
    UnexpectedRunFailure(anyhow::Error),
}

impl CampaignError {
    /// Mensaje que se envía al canal que disparó la campaña.
    pub fn user_message(&self) -> String {
        match self {
            CampaignError::IdentityUnresolved(what) => {
                format!("❌ Error: no se pudo identificar {} para la campaña.", what)
            }
            CampaignError::CampaignAlreadyRunning(_) => {
                "🟡 Atención: ya hay una campaña en curso. Espera a que finalice.".to_string()
            }
            CampaignError::SessionNotReady(_) => {
                "❌ Error: la sesión de WhatsApp no está conectada. Escanea el código QR e inténtalo de nuevo."
                    .to_string()
            }
            CampaignError::EmptyOrMissingList(source) => {
                format!("❌ Error: la lista '{}' no existe o no contiene datos.", source)
            }
            CampaignError::MissingRequiredColumn(field) => {
                format!("❌ Error: la planilla necesita una columna para '{}'.", field)
            }
            CampaignError::InvalidRange { .. } => {
                "❌ Formato inválido. Usa un rango [inicio] [fin] con inicio >= 1 y fin >= inicio."
                    .to_string()
            }
            CampaignError::UnexpectedRunFailure(_) => {
                "❌ Ocurrió un error inesperado durante la campaña. Revisa los logs del servidor."
                    .to_string()
            }
        }
    }

    /// Los errores previos al arranque no generan resumen ni evento de cierre.
    pub fn is_pre_flight(&self) -> bool {
        !matches!(self, CampaignError::UnexpectedRunFailure(_))
    }
}
