//! config/campaign_config.rs
//! Configuración global del servicio de campañas (valores por defecto + .env).

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, Result};

#[derive(Debug, Clone)]
pub struct CampaignConfig {
    /// Carpeta base con un subdirectorio por tenant (listas, media, base de datos)
    pub user_data_dir: PathBuf,
    /// URL base del gateway de WhatsApp (None => no se pueden crear sesiones reales)
    pub gateway_url: Option<String>,
    pub gateway_api_key: Option<String>,
    /// Sesión del bot central que recibe comandos y responde a los usuarios
    pub central_bot_session: String,
    pub country_code: String,
    pub recency_window_days: i64,
    pub pacing_base: Duration,
    pub pacing_jitter: Duration,
    /// Pausa entre el texto y el audio cuando la media es de voz
    pub audio_pause: Duration,
    /// Cero => si la sesión no está conectada se rechaza de inmediato
    pub session_ready_wait: Duration,
    pub field_mapping_path: Option<PathBuf>,
    pub bind_addr: String,
    pub port: u16,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        CampaignConfig {
            user_data_dir: PathBuf::from("user"),
            gateway_url: None,
            gateway_api_key: None,
            central_bot_session: "bot-central".to_string(),
            country_code: "55".to_string(),
            recency_window_days: 90,
            pacing_base: Duration::from_millis(3000),
            pacing_jitter: Duration::from_millis(2000),
            audio_pause: Duration::from_millis(500),
            session_ready_wait: Duration::ZERO,
            field_mapping_path: None,
            bind_addr: "0.0.0.0".to_string(),
            port: 5022,
        }
    }
}

impl CampaignConfig {
    /// Lee la configuración desde variables de entorno (ya cargadas con dotenv).
    pub fn from_env() -> Result<Self> {
        let defaults = CampaignConfig::default();

        Ok(CampaignConfig {
            user_data_dir: env::var("USER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.user_data_dir),
            gateway_url: non_empty_var("WHATSAPP_API_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            gateway_api_key: non_empty_var("WHATSAPP_API_KEY"),
            central_bot_session: non_empty_var("CENTRAL_BOT_SESSION")
                .unwrap_or(defaults.central_bot_session),
            country_code: non_empty_var("COUNTRY_CODE").unwrap_or(defaults.country_code),
            recency_window_days: parse_var("RECENCY_WINDOW_DAYS")?
                .unwrap_or(defaults.recency_window_days),
            pacing_base: parse_var::<u64>("PACING_BASE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.pacing_base),
            pacing_jitter: parse_var::<u64>("PACING_JITTER_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.pacing_jitter),
            audio_pause: parse_var::<u64>("AUDIO_PAUSE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.audio_pause),
            session_ready_wait: parse_var::<u64>("SESSION_READY_WAIT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_ready_wait),
            field_mapping_path: non_empty_var("FIELD_MAPPING_PATH").map(PathBuf::from),
            bind_addr: non_empty_var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parse_var("PORT")?.unwrap_or(defaults.port),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match non_empty_var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow!("Valor inválido para {}: '{}'", name, raw)),
        None => Ok(None),
    }
}
