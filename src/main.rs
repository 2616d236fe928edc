use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use dotenv::dotenv;

use crate::config::campaign_config::CampaignConfig;
use crate::config::field_mapping::AliasTable;
use crate::logger::init_logger;
use crate::services::campaign_service::CampaignService;
use crate::services::command_service::CommandService;
use crate::services::contact_store::SqliteContactStore;
use crate::services::event_hub::EventHub;
use crate::services::gateway_session::GatewaySession;
use crate::services::run_tracker::RunTracker;
use crate::services::session_registry::SessionRegistry;
use crate::services::tenant_files::TenantFiles;

mod app;
mod config;
mod error;
mod handlers;
mod logger;
mod models;
mod services;

#[cfg(test)]
mod tests;

// Listas y media llegan en el cuerpo de la petición
const MAX_PAYLOAD_BYTES: usize = 32 * 1024 * 1024;

fn load_aliases(config: &CampaignConfig) -> AliasTable {
    match &config.field_mapping_path {
        Some(path) => {
            log::info!("Cargando mapeo de columnas desde {:?}", path);
            AliasTable::from_file(path).expect("No se pudo leer el mapeo de columnas")
        }
        None => AliasTable::default(),
    }
}

/// Registra e inicia la sesión del bot central que recibe los comandos.
fn start_central_bot(config: &CampaignConfig, registry: &SessionRegistry, http_client: &reqwest::Client) {
    let gateway_url = match &config.gateway_url {
        Some(url) => url,
        None => {
            log::warn!("WHATSAPP_API_URL no definido; el bot central y las sesiones quedan deshabilitados");
            return;
        }
    };

    let bot = Arc::new(GatewaySession::new(
        http_client.clone(),
        gateway_url,
        config.gateway_api_key.clone(),
        &config.central_bot_session,
    ));
    registry.register(&config.central_bot_session, bot.clone());

    tokio::spawn(async move {
        if let Err(e) = bot.start().await {
            log::error!("No se pudo iniciar el bot central: {:?}", e);
        }
    });
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let config = CampaignConfig::from_env().expect("Configuración inválida");
    std::fs::create_dir_all(&config.user_data_dir)?;
    log::info!("Datos de usuarios en {:?}", config.user_data_dir);

    let aliases = load_aliases(&config);
    let http_client = reqwest::Client::new();

    let store = SqliteContactStore::new(config.user_data_dir.clone());
    let files = TenantFiles::new(config.user_data_dir.clone());
    let sessions = SessionRegistry::new();
    let runs = RunTracker::new();
    let events = EventHub::new();

    let campaign_service = CampaignService::new(
        &config,
        store.clone(),
        files.clone(),
        sessions.clone(),
        runs,
        aliases,
    );
    let command_service = CommandService::new(
        campaign_service.clone(),
        sessions.clone(),
        files.clone(),
        store.clone(),
        events.clone(),
        &config.central_bot_session,
    );

    start_central_bot(&config, &sessions, &http_client);

    let bind_addr = config.bind_addr.clone();
    let port = config.port;
    let shared_config = web::Data::new(config);
    let server_store = store.clone();

    // Levantar servidor
    log::info!("Levantando servidor en {}:{}", bind_addr, port);
    HttpServer::new(move || {
        App::new()
            .app_data(web::PayloadConfig::new(MAX_PAYLOAD_BYTES))
            .app_data(web::JsonConfig::default().limit(MAX_PAYLOAD_BYTES))
            .app_data(shared_config.clone())
            .app_data(web::Data::new(http_client.clone()))
            .app_data(web::Data::new(server_store.clone()))
            .app_data(web::Data::new(files.clone()))
            .app_data(web::Data::new(sessions.clone()))
            .app_data(web::Data::new(events.clone()))
            .app_data(web::Data::new(campaign_service.clone()))
            .app_data(web::Data::new(command_service.clone()))
            .configure(app::init_app)
    })
    .bind((bind_addr.as_str(), port))?
    .run()
    .await?;

    store.close_all().await;
    Ok(())
}
