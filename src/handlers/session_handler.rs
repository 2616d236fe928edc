//! handlers/session_handler.rs
use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::{
    config::campaign_config::CampaignConfig,
    models::session_model::{CreateSessionRequest, SessionEvent, SessionStatusResponse},
    services::{
        gateway_session::GatewaySession,
        session_registry::{SessionHandle, SessionRegistry},
        tenant_files::sanitize_identifier,
    },
};

async fn status_of(username: &str, session: &dyn SessionHandle) -> SessionStatusResponse {
    let state = match session.connection_state().await {
        Ok(state) => state,
        Err(e) => {
            log::warn!("(status_of) No se pudo consultar el gateway para {}: {:?}", username, e);
            session.lifecycle().state()
        }
    };
    SessionStatusResponse {
        username: username.to_string(),
        state,
        tenant_address: session.lifecycle().tenant_address(),
    }
}

fn session_not_found(username: &str) -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "error": "Session not found",
        "details": format!("No hay sesión para '{}'", username)
    }))
}

/// POST /api/sessions
pub async fn create_session_endpoint(
    body: web::Json<CreateSessionRequest>,
    registry: web::Data<SessionRegistry>,
    config: web::Data<CampaignConfig>,
    http_client: web::Data<reqwest::Client>,
) -> HttpResponse {
    let username = sanitize_identifier(&body.username);
    if username.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "error": "Invalid username",
            "details": "El nombre de usuario no puede estar vacío"
        }));
    }

    if let Some(existing) = registry.get(&username) {
        return HttpResponse::Ok().json(status_of(&username, existing.as_ref()).await);
    }

    let gateway_url = match &config.gateway_url {
        Some(url) => url,
        None => {
            return HttpResponse::ServiceUnavailable().json(json!({
                "error": "Gateway not configured",
                "details": "Define WHATSAPP_API_URL para crear sesiones"
            }))
        }
    };

    let session = Arc::new(GatewaySession::new(
        http_client.get_ref().clone(),
        gateway_url,
        config.gateway_api_key.clone(),
        &username,
    ));
    if let Err(e) = session.start().await {
        log::error!("(create_session_endpoint) Error iniciando sesión {}: {:?}", username, e);
        return HttpResponse::BadGateway().json(json!({
            "error": "Gateway error",
            "details": format!("{:?}", e)
        }));
    }

    let handle = registry.register(&username, session);
    HttpResponse::Created().json(status_of(&username, handle.as_ref()).await)
}

/// GET /api/sessions/{username}
pub async fn get_session_endpoint(
    path: web::Path<String>,
    registry: web::Data<SessionRegistry>,
) -> HttpResponse {
    let username = sanitize_identifier(&path.into_inner());
    match registry.get(&username) {
        Some(session) => HttpResponse::Ok().json(status_of(&username, session.as_ref()).await),
        None => session_not_found(&username),
    }
}

/// DELETE /api/sessions/{username}
pub async fn delete_session_endpoint(
    path: web::Path<String>,
    registry: web::Data<SessionRegistry>,
) -> HttpResponse {
    let username = sanitize_identifier(&path.into_inner());
    let session = match registry.remove(&username) {
        Some(session) => session,
        None => return session_not_found(&username),
    };

    if let Err(e) = session.shutdown().await {
        log::warn!("(delete_session_endpoint) Error cerrando sesión {}: {:?}", username, e);
    }
    log::info!("(delete_session_endpoint) Sesión {} eliminada", username);
    HttpResponse::NoContent().finish()
}

/// POST /api/sessions/{username}/events (webhook del gateway)
pub async fn session_event_endpoint(
    path: web::Path<String>,
    body: web::Json<SessionEvent>,
    registry: web::Data<SessionRegistry>,
) -> HttpResponse {
    let username = sanitize_identifier(&path.into_inner());
    let session = match registry.get(&username) {
        Some(session) => session,
        None => return session_not_found(&username),
    };

    let event = body.into_inner();
    log::info!("(session_event_endpoint) {} recibió {:?}", username, event);
    match session.lifecycle().apply(event) {
        Ok(_) => HttpResponse::Ok().json(status_of(&username, session.as_ref()).await),
        Err(e) => HttpResponse::Conflict().json(json!({
            "error": "Invalid transition",
            "details": format!("{}", e)
        })),
    }
}
