//! handlers/mod.rs
//! Endpoints HTTP: capa delgada sobre los servicios.

use actix_web::{HttpRequest, HttpResponse};
use serde_json::json;

use crate::services::{phone_normalizer::tenant_key, progress_reporter::ChannelIdentity};

pub mod campaign_handler;
pub mod command_handler;
pub mod contact_handler;
pub mod session_handler;
pub mod tenant_handler;

pub const TENANT_HEADER: &str = "X-Tenant-Address";
pub const USERNAME_HEADER: &str = "X-Username";

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Identidad del operador según los encabezados de la petición.
/// El tenant queda en su clave canónica (solo dígitos).
pub fn identity_from(req: &HttpRequest) -> ChannelIdentity {
    ChannelIdentity {
        tenant_address: header_value(req, TENANT_HEADER).and_then(|t| tenant_key(&t)),
        username: header_value(req, USERNAME_HEADER),
    }
}

pub fn missing_tenant_response() -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "error": "Missing tenant",
        "details": format!("Falta el encabezado {}", TENANT_HEADER)
    }))
}

pub fn invalid_tenant_response(raw: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "error": "Invalid tenant",
        "details": format!("'{}' no es un número de WhatsApp válido", raw)
    }))
}

pub fn internal_error_response(e: &anyhow::Error) -> HttpResponse {
    HttpResponse::InternalServerError().json(json!({
        "error": "Internal server error",
        "details": format!("{:?}", e)
    }))
}
