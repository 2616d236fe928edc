//! handlers/tenant_handler.rs
//! Subida de listas, media, texto y tablas de un tenant.

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::{
    handlers::{internal_error_response, invalid_tenant_response},
    models::campaign_model::CellValue,
    services::{contact_store::SqliteContactStore, phone_normalizer::tenant_key, tenant_files::TenantFiles},
};

#[derive(Deserialize)]
pub struct TemplateBody {
    text: String,
}

fn bad_request(error: &str, details: String) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "error": error, "details": details }))
}

/// PUT /api/tenants/{tenant}/lists/{file}
pub async fn upload_list_endpoint(
    path: web::Path<(String, String)>,
    body: web::Bytes,
    files: web::Data<TenantFiles>,
) -> HttpResponse {
    let (raw_tenant, file_name) = path.into_inner();
    let tenant = match tenant_key(&raw_tenant) {
        Some(tenant) => tenant,
        None => return invalid_tenant_response(&raw_tenant),
    };

    // Se valida antes de guardar para no dejar listas corruptas
    if let Err(e) = serde_json::from_slice::<Vec<Vec<serde_json::Value>>>(&body) {
        return bad_request("Invalid list", format!("La lista debe ser un arreglo de filas: {}", e));
    }

    match files.save_list(&tenant, &file_name, &body) {
        Ok(_) => HttpResponse::Ok().json(json!({ "success": true, "file": file_name })),
        Err(e) => internal_error_response(&e),
    }
}

/// PUT /api/tenants/{tenant}/media (Content-Type = mimetype de la media)
pub async fn upload_media_endpoint(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    files: web::Data<TenantFiles>,
) -> HttpResponse {
    let raw_tenant = path.into_inner();
    let tenant = match tenant_key(&raw_tenant) {
        Some(tenant) => tenant,
        None => return invalid_tenant_response(&raw_tenant),
    };
    let mimetype = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if body.is_empty() {
        return bad_request("Empty media", "El cuerpo de la petición está vacío".to_string());
    }

    match files.save_media(&tenant, &mimetype, &body) {
        Ok(saved) => HttpResponse::Ok().json(json!({
            "success": true,
            "file": saved.file_name().and_then(|n| n.to_str()).unwrap_or_default()
        })),
        Err(e) => bad_request("Invalid media", format!("{}", e)),
    }
}

/// PUT /api/tenants/{tenant}/template
pub async fn save_template_endpoint(
    path: web::Path<String>,
    body: web::Json<TemplateBody>,
    files: web::Data<TenantFiles>,
) -> HttpResponse {
    let raw_tenant = path.into_inner();
    let tenant = match tenant_key(&raw_tenant) {
        Some(tenant) => tenant,
        None => return invalid_tenant_response(&raw_tenant),
    };
    let text = body.into_inner().text;
    if text.trim().is_empty() {
        return bad_request("Empty template", "El texto no puede estar vacío".to_string());
    }

    match files.save_template(&tenant, &text) {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => internal_error_response(&e),
    }
}

/// POST /api/tenants/{tenant}/tables/{table}
pub async fn import_table_endpoint(
    path: web::Path<(String, String)>,
    body: web::Json<Vec<Vec<serde_json::Value>>>,
    store: web::Data<SqliteContactStore>,
) -> HttpResponse {
    let (raw_tenant, table) = path.into_inner();
    let tenant = match tenant_key(&raw_tenant) {
        Some(tenant) => tenant,
        None => return invalid_tenant_response(&raw_tenant),
    };
    let rows: Vec<Vec<CellValue>> = body
        .iter()
        .map(|row| row.iter().map(CellValue::from_json).collect())
        .collect();

    match store.import_table(&tenant, &table, &rows).await {
        Ok(inserted) => HttpResponse::Ok().json(json!({ "success": true, "rows": inserted })),
        Err(e) => internal_error_response(&e),
    }
}
