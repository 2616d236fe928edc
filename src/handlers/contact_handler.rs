//! handlers/contact_handler.rs
use actix_web::{web, HttpRequest, HttpResponse};

use crate::{
    handlers::{identity_from, internal_error_response, missing_tenant_response},
    models::contact_model::ContactQuery,
    services::contact_store::SqliteContactStore,
};

/// GET /api/contacts?filter=recent|birthdays_today|birthdays_month|oldest_hundred&search=
pub async fn list_contacts_endpoint(
    req: HttpRequest,
    query: web::Query<ContactQuery>,
    store: web::Data<SqliteContactStore>,
) -> HttpResponse {
    let tenant = match identity_from(&req).tenant_address {
        Some(tenant) => tenant,
        None => return missing_tenant_response(),
    };
    let query = query.into_inner();
    let filter = query.filter.unwrap_or_default();
    let search = query.search.unwrap_or_default();

    match store.search_contacts(&tenant, filter, &search).await {
        Ok(contacts) => HttpResponse::Ok().json(contacts),
        Err(e) => internal_error_response(&e),
    }
}

/// GET /api/stats
pub async fn send_stats_endpoint(req: HttpRequest, store: web::Data<SqliteContactStore>) -> HttpResponse {
    let tenant = match identity_from(&req).tenant_address {
        Some(tenant) => tenant,
        None => return missing_tenant_response(),
    };

    match store.send_stats(&tenant).await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => internal_error_response(&e),
    }
}
