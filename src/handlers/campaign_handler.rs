//! handlers/campaign_handler.rs
use std::convert::Infallible;

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

use crate::{
    error::CampaignError,
    handlers::{identity_from, missing_tenant_response},
    models::campaign_model::{StartCampaignRequest, StartCampaignResponse},
    services::{
        campaign_service::CampaignService,
        event_hub::EventHub,
        phone_normalizer::tenant_key,
        progress_reporter::CampaignChannel,
    },
};

/// POST /api/campaigns/start
pub async fn start_campaign_endpoint(
    req: HttpRequest,
    body: web::Json<StartCampaignRequest>,
    campaigns: web::Data<CampaignService>,
    events: web::Data<EventHub>,
) -> HttpResponse {
    let identity = identity_from(&req);
    let start_req = body.into_inner();

    let tenant = match start_req
        .tenant_address
        .as_deref()
        .and_then(tenant_key)
        .or_else(|| identity.tenant_address.clone())
    {
        Some(tenant) => tenant,
        None => return missing_tenant_response(),
    };

    // Respuesta rápida; la verificación atómica la hace el servicio
    if campaigns.runs().is_active(&tenant) {
        let err = CampaignError::CampaignAlreadyRunning(tenant.clone());
        return HttpResponse::Conflict().json(json!({
            "error": "Campaign already running",
            "details": err.user_message()
        }));
    }

    let channel = CampaignChannel {
        identity,
        reply: None,
        events: Some(events.sink_for(&tenant)),
    };

    let service = campaigns.get_ref().clone();
    tokio::spawn(async move {
        let outcome = service.start_campaign(start_req, channel).await;
        log::info!("(start_campaign_endpoint) Resultado: {:?}", outcome);
    });

    HttpResponse::Accepted().json(StartCampaignResponse {
        accepted: true,
        tenant_address: tenant,
        message: "Campaña en cola; sigue el progreso en /api/campaigns/events".to_string(),
    })
}

/// GET /api/campaigns/events (server-sent events)
pub async fn campaign_events_endpoint(req: HttpRequest, events: web::Data<EventHub>) -> HttpResponse {
    let tenant = match identity_from(&req).tenant_address {
        Some(tenant) => tenant,
        None => return missing_tenant_response(),
    };
    log::info!("(campaign_events_endpoint) Nuevo suscriptor para {}", tenant);

    let rx = events.subscribe(&tenant);
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((Ok::<_, Infallible>(web::Bytes::from(event.to_sse())), rx)),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("(campaign_events_endpoint) Suscriptor atrasado, {} eventos perdidos", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream)
}
