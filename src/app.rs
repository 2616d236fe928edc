//! app.rs
use crate::handlers::{campaign_handler, command_handler, contact_handler, session_handler, tenant_handler};
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/campaigns")
                    .route("/start", web::post().to(campaign_handler::start_campaign_endpoint))
                    .route("/events", web::get().to(campaign_handler::campaign_events_endpoint)),
            )
            .route("/contacts", web::get().to(contact_handler::list_contacts_endpoint))
            .route("/stats", web::get().to(contact_handler::send_stats_endpoint))
            .route("/commands", web::post().to(command_handler::handle_command_endpoint))
            .service(
                web::scope("/sessions")
                    .route("", web::post().to(session_handler::create_session_endpoint))
                    .route("/{username}", web::get().to(session_handler::get_session_endpoint))
                    .route(
                        "/{username}",
                        web::delete().to(session_handler::delete_session_endpoint),
                    )
                    .route(
                        "/{username}/events",
                        web::post().to(session_handler::session_event_endpoint),
                    ),
            )
            .service(
                web::scope("/tenants/{tenant}")
                    .route(
                        "/lists/{file}",
                        web::put().to(tenant_handler::upload_list_endpoint),
                    )
                    .route("/media", web::put().to(tenant_handler::upload_media_endpoint))
                    .route(
                        "/template",
                        web::put().to(tenant_handler::save_template_endpoint),
                    )
                    .route(
                        "/tables/{table}",
                        web::post().to(tenant_handler::import_table_endpoint),
                    ),
            ),
    );
}
