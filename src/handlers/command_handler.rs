//! handlers/command_handler.rs
use actix_web::{web, HttpResponse};

use crate::{
    handlers::internal_error_response, models::command_model::CommandRequest,
    services::command_service::CommandService,
};

/// POST /api/commands (mensajes entrantes del bot central)
pub async fn handle_command_endpoint(
    body: web::Json<CommandRequest>,
    commands: web::Data<CommandService>,
) -> HttpResponse {
    match commands.handle(body.into_inner()).await {
        Ok(resp) => HttpResponse::Ok().json(resp),
        Err(e) => {
            log::error!("(handle_command_endpoint) Error procesando comando: {:?}", e);
            internal_error_response(&e)
        }
    }
}
