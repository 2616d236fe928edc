//! services/command_service.rs
//! Comandos que llegan por WhatsApp al bot central. Las respuestas viajan por
//! la sesión del bot central al mismo chat del remitente.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::{
    models::{
        campaign_model::{ListSource, StartCampaignRequest},
        command_model::{Command, CommandRequest, CommandResponse, DeleteTarget},
        contact_model::{Contact, ContactFilter},
        session_model::{MessagePayload, SendOptions},
    },
    services::{
        campaign_service::CampaignService,
        contact_store::SqliteContactStore,
        event_hub::EventHub,
        phone_normalizer::tenant_key,
        progress_reporter::{CampaignChannel, ChannelIdentity, ReplyTarget},
        session_registry::{SessionHandle, SessionRegistry},
        tenant_files::{TenantFiles, DEFAULT_LIST_FILE},
    },
};

const HELP_TEXT: &str = "*COMANDOS DISPONIBLES*\n\n\
    Define tu texto con:\n\
    *!texto* (tu mensaje)\n\
    Usa @nome, @nomecompleto, @agencia, @cpf\n\n\
    *.ver* muestra el texto guardado\n\
    Para borrar usa *.del (imagem/audio/lista)*\n\n\
    Iniciar el envío de la lista:\n\
    *.envio (inicio) (fin)*\n\n\
    *!buscar* (cpf/nombre/teléfono)\n";

const NOT_ASSOCIATED: &str =
    "❌ Tu número no está asociado a ninguna sesión. Inicia sesión en el panel y escanea el código QR.";

/// Interpreta el texto del mensaje. `None` si no es un comando conocido.
pub fn parse_command(body: &str) -> Option<Command> {
    let body = body.trim();
    let (keyword, rest) = match body.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (body, ""),
    };

    let command = match keyword.to_lowercase().as_str() {
        "!ajuda" => Command::Help,
        "!texto" if rest.is_empty() => {
            Command::Invalid("❌ Debes escribir el texto del mensaje. Uso: `!texto [tu mensaje]`".to_string())
        }
        "!texto" => Command::SetTemplate(rest.to_string()),
        ".ver" => Command::ShowTemplate,
        ".envio" | ".enviar" => parse_range(keyword, rest),
        "!buscar" if rest.is_empty() => Command::Invalid(
            "Indica un CPF, nombre o teléfono para buscar.\n\n*Ejemplo:* `!buscar 123.456.789-00`".to_string(),
        ),
        "!buscar" => Command::Search(rest.to_string()),
        ".del" => match rest.to_lowercase().as_str() {
            "audio" => Command::Delete(DeleteTarget::Audio),
            "imagem" => Command::Delete(DeleteTarget::Image),
            "lista" => Command::Delete(DeleteTarget::List),
            _ => Command::Invalid("Comando inválido. Usa: `.del [audio|imagem|lista]`".to_string()),
        },
        _ => return None,
    };
    Some(command)
}

fn parse_range(keyword: &str, args: &str) -> Command {
    let mut parts = args.split_whitespace().map(|p| p.parse::<usize>());
    match (parts.next(), parts.next()) {
        (Some(Ok(start)), Some(Ok(end))) if start >= 1 && end >= start => Command::StartCampaign { start, end },
        _ => Command::Invalid(format!(
            "Formato inválido. Usa: `{} [fila_inicial] [fila_final]`. Ej: `{} 2 100`",
            keyword, keyword
        )),
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Help => "help",
        Command::SetTemplate(_) => "set_template",
        Command::ShowTemplate => "show_template",
        Command::StartCampaign { .. } => "start_campaign",
        Command::Search(_) => "search",
        Command::Delete(_) => "delete",
        Command::Invalid(_) => "invalid",
    }
}

fn format_contacts(contacts: &[Contact]) -> String {
    let mut reply = String::from("*✅ Cliente(s) encontrado(s)*\n\n");
    for c in contacts {
        let or_na = |v: &str| if v.is_empty() { "N/A".to_string() } else { v.to_string() };
        let last = c
            .last_sent_at
            .map(|ts| ts.format("%d/%m/%Y").to_string())
            .unwrap_or_else(|| "Ninguno".to_string());
        reply.push_str(&format!(
            "*Nombre:* {}\n*CPF:* {}\n*Teléfono:* {}\n*Nacimiento:* {}\n*Agencia:* {}\n*Último contacto:* {}\n\n",
            or_na(&c.name),
            or_na(&c.identifier),
            or_na(&c.chosen_address),
            or_na(&c.birth_date),
            or_na(&c.branch),
            last
        ));
    }
    reply
}

/// Responde en el chat del remitente a través de la sesión del bot central.
pub struct CommandThread {
    session: Arc<dyn SessionHandle>,
    chat: String,
}

impl CommandThread {
    pub fn new(session: Arc<dyn SessionHandle>, chat: &str) -> Self {
        CommandThread {
            session,
            chat: chat.to_string(),
        }
    }
}

#[async_trait]
impl ReplyTarget for CommandThread {
    async fn reply(&self, text: &str) -> Result<()> {
        self.session
            .send_message(&self.chat, MessagePayload::Text(text.to_string()), SendOptions::default())
            .await
    }
}

#[derive(Clone)]
pub struct CommandService {
    campaigns: CampaignService,
    sessions: SessionRegistry,
    files: TenantFiles,
    store: SqliteContactStore,
    events: EventHub,
    central_bot_session: String,
}

impl CommandService {
    pub fn new(
        campaigns: CampaignService,
        sessions: SessionRegistry,
        files: TenantFiles,
        store: SqliteContactStore,
        events: EventHub,
        central_bot_session: &str,
    ) -> Self {
        CommandService {
            campaigns,
            sessions,
            files,
            store,
            events,
            central_bot_session: central_bot_session.to_string(),
        }
    }

    pub async fn handle(&self, req: CommandRequest) -> Result<CommandResponse> {
        let command = match parse_command(&req.body) {
            Some(command) => command,
            None => {
                return Ok(CommandResponse {
                    handled: false,
                    command: None,
                })
            }
        };

        let sender = tenant_key(&req.from).ok_or_else(|| anyhow!("Remitente inválido: '{}'", req.from))?;

        let bot = self
            .sessions
            .get(&self.central_bot_session)
            .ok_or_else(|| anyhow!("Sesión del bot central '{}' no registrada", self.central_bot_session))?;
        let thread: Arc<dyn ReplyTarget> = Arc::new(CommandThread::new(bot, &sender));

        log::info!("(handle) Comando '{}' de {}", command_name(&command), sender);

        let username = match self.sessions.find_by_tenant_address(&sender) {
            Some((username, _)) => username,
            None => {
                log::warn!("(handle) {} no está asociado a ninguna sesión", sender);
                thread.reply(NOT_ASSOCIATED).await?;
                return Ok(CommandResponse {
                    handled: true,
                    command: Some(command_name(&command).to_string()),
                });
            }
        };

        let name = command_name(&command).to_string();
        self.execute(command, &sender, &username, thread).await?;
        Ok(CommandResponse {
            handled: true,
            command: Some(name),
        })
    }

    async fn execute(
        &self,
        command: Command,
        tenant: &str,
        username: &str,
        thread: Arc<dyn ReplyTarget>,
    ) -> Result<()> {
        match command {
            Command::Help => thread.reply(HELP_TEXT).await,
            Command::Invalid(message) => thread.reply(&message).await,
            Command::SetTemplate(text) => {
                self.files.save_template(tenant, &text)?;
                thread.reply("✅ Texto de la campaña actualizado.").await
            }
            Command::ShowTemplate => match self.files.read_template(tenant)? {
                Some(text) => thread.reply(&format!("*Tu mensaje actual:*\n\n{}", text)).await,
                None => {
                    thread
                        .reply("No hay mensaje definido. Usa `!texto [tu mensaje]` para definirlo.")
                        .await
                }
            },
            Command::Search(term) => {
                let contacts = self
                    .store
                    .search_contacts(tenant, ContactFilter::Recent, &term)
                    .await?;
                if contacts.is_empty() {
                    thread
                        .reply(&format!("*❌ Ningún cliente encontrado con:* \"{}\"", term))
                        .await
                } else {
                    thread.reply(&format_contacts(&contacts)).await
                }
            }
            Command::Delete(target) => {
                let label = match target {
                    DeleteTarget::Audio => "audio",
                    DeleteTarget::Image => "imagen",
                    DeleteTarget::List => "lista",
                };
                match self.files.delete(tenant, target)? {
                    Some(file) => thread.reply(&format!("✅ {} borrado ({}).", label, file)).await,
                    None => thread.reply(&format!("❌ No hay {} para borrar.", label)).await,
                }
            }
            Command::StartCampaign { start, end } => {
                let template = match self.files.read_template(tenant)? {
                    Some(text) => text,
                    None => {
                        return thread
                            .reply("❌ Define primero el mensaje con `!texto [tu mensaje]`.")
                            .await
                    }
                };

                let req = StartCampaignRequest {
                    tenant_address: Some(tenant.to_string()),
                    actor_username: Some(username.to_string()),
                    range_start: start,
                    range_end: end,
                    message_template: template,
                    list_source: ListSource::File {
                        file_name: DEFAULT_LIST_FILE.to_string(),
                    },
                };
                let channel = CampaignChannel {
                    identity: ChannelIdentity {
                        tenant_address: Some(tenant.to_string()),
                        username: Some(username.to_string()),
                    },
                    reply: Some(thread),
                    events: Some(self.events.sink_for(tenant)),
                };

                let campaigns = self.campaigns.clone();
                tokio::spawn(async move {
                    let outcome = campaigns.start_campaign(req, channel).await;
                    log::info!("(execute) Campaña por comando terminada: {:?}", outcome.stats());
                });
                Ok(())
            }
        }
    }
}
