//! services/send_dispatcher.rs
//! Entrega de una fila: prueba los candidatos en orden fijo y envía a lo sumo
//! un mensaje. Los fallos de un candidato quedan registrados como FAILED y se
//! sigue con el siguiente, salvo que parte del mensaje ya haya llegado.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::Utc;

use crate::{
    models::{
        campaign_model::{CampaignRow, MediaAttachment, MediaKind, RowOutcome},
        contact_model::{Contact, SendOutcome},
        session_model::{MessagePayload, SendOptions},
    },
    services::{
        contact_store::ContactStore,
        phone_normalizer::{compose_full_address, reconcile_free_form_number},
        recency_guard::{RecencyGuard, RecencyPolicy},
        session_registry::SessionHandle,
    },
};

const DEFAULT_DISPLAY_NAME: &str = "Cliente";

/// Lo que necesita el dispatcher de la campaña en curso
pub struct DispatchContext<'a> {
    pub tenant: &'a str,
    pub template: &'a str,
    pub media: Option<&'a MediaAttachment>,
    pub session: &'a dyn SessionHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDispatch {
    pub outcome: RowOutcome,
    /// Candidatos que fallaron con error (cada uno dejó un FAILED)
    pub failed_attempts: u32,
}

impl RowDispatch {
    fn new(outcome: RowOutcome, failed_attempts: u32) -> Self {
        RowDispatch {
            outcome,
            failed_attempts,
        }
    }
}

/// Candidatos en orden: estructurados 1..3 y luego libres 1..3, sin repetidos.
pub fn candidate_addresses(row: &CampaignRow, country_code: &str) -> Vec<String> {
    let structured = (0..3).filter_map(|slot| {
        compose_full_address(country_code, &row.area_codes[slot], &row.local_numbers[slot])
    });
    let free_form = row
        .phones
        .iter()
        .filter_map(|phone| reconcile_free_form_number(country_code, phone));

    let mut candidates: Vec<String> = Vec::new();
    for address in structured.chain(free_form) {
        if !candidates.contains(&address) {
            candidates.push(address);
        }
    }
    candidates
}

/// Sustituye @nomecompleto/@fullname, @nome/@name, @cpf/@id y @agencia/@branch
/// (sin distinguir mayúsculas) en una sola pasada.
pub fn render_template(template: &str, row: &CampaignRow) -> String {
    let full_name = if row.name.trim().is_empty() {
        DEFAULT_DISPLAY_NAME
    } else {
        row.name.trim()
    };
    let first_name = full_name.split_whitespace().next().unwrap_or(full_name);

    // los tokens más largos primero: @nome es prefijo de @nomecompleto
    let tokens: [(&str, &str); 8] = [
        ("@nomecompleto", full_name),
        ("@fullname", full_name),
        ("@agencia", &row.branch),
        ("@branch", &row.branch),
        ("@nome", first_name),
        ("@name", first_name),
        ("@cpf", &row.identifier),
        ("@id", &row.identifier),
    ];

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    'scan: while !rest.is_empty() {
        for (token, value) in tokens {
            if rest.len() >= token.len()
                && rest.is_char_boundary(token.len())
                && rest[..token.len()].eq_ignore_ascii_case(token)
            {
                out.push_str(value);
                rest = &rest[token.len()..];
                continue 'scan;
            }
        }
        match rest.chars().next() {
            Some(ch) => {
                out.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
            None => break,
        }
    }
    out
}

/// Resultado de entregar el mensaje a un candidato
enum Delivery {
    Complete,
    /// Algo llegó al destino y un envío posterior falló
    Partial(anyhow::Error),
    /// Nada llegó al destino
    Failed(anyhow::Error),
}

impl Delivery {
    fn from_first_leg(result: Result<()>) -> Self {
        match result {
            Ok(()) => Delivery::Complete,
            Err(e) => Delivery::Failed(e),
        }
    }
}

#[derive(Clone)]
pub struct SendDispatcher {
    store: Arc<dyn ContactStore>,
    recency: RecencyGuard,
    policy: RecencyPolicy,
    country_code: String,
    audio_pause: Duration,
}

impl SendDispatcher {
    pub fn new(
        store: Arc<dyn ContactStore>,
        recency: RecencyGuard,
        policy: RecencyPolicy,
        country_code: &str,
        audio_pause: Duration,
    ) -> Self {
        SendDispatcher {
            store,
            recency,
            policy,
            country_code: country_code.to_string(),
            audio_pause,
        }
    }

    pub fn with_policy(mut self, policy: RecencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Reemplaza el almacén del dispatcher y de la verificación de recencia.
    pub fn with_store(mut self, store: Arc<dyn ContactStore>) -> Self {
        self.recency = RecencyGuard::new(store.clone(), self.recency.window_days());
        self.store = store;
        self
    }

    /// Errores del almacén fuera de un intento de candidato se propagan.
    pub async fn dispatch(&self, ctx: &DispatchContext<'_>, row: &CampaignRow) -> Result<RowDispatch> {
        if row.identifier.is_empty() {
            log::debug!("(dispatch) Fila sin identificador, se omite: '{}'", row.name);
            return Ok(RowDispatch::new(RowOutcome::MissingIdentifier, 0));
        }

        let candidates = candidate_addresses(row, &self.country_code);
        if candidates.is_empty() {
            log::debug!("(dispatch) Sin teléfonos válidos para {}", row.identifier);
            return Ok(RowDispatch::new(RowOutcome::NoContactInfo, 0));
        }

        let flagged = self.recency.flag_candidates(ctx.tenant, &candidates).await?;
        let eligible = match self.policy.eligible_candidates(flagged) {
            Some(eligible) => eligible,
            None => {
                log::info!(
                    "(dispatch) {} contactado hace menos de {} días; se ignora",
                    row.identifier,
                    self.recency.window_days()
                );
                return Ok(RowDispatch::new(RowOutcome::IgnoredRecent, 0));
            }
        };

        let text = render_template(ctx.template, row);
        let mut failed_attempts = 0;

        for address in eligible {
            match ctx.session.is_registered_address(&address).await {
                Ok(true) => {}
                Ok(false) => {
                    log::debug!("(dispatch) {} no tiene WhatsApp", address);
                    continue;
                }
                Err(e) => {
                    log::warn!("(dispatch) Fallo verificando {}: {:?}", address, e);
                    self.store
                        .append_send_log(ctx.tenant, &row.identifier, SendOutcome::Failed)
                        .await?;
                    failed_attempts += 1;
                    continue;
                }
            }

            match self.deliver(ctx, &address, &text).await {
                Delivery::Complete => {
                    log::info!("(dispatch) Mensaje enviado a {} ({})", address, row.identifier);
                    self.record_success(ctx.tenant, row, &address).await?;
                    return Ok(RowDispatch::new(RowOutcome::Sent { address }, failed_attempts));
                }
                // el texto ya llegó: no se repite en otro candidato
                Delivery::Partial(e) => {
                    log::warn!(
                        "(dispatch) Texto entregado a {} pero falló el audio ({}): {:?}",
                        address,
                        row.identifier,
                        e
                    );
                    self.record_success(ctx.tenant, row, &address).await?;
                    return Ok(RowDispatch::new(RowOutcome::Sent { address }, failed_attempts));
                }
                Delivery::Failed(e) => {
                    log::warn!("(dispatch) Fallo enviando a {}: {:?}", address, e);
                    self.store
                        .append_send_log(ctx.tenant, &row.identifier, SendOutcome::Failed)
                        .await?;
                    failed_attempts += 1;
                }
            }
        }

        if failed_attempts > 0 {
            return Ok(RowDispatch::new(RowOutcome::DeliveryFailed, failed_attempts));
        }

        self.store
            .append_send_log(ctx.tenant, &row.identifier, SendOutcome::NoWhatsapp)
            .await?;
        Ok(RowDispatch::new(RowOutcome::NoChannelPresence, 0))
    }

    /// Imagen => leyenda en el mismo mensaje; audio => texto, pausa y audio como voz.
    async fn deliver(&self, ctx: &DispatchContext<'_>, address: &str, text: &str) -> Delivery {
        let text_payload = MessagePayload::Text(text.to_string());
        match ctx.media {
            Some(media) if media.kind == MediaKind::Image => {
                let opts = SendOptions {
                    caption: Some(text.to_string()),
                    ..SendOptions::default()
                };
                Delivery::from_first_leg(
                    ctx.session
                        .send_message(address, MessagePayload::Media(media.clone()), opts)
                        .await,
                )
            }
            Some(media) => {
                if let Err(e) = ctx
                    .session
                    .send_message(address, text_payload, SendOptions::default())
                    .await
                {
                    return Delivery::Failed(e);
                }
                tokio::time::sleep(self.audio_pause).await;
                let opts = SendOptions {
                    send_audio_as_voice: true,
                    ..SendOptions::default()
                };
                match ctx
                    .session
                    .send_message(address, MessagePayload::Media(media.clone()), opts)
                    .await
                {
                    Ok(()) => Delivery::Complete,
                    Err(e) => Delivery::Partial(e),
                }
            }
            None => Delivery::from_first_leg(
                ctx.session
                    .send_message(address, text_payload, SendOptions::default())
                    .await,
            ),
        }
    }

    async fn record_success(&self, tenant: &str, row: &CampaignRow, address: &str) -> Result<()> {
        let contact = Contact {
            identifier: row.identifier.clone(),
            name: row.name.clone(),
            branch: row.branch.clone(),
            chosen_address: address.to_string(),
            birth_date: row.birth_date.clone(),
            last_sent_at: Some(Utc::now()),
        };
        self.store.upsert_contact(tenant, &contact).await?;
        self.store
            .append_send_log(tenant, &row.identifier, SendOutcome::Sent)
            .await
    }
}
