//! services/progress_reporter.rs
//! Envía el progreso al canal que disparó la campaña: hilo de comando,
//! stream en vivo, ambos o ninguno. Nunca falla hacia quien lo llama.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::event_model::CampaignEvent;

/// Contexto que puede responder en el hilo del comando
#[async_trait]
pub trait ReplyTarget: Send + Sync {
    async fn reply(&self, text: &str) -> Result<()>;
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: CampaignEvent) -> Result<()>;
}

/// Identidad autenticada asociada al canal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelIdentity {
    pub tenant_address: Option<String>,
    pub username: Option<String>,
}

#[derive(Clone, Default)]
pub struct CampaignChannel {
    pub identity: ChannelIdentity,
    pub reply: Option<Arc<dyn ReplyTarget>>,
    pub events: Option<Arc<dyn EventSink>>,
}

pub struct ProgressReporter {
    channel: CampaignChannel,
}

impl ProgressReporter {
    pub fn new(channel: CampaignChannel) -> Self {
        ProgressReporter { channel }
    }

    pub fn identity(&self) -> &ChannelIdentity {
        &self.channel.identity
    }

    pub async fn report(&self, message: &str) {
        if let Some(target) = &self.channel.reply {
            if let Err(e) = target.reply(message).await {
                log::error!("(report) No se pudo responder en el hilo del comando: {:?}", e);
            }
        }
        if let Some(sink) = &self.channel.events {
            if let Err(e) = sink.emit(CampaignEvent::Log(message.to_string())) {
                log::error!("(report) No se pudo emitir el evento 'log': {:?}", e);
            }
        }
    }

    /// Avisa al canal en vivo que la campaña terminó.
    pub fn finish(&self) {
        if let Some(sink) = &self.channel.events {
            if let Err(e) = sink.emit(CampaignEvent::CampaignFinished) {
                log::error!("(finish) No se pudo emitir 'campaign-finished': {:?}", e);
            }
        }
    }
}
