//! services/event_hub.rs
//! Canal en vivo por tenant (broadcast) para la UI.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use tokio::sync::broadcast;

use crate::{models::event_model::CampaignEvent, services::progress_reporter::EventSink};

const EVENT_BUFFER: usize = 256;

#[derive(Clone, Default)]
pub struct EventHub {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<CampaignEvent>>>>,
}

impl EventHub {
    pub fn new() -> Self {
        EventHub::default()
    }

    fn sender(&self, tenant: &str) -> broadcast::Sender<CampaignEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(tenant.to_string())
            .or_insert_with(|| broadcast::channel(EVENT_BUFFER).0)
            .clone()
    }

    pub fn subscribe(&self, tenant: &str) -> broadcast::Receiver<CampaignEvent> {
        self.sender(tenant).subscribe()
    }

    /// Publica el evento; devuelve cuántos suscriptores lo recibieron.
    pub fn publish(&self, tenant: &str, event: CampaignEvent) -> usize {
        // sin suscriptores no es un error: nadie está mirando
        self.sender(tenant).send(event).unwrap_or(0)
    }

    pub fn sink_for(&self, tenant: &str) -> Arc<dyn EventSink> {
        Arc::new(TenantEventSink {
            hub: self.clone(),
            tenant: tenant.to_string(),
        })
    }
}

pub struct TenantEventSink {
    hub: EventHub,
    tenant: String,
}

impl EventSink for TenantEventSink {
    fn emit(&self, event: CampaignEvent) -> Result<()> {
        let receivers = self.hub.publish(&self.tenant, event);
        log::debug!("(emit) tenant={} receptores={}", self.tenant, receivers);
        Ok(())
    }
}
