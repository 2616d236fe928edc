//! tests/support.rs
//! Dobles de prueba: sesión falsa, réplica y sink que graban todo.

use std::{
    collections::HashSet,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Notify;

use crate::{
    config::{campaign_config::CampaignConfig, field_mapping::AliasTable},
    models::{
        event_model::CampaignEvent,
        session_model::{MessagePayload, SendOptions, SessionEvent},
    },
    services::{
        campaign_service::CampaignService,
        contact_store::SqliteContactStore,
        progress_reporter::{EventSink, ReplyTarget},
        run_tracker::RunTracker,
        session_registry::{SessionHandle, SessionLifecycle, SessionRegistry},
        tenant_files::TenantFiles,
    },
};

pub const TENANT: &str = "5541999990000";
pub const USERNAME: &str = "operador";

pub type SentMessage = (String, MessagePayload, SendOptions);

pub struct FakeSession {
    lifecycle: SessionLifecycle,
    registered: HashSet<String>,
    failing: HashSet<String>,
    failing_media: bool,
    gate: Option<Arc<Notify>>,
    sent: Mutex<Vec<SentMessage>>,
    checked: Mutex<Vec<String>>,
}

impl FakeSession {
    /// Sesión sin conectar (Initializing)
    pub fn idle() -> Self {
        FakeSession {
            lifecycle: SessionLifecycle::new(),
            registered: HashSet::new(),
            failing: HashSet::new(),
            failing_media: false,
            gate: None,
            sent: Mutex::new(Vec::new()),
            checked: Mutex::new(Vec::new()),
        }
    }

    pub fn connected(tenant_address: &str) -> Self {
        let session = FakeSession::idle();
        session
            .lifecycle
            .apply(SessionEvent::Ready {
                number: Some(tenant_address.to_string()),
            })
            .expect("ready desde Initializing");
        session
    }

    pub fn with_registered(mut self, addresses: &[&str]) -> Self {
        self.registered.extend(addresses.iter().map(|a| a.to_string()));
        self
    }

    /// Direcciones registradas cuyo envío falla
    pub fn with_failing(mut self, addresses: &[&str]) -> Self {
        self.failing.extend(addresses.iter().map(|a| a.to_string()));
        self
    }

    /// Acepta texto pero rechaza cualquier media
    pub fn with_failing_media(mut self) -> Self {
        self.failing_media = true;
        self
    }

    /// Cada envío espera un `notify_one` antes de completarse
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_addresses(&self) -> Vec<String> {
        self.sent().into_iter().map(|(address, _, _)| address).collect()
    }

    pub fn checked(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionHandle for FakeSession {
    fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    async fn is_registered_address(&self, address: &str) -> Result<bool> {
        self.checked.lock().unwrap().push(address.to_string());
        Ok(self.registered.contains(address))
    }

    async fn send_message(&self, address: &str, payload: MessagePayload, opts: SendOptions) -> Result<()> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.failing.contains(address) {
            return Err(anyhow!("envío rechazado por el gateway"));
        }
        if self.failing_media && matches!(payload, MessagePayload::Media(_)) {
            return Err(anyhow!("media rechazada por el gateway"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((address.to_string(), payload, opts));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingReply {
    messages: Mutex<Vec<String>>,
}

impl RecordingReply {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplyTarget for RecordingReply {
    async fn reply(&self, text: &str) -> Result<()> {
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CampaignEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<CampaignEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: CampaignEvent) -> Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

pub fn test_config(dir: &Path) -> CampaignConfig {
    CampaignConfig {
        user_data_dir: dir.to_path_buf(),
        pacing_base: Duration::ZERO,
        pacing_jitter: Duration::ZERO,
        audio_pause: Duration::ZERO,
        ..CampaignConfig::default()
    }
}

/// Servicios reales sobre un directorio temporal y SQLite en memoria.
pub struct Harness {
    pub _dir: TempDir,
    pub config: CampaignConfig,
    pub store: SqliteContactStore,
    pub files: TenantFiles,
    pub sessions: SessionRegistry,
    pub runs: RunTracker,
    pub campaigns: CampaignService,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = test_config(dir.path());
        let store = SqliteContactStore::in_memory();
        let files = TenantFiles::new(dir.path().to_path_buf());
        let sessions = SessionRegistry::new();
        let runs = RunTracker::new();
        let campaigns = CampaignService::new(
            &config,
            store.clone(),
            files.clone(),
            sessions.clone(),
            runs.clone(),
            AliasTable::default(),
        );
        Harness {
            _dir: dir,
            config,
            store,
            files,
            sessions,
            runs,
            campaigns,
        }
    }

    pub fn save_list(&self, file_name: &str, rows: serde_json::Value) {
        let data = serde_json::to_vec(&rows).expect("json");
        self.files
            .save_list(TENANT, file_name, &data)
            .expect("guardar lista");
    }

    pub fn register(&self, username: &str, session: Arc<FakeSession>) {
        self.sessions.register(username, session);
    }
}
