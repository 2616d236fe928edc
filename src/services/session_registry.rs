//! services/session_registry.rs
//! Sesiones de mensajería por usuario: contrato del handle, máquina de estados
//! del ciclo de vida y registro compartido.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::{sync::watch, time::Instant};

use crate::{
    models::session_model::{MessagePayload, SendOptions, SessionEvent, SessionState},
    services::{phone_normalizer::tenant_key, tenant_files::sanitize_identifier},
};

/// Handle de una sesión viva. Oculta reintentos/reconexión del transporte.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    fn lifecycle(&self) -> &SessionLifecycle;

    async fn connection_state(&self) -> Result<SessionState> {
        Ok(self.lifecycle().state())
    }

    async fn is_registered_address(&self, address: &str) -> Result<bool>;

    async fn send_message(&self, address: &str, payload: MessagePayload, opts: SendOptions) -> Result<()>;

    /// Cierra la sesión en el transporte (al quitarla del registro)
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Initializing -> AwaitingScan -> Connected -> Disconnected, publicado por `watch`.
pub struct SessionLifecycle {
    state_tx: watch::Sender<SessionState>,
    tenant_address: Mutex<Option<String>>,
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        SessionLifecycle::new()
    }
}

impl SessionLifecycle {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(SessionState::Initializing);
        SessionLifecycle {
            state_tx,
            tenant_address: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Número con el que quedó conectada la sesión (dirección del tenant)
    pub fn tenant_address(&self) -> Option<String> {
        self.tenant_address
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Aplica un evento del gateway. Las transiciones inválidas se rechazan
    /// sin cambiar el estado.
    pub fn apply(&self, event: SessionEvent) -> Result<SessionState> {
        let current = self.state();
        let next = match (&event, current) {
            (SessionEvent::Restart, _) => SessionState::Initializing,
            (SessionEvent::Disconnected { .. }, _) => SessionState::Disconnected,
            (SessionEvent::Qr, SessionState::Initializing | SessionState::AwaitingScan) => {
                SessionState::AwaitingScan
            }
            (
                SessionEvent::Ready { .. },
                SessionState::Initializing | SessionState::AwaitingScan | SessionState::Connected,
            ) => SessionState::Connected,
            _ => {
                return Err(anyhow!(
                    "Transición inválida: evento {:?} en estado {:?}",
                    event,
                    current
                ))
            }
        };

        if let SessionEvent::Ready { number: Some(number) } = &event {
            if let Some(key) = tenant_key(number) {
                *self.tenant_address.lock().unwrap_or_else(|e| e.into_inner()) = Some(key);
            }
        }

        self.state_tx.send_replace(next);
        Ok(next)
    }

    /// Fija el estado reportado por el transporte, sin validar la transición.
    pub fn sync(&self, state: SessionState) {
        if self.state() != state {
            self.state_tx.send_replace(state);
        }
    }
}

/// Espera hasta que el estado sea `Connected` o venza el plazo.
pub async fn wait_until_connected(mut rx: watch::Receiver<SessionState>, wait: Duration) -> bool {
    let deadline = Instant::now() + wait;
    loop {
        if *rx.borrow_and_update() == SessionState::Connected {
            return true;
        }
        match tokio::time::timeout_at(deadline, rx.changed()).await {
            Ok(Ok(())) => continue,
            // plazo vencido o lifecycle descartado
            _ => return false,
        }
    }
}

/// Registro de sesiones por usuario (clave saneada).
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<dyn SessionHandle>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry::default()
    }

    pub fn get(&self, username: &str) -> Option<Arc<dyn SessionHandle>> {
        let key = sanitize_identifier(username);
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned()
    }

    /// Registra la sesión. Si ya existía una, se conserva la existente.
    pub fn register(&self, username: &str, handle: Arc<dyn SessionHandle>) -> Arc<dyn SessionHandle> {
        let key = sanitize_identifier(username);
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = sessions.get(&key) {
            log::info!("(register) Sesión para {} ya existe; se ignora la nueva", key);
            return existing.clone();
        }
        log::info!("(register) Sesión para {} agregada al registro", key);
        sessions.insert(key, handle.clone());
        handle
    }

    pub fn remove(&self, username: &str) -> Option<Arc<dyn SessionHandle>> {
        let key = sanitize_identifier(username);
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key)
    }

    /// Busca la sesión conectada con ese número; devuelve (usuario, handle).
    pub fn find_by_tenant_address(&self, address: &str) -> Option<(String, Arc<dyn SessionHandle>)> {
        let wanted = tenant_key(address)?;
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|(_, handle)| handle.lifecycle().tenant_address().as_deref() == Some(wanted.as_str()))
            .map(|(username, handle)| (username.clone(), handle.clone()))
    }
}
