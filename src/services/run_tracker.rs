//! services/run_tracker.rs
//! Conjunto de tenants con campaña activa (una sola campaña por tenant).

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

#[derive(Clone, Default)]
pub struct RunTracker {
    active: Arc<Mutex<HashSet<String>>>,
}

impl RunTracker {
    pub fn new() -> Self {
        RunTracker::default()
    }

    /// Marca el tenant como activo. None si ya tenía una campaña en curso.
    pub fn try_acquire(&self, tenant: &str) -> Option<RunGuard> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(tenant.to_string()) {
            return None;
        }
        Some(RunGuard {
            tracker: self.clone(),
            tenant: tenant.to_string(),
        })
    }

    pub fn release(&self, tenant: &str) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(tenant);
    }

    pub fn is_active(&self, tenant: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(tenant)
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Libera el tenant al salir de scope (fin normal, error o panic)
pub struct RunGuard {
    tracker: RunTracker,
    tenant: String,
}

impl RunGuard {
    pub fn tenant(&self) -> &str {
        &self.tenant
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.tracker.release(&self.tenant);
    }
}
