//! services/recency_guard.rs
//! Evita volver a contactar una dirección dentro de la ventana de enfriamiento.
//! La verificación es por dirección, no por identificador del contacto.

use std::sync::Arc;

use anyhow::Result;

use crate::services::contact_store::ContactStore;

/// Qué hacer con una fila cuando alguno de sus candidatos es reciente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecencyPolicy {
    /// Un candidato reciente bloquea la fila completa
    #[default]
    BlockWholeRow,
    /// Solo se descarta el candidato reciente; los demás se intentan
    SkipRecentCandidate,
}

impl RecencyPolicy {
    /// Recibe (dirección, es_reciente) en orden. None => la fila se omite.
    pub fn eligible_candidates(&self, flagged: Vec<(String, bool)>) -> Option<Vec<String>> {
        match self {
            RecencyPolicy::BlockWholeRow => {
                if flagged.iter().any(|(_, recent)| *recent) {
                    None
                } else {
                    Some(flagged.into_iter().map(|(address, _)| address).collect())
                }
            }
            RecencyPolicy::SkipRecentCandidate => {
                let eligible: Vec<String> = flagged
                    .into_iter()
                    .filter(|(_, recent)| !*recent)
                    .map(|(address, _)| address)
                    .collect();
                if eligible.is_empty() {
                    None
                } else {
                    Some(eligible)
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct RecencyGuard {
    store: Arc<dyn ContactStore>,
    window_days: i64,
}

impl RecencyGuard {
    pub fn new(store: Arc<dyn ContactStore>, window_days: i64) -> Self {
        RecencyGuard { store, window_days }
    }

    pub fn window_days(&self) -> i64 {
        self.window_days
    }

    pub async fn was_contacted_recently(&self, tenant: &str, address: &str) -> Result<bool> {
        self.store
            .was_contacted_recently(tenant, address, self.window_days)
            .await
    }

    /// Marca cada candidato con su estado de recencia, en el mismo orden.
    pub async fn flag_candidates(&self, tenant: &str, candidates: &[String]) -> Result<Vec<(String, bool)>> {
        let mut flagged = Vec::with_capacity(candidates.len());
        for address in candidates {
            let recent = self.was_contacted_recently(tenant, address).await?;
            flagged.push((address.clone(), recent));
        }
        Ok(flagged)
    }
}
