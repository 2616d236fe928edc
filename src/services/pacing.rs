//! services/pacing.rs
//! Pausa entre filas para no disparar los límites anti-abuso de la red.

use std::time::Duration;

use rand::Rng;

pub trait PacingPolicy: Send + Sync {
    fn next_delay(&self, row_index: usize) -> Duration;
}

/// base + [0, jitter] aleatorio
#[derive(Debug, Clone)]
pub struct JitteredPacing {
    base: Duration,
    jitter: Duration,
}

impl JitteredPacing {
    pub fn new(base: Duration, jitter: Duration) -> Self {
        JitteredPacing { base, jitter }
    }
}

impl PacingPolicy for JitteredPacing {
    fn next_delay(&self, _row_index: usize) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.base;
        }
        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        self.base + Duration::from_millis(extra)
    }
}
