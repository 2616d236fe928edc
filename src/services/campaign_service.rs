//! services/campaign_service.rs
//! Orquestador de campañas: validaciones previas, una sola campaña activa por
//! tenant, recorrido secuencial de filas con pausa y resumen final garantizado.

use std::{sync::Arc, time::Duration};

use uuid::Uuid;

use crate::{
    config::{campaign_config::CampaignConfig, field_mapping::AliasTable},
    error::CampaignError,
    models::{
        campaign_model::{
            CampaignOutcome, CampaignStats, CellValue, MediaAttachment, RowOutcome, StartCampaignRequest,
        },
        session_model::SessionState,
    },
    services::{
        contact_store::{ContactStore, SqliteContactStore},
        list_loader::ListLoader,
        pacing::{JitteredPacing, PacingPolicy},
        phone_normalizer::tenant_key,
        progress_reporter::{CampaignChannel, ProgressReporter},
        recency_guard::{RecencyGuard, RecencyPolicy},
        record_mapper::{map_headers, project_row, ColumnMapping},
        run_tracker::{RunGuard, RunTracker},
        send_dispatcher::{DispatchContext, SendDispatcher},
        session_registry::{wait_until_connected, SessionHandle, SessionRegistry},
        tenant_files::TenantFiles,
    },
};

/// Todo lo validado antes de arrancar. Mientras exista, el tenant figura activo.
struct PreparedRun {
    guard: RunGuard,
    session: Arc<dyn SessionHandle>,
    rows: Vec<Vec<CellValue>>,
    mapping: ColumnMapping,
    media: Option<MediaAttachment>,
    template: String,
    start_index: usize,
    end_index: usize,
}

#[derive(Clone)]
pub struct CampaignService {
    sessions: SessionRegistry,
    runs: RunTracker,
    lists: ListLoader,
    files: TenantFiles,
    dispatcher: SendDispatcher,
    aliases: Arc<AliasTable>,
    pacing: Arc<dyn PacingPolicy>,
    session_ready_wait: Duration,
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl CampaignService {
    pub fn new(
        config: &CampaignConfig,
        store: SqliteContactStore,
        files: TenantFiles,
        sessions: SessionRegistry,
        runs: RunTracker,
        aliases: AliasTable,
    ) -> Self {
        let shared_store: Arc<dyn ContactStore> = Arc::new(store.clone());
        let recency = RecencyGuard::new(shared_store.clone(), config.recency_window_days);
        let dispatcher = SendDispatcher::new(
            shared_store,
            recency,
            RecencyPolicy::default(),
            &config.country_code,
            config.audio_pause,
        );

        CampaignService {
            sessions,
            runs,
            lists: ListLoader::new(files.clone(), store),
            files,
            dispatcher,
            aliases: Arc::new(aliases),
            pacing: Arc::new(JitteredPacing::new(config.pacing_base, config.pacing_jitter)),
            session_ready_wait: config.session_ready_wait,
        }
    }

    pub fn with_recency_policy(mut self, policy: RecencyPolicy) -> Self {
        self.dispatcher = self.dispatcher.with_policy(policy);
        self
    }

    /// Almacén que usan el dispatcher y la verificación de recencia.
    pub fn with_contact_store(mut self, store: Arc<dyn ContactStore>) -> Self {
        self.dispatcher = self.dispatcher.with_store(store);
        self
    }

    pub fn with_pacing(mut self, pacing: Arc<dyn PacingPolicy>) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn runs(&self) -> &RunTracker {
        &self.runs
    }

    /// Punto de entrada. Ningún error escapa: todo se informa por el canal.
    pub async fn start_campaign(&self, req: StartCampaignRequest, channel: CampaignChannel) -> CampaignOutcome {
        let reporter = ProgressReporter::new(channel);

        let prepared = match self.prepare(&req, &reporter).await {
            Ok(prepared) => prepared,
            Err(err) => {
                log::warn!("(start_campaign) Campaña rechazada: {}", err);
                reporter.report(&err.user_message()).await;
                if err.is_pre_flight() {
                    return CampaignOutcome::Rejected(err);
                }
                let stats = CampaignStats::default();
                reporter.report(&stats.summary()).await;
                reporter.finish();
                return CampaignOutcome::Aborted { stats, error: err };
            }
        };

        self.execute(prepared, &reporter).await
    }

    async fn prepare(
        &self,
        req: &StartCampaignRequest,
        reporter: &ProgressReporter,
    ) -> Result<PreparedRun, CampaignError> {
        let identity = reporter.identity();
        let tenant = req
            .tenant_address
            .as_deref()
            .and_then(tenant_key)
            .or_else(|| identity.tenant_address.as_deref().and_then(tenant_key))
            .ok_or(CampaignError::IdentityUnresolved("el número de WhatsApp del cliente"))?;
        let username = non_empty(req.actor_username.as_ref())
            .or_else(|| non_empty(identity.username.as_ref()))
            .ok_or(CampaignError::IdentityUnresolved("el nombre de usuario"))?;

        if req.range_start < 1 || req.range_end < req.range_start {
            return Err(CampaignError::InvalidRange {
                start: req.range_start,
                end: req.range_end,
            });
        }

        // Adquisición atómica: si algo falla más abajo, el guard se libera al salir.
        let guard = self
            .runs
            .try_acquire(&tenant)
            .ok_or_else(|| CampaignError::CampaignAlreadyRunning(tenant.clone()))?;

        let session = self
            .sessions
            .get(&username)
            .ok_or_else(|| CampaignError::SessionNotReady(username.clone()))?;
        self.ensure_connected(&username, session.as_ref()).await?;

        let table = self
            .lists
            .load(&tenant, &req.list_source)
            .await
            .map_err(CampaignError::UnexpectedRunFailure)?
            .ok_or_else(|| CampaignError::EmptyOrMissingList(req.list_source.describe().to_string()))?;

        let mut table = table.into_iter();
        let header = table.next().unwrap_or_default();
        let rows: Vec<Vec<CellValue>> = table.collect();
        if rows.is_empty() {
            return Err(CampaignError::EmptyOrMissingList(
                req.list_source.describe().to_string(),
            ));
        }

        let mapping = map_headers(&header, &self.aliases)?;
        let media = self
            .files
            .resolve_media(&tenant)
            .map_err(CampaignError::UnexpectedRunFailure)?;

        let start_index = req.range_start - 1;
        let end_index = req.range_end.min(rows.len());

        log::info!(
            "(prepare) tenant={} usuario={} lista='{}' filas={} rango={}..{} media={}",
            tenant,
            username,
            req.list_source.describe(),
            rows.len(),
            start_index,
            end_index,
            media.as_ref().map(|m| m.filename.as_str()).unwrap_or("-")
        );

        Ok(PreparedRun {
            guard,
            session,
            rows,
            mapping,
            media,
            template: req.message_template.clone(),
            start_index,
            end_index,
        })
    }

    async fn ensure_connected(&self, username: &str, session: &dyn SessionHandle) -> Result<(), CampaignError> {
        let state = match session.connection_state().await {
            Ok(state) => state,
            Err(e) => {
                log::error!("(ensure_connected) No se pudo consultar la sesión de {}: {:?}", username, e);
                return Err(CampaignError::SessionNotReady(username.to_string()));
            }
        };
        if state == SessionState::Connected {
            return Ok(());
        }

        if !self.session_ready_wait.is_zero() {
            log::info!(
                "(ensure_connected) Sesión de {} en {:?}; esperando hasta {:?}",
                username,
                state,
                self.session_ready_wait
            );
            if wait_until_connected(session.lifecycle().subscribe(), self.session_ready_wait).await {
                return Ok(());
            }
        }
        Err(CampaignError::SessionNotReady(username.to_string()))
    }

    async fn execute(&self, prepared: PreparedRun, reporter: &ProgressReporter) -> CampaignOutcome {
        let run_id = Uuid::new_v4();
        let PreparedRun {
            guard,
            session,
            rows,
            mapping,
            media,
            template,
            start_index,
            end_index,
        } = prepared;
        let tenant = guard.tenant().to_string();

        log::info!("(execute) Campaña {} iniciada para {}", run_id, tenant);
        reporter.report("▶️ Iniciando proceso de envío...").await;

        let ctx = DispatchContext {
            tenant: &tenant,
            template: &template,
            media: media.as_ref(),
            session: session.as_ref(),
        };

        let mut stats = CampaignStats::default();
        let mut failure = None;

        for index in start_index..end_index {
            let row = project_row(&rows[index], &mapping);
            let dispatch = match self.dispatcher.dispatch(&ctx, &row).await {
                Ok(dispatch) => dispatch,
                Err(e) => {
                    log::error!("(execute) Error fatal en la campaña {} (fila {}): {:?}", run_id, index + 1, e);
                    failure = Some(CampaignError::UnexpectedRunFailure(e));
                    break;
                }
            };

            stats.record(&dispatch.outcome);
            stats.failed += dispatch.failed_attempts;
            if dispatch.outcome == RowOutcome::IgnoredRecent {
                let display = if row.name.is_empty() { &row.identifier } else { &row.name };
                reporter
                    .report(&format!("🟡 Ignorado (envío reciente): {}", display))
                    .await;
            }

            if index + 1 < end_index {
                tokio::time::sleep(self.pacing.next_delay(index)).await;
            }
        }

        // Limpieza: siempre resumen, liberar el tenant y avisar el fin.
        if let Some(err) = &failure {
            reporter.report(&err.user_message()).await;
        }
        reporter.report(&stats.summary()).await;
        drop(guard);
        reporter.finish();

        log::info!("(execute) Campaña {} finalizada: {:?}", run_id, stats);
        match failure {
            Some(error) => CampaignOutcome::Aborted { stats, error },
            None => CampaignOutcome::Completed(stats),
        }
    }
}
