mod config;
mod context;
mod services;
mod stages;
mod state;

pub use config::{IngestionConfig, IngestionTuning};
#[allow(clippy::module_name_repetitions)]
pub use services::{DefaultPipelineServices, PipelineServices};

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_openai::Client;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        store::StorageManager,
        types::{
            document::{Document, DocumentStatus},
            ingestion_task::IngestionTask,
            workspace::Workspace,
        },
    },
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};
use tracing::{debug, info, warn};

use self::{
    context::PipelineContext,
    stages::{chunk_stage, embed_stage, extract_stage, persist_stage},
    state::ready,
};

#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    db: Arc<SurrealDbClient>,
    openai_client: Arc<Client<async_openai::config::OpenAIConfig>>,
    config: AppConfig,
    pipeline_config: IngestionConfig,
    services: Arc<dyn PipelineServices>,
}

impl IngestionPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        openai_client: Arc<Client<async_openai::config::OpenAIConfig>>,
        config: AppConfig,
        storage: StorageManager,
    ) -> Self {
        Self::new_with_config(db, openai_client, config, storage, IngestionConfig::default())
    }

    pub fn new_with_config(
        db: Arc<SurrealDbClient>,
        openai_client: Arc<Client<async_openai::config::OpenAIConfig>>,
        config: AppConfig,
        storage: StorageManager,
        pipeline_config: IngestionConfig,
    ) -> Self {
        let services = DefaultPipelineServices::new(
            Arc::clone(&db),
            Arc::clone(&openai_client),
            config.clone(),
            storage,
        );

        Self::with_services(db, openai_client, config, pipeline_config, Arc::new(services))
    }

    pub fn with_services(
        db: Arc<SurrealDbClient>,
        openai_client: Arc<Client<async_openai::config::OpenAIConfig>>,
        config: AppConfig,
        pipeline_config: IngestionConfig,
        services: Arc<dyn PipelineServices>,
    ) -> Self {
        Self {
            db,
            openai_client,
            config,
            pipeline_config,
            services,
        }
    }

    /// Claims and drives one ready ingestion task (§4.D, §5). Returns `Ok(false)` when the queue
    /// was empty so the caller's worker loop knows to back off.
    #[tracing::instrument(skip_all)]
    pub async fn poll_and_process(&self) -> Result<bool, AppError> {
        let Some(task) = IngestionTask::claim_next_ready(&self.db).await? else {
            return Ok(false);
        };

        self.process_task(task).await?;
        Ok(true)
    }

    #[tracing::instrument(skip_all, fields(task_id = %task.id, document_id = %task.document_id))]
    pub async fn process_task(&self, task: IngestionTask) -> Result<(), AppError> {
        let document = Document::get(&task.document_id, &self.db).await?;

        if matches!(document.status, DocumentStatus::Failed) {
            Document::wipe_derived_state(&document.id, &self.db).await?;
        }

        let processing_document = document.start_processing(&self.db).await?;
        let workspace = Workspace::get(&processing_document.workspace_id, &self.db).await?;

        match self
            .drive_pipeline(&task, processing_document.clone(), &workspace)
            .await
        {
            Ok(total_chunks) => {
                processing_document.mark_completed(total_chunks, &self.db).await?;
                task.mark_succeeded(&self.db).await?;
                info!(task_id = %task.id, document_id = %document.id, total_chunks, "ingestion task succeeded");
                Ok(())
            }
            Err(err) => {
                let reason = err.to_string();
                processing_document.mark_failed(reason.clone(), &self.db).await?;

                if task.can_retry() {
                    let delay = self.retry_delay(1);
                    warn!(task_id = %task.id, document_id = %document.id, retry_in_secs = delay.as_secs(), error = %err, "ingestion task failed; will retry");
                } else {
                    warn!(task_id = %task.id, document_id = %document.id, error = %err, "ingestion task failed; attempts exhausted");
                }
                task.mark_failed(reason, &self.db).await?;

                Err(err)
            }
        }
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let tuning = &self.pipeline_config.tuning;
        let capped_attempt = attempt.saturating_sub(1).min(tuning.retry_backoff_cap_exponent);
        let multiplier = 2_u64.pow(capped_attempt);
        let delay = tuning.retry_base_delay_secs.saturating_mul(multiplier);

        Duration::from_secs(delay.min(tuning.retry_max_delay_secs))
    }

    fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }

    #[tracing::instrument(skip_all, fields(document_id = %document.id, workspace_id = %workspace.id))]
    async fn drive_pipeline(
        &self,
        task: &IngestionTask,
        document: Document,
        workspace: &Workspace,
    ) -> Result<usize, AppError> {
        let embedding_provider = EmbeddingProvider::from_config(
            &self.config,
            &workspace.embedding_provider,
            &workspace.embedding_model,
            workspace.embedding_dimension,
            Some(self.openai_client.as_ref().clone()),
        )?;

        let mut ctx = PipelineContext::new(
            task,
            document,
            self.db.as_ref(),
            &self.pipeline_config,
            self.services.as_ref(),
            &embedding_provider,
        );

        let pipeline_started = Instant::now();

        let stage_start = Instant::now();
        let machine = extract_stage(ready(), &mut ctx).await.map_err(|err| ctx.abort(err))?;
        let extract_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = chunk_stage(
            machine,
            &mut ctx,
            workspace.chunk_size_tokens,
            workspace.chunk_overlap_tokens,
        )
        .await
        .map_err(|err| ctx.abort(err))?;
        let chunk_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = embed_stage(machine, &mut ctx).await.map_err(|err| ctx.abort(err))?;
        let embed_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let total_chunks = ctx.embedded_chunks.len();
        let _machine = persist_stage(machine, &mut ctx, &workspace.id, workspace.embedding_dimension)
            .await
            .map_err(|err| ctx.abort(err))?;
        let persist_duration = stage_start.elapsed();

        let total_duration = pipeline_started.elapsed();
        debug!(
            task_id = %task.id,
            total_ms = Self::duration_millis(total_duration),
            extract_ms = Self::duration_millis(extract_duration),
            chunk_ms = Self::duration_millis(chunk_duration),
            embed_ms = Self::duration_millis(embed_duration),
            persist_ms = Self::duration_millis(persist_duration),
            "ingestion pipeline finished"
        );

        Ok(total_chunks)
    }
}

#[cfg(test)]
mod tests;
