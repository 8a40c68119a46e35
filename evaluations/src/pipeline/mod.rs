mod context;
mod judge;
mod services;
mod stages;
mod state;
mod unit;

pub use services::{judge_provider, DefaultEvaluationServices, EvaluationServices};

use std::sync::Arc;

use async_openai::{config::OpenAIConfig, Client};
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            evaluation::Evaluation, evaluation_summary::EvaluationSummary, test_dataset::TestDataset,
            workspace::Workspace,
        },
    },
    utils::{config::AppConfig, embedding::EmbeddingProvider, providers::ProviderRegistry},
};

use self::{context::EvaluationContext, state::ready};

/// Drives one `Evaluation` end to end: dataset/candidate validation, bounded-concurrency unit
/// dispatch, aggregation, and completion (§4.E). Mirrors `IngestionPipeline`'s shape one level up
/// the pipeline scale.
pub struct EvaluationPipeline {
    db: Arc<SurrealDbClient>,
    openai_client: Arc<Client<OpenAIConfig>>,
    config: AppConfig,
    services: Arc<dyn EvaluationServices>,
}

impl EvaluationPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        openai_client: Arc<Client<OpenAIConfig>>,
        config: AppConfig,
    ) -> Self {
        let registry = ProviderRegistry::from_config(&config);
        let services: Arc<dyn EvaluationServices> = Arc::new(DefaultEvaluationServices::new(registry));
        Self::with_services(db, openai_client, config, services)
    }

    pub fn with_services(
        db: Arc<SurrealDbClient>,
        openai_client: Arc<Client<OpenAIConfig>>,
        config: AppConfig,
        services: Arc<dyn EvaluationServices>,
    ) -> Self {
        Self { db, openai_client, config, services }
    }

    /// Runs the evaluation named by `evaluation_id` to completion, persisting its results along
    /// the way. Only an unrecoverable setup condition (§4.E) fails the overall run; per-unit
    /// failures are captured as failed `ModelResult`s and the run still completes.
    pub async fn run(&self, evaluation_id: &str) -> Result<Vec<EvaluationSummary>, AppError> {
        let evaluation = Evaluation::get(evaluation_id, &self.db).await?;
        let running = evaluation.start_running(&self.db).await?;

        match self.drive_pipeline(&running).await {
            Ok(summaries) => Ok(summaries),
            Err(err) => {
                let reason = err.to_string();
                running.mark_failed(reason, &self.db).await?;
                Err(err)
            }
        }
    }

    async fn drive_pipeline(&self, evaluation: &Evaluation) -> Result<Vec<EvaluationSummary>, AppError> {
        let dataset = TestDataset::get(&evaluation.dataset_id, &self.db).await?;
        let workspace = Workspace::get(&dataset.workspace_id, &self.db).await?;
        let embedding_provider = Arc::new(EmbeddingProvider::from_config(
            &self.config,
            &workspace.embedding_provider,
            &workspace.embedding_model,
            workspace.embedding_dimension,
            Some(self.openai_client.as_ref().clone()),
        )?);

        let mut ctx = EvaluationContext::new(
            evaluation,
            Arc::clone(&self.db),
            Arc::clone(&self.services),
            embedding_provider,
        );

        let machine = ready();
        let machine = stages::load_dataset_stage(machine, &mut ctx).await.map_err(|err| ctx.abort(err))?;
        let machine = stages::dispatch_units_stage(machine, &mut ctx).await.map_err(|err| ctx.abort(err))?;
        let machine = stages::score_stage(machine, &mut ctx).await.map_err(|err| ctx.abort(err))?;
        let machine = stages::summarize_stage(machine, &mut ctx).await.map_err(|err| ctx.abort(err))?;
        let machine = stages::finalize_stage(machine, &mut ctx).await.map_err(|err| ctx.abort(err))?;
        drop(machine);

        Ok(ctx.summaries)
    }
}

#[cfg(test)]
mod tests;
