use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{document::Document, ingestion_task::IngestionTask},
    },
    utils::chunking::PreparedChunk,
    utils::embedding::EmbeddingProvider,
};
use tracing::error;

use super::{config::IngestionConfig, services::PipelineServices};

/// A chunk candidate paired with its embedding, carried between the embed and persist stages.
pub struct EmbeddedChunk {
    pub chunk: PreparedChunk,
    pub embedding: Vec<f32>,
}

pub struct PipelineContext<'a> {
    pub task: &'a IngestionTask,
    pub document: Document,
    pub db: &'a SurrealDbClient,
    pub pipeline_config: &'a IngestionConfig,
    pub services: &'a dyn PipelineServices,
    pub embedding_provider: &'a EmbeddingProvider,
    pub extracted_text: Option<String>,
    pub chunk_candidates: Vec<PreparedChunk>,
    pub embedded_chunks: Vec<EmbeddedChunk>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        task: &'a IngestionTask,
        document: Document,
        db: &'a SurrealDbClient,
        pipeline_config: &'a IngestionConfig,
        services: &'a dyn PipelineServices,
        embedding_provider: &'a EmbeddingProvider,
    ) -> Self {
        Self {
            task,
            document,
            db,
            pipeline_config,
            services,
            embedding_provider,
            extracted_text: None,
            chunk_candidates: Vec::new(),
            embedded_chunks: Vec::new(),
        }
    }

    pub fn extracted_text(&self) -> Result<&str, AppError> {
        self.extracted_text
            .as_deref()
            .ok_or_else(|| AppError::InternalError("extracted text expected to be available".into()))
    }

    pub fn abort(&mut self, err: AppError) -> AppError {
        error!(
            task_id = %self.task.id,
            document_id = %self.document.id,
            error = %err,
            "ingestion pipeline aborted"
        );
        err
    }
}
