use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        store::StorageManager,
        types::{chunk::Chunk, document::Document, vector_record::VectorRecord},
    },
    utils::{chunking, chunking::PreparedChunk, config::AppConfig, embedding::EmbeddingProvider},
};

use crate::utils::file_text_extraction::extract_text_from_bytes;

use super::context::EmbeddedChunk;

#[async_trait]
pub trait PipelineServices: Send + Sync {
    async fn extract_text(&self, document: &Document) -> Result<String, AppError>;

    fn chunk(
        &self,
        text: &str,
        chunk_size_tokens: usize,
        chunk_overlap_tokens: usize,
    ) -> Result<Vec<PreparedChunk>, AppError>;

    async fn embed_batch(
        &self,
        chunk_candidates: Vec<PreparedChunk>,
        embedding_provider: &EmbeddingProvider,
        batch_size: usize,
        batch_timeout: Duration,
    ) -> Result<Vec<EmbeddedChunk>, AppError>;

    async fn persist(
        &self,
        document_id: &str,
        workspace_id: &str,
        expected_dimension: usize,
        embedded_chunks: Vec<EmbeddedChunk>,
    ) -> Result<usize, AppError>;
}

pub struct DefaultPipelineServices {
    db: Arc<SurrealDbClient>,
    openai_client: Arc<async_openai::Client<async_openai::config::OpenAIConfig>>,
    config: AppConfig,
    storage: StorageManager,
}

impl DefaultPipelineServices {
    pub fn new(
        db: Arc<SurrealDbClient>,
        openai_client: Arc<async_openai::Client<async_openai::config::OpenAIConfig>>,
        config: AppConfig,
        storage: StorageManager,
    ) -> Self {
        Self {
            db,
            openai_client,
            config,
            storage,
        }
    }
}

#[async_trait]
impl PipelineServices for DefaultPipelineServices {
    async fn extract_text(&self, document: &Document) -> Result<String, AppError> {
        let bytes = self
            .storage
            .get(&document.source_bytes_ref)
            .await
            .map_err(AppError::from)?;

        let text =
            extract_text_from_bytes(&document.content_type, &bytes, &self.openai_client, &self.config)
                .await?;

        if text.trim().is_empty() {
            return Err(AppError::ExtractEmpty(document.id.clone()));
        }

        Ok(text)
    }

    fn chunk(
        &self,
        text: &str,
        chunk_size_tokens: usize,
        chunk_overlap_tokens: usize,
    ) -> Result<Vec<PreparedChunk>, AppError> {
        chunking::chunk_text(text, chunk_size_tokens, chunk_overlap_tokens)
    }

    /// Embeds chunk candidates in bounded batches, each under `batch_timeout` (§4.D stage 3's
    /// "60-second deadline per batch").
    async fn embed_batch(
        &self,
        chunk_candidates: Vec<PreparedChunk>,
        embedding_provider: &EmbeddingProvider,
        batch_size: usize,
        batch_timeout: Duration,
    ) -> Result<Vec<EmbeddedChunk>, AppError> {
        let mut embedded = Vec::with_capacity(chunk_candidates.len());

        for batch in chunk_candidates.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

            let embeddings = tokio::time::timeout(batch_timeout, embedding_provider.embed_batch(&texts))
                .await
                .map_err(|_| AppError::ProviderTimeout {
                    provider: embedding_provider.backend_label().to_string(),
                    model: "embed-batch".to_string(),
                    elapsed_ms: batch_timeout.as_millis() as u64,
                })??;

            for (chunk, embedding) in batch.iter().cloned().zip(embeddings) {
                embedded.push(EmbeddedChunk { chunk, embedding });
            }
        }

        Ok(embedded)
    }

    async fn persist(
        &self,
        document_id: &str,
        workspace_id: &str,
        expected_dimension: usize,
        embedded_chunks: Vec<EmbeddedChunk>,
    ) -> Result<usize, AppError> {
        let total = embedded_chunks.len();

        let mut chunk_rows = Vec::with_capacity(total);
        let mut vector_rows = Vec::with_capacity(total);

        for EmbeddedChunk { chunk, embedding } in embedded_chunks {
            let chunk_row = Chunk::new(
                document_id.to_string(),
                workspace_id.to_string(),
                chunk.chunk_index,
                chunk.text.clone(),
                chunk.token_count,
            );
            vector_rows.push(VectorRecord::new(
                chunk_row.id.clone(),
                workspace_id.to_string(),
                document_id.to_string(),
                chunk.chunk_index,
                embedding,
                chunk.text,
            ));
            chunk_rows.push(chunk_row);
        }

        Chunk::create_batch(chunk_rows, &self.db).await?;
        VectorRecord::upsert_batch(vector_rows, expected_dimension, &self.db).await?;

        Ok(total)
    }
}
