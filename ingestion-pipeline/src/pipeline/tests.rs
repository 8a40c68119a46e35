use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            document::{Document, DocumentStatus},
            ingestion_task::{IngestionTask, IngestionTaskStatus},
            vector_record::VectorRecord,
            workspace::Workspace,
        },
    },
    utils::{chunking::PreparedChunk, embedding::EmbeddingProvider},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    config::{IngestionConfig, IngestionTuning},
    context::EmbeddedChunk,
    services::PipelineServices,
    IngestionPipeline,
};

struct MockServices {
    extracted_text: String,
    calls: Mutex<Vec<&'static str>>,
}

impl MockServices {
    fn new(text: &str) -> Self {
        Self {
            extracted_text: text.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    async fn record(&self, stage: &'static str) {
        self.calls.lock().await.push(stage);
    }
}

#[async_trait]
impl PipelineServices for MockServices {
    async fn extract_text(&self, _document: &Document) -> Result<String, AppError> {
        self.record("extract").await;
        Ok(self.extracted_text.clone())
    }

    fn chunk(
        &self,
        text: &str,
        _chunk_size_tokens: usize,
        _chunk_overlap_tokens: usize,
    ) -> Result<Vec<PreparedChunk>, AppError> {
        Ok(vec![PreparedChunk {
            chunk_index: 0,
            text: text.to_string(),
            token_count: text.split_whitespace().count(),
        }])
    }

    async fn embed_batch(
        &self,
        chunk_candidates: Vec<PreparedChunk>,
        _embedding_provider: &EmbeddingProvider,
        _batch_size: usize,
        _batch_timeout: Duration,
    ) -> Result<Vec<EmbeddedChunk>, AppError> {
        self.record("embed").await;
        Ok(chunk_candidates
            .into_iter()
            .map(|chunk| EmbeddedChunk {
                chunk,
                embedding: vec![0.1; 3],
            })
            .collect())
    }

    async fn persist(
        &self,
        document_id: &str,
        workspace_id: &str,
        expected_dimension: usize,
        embedded_chunks: Vec<EmbeddedChunk>,
    ) -> Result<usize, AppError> {
        self.record("persist").await;
        let total = embedded_chunks.len();
        let records: Vec<VectorRecord> = embedded_chunks
            .into_iter()
            .map(|EmbeddedChunk { chunk, embedding }| {
                VectorRecord::new(
                    Uuid::new_v4().to_string(),
                    workspace_id.to_string(),
                    document_id.to_string(),
                    chunk.chunk_index,
                    embedding,
                    chunk.text,
                )
            })
            .collect();
        let _ = (records, expected_dimension);
        Ok(total)
    }
}

struct ZeroChunkServices {
    inner: MockServices,
}

#[async_trait]
impl PipelineServices for ZeroChunkServices {
    async fn extract_text(&self, document: &Document) -> Result<String, AppError> {
        self.inner.extract_text(document).await
    }

    fn chunk(
        &self,
        _text: &str,
        _chunk_size_tokens: usize,
        _chunk_overlap_tokens: usize,
    ) -> Result<Vec<PreparedChunk>, AppError> {
        Ok(Vec::new())
    }

    async fn embed_batch(
        &self,
        chunk_candidates: Vec<PreparedChunk>,
        embedding_provider: &EmbeddingProvider,
        batch_size: usize,
        batch_timeout: Duration,
    ) -> Result<Vec<EmbeddedChunk>, AppError> {
        self.inner
            .embed_batch(chunk_candidates, embedding_provider, batch_size, batch_timeout)
            .await
    }

    async fn persist(
        &self,
        document_id: &str,
        workspace_id: &str,
        expected_dimension: usize,
        embedded_chunks: Vec<EmbeddedChunk>,
    ) -> Result<usize, AppError> {
        self.inner
            .persist(document_id, workspace_id, expected_dimension, embedded_chunks)
            .await
    }
}

struct FailingServices {
    inner: MockServices,
}

#[async_trait]
impl PipelineServices for FailingServices {
    async fn extract_text(&self, document: &Document) -> Result<String, AppError> {
        self.inner.extract_text(document).await
    }

    fn chunk(
        &self,
        text: &str,
        chunk_size_tokens: usize,
        chunk_overlap_tokens: usize,
    ) -> Result<Vec<PreparedChunk>, AppError> {
        self.inner.chunk(text, chunk_size_tokens, chunk_overlap_tokens)
    }

    async fn embed_batch(
        &self,
        _chunk_candidates: Vec<PreparedChunk>,
        _embedding_provider: &EmbeddingProvider,
        _batch_size: usize,
        _batch_timeout: Duration,
    ) -> Result<Vec<EmbeddedChunk>, AppError> {
        Err(AppError::Processing("mock embedding failure".to_string()))
    }

    async fn persist(
        &self,
        document_id: &str,
        workspace_id: &str,
        expected_dimension: usize,
        embedded_chunks: Vec<EmbeddedChunk>,
    ) -> Result<usize, AppError> {
        self.inner
            .persist(document_id, workspace_id, expected_dimension, embedded_chunks)
            .await
    }
}

async fn setup_db() -> SurrealDbClient {
    let namespace = "pipeline_test";
    let database = Uuid::new_v4().to_string();
    let db = SurrealDbClient::memory(namespace, &database)
        .await
        .expect("failed to create in-memory surrealdb");
    db.apply_migrations().await.expect("failed to apply migrations");
    db
}

fn pipeline_config() -> IngestionConfig {
    IngestionConfig {
        tuning: IngestionTuning {
            embed_batch_size: 4,
            ..IngestionTuning::default()
        },
    }
}

async fn seed_document(db: &SurrealDbClient) -> (Workspace, Document, IngestionTask) {
    let workspace = Workspace::new("corpus".into(), "openai".into(), "text-embedding-3-small".into(), 3, 500, 100)
        .create(db)
        .await
        .expect("workspace created");

    let document = Document::new(workspace.id.clone(), "uploads/doc1".into(), "text/plain".into())
        .create(db)
        .await
        .expect("document created");

    let task = IngestionTask::new(document.id.clone())
        .create(db)
        .await
        .expect("task created");

    (workspace, document, task)
}

#[tokio::test]
async fn ingestion_pipeline_happy_path_persists_chunks() {
    let db = Arc::new(setup_db().await);
    let (_workspace, document, task) = seed_document(&db).await;

    let services = Arc::new(MockServices::new("Example document for ingestion."));
    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::default(),
    ));
    let pipeline = IngestionPipeline::with_services(
        Arc::clone(&db),
        openai_client,
        common::utils::config::AppConfig::default(),
        pipeline_config(),
        services.clone(),
    );

    let claimed = IngestionTask::claim_next_ready(&db).await.expect("claim").expect("some task");
    assert_eq!(claimed.id, task.id);

    pipeline.process_task(claimed).await.expect("pipeline succeeds");

    let stored_document = Document::get(&document.id, &db).await.expect("document present");
    assert_eq!(stored_document.status, DocumentStatus::Completed);
    assert_eq!(stored_document.total_chunks, 1);

    let call_log = services.calls.lock().await.clone();
    assert_eq!(call_log, vec!["extract", "embed", "persist"]);
}

#[tokio::test]
async fn ingestion_pipeline_failure_leaves_task_retryable() {
    let db = Arc::new(setup_db().await);
    let (_workspace, document, task) = seed_document(&db).await;

    let services = Arc::new(FailingServices {
        inner: MockServices::new("Example failure payload."),
    });
    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::default(),
    ));
    let pipeline = IngestionPipeline::with_services(
        Arc::clone(&db),
        openai_client,
        common::utils::config::AppConfig::default(),
        pipeline_config(),
        services,
    );

    let claimed = IngestionTask::claim_next_ready(&db).await.expect("claim").expect("some task");

    let result = pipeline.process_task(claimed).await;
    assert!(result.is_err(), "failure services should bubble error from pipeline");

    let stored_document = Document::get(&document.id, &db).await.expect("document present");
    assert_eq!(stored_document.status, DocumentStatus::Failed);

    let stored_task: IngestionTask = db
        .get_item(&task.id)
        .await
        .expect("retrieve task")
        .expect("task present");
    assert!(matches!(
        stored_task.status,
        IngestionTaskStatus::InProgress { attempts: 1, .. }
    ));
}

/// §4.D stage 2: text that survives extraction but chunks down to nothing (e.g. all-whitespace
/// after the chunker's filtering) must fail the document with `ExtractEmpty`, not complete it
/// with zero persisted chunks.
#[tokio::test]
async fn ingestion_pipeline_zero_chunks_fails_as_extract_empty() {
    let db = Arc::new(setup_db().await);
    let (_workspace, document, task) = seed_document(&db).await;

    let services = Arc::new(ZeroChunkServices {
        inner: MockServices::new("Example document for ingestion."),
    });
    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::default(),
    ));
    let pipeline = IngestionPipeline::with_services(
        Arc::clone(&db),
        openai_client,
        common::utils::config::AppConfig::default(),
        pipeline_config(),
        services,
    );

    let claimed = IngestionTask::claim_next_ready(&db).await.expect("claim").expect("some task");

    let result = pipeline.process_task(claimed).await;
    assert!(matches!(result, Err(AppError::ExtractEmpty(_))));

    let stored_document = Document::get(&document.id, &db).await.expect("document present");
    assert_eq!(stored_document.status, DocumentStatus::Failed);
    assert_eq!(stored_document.total_chunks, 0);
}
