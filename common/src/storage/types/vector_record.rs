use serde::{Deserialize, Serialize};

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(VectorRecord, "vector_record", {
    chunk_id: String,
    workspace_id: String,
    document_id: String,
    chunk_index: usize,
    embedding: Vec<f32>,
    text_excerpt: String
});

impl VectorRecord {
    pub fn new(
        chunk_id: String,
        workspace_id: String,
        document_id: String,
        chunk_index: usize,
        embedding: Vec<f32>,
        text_excerpt: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            chunk_id,
            workspace_id,
            document_id,
            chunk_index,
            embedding,
            text_excerpt,
            created_at: now,
            updated_at: now,
        }
    }

    /// Atomic batch upsert (§4.C): either every record in `records` becomes visible or none does.
    /// Every record must share `expected_dimension` or the whole call fails with
    /// `IndexSchemaConflict` before any write is issued.
    pub async fn upsert_batch(
        records: Vec<Self>,
        expected_dimension: usize,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        for record in &records {
            if record.embedding.len() != expected_dimension {
                return Err(AppError::IndexSchemaConflict {
                    expected: expected_dimension,
                    actual: record.embedding.len(),
                });
            }
        }

        if records.is_empty() {
            return Ok(());
        }

        db.client
            .query("BEGIN TRANSACTION; INSERT INTO vector_record $records; COMMIT TRANSACTION;")
            .bind(("records", records))
            .await?;

        Ok(())
    }

    /// Top-k cosine similarity query, brute-force over the workspace's vectors. Results are
    /// sorted by descending score; ties broken by ascending `(document_id, chunk_index)` for
    /// determinism (§4.C, §8).
    pub async fn query_top_k(
        workspace_id: &str,
        query_embedding: &[f32],
        top_k: usize,
        similarity_threshold: Option<f32>,
        db: &SurrealDbClient,
    ) -> Result<Vec<ScoredVectorRecord>, AppError> {
        let mut rows: Vec<ScoredRow> = db
            .client
            .query(
                "SELECT *, vector::similarity::cosine(embedding, $query) AS score
                 FROM vector_record
                 WHERE workspace_id = $workspace_id
                 ORDER BY score DESC, document_id ASC, chunk_index ASC",
            )
            .bind(("workspace_id", workspace_id.to_string()))
            .bind(("query", query_embedding.to_vec()))
            .await?
            .take(0)?;

        if let Some(threshold) = similarity_threshold {
            rows.retain(|row| row.score >= threshold);
        }
        rows.truncate(top_k);

        Ok(rows.into_iter().map(ScoredRow::into_scored).collect())
    }

    pub async fn delete_for_workspace(workspace_id: &str, db: &SurrealDbClient) -> Result<(), AppError> {
        db.client
            .query("DELETE vector_record WHERE workspace_id = $workspace_id")
            .bind(("workspace_id", workspace_id.to_string()))
            .await?;
        Ok(())
    }

    pub async fn delete_for_document(document_id: &str, db: &SurrealDbClient) -> Result<(), AppError> {
        db.client
            .query("DELETE vector_record WHERE document_id = $document_id")
            .bind(("document_id", document_id.to_string()))
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScoredRow {
    #[serde(flatten)]
    record: VectorRecord,
    score: f32,
}

impl ScoredRow {
    fn into_scored(self) -> ScoredVectorRecord {
        ScoredVectorRecord {
            record: self.record,
            score: self.score,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoredVectorRecord {
    pub record: VectorRecord,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_db() -> SurrealDbClient {
        let db = SurrealDbClient::memory("test_ns", &uuid::Uuid::new_v4().to_string())
            .await
            .expect("db");
        db.apply_migrations().await.expect("migrations");
        db
    }

    fn rec(workspace: &str, doc: &str, idx: usize, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord::new(
            format!("chunk-{doc}-{idx}"),
            workspace.into(),
            doc.into(),
            idx,
            embedding,
            format!("excerpt {doc} {idx}"),
        )
    }

    #[tokio::test]
    async fn upsert_rejects_dimension_mismatch_without_partial_write() {
        let db = setup_db().await;
        let records = vec![
            rec("ws1", "doc1", 0, vec![1.0, 0.0, 0.0]),
            rec("ws1", "doc1", 1, vec![1.0, 0.0]),
        ];

        let err = VectorRecord::upsert_batch(records, 3, &db).await.unwrap_err();
        assert!(matches!(err, AppError::IndexSchemaConflict { .. }));

        let results = VectorRecord::query_top_k("ws1", &[1.0, 0.0, 0.0], 10, None, &db)
            .await
            .expect("query");
        assert!(results.is_empty(), "mismatched batch must not partially write");
    }

    #[tokio::test]
    async fn query_orders_by_score_desc_then_document_and_chunk_index() {
        let db = setup_db().await;
        let records = vec![
            rec("ws1", "docB", 0, vec![0.0, 1.0, 0.0]),
            rec("ws1", "docA", 1, vec![1.0, 0.0, 0.0]),
            rec("ws1", "docA", 0, vec![1.0, 0.0, 0.0]),
        ];
        VectorRecord::upsert_batch(records, 3, &db).await.expect("upsert");

        let results = VectorRecord::query_top_k("ws1", &[1.0, 0.0, 0.0], 10, None, &db)
            .await
            .expect("query");

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].record.document_id, "docA");
        assert_eq!(results[0].record.chunk_index, 0);
        assert_eq!(results[1].record.document_id, "docA");
        assert_eq!(results[1].record.chunk_index, 1);
        assert_eq!(results[2].record.document_id, "docB");
    }

    #[tokio::test]
    async fn similarity_threshold_filters_low_scores() {
        let db = setup_db().await;
        let records = vec![
            rec("ws1", "docA", 0, vec![1.0, 0.0, 0.0]),
            rec("ws1", "docB", 0, vec![-1.0, 0.0, 0.0]),
        ];
        VectorRecord::upsert_batch(records, 3, &db).await.expect("upsert");

        let results = VectorRecord::query_top_k("ws1", &[1.0, 0.0, 0.0], 10, Some(0.5), &db)
            .await
            .expect("query");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.document_id, "docA");
    }

    #[tokio::test]
    async fn delete_for_document_only_removes_that_documents_vectors() {
        let db = setup_db().await;
        let records = vec![
            rec("ws1", "docA", 0, vec![1.0, 0.0, 0.0]),
            rec("ws1", "docB", 0, vec![1.0, 0.0, 0.0]),
        ];
        VectorRecord::upsert_batch(records, 3, &db).await.expect("upsert");

        VectorRecord::delete_for_document("docA", &db).await.expect("delete");

        let results = VectorRecord::query_top_k("ws1", &[1.0, 0.0, 0.0], 10, None, &db)
            .await
            .expect("query");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.document_id, "docB");
    }
}
