use anyhow::{Context, Result};

use crate::error::AppError;
use crate::storage::db::SurrealDbClient;

/// Ordinary (non-vector) lookup indexes. Query-side similarity search is computed with
/// `vector::similarity::cosine` over a `WHERE workspace_id = $workspace_id` scan rather than a
/// SurrealDB HNSW index (see `storage::types::vector_record`), so workspaces may carry embeddings
/// of different dimensions side by side without needing to share one table-wide HNSW definition.
struct IndexSpec {
    index_name: &'static str,
    table: &'static str,
    field: &'static str,
}

const fn index_specs() -> [IndexSpec; 6] {
    [
        IndexSpec { index_name: "idx_document_workspace", table: "document", field: "workspace_id" },
        IndexSpec { index_name: "idx_chunk_document", table: "chunk", field: "document_id" },
        IndexSpec { index_name: "idx_chunk_workspace", table: "chunk", field: "workspace_id" },
        IndexSpec { index_name: "idx_vector_record_workspace", table: "vector_record", field: "workspace_id" },
        IndexSpec { index_name: "idx_vector_record_document", table: "vector_record", field: "document_id" },
        IndexSpec { index_name: "idx_ingestion_task_status", table: "ingestion_task", field: "status" },
    ]
}

impl IndexSpec {
    fn definition(&self) -> String {
        format!(
            "DEFINE INDEX IF NOT EXISTS {index} ON TABLE {table} FIELDS {field};",
            index = self.index_name,
            table = self.table,
            field = self.field,
        )
    }
}

/// Creates the lookup indexes the storage layer relies on. Idempotent: safe to call on every
/// startup.
pub async fn ensure_runtime_indexes(db: &SurrealDbClient) -> Result<(), AppError> {
    for spec in index_specs() {
        db.client
            .query(spec.definition())
            .await
            .with_context(|| format!("defining index {}", spec.index_name))
            .map_err(|err| AppError::InternalError(err.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn ensure_runtime_indexes_is_idempotent() {
        let db = SurrealDbClient::memory("indexes_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory db");
        db.apply_migrations().await.expect("migrations");

        ensure_runtime_indexes(&db).await.expect("first run");
        ensure_runtime_indexes(&db).await.expect("second run");
    }
}
