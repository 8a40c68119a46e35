#[derive(Debug, Clone)]
pub struct IngestionTuning {
    pub retry_base_delay_secs: u64,
    pub retry_max_delay_secs: u64,
    pub retry_backoff_cap_exponent: u32,
    /// Chunk count per embedding batch (renamed from the teacher's graph-entity-era
    /// `chunk_insert_concurrency`); each batch runs under `embed_batch_timeout_secs`.
    pub embed_batch_size: usize,
    pub embed_batch_timeout_secs: u64,
}

impl Default for IngestionTuning {
    fn default() -> Self {
        Self {
            retry_base_delay_secs: 30,
            retry_max_delay_secs: 15 * 60,
            retry_backoff_cap_exponent: 5,
            embed_batch_size: 16,
            embed_batch_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestionConfig {
    pub tuning: IngestionTuning,
}
