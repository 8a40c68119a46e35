use std::collections::HashMap;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Memory,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

/// How a PDF's text should be recovered during extraction.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PdfIngestMode {
    /// Attempt deterministic text layer extraction first, fall back to an LLM describing pages
    /// that yield no text (scanned/image pages).
    LlmFirst,
    /// Deterministic text layer extraction only; pages with no text layer are skipped with a
    /// diagnostic note appended to the extracted text.
    TextOnly,
}

fn default_pdf_ingest_mode() -> PdfIngestMode {
    PdfIngestMode::LlmFirst
}

/// Per-provider credentials and endpoint overrides, keyed by provider name
/// (`"openai"`, `"anthropic"`, `"huggingface"`, `"mistral"`, `"together"`, `"local-bge"`).
#[derive(Clone, Debug, Deserialize, Default)]
pub struct ProviderCredentials {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

fn default_worker_pool_size() -> usize {
    8
}

fn default_embed_timeout_secs() -> u64 {
    60
}

fn default_generate_timeout_secs() -> u64 {
    120
}

fn default_judge_timeout_secs() -> u64 {
    60
}

fn default_upload_max_body_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_pricing_table_path() -> String {
    "pricing.json".to_string()
}

fn default_providers() -> HashMap<String, ProviderCredentials> {
    HashMap::new()
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    pub http_port: u16,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    #[serde(default = "default_pdf_ingest_mode")]
    pub pdf_ingest_mode: PdfIngestMode,

    /// Credentials for every configured LLM/embedding provider, keyed by provider name.
    #[serde(default = "default_providers")]
    pub providers: HashMap<String, ProviderCredentials>,

    /// Path to the static pricing table (per-1k-token prompt/completion cost by `provider/model`).
    #[serde(default = "default_pricing_table_path")]
    pub pricing_table_path: String,

    /// Bounded worker pool size for concurrent evaluation units (spec default 8).
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,
    #[serde(default = "default_generate_timeout_secs")]
    pub generate_timeout_secs: u64,
    #[serde(default = "default_judge_timeout_secs")]
    pub judge_timeout_secs: u64,

    /// Multipart body size cap for `/workspace/{id}/upload` (§6).
    #[serde(default = "default_upload_max_body_bytes")]
    pub upload_max_body_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            surrealdb_address: "mem://".to_string(),
            surrealdb_username: String::new(),
            surrealdb_password: String::new(),
            surrealdb_namespace: "default".to_string(),
            surrealdb_database: "default".to_string(),
            data_dir: default_data_dir(),
            http_port: 8080,
            openai_base_url: default_base_url(),
            storage: default_storage_kind(),
            pdf_ingest_mode: default_pdf_ingest_mode(),
            providers: default_providers(),
            pricing_table_path: default_pricing_table_path(),
            worker_pool_size: default_worker_pool_size(),
            embed_timeout_secs: default_embed_timeout_secs(),
            generate_timeout_secs: default_generate_timeout_secs(),
            judge_timeout_secs: default_judge_timeout_secs(),
            upload_max_body_bytes: default_upload_max_body_bytes(),
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    config.try_deserialize()
}
