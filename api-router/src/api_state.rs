use std::sync::Arc;

use async_openai::{config::OpenAIConfig, Client};
use common::{
    storage::{db::SurrealDbClient, store::StorageManager},
    utils::{config::AppConfig, providers::ProviderRegistry},
};

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub storage: StorageManager,
    pub openai_client: Arc<Client<OpenAIConfig>>,
    pub registry: Arc<ProviderRegistry>,
}

impl ApiState {
    pub async fn new(
        config: &AppConfig,
        storage: StorageManager,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let surreal_db_client = Arc::new(
            SurrealDbClient::new(
                &config.surrealdb_address,
                &config.surrealdb_username,
                &config.surrealdb_password,
                &config.surrealdb_namespace,
                &config.surrealdb_database,
            )
            .await?,
        );

        surreal_db_client.apply_migrations().await?;

        let openai_client = Arc::new(Client::with_config(
            OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        ));
        let registry = Arc::new(ProviderRegistry::from_config(config));

        Ok(Self {
            db: surreal_db_client,
            config: config.clone(),
            storage,
            openai_client,
            registry,
        })
    }
}
