use std::sync::Arc;

use courtside_agent::{ConversationOrchestrator, OpenAiCompatibleClient};
use courtside_core::config::{AppConfig, ConfigError};
use courtside_db::{ping, PgSqlExecutor};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub orchestrator: Arc<ConversationOrchestrator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("model client could not be built: {0}")]
    LlmClient(#[source] reqwest::Error),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        model = %config.llm.model,
        "starting application bootstrap"
    );

    let client =
        OpenAiCompatibleClient::from_config(&config.llm).map_err(BootstrapError::LlmClient)?;
    info!(
        event_name = "system.bootstrap.llm_client_ready",
        correlation_id = "bootstrap",
        endpoint = %client.endpoint(),
        "model client configured"
    );

    // Connections are opened per statement; this probe only reports reachability.
    match ping(config.database.url.expose_secret(), config.database.connect_timeout_secs).await {
        Ok(()) => info!(
            event_name = "system.bootstrap.database_reachable",
            correlation_id = "bootstrap",
            allow_writes = config.database.allow_writes,
            "database reachable"
        ),
        Err(error) => warn!(
            event_name = "system.bootstrap.database_unreachable",
            correlation_id = "bootstrap",
            error = %error,
            "database not reachable at startup; schedule lookups will fail until it is"
        ),
    }

    let executor = PgSqlExecutor::new(&config.database);
    let orchestrator =
        ConversationOrchestrator::from_config(&config, Arc::new(client), Arc::new(executor));

    Ok(Application { config, orchestrator: Arc::new(orchestrator) })
}
