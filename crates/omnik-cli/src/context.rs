use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use omnik_application::{TurnDefaults, TurnOrchestrator};
use omnik_core::config::OmnikConfig;
use omnik_core::ChatTransport;
use omnik_execution::{CancellationCoordinator, OutputRenderer};
use omnik_infrastructure::{ConfigService, ResolvedRegistryPaths, SessionArchiver, SessionRegistry};
use omnik_interaction::ClaudeCliClient;

/// Everything a command needs, built once from config.
pub struct AppContext {
    pub config: OmnikConfig,
    pub paths: ResolvedRegistryPaths,
    pub registry: Arc<SessionRegistry>,
    pub client: Arc<ClaudeCliClient>,
}

impl AppContext {
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = ConfigService::load_from_env(config_path).context("failed to load configuration")?;
        let paths = ResolvedRegistryPaths::resolve(&config.registry)?;

        let archiver = SessionArchiver::new(paths.archive_dir.clone(), paths.transcripts_root.clone());
        let registry = SessionRegistry::open(paths.sessions_file.clone(), archiver)
            .await
            .with_context(|| format!("failed to open session registry {}", paths.sessions_file.display()))?;

        let client = ClaudeCliClient::from_config(&config.client);

        tracing::debug!(
            sessions_file = %paths.sessions_file.display(),
            binary = %client.binary(),
            "context ready"
        );

        Ok(Self {
            config,
            paths,
            registry: Arc::new(registry),
            client: Arc::new(client),
        })
    }

    pub fn orchestrator(&self, transport: Arc<dyn ChatTransport>) -> TurnOrchestrator {
        TurnOrchestrator::new(
            self.registry.clone(),
            self.client.clone(),
            Arc::new(CancellationCoordinator::new()),
            OutputRenderer::from_config(transport, &self.config.render),
            TurnDefaults::from_config(&self.config, self.paths.default_working_dir.clone()),
        )
    }
}
