//! Shared application state.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::backends::accounts::{HttpAccountSource, JsonFileAccountSource};
use crate::core::backends::{
    AccountBackend, AccountSource, AgentBackend, BackendRegistry, KnowledgeBaseBackend,
};
use crate::core::coordinator::{ClassificationTable, KeepAliveFrames};
use crate::core::runtime::{OpenAIRuntimeFactory, RuntimeFactory};
use crate::core::session::RoutingTarget;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to prepare keep-alive frames: {0}")]
    KeepAlive(#[from] serde_json::Error),

    #[error("Runtime configuration error: {0}")]
    Runtime(String),
}

/// State shared by every connection.
pub struct AppState {
    pub config: ServerConfig,
    pub backends: BackendRegistry,
    pub classification: Arc<ClassificationTable>,
    pub default_agent_target: Option<Arc<RoutingTarget>>,
    /// Silent frames serialized once at startup; `None` when keep-alive is off.
    pub keepalive_frames: Option<Arc<KeepAliveFrames>>,
    pub runtime_factory: Option<Arc<dyn RuntimeFactory>>,
}

impl AppState {
    /// Build state from configuration, wiring the configured backends and
    /// the OpenAI runtime when its key is present.
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, StateError> {
        let runtime_factory = config
            .runtime_config()
            .map_err(StateError::Runtime)?
            .map(|runtime| Arc::new(OpenAIRuntimeFactory::new(runtime)) as Arc<dyn RuntimeFactory>);

        let backends = build_backends(&config);
        Self::with_parts(config, backends, runtime_factory)
    }

    /// Build state with explicit backends and runtime factory.
    pub fn with_parts(
        config: ServerConfig,
        backends: BackendRegistry,
        runtime_factory: Option<Arc<dyn RuntimeFactory>>,
    ) -> Result<Arc<Self>, StateError> {
        let keepalive_frames = if config.keepalive_enabled {
            Some(Arc::new(KeepAliveFrames::prepare(
                &config.keepalive_schedule,
                config.target_sample_rate,
            )?))
        } else {
            None
        };

        match &runtime_factory {
            Some(factory) => info!(provider = factory.provider_name(), "Conversational runtime configured"),
            None => warn!("No conversational runtime configured, sessions will be refused"),
        }
        if backends.is_empty() {
            warn!("No lookup backends configured, tool calls will report errors");
        }

        Ok(Arc::new(Self {
            classification: Arc::new(config.classification_table()),
            default_agent_target: config.default_agent_target(),
            backends,
            keepalive_frames,
            runtime_factory,
            config,
        }))
    }
}

fn build_backends(config: &ServerConfig) -> BackendRegistry {
    let mut registry = BackendRegistry::new();

    if let (Some(url), Some(kb_id)) = (&config.knowledge_base_url, &config.knowledge_base_id) {
        let mut backend = KnowledgeBaseBackend::new(url, kb_id)
            .with_timeout(config.tool_timeout)
            .with_max_results(config.knowledge_base_max_results);
        if let Some(key) = &config.knowledge_base_api_key {
            backend = backend.with_api_key(key);
        }
        info!(url = %url, knowledge_base_id = %kb_id, "Knowledge base backend configured");
        registry.register(Arc::new(backend));
    }

    if let Some(url) = &config.agent_url {
        let mut backend = AgentBackend::new(url).with_timeout(config.tool_timeout);
        if let Some(key) = &config.agent_api_key {
            backend = backend.with_api_key(key);
        }
        info!(url = %url, "Agent backend configured");
        registry.register(Arc::new(backend));
    }

    let account_source: Option<Arc<dyn AccountSource>> =
        match (&config.accounts_url, &config.accounts_file) {
            (Some(url), file) => {
                if file.is_some() {
                    warn!("Both ACCOUNTS_URL and ACCOUNTS_FILE set; using the URL");
                }
                let mut source = HttpAccountSource::new(url).with_timeout(config.tool_timeout);
                if let Some(key) = &config.accounts_api_key {
                    source = source.with_api_key(key);
                }
                info!(url = %url, "Account backend configured");
                Some(Arc::new(source))
            }
            (None, Some(path)) => {
                info!(path = %path.display(), "Account backend configured");
                Some(Arc::new(JsonFileAccountSource::new(path)))
            }
            (None, None) => None,
        };
    if let Some(source) = account_source {
        registry.register(Arc::new(AccountBackend::new(source)));
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backends::BackendKind;

    #[test]
    fn test_state_from_config() {
        let mut config = ServerConfig::default();
        config.knowledge_base_url = Some("https://kb.example.com/retrieve".to_string());
        config.knowledge_base_id = Some("KB1".to_string());
        config.agent_url = Some("https://agent.example.com/invoke".to_string());
        config.accounts_file = Some("accounts.json".into());

        let state = AppState::new(config).unwrap();
        assert!(state.backends.contains(BackendKind::KnowledgeBase));
        assert!(state.backends.contains(BackendKind::Agent));
        assert!(state.backends.contains(BackendKind::Accounts));
        assert!(state.runtime_factory.is_none());
        assert_eq!(state.keepalive_frames.as_ref().map(|f| f.len()), Some(3));
    }

    #[test]
    fn test_keepalive_disabled() {
        let mut config = ServerConfig::default();
        config.keepalive_enabled = false;

        let state = AppState::new(config).unwrap();
        assert!(state.keepalive_frames.is_none());
        assert!(state.backends.is_empty());
    }
}
