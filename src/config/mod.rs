//! Configuration module for the voice gateway
//!
//! Configuration comes from .env files, environment variables and an optional
//! YAML file. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable readers
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use voicebridge_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//!
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

pub use validation::SUPPORTED_SAMPLE_RATES;

use crate::core::backends::BackendKind;
use crate::core::codec::DEFAULT_TARGET_SAMPLE_RATE;
use crate::core::coordinator::{
    ClassificationTable, DEFAULT_AGENT_VOCABULARY, DEFAULT_TOOL_TIMEOUT, KeepAliveSchedule, Route,
    ToolName, tool_schemas,
};
use crate::core::coordinator::tools::MAX_RESULTS_LIMIT;
use crate::core::runtime::RuntimeConfig;
use crate::core::runtime::openai::OpenAIRealtimeModel;
use crate::core::session::{DEFAULT_SEND_TIMEOUT, RoutingTarget};

/// Server configuration
///
/// Contains everything needed to run the gateway:
/// - Server settings (host, port, shared auth token, CORS)
/// - Audio rates for the client wire and the runtime
/// - Tool-call timeouts and keep-alive schedule
/// - Knowledge-base, agent and account backends
/// - Conversational runtime credentials
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    /// Shared token clients must present. `None` disables authentication.
    pub auth_token: Option<String>,
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,

    // Audio
    /// Sample rate of media sent to clients
    pub target_sample_rate: u32,
    /// Rate the runtime is expected to consume; sessions are refused when the
    /// runtime disagrees
    pub native_sample_rate: Option<u32>,

    // Tool calls
    pub tool_timeout: Duration,
    /// Bound on a single push to the client socket
    pub send_timeout: Duration,
    pub keepalive_enabled: bool,
    pub keepalive_schedule: KeepAliveSchedule,

    // Knowledge-base backend
    pub knowledge_base_url: Option<String>,
    pub knowledge_base_api_key: Option<String>,
    pub knowledge_base_id: Option<String>,
    /// Upper bound on hits requested per lookup
    pub knowledge_base_max_results: usize,
    pub knowledge_base_keywords: Vec<String>,

    // Agent backend
    pub agent_url: Option<String>,
    pub agent_api_key: Option<String>,
    pub agent_id: Option<String>,
    pub agent_alias_id: Option<String>,
    pub agent_keywords: Vec<String>,

    // Account lookups
    /// HTTP endpoint serving the account table. Takes precedence over the file.
    pub accounts_url: Option<String>,
    pub accounts_api_key: Option<String>,
    /// JSON file holding the account table
    pub accounts_file: Option<PathBuf>,

    // Conversational runtime
    pub openai_api_key: Option<String>,
    pub openai_realtime_model: String,
    pub openai_realtime_voice: Option<String>,
    /// File holding the assistant's system instructions
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            auth_token: None,
            cors_allowed_origins: None,
            target_sample_rate: DEFAULT_TARGET_SAMPLE_RATE,
            native_sample_rate: None,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            keepalive_enabled: true,
            keepalive_schedule: KeepAliveSchedule::default(),
            knowledge_base_url: None,
            knowledge_base_api_key: None,
            knowledge_base_id: None,
            knowledge_base_max_results: MAX_RESULTS_LIMIT,
            knowledge_base_keywords: Vec::new(),
            agent_url: None,
            agent_api_key: None,
            agent_id: None,
            agent_alias_id: None,
            agent_keywords: DEFAULT_AGENT_VOCABULARY
                .iter()
                .map(|w| w.to_string())
                .collect(),
            accounts_url: None,
            accounts_api_key: None,
            accounts_file: None,
            openai_api_key: None,
            openai_realtime_model: OpenAIRealtimeModel::default().as_str().to_string(),
            openai_realtime_voice: None,
            system_prompt_path: None,
        }
    }
}

/// Zeroize secrets when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut token) = self.auth_token {
            token.zeroize();
        }
        if let Some(ref mut key) = self.knowledge_base_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.agent_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.accounts_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base.
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_auth_required(&self) -> bool {
        self.auth_token.is_some()
    }

    /// Agent target used until a session configures its own.
    pub fn default_agent_target(&self) -> Option<Arc<RoutingTarget>> {
        match (&self.agent_id, &self.agent_alias_id) {
            (Some(agent_id), Some(agent_alias_id)) => Some(Arc::new(RoutingTarget {
                agent_id: agent_id.clone(),
                agent_alias_id: agent_alias_id.clone(),
                region: None,
            })),
            _ => None,
        }
    }

    /// Keyword routes: agent vocabulary first, knowledge-base default.
    pub fn classification_table(&self) -> ClassificationTable {
        let mut routes = vec![Route::new(BackendKind::Agent, &self.agent_keywords)];
        if !self.knowledge_base_keywords.is_empty() {
            routes.push(Route::new(
                BackendKind::KnowledgeBase,
                &self.knowledge_base_keywords,
            ));
        }
        ClassificationTable::new(routes, BackendKind::KnowledgeBase)
    }

    pub fn has_account_source(&self) -> bool {
        self.accounts_url.is_some() || self.accounts_file.is_some()
    }

    /// Runtime settings, reading the system prompt file when configured.
    ///
    /// Account tools are only published when an account source is configured.
    pub fn runtime_config(&self) -> Result<Option<RuntimeConfig>, String> {
        let Some(api_key) = self.openai_api_key.clone() else {
            return Ok(None);
        };

        let instructions = match &self.system_prompt_path {
            Some(path) => Some(std::fs::read_to_string(path).map_err(|e| {
                format!("Failed to read system prompt {}: {e}", path.display())
            })?),
            None => None,
        };

        Ok(Some(RuntimeConfig {
            api_key,
            model: self.openai_realtime_model.clone(),
            voice: self.openai_realtime_voice.clone(),
            instructions,
            tools: tool_schemas()
                .into_iter()
                .filter(|schema| {
                    self.has_account_source()
                        || schema
                            .name
                            .parse::<ToolName>()
                            .is_ok_and(|tool| !tool.is_account_tool())
                })
                .collect(),
        }))
    }
}
