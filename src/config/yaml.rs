use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional. Values present here override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///
/// auth:
///   token: "shared-token"
///
/// security:
///   cors_allowed_origins: "https://app.example.com"
///
/// audio:
///   target_sample_rate: 16000
///   native_sample_rate: 24000
///
/// tools:
///   timeout_seconds: 30
///   send_timeout_seconds: 5
///
/// keepalive:
///   enabled: true
///   schedule: "200:5000,500:5000,1000:5000"
///
/// knowledge_base:
///   url: "https://kb.example.com/retrieve"
///   api_key: "kb-key"
///   id: "KB123"
///   max_results: 10
///   keywords: ["faq"]
///
/// agent:
///   url: "https://agent.example.com/invoke"
///   api_key: "agent-key"
///   id: "AGENT1"
///   alias_id: "ALIAS1"
///   keywords: ["sop", "runbook"]
///
/// accounts:
///   file: "data/accounts.json"
///
/// runtime:
///   openai_api_key: "sk-..."
///   model: "gpt-4o-realtime-preview"
///   voice: "alloy"
///   system_prompt_path: "/etc/voicebridge/prompt.txt"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub auth: Option<AuthYaml>,
    pub security: Option<SecurityYaml>,
    pub audio: Option<AudioYaml>,
    pub tools: Option<ToolsYaml>,
    pub keepalive: Option<KeepAliveYaml>,
    pub knowledge_base: Option<KnowledgeBaseYaml>,
    pub agent: Option<AgentYaml>,
    pub accounts: Option<AccountsYaml>,
    pub runtime: Option<RuntimeYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthYaml {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioYaml {
    pub target_sample_rate: Option<u32>,
    pub native_sample_rate: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ToolsYaml {
    pub timeout_seconds: Option<u64>,
    pub send_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct KeepAliveYaml {
    pub enabled: Option<bool>,
    /// `frame_ms:interval_ms` pairs, comma separated
    pub schedule: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct KnowledgeBaseYaml {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub id: Option<String>,
    pub max_results: Option<usize>,
    pub keywords: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AgentYaml {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub id: Option<String>,
    pub alias_id: Option<String>,
    pub keywords: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AccountsYaml {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RuntimeYaml {
    pub openai_api_key: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub system_prompt_path: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
