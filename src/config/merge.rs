//! Builds a [`ServerConfig`] from environment variables with YAML overrides.

use std::path::PathBuf;
use std::time::Duration;

use super::ServerConfig;
use super::env::{env_var, parse_bool_env, parse_env, parse_list};
use super::yaml::YamlConfig;
use crate::core::coordinator::KeepAliveSchedule;

/// Merge environment variables (base) with optional YAML overrides.
pub(crate) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml.unwrap_or_default();
    let mut config = ServerConfig::default();

    // Server
    let server = yaml.server.unwrap_or_default();
    if let Some(host) = server.host.or_else(|| env_var("HOST")) {
        config.host = host;
    }
    if let Some(port) = server.port.or(parse_env("PORT")?) {
        config.port = port;
    }

    // Auth and security
    config.auth_token = yaml
        .auth
        .unwrap_or_default()
        .token
        .filter(|t| !t.is_empty())
        .or_else(|| env_var("AUTH_TOKEN"));
    config.cors_allowed_origins = yaml
        .security
        .unwrap_or_default()
        .cors_allowed_origins
        .or_else(|| env_var("CORS_ALLOWED_ORIGINS"));

    // Audio
    let audio = yaml.audio.unwrap_or_default();
    if let Some(rate) = audio
        .target_sample_rate
        .or(parse_env("TARGET_SAMPLE_RATE")?)
    {
        config.target_sample_rate = rate;
    }
    config.native_sample_rate = audio
        .native_sample_rate
        .or(parse_env("NATIVE_SAMPLE_RATE")?);

    // Tool calls
    let tools = yaml.tools.unwrap_or_default();
    if let Some(secs) = tools.timeout_seconds.or(parse_env("TOOL_TIMEOUT_SECONDS")?) {
        config.tool_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = tools
        .send_timeout_seconds
        .or(parse_env("SEND_TIMEOUT_SECONDS")?)
    {
        config.send_timeout = Duration::from_secs(secs);
    }

    // Keep-alive
    let keepalive = yaml.keepalive.unwrap_or_default();
    if let Some(enabled) = keepalive.enabled.or(parse_bool_env("KEEPALIVE_ENABLED")?) {
        config.keepalive_enabled = enabled;
    }
    if let Some(raw) = keepalive.schedule.or_else(|| env_var("KEEPALIVE_SCHEDULE")) {
        config.keepalive_schedule = raw
            .parse::<KeepAliveSchedule>()
            .map_err(|e| format!("Invalid keep-alive schedule: {e}"))?;
    }

    // Knowledge base backend
    let kb = yaml.knowledge_base.unwrap_or_default();
    config.knowledge_base_url = kb.url.or_else(|| env_var("KNOWLEDGE_BASE_URL"));
    config.knowledge_base_api_key = kb.api_key.or_else(|| env_var("KNOWLEDGE_BASE_API_KEY"));
    config.knowledge_base_id = kb.id.or_else(|| env_var("KNOWLEDGE_BASE_ID"));
    if let Some(max) = kb
        .max_results
        .or(parse_env("KNOWLEDGE_BASE_MAX_RESULTS")?)
    {
        config.knowledge_base_max_results = max;
    }
    if let Some(keywords) = kb
        .keywords
        .or_else(|| env_var("KNOWLEDGE_BASE_KEYWORDS").map(|raw| parse_list(&raw)))
    {
        config.knowledge_base_keywords = keywords;
    }

    // Agent backend
    let agent = yaml.agent.unwrap_or_default();
    config.agent_url = agent.url.or_else(|| env_var("AGENT_URL"));
    config.agent_api_key = agent.api_key.or_else(|| env_var("AGENT_API_KEY"));
    config.agent_id = agent.id.or_else(|| env_var("AGENT_ID"));
    config.agent_alias_id = agent.alias_id.or_else(|| env_var("AGENT_ALIAS_ID"));
    if let Some(keywords) = agent
        .keywords
        .or_else(|| env_var("AGENT_KEYWORDS").map(|raw| parse_list(&raw)))
    {
        config.agent_keywords = keywords;
    }

    // Account lookups
    let accounts = yaml.accounts.unwrap_or_default();
    config.accounts_url = accounts.url.or_else(|| env_var("ACCOUNTS_URL"));
    config.accounts_api_key = accounts.api_key.or_else(|| env_var("ACCOUNTS_API_KEY"));
    config.accounts_file = accounts
        .file
        .or_else(|| env_var("ACCOUNTS_FILE"))
        .map(PathBuf::from);

    // Conversational runtime
    let runtime = yaml.runtime.unwrap_or_default();
    config.openai_api_key = runtime
        .openai_api_key
        .or_else(|| env_var("OPENAI_API_KEY"));
    if let Some(model) = runtime.model.or_else(|| env_var("OPENAI_REALTIME_MODEL")) {
        config.openai_realtime_model = model;
    }
    config.openai_realtime_voice = runtime
        .voice
        .or_else(|| env_var("OPENAI_REALTIME_VOICE"));
    config.system_prompt_path = runtime
        .system_prompt_path
        .or_else(|| env_var("SYSTEM_PROMPT_PATH"))
        .map(PathBuf::from);

    Ok(config)
}
