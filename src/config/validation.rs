use std::ops::RangeInclusive;

use super::ServerConfig;

/// Sample rates the gateway accepts on either side of the codec.
pub const SUPPORTED_SAMPLE_RATES: RangeInclusive<u32> = 8000..=48000;

/// Validate a merged configuration.
pub(crate) fn validate(config: &ServerConfig) -> Result<(), String> {
    validate_sample_rate("target_sample_rate", config.target_sample_rate)?;
    if let Some(rate) = config.native_sample_rate {
        validate_sample_rate("native_sample_rate", rate)?;
    }

    if config.tool_timeout.is_zero() {
        return Err("tool_timeout must be greater than zero".to_string());
    }
    if config.send_timeout.is_zero() {
        return Err("send_timeout must be greater than zero".to_string());
    }

    if config.keepalive_enabled && config.keepalive_schedule.is_empty() {
        return Err("keep-alive is enabled but its schedule is empty".to_string());
    }

    if config.knowledge_base_max_results == 0 {
        return Err("knowledge_base max_results must be greater than zero".to_string());
    }
    if config.knowledge_base_url.is_some() && config.knowledge_base_id.is_none() {
        return Err("KNOWLEDGE_BASE_ID is required when KNOWLEDGE_BASE_URL is set".to_string());
    }
    if config.accounts_api_key.is_some() && config.accounts_url.is_none() {
        return Err("ACCOUNTS_API_KEY is set but ACCOUNTS_URL is not".to_string());
    }
    if config.agent_id.is_some() != config.agent_alias_id.is_some() {
        return Err("AGENT_ID and AGENT_ALIAS_ID must be set together".to_string());
    }

    Ok(())
}

fn validate_sample_rate(field: &str, rate: u32) -> Result<(), String> {
    if SUPPORTED_SAMPLE_RATES.contains(&rate) {
        Ok(())
    } else {
        Err(format!(
            "{field} {rate} is outside {}..={} Hz",
            SUPPORTED_SAMPLE_RATES.start(),
            SUPPORTED_SAMPLE_RATES.end()
        ))
    }
}
