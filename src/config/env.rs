//! Environment variable readers.

use std::env;
use std::str::FromStr;

/// Read a variable, treating blank values as unset.
pub(crate) fn env_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable, or `None` when unset.
pub(crate) fn parse_env<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name}: '{raw}' ({e})")),
        None => Ok(None),
    }
}

/// Parse a boolean flag. Accepts true/false, 1/0, yes/no, on/off.
pub(crate) fn parse_bool_env(name: &str) -> Result<Option<bool>, String> {
    match env_var(name) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(format!("Invalid boolean for {name}: '{raw}'")),
        },
        None => Ok(None),
    }
}

/// Split a comma-separated list, dropping blanks.
pub(crate) fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
