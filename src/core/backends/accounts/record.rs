//! Account records as served by the tabular account source.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

/// Provisioning dates are written like `31-Mar-19`.
pub const PROVISIONING_DATE_FORMAT: &str = "%d-%b-%y";

/// One row of the account table.
///
/// Field aliases accept the column names of the spreadsheet export the
/// table is usually generated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    #[serde(alias = "AWS Account Number", deserialize_with = "string_or_number")]
    pub account_number: String,
    #[serde(alias = "AWS account Name", alias = "AWS Account Name")]
    pub account_name: String,
    #[serde(alias = "Provisioning Date", default)]
    pub provisioning_date: String,
    #[serde(alias = "Status", default)]
    pub status: String,
    #[serde(alias = "Classification", default)]
    pub classification: String,
    #[serde(alias = "Management Type", default)]
    pub management_type: String,
    /// Cost in Indian rupees.
    #[serde(
        alias = "Cost of Account in Indian Rupees",
        alias = "Total Cost of Account in Indian Rupees",
        default,
        deserialize_with = "amount"
    )]
    pub cost: f64,
}

impl AccountRecord {
    /// Trim fields and bring classification and management type to their
    /// canonical spelling.
    pub fn normalized(mut self) -> Self {
        self.account_number = self.account_number.trim().to_string();
        self.account_name = self.account_name.trim().to_string();
        self.provisioning_date = self.provisioning_date.trim().to_string();
        self.status = self.status.trim().to_string();
        self.classification = normalize_classification(&self.classification);
        self.management_type = normalize_management_type(&self.management_type);
        self
    }

    pub fn provisioning_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.provisioning_date, PROVISIONING_DATE_FORMAT).ok()
    }

    pub fn provisioning_year(&self) -> Option<i32> {
        self.provisioning_date().map(|d| d.year())
    }

    /// Whole rupees, truncated.
    pub fn whole_cost(&self) -> i64 {
        self.cost.trunc() as i64
    }

    /// The account number spelled digit by digit, so it is read out one
    /// digit at a time.
    pub fn account_number_as_digits(&self) -> String {
        spell_digits(&self.account_number)
    }
}

/// `"class 1"`, `"CLASS-1"` and `"Class-1"` all become `"Class-1"`.
pub fn normalize_classification(raw: &str) -> String {
    let raw = raw.trim();
    let suffix = if raw.contains('-') {
        raw.rsplit('-').next()
    } else if raw.contains(' ') {
        raw.rsplit(' ').next()
    } else {
        None
    };
    match suffix.map(str::trim).filter(|s| !s.is_empty()) {
        Some(suffix) => format!("Class-{suffix}"),
        None => raw.to_string(),
    }
}

pub fn normalize_management_type(raw: &str) -> String {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("self service") {
        "Self Service".to_string()
    } else {
        raw.to_string()
    }
}

pub fn spell_digits(value: &str) -> String {
    value
        .chars()
        .map(String::from)
        .collect::<Vec<_>>()
        .join(" ")
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("cost out of range")),
        serde_json::Value::String(s) => s
            .trim()
            .replace(',', "")
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid cost {s:?}: {e}"))),
        serde_json::Value::Null => Ok(0.0),
        other => Err(serde::de::Error::custom(format!(
            "expected number, got {other}"
        ))),
    }
}
