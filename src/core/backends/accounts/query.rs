//! Filter and aggregate queries over the account table.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value, json};

use super::record::{AccountRecord, normalize_classification, normalize_management_type};

/// Spoken lists stop after this many accounts.
const SPOKEN_ACCOUNTS: usize = 10;

/// A structured question about the account table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountQuery {
    /// One account by number, or by name when no number is given.
    Details {
        account_number: Option<String>,
        account_name: Option<String>,
    },
    ByClassification { classification: String },
    ClassificationSummary,
    ManagementTypeSummary,
    TotalCost,
    StatusSummary,
    ByYear { year: i32 },
    YearSummary,
}

impl AccountQuery {
    /// Short description used in notices and display titles.
    pub fn describe(&self) -> String {
        match self {
            AccountQuery::Details {
                account_number: Some(number),
                ..
            } => format!("account {number}"),
            AccountQuery::Details {
                account_name: Some(name),
                ..
            } => format!("account {name}"),
            AccountQuery::Details { .. } => "account details".to_string(),
            AccountQuery::ByClassification { classification } => {
                format!("{} accounts", normalize_classification(classification))
            }
            AccountQuery::ClassificationSummary => "accounts by classification".to_string(),
            AccountQuery::ManagementTypeSummary => "accounts by management type".to_string(),
            AccountQuery::TotalCost => "total account cost".to_string(),
            AccountQuery::StatusSummary => "accounts by status".to_string(),
            AccountQuery::ByYear { year } => format!("accounts provisioned in {year}"),
            AccountQuery::YearSummary => "accounts by provisioning year".to_string(),
        }
    }
}

/// Result of an account query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountAnswer {
    /// Sentence for the runtime to speak. `None` when nothing matched.
    pub text: Option<String>,
    /// Structured rows for the display channel.
    pub rows: Vec<Map<String, Value>>,
}

impl AccountAnswer {
    fn not_found() -> Self {
        Self::default()
    }

    pub fn is_found(&self) -> bool {
        self.text.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Group {
    key: String,
    count: usize,
    total_cost: f64,
}

/// In-memory account table.
#[derive(Debug, Clone, Default)]
pub struct AccountTable {
    records: Vec<AccountRecord>,
}

impl AccountTable {
    pub fn new(records: Vec<AccountRecord>) -> Self {
        Self {
            records: records.into_iter().map(AccountRecord::normalized).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[AccountRecord] {
        &self.records
    }

    pub fn find_by_number(&self, number: &str) -> Option<&AccountRecord> {
        let number = number.trim();
        self.records.iter().find(|r| r.account_number == number)
    }

    /// Exact match first, then case-insensitive, then substring.
    pub fn find_by_name(&self, name: &str) -> Option<&AccountRecord> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let lowered = name.to_lowercase();
        self.records
            .iter()
            .find(|r| r.account_name == name)
            .or_else(|| {
                self.records
                    .iter()
                    .find(|r| r.account_name.to_lowercase() == lowered)
            })
            .or_else(|| {
                self.records
                    .iter()
                    .find(|r| r.account_name.to_lowercase().contains(&lowered))
            })
    }

    pub fn by_classification(&self, classification: &str) -> Vec<&AccountRecord> {
        let wanted = normalize_classification(classification);
        self.records
            .iter()
            .filter(|r| r.classification.eq_ignore_ascii_case(&wanted))
            .collect()
    }

    pub fn by_management_type(&self, management_type: &str) -> Vec<&AccountRecord> {
        let wanted = normalize_management_type(management_type);
        self.records
            .iter()
            .filter(|r| r.management_type.eq_ignore_ascii_case(&wanted))
            .collect()
    }

    pub fn by_year(&self, year: i32) -> Vec<&AccountRecord> {
        self.records
            .iter()
            .filter(|r| r.provisioning_year() == Some(year))
            .collect()
    }

    pub fn total_cost(&self) -> f64 {
        self.records.iter().map(|r| r.cost).sum()
    }

    /// Account counts per provisioning year, oldest first. Rows with an
    /// unreadable date are skipped.
    pub fn count_by_year(&self) -> BTreeMap<i32, usize> {
        let mut counts = BTreeMap::new();
        for year in self.records.iter().filter_map(AccountRecord::provisioning_year) {
            *counts.entry(year).or_insert(0) += 1;
        }
        counts
    }

    /// Largest groups first; ties in key order.
    fn group_by(&self, key: impl Fn(&AccountRecord) -> &str) -> Vec<Group> {
        let mut groups: HashMap<&str, Group> = HashMap::new();
        for record in &self.records {
            let name = key(record);
            let group = groups.entry(name).or_insert_with(|| Group {
                key: name.to_string(),
                count: 0,
                total_cost: 0.0,
            });
            group.count += 1;
            group.total_cost += record.cost;
        }
        let mut groups: Vec<Group> = groups.into_values().collect();
        groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        groups
    }

    pub fn answer(&self, query: &AccountQuery) -> AccountAnswer {
        match query {
            AccountQuery::Details {
                account_number,
                account_name,
            } => {
                let found = match (account_number, account_name) {
                    (Some(number), _) => self.find_by_number(number),
                    (None, Some(name)) => self.find_by_name(name),
                    (None, None) => None,
                };
                found.map(details_answer).unwrap_or_else(AccountAnswer::not_found)
            }
            AccountQuery::ByClassification { classification } => {
                let label = normalize_classification(classification);
                let accounts = self.by_classification(classification);
                list_answer(
                    &accounts,
                    format!("Found {} with classification {label}", plural(accounts.len())),
                )
            }
            AccountQuery::ByYear { year } => {
                let accounts = self.by_year(*year);
                list_answer(
                    &accounts,
                    format!("Found {} provisioned in {year}", plural(accounts.len())),
                )
            }
            AccountQuery::ClassificationSummary => {
                group_answer(
                    self.group_by(|r| r.classification.as_str()),
                    "classification",
                    self.len(),
                )
            }
            AccountQuery::ManagementTypeSummary => group_answer(
                self.group_by(|r| r.management_type.as_str()),
                "management_type",
                self.len(),
            ),
            AccountQuery::StatusSummary => {
                if self.is_empty() {
                    return AccountAnswer::not_found();
                }
                let groups = self.group_by(|r| r.status.as_str());
                let spoken: Vec<String> = groups
                    .iter()
                    .map(|g| format!("{} {}", g.count, g.key))
                    .collect();
                AccountAnswer {
                    text: Some(format!(
                        "Of {}, {}.",
                        plural(self.len()),
                        spoken.join(", ")
                    )),
                    rows: groups
                        .iter()
                        .map(|g| row(json!({ "status": g.key, "count": g.count })))
                        .collect(),
                }
            }
            AccountQuery::TotalCost => {
                if self.is_empty() {
                    return AccountAnswer::not_found();
                }
                let total = self.total_cost().trunc() as i64;
                AccountAnswer {
                    text: Some(format!(
                        "The total cost of all {} is {total} Indian rupees.",
                        plural(self.len())
                    )),
                    rows: vec![row(
                        json!({ "total_cost": total, "account_count": self.len() }),
                    )],
                }
            }
            AccountQuery::YearSummary => {
                let counts = self.count_by_year();
                if counts.is_empty() {
                    return AccountAnswer::not_found();
                }
                let spoken: Vec<String> = counts
                    .iter()
                    .map(|(year, count)| format!("{year}: {count}"))
                    .collect();
                AccountAnswer {
                    text: Some(format!(
                        "Accounts provisioned per year. {}.",
                        spoken.join(", ")
                    )),
                    rows: counts
                        .iter()
                        .map(|(year, count)| row(json!({ "year": year, "count": count })))
                        .collect(),
                }
            }
        }
    }
}

fn plural(count: usize) -> String {
    if count == 1 {
        "1 account".to_string()
    } else {
        format!("{count} accounts")
    }
}

fn row(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn details_answer(record: &AccountRecord) -> AccountAnswer {
    let digits = record.account_number_as_digits();
    let text = format!(
        "Account {} has number {digits}. It is {}, classification {}, {} managed, provisioned on {}, and costs {} Indian rupees.",
        record.account_name,
        record.status,
        record.classification,
        record.management_type,
        record.provisioning_date,
        record.whole_cost(),
    );
    AccountAnswer {
        text: Some(text),
        rows: vec![row(json!({
            "account_number": record.account_number,
            "account_number_as_digits": digits,
            "account_name": record.account_name,
            "provisioning_date": record.provisioning_date,
            "status": record.status,
            "classification": record.classification,
            "management_type": record.management_type,
            "cost": record.whole_cost(),
        }))],
    }
}

fn list_answer(accounts: &[&AccountRecord], heading: String) -> AccountAnswer {
    if accounts.is_empty() {
        return AccountAnswer::not_found();
    }
    let spoken: Vec<String> = accounts
        .iter()
        .take(SPOKEN_ACCOUNTS)
        .map(|r| format!("{} ({}, {} rupees)", r.account_name, r.status, r.whole_cost()))
        .collect();
    let mut text = format!("{heading}: {}", spoken.join("; "));
    if accounts.len() > SPOKEN_ACCOUNTS {
        text.push_str(&format!(", and {} more", accounts.len() - SPOKEN_ACCOUNTS));
    }
    text.push('.');

    AccountAnswer {
        text: Some(text),
        rows: accounts
            .iter()
            .map(|r| {
                row(json!({
                    "account_number": r.account_number,
                    "account_name": r.account_name,
                    "provisioning_date": r.provisioning_date,
                    "status": r.status,
                    "cost": r.whole_cost(),
                }))
            })
            .collect(),
    }
}

fn group_answer(groups: Vec<Group>, field: &str, total: usize) -> AccountAnswer {
    if groups.is_empty() {
        return AccountAnswer::not_found();
    }
    let label = field.replace('_', " ");
    let spoken: Vec<String> = groups
        .iter()
        .map(|g| {
            format!(
                "{}: {}, {} rupees",
                g.key,
                plural(g.count),
                g.total_cost.trunc() as i64
            )
        })
        .collect();
    AccountAnswer {
        text: Some(format!(
            "{} by {label}. {}.",
            plural(total),
            spoken.join("; ")
        )),
        rows: groups
            .iter()
            .map(|g| {
                let mut map = Map::new();
                map.insert(field.to_string(), Value::String(g.key.clone()));
                map.insert("count".to_string(), json!(g.count));
                map.insert("total_cost".to_string(), json!(g.total_cost.trunc() as i64));
                map
            })
            .collect(),
    }
}
