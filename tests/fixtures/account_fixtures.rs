//! Account table fixtures.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use voicebridge_gateway::core::backends::BackendResult;
use voicebridge_gateway::core::backends::accounts::{AccountRecord, AccountSource, AccountTable};

/// Rows in the column layout of the spreadsheet export.
pub fn account_rows() -> Value {
    json!([
        {
            "AWS Account Number": "100942612345",
            "AWS account Name": "AWS Project 10",
            "Provisioning Date": "31-Mar-19",
            "Status": "ACTIVE",
            "Classification": "Class 1",
            "Management Type": "Managed",
            "Cost of Account in Indian Rupees": 150000
        },
        {
            "AWS Account Number": "200000000001",
            "AWS account Name": "Payments Prod",
            "Provisioning Date": "15-Jan-20",
            "Status": "ACTIVE",
            "Classification": "Class-2",
            "Management Type": "self service",
            "Cost of Account in Indian Rupees": 42000
        },
        {
            "AWS Account Number": "300000000002",
            "AWS account Name": "Payments Sandbox",
            "Provisioning Date": "02-Feb-20",
            "Status": "SUSPENDED",
            "Classification": "Class-2",
            "Management Type": "Self Service",
            "Cost of Account in Indian Rupees": 8000
        }
    ])
}

pub fn account_records() -> Vec<AccountRecord> {
    serde_json::from_value(account_rows()).expect("fixture rows parse")
}

/// Never produces the table.
#[derive(Default)]
pub struct StalledAccountSource {
    pub calls: AtomicUsize,
}

impl StalledAccountSource {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountSource for StalledAccountSource {
    async fn table(&self) -> BackendResult<Arc<AccountTable>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}
