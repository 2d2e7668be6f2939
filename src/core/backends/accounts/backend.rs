use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::query::AccountAnswer;
use super::source::AccountSource;
use crate::core::backends::base::{
    BackendError, BackendKind, BackendResult, LookupBackend, LookupHit, LookupRequest,
    LookupResponse,
};

/// Answers account questions from an [`AccountSource`].
pub struct AccountBackend {
    source: Arc<dyn AccountSource>,
}

impl AccountBackend {
    pub fn new(source: Arc<dyn AccountSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl LookupBackend for AccountBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Accounts
    }

    async fn lookup(&self, request: &LookupRequest) -> BackendResult<LookupResponse> {
        let Some(query) = &request.account else {
            return Err(BackendError::Decode {
                url: "accounts".to_string(),
                message: format!("'{}' is not an account query", request.query),
            });
        };

        let table = self.source.table().await?;
        let answer = table.answer(query);
        debug!(
            query = %request.query,
            accounts = table.len(),
            rows = answer.rows.len(),
            "Account lookup"
        );
        Ok(into_response(answer))
    }
}

fn into_response(answer: AccountAnswer) -> LookupResponse {
    let hits = answer
        .rows
        .into_iter()
        .map(|row| {
            let title = row
                .get("account_name")
                .and_then(Value::as_str)
                .map(str::to_string);
            LookupHit {
                content: Value::Object(row.clone()).to_string(),
                title,
                source: None,
                score: None,
                metadata: row,
            }
        })
        .collect();
    LookupResponse {
        generated_answer: answer.text,
        hits,
    }
}
