//! Result formatting for the display channel and the spoken summary.

use serde::Serialize;
use serde_json::{Map, Value, json};

use super::tool_call::ToolOutcome;
use super::tools::{ToolName, ToolRequest};
use crate::core::backends::{BackendKind, LookupHit, LookupResponse};
use crate::core::codec::WireEvent;
use crate::core::session::RoutingTarget;

/// Summary returned to the runtime when a lookup times out.
pub const TIMEOUT_MESSAGE: &str =
    "The lookup took too long to complete. Please try asking a simpler question.";

/// Display content when a backend fails. Error details stay in the logs.
pub const LOOKUP_FAILED_MESSAGE: &str =
    "The lookup service is unavailable right now. Please try again shortly.";

/// Content used when a lookup finds nothing.
pub const EMPTY_MESSAGE: &str = "No matching documents were found.";

/// Content used when an account lookup finds nothing.
pub const ACCOUNTS_EMPTY_MESSAGE: &str = "No matching accounts were found.";

/// Display snippets are cut to this many characters.
pub const SNIPPET_CHARS: usize = 200;

/// Spoken summaries are cut to this many characters.
pub const SUMMARY_CHARS: usize = 1500;

/// Hits listed in a partial-result summary.
const SUMMARY_HITS: usize = 3;

/// Payload pushed on the client display channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayPayload {
    pub title: String,
    pub content: Value,
    pub source: Option<String>,
    pub metadata: Value,
}

impl DisplayPayload {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            title: "Error".to_string(),
            content: Value::String(message.into()),
            source: None,
            metadata: Value::Object(Map::new()),
        }
    }

    /// Wrap as a `knowledge_base` wire event.
    pub fn to_event(&self) -> Result<WireEvent, serde_json::Error> {
        Ok(WireEvent::KnowledgeBase {
            data: serde_json::to_string(self)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct ProcessingNotice<'a> {
    status: &'static str,
    message: String,
    query: &'a str,
}

/// `kb_processing` event announcing that a lookup has started.
pub fn processing_event(request: &ToolRequest) -> Result<WireEvent, serde_json::Error> {
    let notice = ProcessingNotice {
        status: "processing",
        message: format!("Processing {} request...", request.tool),
        query: &request.subject,
    };
    Ok(WireEvent::KbProcessing {
        data: serde_json::to_string(&notice)?,
    })
}

/// Agent details attached to agent responses.
#[derive(Debug, Clone, Copy)]
pub struct AgentContext<'a> {
    pub target: Option<&'a RoutingTarget>,
    pub session_id: &'a str,
}

/// Display payload for a completed backend lookup.
pub fn display_payload(
    request: &ToolRequest,
    backend: BackendKind,
    response: &LookupResponse,
    agent: AgentContext<'_>,
) -> DisplayPayload {
    let first_source = response.hits.iter().find_map(|h| h.source.clone());

    if backend == BackendKind::Agent {
        let metadata = json!({
            "agent_id": agent.target.map(|t| t.agent_id.as_str()),
            "agent_alias_id": agent.target.map(|t| t.agent_alias_id.as_str()),
            "session_id": agent.session_id,
        });
        return DisplayPayload {
            title: format!("Agent Response for: {}", request.subject),
            content: Value::String(response.answer().unwrap_or(EMPTY_MESSAGE).to_string()),
            source: first_source,
            metadata,
        };
    }

    match request.tool {
        ToolName::GetDocumentById => {
            let hit = response.hits.first();
            let content = hit
                .map(|h| h.content.trim())
                .filter(|c| !c.is_empty())
                .or(response.answer())
                .unwrap_or(EMPTY_MESSAGE);
            DisplayPayload {
                title: format!("Document: {}", request.subject),
                content: Value::String(content.to_string()),
                source: hit.and_then(|h| h.source.clone()),
                metadata: Value::Object(hit.map(|h| h.metadata.clone()).unwrap_or_default()),
            }
        }
        ToolName::SearchDocuments => {
            let content = if response.hits.is_empty() {
                Value::String(EMPTY_MESSAGE.to_string())
            } else {
                Value::Array(
                    response
                        .hits
                        .iter()
                        .map(|hit| {
                            json!({
                                "title": hit.title.clone().unwrap_or_else(|| "Untitled".to_string()),
                                "content": truncate_snippet(&hit.content, SNIPPET_CHARS),
                                "source": hit.source,
                                "score": hit.score,
                            })
                        })
                        .collect(),
                )
            };
            DisplayPayload {
                title: format!("Search Results for: {}", request.subject),
                content,
                source: first_source,
                metadata: json!({ "document_type": request.document_type }),
            }
        }
        ToolName::GetAccountDetails
        | ToolName::GetAccountsByClassification
        | ToolName::GetClassificationSummary
        | ToolName::GetManagementTypeSummary
        | ToolName::GetTotalCost
        | ToolName::GetAccountStatusSummary
        | ToolName::GetAccountsByYear
        | ToolName::GetAccountsByYearSummary => {
            let rows: Vec<Value> = response
                .hits
                .iter()
                .map(|hit| Value::Object(hit.metadata.clone()))
                .collect();
            let content = match response.answer() {
                None => Value::String(ACCOUNTS_EMPTY_MESSAGE.to_string()),
                Some(_) if rows.len() == 1 => rows[0].clone(),
                Some(_) if !rows.is_empty() => Value::Array(rows),
                Some(answer) => Value::String(answer.to_string()),
            };
            DisplayPayload {
                title: format!("Account Lookup: {}", request.subject),
                content,
                source: None,
                metadata: json!({
                    "tool": request.tool.as_str(),
                    "result_count": response.hits.len(),
                    "summary": response.answer(),
                }),
            }
        }
        ToolName::QueryKnowledgeBase => {
            let content = match response.answer() {
                Some(answer) => Value::String(answer.to_string()),
                None if response.hits.is_empty() => Value::String(EMPTY_MESSAGE.to_string()),
                None => Value::Array(
                    response
                        .hits
                        .iter()
                        .map(|hit| {
                            json!({
                                "content": hit.content,
                                "source": hit.source,
                                "score": hit.score,
                            })
                        })
                        .collect(),
                ),
            };
            DisplayPayload {
                title: format!("Knowledge Base Results for: {}", request.subject),
                content,
                source: first_source,
                metadata: json!({ "result_count": response.hits.len() }),
            }
        }
    }
}

/// Compact text handed back to the runtime to speak.
pub fn summarize(outcome: ToolOutcome, request: &ToolRequest, response: &LookupResponse) -> String {
    match outcome {
        ToolOutcome::Success => {
            let answer = response.answer().unwrap_or_default();
            let mut summary = truncate_snippet(answer, SUMMARY_CHARS);
            let sources = distinct_sources(&response.hits);
            if !sources.is_empty() {
                summary.push_str(&format!(" (Sources: {})", sources.join(", ")));
            }
            summary
        }
        ToolOutcome::Partial => {
            let count = response.hits.len();
            let noun = if count == 1 { "document" } else { "documents" };
            let mut summary = format!(
                "Found {count} matching {noun} for \"{}\".",
                request.subject
            );
            for (index, hit) in response.hits.iter().take(SUMMARY_HITS).enumerate() {
                let label = hit
                    .title
                    .as_deref()
                    .or(hit.source.as_deref())
                    .unwrap_or("Result");
                summary.push_str(&format!(
                    " {}. {}: {}",
                    index + 1,
                    label,
                    truncate_snippet(&hit.content, SNIPPET_CHARS)
                ));
            }
            summary
        }
        ToolOutcome::Empty if request.tool.is_account_tool() => {
            ACCOUNTS_EMPTY_MESSAGE.to_string()
        }
        ToolOutcome::Empty => EMPTY_MESSAGE.to_string(),
        ToolOutcome::Timeout => TIMEOUT_MESSAGE.to_string(),
        ToolOutcome::Error => error_summary("the lookup returned no usable result"),
    }
}

/// Summary for a failed call.
pub fn error_summary(reason: &str) -> String {
    format!("I wasn't able to complete that lookup ({reason}). Please try again.")
}

fn distinct_sources(hits: &[LookupHit]) -> Vec<&str> {
    let mut sources: Vec<&str> = Vec::new();
    for source in hits.iter().filter_map(|h| h.source.as_deref()) {
        if !sources.contains(&source) {
            sources.push(source);
        }
        if sources.len() == SUMMARY_HITS {
            break;
        }
    }
    sources
}

/// Trim and cut `text` to `max_chars` characters, marking the cut with "...".
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}
