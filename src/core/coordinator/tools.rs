//! Named tools published to the conversational runtime.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::core::backends::{AccountQuery, BackendKind};

/// Default result counts per tool.
pub const DEFAULT_QUERY_MAX_RESULTS: usize = 5;
pub const DEFAULT_SEARCH_MAX_RESULTS: usize = 10;

/// Upper bound on results requested from a backend.
pub const MAX_RESULTS_LIMIT: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    QueryKnowledgeBase,
    SearchDocuments,
    GetDocumentById,
    GetAccountDetails,
    GetAccountsByClassification,
    GetClassificationSummary,
    GetManagementTypeSummary,
    GetTotalCost,
    GetAccountStatusSummary,
    GetAccountsByYear,
    GetAccountsByYearSummary,
}

impl ToolName {
    pub const ALL: [ToolName; 11] = [
        ToolName::QueryKnowledgeBase,
        ToolName::SearchDocuments,
        ToolName::GetDocumentById,
        ToolName::GetAccountDetails,
        ToolName::GetAccountsByClassification,
        ToolName::GetClassificationSummary,
        ToolName::GetManagementTypeSummary,
        ToolName::GetTotalCost,
        ToolName::GetAccountStatusSummary,
        ToolName::GetAccountsByYear,
        ToolName::GetAccountsByYearSummary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::QueryKnowledgeBase => "query_knowledge_base",
            ToolName::SearchDocuments => "search_documents",
            ToolName::GetDocumentById => "get_document_by_id",
            ToolName::GetAccountDetails => "get_account_details",
            ToolName::GetAccountsByClassification => "get_accounts_by_classification",
            ToolName::GetClassificationSummary => "get_classification_summary",
            ToolName::GetManagementTypeSummary => "get_management_type_summary",
            ToolName::GetTotalCost => "get_total_cost",
            ToolName::GetAccountStatusSummary => "get_account_status_summary",
            ToolName::GetAccountsByYear => "get_accounts_by_year",
            ToolName::GetAccountsByYearSummary => "get_accounts_by_year_summary",
        }
    }

    /// Backend a tool is bound to. `None` means the query is classified.
    pub fn fixed_backend(&self) -> Option<BackendKind> {
        match self {
            ToolName::QueryKnowledgeBase
            | ToolName::SearchDocuments
            | ToolName::GetDocumentById => None,
            _ => Some(BackendKind::Accounts),
        }
    }

    pub fn is_account_tool(&self) -> bool {
        self.fixed_backend() == Some(BackendKind::Accounts)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| ToolArgumentError::UnknownTool(s.to_string()))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolArgumentError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{tool} requires a non-empty '{argument}' argument")]
    MissingArgument {
        tool: ToolName,
        argument: &'static str,
    },

    #[error("Tool arguments are not a JSON object: {0}")]
    InvalidArguments(String),
}

/// A parsed tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequest {
    pub tool: ToolName,
    /// What the user asked for: query text, keywords, or document id.
    pub subject: String,
    /// Query text sent to the backend.
    pub backend_query: String,
    pub max_results: usize,
    pub document_type: Option<String>,
    pub document_id: Option<String>,
    /// Set for the account tools.
    pub account: Option<AccountQuery>,
}

impl ToolRequest {
    /// Parse a tool name and its raw JSON argument string.
    pub fn parse(name: &str, arguments: &str) -> Result<Self, ToolArgumentError> {
        let tool: ToolName = name.parse()?;

        let arguments = arguments.trim();
        let args: Value = if arguments.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(arguments)
                .map_err(|e| ToolArgumentError::InvalidArguments(e.to_string()))?
        };
        if !args.is_object() {
            return Err(ToolArgumentError::InvalidArguments(format!(
                "expected object, got {args}"
            )));
        }

        match tool {
            ToolName::QueryKnowledgeBase => {
                let query = required_str(&args, tool, "query")?;
                Ok(Self {
                    tool,
                    backend_query: query.clone(),
                    subject: query,
                    max_results: max_results(&args, DEFAULT_QUERY_MAX_RESULTS),
                    document_type: None,
                    document_id: None,
                    account: None,
                })
            }
            ToolName::SearchDocuments => {
                let keywords = optional_str(&args, "keywords")
                    .or_else(|| optional_str(&args, "query"))
                    .ok_or(ToolArgumentError::MissingArgument {
                        tool,
                        argument: "keywords",
                    })?;
                let document_type = optional_str(&args, "document_type");
                let backend_query = match &document_type {
                    Some(doc_type) => format!("{keywords} type:{doc_type}"),
                    None => keywords.clone(),
                };
                Ok(Self {
                    tool,
                    subject: keywords,
                    backend_query,
                    max_results: max_results(&args, DEFAULT_SEARCH_MAX_RESULTS),
                    document_type,
                    document_id: None,
                    account: None,
                })
            }
            ToolName::GetDocumentById => {
                let document_id = required_str(&args, tool, "document_id")?;
                Ok(Self {
                    tool,
                    backend_query: format!("document_id:{document_id}"),
                    subject: document_id.clone(),
                    max_results: 1,
                    document_type: None,
                    document_id: Some(document_id),
                    account: None,
                })
            }
            ToolName::GetAccountDetails => {
                let account_number = optional_scalar(&args, "account_number");
                let account_name = optional_str(&args, "account_name");
                if account_number.is_none() && account_name.is_none() {
                    return Err(ToolArgumentError::MissingArgument {
                        tool,
                        argument: "account_number or account_name",
                    });
                }
                Ok(Self::account(
                    tool,
                    AccountQuery::Details {
                        account_number,
                        account_name,
                    },
                ))
            }
            ToolName::GetAccountsByClassification => {
                let classification = required_str(&args, tool, "classification")?;
                Ok(Self::account(
                    tool,
                    AccountQuery::ByClassification { classification },
                ))
            }
            ToolName::GetAccountsByYear => {
                let year = optional_scalar(&args, "year")
                    .and_then(|y| y.parse::<i32>().ok())
                    .ok_or(ToolArgumentError::MissingArgument {
                        tool,
                        argument: "year",
                    })?;
                Ok(Self::account(tool, AccountQuery::ByYear { year }))
            }
            ToolName::GetClassificationSummary => {
                Ok(Self::account(tool, AccountQuery::ClassificationSummary))
            }
            ToolName::GetManagementTypeSummary => {
                Ok(Self::account(tool, AccountQuery::ManagementTypeSummary))
            }
            ToolName::GetTotalCost => Ok(Self::account(tool, AccountQuery::TotalCost)),
            ToolName::GetAccountStatusSummary => {
                Ok(Self::account(tool, AccountQuery::StatusSummary))
            }
            ToolName::GetAccountsByYearSummary => {
                Ok(Self::account(tool, AccountQuery::YearSummary))
            }
        }
    }

    fn account(tool: ToolName, query: AccountQuery) -> Self {
        let subject = query.describe();
        Self {
            tool,
            backend_query: subject.clone(),
            subject,
            max_results: MAX_RESULTS_LIMIT,
            document_type: None,
            document_id: None,
            account: Some(query),
        }
    }
}

fn optional_str(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A string, or a number rendered as one.
fn optional_scalar(args: &Value, key: &str) -> Option<String> {
    match args.get(key) {
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => optional_str(args, key),
    }
}

fn required_str(
    args: &Value,
    tool: ToolName,
    argument: &'static str,
) -> Result<String, ToolArgumentError> {
    optional_str(args, argument).ok_or(ToolArgumentError::MissingArgument { tool, argument })
}

/// Accepts an integer or a numeric string; anything else falls back to the default.
fn max_results(args: &Value, default: usize) -> usize {
    let requested = match args.get("max_results") {
        Some(Value::Number(n)) => n.as_u64().map(|n| n as usize),
        Some(Value::String(s)) => s.trim().parse::<usize>().ok(),
        _ => None,
    };
    requested
        .filter(|&n| n > 0)
        .unwrap_or(default)
        .min(MAX_RESULTS_LIMIT)
}

/// Function schema advertised to the runtime.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// Schemas for every tool the coordinator serves.
pub fn tool_schemas() -> Vec<ToolSchema> {
    vec![
        ToolSchema {
            name: ToolName::QueryKnowledgeBase.as_str(),
            description: "Search the knowledge base for information answering the user's question.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The question or search text"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of results to return",
                        "default": DEFAULT_QUERY_MAX_RESULTS
                    }
                },
                "required": ["query"]
            }),
        },
        ToolSchema {
            name: ToolName::SearchDocuments.as_str(),
            description: "Search documents by keywords, optionally filtered by document type (SOP, LLD, HLD).",
            parameters: json!({
                "type": "object",
                "properties": {
                    "keywords": {
                        "type": "string",
                        "description": "Keywords to search for"
                    },
                    "document_type": {
                        "type": "string",
                        "description": "Document type filter",
                        "enum": ["SOP", "LLD", "HLD"]
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of results to return",
                        "default": DEFAULT_SEARCH_MAX_RESULTS
                    }
                },
                "required": ["keywords"]
            }),
        },
        ToolSchema {
            name: ToolName::GetDocumentById.as_str(),
            description: "Retrieve a specific document by its identifier.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "document_id": {
                        "type": "string",
                        "description": "The document identifier"
                    }
                },
                "required": ["document_id"]
            }),
        },
        ToolSchema {
            name: ToolName::GetAccountDetails.as_str(),
            description: "Get detailed information about an AWS account by account number or name. You must provide either account_number or account_name.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "account_number": {
                        "type": "string",
                        "description": "The AWS account number to look up (e.g., '100942612345')."
                    },
                    "account_name": {
                        "type": "string",
                        "description": "The AWS account name to look up (e.g., 'AWS Project 10')."
                    }
                }
            }),
        },
        ToolSchema {
            name: ToolName::GetAccountsByClassification.as_str(),
            description: "Get all AWS accounts with a specific classification.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "classification": {
                        "type": "string",
                        "description": "The classification to filter accounts by (e.g., Class-1, Class-2, Class-3)."
                    }
                },
                "required": ["classification"]
            }),
        },
        no_argument_schema(
            ToolName::GetClassificationSummary,
            "Get a summary of AWS accounts by classification, including count and total cost.",
        ),
        no_argument_schema(
            ToolName::GetManagementTypeSummary,
            "Get a summary of AWS accounts by management type, including count and total cost.",
        ),
        no_argument_schema(
            ToolName::GetTotalCost,
            "Get the total cost of all AWS accounts in Indian Rupees.",
        ),
        no_argument_schema(
            ToolName::GetAccountStatusSummary,
            "Get a summary of AWS accounts by status (ACTIVE, CLOSED, SUSPENDED, etc.).",
        ),
        ToolSchema {
            name: ToolName::GetAccountsByYear.as_str(),
            description: "Get all AWS accounts provisioned in a specific year.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "year": {
                        "type": "integer",
                        "description": "The year to filter accounts by (e.g., 2019, 2020, 2021)."
                    }
                },
                "required": ["year"]
            }),
        },
        no_argument_schema(
            ToolName::GetAccountsByYearSummary,
            "Get a summary of AWS accounts provisioned by year, showing count for each year.",
        ),
    ]
}

fn no_argument_schema(tool: ToolName, description: &'static str) -> ToolSchema {
    ToolSchema {
        name: tool.as_str(),
        description,
        parameters: json!({ "type": "object", "properties": {} }),
    }
}
