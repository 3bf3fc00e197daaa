//! Tool descriptors, discovery and dispatch
//!
//! Every tool ends in `Executor::run`. The templated tools just build a
//! script first; they get no special treatment from the executor.

use serde::Serialize;
use serde_json::Value;
use sieve_sandbox::{ExecutionRequest, ExecutionResult, Executor, Language, UnsupportedLanguage};

use crate::templates;

/// Weight of a query word found in a tool's name
const NAME_WEIGHT: u32 = 3;
/// Weight of a query word matching one of a tool's keywords
const KEYWORD_WEIGHT: u32 = 2;
/// Weight of a query word appearing in the description
const DESCRIPTION_WEIGHT: u32 = 1;

/// An advertised operation
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    pub keywords: &'static [&'static str],
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Errors raised before a tool reaches the executor
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Missing required argument '{0}'")]
    MissingArgument(&'static str),
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },
    #[error(transparent)]
    UnsupportedLanguage(#[from] UnsupportedLanguage),
}

/// All built-in tools, in advertised order
pub fn builtin_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "execute_code",
            description: "Execute a Python script locally and return only its stdout, stderr and exit code. \
                Use it to process large files (logs, configs, data) on this machine and print a compact summary \
                instead of reading the raw data. Runs with a hard timeout (max 30s) and 1MB output cap per stream.",
            keywords: &[
                "execute", "run", "code", "script", "python", "process", "compute", "file", "data",
            ],
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "language": {
                        "type": "string",
                        "enum": ["python"],
                        "description": "Interpreter for the script (default: python)"
                    },
                    "code": { "type": "string", "description": "Complete script source" },
                    "timeout": {
                        "type": "integer",
                        "description": "Timeout in milliseconds (default and max 30000)"
                    }
                },
                "required": ["code"]
            }),
        },
        ToolDescriptor {
            name: "analyze_logs",
            description: "Summarize an nginx access log (combined format): request totals, status codes, \
                top endpoints and IPs, error rates, hourly traffic and recommendations.",
            keywords: &[
                "log", "logs", "nginx", "access", "http", "traffic", "errors", "status", "analyze",
            ],
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "log_path": { "type": "string", "description": "Path to the access log" }
                },
                "required": ["log_path"]
            }),
        },
        ToolDescriptor {
            name: "analyze_csv",
            description: "Summarize a CSV file with a header row: row count and per-column non-empty, \
                distinct and numeric min/max/mean.",
            keywords: &[
                "csv", "table", "spreadsheet", "columns", "data", "statistics", "analyze",
            ],
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "csv_path": { "type": "string", "description": "Path to the CSV file" }
                },
                "required": ["csv_path"]
            }),
        },
    ]
}

/// Rank tools against a free-text query.
///
/// Single-character words are ignored, and a query with no usable words
/// returns the catalog unchanged. Otherwise each word scores against names,
/// keywords and descriptions; tools scoring zero are dropped and the rest
/// are ordered by score, then name.
pub fn discover(query: &str, limit: usize) -> Vec<ToolDescriptor> {
    let words: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1)
        .map(|w| w.to_lowercase())
        .collect();

    let catalog = builtin_tools();
    if words.is_empty() {
        return catalog.into_iter().take(limit).collect();
    }

    let mut scored: Vec<(u32, ToolDescriptor)> = catalog
        .into_iter()
        .map(|tool| (score(&tool, &words), tool))
        .filter(|(score, _)| *score > 0)
        .collect();
    scored.sort_by(|(a, ta), (b, tb)| b.cmp(a).then_with(|| ta.name.cmp(tb.name)));
    scored.into_iter().take(limit).map(|(_, tool)| tool).collect()
}

fn score(tool: &ToolDescriptor, words: &[String]) -> u32 {
    let description = tool.description.to_lowercase();
    words
        .iter()
        .map(|word| {
            let mut s = 0;
            if tool.name.contains(word.as_str()) {
                s += NAME_WEIGHT;
            }
            if tool.keywords.iter().any(|k| *k == word.as_str()) {
                s += KEYWORD_WEIGHT;
            }
            if description.contains(word.as_str()) {
                s += DESCRIPTION_WEIGHT;
            }
            s
        })
        .sum()
}

/// Turn a tool call into an execution request
pub fn build_request(name: &str, args: &Value) -> Result<ExecutionRequest, ToolError> {
    match name {
        "execute_code" => {
            let code = required_str(args, "code")?;
            let language = match args.get("language") {
                None | Some(Value::Null) => Language::Python,
                Some(Value::String(s)) => s.parse()?,
                Some(other) => {
                    return Err(ToolError::InvalidArgument {
                        name: "language",
                        reason: format!("expected a string, got {}", other),
                    })
                }
            };
            let mut request = ExecutionRequest::new(language, code);
            request.timeout_ms = timeout_arg(args)?;
            Ok(request)
        }
        "analyze_logs" => {
            let path = required_str(args, "log_path")?;
            Ok(ExecutionRequest::python(templates::log_analysis(path)))
        }
        "analyze_csv" => {
            let path = required_str(args, "csv_path")?;
            Ok(ExecutionRequest::python(templates::csv_analysis(path)))
        }
        _ => Err(ToolError::UnknownTool(name.to_string())),
    }
}

/// Build and run a tool call
pub async fn call_tool(
    executor: &Executor,
    name: &str,
    args: &Value,
) -> Result<ExecutionResult, ToolError> {
    let request = build_request(name, args)?;
    tracing::debug!(tool = %name, "Dispatching tool call");
    Ok(executor.run(&request).await)
}

fn required_str<'a>(args: &'a Value, name: &'static str) -> Result<&'a str, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Err(ToolError::MissingArgument(name)),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(ToolError::InvalidArgument {
            name,
            reason: format!("expected a string, got {}", other),
        }),
    }
}

/// Timeout in ms. Fractions are truncated; range checks belong to the executor.
fn timeout_arg(args: &Value) -> Result<Option<i64>, ToolError> {
    match args.get("timeout") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))),
        Some(other) => Err(ToolError::InvalidArgument {
            name: "timeout",
            reason: format!("expected milliseconds, got {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(tools: &[ToolDescriptor]) -> Vec<&'static str> {
        tools.iter().map(|t| t.name).collect()
    }

    #[test]
    fn test_catalog_serializes_as_mcp_tools() {
        let tools = builtin_tools();
        let value = serde_json::to_value(&tools[0]).unwrap();
        assert_eq!(value["name"], "execute_code");
        assert_eq!(value["inputSchema"]["required"][0], "code");
        assert!(value.get("keywords").is_none());
    }

    #[test]
    fn test_empty_query_returns_catalog() {
        assert_eq!(
            names(&discover("", 10)),
            vec!["execute_code", "analyze_logs", "analyze_csv"]
        );
        assert_eq!(names(&discover("  ?! ", 1)), vec!["execute_code"]);
    }

    #[test]
    fn test_query_ranks_relevant_tool_first() {
        assert_eq!(discover("nginx access logs", 10)[0].name, "analyze_logs");
        assert_eq!(discover("CSV columns", 10)[0].name, "analyze_csv");
        assert_eq!(discover("run a python script", 10)[0].name, "execute_code");
    }

    #[test]
    fn test_unrelated_query_matches_nothing() {
        assert!(discover("weather forecast", 10).is_empty());
    }

    #[test]
    fn test_ties_break_by_name() {
        let ranked = discover("analyze", 10);
        assert_eq!(names(&ranked)[..2], ["analyze_csv", "analyze_logs"]);
    }

    #[test]
    fn test_limit_applies() {
        assert_eq!(discover("data", 1).len(), 1);
    }

    #[test]
    fn test_build_execute_code() {
        let request =
            build_request("execute_code", &json!({"code": "print(1)", "timeout": 500})).unwrap();
        assert_eq!(request.code, "print(1)");
        assert_eq!(request.language, Language::Python);
        assert_eq!(request.timeout_ms, Some(500));

        let request =
            build_request("execute_code", &json!({"code": "x", "timeout": 250.9})).unwrap();
        assert_eq!(request.timeout_ms, Some(250));
    }

    #[test]
    fn test_build_rejects_bad_arguments() {
        assert!(matches!(
            build_request("execute_code", &json!({})),
            Err(ToolError::MissingArgument("code"))
        ));
        assert!(matches!(
            build_request("execute_code", &json!({"code": 5})),
            Err(ToolError::InvalidArgument { name: "code", .. })
        ));
        assert!(matches!(
            build_request("execute_code", &json!({"code": "x", "timeout": "soon"})),
            Err(ToolError::InvalidArgument { name: "timeout", .. })
        ));
        assert!(matches!(
            build_request("execute_code", &json!({"code": "x", "language": "ruby"})),
            Err(ToolError::UnsupportedLanguage(_))
        ));
        assert!(matches!(
            build_request("delete_everything", &json!({})),
            Err(ToolError::UnknownTool(_))
        ));
    }

    #[test]
    fn test_build_templated_tools() {
        let request =
            build_request("analyze_logs", &json!({"log_path": "/var/log/nginx/access.log"}))
                .unwrap();
        assert!(request.code.contains("\"/var/log/nginx/access.log\""));
        assert!(request.timeout_ms.is_none());

        assert!(matches!(
            build_request("analyze_csv", &json!({"path": "x.csv"})),
            Err(ToolError::MissingArgument("csv_path"))
        ));
    }
}
