//! Parses the three JSON response shapes an LLM's system prompt is
//! contracted to emit (§6.4): tool-use, done, and (inside Planning mode)
//! a phase-tagged planning payload. A response that matches none of these
//! counts against the handler's consecutive-parse-failure budget.

use serde_json::Value;

#[derive(Debug, Clone)]
pub enum HandlerResponse {
    ToolCall { name: String, arguments: Value },
    Done { comment: String },
}

#[derive(Debug, Clone)]
pub struct ResponseParseError(pub String);

impl std::fmt::Display for ResponseParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed LLM response: {}", self.0)
    }
}

impl std::error::Error for ResponseParseError {}

/// Parse a non-Planning-mode response: either a tool call or a done
/// signal. Anything else (prose, a planning payload seen outside Planning
/// mode, truncated JSON) is a parse failure.
pub fn parse_handler_response(text: &str) -> Result<HandlerResponse, ResponseParseError> {
    let value: Value = serde_json::from_str(text.trim()).map_err(|e| ResponseParseError(e.to_string()))?;

    if value.get("done").and_then(Value::as_bool) == Some(true) {
        let comment = value
            .get("comment")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Ok(HandlerResponse::Done { comment });
    }

    if let Some(function_call) = value.get("function_call") {
        let name = function_call
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ResponseParseError("function_call missing 'name'".into()))?
            .to_string();
        let arguments = function_call
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));
        if !arguments.is_object() {
            return Err(ResponseParseError(
                "function_call.arguments must be a JSON object, not a string or other value".into(),
            ));
        }
        return Ok(HandlerResponse::ToolCall { name, arguments });
    }

    Err(ResponseParseError("response matched neither tool-use nor done shape".into()))
}
