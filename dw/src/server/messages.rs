//! Command envelopes
//!
//! JSON-over-newline protocol. Each request and each response is a single
//! line of JSON followed by `\n`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::prompts::DEFAULT_TARGET_LENGTH;
use crate::session::Outline;

/// Command type names recognized on the wire
pub const COMMAND_TYPES: &[&str] = &[
    "INITIALIZE_SESSION",
    "GENERATE_OUTLINE",
    "PROCESS_INPUT",
    "AUTOPILOT_STEP",
    "GET_SESSION",
    "GET_OUTLINE",
    "UPDATE_OUTLINE",
    "GET_DRAFT",
    "UPDATE_DRAFT",
    "GET_MESSAGES",
    "END_SESSION",
    "PING",
];

/// Raw request envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl Request {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            session_id: None,
            kind: kind.into(),
            data: Value::Null,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Decode the typed command this envelope carries
    pub fn command(&self) -> Result<Command, String> {
        if !COMMAND_TYPES.contains(&self.kind.as_str()) {
            return Err(format!("Unknown command type: {}", self.kind));
        }

        let mut tagged = Map::new();
        tagged.insert("type".to_string(), Value::String(self.kind.clone()));
        let has_data = match &self.data {
            Value::Null => false,
            Value::Object(map) => !map.is_empty(),
            _ => true,
        };
        if has_data {
            tagged.insert("data".to_string(), self.data.clone());
        }

        serde_json::from_value(Value::Object(tagged)).map_err(|e| format!("Invalid data for {}: {}", self.kind, e))
    }
}

/// Session parameters for INITIALIZE_SESSION and GENERATE_OUTLINE
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionParams {
    pub topic: String,

    #[serde(alias = "contentType", default = "default_article_type")]
    pub article_type: String,

    #[serde(alias = "targetLength", default = "default_word_count")]
    pub word_count: u32,

    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl SessionParams {
    /// Reject parameters no session could be built from
    pub fn validate(&self) -> Result<(), String> {
        if self.topic.trim().is_empty() {
            return Err("topic must not be empty".to_string());
        }
        if self.word_count == 0 {
            return Err("wordCount must be a positive integer".to_string());
        }
        Ok(())
    }
}

fn default_article_type() -> String {
    "Article".to_string()
}

fn default_word_count() -> u32 {
    DEFAULT_TARGET_LENGTH
}

/// Typed command
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    InitializeSession(SessionParams),
    GenerateOutline(SessionParams),
    ProcessInput { input: String },
    AutopilotStep,
    GetSession,
    GetOutline,
    UpdateOutline { outline: Outline },
    GetDraft,
    UpdateDraft { draft: String },
    GetMessages,
    EndSession,
    Ping,
}

impl Command {
    /// Whether the command addresses one session
    pub fn is_session_command(&self) -> bool {
        !matches!(self, Command::GenerateOutline(_) | Command::Ping)
    }
}

/// Response envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    Success { data: Value },
    Error { message: String },
}

impl Response {
    pub fn success(data: Value) -> Self {
        Response::Success { data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }

    /// Payload of a success, None for an error
    pub fn data(&self) -> Option<&Value> {
        match self {
            Response::Success { data } => Some(data),
            Response::Error { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(line: &str) -> Request {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn test_request_deserialize() {
        let req = request(r#"{"sessionId":"s1","type":"PROCESS_INPUT","data":{"input":"hello"}}"#);
        assert_eq!(req.session_id.as_deref(), Some("s1"));
        assert_eq!(
            req.command().unwrap(),
            Command::ProcessInput {
                input: "hello".to_string()
            }
        );
    }

    #[test]
    fn test_unit_commands_accept_missing_or_empty_data() {
        assert_eq!(request(r#"{"type":"PING"}"#).command().unwrap(), Command::Ping);
        assert_eq!(request(r#"{"type":"GET_DRAFT","data":{}}"#).command().unwrap(), Command::GetDraft);
    }

    #[test]
    fn test_session_params_defaults_and_aliases() {
        let req = request(r#"{"type":"GENERATE_OUTLINE","data":{"topic":"Tea"}}"#);
        let Command::GenerateOutline(params) = req.command().unwrap() else {
            panic!("expected GenerateOutline");
        };
        assert_eq!(params.article_type, "Article");
        assert_eq!(params.word_count, 1000);

        let req = request(
            r#"{"type":"INITIALIZE_SESSION","data":{"topic":"Tea","contentType":"memo","targetLength":300,"settings":{"tone":"dry"}}}"#,
        );
        let Command::InitializeSession(params) = req.command().unwrap() else {
            panic!("expected InitializeSession");
        };
        assert_eq!(params.article_type, "memo");
        assert_eq!(params.word_count, 300);
        assert_eq!(params.settings["tone"], "dry");
    }

    #[test]
    fn test_session_params_validate() {
        let params = |topic: &str, word_count: u32| SessionParams {
            topic: topic.to_string(),
            article_type: "Article".to_string(),
            word_count,
            settings: Map::new(),
        };
        assert!(params("Tea", 1).validate().is_ok());
        assert_eq!(params("Tea", 0).validate().unwrap_err(), "wordCount must be a positive integer");
        assert_eq!(params(" ", 500).validate().unwrap_err(), "topic must not be empty");
    }

    #[test]
    fn test_unknown_type_is_error() {
        let err = request(r#"{"type":"DANCE"}"#).command().unwrap_err();
        assert_eq!(err, "Unknown command type: DANCE");
    }

    #[test]
    fn test_invalid_payload_is_error() {
        let err = request(r#"{"type":"PROCESS_INPUT","data":{"text":"x"}}"#).command().unwrap_err();
        assert!(err.starts_with("Invalid data for PROCESS_INPUT"));

        let err = request(r#"{"type":"UPDATE_OUTLINE","data":{"outline":{}}}"#).command().unwrap_err();
        assert!(err.contains("outline has no sections"));
    }

    #[test]
    fn test_response_serialize() {
        let ok = serde_json::to_string(&Response::success(json!({"pong": true}))).unwrap();
        assert_eq!(ok, r#"{"status":"success","data":{"pong":true}}"#);

        let err = serde_json::to_string(&Response::error("session busy")).unwrap();
        assert_eq!(err, r#"{"status":"error","message":"session busy"}"#);
    }

    #[test]
    fn test_request_builder_serialize() {
        let req = Request::new("GET_OUTLINE").with_session("abc");
        assert_eq!(serde_json::to_string(&req).unwrap(), r#"{"sessionId":"abc","type":"GET_OUTLINE"}"#);
    }
}
