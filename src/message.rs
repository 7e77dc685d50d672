//! Wire records: one JSON object per line of a `/chat/` response body.
//!
//! A response is only ever *partially* received while it streams, so the
//! trailing line is usually an incomplete object. [`is_candidate_record`]
//! filters those out before any JSON parsing is attempted; everything that
//! survives goes through [`parse_line`], which never fails outright but
//! classifies the line as [`ParsedLine::Valid`] or [`ParsedLine::Invalid`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who authored a message. Anything other than `user` renders as `model`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Model,
    Other(String),
}

impl Role {
    /// Styling class of the rendered node.
    pub fn css_class(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model | Role::Other(_) => "model",
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Model => "model",
            Role::Other(s) => s,
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "user" => Role::User,
            "model" => Role::Model,
            _ => Role::Other(s),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated chat message. `timestamp` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
    /// `content` arrived as a number, bool, array or object and holds its
    /// JSON text. Such bodies are shown as literal text, never as Markdown.
    #[serde(skip)]
    pub literal: bool,
}

/// Why a candidate line was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidLine {
    /// Looked like an object but did not parse as one.
    Json(String),
    MissingTimestamp,
    MissingRole,
    MissingContent,
    /// The field is present but holds a number, bool, array or object.
    NotAString(&'static str),
}

impl std::fmt::Display for InvalidLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidLine::Json(detail) => write!(f, "invalid JSON: {detail}"),
            InvalidLine::MissingTimestamp => write!(f, "missing or empty timestamp"),
            InvalidLine::MissingRole => write!(f, "missing or empty role"),
            InvalidLine::MissingContent => write!(f, "missing content"),
            InvalidLine::NotAString(field) => write!(f, "field '{field}' is not a string"),
        }
    }
}

/// Result of looking at one candidate line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Valid(ChatMessage),
    Invalid(InvalidLine),
}

/// A line is worth parsing only if, trimmed, it is bracketed by `{` and `}`.
pub fn is_candidate_record(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('{') && trimmed.ends_with('}')
}

/// Split an accumulated buffer on `\n` and keep the candidate records.
pub fn candidate_lines(buffer: &str) -> impl Iterator<Item = &str> {
    buffer.split('\n').filter(|line| is_candidate_record(line))
}

/// Classify one line. Returns `None` for lines that are not candidates at all
/// (blank lines, partial objects still being streamed).
pub fn parse_line(line: &str) -> Option<ParsedLine> {
    if !is_candidate_record(line) {
        return None;
    }
    let object = match serde_json::from_str::<Map<String, Value>>(line.trim()) {
        Ok(object) => object,
        Err(e) => return Some(ParsedLine::Invalid(InvalidLine::Json(e.to_string()))),
    };
    Some(match validate(&object) {
        Ok(message) => ParsedLine::Valid(message),
        Err(reason) => ParsedLine::Invalid(reason),
    })
}

/// Required text field: absent, null and `""` all count as missing.
fn required_text(
    object: &Map<String, Value>,
    field: &'static str,
    missing: InvalidLine,
) -> Result<String, InvalidLine> {
    match object.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | Some(Value::Null) | None => Err(missing),
        Some(_) => Err(InvalidLine::NotAString(field)),
    }
}

fn validate(object: &Map<String, Value>) -> Result<ChatMessage, InvalidLine> {
    let timestamp = required_text(object, "timestamp", InvalidLine::MissingTimestamp)?;
    let role = required_text(object, "role", InvalidLine::MissingRole)?;
    // content only has to be defined; "" and null are both an empty body
    let (content, literal) = match object.get("content") {
        None => return Err(InvalidLine::MissingContent),
        Some(Value::Null) => (String::new(), false),
        Some(Value::String(s)) => (s.clone(), false),
        Some(other) => (other.to_string(), true),
    };
    Ok(ChatMessage {
        role: Role::from(role),
        content,
        timestamp,
        literal,
    })
}
