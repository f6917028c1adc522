//! Request-shape detection and canonical payload construction.
//!
//! Callers use one of several historical conventions:
//!
//! - **OpenAI shape**: `messages` is an array. `model` is required and every
//!   other field except `session_id` is forwarded verbatim.
//! - **Prompt/AI shape**: anything else on `/chat`. `prompt`, `ai` and an
//!   optional `system` string are folded into a system + user message pair.
//! - **Simple shape**: `/v1/chat/completions`. Only `model`, `messages` and
//!   `stream` are read; extra fields are dropped.
//!
//! Detection is purely structural and the OpenAI shape is always checked
//! first, so a body carrying both `messages` and `prompt` is an OpenAI body.

use serde_json::{Map, Value};

use super::types::{CanonicalPayload, ChatMessage, Message, DEFAULT_MODEL};

/// Key stripped from OpenAI-shape bodies before forwarding.
pub const SESSION_ID_KEY: &str = "session_id";

/// Caller payload problems, reported as HTTP 400 before any upstream call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required fields: model or messages")]
    MissingModelOrMessages,

    #[error("Missing both prompt and ai content")]
    MissingPromptAndAi,

    #[error("Missing or invalid messages array")]
    InvalidMessages,

    #[error("Invalid JSON body")]
    InvalidJson,
}

/// Which caller convention a `/chat` body follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    OpenAi,
    PromptAi,
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shape::OpenAi => write!(f, "openai"),
            Shape::PromptAi => write!(f, "prompt_ai"),
        }
    }
}

/// Decode a raw request body into a JSON object.
///
/// An empty body or a JSON value that is not an object is treated as `{}`.
pub fn parse_body(bytes: &[u8]) -> Result<Map<String, Value>, ValidationError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Ok(Map::new()),
        Err(_) => Err(ValidationError::InvalidJson),
    }
}

/// Detect the convention used by a `/chat` body.
pub fn detect_shape(body: &Map<String, Value>) -> Shape {
    match body.get("messages") {
        Some(Value::Array(_)) => Shape::OpenAi,
        _ => Shape::PromptAi,
    }
}

/// Normalize a `/chat` body, auto-detecting its shape.
pub fn normalize_chat(body: Map<String, Value>) -> Result<CanonicalPayload, ValidationError> {
    let shape = detect_shape(&body);
    tracing::debug!(shape = %shape, "Detected request shape");
    match shape {
        Shape::OpenAi => normalize_openai(body),
        Shape::PromptAi => normalize_prompt_ai(body),
    }
}

/// Normalize a `/v1/chat/completions` body.
pub fn normalize_simple(mut body: Map<String, Value>) -> Result<CanonicalPayload, ValidationError> {
    let messages = match body.remove("messages") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => return Err(ValidationError::InvalidMessages),
    };
    let model = take_model(&mut body).unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let stream = is_stream(&body);

    Ok(CanonicalPayload::new(
        model,
        messages.into_iter().map(to_chat_message).collect(),
        stream,
    ))
}

fn normalize_openai(mut body: Map<String, Value>) -> Result<CanonicalPayload, ValidationError> {
    let stream = is_stream(&body);
    let model = take_model(&mut body);
    let messages = match body.remove("messages") {
        Some(Value::Array(items)) if !items.is_empty() => Some(items),
        _ => None,
    };
    let (Some(model), Some(messages)) = (model, messages) else {
        return Err(ValidationError::MissingModelOrMessages);
    };

    body.remove("stream");
    body.remove(SESSION_ID_KEY);

    Ok(CanonicalPayload {
        model,
        messages: messages.into_iter().map(to_chat_message).collect(),
        stream,
        extra: body,
    })
}

fn normalize_prompt_ai(mut body: Map<String, Value>) -> Result<CanonicalPayload, ValidationError> {
    let stream = is_stream(&body);
    let model = take_model(&mut body).unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let prompt = take_trimmed(&mut body, "prompt");
    let ai = take_trimmed(&mut body, "ai");
    let system = take_trimmed(&mut body, "system");
    // A non-array `messages` only selected this shape; it must not reach extras.
    body.remove("messages");
    body.remove("stream");

    let user_content = match (prompt.is_empty(), ai.is_empty()) {
        (true, true) => return Err(ValidationError::MissingPromptAndAi),
        (false, false) => format!("{}\n\n{}", prompt, ai),
        (false, true) => prompt,
        (true, false) => ai,
    };

    let mut messages: Vec<ChatMessage> = Vec::with_capacity(2);
    if !system.is_empty() {
        messages.push(Message::system(system).into());
    }
    messages.push(Message::user(user_content).into());

    Ok(CanonicalPayload {
        model,
        messages,
        stream,
        extra: body,
    })
}

/// `stream` is on only when the caller sent the boolean `true`.
fn is_stream(body: &Map<String, Value>) -> bool {
    matches!(body.get("stream"), Some(Value::Bool(true)))
}

/// Remove `model`, returning it only when it is a non-empty string.
fn take_model(body: &mut Map<String, Value>) -> Option<String> {
    match body.remove("model") {
        Some(Value::String(model)) if !model.trim().is_empty() => Some(model),
        _ => None,
    }
}

/// Remove a text field and return it trimmed; non-strings read as empty.
fn take_trimmed(body: &mut Map<String, Value>, key: &str) -> String {
    match body.remove(key) {
        Some(Value::String(text)) => text.trim().to_string(),
        _ => String::new(),
    }
}

fn to_chat_message(value: Value) -> ChatMessage {
    match serde_json::from_value::<Message>(value.clone()) {
        Ok(message) => ChatMessage::Text(message),
        Err(_) => ChatMessage::Raw(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(content: &str) -> ChatMessage {
        Message::user(content).into()
    }

    fn system(content: &str) -> ChatMessage {
        Message::system(content).into()
    }

    fn assistant(content: &str) -> ChatMessage {
        Message::assistant(content).into()
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    // ------------------------------------------------------------------
    // Body decoding
    // ------------------------------------------------------------------

    #[test]
    fn test_empty_body_is_empty_object() {
        assert!(parse_body(b"").unwrap().is_empty());
        assert!(parse_body(b"  \n").unwrap().is_empty());
    }

    #[test]
    fn test_non_object_body_is_empty_object() {
        assert!(parse_body(b"[1, 2]").unwrap().is_empty());
        assert!(parse_body(b"\"text\"").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert_eq!(parse_body(b"{not json"), Err(ValidationError::InvalidJson));
    }

    // ------------------------------------------------------------------
    // Shape detection
    // ------------------------------------------------------------------

    #[test]
    fn test_messages_array_wins_over_prompt() {
        let body = object(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "prompt": "ignored as a shape signal"
        }));
        assert_eq!(detect_shape(&body), Shape::OpenAi);
    }

    #[test]
    fn test_non_array_messages_falls_back_to_prompt_ai() {
        let body = object(json!({"messages": "hi", "prompt": "p"}));
        assert_eq!(detect_shape(&body), Shape::PromptAi);
        assert_eq!(detect_shape(&Map::new()), Shape::PromptAi);
    }

    // ------------------------------------------------------------------
    // OpenAI shape
    // ------------------------------------------------------------------

    #[test]
    fn test_openai_shape_passes_extras_and_strips_session_id() {
        let body = object(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.3,
            "max_tokens": 64,
            "session_id": "Session 1",
            "stream": false
        }));
        let payload = normalize_chat(body).unwrap();

        assert_eq!(payload.model, "gpt-4o");
        assert_eq!(payload.messages, vec![user("hi")]);
        assert!(!payload.stream);
        assert_eq!(payload.extra.get("temperature"), Some(&json!(0.3)));
        assert_eq!(payload.extra.get("max_tokens"), Some(&json!(64)));
        assert!(!payload.extra.contains_key(SESSION_ID_KEY));
        assert!(!payload.extra.contains_key("stream"));
    }

    #[test]
    fn test_openai_shape_requires_model() {
        let body = object(json!({"messages": [{"role": "user", "content": "hi"}]}));
        assert_eq!(
            normalize_chat(body),
            Err(ValidationError::MissingModelOrMessages)
        );
    }

    #[test]
    fn test_openai_shape_rejects_empty_messages() {
        let body = object(json!({"model": "gpt-4o", "messages": []}));
        assert_eq!(
            normalize_chat(body),
            Err(ValidationError::MissingModelOrMessages)
        );
    }

    #[test]
    fn test_openai_stream_must_be_strict_true() {
        let body = object(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": "true"
        }));
        let payload = normalize_chat(body).unwrap();
        assert!(!payload.stream);

        let body = object(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true
        }));
        assert!(normalize_chat(body).unwrap().stream);
    }

    #[test]
    fn test_openai_messages_forwarded_unchanged() {
        let messages = json!([
            {"role": "system", "content": ""},
            {"role": "user", "content": [{"type": "text", "text": "look"}]},
            {"role": "assistant", "content": "ok"}
        ]);
        let body = object(json!({"model": "gpt-4o", "messages": messages.clone()}));
        let payload = normalize_chat(body).unwrap();

        assert_eq!(payload.messages[0], system(""));
        assert_eq!(payload.messages[2], assistant("ok"));
        let forwarded = serde_json::to_value(&payload).unwrap();
        assert_eq!(forwarded["messages"], messages);
    }

    // ------------------------------------------------------------------
    // Prompt/AI shape
    // ------------------------------------------------------------------

    #[test]
    fn test_prompt_with_empty_ai_has_no_join_artifact() {
        let body = object(json!({"prompt": "Summarize X", "ai": "", "system": "Be terse"}));
        let payload = normalize_chat(body).unwrap();

        assert_eq!(
            payload.messages,
            vec![
                system("Be terse"),
                user("Summarize X")
            ]
        );
        assert_eq!(payload.model, DEFAULT_MODEL);
        assert!(!payload.stream);
    }

    #[test]
    fn test_prompt_and_ai_joined_and_trimmed() {
        let body = object(json!({
            "prompt": "  Summarize this in 3 bullet points:  ",
            "ai": "\nToday I fixed a bug.\n",
            "model": "gpt-4o-mini"
        }));
        let payload = normalize_chat(body).unwrap();

        assert_eq!(payload.model, "gpt-4o-mini");
        assert_eq!(
            payload.messages,
            vec![user("Summarize this in 3 bullet points:\n\nToday I fixed a bug.")]
        );
    }

    #[test]
    fn test_ai_only() {
        let body = object(json!({"ai": "  just the content "}));
        let payload = normalize_chat(body).unwrap();
        assert_eq!(payload.messages, vec![user("just the content")]);
    }

    #[test]
    fn test_missing_prompt_and_ai_rejected() {
        for body in [
            json!({}),
            json!({"system": "Be terse"}),
            json!({"prompt": "   ", "ai": "\t"}),
            json!({"prompt": 42}),
        ] {
            assert_eq!(
                normalize_chat(object(body)),
                Err(ValidationError::MissingPromptAndAi)
            );
        }
    }

    #[test]
    fn test_blank_system_skipped() {
        let body = object(json!({"prompt": "hi", "system": "   "}));
        let payload = normalize_chat(body).unwrap();
        assert_eq!(payload.messages, vec![user("hi")]);
    }

    #[test]
    fn test_prompt_ai_extras_forwarded() {
        let body = object(json!({
            "prompt": "hi",
            "stream": true,
            "temperature": 0.9,
            "session_id": "kept"
        }));
        let payload = normalize_chat(body).unwrap();

        assert!(payload.stream);
        assert_eq!(payload.extra.get("temperature"), Some(&json!(0.9)));
        assert_eq!(payload.extra.get(SESSION_ID_KEY), Some(&json!("kept")));
        for consumed in ["prompt", "ai", "system", "model", "stream"] {
            assert!(!payload.extra.contains_key(consumed), "{consumed} leaked");
        }
    }

    #[test]
    fn test_prompt_ai_drops_non_array_messages() {
        let body = object(json!({"prompt": "Summarize X", "messages": "stale"}));
        let payload = normalize_chat(body).unwrap();

        assert_eq!(payload.messages, vec![user("Summarize X")]);
        assert!(!payload.extra.contains_key("messages"));

        let wire = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            wire,
            json!({
                "model": "gpt-3.5-turbo",
                "messages": [{"role": "user", "content": "Summarize X"}],
                "stream": false
            })
        );
    }

    // ------------------------------------------------------------------
    // Simple shape
    // ------------------------------------------------------------------

    #[test]
    fn test_simple_shape_drops_extras() {
        let body = object(json!({
            "model": "gpt-3.5-turbo",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": false,
            "temperature": 1.5
        }));
        let payload = normalize_simple(body).unwrap();
        assert_eq!(payload.model, "gpt-3.5-turbo");
        assert!(payload.extra.is_empty());
        assert!(!payload.stream);
    }

    #[test]
    fn test_simple_shape_defaults_model() {
        let body = object(json!({"messages": [{"role": "user", "content": "hi"}]}));
        assert_eq!(normalize_simple(body).unwrap().model, DEFAULT_MODEL);
    }

    #[test]
    fn test_simple_shape_rejects_bad_messages() {
        for body in [
            json!({"model": "gpt-4o"}),
            json!({"model": "gpt-4o", "messages": []}),
            json!({"model": "gpt-4o", "messages": "hi"}),
            json!({"model": "gpt-4o", "messages": {"role": "user"}}),
        ] {
            assert_eq!(
                normalize_simple(object(body)),
                Err(ValidationError::InvalidMessages)
            );
        }
    }
}
