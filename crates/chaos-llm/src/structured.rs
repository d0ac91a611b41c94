//! Structured output - JSON answers validated against Rust types
//!
//! Models are asked to answer with a single JSON object. Replies are often
//! wrapped in a fenced code block or surrounded by prose, so the object is
//! located first and then deserialized into the target type. A reply that
//! does not validate is sent back to the model together with the parse
//! error, up to a retry budget.

use crate::completion::CompletionRequest;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::provider::LlmProvider;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Default number of re-asks after an invalid structured reply
pub const DEFAULT_MAX_RETRIES: u32 = 3;

static FENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)```")
        .expect("FENCE_REGEX is a compile-time constant")
});

/// Locate the JSON object in a model reply
///
/// Prefers the first fenced code block; otherwise the span from the first
/// `{` to its matching `}` (string literals are skipped while matching).
#[must_use]
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(caps) = FENCE_REGEX.captures(text) {
        if let Some(body) = caps.get(1) {
            let body = body.as_str().trim();
            if body.starts_with('{') || body.starts_with('[') {
                return Some(body);
            }
        }
    }

    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a model reply into `T`
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let json = extract_json(text).ok_or(Error::MissingJson)?;
    Ok(serde_json::from_str(json)?)
}

/// Complete a request and deserialize the reply into `T`
///
/// Invalid replies are re-asked up to `max_retries` times; transport errors
/// are returned immediately. Running out of retries yields
/// [`Error::RetriesExhausted`] wrapping the last parse failure.
pub async fn complete_json<T: DeserializeOwned>(
    provider: &dyn LlmProvider,
    mut request: CompletionRequest,
    max_retries: u32,
) -> Result<T> {
    let mut attempt = 0;
    loop {
        let response = provider.complete(request.clone()).await?;
        match parse_json::<T>(&response.content) {
            Ok(value) => {
                debug!(provider = provider.name(), attempt, "Structured response parsed");
                return Ok(value);
            }
            Err(e) if attempt < max_retries => {
                attempt += 1;
                warn!(provider = provider.name(), attempt, error = %e, "Invalid structured response, asking again");
                request.messages.push(Message::assistant(response.content));
                request.messages.push(Message::user(format!(
                    "Your reply could not be parsed ({}). Respond again with only a single valid JSON object matching the requested format.",
                    e
                )));
            }
            Err(e) => {
                return Err(Error::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(e),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Answer {
        answer: String,
        #[serde(default)]
        evidence: Vec<String>,
    }

    #[test]
    fn test_extract_fenced_block() {
        let text = "Here you go:\n```json\n{\"answer\": \"42\"}\n```\nDone.";
        assert_eq!(extract_json(text), Some("{\"answer\": \"42\"}"));
    }

    #[test]
    fn test_extract_bare_object_with_braces_in_strings() {
        let text = r#"Sure. {"answer": "use {x}", "evidence": ["a}"]} trailing"#;
        assert_eq!(
            extract_json(text),
            Some(r#"{"answer": "use {x}", "evidence": ["a}"]}"#)
        );
    }

    #[test]
    fn test_extract_nothing() {
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("{ unterminated"), None);
    }

    #[test]
    fn test_parse_json() {
        let parsed: Answer = parse_json("```\n{\"answer\": \"ok\", \"evidence\": [\"e\"]}\n```").unwrap();
        assert_eq!(parsed.answer, "ok");
        assert_eq!(parsed.evidence, vec!["e"]);

        let err = parse_json::<Answer>("{\"evidence\": []}").unwrap_err();
        assert!(matches!(err, Error::Schema(_)), "{:?}", err);
        assert!(err.to_string().contains("missing field `answer`"));

        let err = parse_json::<Answer>("the answer is 42").unwrap_err();
        assert!(matches!(err, Error::MissingJson));
    }

    #[tokio::test]
    async fn test_complete_json_retries_invalid_reply() {
        let provider = MockProvider::new();
        provider.push_response("I think the answer is 42");
        provider.push_response("{\"answer\": \"42\"}");

        let request = CompletionRequest::new("").with_message(Message::user("q"));
        let answer: Answer = complete_json(&provider, request, 2).await.unwrap();
        assert_eq!(answer.answer, "42");

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages.len(), 3);
        assert!(requests[1].messages[2].content.contains("could not be parsed"));
    }

    #[tokio::test]
    async fn test_complete_json_gives_up() {
        let provider = MockProvider::new();
        provider.push_response("nope");
        provider.push_response("still nope");

        let request = CompletionRequest::new("").with_message(Message::user("q"));
        let result = complete_json::<Answer>(&provider, request, 1).await;
        match result {
            Err(Error::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, Error::MissingJson));
            }
            other => panic!("expected exhausted retries, got {:?}", other.map(|a| a.answer)),
        }
        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_complete_json_does_not_retry_transport_errors() {
        let provider = MockProvider::new();
        provider.push_error(Error::RateLimit);
        provider.push_response("{\"answer\": \"late\"}");

        let request = CompletionRequest::new("").with_message(Message::user("q"));
        let result = complete_json::<Answer>(&provider, request, 3).await;
        assert!(matches!(result, Err(Error::RateLimit)));
        assert_eq!(provider.requests().len(), 1);
    }
}
