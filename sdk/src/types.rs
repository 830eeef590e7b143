//! Wire types shared between the engine and transports

use serde::{Deserialize, Serialize};

/// One page of results from a data endpoint.
///
/// Both the local analytics API and the upstream Cosmos REST API are
/// normalized to this shape by their endpoint adapters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Page {
    /// Rows contained in this page
    pub rows: Vec<serde_json::Value>,

    /// Cursor for the next page, if the endpoint reported one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,

    /// Total row count across all pages, if the endpoint reported one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl Page {
    /// A page with rows and no continuation
    pub fn last(rows: Vec<serde_json::Value>) -> Self {
        Self {
            rows,
            next_cursor: None,
            total: None,
        }
    }

    /// Whether more pages remain after this one
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// Pagination cursor.
///
/// The convention is declared once per operation in the registry and never
/// changes at runtime: the local API pages by offset, the Cosmos REST API
/// pages by an opaque `next_key` token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cursor {
    /// Row offset into the result set (local API `skip` parameter)
    Offset(u64),

    /// Opaque continuation token (Cosmos `pagination.key`)
    Key(String),
}

/// Final answer returned to the chat transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Human-readable answer text
    pub text: String,

    /// BCP-47 language tag of the answer ("en", "uk", ...)
    pub locale: String,

    /// True when any step was truncated or errored, i.e. the numbers shown
    /// may not cover the full data set
    pub partial: bool,
}

/// Kind of failure recorded against a single plan step.
///
/// Step errors never abort the plan; they are carried in the result bundle
/// so the formatter can disclose them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    /// The backend could not be reached or kept failing after retries
    UpstreamUnavailable,

    /// Parameters were missing, of the wrong type, or unresolvable
    InvalidParameters,

    /// The step exceeded its deadline
    Timeout,
}

impl std::fmt::Display for StepErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepErrorKind::UpstreamUnavailable => write!(f, "upstream_unavailable"),
            StepErrorKind::InvalidParameters => write!(f, "invalid_parameters"),
            StepErrorKind::Timeout => write!(f, "timeout"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_has_more() {
        let done = Page::last(vec![json!({"a": 1})]);
        assert!(!done.has_more());

        let more = Page {
            rows: vec![],
            next_cursor: Some(Cursor::Key("abc".into())),
            total: Some(250),
        };
        assert!(more.has_more());
    }

    #[test]
    fn test_cursor_serialization() {
        let key = Cursor::Key("xyz".into());
        let encoded = serde_json::to_string(&key).unwrap();
        assert!(encoded.contains("key"));
        let decoded: Cursor = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, key);

        let offset = Cursor::Offset(100);
        let decoded: Cursor =
            serde_json::from_str(&serde_json::to_string(&offset).unwrap()).unwrap();
        assert_eq!(decoded, offset);
    }

    #[test]
    fn test_step_error_kind_display() {
        assert_eq!(StepErrorKind::Timeout.to_string(), "timeout");
        assert_eq!(
            StepErrorKind::UpstreamUnavailable.to_string(),
            "upstream_unavailable"
        );
        assert_eq!(
            StepErrorKind::InvalidParameters.to_string(),
            "invalid_parameters"
        );
    }

    #[test]
    fn test_answer_roundtrip() {
        let answer = Answer {
            text: "Block height is 1234567.".into(),
            locale: "en".into(),
            partial: false,
        };
        let decoded: Answer =
            serde_json::from_str(&serde_json::to_string(&answer).unwrap()).unwrap();
        assert_eq!(decoded.text, answer.text);
        assert!(!decoded.partial);
    }
}
