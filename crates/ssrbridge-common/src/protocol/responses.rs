//! Render response types.
//!
//! A response is either a rendered page or a classified [`RenderError`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ErrorKind, RenderError};

/// Prefix of every message describing a malformed render result.
pub const RESULT_SHAPE: &str = "render() must return { head: string[], body: string }";

/// Markup produced by a successful render.
///
/// # Example
///
/// ```
/// use ssrbridge_common::RenderedPage;
///
/// let page = RenderedPage::new(vec!["<title>Home</title>".into()], "<div id=\"app\"></div>");
/// assert_eq!(page.head.len(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenderedPage {
    /// Head fragments, in the order the bundle returned them
    pub head: Vec<String>,
    /// Body markup
    pub body: String,
}

impl RenderedPage {
    pub fn new(head: Vec<String>, body: impl Into<String>) -> Self {
        Self {
            head,
            body: body.into(),
        }
    }

    /// Validates the `head` and `body` fields of a render result.
    ///
    /// `None` and JSON `null` stand for a missing field and default to `[]`
    /// and `""`. Otherwise `head` must be an array of strings and `body` a
    /// string; `head` is checked first.
    pub fn from_output(head: Option<Value>, body: Option<Value>) -> Result<Self, RenderError> {
        let head = match head.unwrap_or(Value::Null) {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    _ => Err(RenderError::render_failed(format!(
                        "{RESULT_SHAPE} - head contains a non-string entry"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => {
                return Err(RenderError::render_failed(format!(
                    "{RESULT_SHAPE} - head is not an array"
                )))
            }
        };

        let body = match body.unwrap_or(Value::Null) {
            Value::Null => String::new(),
            Value::String(s) => s,
            _ => {
                return Err(RenderError::render_failed(format!(
                    "{RESULT_SHAPE} - body is not a string"
                )))
            }
        };

        Ok(Self { head, body })
    }
}

/// A response written by the worker, one per request.
///
/// Success: `{"ok": true, "head": [...], "body": "..."}`.
/// Failure: `{"ok": false, "error": "...", "kind": "...", "path": "..."}`,
/// where `kind` and `path` are optional for readers and `path` is only
/// present for path-carrying variants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderResponse {
    /// Whether the render succeeded
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Human-readable error message (present on failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl RenderResponse {
    /// Creates a success response.
    pub fn success(page: RenderedPage) -> Self {
        RenderResponse {
            ok: true,
            head: Some(page.head),
            body: Some(page.body),
            error: None,
            kind: None,
            path: None,
        }
    }

    /// Creates a failure response from a classified error.
    pub fn failure(error: &RenderError) -> Self {
        RenderResponse {
            ok: false,
            head: None,
            body: None,
            error: Some(error.to_string()),
            kind: Some(error.kind()),
            path: error.path().map(str::to_string),
        }
    }

    /// Converts the wire response back into a typed result.
    ///
    /// A failure without `kind` is a plain `RenderFailed`; a path variant
    /// without `path` falls back to the error message.
    pub fn into_result(self) -> Result<RenderedPage, RenderError> {
        if self.ok {
            return Ok(RenderedPage {
                head: self.head.unwrap_or_default(),
                body: self.body.unwrap_or_default(),
            });
        }

        let message = self
            .error
            .unwrap_or_else(|| "Unknown render error".to_string());

        Err(match self.kind {
            Some(ErrorKind::ModuleNotFound) => {
                RenderError::ModuleNotFound(self.path.unwrap_or(message))
            }
            Some(ErrorKind::NoRenderExport) => {
                RenderError::NoRenderExport(self.path.unwrap_or(message))
            }
            Some(ErrorKind::RenderFailed) | None => RenderError::RenderFailed(message),
        })
    }
}

impl From<Result<RenderedPage, RenderError>> for RenderResponse {
    fn from(result: Result<RenderedPage, RenderError>) -> Self {
        match result {
            Ok(page) => RenderResponse::success(page),
            Err(err) => RenderResponse::failure(&err),
        }
    }
}
