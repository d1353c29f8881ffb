//! Render request type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RenderError;

/// Caller-defined page description, passed verbatim to the bundle's `render`.
pub type Page = serde_json::Map<String, Value>;

/// Error message for requests whose `page` is missing, null, or not an object.
pub const PAGE_REQUIRED_MESSAGE: &str = "Request must include a page object";

/// A render request sent from the host to the worker.
///
/// On the wire this is `{"page": <object>}`. The struct holds an arbitrary
/// JSON value so that a malformed request can still be represented and
/// rejected by the worker with a proper error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderRequest {
    #[serde(default)]
    pub page: Value,
}

impl RenderRequest {
    /// Creates a request for the given page value.
    pub fn new(page: Value) -> Self {
        Self { page }
    }

    /// Returns the page if it is a JSON object.
    pub fn into_page(self) -> Result<Page, RenderError> {
        match self.page {
            Value::Object(page) => Ok(page),
            _ => Err(RenderError::render_failed(PAGE_REQUIRED_MESSAGE)),
        }
    }

    /// Parses a raw request payload and extracts its page.
    ///
    /// Invalid JSON fails with the parser's message. A payload that is valid
    /// JSON but not an object carrying an object `page` fails with
    /// [`PAGE_REQUIRED_MESSAGE`].
    pub fn parse_page(payload: &[u8]) -> Result<Page, RenderError> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| RenderError::render_failed(e.to_string()))?;

        match value {
            Value::Object(mut fields) => {
                let page = fields.remove("page").unwrap_or(Value::Null);
                RenderRequest::new(page).into_page()
            }
            _ => Err(RenderError::render_failed(PAGE_REQUIRED_MESSAGE)),
        }
    }
}
