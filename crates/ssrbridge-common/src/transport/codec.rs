use crate::protocol::error::Result;
use crate::protocol::{RenderRequest, RenderResponse};

use super::frame::encode_frame;

/// JSON codec for the render protocol.
///
/// `encode_*` produce complete framed lines (tag, JSON and newline);
/// `decode_*` take the payload of a [`Frame::Message`](super::Frame::Message),
/// i.e. the JSON with the tag already stripped.
///
/// # Example
///
/// ```
/// use ssrbridge_common::transport::{JsonCodec, FRAME_TAG};
/// use ssrbridge_common::{RenderRequest, RenderResponse, RenderedPage};
/// use serde_json::json;
///
/// let request = RenderRequest::new(json!({"component": "Home"}));
/// let line = JsonCodec::encode_request(&request).unwrap();
/// let payload = &line[FRAME_TAG.len()..line.len() - 1];
/// assert_eq!(JsonCodec::decode_request(payload).unwrap(), request);
///
/// let response = RenderResponse::success(RenderedPage::new(vec![], "ok"));
/// let line = JsonCodec::encode_response(&response).unwrap();
/// let payload = &line[FRAME_TAG.len()..line.len() - 1];
/// assert_eq!(JsonCodec::decode_response(payload).unwrap(), response);
/// ```
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a request as a framed line
    pub fn encode_request(request: &RenderRequest) -> Result<Vec<u8>> {
        encode_frame(request)
    }

    /// Decode a request payload
    pub fn decode_request(data: &[u8]) -> Result<RenderRequest> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Encode a response as a framed line
    pub fn encode_response(response: &RenderResponse) -> Result<Vec<u8>> {
        encode_frame(response)
    }

    /// Decode a response payload
    pub fn decode_response(data: &[u8]) -> Result<RenderResponse> {
        Ok(serde_json::from_slice(data)?)
    }
}
