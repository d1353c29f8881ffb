//! SSR Bridge Common Types and Transport
//!
//! This crate provides the protocol definitions and the line framing shared by
//! both ends of the SSR bridge: the host-side client and the render worker.
//!
//! # Overview
//!
//! A backend that cannot render UI components itself hands a `page` object to a
//! render worker process, which runs a JavaScript rendering bundle and answers
//! with rendered markup. The two sides talk over the worker's stdin/stdout:
//!
//! - **Protocol Layer**: [`RenderRequest`], [`RenderResponse`], [`RenderedPage`]
//!   and the closed [`RenderError`] taxonomy
//! - **Transport Layer**: tagged, newline-delimited JSON frames
//!
//! # Wire Format
//!
//! - **Framing**: `ISSR` + one JSON document + `\n`
//! - **Ordering**: strictly FIFO, one response per request, no correlation IDs
//! - **Max Frame Size**: 1 MiB, tag included, newline excluded
//!
//! # Example
//!
//! ```
//! use ssrbridge_common::{RenderRequest, RenderResponse, RenderedPage};
//! use ssrbridge_common::transport::{encode_frame, FRAME_TAG};
//! use serde_json::json;
//!
//! let request = RenderRequest::new(json!({"component": "Home"}));
//! let line = encode_frame(&request).unwrap();
//! assert!(line.starts_with(FRAME_TAG.as_bytes()));
//!
//! let response = RenderResponse::success(RenderedPage::new(vec![], "<div></div>"));
//! assert!(response.ok);
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
