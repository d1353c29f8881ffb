//! SSR Bridge Transport Layer
//!
//! Line framing over a byte stream shared with the render worker.
//!
//! # Architecture
//!
//! - **Stream**: the worker's stdin (requests) and stdout (responses)
//! - **Codec**: JSON serialization for protocol messages
//! - **Wire Format**: `ISSR` + `[JSON document]` + `\n`
//!
//! Lines that do not start with the tag are skipped by [`FrameReader`], so
//! stray output from a bundle or its dependencies can never be mistaken for a
//! response.
//!
//! # Frame Size Limit
//!
//! A frame (tag plus JSON, newline excluded) may be at most
//! [`MAX_FRAME_BYTES`]. Larger frames are refused by [`encode_frame`] and
//! reported as [`Frame::Oversized`] by the reader after the whole line has
//! been consumed, so the stream stays aligned.

pub mod codec;
pub mod frame;

pub use codec::JsonCodec;
pub use frame::{encode_frame, Frame, FrameReader, FRAME_TAG, MAX_FRAME_BYTES};
