pub mod error;
pub mod requests;
pub mod responses;


pub use error::{BridgeError, ErrorKind, RenderError, Result};
pub use requests::{Page, RenderRequest, PAGE_REQUIRED_MESSAGE};
pub use responses::{RenderResponse, RenderedPage, RESULT_SHAPE};
