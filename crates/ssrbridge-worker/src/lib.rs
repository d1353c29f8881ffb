//! SSR Bridge Render Worker
//!
//! This crate provides the worker side of the bridge: a Boa JavaScript
//! runtime that loads a CommonJS or ES module rendering bundle, a render
//! session that applies the module caching policy, and the serve loop that
//! answers framed requests strictly one at a time.

pub mod config;
pub mod runtime;
pub mod session;
pub mod worker;

pub use config::{CachePolicy, WorkerConfig};
pub use runtime::{BundleRuntime, LoadedBundle};
pub use session::{BundleLoader, RenderSession};
pub use worker::{serve, write_response};
