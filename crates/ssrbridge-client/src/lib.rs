//! SSR Bridge Client
//!
//! Host-side half of the bridge. [`BridgeClient`] spawns the `ssr-worker`
//! process, sends one render request at a time over its stdin and pairs each
//! response read from its stdout with the request that caused it. Workers
//! that time out or die are killed and replaced on the next request.
//!
//! [`EmbeddedRenderer`] renders in the calling thread instead, for hosts that
//! can link the JavaScript runtime directly.

pub mod client;
pub mod config;
pub mod embedded;

pub use client::BridgeClient;
pub use config::ClientConfig;
pub use embedded::{EmbeddedRenderer, ModuleHandle};
