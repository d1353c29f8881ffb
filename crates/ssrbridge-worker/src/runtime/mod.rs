//! Boa JavaScript runtime for rendering bundles
//!
//! # Architecture
//!
//! - [`context`] - [`BundleRuntime`], the [`BundleLoader`](crate::BundleLoader)
//!   backed by a Boa context
//! - [`loader`] - CommonJS `require` and ES module `import` loading
//! - [`resolver`] - mapping `require` requests to files
//! - [`module_graph`] - module cache with dependency edges for eviction
//! - [`exports`] - locating the render function on a bundle's exports
//! - [`event_loop`] - timers and promise settlement
//! - [`bindings`] - `console`, timer and `process` globals
//! - [`conversions`] - JSON <-> JavaScript values
//! - [`errors`] - classification of thrown values

pub mod bindings;
pub mod context;
pub mod conversions;
pub mod errors;
pub mod event_loop;
pub mod exports;
pub mod loader;
pub mod module_graph;
pub mod resolver;


pub use context::{BundleRuntime, LoadedBundle};
pub use module_graph::ModuleGraph;
