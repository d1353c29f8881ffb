//! In-process rendering without a worker process
//!
//! [`EmbeddedRenderer`] runs the bundle on a [`BundleRuntime`] inside the
//! calling thread, applying the same caching rules as the worker: in
//! development every [`load_module`](EmbeddedRenderer::load_module) evicts
//! the module and its dependencies first, in production the module graph is
//! reused.
//!
//! The Boa context is not thread-safe, so the renderer is neither `Send`
//! nor `Sync`; drive it from a current-thread runtime or a `LocalSet`.

use std::path::Path;

use serde_json::Value;
use ssrbridge_common::{RenderError, RenderRequest, RenderedPage};
use ssrbridge_worker::{BundleLoader, BundleRuntime, CachePolicy, LoadedBundle};

/// A loaded module's render function.
pub type ModuleHandle = LoadedBundle;

pub struct EmbeddedRenderer {
    runtime: BundleRuntime,
    policy: CachePolicy,
}

impl EmbeddedRenderer {
    pub fn new(policy: CachePolicy) -> Result<Self, RenderError> {
        Ok(Self {
            runtime: BundleRuntime::new(policy)?,
            policy,
        })
    }

    /// Log stack traces of failed renders.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.runtime = self.runtime.with_debug(debug);
        self
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Resolve and load the bundle at `path`.
    ///
    /// # Errors
    ///
    /// - `RenderError::ModuleNotFound` - `path` (or a module it requires)
    ///   does not resolve
    /// - `RenderError::NoRenderExport` - the module exports no render function
    /// - `RenderError::RenderFailed` - evaluating the module threw
    pub fn load_module(&mut self, path: impl AsRef<Path>) -> Result<ModuleHandle, RenderError> {
        let path = path.as_ref();
        if self.policy.reloads_per_request() {
            let evicted = self.runtime.invalidate(path);
            tracing::debug!(evicted, "Evicted modules before load");
        }
        self.runtime.load_module(path)
    }

    /// Call the handle's render function with `page`.
    ///
    /// `page` must be a JSON object; anything else fails with
    /// `RenderError::RenderFailed` without calling the bundle.
    pub async fn call_render(
        &mut self,
        handle: &ModuleHandle,
        page: Value,
    ) -> Result<RenderedPage, RenderError> {
        let page = RenderRequest::new(page).into_page()?;
        self.runtime.call_render(handle, page).await
    }

    /// Load the bundle and render `page` with it.
    pub async fn render(
        &mut self,
        path: impl AsRef<Path>,
        page: Value,
    ) -> Result<RenderedPage, RenderError> {
        let handle = self.load_module(path)?;
        self.call_render(&handle, page).await
    }
}
