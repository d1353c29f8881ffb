//! Render session: one bundle, one cache policy, one request at a time
//!
//! The session owns the loader and the currently loaded bundle. In
//! development every request evicts the bundle (and everything it required)
//! and loads it again, so edits on disk show up on the next render. In
//! production the bundle is loaded once and reused for the life of the
//! session.

use std::path::{Path, PathBuf};

use ssrbridge_common::{Page, RenderError, RenderRequest, RenderResponse, RenderedPage};

use crate::config::CachePolicy;

/// Loads a rendering bundle and calls its render function.
///
/// Implemented by [`BundleRuntime`](crate::runtime::BundleRuntime); tests
/// substitute lightweight loaders.
#[allow(async_fn_in_trait)]
pub trait BundleLoader {
    /// Handle to a loaded bundle's render function.
    type Bundle;

    /// Load the bundle at `path`, reusing cached modules where present.
    fn load_module(&mut self, path: &Path) -> Result<Self::Bundle, RenderError>;

    /// Drop `path` and every module it required from the cache.
    ///
    /// Returns the number of modules evicted.
    fn invalidate(&mut self, path: &Path) -> usize;

    /// Call the bundle's render function with `page` and wait for its result.
    async fn call_render(
        &mut self,
        bundle: &Self::Bundle,
        page: Page,
    ) -> Result<RenderedPage, RenderError>;
}

pub struct RenderSession<L: BundleLoader> {
    loader: L,
    bundle_path: PathBuf,
    policy: CachePolicy,
    loaded: Option<L::Bundle>,
    requests_handled: u64,
}

impl<L: BundleLoader> RenderSession<L> {
    pub fn new(loader: L, bundle_path: impl Into<PathBuf>, policy: CachePolicy) -> Self {
        Self {
            loader,
            bundle_path: bundle_path.into(),
            policy,
            loaded: None,
            requests_handled: 0,
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn requests_handled(&self) -> u64 {
        self.requests_handled
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }

    /// Load the bundle now instead of on the first request.
    pub fn preload(&mut self) -> Result<(), RenderError> {
        self.ensure_loaded()
    }

    fn ensure_loaded(&mut self) -> Result<(), RenderError> {
        if self.loaded.is_none() {
            let bundle = self.loader.load_module(&self.bundle_path)?;
            tracing::info!("Loaded bundle {}", self.bundle_path.display());
            self.loaded = Some(bundle);
        }
        Ok(())
    }

    /// Render one page under the session's cache policy.
    pub async fn render(&mut self, page: Page) -> Result<RenderedPage, RenderError> {
        if self.policy.reloads_per_request() {
            let evicted = self.loader.invalidate(&self.bundle_path);
            tracing::debug!(evicted, "Evicted bundle modules before render");
            self.loaded = None;
        }

        self.ensure_loaded()?;

        let Self { loader, loaded, .. } = self;
        match loaded {
            Some(bundle) => loader.call_render(bundle, page).await,
            None => Err(RenderError::render_failed("Bundle is not loaded")),
        }
    }

    /// Handle one request payload (the JSON after the frame tag).
    ///
    /// Every payload yields exactly one response; a malformed request is
    /// answered with a failure before the bundle is touched.
    pub async fn handle_payload(&mut self, payload: &[u8]) -> RenderResponse {
        let result = match RenderRequest::parse_page(payload) {
            Ok(page) => self.render(page).await,
            Err(e) => Err(e),
        };
        self.requests_handled += 1;

        match &result {
            Ok(page) => tracing::debug!(
                request = self.requests_handled,
                head = page.head.len(),
                body_bytes = page.body.len(),
                "Rendered page"
            ),
            Err(e) => tracing::debug!(
                request = self.requests_handled,
                kind = ?e.kind(),
                "Render failed: {}",
                e
            ),
        }

        result.into()
    }
}
