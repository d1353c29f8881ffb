use std::path::{Path, PathBuf};
use std::rc::Rc;

use boa_engine::{js_string, object::JsObject, value::JsValue, Context, JsError};
use boa_gc::{Gc, GcRefCell};
use ssrbridge_common::{Page, RenderError, RenderedPage, RESULT_SHAPE};

use super::bindings::install_globals;
use super::conversions::{js_value_to_json, json_to_js_value};
use super::errors::{detail_of, is_module_not_found, message_of};
use super::event_loop::{settle, SharedTimers, TimerQueue};
use super::exports::find_render;
use super::loader::{load_entry, new_graph, BundleModuleLoader, SharedGraph};
use super::resolver::resolve_entry;
use crate::config::{CachePolicy, WorkerConfig};
use crate::session::BundleLoader;

/// A loaded bundle: its resolved path and the render function it exports.
#[derive(Debug, Clone)]
pub struct LoadedBundle {
    pub path: PathBuf,
    pub render: JsObject,
}

/// Boa JavaScript runtime hosting a rendering bundle.
///
/// The runtime owns a single [`Context`]; module exports, timers and the
/// module cache all live in it. Everything is single-threaded, so the
/// runtime is neither `Send` nor `Sync` and renders run one at a time.
///
/// The bundle may be CommonJS or an ES module; both are looked up through
/// the same module cache.
///
/// # Example
///
/// ```no_run
/// use ssrbridge_worker::{BundleLoader, BundleRuntime, CachePolicy};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), ssrbridge_common::RenderError> {
/// let mut runtime = BundleRuntime::new(CachePolicy::Production)?;
/// let bundle = runtime.load_module(Path::new("dist/ssr.js"))?;
///
/// let page = serde_json::json!({"component": "Home"});
/// let page = page.as_object().cloned().unwrap_or_default();
/// let rendered = runtime.call_render(&bundle, page).await?;
/// println!("{}", rendered.body);
/// # Ok(())
/// # }
/// ```
pub struct BundleRuntime {
    context: Context,
    modules: SharedGraph,
    timers: SharedTimers,
    debug: bool,
}

impl BundleRuntime {
    /// Create a runtime with the host globals installed.
    ///
    /// # Arguments
    ///
    /// * `policy` - Only decides what `process.env.NODE_ENV` reports;
    ///   eviction is driven by the caller
    ///
    /// # Returns
    ///
    /// A runtime with an empty module cache and no pending timers.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::RenderFailed` if the Boa context cannot be
    /// built or the globals cannot be installed.
    pub fn new(policy: CachePolicy) -> Result<Self, RenderError> {
        let modules = new_graph();
        let mut context = Context::builder()
            .module_loader(Rc::new(BundleModuleLoader::new(modules.clone())))
            .build()
            .map_err(|e| RenderError::render_failed(format!("Failed to create context: {e}")))?;
        let timers: SharedTimers = Gc::new(GcRefCell::new(TimerQueue::new()));

        install_globals(&mut context, timers.clone(), policy.node_env()).map_err(|e| {
            RenderError::render_failed(format!("Failed to install runtime globals: {e}"))
        })?;

        Ok(Self {
            context,
            modules,
            timers,
            debug: false,
        })
    }

    /// Create a runtime for a worker started with `config`.
    ///
    /// # Errors
    ///
    /// Same as [`BundleRuntime::new`].
    pub fn for_config(config: &WorkerConfig) -> Result<Self, RenderError> {
        Ok(Self::new(config.policy)?.with_debug(config.debug))
    }

    /// Log stack traces of failed renders at error level.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Number of modules currently cached.
    pub fn module_count(&self) -> usize {
        self.modules.borrow().len()
    }

    /// Whether the module at the canonical `path` is cached.
    pub fn is_cached(&self, path: &Path) -> bool {
        self.modules.borrow().contains(path)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Map a thrown value to a render error.
    ///
    /// Module resolution failures are reported against `entry`, the path the
    /// caller asked for, whichever nested require actually failed.
    fn classify(&mut self, error: JsError, entry: Option<&Path>) -> RenderError {
        let thrown = error.to_opaque(&mut self.context);

        if self.debug {
            tracing::error!("Render error detail: {}", detail_of(&thrown, &mut self.context));
        }

        match entry {
            Some(entry) if is_module_not_found(&thrown, &mut self.context) => {
                RenderError::ModuleNotFound(entry.display().to_string())
            }
            _ => RenderError::RenderFailed(message_of(&thrown, &mut self.context)),
        }
    }

    fn read_output(&mut self, output: JsValue) -> Result<RenderedPage, RenderError> {
        let Some(output) = output.as_object() else {
            return Err(RenderError::render_failed(format!(
                "{RESULT_SHAPE} - got {}",
                output.type_of()
            )));
        };

        let head = match output.get(js_string!("head"), &mut self.context) {
            Ok(head) => head,
            Err(e) => return Err(self.classify(e, None)),
        };
        let body = match output.get(js_string!("body"), &mut self.context) {
            Ok(body) => body,
            Err(e) => return Err(self.classify(e, None)),
        };

        let head = js_value_to_json(head, &mut self.context)?;
        let body = js_value_to_json(body, &mut self.context)?;
        RenderedPage::from_output(Some(head), Some(body))
    }
}

impl BundleLoader for BundleRuntime {
    type Bundle = LoadedBundle;

    /// Resolve `path`, evaluate it unless it is cached, and find its render
    /// function.
    ///
    /// # Arguments
    ///
    /// * `path` - Bundle path, absolute or relative to the working directory
    ///
    /// # Returns
    ///
    /// The canonical bundle path and the render function it exports.
    ///
    /// # Errors
    ///
    /// - `RenderError::ModuleNotFound` - `path`, or a module it requires or
    ///   imports, does not resolve; the error names `path`
    /// - `RenderError::NoRenderExport` - no callable render export
    /// - `RenderError::RenderFailed` - evaluating the bundle threw
    fn load_module(&mut self, path: &Path) -> Result<LoadedBundle, RenderError> {
        let Some(resolved) = resolve_entry(path) else {
            return Err(RenderError::ModuleNotFound(path.display().to_string()));
        };

        let exports = match load_entry(&self.modules, &resolved, &mut self.context) {
            Ok(exports) => exports,
            Err(e) => return Err(self.classify(e, Some(path))),
        };

        match find_render(&exports, &mut self.context) {
            Ok(Some(render)) => Ok(LoadedBundle {
                path: resolved,
                render,
            }),
            Ok(None) => Err(RenderError::NoRenderExport(path.display().to_string())),
            Err(e) => Err(self.classify(e, Some(path))),
        }
    }

    /// Evict `path` and every module it pulled in.
    ///
    /// # Returns
    ///
    /// The number of modules evicted; `0` when `path` does not resolve or
    /// was not cached.
    fn invalidate(&mut self, path: &Path) -> usize {
        let Some(resolved) = resolve_entry(path) else {
            return 0;
        };
        let evicted = self.modules.borrow_mut().evict(&resolved);
        for module in &evicted {
            tracing::trace!("Evicted module {}", module.display());
        }
        evicted.len()
    }

    /// Call the bundle's render function with `page` and wait for it.
    ///
    /// Timers left over from an earlier render, for instance one abandoned
    /// by a timeout, are dropped before the call.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::RenderFailed` if render throws, its promise
    /// rejects, or the result does not have the `{ head, body }` shape.
    async fn call_render(
        &mut self,
        bundle: &LoadedBundle,
        page: Page,
    ) -> Result<RenderedPage, RenderError> {
        let dropped = self.timers.borrow_mut().clear();
        if dropped > 0 {
            tracing::debug!(dropped, "Dropped timers left over from an earlier render");
        }

        let page = json_to_js_value(serde_json::Value::Object(page), &mut self.context)?;

        let result = match bundle
            .render
            .call(&JsValue::undefined(), &[page], &mut self.context)
        {
            Ok(result) => result,
            Err(e) => return Err(self.classify(e, None)),
        };

        let output = match settle(&mut self.context, &self.timers, result).await {
            Ok(output) => output,
            Err(e) => return Err(self.classify(e, None)),
        };

        self.read_output(output)
    }
}
