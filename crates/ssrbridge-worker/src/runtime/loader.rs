//! CommonJS and ES module loading
//!
//! Each CommonJS source file becomes the body of a function built with the
//! global `Function` constructor, taking
//! `(exports, require, module, __filename, __dirname)` and called with
//! `this` bound to `exports`. The body is compiled as its own function, so
//! top-level `var`s stay local to the module. `.json` files export their
//! parsed contents.
//!
//! A CommonJS module is cached before its body runs, so a require cycle sees
//! the partially populated `module.exports` of the module still loading. If
//! the body throws, the module and everything it pulled in are evicted and
//! the next require starts from scratch.
//!
//! ES modules (`.mjs`, or `.js` under a `"type": "module"` package) are
//! parsed into Boa module records and cached in the same graph.
//! [`BundleModuleLoader`] resolves their `import`s with the CommonJS
//! resolver; a CommonJS file imported from an ES module is exposed as its
//! default export. `require()` of an ES module throws `ERR_REQUIRE_ESM`.

use std::cell::RefCell;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use boa_engine::{
    builtins::promise::PromiseState,
    js_string,
    module::{Module, ModuleLoader, Referrer},
    native_function::NativeFunction,
    object::{builtins::JsFunction, FunctionObjectBuilder, JsObject},
    value::JsValue,
    Context, JsError, JsNativeError, JsResult, JsString, Source,
};
use boa_gc::{Finalize, Gc, GcRefCell, Trace};

use super::conversions::json_to_js_value;
use super::errors::{module_not_found, require_esm};
use super::module_graph::ModuleGraph;
use super::resolver::{self, module_format, ModuleFormat};

/// Parameters of the CommonJS module wrapper, in call order.
const WRAPPER_PARAMS: [&str; 5] = ["exports", "require", "module", "__filename", "__dirname"];

/// A cached module.
#[derive(Clone, Trace, Finalize)]
pub enum CachedModule {
    /// The `module` object of a CommonJS or JSON file.
    CommonJs(JsObject),
    /// A parsed ES module record.
    EsModule(Module),
}

/// Module cache shared between the runtime, the module loader and every
/// `require` function.
pub type SharedGraph = Gc<GcRefCell<ModuleGraph<CachedModule>>>;

/// Create an empty module cache.
pub fn new_graph() -> SharedGraph {
    Gc::new(GcRefCell::new(ModuleGraph::new()))
}

/// Load the entry module at the canonical `path` and return its exports:
/// `module.exports` for CommonJS, the namespace object for an ES module.
pub fn load_entry(graph: &SharedGraph, path: &Path, ctx: &mut Context) -> JsResult<JsValue> {
    match module_format(path) {
        ModuleFormat::EsModule => import_path(graph, path, ctx),
        ModuleFormat::CommonJs | ModuleFormat::Json => require_path(graph, None, path, ctx),
    }
}

/// Load the CommonJS module at the canonical `path` and return its
/// `module.exports`.
///
/// When `parent` is given, the parent -> child edge is recorded even if the
/// child is already cached, so eviction from the parent reaches it.
pub fn require_path(
    graph: &SharedGraph,
    parent: Option<&Path>,
    path: &Path,
    ctx: &mut Context,
) -> JsResult<JsValue> {
    if let Some(parent) = parent {
        graph.borrow_mut().add_dependency(parent, path);
    }

    let cached = graph.borrow().get(path).cloned();
    match &cached {
        Some(CachedModule::CommonJs(module)) => return module.get(js_string!("exports"), ctx),
        Some(CachedModule::EsModule(_)) => return Err(require_esm(path, ctx)),
        None if module_format(path) == ModuleFormat::EsModule => {
            return Err(require_esm(path, ctx));
        }
        None => {}
    }

    tracing::debug!("Loading module {}", path.display());

    let module = JsObject::with_object_proto(ctx.intrinsics());
    let exports = JsObject::with_object_proto(ctx.intrinsics());
    let filename = JsString::from(path.to_string_lossy().as_ref());
    module.set(js_string!("id"), filename.clone(), false, ctx)?;
    module.set(js_string!("filename"), filename, false, ctx)?;
    module.set(js_string!("exports"), exports.clone(), false, ctx)?;
    module.set(js_string!("loaded"), false, false, ctx)?;

    graph
        .borrow_mut()
        .insert(path.to_path_buf(), CachedModule::CommonJs(module.clone()));

    if let Err(e) = evaluate(graph, path, &module, exports, ctx) {
        let evicted = graph.borrow_mut().evict(path);
        tracing::debug!(evicted = evicted.len(), "Module {} failed to load", path.display());
        return Err(e);
    }

    module.set(js_string!("loaded"), true, false, ctx)?;
    module.get(js_string!("exports"), ctx)
}

fn read_source(path: &Path) -> JsResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        JsNativeError::error()
            .with_message(format!("Failed to read {}: {e}", path.display()))
            .into()
    })
}

fn evaluate(
    graph: &SharedGraph,
    path: &Path,
    module: &JsObject,
    exports: JsObject,
    ctx: &mut Context,
) -> JsResult<()> {
    let source = read_source(path)?;

    if module_format(path) == ModuleFormat::Json {
        let value: serde_json::Value = serde_json::from_str(&source).map_err(|e| {
            JsNativeError::syntax().with_message(format!("{}: {e}", path.display()))
        })?;
        let value = json_to_js_value(value, ctx)
            .map_err(|e| JsNativeError::error().with_message(e.to_string()))?;
        module.set(js_string!("exports"), value, false, ctx)?;
        return Ok(());
    }

    let function = wrap_module(strip_shebang(&source), ctx)?;

    let dirname = path
        .parent()
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_default();
    let require = require_function(graph.clone(), path.to_path_buf(), ctx);

    let this = JsValue::from(exports);
    let args = [
        this.clone(),
        require.into(),
        module.clone().into(),
        JsString::from(path.to_string_lossy().as_ref()).into(),
        JsString::from(dirname).into(),
    ];
    function.call(&this, &args, ctx)?;
    Ok(())
}

/// Compile `source` as the body of a module wrapper function.
fn wrap_module(source: &str, ctx: &mut Context) -> JsResult<JsObject> {
    let constructor = ctx.intrinsics().constructors().function().constructor();
    let args: Vec<JsValue> = WRAPPER_PARAMS
        .iter()
        .map(|param| JsValue::from(JsString::from(*param)))
        .chain(std::iter::once(JsValue::from(JsString::from(source))))
        .collect();
    constructor.construct(&args, None, ctx)
}

/// What a `require` function needs to know about the module it belongs to.
#[derive(Clone, Trace, Finalize)]
struct RequireScope {
    graph: SharedGraph,
    module_path: PathBuf,
}

/// The `require` handed to the module at `module_path`.
fn require_function(graph: SharedGraph, module_path: PathBuf, ctx: &mut Context) -> JsFunction {
    let native = NativeFunction::from_copy_closure_with_captures(
        |_this, args, scope: &RequireScope, ctx| {
            let Some(request) = args
                .first()
                .and_then(JsValue::as_string)
                .map(|s| s.to_std_string_escaped())
            else {
                return Err(JsNativeError::typ()
                    .with_message("require() expects a module path string")
                    .into());
            };

            let base_dir = scope.module_path.parent().unwrap_or(Path::new(""));
            let Some(resolved) = resolver::resolve(base_dir, &request) else {
                let from = scope.module_path.to_string_lossy();
                return Err(module_not_found(&request, &from, ctx));
            };

            require_path(&scope.graph, Some(&scope.module_path), &resolved, ctx)
        },
        RequireScope { graph, module_path },
    );

    FunctionObjectBuilder::new(ctx.realm(), native)
        .name(js_string!("require"))
        .length(1)
        .build()
}

/// Evaluate the ES module at the canonical `path` and return its namespace.
///
/// Evaluation runs to completion before this returns: promise jobs are
/// drained, but timers are not fired, so a top-level `await` on a timer
/// fails the load. A failed module is evicted with its dependencies.
pub fn import_path(graph: &SharedGraph, path: &Path, ctx: &mut Context) -> JsResult<JsValue> {
    let module = es_module(graph, path, ctx)?;

    let promise = module.load_link_evaluate(ctx);
    let drained = ctx.run_jobs();

    let failure = match (drained, promise.state()) {
        (Ok(()), PromiseState::Fulfilled(_)) => return Ok(module.namespace(ctx).into()),
        (Err(e), _) => e,
        (Ok(()), PromiseState::Rejected(reason)) => JsError::from_opaque(reason),
        (Ok(()), PromiseState::Pending) => JsNativeError::error()
            .with_message(format!(
                "Module {} did not finish evaluating: top-level await can only wait on promise jobs",
                path.display()
            ))
            .into(),
    };

    let evicted = graph.borrow_mut().evict(path);
    tracing::debug!(evicted = evicted.len(), "Module {} failed to load", path.display());
    Err(failure)
}

/// The cached module record for `path`, parsing the file on a cache miss.
fn es_module(graph: &SharedGraph, path: &Path, ctx: &mut Context) -> JsResult<Module> {
    let cached = graph.borrow().get(path).cloned();
    if let Some(CachedModule::EsModule(module)) = &cached {
        return Ok(module.clone());
    }

    tracing::debug!("Parsing module {}", path.display());
    let source = read_source(path)?;
    let module = Module::parse(
        Source::from_bytes(strip_shebang(&source)).with_path(path),
        None,
        ctx,
    )?;

    graph
        .borrow_mut()
        .insert(path.to_path_buf(), CachedModule::EsModule(module.clone()));
    Ok(module)
}

/// Resolves `import` specifiers against the importing module's directory.
pub struct BundleModuleLoader {
    graph: SharedGraph,
}

impl BundleModuleLoader {
    pub fn new(graph: SharedGraph) -> Self {
        Self { graph }
    }

    fn load(&self, referrer: &Referrer, specifier: &JsString, ctx: &mut Context) -> JsResult<Module> {
        let request = specifier.to_std_string_escaped();
        let base_dir = match referrer.path().and_then(Path::parent) {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir().unwrap_or_default(),
        };

        let Some(resolved) = resolver::resolve(&base_dir, &request) else {
            let from = referrer
                .path()
                .map(|path| path.to_string_lossy().into_owned())
                .unwrap_or_else(|| base_dir.to_string_lossy().into_owned());
            return Err(module_not_found(&request, &from, ctx));
        };

        if let Some(parent) = referrer.path() {
            self.graph.borrow_mut().add_dependency(parent, &resolved);
        }

        match module_format(&resolved) {
            ModuleFormat::EsModule => es_module(&self.graph, &resolved, ctx),
            ModuleFormat::CommonJs | ModuleFormat::Json => {
                let exports = require_path(&self.graph, None, &resolved, ctx)?;
                Ok(Module::from_value_as_default(exports, ctx))
            }
        }
    }
}

impl ModuleLoader for BundleModuleLoader {
    fn load_imported_module(
        self: Rc<Self>,
        referrer: Referrer,
        specifier: JsString,
        context: &RefCell<&mut Context>,
    ) -> impl Future<Output = JsResult<Module>> {
        let result = self.load(&referrer, &specifier, &mut context.borrow_mut());
        async { result }
    }
}

fn strip_shebang(source: &str) -> &str {
    if source.starts_with("#!") {
        source.find('\n').map_or("", |end| &source[end..])
    } else {
        source
    }
}
