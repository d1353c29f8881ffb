//! Locating the render function on a bundle's exports
//!
//! Bundlers disagree on where a build puts its entry point, so a fixed list
//! of locations is tried in order and the first callable wins. The same list
//! applies to `module.exports` and to an ES module's namespace object.

use boa_engine::{js_string, object::JsObject, value::JsValue, Context, JsResult};

/// A place on a bundle's exports where a render function may live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderExport {
    /// `exports.render`
    Named,
    /// `exports.default.render`
    DefaultRender,
    /// `exports.default` itself
    Default,
}

/// Locations tried by [`find_render`], highest priority first.
pub const RENDER_EXPORTS: [RenderExport; 3] = [
    RenderExport::Named,
    RenderExport::DefaultRender,
    RenderExport::Default,
];

impl RenderExport {
    fn lookup(self, exports: &JsValue, ctx: &mut Context) -> JsResult<JsValue> {
        match self {
            RenderExport::Named => property(exports, "render", ctx),
            RenderExport::DefaultRender => {
                let default = property(exports, "default", ctx)?;
                property(&default, "render", ctx)
            }
            RenderExport::Default => property(exports, "default", ctx),
        }
    }
}

fn property(value: &JsValue, key: &str, ctx: &mut Context) -> JsResult<JsValue> {
    match value.as_object() {
        Some(object) => object.get(js_string!(key), ctx),
        None => Ok(JsValue::undefined()),
    }
}

/// Return the first callable found at [`RENDER_EXPORTS`], if any.
pub fn find_render(exports: &JsValue, ctx: &mut Context) -> JsResult<Option<JsObject>> {
    for export in RENDER_EXPORTS {
        let candidate = export.lookup(exports, ctx)?;
        let function = candidate
            .as_object()
            .filter(|object| object.is_callable());
        if let Some(function) = function {
            tracing::debug!(?export, "Found render export");
            return Ok(Some(function));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::Source;

    fn found(script: &str) -> Option<String> {
        let mut ctx = Context::default();
        let exports = ctx.eval(Source::from_bytes(script)).unwrap();
        let render = find_render(&exports, &mut ctx).unwrap()?;
        let result = render.call(&JsValue::undefined(), &[], &mut ctx).unwrap();
        Some(result.to_string(&mut ctx).unwrap().to_std_string_escaped())
    }

    #[test]
    fn test_named_export_wins() {
        let script = "({ render: () => 'named', default: { render: () => 'nested' } })";
        assert_eq!(found(script).as_deref(), Some("named"));
    }

    #[test]
    fn test_default_render_before_default_function() {
        let script = "(function () { var d = function () { return 'default'; }; \
                      d.render = function () { return 'nested'; }; return { default: d }; })()";
        assert_eq!(found(script).as_deref(), Some("nested"));
    }

    #[test]
    fn test_default_function() {
        assert_eq!(found("({ default: () => 'default' })").as_deref(), Some("default"));
    }

    #[test]
    fn test_non_callable_candidates_are_skipped() {
        let script = "({ render: 'not a function', default: { render: () => 'nested' } })";
        assert_eq!(found(script).as_deref(), Some("nested"));
    }

    #[test]
    fn test_nothing_callable() {
        assert_eq!(found("({ other: () => 1 })"), None);
        assert_eq!(found("42"), None);
        assert_eq!(found("(function render() { return 'bare'; })"), None);
    }
}
