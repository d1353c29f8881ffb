//! Helpers for turning thrown JavaScript values into render errors

use std::path::Path;

use boa_engine::{js_string, Context, JsError, JsNativeError, JsValue};

/// `code` carried by errors thrown when a `require` cannot be resolved.
pub const MODULE_NOT_FOUND: &str = "MODULE_NOT_FOUND";

/// Build the error thrown by `require` for an unresolvable request.
pub fn module_not_found(request: &str, from: &str, ctx: &mut Context) -> JsError {
    let error = JsNativeError::error()
        .with_message(format!("Cannot find module '{request}' from '{from}'"))
        .to_opaque(ctx);
    if let Err(e) = error.set(js_string!("code"), js_string!(MODULE_NOT_FOUND), false, ctx) {
        return e;
    }
    JsError::from_opaque(error.into())
}

/// `code` carried by errors thrown when `require` is asked for an ES module.
pub const ERR_REQUIRE_ESM: &str = "ERR_REQUIRE_ESM";

/// Build the error thrown by `require` for a file that is an ES module.
pub fn require_esm(path: &Path, ctx: &mut Context) -> JsError {
    let error = JsNativeError::error()
        .with_message(format!(
            "require() of ES module {} is not supported, use import instead",
            path.display()
        ))
        .to_opaque(ctx);
    if let Err(e) = error.set(js_string!("code"), js_string!(ERR_REQUIRE_ESM), false, ctx) {
        return e;
    }
    JsError::from_opaque(error.into())
}

/// Whether a thrown value is a module resolution failure.
pub fn is_module_not_found(thrown: &JsValue, ctx: &mut Context) -> bool {
    let Some(object) = thrown.as_object() else {
        return false;
    };
    object
        .get(js_string!("code"), ctx)
        .ok()
        .and_then(|code| code.as_string().map(|s| s.to_std_string_escaped()))
        .is_some_and(|code| code == MODULE_NOT_FOUND)
}

/// The text reported for a thrown value.
///
/// Error objects report their `message`; anything else (or an error with an
/// empty message) is reported as its string form.
pub fn message_of(thrown: &JsValue, ctx: &mut Context) -> String {
    if let Some(object) = thrown.as_object() {
        let message = object
            .get(js_string!("message"), ctx)
            .ok()
            .and_then(|m| m.as_string().map(|s| s.to_std_string_escaped()))
            .filter(|m| !m.is_empty());
        if let Some(message) = message {
            return message;
        }
    }
    to_display_string(thrown, ctx)
}

/// Stack trace when the engine provides one, otherwise the string form.
pub fn detail_of(thrown: &JsValue, ctx: &mut Context) -> String {
    thrown
        .as_object()
        .and_then(|object| object.get(js_string!("stack"), ctx).ok())
        .and_then(|stack| stack.as_string().map(|s| s.to_std_string_escaped()))
        .filter(|stack| !stack.is_empty())
        .unwrap_or_else(|| to_display_string(thrown, ctx))
}

fn to_display_string(value: &JsValue, ctx: &mut Context) -> String {
    match value.to_string(ctx) {
        Ok(s) => s.to_std_string_escaped(),
        Err(_) => value.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::Source;

    fn thrown(script: &str, ctx: &mut Context) -> JsValue {
        let error = ctx.eval(Source::from_bytes(script)).unwrap_err();
        error.to_opaque(ctx)
    }

    #[test]
    fn test_error_objects_report_message() {
        let mut ctx = Context::default();
        let value = thrown("throw new Error('boom')", &mut ctx);
        assert_eq!(message_of(&value, &mut ctx), "boom");
    }

    #[test]
    fn test_thrown_primitives_report_string_form() {
        let mut ctx = Context::default();
        let value = thrown("throw 'boom'", &mut ctx);
        assert_eq!(message_of(&value, &mut ctx), "boom");

        let value = thrown("throw 42", &mut ctx);
        assert_eq!(message_of(&value, &mut ctx), "42");
    }

    #[test]
    fn test_engine_errors_report_message() {
        let mut ctx = Context::default();
        let value = thrown("undefined.render()", &mut ctx);
        assert!(!message_of(&value, &mut ctx).is_empty());
        assert!(!is_module_not_found(&value, &mut ctx));
    }

    #[test]
    fn test_module_not_found_is_tagged() {
        let mut ctx = Context::default();
        let error = module_not_found("./missing", "/app/bundle.js", &mut ctx);
        let value = error.to_opaque(&mut ctx);

        assert!(is_module_not_found(&value, &mut ctx));
        assert_eq!(
            message_of(&value, &mut ctx),
            "Cannot find module './missing' from '/app/bundle.js'"
        );
    }
}
