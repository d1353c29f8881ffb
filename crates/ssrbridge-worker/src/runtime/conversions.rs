//! JSON <-> JavaScript value conversions
//!
//! Pages arrive as JSON and are handed to `render` as plain JavaScript
//! objects; the `head` and `body` fields of whatever `render` returns are
//! brought back as JSON before their shape is checked.
//!
//! | JSON    | JavaScript                  |
//! |---------|-----------------------------|
//! | null    | null (and undefined on the way back) |
//! | boolean | Boolean                     |
//! | number  | Number                      |
//! | string  | String                      |
//! | array   | Array                       |
//! | object  | Object (symbol keys skipped) |
//!
//! Functions and symbols found in rendered output become `null`.

use boa_engine::{
    js_string,
    object::{builtins::JsArray, JsObject},
    property::PropertyKey,
    value::JsValue,
    Context,
};
use serde_json::Value as JsonValue;
use ssrbridge_common::RenderError;

/// Convert a JSON value into a fresh JavaScript value.
///
/// # Arguments
///
/// * `json` - The JSON value to convert
/// * `ctx` - The context the new objects and arrays are created in
///
/// # Returns
///
/// A `JsValue` holding the same data. Integers that fit in 32 bits stay
/// integers; other numbers become doubles.
///
/// # Errors
///
/// Returns `RenderError::RenderFailed` when an array element or object
/// property cannot be defined on the new value.
///
/// # Examples
///
/// ```ignore
/// let mut ctx = Context::default();
/// let page = json!({"component": "Home", "props": {"name": "Ada"}});
/// let page = json_to_js_value(page, &mut ctx)?;
/// ```
pub fn json_to_js_value(json: JsonValue, ctx: &mut Context) -> Result<JsValue, RenderError> {
    match json {
        JsonValue::Null => Ok(JsValue::null()),
        JsonValue::Bool(b) => Ok(JsValue::new(b)),
        JsonValue::Number(n) => Ok(n
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(JsValue::new)
            .unwrap_or_else(|| JsValue::new(n.as_f64().unwrap_or(f64::NAN)))),
        JsonValue::String(s) => Ok(JsValue::new(js_string!(s))),
        JsonValue::Array(items) => {
            let array = JsArray::new(ctx);
            for (i, item) in items.into_iter().enumerate() {
                let value = json_to_js_value(item, ctx)?;
                array.push(value, ctx).map_err(|e| {
                    RenderError::render_failed(format!("Failed to push array element {i}: {e}"))
                })?;
            }
            Ok(array.into())
        }
        JsonValue::Object(map) => {
            let object = JsObject::with_object_proto(ctx.intrinsics());
            for (key, value) in map {
                let value = json_to_js_value(value, ctx)?;
                object
                    .create_data_property_or_throw(js_string!(key.clone()), value, ctx)
                    .map_err(|e| {
                        RenderError::render_failed(format!("Failed to set property '{key}': {e}"))
                    })?;
            }
            Ok(object.into())
        }
    }
}

/// Convert a JavaScript value into JSON.
///
/// # Arguments
///
/// * `value` - The value to convert, typically a field of render output
/// * `ctx` - The context used for property and array access
///
/// # Returns
///
/// The equivalent JSON value. `undefined`, functions and symbols become
/// `null`. Non-finite numbers become `null` as well, matching
/// `JSON.stringify`.
///
/// # Errors
///
/// Returns `RenderError::RenderFailed` if reading an array element or
/// property throws, for instance from a getter.
///
/// # Examples
///
/// ```ignore
/// let head = output.get(js_string!("head"), &mut ctx)?;
/// let head = js_value_to_json(head, &mut ctx)?;
/// ```
pub fn js_value_to_json(value: JsValue, ctx: &mut Context) -> Result<JsonValue, RenderError> {
    if value.is_undefined() || value.is_null() {
        return Ok(JsonValue::Null);
    }

    if let Some(b) = value.as_boolean() {
        return Ok(JsonValue::Bool(b));
    }

    if let Some(i) = value.as_i32() {
        return Ok(JsonValue::Number(i.into()));
    }

    if let Some(n) = value.as_number() {
        return Ok(serde_json::Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null));
    }

    if let Some(s) = value.as_string() {
        return Ok(JsonValue::String(s.to_std_string_escaped()));
    }

    let Some(object) = value.as_object() else {
        return Ok(JsonValue::Null);
    };

    if object.is_callable() {
        return Ok(JsonValue::Null);
    }

    if object.is_array() {
        let array = JsArray::from_object(object)
            .map_err(|e| RenderError::render_failed(format!("Object is not a valid array: {e}")))?;
        let length: usize = array
            .length(ctx)
            .map_err(|e| RenderError::render_failed(format!("Failed to get array length: {e}")))?
            .try_into()
            .map_err(|_| RenderError::render_failed("Array length overflow"))?;

        let mut items = Vec::with_capacity(length);
        for i in 0..length {
            let item = array.get(i, ctx).map_err(|e| {
                RenderError::render_failed(format!("Failed to get array element {i}: {e}"))
            })?;
            items.push(js_value_to_json(item, ctx)?);
        }
        return Ok(JsonValue::Array(items));
    }

    let keys = object
        .own_property_keys(ctx)
        .map_err(|e| RenderError::render_failed(format!("Failed to get object keys: {e}")))?;

    let mut map = serde_json::Map::new();
    for key in keys {
        let name = match &key {
            PropertyKey::String(s) => s.to_std_string_escaped(),
            PropertyKey::Index(i) => i.get().to_string(),
            PropertyKey::Symbol(_) => continue,
        };
        let property = object.get(key.clone(), ctx).map_err(|e| {
            RenderError::render_failed(format!("Failed to get property '{name}': {e}"))
        })?;
        map.insert(name, js_value_to_json(property, ctx)?);
    }

    Ok(JsonValue::Object(map))
}
