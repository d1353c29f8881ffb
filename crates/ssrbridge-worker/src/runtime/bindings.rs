//! Host globals installed into every bundle runtime
//!
//! - `console.{log,info,debug,warn,error}` write through `tracing` under the
//!   `bundle` target, which the worker routes to stderr. Nothing a bundle
//!   logs can reach the response stream.
//! - `setTimeout` / `clearTimeout` schedule callbacks on the runtime's
//!   [`TimerQueue`](super::event_loop::TimerQueue).
//! - `process.env.NODE_ENV` mirrors the worker's cache policy, so bundles
//!   can branch on development versus production builds.

use std::time::Duration;

use boa_engine::{
    js_string,
    native_function::NativeFunction,
    object::ObjectInitializer,
    property::Attribute,
    value::JsValue,
    Context, JsNativeError, JsResult,
};
use serde_json::json;

use super::conversions::json_to_js_value;
use super::event_loop::{SharedTimers, TimerCallback};

/// Install `console`, the timer functions and `process` as globals.
pub(crate) fn install_globals(
    ctx: &mut Context,
    timers: SharedTimers,
    node_env: &str,
) -> JsResult<()> {
    install_console(ctx)?;
    install_timers(ctx, timers)?;
    install_process(ctx, node_env)
}

fn install_console(ctx: &mut Context) -> JsResult<()> {
    let console = ObjectInitializer::new(ctx)
        .function(NativeFunction::from_fn_ptr(console_log), js_string!("log"), 0)
        .function(NativeFunction::from_fn_ptr(console_log), js_string!("info"), 0)
        .function(NativeFunction::from_fn_ptr(console_debug), js_string!("debug"), 0)
        .function(NativeFunction::from_fn_ptr(console_warn), js_string!("warn"), 0)
        .function(NativeFunction::from_fn_ptr(console_error), js_string!("error"), 0)
        .build();

    ctx.register_global_property(js_string!("console"), console, Attribute::all())
}

fn format_args(args: &[JsValue]) -> String {
    args.iter()
        .map(|arg| match arg.as_string() {
            Some(s) => s.to_std_string_escaped(),
            None => arg.display().to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn console_log(_this: &JsValue, args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    tracing::info!(target: "bundle", "[LOG] {}", format_args(args));
    Ok(JsValue::undefined())
}

fn console_debug(_this: &JsValue, args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    tracing::debug!(target: "bundle", "[DEBUG] {}", format_args(args));
    Ok(JsValue::undefined())
}

fn console_warn(_this: &JsValue, args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    tracing::warn!(target: "bundle", "[WARN] {}", format_args(args));
    Ok(JsValue::undefined())
}

fn console_error(_this: &JsValue, args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    tracing::error!(target: "bundle", "[ERROR] {}", format_args(args));
    Ok(JsValue::undefined())
}

fn install_timers(ctx: &mut Context, timers: SharedTimers) -> JsResult<()> {
    let set_timeout = NativeFunction::from_copy_closure_with_captures(
        |_this, args, timers: &SharedTimers, ctx| {
            let function = args
                .first()
                .and_then(JsValue::as_object)
                .filter(|object| object.is_callable())
                .ok_or_else(|| {
                    JsNativeError::typ().with_message("setTimeout callback must be a function")
                })?;

            let delay_ms = match args.get(1) {
                Some(delay) => delay.to_number(ctx)?,
                None => 0.0,
            };
            let delay = timer_delay(delay_ms);
            let args = args.get(2..).unwrap_or_default().to_vec();

            let id = timers
                .borrow_mut()
                .schedule(delay, TimerCallback { function, args });
            Ok(JsValue::new(id))
        },
        timers.clone(),
    );
    ctx.register_global_callable(js_string!("setTimeout"), 2, set_timeout)?;

    let clear_timeout = NativeFunction::from_copy_closure_with_captures(
        |_this, args, timers: &SharedTimers, ctx| {
            if let Some(id) = args.first() {
                let id = id.to_number(ctx)?;
                if (1.0..=f64::from(u32::MAX)).contains(&id) {
                    timers.borrow_mut().cancel(id as u32);
                }
            }
            Ok(JsValue::undefined())
        },
        timers,
    );
    ctx.register_global_callable(js_string!("clearTimeout"), 1, clear_timeout)
}

/// Delays that are negative, not a number or beyond a signed 32-bit
/// millisecond count fall back to the shortest delay, as browsers do.
fn timer_delay(delay_ms: f64) -> Duration {
    if delay_ms.is_finite() && delay_ms > 0.0 && delay_ms <= f64::from(i32::MAX) {
        Duration::from_micros((delay_ms * 1000.0).round() as u64)
    } else {
        Duration::ZERO
    }
}

fn install_process(ctx: &mut Context, node_env: &str) -> JsResult<()> {
    let process = json_to_js_value(json!({ "env": { "NODE_ENV": node_env } }), ctx)
        .map_err(|e| JsNativeError::error().with_message(e.to_string()))?;
    ctx.register_global_property(js_string!("process"), process, Attribute::all())
}
