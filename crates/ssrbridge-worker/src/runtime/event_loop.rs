//! Timers and promise settlement
//!
//! Boa drains promise jobs on demand but has no notion of timers, so
//! `setTimeout` callbacks are kept in a [`TimerQueue`] owned by the runtime.
//! [`settle`] drives a value returned from `render` to completion: it runs
//! promise jobs, and while the promise is still pending it sleeps until the
//! next timer is due and fires it.
//!
//! A promise that is pending with no timers left can never settle. The
//! future returned by [`settle`] then stays pending forever; callers that
//! need an upper bound apply their own timeout.

use std::time::Duration;

use boa_engine::{builtins::promise::PromiseState, object::JsObject, Context, JsError, JsResult, JsValue};
use boa_gc::{Finalize, Gc, GcRefCell, Trace};
use tokio::time::Instant;

/// Timer queue shared between the runtime and the `setTimeout` globals.
pub type SharedTimers = Gc<GcRefCell<TimerQueue<TimerCallback>>>;

/// A pending `setTimeout` callback.
#[derive(Debug, Trace, Finalize)]
pub struct Timer<C> {
    pub id: u32,
    #[unsafe_ignore_trace]
    pub deadline: Instant,
    pub callback: C,
}

/// Timers ordered by deadline, with ties fired in scheduling order.
#[derive(Debug, Trace, Finalize)]
pub struct TimerQueue<C> {
    next_id: u32,
    timers: Vec<Timer<C>>,
}

impl<C> Default for TimerQueue<C> {
    fn default() -> Self {
        Self {
            next_id: 1,
            timers: Vec::new(),
        }
    }
}

impl<C> TimerQueue<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `callback` to run once `delay` has elapsed and return its id.
    pub fn schedule(&mut self, delay: Duration, callback: C) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.timers.push(Timer {
            id,
            deadline: Instant::now() + delay,
            callback,
        });
        id
    }

    /// Cancel a timer. Unknown ids are ignored.
    pub fn cancel(&mut self, id: u32) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.id != id);
        self.timers.len() != before
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|timer| timer.deadline).min()
    }

    /// Remove and return the earliest timer due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<Timer<C>> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, timer)| timer.deadline <= now)
            .min_by_key(|(index, timer)| (timer.deadline, *index))
            .map(|(index, _)| index)?;
        Some(self.timers.remove(index))
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Drop every pending timer, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let dropped = self.timers.len();
        self.timers.clear();
        dropped
    }
}

/// A JavaScript function scheduled with `setTimeout`, plus its extra arguments.
#[derive(Debug, Trace, Finalize)]
pub struct TimerCallback {
    pub function: JsObject,
    pub args: Vec<JsValue>,
}

/// Drive `value` to completion.
///
/// Non-promise values are returned as they are. A fulfilled promise yields
/// its value; a rejected one yields its reason as the error.
pub async fn settle(
    context: &mut Context,
    timers: &GcRefCell<TimerQueue<TimerCallback>>,
    value: JsValue,
) -> JsResult<JsValue> {
    let Some(promise) = value.as_promise() else {
        return Ok(value);
    };

    loop {
        context.run_jobs()?;

        match promise.state() {
            PromiseState::Fulfilled(value) => return Ok(value),
            PromiseState::Rejected(reason) => return Err(JsError::from_opaque(reason)),
            PromiseState::Pending => {}
        }

        let deadline = timers.borrow().next_deadline();
        match deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                run_due_timers(context, timers);
            }
            None => {
                tracing::warn!("render() returned a promise that can never settle: nothing is scheduled");
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Fire every timer that is due, draining promise jobs after each one.
///
/// Errors thrown by a callback are logged and do not stop the render, as
/// with an uncaught exception in a browser timer.
fn run_due_timers(context: &mut Context, timers: &GcRefCell<TimerQueue<TimerCallback>>) {
    loop {
        let timer = timers.borrow_mut().pop_due(Instant::now());
        let Some(timer) = timer else {
            break;
        };

        let callback = &timer.callback;
        if let Err(e) = callback
            .function
            .call(&JsValue::undefined(), &callback.args, context)
        {
            tracing::error!(timer = timer.id, "Uncaught error in timer callback: {}", e);
        }
        if let Err(e) = context.run_jobs() {
            tracing::error!("Uncaught error while running jobs: {}", e);
        }
    }
}
