//! Ambient key/value context attached to error log records.
//!
//! The store is per thread. A binding is created and released within a single
//! synchronous section of the error pipeline, so it never spans an `.await`
//! and cannot leak into another task scheduled on the same worker.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::marker::PhantomData;
use tracing::{error, info, info_span};

use crate::api::middleware::context as request_context;

/// Key under which the resolved response status is bound while logging.
pub const HTTP_STATUS_KEY: &str = "httpStatus";

thread_local! {
    static CONTEXT: RefCell<BTreeMap<String, String>> = const { RefCell::new(BTreeMap::new()) };
}

/// Removes its key from the context when dropped, including during unwinding.
#[must_use = "the binding is removed as soon as the guard is dropped"]
pub struct LogContextGuard {
    key: String,
    previous: Option<String>,
    // Tied to the thread that owns the binding.
    _not_send: PhantomData<*const ()>,
}

pub fn bind(key: impl Into<String>, value: impl Into<String>) -> LogContextGuard {
    let key = key.into();
    let previous = CONTEXT.with(|ctx| ctx.borrow_mut().insert(key.clone(), value.into()));
    LogContextGuard {
        key,
        previous,
        _not_send: PhantomData,
    }
}

pub fn get(key: &str) -> Option<String> {
    CONTEXT.with(|ctx| ctx.borrow().get(key).cloned())
}

pub fn snapshot() -> BTreeMap<String, String> {
    CONTEXT.with(|ctx| ctx.borrow().clone())
}

impl Drop for LogContextGuard {
    fn drop(&mut self) {
        // try_with: the thread-local may already be gone during thread teardown
        let _ = CONTEXT.try_with(|ctx| {
            let mut ctx = ctx.borrow_mut();
            match self.previous.take() {
                Some(previous) => ctx.insert(self.key.clone(), previous),
                None => ctx.remove(&self.key),
            };
        });
    }
}

/// Log severity chosen by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// Destination for error-pipeline log records.
pub trait LogSink: Send + Sync {
    fn emit(&self, severity: Severity, message: &str, cause: Option<&(dyn StdError + 'static)>);
}

/// Writes records through `tracing`, with the ambient context as fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, severity: Severity, message: &str, cause: Option<&(dyn StdError + 'static)>) {
        let context = snapshot();
        let http_status = context.get(HTTP_STATUS_KEY).cloned().unwrap_or_default();
        let request_id = request_context::current()
            .map(|ctx| ctx.request_id)
            .unwrap_or_default();
        let span = info_span!(
            "error_response",
            http_status = %http_status,
            request_id = %request_id
        );
        let _entered = span.enter();

        let cause = cause.map(cause_chain).unwrap_or_default();
        match severity {
            Severity::Info => info!(context = ?context, cause = %cause, "{}", message),
            Severity::Error => error!(context = ?context, cause = %cause, "{}", message),
        }
    }
}

/// `outer: inner: root` rendering of an error and its sources
pub fn cause_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}
