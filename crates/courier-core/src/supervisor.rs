//! Supervised execution of handler work.
//!
//! Each unit of handler work runs in its own task. A panic inside it is turned
//! into a [`TaskFault`] carrying the panic message, its location and a
//! backtrace, instead of tearing down the caller. [`safe_call`] additionally
//! exports the fault report to a [`PasteSink`] and hands the resulting link to
//! a fault callback, so the user sees a reply instead of silence.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, warn};

use crate::error::Result;

/// External text-sharing service used for fault reports.
#[async_trait]
pub trait PasteSink: Send + Sync {
    /// Publishes `text` and returns a link to it.
    async fn publish(&self, text: &str) -> Result<String>;
}

/// Abnormal termination of a supervised task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFault {
    /// Name of the work that failed.
    pub label: String,
    /// Panic payload rendered as text.
    pub message: String,
    /// Panic location and backtrace, when the panic hook captured them.
    pub trace: Option<String>,
}

impl TaskFault {
    /// Full diagnostic text suitable for export.
    pub fn report(&self) -> String {
        let mut report = format!("task: {}\npanic: {}\n", self.label, self.message);
        if let Some(trace) = &self.trace {
            report.push_str(trace);
            report.push('\n');
        }
        report
    }
}

impl std::fmt::Display for TaskFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} panicked: {}", self.label, self.message)
    }
}

thread_local! {
    static LAST_PANIC: RefCell<Option<String>> = const { RefCell::new(None) };
}

static CAPTURE_HOOK: Once = Once::new();

/// Chains a panic hook that records location and backtrace for the current thread.
fn install_capture_hook() {
    CAPTURE_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "unknown location".to_string());
            let trace = format!("at {}\n{}", location, Backtrace::force_capture());
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Runs `work` in its own task and converts a panic into a [`TaskFault`].
pub async fn supervise<F, T>(label: &str, work: F) -> std::result::Result<T, TaskFault>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    install_capture_hook();

    let guarded = async move {
        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(value) => Ok(value),
            Err(payload) => {
                // The hook ran on this thread during the same poll.
                let trace = LAST_PANIC.with(|slot| slot.borrow_mut().take());
                Err((panic_message(payload.as_ref()), trace))
            }
        }
    };

    match tokio::spawn(guarded).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err((message, trace))) => Err(TaskFault {
            label: label.to_string(),
            message,
            trace,
        }),
        Err(join_error) => Err(TaskFault {
            label: label.to_string(),
            message: join_error.to_string(),
            trace: None,
        }),
    }
}

/// Runs `work` under supervision and reports a fault through `sink`.
///
/// `on_fault` is awaited with `"Error: <message>, Stacktrace url: <url>"` only
/// when the report was published. When publishing fails the fault is logged
/// and nothing else happens. Either way the work is abandoned.
pub async fn safe_call<F, C, CF>(label: &str, work: F, sink: &dyn PasteSink, on_fault: C)
where
    F: Future<Output = ()> + Send + 'static,
    C: FnOnce(String) -> CF,
    CF: Future<Output = ()>,
{
    let fault = match supervise(label, work).await {
        Ok(()) => return,
        Err(fault) => fault,
    };

    error!(task = %fault.label, panic = %fault.message, "supervised task panicked");

    match sink.publish(&fault.report()).await {
        Ok(url) => {
            on_fault(format!("Error: {}, Stacktrace url: {}", fault.message, url)).await;
        }
        Err(e) => {
            warn!(task = %fault.label, error = %e, "failed to publish fault report");
        }
    }
}
