use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use super::signal;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Cleanup callback run when the user interrupts. Returning `Ok(false)`
/// vetoes termination.
pub type InterruptHandler = Arc<dyn Fn() -> anyhow::Result<bool> + Send + Sync>;

/// Result of walking the handler stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptOutcome {
    /// A handler declined; the process keeps running.
    Suppressed,
    /// Exit with the given status.
    Terminate(i32),
}

/// Stack of interrupt handlers with a lazily attached SIGINT listener.
///
/// The listener is attached by the first push and detached again when the
/// stack drains or [`close`](Self::close) is called, so a finished command
/// never leaves a watcher thread or a custom signal disposition behind.
#[derive(Clone)]
pub struct InterruptController {
    inner: Arc<Inner>,
}

struct Inner {
    handlers: Mutex<Vec<InterruptHandler>>,
    listener: Mutex<Option<Listener>>,
    walking: Mutex<()>,
    os_signals: bool,
}

struct Listener {
    stop: Arc<AtomicBool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InterruptController {
    /// Controller wired to the process's SIGINT.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Controller with the same lifecycle that never touches signal
    /// dispositions. Interrupts are delivered by calling [`dispatch`](Self::dispatch).
    pub fn manual() -> Self {
        Self::build(false)
    }

    fn build(os_signals: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                handlers: Mutex::new(Vec::new()),
                listener: Mutex::new(None),
                walking: Mutex::new(()),
                os_signals,
            }),
        }
    }

    /// Push `handler` on top of the stack, attaching the listener if dormant.
    ///
    /// The returned guard pops the handler when dropped, so the push/pop pair
    /// stays balanced on every exit path of the protected operation.
    pub fn push_handler<F>(&self, handler: F) -> HandlerGuard
    where
        F: Fn() -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.ensure_listening();
        let handler: InterruptHandler = Arc::new(handler);
        lock(&self.inner.handlers).push(Arc::clone(&handler));
        tracing::trace!(depth = self.depth(), "interrupt handler pushed");
        HandlerGuard {
            controller: self.clone(),
            handler: Some(handler),
        }
    }

    /// Remove the most recently pushed handler. Detaches the listener once
    /// the stack is empty.
    pub fn pop_handler(&self) {
        self.pop_checked(None);
    }

    fn pop_checked(&self, expected: Option<&InterruptHandler>) {
        let empty = {
            let mut handlers = lock(&self.inner.handlers);
            let popped = handlers.pop();
            if let (Some(expected), Some(popped)) = (expected, popped.as_ref())
                && !Arc::ptr_eq(expected, popped)
            {
                tracing::warn!("interrupt handlers popped out of order");
            }
            handlers.is_empty()
        };
        tracing::trace!(depth = self.depth(), "interrupt handler popped");
        if empty {
            self.detach();
        }
    }

    /// Forced, idempotent teardown for program shutdown.
    ///
    /// Waits for an interrupt walk that is already running, so a handler
    /// stopping a container is never cut short by the main thread finishing.
    pub fn close(&self) {
        let _walk = lock(&self.inner.walking);
        self.detach();
    }

    pub fn depth(&self) -> usize {
        lock(&self.inner.handlers).len()
    }

    pub fn is_listening(&self) -> bool {
        lock(&self.inner.listener).is_some()
    }

    /// Walk the stack from the newest handler to the oldest.
    ///
    /// The first handler answering `false` stops the walk. A handler error is
    /// reported and turns the outcome into a failing exit.
    pub fn dispatch(&self) -> InterruptOutcome {
        let _walk = lock(&self.inner.walking);
        eprintln!("Shutting down...");

        let handlers: Vec<InterruptHandler> = lock(&self.inner.handlers).clone();
        for (position, handler) in handlers.iter().enumerate().rev() {
            match handler() {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!(position, "shutdown declined by handler");
                    return InterruptOutcome::Suppressed;
                }
                Err(e) => {
                    tracing::error!("Error during shutdown: {e:#}");
                    return InterruptOutcome::Terminate(1);
                }
            }
        }
        InterruptOutcome::Terminate(0)
    }

    fn ensure_listening(&self) {
        let mut listener = lock(&self.inner.listener);
        if listener.is_some() {
            return;
        }

        let stop = Arc::new(AtomicBool::new(false));
        if self.inner.os_signals {
            match signal::install() {
                Ok(()) => {
                    let controller = self.clone();
                    let stop = Arc::clone(&stop);
                    thread::spawn(move || watch(controller, stop));
                }
                Err(e) => tracing::warn!("could not install interrupt handler: {e}"),
            }
        }
        *listener = Some(Listener { stop });
        tracing::debug!("interrupt listener attached");
    }

    fn detach(&self) {
        if let Some(listener) = lock(&self.inner.listener).take() {
            listener.stop.store(true, Ordering::Release);
            if self.inner.os_signals {
                signal::restore();
            }
            tracing::debug!("interrupt listener detached");
        }
    }
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new()
    }
}

fn watch(controller: InterruptController, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Acquire) {
        if signal::take_pending() {
            match controller.dispatch() {
                InterruptOutcome::Terminate(code) => std::process::exit(code),
                InterruptOutcome::Suppressed => {}
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Pops its handler when dropped.
#[must_use = "dropping the guard pops the handler immediately"]
pub struct HandlerGuard {
    controller: InterruptController,
    handler: Option<InterruptHandler>,
}

impl HandlerGuard {
    /// Pop now rather than at end of scope.
    pub fn pop(mut self) {
        if let Some(handler) = self.handler.take() {
            self.controller.pop_checked(Some(&handler));
        }
    }
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            self.controller.pop_checked(Some(&handler));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) + Clone) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        (log, move |name| sink.lock().unwrap().push(name))
    }

    #[test]
    fn listener_attaches_lazily_and_detaches_when_empty() {
        let controller = InterruptController::manual();
        assert!(!controller.is_listening());

        let guard = controller.push_handler(|| Ok(true));
        assert!(controller.is_listening());
        assert_eq!(controller.depth(), 1);

        drop(guard);
        assert!(!controller.is_listening());
        assert_eq!(controller.depth(), 0);
    }

    #[test]
    fn walk_runs_newest_first_and_terminates_cleanly() {
        let controller = InterruptController::manual();
        let (log, record) = recorder();

        let r1 = record.clone();
        let _h1 = controller.push_handler(move || {
            r1("h1");
            Ok(true)
        });
        let r2 = record.clone();
        let _h2 = controller.push_handler(move || {
            r2("h2");
            Ok(true)
        });

        assert_eq!(controller.dispatch(), InterruptOutcome::Terminate(0));
        assert_eq!(*log.lock().unwrap(), vec!["h2", "h1"]);
    }

    #[test]
    fn declining_handler_stops_the_walk() {
        let controller = InterruptController::manual();
        let outer_calls = Arc::new(AtomicUsize::new(0));
        let inner_calls = Arc::new(AtomicUsize::new(0));

        let outer = Arc::clone(&outer_calls);
        let _h1 = controller.push_handler(move || {
            outer.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        });
        let inner = Arc::clone(&inner_calls);
        let _h2 = controller.push_handler(move || {
            inner.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        });

        assert_eq!(controller.dispatch(), InterruptOutcome::Suppressed);
        assert_eq!(inner_calls.load(Ordering::SeqCst), 1);
        assert_eq!(outer_calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.depth(), 2);
    }

    #[test]
    fn failing_handler_forces_nonzero_exit() {
        let controller = InterruptController::manual();
        let _h = controller.push_handler(|| anyhow::bail!("docker stop failed"));
        assert_eq!(controller.dispatch(), InterruptOutcome::Terminate(1));
    }

    #[test]
    fn empty_stack_terminates_cleanly() {
        let controller = InterruptController::manual();
        assert_eq!(controller.dispatch(), InterruptOutcome::Terminate(0));
    }

    #[test]
    fn guard_pops_on_early_return() {
        fn protected(controller: &InterruptController) -> anyhow::Result<()> {
            let _guard = controller.push_handler(|| Ok(true));
            anyhow::bail!("operation failed")
        }

        let controller = InterruptController::manual();
        assert!(protected(&controller).is_err());
        assert_eq!(controller.depth(), 0);
        assert!(!controller.is_listening());
    }

    #[test]
    fn nested_guards_unwind_in_order() {
        let controller = InterruptController::manual();
        let outer = controller.push_handler(|| Ok(true));
        {
            let inner = controller.push_handler(|| Ok(true));
            assert_eq!(controller.depth(), 2);
            inner.pop();
            assert_eq!(controller.depth(), 1);
            assert!(controller.is_listening());
        }
        drop(outer);
        assert_eq!(controller.depth(), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let controller = InterruptController::manual();
        let guard = controller.push_handler(|| Ok(true));
        controller.close();
        controller.close();
        assert!(!controller.is_listening());
        drop(guard);
        assert_eq!(controller.depth(), 0);
    }

    #[test]
    fn clones_share_one_stack() {
        let a = InterruptController::manual();
        let b = a.clone();
        let _guard = a.push_handler(|| Ok(true));
        assert_eq!(b.depth(), 1);
        assert!(b.is_listening());
    }
}
