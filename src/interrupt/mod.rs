// Cooperative cancellation: a LIFO stack of cleanup handlers driven by Ctrl-C.

mod controller;
mod signal;

pub use controller::{HandlerGuard, InterruptController, InterruptHandler, InterruptOutcome};
