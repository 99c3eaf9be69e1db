// Subprocess execution: argv invocations, streamed I/O, structured failures.

pub mod run;
pub mod scripted;
pub mod types;

pub use run::SystemRunner;
pub use scripted::ScriptedRunner;
pub use types::{CommandRunner, Invocation, ProcessResult};
