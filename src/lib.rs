pub mod cli;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod lifecycle;
pub mod process;
pub mod project;
pub mod prompt;
pub mod resources;

pub use error::{Error, ExecutionError, Result};
