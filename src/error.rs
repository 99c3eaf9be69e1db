use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A tool invocation that did not exit successfully.
///
/// Carries everything the process produced so callers can surface it without
/// having echoed it live.
#[derive(Debug, Clone, Error)]
#[error("`{command}` {}", describe_exit(*.code))]
pub struct ExecutionError {
    pub command: String,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Output already reached the terminal while the command ran.
    pub echoed: bool,
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {code}"),
        None => "was terminated by a signal".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("failed to invoke `{program}`, is it installed and on PATH?")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("expected at most one {kind} for `{identity}`, found {}: {}", ids.len(), ids.join(", "))]
    ResourceAmbiguity {
        kind: &'static str,
        identity: String,
        ids: Vec<String>,
    },

    #[error("{0}")]
    Configuration(String),

    #[error("`{command}` succeeded but printed no {expected}")]
    UnexpectedOutput {
        command: String,
        expected: &'static str,
    },

    #[error(
        "`{name}` is not set and prompting is disabled in non-interactive mode; \
         add it to .berth/variables.json first"
    )]
    InteractiveInputRequired { name: String },

    #[error("invalid manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to render template {name}")]
    Template {
        name: String,
        #[source]
        source: tera::Error,
    },

    #[error("rendered {what} is not valid YAML: {source}")]
    Yaml {
        what: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// The failed command's output, when this error came from one.
    pub fn execution(&self) -> Option<&ExecutionError> {
        match self {
            Self::Execution(e) => Some(e),
            _ => None,
        }
    }
}
