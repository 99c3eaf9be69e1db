use std::path::{Path, PathBuf};

use crate::error::Result;

/// Anything that can execute an [`Invocation`].
///
/// The orchestrator only ever talks to tools through this trait so the whole
/// lifecycle can be driven by [`super::ScriptedRunner`] in tests and dry runs.
pub trait CommandRunner: Send + Sync {
    fn invoke(&self, invocation: &Invocation) -> Result<ProcessResult>;
}

/// Describes one external command. Built once, then handed to a runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
    input: Option<String>,
    echo_command: bool,
    echo_output: bool,
    check: bool,
    prefix: Option<String>,
    isolated: bool,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            env: Vec::new(),
            input: None,
            echo_command: false,
            echo_output: false,
            check: true,
            prefix: None,
            isolated: false,
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Payload written to the child's stdin, which is closed afterwards.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn echo_command(mut self, on: bool) -> Self {
        self.echo_command = on;
        self
    }

    pub fn echo_output(mut self, on: bool) -> Self {
        self.echo_output = on;
        self
    }

    /// Resolve with the result instead of failing on a nonzero exit.
    pub fn allow_failure(mut self) -> Self {
        self.check = false;
        self
    }

    /// Label prepended to each echoed output line.
    pub fn prefix(mut self, label: impl Into<String>) -> Self {
        self.prefix = Some(label.into());
        self
    }

    /// Keep terminal interrupts away from the child (own process group on
    /// unix). The interrupt controller is then solely responsible for it.
    pub fn isolated(mut self) -> Self {
        self.isolated = true;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn env_vars(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    pub fn echoes_command(&self) -> bool {
        self.echo_command
    }

    pub fn echoes_output(&self) -> bool {
        self.echo_output
    }

    pub fn checks_exit(&self) -> bool {
        self.check
    }

    pub fn output_prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn is_isolated(&self) -> bool {
        self.isolated
    }

    /// `true` when `flag` appears verbatim in the argument list.
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Shell-quoted command line, for display only. Never executed by a shell.
    pub fn display(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

/// Outcome of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResult {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}
