use std::sync::Mutex;

use crate::error::{ExecutionError, Result};

use super::types::{CommandRunner, Invocation, ProcessResult};

type Responder = Box<dyn Fn(&Invocation) -> ProcessResult + Send + Sync>;

struct Rule {
    program: String,
    prefix: Vec<String>,
    respond: Responder,
}

impl Rule {
    fn matches(&self, inv: &Invocation) -> bool {
        inv.program() == self.program
            && inv.args().len() >= self.prefix.len()
            && inv.args().iter().zip(&self.prefix).all(|(a, p)| a == p)
    }
}

/// A [`CommandRunner`] that never spawns anything.
///
/// Every invocation is recorded. Replies are matched on program name plus a
/// leading run of arguments; the first matching rule wins and unmatched
/// invocations succeed with empty output. `--dry-run` uses it with printing
/// enabled so users can see what would be executed.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<Invocation>>,
    print: bool,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print each command line (and any stdin payload) instead of running it.
    pub fn dry_run() -> Self {
        Self {
            print: true,
            ..Self::default()
        }
    }

    /// Succeed with `stdout` for `program args_prefix...`.
    pub fn respond(self, program: &str, args_prefix: &[&str], stdout: &str) -> Self {
        let stdout = stdout.to_string();
        self.respond_with(program, args_prefix, move |_| ProcessResult {
            code: Some(0),
            stdout: stdout.clone(),
            stderr: String::new(),
        })
    }

    /// Exit with `code` and `stderr` for `program args_prefix...`.
    pub fn fail(self, program: &str, args_prefix: &[&str], code: i32, stderr: &str) -> Self {
        let stderr = stderr.to_string();
        self.respond_with(program, args_prefix, move |_| ProcessResult {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.clone(),
        })
    }

    pub fn respond_with<F>(mut self, program: &str, args_prefix: &[&str], respond: F) -> Self
    where
        F: Fn(&Invocation) -> ProcessResult + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            program: program.to_string(),
            prefix: args_prefix.iter().map(|s| s.to_string()).collect(),
            respond: Box::new(respond),
        });
        self
    }

    /// Every invocation seen so far, in call order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Invocations of `program` whose arguments start with `args_prefix`.
    pub fn calls_to(&self, program: &str, args_prefix: &[&str]) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|inv| {
                inv.program() == program
                    && inv.args().len() >= args_prefix.len()
                    && inv.args().iter().zip(args_prefix).all(|(a, p)| a == p)
            })
            .collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn invoke(&self, inv: &Invocation) -> Result<ProcessResult> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(inv.clone());
        }

        if self.print {
            println!("{}", inv.display());
            if let Some(input) = inv.input() {
                for line in input.lines() {
                    println!("  | {line}");
                }
            }
        }

        let result = self
            .rules
            .iter()
            .find(|rule| rule.matches(inv))
            .map(|rule| (rule.respond)(inv))
            .unwrap_or(ProcessResult {
                code: Some(0),
                ..ProcessResult::default()
            });

        if inv.checks_exit() && !result.success() {
            return Err(ExecutionError {
                command: inv.display(),
                code: result.code,
                stdout: result.stdout,
                stderr: result.stderr,
                echoed: inv.echoes_output(),
            }
            .into());
        }
        Ok(result)
    }
}
