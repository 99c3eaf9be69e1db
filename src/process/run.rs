use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::thread;

use crossterm::style::Stylize;

use crate::error::{Error, ExecutionError, Result};

use super::types::{CommandRunner, Invocation, ProcessResult};

/// Executes invocations as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn invoke(&self, invocation: &Invocation) -> Result<ProcessResult> {
        run(invocation)
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Spawn the command, feed its stdin, drain both output streams and wait.
///
/// stdout and stderr are read on their own threads so a chatty stderr can
/// never stall a child that is blocked writing stdout (or the other way
/// round). The stdin payload is written from a third thread for the same
/// reason.
pub fn run(inv: &Invocation) -> Result<ProcessResult> {
    let command_line = inv.display();
    if inv.echoes_command() {
        eprintln!("{} {}", ">".dark_grey(), command_line);
    }
    tracing::debug!(command = %command_line, "spawning");

    let mut command = Command::new(inv.program());
    command
        .args(inv.args())
        .stdin(if inv.input().is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = inv.cwd() {
        command.current_dir(dir);
    }
    for (key, value) in inv.env_vars() {
        command.env(key, value);
    }
    if inv.is_isolated() {
        isolate(&mut command);
    }

    let mut child = command.spawn().map_err(|source| Error::Spawn {
        program: inv.program().to_string(),
        source,
    })?;

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout, stderr) = thread::scope(|scope| {
        if let (Some(mut pipe), Some(payload)) = (stdin, inv.input()) {
            scope.spawn(move || {
                // The child may exit before consuming everything.
                if let Err(e) = pipe.write_all(payload.as_bytes()) {
                    tracing::debug!("stdin closed early: {e}");
                }
                // `pipe` drops here, which signals end-of-input.
            });
        }
        let out = scope.spawn(move || drain(stdout, inv, Stream::Stdout));
        let err = scope.spawn(move || drain(stderr, inv, Stream::Stderr));
        (
            out.join().unwrap_or_default(),
            err.join().unwrap_or_default(),
        )
    });

    let status = child.wait()?;
    let code = status.code();
    tracing::trace!(command = %command_line, ?code, "exited");

    if inv.checks_exit() && !status.success() {
        return Err(ExecutionError {
            command: command_line,
            code,
            stdout,
            stderr,
            echoed: inv.echoes_output(),
        }
        .into());
    }

    Ok(ProcessResult {
        code,
        stdout,
        stderr,
    })
}

fn drain<R: Read>(pipe: Option<R>, inv: &Invocation, stream: Stream) -> String {
    let Some(pipe) = pipe else {
        return String::new();
    };

    let mut reader = BufReader::new(pipe);
    let mut buf = String::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                buf.push_str(&text);
                if inv.echoes_output() {
                    echo(&text, inv.output_prefix(), stream);
                }
            }
        }
    }
    buf
}

fn echo(text: &str, prefix: Option<&str>, stream: Stream) {
    let text = text.trim_end_matches(['\r', '\n']);
    let line = match prefix {
        Some(label) => format!("{} {text}", format!("[{label}]").cyan()),
        None => text.to_string(),
    };
    // Terminal gone: nothing useful left to do with the line.
    let _ = match stream {
        Stream::Stdout => writeln!(io::stdout().lock(), "{line}"),
        Stream::Stderr => writeln!(io::stderr().lock(), "{line}"),
    };
}

#[cfg(unix)]
fn isolate(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_command: &mut Command) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh", ["-c", script])
    }

    #[test]
    fn captures_stdout_and_stderr_separately() {
        let result = run(&sh("echo out; echo err >&2")).unwrap();
        assert_eq!(result.code, Some(0));
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
    }

    #[test]
    fn stdin_payload_is_delivered_and_closed() {
        let inv = Invocation::new("cat", Vec::<String>::new()).stdin("FROM alpine\nRUN true\n");
        let result = run(&inv).unwrap();
        assert_eq!(result.stdout, "FROM alpine\nRUN true\n");
    }

    #[test]
    fn nonzero_exit_fails_with_captured_output() {
        let err = run(&sh("echo partial; echo broken >&2; exit 3")).unwrap_err();
        let exec = err.execution().expect("execution error");
        assert_eq!(exec.code, Some(3));
        assert_eq!(exec.stdout, "partial\n");
        assert_eq!(exec.stderr, "broken\n");
        assert!(exec.command.starts_with("sh -c"));
    }

    #[test]
    fn allow_failure_resolves_with_code() {
        let result = run(&sh("exit 7").allow_failure()).unwrap();
        assert_eq!(result.code, Some(7));
        assert!(!result.success());
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let inv = Invocation::new("berth-definitely-not-installed", ["--version"]);
        match run(&inv) {
            Err(Error::Spawn { program, .. }) => {
                assert_eq!(program, "berth-definitely-not-installed")
            }
            other => panic!("expected spawn error, got {other:?}"),
        }
    }

    #[test]
    fn working_directory_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(&Invocation::new("pwd", Vec::<String>::new()).current_dir(dir.path())).unwrap();
        let reported = std::fs::canonicalize(result.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn environment_overrides_reach_the_child() {
        let result = run(&sh("printf %s \"$BERTH_TEST_VALUE\"").env("BERTH_TEST_VALUE", "42")).unwrap();
        assert_eq!(result.stdout, "42");
    }

    #[test]
    fn echoed_output_is_still_accumulated() {
        let result = run(&sh("echo one; echo two").echo_output(true).prefix("pod-a")).unwrap();
        assert_eq!(result.stdout, "one\ntwo\n");
    }

    #[test]
    fn signal_killed_child_has_no_code() {
        let result = run(&sh("kill -9 $$").allow_failure()).unwrap();
        assert_eq!(result.code, None);
    }
}
