//! Command execution
//!
//! Resolves a command string through the environment, launches it in a
//! shell, captures the requested streams, and classifies the outcome.

use std::io::{self, Read};
use std::ops::BitOr;
use std::process::{Command, Stdio};
use std::str::FromStr;

use crate::env::{Environment, Value, VerboseTopic};
use crate::error::{ScriptError, ScriptResult};

/// Names an explicit shell executable.
pub const SHELL_VAR: &str = "_SHELL_";
/// A map of shell-environment overrides, merged over the process env.
pub const SHELL_ENV_VAR: &str = "_SHELLENV_";
/// Pipe-delimited filter names auto-applied to command placeholders.
pub const SHELL_FILTER_VAR: &str = "_SHELLFILTER_";
/// Truthy to suppress command echo by default.
pub const QUIET_VAR: &str = "_QUIET_";

/// Which streams of the launched process to capture. Bit-flags; `STDOUT`
/// and `STDERR` combine to capture both separately, while `STDERROUT`
/// merges stderr into the stdout stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureMode(u8);

impl CaptureMode {
    pub const NONE: CaptureMode = CaptureMode(0);
    pub const STDOUT: CaptureMode = CaptureMode(1);
    pub const STDERR: CaptureMode = CaptureMode(2);
    pub const STDERROUT: CaptureMode = CaptureMode(4);

    /// True if any flag of `other` is set in `self`.
    pub fn contains(self, other: CaptureMode) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for CaptureMode {
    type Output = CaptureMode;

    fn bitor(self, rhs: CaptureMode) -> CaptureMode {
        CaptureMode(self.0 | rhs.0)
    }
}

impl FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(CaptureMode::NONE),
            "stdout" => Ok(CaptureMode::STDOUT),
            "stderr" => Ok(CaptureMode::STDERR),
            "combined" => Ok(CaptureMode::STDERROUT),
            "both" => Ok(CaptureMode::STDOUT | CaptureMode::STDERR),
            _ => Err(format!(
                "unknown capture mode: {} (expected none, stdout, stderr, combined, or both)",
                s
            )),
        }
    }
}

/// Options for [`run`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Suppress the command echo. `None` defers to the `_QUIET_` variable.
    pub quiet: Option<bool>,
    /// Fail with a command error when the return code is unacceptable.
    pub abort: bool,
    /// Streams to capture.
    pub capture: CaptureMode,
    /// Return codes counted as success.
    pub accept: Vec<i32>,
    /// Apply the `_SHELLFILTER_` auto-filter during substitution.
    pub shell_filter: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            quiet: None,
            abort: true,
            capture: CaptureMode::NONE,
            accept: vec![0],
            shell_filter: true,
        }
    }
}

impl RunOptions {
    /// Options that capture the given streams.
    pub fn captured(capture: CaptureMode) -> Self {
        RunOptions {
            capture,
            ..Default::default()
        }
    }
}

/// The outcome of one command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Captured standard output, if requested.
    pub stdout: Option<String>,
    /// Captured standard error, if requested and not merged.
    pub stderr: Option<String>,
    /// Process return code; -1 when the process was killed by a signal.
    pub code: i32,
    /// Whether the return code was among the acceptable codes.
    pub success: bool,
}

/// Run a command through the shell and return the outcome.
///
/// The command string is substituted first; the resolved line is echoed to
/// the informational stream unless quiet. A return code outside
/// `opts.accept` fails with a command error when `opts.abort` is set, and
/// otherwise yields a result with `success == false`.
pub fn run(env: &Environment, command: &str, opts: &RunOptions) -> ScriptResult<RunResult> {
    let auto = if opts.shell_filter && env.contains(SHELL_FILTER_VAR) {
        Some(env.evaluate(SHELL_FILTER_VAR)?.render())
    } else {
        None
    };
    let command = env.subst_str(command, auto.as_deref())?;

    let quiet = match opts.quiet {
        Some(quiet) => quiet,
        None => env.contains(QUIET_VAR) && env.evaluate(QUIET_VAR)?.truthy(),
    };
    if !quiet || env.is_verbose(VerboseTopic::Run) {
        env.info(&command);
    }

    let (shell, mut cmd) = shell_command(env, &command)?;
    let launch = |source: io::Error| ScriptError::ShellLaunch {
        shell: shell.clone(),
        source,
    };

    if env.contains(SHELL_ENV_VAR) {
        if let Value::Map(overrides) = env.evaluate(SHELL_ENV_VAR)? {
            for (name, value) in overrides {
                cmd.env(name, value.render());
            }
        }
    }

    cmd.stdin(Stdio::inherit());

    // Merge stderr into the stdout stream unless stderr is captured on its
    // own, in which case both streams stay separate.
    let merge =
        opts.capture.contains(CaptureMode::STDERROUT) && !opts.capture.contains(CaptureMode::STDERR);

    let status;
    let stdout_text;
    let stderr_text;

    if merge {
        let (mut reader, writer) = io::pipe().map_err(&launch)?;
        let writer_err = writer.try_clone().map_err(&launch)?;
        cmd.stdout(Stdio::from(writer));
        cmd.stderr(Stdio::from(writer_err));
        let mut child = cmd.spawn().map_err(&launch)?;
        // The command still owns copies of the pipe writer; drop them so
        // the read below reaches EOF when the child exits.
        drop(cmd);
        let mut text = String::new();
        reader.read_to_string(&mut text).map_err(&launch)?;
        status = child.wait().map_err(&launch)?;
        stdout_text = Some(text);
        stderr_text = None;
    } else {
        let capture_out = opts.capture.contains(CaptureMode::STDOUT)
            || opts.capture.contains(CaptureMode::STDERROUT);
        let capture_err = opts.capture.contains(CaptureMode::STDERR);
        cmd.stdout(if capture_out {
            Stdio::piped()
        } else {
            Stdio::inherit()
        });
        cmd.stderr(if capture_err {
            Stdio::piped()
        } else {
            Stdio::inherit()
        });
        let child = cmd.spawn().map_err(&launch)?;
        let output = child.wait_with_output().map_err(&launch)?;
        status = output.status;
        stdout_text = capture_out.then(|| String::from_utf8_lossy(&output.stdout).into_owned());
        stderr_text = capture_err.then(|| String::from_utf8_lossy(&output.stderr).into_owned());
    }

    let code = status.code().unwrap_or(-1);
    let success = opts.accept.contains(&code);
    if !success && opts.abort {
        return Err(ScriptError::Command { command, code });
    }

    Ok(RunResult {
        stdout: stdout_text,
        stderr: stderr_text,
        code,
        success,
    })
}

/// Run a command and return the captured text of the requested stream
/// (stderr when `opts.capture` is exactly `STDERR`, stdout otherwise).
/// Always aborts on an unacceptable return code.
pub fn capture(env: &Environment, command: &str, opts: &RunOptions) -> ScriptResult<String> {
    let mut opts = opts.clone();
    if opts.capture == CaptureMode::NONE {
        opts.capture = CaptureMode::STDOUT;
    }
    opts.abort = true;

    let result = run(env, command, &opts)?;
    let text = if opts.capture == CaptureMode::STDERR {
        result.stderr
    } else {
        result.stdout
    };
    Ok(text.unwrap_or_default())
}

/// Build the shell invocation for a resolved command line.
fn shell_command(env: &Environment, command: &str) -> ScriptResult<(String, Command)> {
    if env.contains(SHELL_VAR) {
        let shell = env.evaluate(SHELL_VAR)?.render();
        let mut cmd = Command::new(&shell);
        cmd.arg("-c").arg(command);
        Ok((shell, cmd))
    } else if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        Ok(("cmd".to_string(), cmd))
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        Ok(("sh".to_string(), cmd))
    }
}
