//! Structured task bodies
//!
//! Task files describe bodies as a list of actions; this module holds the
//! runtime action type and its interpreter.

use crate::env::{Assignment, Environment, Value, Vars};
use crate::error::Result;
use crate::runner::exec::{self, CaptureMode, RunOptions};
use crate::runner::registry::Registry;

/// One step of a task body.
#[derive(Debug)]
pub enum Action {
    /// Execute a shell command. With `into`, the captured text is stored
    /// in that variable instead of reaching the terminal.
    Run {
        command: String,
        quiet: Option<bool>,
        capture: CaptureMode,
        into: Option<String>,
        accept: Vec<i32>,
    },

    /// Invoke another task with extra variables.
    Call { task: String, vars: Vars },

    /// Apply assignments to the environment.
    Set { vars: Vars },

    /// Substitute and print a message line.
    Echo { message: String },
}

impl Action {
    /// A plain command action, as written with a bare string in `run:`.
    pub fn command(command: impl Into<String>) -> Action {
        Action::Run {
            command: command.into(),
            quiet: None,
            capture: CaptureMode::NONE,
            into: None,
            accept: vec![0],
        }
    }
}

/// Execute a body's actions in order.
pub fn run_actions(registry: &Registry, actions: &[Action], env: &mut Environment) -> Result<()> {
    for action in actions {
        match action {
            Action::Run {
                command,
                quiet,
                capture,
                into,
                accept,
            } => {
                let mut opts = RunOptions {
                    quiet: *quiet,
                    capture: *capture,
                    accept: accept.clone(),
                    ..Default::default()
                };
                if let Some(name) = into {
                    if opts.capture == CaptureMode::NONE {
                        opts.capture = CaptureMode::STDOUT;
                    }
                    let text = exec::capture(env, command, &opts)?;
                    env.set(name, Assignment::Plain(Value::Str(text)));
                } else {
                    exec::run(env, command, &opts)?;
                }
            }
            Action::Call { task, vars } => {
                registry.invoke(task, vars, env)?;
            }
            Action::Set { vars } => {
                env.update(vars);
            }
            Action::Echo { message } => {
                let line = env.subst_str(message, None)?;
                env.info(&line);
            }
        }
    }
    Ok(())
}
