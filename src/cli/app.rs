//! Main CLI application

use std::env as process_env;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Arg, ArgAction, ArgMatches, Command};
use clap_complete::{generate, Shell};
use colored::Colorize;

use crate::config::loader::{self, TASKFILE_NAMES};
use crate::env::{is_reserved, Assignment, Environment, Value, Vars, VerboseTopic};
use crate::error::{Result, ScriptError, TaskrunError};
use crate::runner::Registry;

/// Directory of the task file, as discovered.
pub const TOP_VAR: &str = "_TOP_";
/// Absolute directory of the task file.
pub const ABSTOP_VAR: &str = "_ABSTOP_";
/// Directory the runner was invoked from.
pub const CWD_VAR: &str = "_CWD_";

/// Tasks to invoke, with their extra variables.
type Invocations = Vec<(String, Vars)>;

/// Run the CLI application.
pub fn run() -> Result<()> {
    let matches = build_command().get_matches();
    execute(&matches)
}

/// Build the clap command.
fn build_command() -> Command {
    Command::new("taskrun")
        .version(crate::VERSION)
        .disable_version_flag(true)
        .about("A simple declarative task runner")
        .arg(
            Arg::new("version")
                .long("version")
                .action(ArgAction::Version)
                .help("Print version"),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Specify an alternative name for the task file"),
        )
        .arg(
            Arg::new("dir")
                .short('d')
                .long("dir")
                .value_name("DIR")
                .help("Specify a starting directory"),
        )
        .arg(
            Arg::new("user")
                .short('u')
                .long("user")
                .action(ArgAction::SetTrue)
                .conflicts_with_all(["dir", "system"])
                .help("Use the user task file directory"),
        )
        .arg(
            Arg::new("system")
                .short('s')
                .long("system")
                .action(ArgAction::SetTrue)
                .conflicts_with("dir")
                .help("Use the system task file directory"),
        )
        .arg(
            Arg::new("walk")
                .short('w')
                .long("walk")
                .action(ArgAction::SetTrue)
                .help("Walk up the directory tree to find the task file"),
        )
        .arg(
            Arg::new("list")
                .short('l')
                .long("list")
                .value_name("PATTERN")
                .num_args(0..=1)
                .default_missing_value("*")
                .help("List tasks, optionally filtered by a glob pattern"),
        )
        .arg(
            Arg::new("var-help")
                .short('V')
                .long("var-help")
                .action(ArgAction::SetTrue)
                .help("Show variable-related help"),
        )
        .arg(
            Arg::new("task-help")
                .short('H')
                .long("task-help")
                .action(ArgAction::SetTrue)
                .help("Show task-related help"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .value_name("TOPIC")
                .action(ArgAction::Append)
                .value_parser(["load", "run", "var", "error"])
                .help("Show verbose information"),
        )
        .arg(
            Arg::new("completions")
                .long("completions")
                .value_name("SHELL")
                .value_parser(clap::value_parser!(Shell))
                .help("Generate shell completions"),
        )
        .arg(
            Arg::new("params")
                .value_name("PARAMS")
                .num_args(0..)
                .help(
                    "Parameters in the form of <task>, <NAME>=<VALUE>, or \
                     <task>:<NAME>=<VALUE>[:<NAME>=<VALUE>...]",
                ),
        )
}

fn execute(matches: &ArgMatches) -> Result<()> {
    if let Some(shell) = matches.get_one::<Shell>("completions").copied() {
        generate(shell, &mut build_command(), "taskrun", &mut io::stdout());
        return Ok(());
    }

    // .env values join the process environment every launched command
    // inherits.
    dotenvy::dotenv().ok();

    let mut env = Environment::new();
    env.set_verbose(
        matches
            .get_many::<String>("verbose")
            .unwrap_or_default()
            .filter_map(|topic| topic.parse::<VerboseTopic>().ok()),
    );

    let params: Vec<String> = matches
        .get_many::<String>("params")
        .unwrap_or_default()
        .cloned()
        .collect();
    let (invocations, top_vars) = parse_params(&params)?;

    let start_dir = search_dir(matches)?;
    let file_names: Vec<&str> = match matches.get_one::<String>("file") {
        Some(name) => vec![name.as_str()],
        None => TASKFILE_NAMES.to_vec(),
    };
    let walk = matches.get_flag("walk");

    if env.is_verbose(VerboseTopic::Load) {
        env.error(&format!(
            "Task file search directory: {}",
            start_dir.display()
        ));
        env.error(&format!("Task file search names: {}", file_names.join(", ")));
        env.error(&format!("Walk parent directories: {}", walk));
    }

    let taskfile = loader::find_taskfile(&start_dir, &file_names, walk)
        .ok_or_else(|| TaskrunError::TaskfileNotFound(file_names.join(", ")))?;

    // Command-line NAME=VALUE variables are set before the file loads.
    for (name, value) in top_vars {
        env.set_external(&name, value)?;
    }

    let top = taskfile.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    env.set(TOP_VAR, Assignment::plain(top.display().to_string()));
    env.set(
        ABSTOP_VAR,
        Assignment::plain(std::path::absolute(&top)?.display().to_string()),
    );
    env.set(
        CWD_VAR,
        Assignment::plain(process_env::current_dir()?.display().to_string()),
    );

    let mut registry = Registry::new();
    loader::load_file(&taskfile, &mut env, &mut registry)
        .map_err(|e| report(&env, e))?;

    if let Some(pattern) = matches.get_one::<String>("list") {
        return list_tasks(&registry, pattern);
    }

    let var_help = matches.get_flag("var-help");
    let task_help = matches.get_flag("task-help");
    if var_help {
        show_var_help(&env);
    }
    if task_help {
        let mut names: Vec<String> = invocations.iter().map(|(name, _)| name.clone()).collect();
        names.sort();
        names.dedup();
        show_task_help(&registry, &env, &names)?;
    }
    if var_help || task_help {
        return Ok(());
    }

    for (task, vars) in &invocations {
        registry
            .invoke(task, vars, &mut env)
            .map_err(|e| report(&env, e))?;
    }

    Ok(())
}

/// Emit the include origin trace when the error verbose topic is on, then
/// hand the error back for the caller to propagate.
fn report(env: &Environment, error: TaskrunError) -> TaskrunError {
    if env.is_verbose(VerboseTopic::Error) {
        let trace = error.origin_trace();
        if !trace.is_empty() {
            env.error("error origin:");
            for path in trace {
                env.error(&format!("  {}", path.display()));
            }
        }
    }
    error
}

/// Resolve the task file search directory from the flags.
fn search_dir(matches: &ArgMatches) -> Result<PathBuf> {
    if let Some(dir) = matches.get_one::<String>("dir") {
        return Ok(PathBuf::from(dir));
    }
    if matches.get_flag("user") {
        let dirs = directories::ProjectDirs::from("", "", "taskrun").ok_or_else(|| {
            TaskrunError::TaskfileNotFound("user task file directory".to_string())
        })?;
        return Ok(dirs.config_dir().to_path_buf());
    }
    if matches.get_flag("system") {
        return Ok(PathBuf::from("/etc/taskrun"));
    }
    Ok(process_env::current_dir()?)
}

/// Split command-line parameters into task invocations and top-level
/// variables. Reserved names are rejected on both paths.
fn parse_params(params: &[String]) -> Result<(Invocations, Vec<(String, Value)>)> {
    let mut invocations = Invocations::new();
    let mut top_vars = Vec::new();

    for param in params {
        if let Some((task, rest)) = param.split_once(':') {
            // task:NAME=VALUE:NAME=VALUE
            let mut vars = Vars::new();
            for piece in rest.split(':') {
                if let Some((name, value)) = piece.split_once('=') {
                    if is_reserved(name) {
                        return Err(ScriptError::ReservedName(name.to_string()).into());
                    }
                    vars.push((name.to_string(), Assignment::plain(value)));
                }
            }
            invocations.push((task.to_string(), vars));
        } else if let Some((name, value)) = param.split_once('=') {
            // NAME=VALUE
            if is_reserved(name) {
                return Err(ScriptError::ReservedName(name.to_string()).into());
            }
            top_vars.push((name.to_string(), Value::from(value)));
        } else {
            // task name
            invocations.push((param.clone(), Vars::new()));
        }
    }

    Ok((invocations, top_vars))
}

/// Print the task list, filtered by a glob pattern. Names starting with
/// an underscore stay hidden.
fn list_tasks(registry: &Registry, pattern: &str) -> Result<()> {
    let matcher = globset::Glob::new(pattern)
        .map_err(|e| TaskrunError::InvalidPattern(e.to_string()))?
        .compile_matcher();

    for name in registry.names() {
        if name.starts_with('_') || !matcher.is_match(name) {
            continue;
        }
        let desc = registry
            .defs(name)
            .and_then(|defs| defs.iter().find_map(|def| def.desc.clone()));
        match desc {
            Some(desc) => println!("{}  {}", name.bold(), desc.dimmed()),
            None => println!("{}", name.bold()),
        }
    }
    Ok(())
}

/// Print help for described variables.
fn show_var_help(env: &Environment) {
    for (name, desc) in env.descriptions() {
        println!("Var: {}", name.bold());
        println!(" Desc: {}", desc);
        if env.is_verbose(VerboseTopic::Var) {
            match env.get(name) {
                Ok(value) => println!(" Current value: {}", value.render()),
                Err(_) => println!(" Currently unset"),
            }
        }
    }
}

/// Print help for the given tasks, or every task when none were named.
fn show_task_help(registry: &Registry, env: &Environment, names: &[String]) -> Result<()> {
    let names: Vec<String> = if names.is_empty() {
        registry.names().into_iter().map(String::from).collect()
    } else {
        names.to_vec()
    };

    for name in &names {
        let defs = registry
            .defs(name)
            .ok_or_else(|| ScriptError::UnknownTask(name.clone()))?;
        println!("Task: {}", name.bold());
        for (entry_num, def) in defs.iter().enumerate() {
            println!(" Entry: {}", entry_num);
            if let Some(desc) = &def.desc {
                println!("  Desc: {}", desc);
            }
            for (var, desc) in &def.var_desc {
                println!("  Var: {}", var);
                println!("   Desc: {}", desc);
                if env.is_verbose(VerboseTopic::Var) {
                    match env.get(var) {
                        Ok(value) => println!("   Current value: {}", value.render()),
                        Err(_) => println!("   Currently unset"),
                    }
                }
            }
        }
    }
    Ok(())
}
