//! Integration tests for task execution
//!
//! These load real task files and run real shell commands, using files in
//! a temporary directory to observe execution order and variable state.

mod common;

use std::fs;

use common::write_taskfile;
use taskrun::config::loader::load_file;
use taskrun::env::{Assignment, Environment, Vars};
use taskrun::error::{ScriptError, TaskrunError};
use taskrun::runner::Registry;
use tempfile::TempDir;

fn load(dir: &TempDir, content: &str) -> (Environment, Registry) {
    let path = write_taskfile(dir, content);
    let mut env = Environment::new();
    let mut registry = Registry::new();
    load_file(&path, &mut env, &mut registry).unwrap();
    (env, registry)
}

#[test]
fn test_task_runs_with_substitution() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out.txt");
    let yaml = format!(
        r#"
vars:
  NAME: World
tasks:
  greet:
    run:
      - run: printf '%s' "Hello, $(NAME)!" > {out}
        quiet: true
"#,
        out = out.display()
    );

    let (mut env, registry) = load(&dir, &yaml);
    registry.invoke("greet", &Vars::new(), &mut env).unwrap();

    assert_eq!(fs::read_to_string(&out).unwrap(), "Hello, World!");
}

#[test]
fn test_caller_vars_override_task_defaults() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out.txt");
    let yaml = format!(
        r#"
tasks:
  greet:
    vars:
      NAME: default
    run:
      - run: printf '%s' "$(NAME)" > {out}
        quiet: true
"#,
        out = out.display()
    );

    let (mut env, registry) = load(&dir, &yaml);
    let extra: Vars = vec![("NAME".to_string(), Assignment::plain("Rust"))];
    registry.invoke("greet", &extra, &mut env).unwrap();

    assert_eq!(fs::read_to_string(&out).unwrap(), "Rust");
}

#[test]
fn test_dependencies_run_in_order() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("log.txt");
    let yaml = format!(
        r#"
tasks:
  b:
    run:
      - run: echo b >> {log}
        quiet: true
  c:
    run:
      - run: echo c >> {log}
        quiet: true
  a:
    depends: [b, c]
    run:
      - run: echo a >> {log}
        quiet: true
"#,
        log = log.display()
    );

    let (mut env, registry) = load(&dir, &yaml);
    registry.invoke("a", &Vars::new(), &mut env).unwrap();

    assert_eq!(fs::read_to_string(&log).unwrap(), "b\nc\na\n");
}

#[test]
fn test_diamond_dependency_runs_shared_task_per_edge() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("log.txt");
    let yaml = format!(
        r#"
tasks:
  d:
    run:
      - run: echo d >> {log}
        quiet: true
  b:
    depends: d
    run:
      - run: echo b >> {log}
        quiet: true
  c:
    depends: d
    run:
      - run: echo c >> {log}
        quiet: true
  a:
    depends: [b, c]
    run:
      - run: echo a >> {log}
        quiet: true
"#,
        log = log.display()
    );

    let (mut env, registry) = load(&dir, &yaml);
    registry.invoke("a", &Vars::new(), &mut env).unwrap();

    // d is not a once task, so it runs under both b and c.
    assert_eq!(fs::read_to_string(&log).unwrap(), "d\nb\nd\nc\na\n");
}

#[test]
fn test_once_task_uses_first_invocation_vars() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("log.txt");
    let yaml = format!(
        r#"
tasks:
  stamp:
    once: true
    run:
      - run: echo $(WHO) >> {log}
        quiet: true
"#,
        log = log.display()
    );

    let (mut env, registry) = load(&dir, &yaml);
    let first: Vars = vec![("WHO".to_string(), Assignment::plain("first"))];
    let second: Vars = vec![("WHO".to_string(), Assignment::plain("second"))];
    registry.invoke("stamp", &first, &mut env).unwrap();
    registry.invoke("stamp", &second, &mut env).unwrap();

    assert_eq!(fs::read_to_string(&log).unwrap(), "first\n");
}

#[test]
fn test_capture_into_variable_with_filter() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out.txt");
    let yaml = format!(
        r#"
tasks:
  cap:
    run:
      - run: echo hi
        quiet: true
        into: CAPTURED
      - run: printf '%s' "$(CAPTURED|trim|upper)" > {out}
        quiet: true
"#,
        out = out.display()
    );

    let (mut env, registry) = load(&dir, &yaml);
    registry.invoke("cap", &Vars::new(), &mut env).unwrap();

    assert_eq!(fs::read_to_string(&out).unwrap(), "HI");
}

#[test]
fn test_call_action_invokes_other_task() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("log.txt");
    let yaml = format!(
        r#"
tasks:
  inner:
    run:
      - run: echo inner with $(EXTRA) >> {log}
        quiet: true
  outer:
    run:
      - call: inner
        vars:
          EXTRA: payload
"#,
        log = log.display()
    );

    let (mut env, registry) = load(&dir, &yaml);
    registry.invoke("outer", &Vars::new(), &mut env).unwrap();

    assert_eq!(
        fs::read_to_string(&log).unwrap(),
        "inner with payload\n"
    );
}

#[test]
fn test_failing_command_propagates_and_unwinds() {
    let dir = TempDir::new().unwrap();
    let yaml = r#"
tasks:
  broken:
    vars:
      SCOPED: value
    run:
      - run: exit 3
        quiet: true
"#;

    let (mut env, registry) = load(&dir, yaml);
    let result = registry.invoke("broken", &Vars::new(), &mut env);

    assert!(matches!(
        result,
        Err(TaskrunError::Script(ScriptError::Command { code: 3, .. }))
    ));
    // The task scope unwound with the error.
    assert_eq!(env.depth(), 0);
    assert!(!env.contains("SCOPED"));
}

#[test]
fn test_acceptable_codes_do_not_fail() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("log.txt");
    let yaml = format!(
        r#"
tasks:
  tolerant:
    run:
      - run: exit 1
        quiet: true
        accept: [0, 1]
      - run: echo survived >> {log}
        quiet: true
"#,
        log = log.display()
    );

    let (mut env, registry) = load(&dir, &yaml);
    registry.invoke("tolerant", &Vars::new(), &mut env).unwrap();

    assert_eq!(fs::read_to_string(&log).unwrap(), "survived\n");
}

#[test]
fn test_unknown_dependency_fails() {
    let dir = TempDir::new().unwrap();
    let yaml = r#"
tasks:
  top:
    depends: missing
    run: 'true'
"#;

    let (mut env, registry) = load(&dir, yaml);
    let result = registry.invoke("top", &Vars::new(), &mut env);
    assert!(matches!(
        result,
        Err(TaskrunError::Script(ScriptError::UnknownTask(name))) if name == "missing"
    ));
}

#[test]
fn test_set_action_visible_to_later_commands() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out.txt");
    let yaml = format!(
        r#"
tasks:
  staged:
    run:
      - set:
          STAGE: prepared
      - run: printf '%s' "$(STAGE)" > {out}
        quiet: true
"#,
        out = out.display()
    );

    let (mut env, registry) = load(&dir, &yaml);
    registry.invoke("staged", &Vars::new(), &mut env).unwrap();

    assert_eq!(fs::read_to_string(&out).unwrap(), "prepared");
    // The assignment happened inside the task scope only.
    assert!(!env.contains("STAGE"));
}
