//! The task environment
//!
//! A mutable, stack-scoped variable store. Entering a task or an included
//! file pushes a full snapshot of the current mapping; leaving pops it, so
//! mutations inside a nested scope never leak to the enclosing scope.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

use crate::env::value::{Assignment, Value, Vars};
use crate::error::{ScriptError, ScriptResult};

/// A registered value transformation, applied by `$(name|filter)`
/// placeholders.
pub type Filter = Box<dyn Fn(Value) -> Value>;

/// Diagnostic topics enabled with `-v/--verbose`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VerboseTopic {
    /// Announce files as they are entered and left.
    Load,
    /// Echo commands even when quiet.
    Run,
    /// Show current values in variable help.
    Var,
    /// Show the full origin trace on errors.
    Error,
}

impl FromStr for VerboseTopic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "load" => Ok(VerboseTopic::Load),
            "run" => Ok(VerboseTopic::Run),
            "var" => Ok(VerboseTopic::Var),
            "error" => Ok(VerboseTopic::Error),
            _ => Err(format!("unknown verbose topic: {}", s)),
        }
    }
}

/// True for names the command line is not allowed to set.
///
/// Names starting or ending with `_` are reserved for runner configuration
/// (`_SHELL_`, `_TOP_`, ...).
pub fn is_reserved(name: &str) -> bool {
    name.starts_with('_') || name.ends_with('_')
}

/// A task environment: variables, scope stack, filters, and output.
pub struct Environment {
    variables: BTreeMap<String, Value>,
    /// Names whose current value came from a `Default` assignment.
    defaulted: BTreeSet<String>,
    descriptions: BTreeMap<String, String>,
    scopes: Vec<(BTreeMap<String, Value>, BTreeSet<String>)>,
    filters: HashMap<String, Filter>,
    verbose: BTreeSet<VerboseTopic>,
}

impl Environment {
    /// Create an environment with the built-in filters registered.
    pub fn new() -> Self {
        let mut env = Environment {
            variables: BTreeMap::new(),
            defaulted: BTreeSet::new(),
            descriptions: BTreeMap::new(),
            scopes: Vec::new(),
            filters: HashMap::new(),
            verbose: BTreeSet::new(),
        };
        register_builtin_filters(&mut env);
        env
    }

    /// Get a variable value.
    pub fn get(&self, name: &str) -> ScriptResult<&Value> {
        self.variables
            .get(name)
            .ok_or_else(|| ScriptError::VariableNotFound(name.to_string()))
    }

    /// Test for a variable.
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Apply one assignment. All special-form semantics live here.
    pub fn set(&mut self, name: &str, op: Assignment) {
        match op {
            Assignment::Plain(value) => {
                self.variables.insert(name.to_string(), value);
                self.defaulted.remove(name);
            }
            Assignment::Default(value) => {
                // Only set if unset or if the current value was itself a
                // default, so a plain assignment always wins.
                if !self.variables.contains_key(name) || self.defaulted.contains(name) {
                    self.variables.insert(name.to_string(), value);
                    self.defaulted.insert(name.to_string());
                }
            }
            Assignment::Delete => {
                self.variables.remove(name);
                self.defaulted.remove(name);
            }
            Assignment::NoChange => {}
            Assignment::Described(desc, inner) => {
                self.descriptions.insert(name.to_string(), desc);
                self.set(name, *inner);
            }
        }
    }

    /// Apply assignments first to last, preserving special-form rules.
    pub fn update(&mut self, vars: &Vars) {
        for (name, op) in vars {
            self.set(name, op.clone());
        }
    }

    /// The command line's entry point for `NAME=VALUE` assignments.
    /// Reserved names are rejected.
    pub fn set_external(&mut self, name: &str, value: Value) -> ScriptResult<()> {
        if is_reserved(name) {
            return Err(ScriptError::ReservedName(name.to_string()));
        }
        self.set(name, Assignment::Plain(value));
        Ok(())
    }

    /// Snapshot the current variables, entering a new scope.
    pub fn push(&mut self) {
        self.scopes
            .push((self.variables.clone(), self.defaulted.clone()));
    }

    /// Restore the most recently pushed snapshot.
    ///
    /// Panics if no scope is active: an unmatched pop is a programming
    /// error, not a recoverable condition.
    pub fn pop(&mut self) {
        let (variables, defaulted) = self
            .scopes
            .pop()
            .expect("environment scope stack underflow");
        self.variables = variables;
        self.defaulted = defaulted;
    }

    /// Current scope nesting depth.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Run `f` inside a new scope. The scope is popped on every exit path,
    /// including errors and unwinding.
    pub fn scoped<T, E>(
        &mut self,
        f: impl FnOnce(&mut Environment) -> Result<T, E>,
    ) -> Result<T, E> {
        struct Guard<'a>(&'a mut Environment);

        impl Drop for Guard<'_> {
            fn drop(&mut self) {
                self.0.pop();
            }
        }

        self.push();
        let mut guard = Guard(self);
        f(&mut *guard.0)
    }

    /// Register a named filter. Filters are set up during loading and
    /// treated as read-only afterwards.
    pub fn register_filter(
        &mut self,
        name: &str,
        filter: impl Fn(Value) -> Value + 'static,
    ) -> ScriptResult<()> {
        if self.filters.contains_key(name) {
            return Err(ScriptError::DuplicateFilter(name.to_string()));
        }
        self.filters.insert(name.to_string(), Box::new(filter));
        Ok(())
    }

    /// Apply a registered filter to a value.
    pub fn call_filter(&self, name: &str, value: Value) -> ScriptResult<Value> {
        let filter = self
            .filters
            .get(name)
            .ok_or_else(|| ScriptError::FilterNotFound(name.to_string()))?;
        Ok(filter(value))
    }

    /// Help string attached to a variable, if any.
    pub fn description(&self, name: &str) -> Option<&str> {
        self.descriptions.get(name).map(String::as_str)
    }

    /// All described variables, sorted by name.
    pub fn descriptions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.descriptions
            .iter()
            .map(|(name, desc)| (name.as_str(), desc.as_str()))
    }

    /// Enable a set of verbose topics.
    pub fn set_verbose(&mut self, topics: impl IntoIterator<Item = VerboseTopic>) {
        self.verbose = topics.into_iter().collect();
    }

    pub fn is_verbose(&self, topic: VerboseTopic) -> bool {
        self.verbose.contains(&topic)
    }

    /// Informational output line (command echo, task messages).
    pub fn info(&self, message: &str) {
        println!("{}", message);
    }

    /// Diagnostic output line.
    pub fn error(&self, message: &str) {
        eprintln!("{}", message);
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// POSIX single-quote shell quoting.
fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "'\\''"))
}

fn register_builtin_filters(env: &mut Environment) {
    let builtins: &[(&str, fn(String) -> String)] = &[
        ("upper", |s| s.to_uppercase()),
        ("lower", |s| s.to_lowercase()),
        ("trim", |s| s.trim().to_string()),
        ("quote", |s| shell_quote(&s)),
    ];
    for (name, f) in builtins {
        let f = *f;
        // Built-in names are distinct string literals; registration cannot
        // collide.
        let _ = env.register_filter(name, move |value| Value::Str(f(value.render())));
    }
}
