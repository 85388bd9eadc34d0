//! Task registry and invocation
//!
//! Tasks live in an explicit registry: a mapping from name to an ordered
//! list of definitions. Extending a name appends another definition; all
//! definitions under a name run in registration order on invocation.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::env::{Assignment, Environment, Vars};
use crate::error::{Result, ScriptError};
use crate::runner::action::{run_actions, Action};

/// A programmatic task body. The registry and environment are passed in so
/// bodies can invoke other tasks and read or write variables.
pub type TaskFn = Box<dyn Fn(&Registry, &mut Environment) -> Result<()>>;

/// The work a task performs when invoked.
pub enum TaskBody {
    /// A structured action list, as loaded from a task file.
    Actions(Vec<Action>),
    /// A boxed function, for tasks registered through the library API.
    Func(TaskFn),
}

impl fmt::Debug for TaskBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskBody::Actions(actions) => write!(f, "Actions({})", actions.len()),
            TaskBody::Func(_) => write!(f, "Func"),
        }
    }
}

/// One task definition.
pub struct TaskDef {
    /// Help text shown in task listings.
    pub desc: Option<String>,
    /// Run the body at most once across the process lifetime.
    pub once: bool,
    /// Tasks invoked, in order, before the body; none receive the caller's
    /// extra variables.
    pub depends: Vec<String>,
    /// Default assignments applied before the caller's extras.
    pub vars: Vars,
    /// Help text for individual default variables.
    pub var_desc: BTreeMap<String, String>,
    body: TaskBody,
    /// Set after the first successful execution; per-definition state.
    called: Cell<bool>,
}

impl TaskDef {
    pub fn new(body: TaskBody) -> Self {
        TaskDef {
            desc: None,
            once: false,
            depends: Vec::new(),
            vars: Vars::new(),
            var_desc: BTreeMap::new(),
            body,
            called: Cell::new(false),
        }
    }

    /// A definition with a closure body.
    pub fn from_fn(f: impl Fn(&Registry, &mut Environment) -> Result<()> + 'static) -> Self {
        TaskDef::new(TaskBody::Func(Box::new(f)))
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    pub fn depends(mut self, depends: Vec<String>) -> Self {
        self.depends = depends;
        self
    }

    /// Set the default variables. `Described` assignments are unwrapped
    /// here: the help text goes to the definition, not the environment.
    pub fn vars(mut self, vars: Vars) -> Self {
        self.vars = Vars::new();
        self.var_desc = BTreeMap::new();
        for (name, op) in vars {
            match op {
                Assignment::Described(desc, inner) => {
                    self.var_desc.insert(name.clone(), desc);
                    self.vars.push((name, *inner));
                }
                other => self.vars.push((name, other)),
            }
        }
        self
    }

    /// Whether this definition has already executed.
    pub fn called(&self) -> bool {
        self.called.get()
    }
}

/// The task registry.
#[derive(Default)]
pub struct Registry {
    tasks: HashMap<String, Vec<TaskDef>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            tasks: HashMap::new(),
        }
    }

    /// Register a task definition under a name.
    ///
    /// A second registration for an existing name fails unless `extend` is
    /// set, in which case the definition is appended and runs after the
    /// earlier ones on every invocation.
    pub fn register(&mut self, name: &str, def: TaskDef, extend: bool) -> Result<()> {
        let entries = self.tasks.entry(name.to_string()).or_default();
        if !entries.is_empty() && !extend {
            return Err(ScriptError::DuplicateTask(name.to_string()).into());
        }
        entries.push(def);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// All task names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The definitions registered under a name, in registration order.
    pub fn defs(&self, name: &str) -> Option<&[TaskDef]> {
        self.tasks.get(name).map(Vec::as_slice)
    }

    /// Invoke a task by name with extra variables.
    ///
    /// Each definition runs inside a fresh environment scope: defaults are
    /// applied, then the caller's extras (caller wins), then dependencies
    /// are invoked in order with no extras, then the body executes. The
    /// scope is popped on every exit path. A `once` definition that has
    /// already run is skipped entirely, dependencies included.
    ///
    /// Dependencies are not deduplicated across an invocation tree: a
    /// shared non-once dependency runs once per incoming edge. Cycles are
    /// not detected and recurse until resource exhaustion.
    pub fn invoke(&self, name: &str, extra: &Vars, env: &mut Environment) -> Result<()> {
        let defs = self
            .tasks
            .get(name)
            .ok_or_else(|| ScriptError::UnknownTask(name.to_string()))?;

        for def in defs {
            if def.once && def.called.get() {
                continue;
            }
            env.scoped(|env| {
                env.update(&def.vars);
                env.update(extra);
                for dep in &def.depends {
                    self.invoke(dep, &Vars::new(), env)?;
                }
                match &def.body {
                    TaskBody::Actions(actions) => run_actions(self, actions, env)?,
                    TaskBody::Func(f) => f(self, env)?,
                }
                def.called.set(true);
                Ok::<(), crate::error::TaskrunError>(())
            })?;
        }
        Ok(())
    }
}
