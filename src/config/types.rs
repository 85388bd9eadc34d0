//! Task file schema
//!
//! Serde types for task file documents, and their conversion into the
//! runtime environment and task types.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::{Mapping, Value as YamlValue};

use crate::env::{Assignment, Value, Vars};
use crate::error::{Result, TaskrunError};
use crate::runner::{Action, CaptureMode, TaskBody, TaskDef};

/// Top-level task file structure.
///
/// On load, `vars` is applied first, then `include` patterns are resolved,
/// then `tasks` are registered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskfileDoc {
    /// Assignments applied when the file loads; document order preserved.
    #[serde(default)]
    pub vars: Mapping,

    /// Include globs, resolved relative to this file's directory.
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub include: Vec<String>,

    /// Task definitions, in document order.
    #[serde(default)]
    pub tasks: Mapping,
}

/// A task definition as written in a task file.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Help text shown in listings.
    #[serde(default)]
    pub desc: Option<String>,

    /// Run the body at most once across the process lifetime.
    #[serde(default)]
    pub once: bool,

    /// Append to an existing task of the same name instead of failing.
    #[serde(default)]
    pub extend: bool,

    /// Tasks invoked before the body, in order.
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub depends: Vec<String>,

    /// Default variables, overridable by the caller.
    #[serde(default)]
    pub vars: Mapping,

    /// Body actions.
    #[serde(default, deserialize_with = "deserialize_actions")]
    pub run: Vec<ActionConfig>,
}

impl TaskConfig {
    /// Convert into a runtime task definition.
    pub fn into_def(self) -> Result<TaskDef> {
        let vars = vars_from_mapping(&self.vars)?;
        let actions = self
            .run
            .into_iter()
            .map(ActionConfig::into_action)
            .collect::<Result<Vec<Action>>>()?;

        let mut def = TaskDef::new(TaskBody::Actions(actions))
            .once(self.once)
            .depends(self.depends)
            .vars(vars);
        if let Some(desc) = self.desc {
            def = def.desc(desc);
        }
        Ok(def)
    }
}

/// A body action - either a bare command string or a detailed mapping.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ActionConfig {
    /// Bare command string
    Simple(String),

    /// Detailed action with options
    Detailed(ActionDetail),
}

impl ActionConfig {
    /// Convert into a runtime action.
    pub fn into_action(self) -> Result<Action> {
        match self {
            ActionConfig::Simple(command) => Ok(Action::command(command)),
            ActionConfig::Detailed(detail) => detail.into_action(),
        }
    }
}

/// Detailed action specification. Exactly one of `run`, `call`, `set`, or
/// `echo` selects the action kind; the remaining fields modify `run`.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionDetail {
    /// Command to execute
    pub run: Option<String>,

    /// Suppress the command echo
    pub quiet: Option<bool>,

    /// Streams to capture: none, stdout, stderr, combined, or both
    pub capture: Option<String>,

    /// Variable that receives the captured text
    pub into: Option<String>,

    /// Return codes counted as success (defaults to [0])
    pub accept: Option<Vec<i32>>,

    /// Task to invoke
    pub call: Option<String>,

    /// Extra variables for the called task
    #[serde(default)]
    pub vars: Mapping,

    /// Assignments to apply
    pub set: Option<Mapping>,

    /// Message to substitute and print
    pub echo: Option<String>,
}

impl ActionDetail {
    fn into_action(self) -> Result<Action> {
        let kinds = [
            self.run.is_some(),
            self.call.is_some(),
            self.set.is_some(),
            self.echo.is_some(),
        ];
        if kinds.iter().filter(|set| **set).count() != 1 {
            return Err(TaskrunError::Invalid(
                "an action needs exactly one of run, call, set, or echo".to_string(),
            ));
        }

        if let Some(command) = self.run {
            let capture = match self.capture.as_deref() {
                Some(name) => name.parse::<CaptureMode>().map_err(TaskrunError::Invalid)?,
                None => CaptureMode::NONE,
            };
            return Ok(Action::Run {
                command,
                quiet: self.quiet,
                capture,
                into: self.into,
                accept: self.accept.unwrap_or_else(|| vec![0]),
            });
        }
        if let Some(task) = self.call {
            return Ok(Action::Call {
                task,
                vars: vars_from_mapping(&self.vars)?,
            });
        }
        if let Some(mapping) = self.set {
            return Ok(Action::Set {
                vars: vars_from_mapping(&mapping)?,
            });
        }
        Ok(Action::Echo {
            message: self.echo.unwrap_or_default(),
        })
    }
}

/// Convert a YAML mapping into ordered assignments.
pub fn vars_from_mapping(mapping: &Mapping) -> Result<Vars> {
    let mut vars = Vars::new();
    for (key, value) in mapping {
        let name = key.as_str().ok_or_else(|| {
            TaskrunError::Invalid("variable names must be strings".to_string())
        })?;
        vars.push((name.to_string(), assignment_from_yaml(value)?));
    }
    Ok(vars)
}

/// Convert a YAML value into an assignment, recognizing the wrapper forms
/// `{default: v}`, `{literal: v}`, `{delete: true}`, `{nochange: true}`,
/// and `{desc: text, value: a}`. Anything else is a plain value.
pub fn assignment_from_yaml(value: &YamlValue) -> Result<Assignment> {
    if let YamlValue::Mapping(mapping) = value {
        if mapping.len() == 1 {
            if let Some(inner) = mapping.get("default") {
                return Ok(Assignment::Default(value_from_yaml(inner)?));
            }
            if let Some(inner) = mapping.get("literal") {
                return Ok(Assignment::Plain(Value::Literal(Box::new(value_from_yaml(
                    inner,
                )?))));
            }
            if mapping.get("delete") == Some(&YamlValue::Bool(true)) {
                return Ok(Assignment::Delete);
            }
            if mapping.get("nochange") == Some(&YamlValue::Bool(true)) {
                return Ok(Assignment::NoChange);
            }
        }
        if let Some(desc) = mapping.get("desc") {
            let has_value = mapping.get("value").is_some();
            let recognized = mapping.len() == 1 || (mapping.len() == 2 && has_value);
            if recognized {
                let desc = desc
                    .as_str()
                    .ok_or_else(|| {
                        TaskrunError::Invalid("desc must be a string".to_string())
                    })?
                    .to_string();
                let inner = match mapping.get("value") {
                    Some(wrapped) => assignment_from_yaml(wrapped)?,
                    None => Assignment::NoChange,
                };
                return Ok(Assignment::Described(desc, Box::new(inner)));
            }
        }
    }
    Ok(Assignment::Plain(value_from_yaml(value)?))
}

/// Convert a YAML value into a runtime value. A single-key `{literal: v}`
/// mapping becomes a literal wrapper at any nesting depth.
pub fn value_from_yaml(value: &YamlValue) -> Result<Value> {
    Ok(match value {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(b) => Value::Bool(*b),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or_default())
            }
        }
        YamlValue::String(s) => Value::Str(s.clone()),
        YamlValue::Sequence(items) => Value::List(
            items
                .iter()
                .map(value_from_yaml)
                .collect::<Result<Vec<Value>>>()?,
        ),
        YamlValue::Mapping(mapping) => {
            if mapping.len() == 1 {
                if let Some(inner) = mapping.get("literal") {
                    return Ok(Value::Literal(Box::new(value_from_yaml(inner)?)));
                }
            }
            let mut entries = BTreeMap::new();
            for (key, item) in mapping {
                let name = key.as_str().ok_or_else(|| {
                    TaskrunError::Invalid("mapping keys must be strings".to_string())
                })?;
                entries.insert(name.to_string(), value_from_yaml(item)?);
            }
            Value::Map(entries)
        }
        YamlValue::Tagged(tagged) => value_from_yaml(&tagged.value)?,
    })
}

/// Deserializer for fields that accept a single string or a list of
/// strings.
fn deserialize_string_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value = YamlValue::deserialize(deserializer)?;
    match value {
        YamlValue::String(s) => Ok(vec![s]),
        YamlValue::Sequence(seq) => {
            let mut items = Vec::new();
            for item in seq {
                match item {
                    YamlValue::String(s) => items.push(s),
                    _ => return Err(D::Error::custom("expected a string")),
                }
            }
            Ok(items)
        }
        YamlValue::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("expected a string or list of strings")),
    }
}

/// Deserializer for `run:` that accepts a single action or a list.
fn deserialize_actions<'de, D>(deserializer: D) -> std::result::Result<Vec<ActionConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value = YamlValue::deserialize(deserializer)?;
    match value {
        YamlValue::String(s) => Ok(vec![ActionConfig::Simple(s)]),
        YamlValue::Mapping(_) => {
            let action = ActionConfig::deserialize(value).map_err(D::Error::custom)?;
            Ok(vec![action])
        }
        YamlValue::Sequence(seq) => {
            let mut actions = Vec::new();
            for item in seq {
                let action = ActionConfig::deserialize(item).map_err(D::Error::custom)?;
                actions.push(action);
            }
            Ok(actions)
        }
        YamlValue::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("run must be a string, mapping, or list")),
    }
}
