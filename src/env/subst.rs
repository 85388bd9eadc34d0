//! Variable substitution
//!
//! Expands `$(name)` placeholders in values against the environment.
//! `$$` produces a literal `$`; a placeholder body may carry filters,
//! `$(name|filter|filter)`, applied left to right.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::env::environment::Environment;
use crate::env::value::Value;
use crate::error::ScriptResult;

/// Matches the `$$` escape or a `$(...)` placeholder; the body stops at
/// the first closing parenthesis.
fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\$|\$\(([^)]*)\)").unwrap())
}

/// Escape a string so that substituting the result returns the original.
pub fn escape(text: &str) -> String {
    text.replace('$', "$$")
}

impl Environment {
    /// Evaluate a variable: look it up and substitute its value.
    pub fn evaluate(&self, name: &str) -> ScriptResult<Value> {
        let value = self.get(name)?.clone();
        self.subst(&value, None)
    }

    /// Substitute placeholders in a value.
    ///
    /// Strings are scanned; lists and maps are substituted element-wise,
    /// preserving shape; a [`Value::Literal`] returns its inner value
    /// verbatim; everything else passes through unchanged.
    ///
    /// `auto_filter` is a pipe-delimited list of filter names applied to
    /// every placeholder that does not list filters of its own. A
    /// placeholder with an explicit filter list — even a single empty
    /// segment, as in `$(NAME|)` — suppresses the auto-filter.
    pub fn subst(&self, value: &Value, auto_filter: Option<&str>) -> ScriptResult<Value> {
        match value {
            Value::Literal(inner) => Ok((**inner).clone()),
            Value::Str(s) => self.subst_str(s, auto_filter).map(Value::Str),
            Value::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.subst(item, auto_filter))
                    .collect::<ScriptResult<Vec<Value>>>()?;
                Ok(Value::List(items))
            }
            Value::Map(entries) => {
                let entries = entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.subst(v, auto_filter)?)))
                    .collect::<ScriptResult<BTreeMap<String, Value>>>()?;
                Ok(Value::Map(entries))
            }
            other => Ok(other.clone()),
        }
    }

    /// Substitute placeholders in a string.
    pub fn subst_str(&self, text: &str, auto_filter: Option<&str>) -> ScriptResult<String> {
        let re = placeholder_re();
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for m in re.find_iter(text) {
            out.push_str(&text[last..m.start()]);
            last = m.end();

            let token = m.as_str();
            if token == "$$" {
                out.push('$');
                continue;
            }

            // $(name|filter|...) — the body is everything inside the parens.
            let body = &token[2..token.len() - 1];
            let mut parts = body.split('|');
            let name = parts.next().unwrap_or("");
            let filters: Vec<&str> = parts.collect();

            let mut value = self.evaluate(name)?;
            if !filters.is_empty() {
                // Explicit filters replace the auto-filter; empty segments
                // are skipped, so `$(X|)` disables it outright.
                for filter in filters {
                    if filter.is_empty() {
                        continue;
                    }
                    value = self.call_filter(filter, value)?;
                }
            } else if let Some(auto) = auto_filter {
                for filter in auto.split('|') {
                    value = self.call_filter(filter, value)?;
                }
            }

            out.push_str(&value.render());
        }

        out.push_str(&text[last..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::value::Assignment;
    use crate::error::ScriptError;

    fn env_with(vars: &[(&str, &str)]) -> Environment {
        let mut env = Environment::new();
        for (name, value) in vars {
            env.set(name, Assignment::plain(*value));
        }
        env
    }

    #[test]
    fn test_simple_substitution() {
        let env = env_with(&[("NAME", "World")]);
        let result = env.subst_str("Hello, $(NAME)!", None).unwrap();
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_dollar_escape() {
        let env = Environment::new();
        let result = env.subst_str("cost: $$5", None).unwrap();
        assert_eq!(result, "cost: $5");
    }

    #[test]
    fn test_escape_round_trip() {
        let env = Environment::new();
        for original in ["plain", "$5", "$(NAME)", "$$already", "a$(b|c)d$"] {
            let result = env.subst_str(&escape(original), None).unwrap();
            assert_eq!(result, original);
        }
    }

    #[test]
    fn test_unset_variable_fails() {
        let env = Environment::new();
        let result = env.subst_str("$(UNSET_NAME)", None);
        assert!(matches!(
            result,
            Err(ScriptError::VariableNotFound(name)) if name == "UNSET_NAME"
        ));
    }

    #[test]
    fn test_evaluate_unset_fails() {
        let env = Environment::new();
        assert!(matches!(
            env.evaluate("UNSET_NAME"),
            Err(ScriptError::VariableNotFound(_))
        ));
    }

    #[test]
    fn test_nested_variable_reference() {
        let mut env = Environment::new();
        env.set("INNER", Assignment::plain("value"));
        env.set("OUTER", Assignment::plain("$(INNER)"));
        let result = env.subst_str("got: $(OUTER)", None).unwrap();
        assert_eq!(result, "got: value");
    }

    #[test]
    fn test_explicit_filter() {
        let env = env_with(&[("NAME", "world")]);
        let result = env.subst_str("$(NAME|upper)", None).unwrap();
        assert_eq!(result, "WORLD");
    }

    #[test]
    fn test_filter_chain_left_to_right() {
        let env = env_with(&[("NAME", "  world  ")]);
        let result = env.subst_str("$(NAME|trim|upper)", None).unwrap();
        assert_eq!(result, "WORLD");
    }

    #[test]
    fn test_auto_filter_applied() {
        let env = env_with(&[("NAME", "world")]);
        let result = env.subst_str("$(NAME)", Some("upper")).unwrap();
        assert_eq!(result, "WORLD");
    }

    #[test]
    fn test_explicit_filter_overrides_auto() {
        let env = env_with(&[("NAME", "world")]);
        let result = env.subst_str("$(NAME|trim)", Some("upper")).unwrap();
        assert_eq!(result, "world");
    }

    #[test]
    fn test_empty_filter_segment_suppresses_auto() {
        let env = env_with(&[("NAME", "world")]);
        let result = env.subst_str("$(NAME|)", Some("upper")).unwrap();
        assert_eq!(result, "world");
    }

    #[test]
    fn test_unknown_filter_fails() {
        let env = env_with(&[("NAME", "world")]);
        let result = env.subst_str("$(NAME|nope)", None);
        assert!(matches!(result, Err(ScriptError::FilterNotFound(_))));
    }

    #[test]
    fn test_literal_bypasses_substitution() {
        let mut env = Environment::new();
        env.set("CMD", Assignment::Plain(Value::literal("echo $(X)")));
        let result = env.evaluate("CMD").unwrap();
        assert_eq!(result, Value::Str("echo $(X)".to_string()));
    }

    #[test]
    fn test_subst_list_elementwise() {
        let env = env_with(&[("A", "1"), ("B", "2")]);
        let value = Value::List(vec![Value::from("$(A)"), Value::from("$(B)")]);
        let result = env.subst(&value, None).unwrap();
        assert_eq!(
            result,
            Value::List(vec![Value::from("1"), Value::from("2")])
        );
    }

    #[test]
    fn test_subst_map_preserves_keys() {
        let env = env_with(&[("V", "x")]);
        let mut entries = std::collections::BTreeMap::new();
        entries.insert("key".to_string(), Value::from("$(V)"));
        let result = env.subst(&Value::Map(entries), None).unwrap();
        match result {
            Value::Map(m) => assert_eq!(m.get("key"), Some(&Value::from("x"))),
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_non_string_passthrough() {
        let env = Environment::new();
        assert_eq!(env.subst(&Value::Int(7), None).unwrap(), Value::Int(7));
        assert_eq!(
            env.subst(&Value::Bool(true), None).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_placeholder_stops_at_first_paren() {
        let env = env_with(&[("A", "x")]);
        let result = env.subst_str("$(A))", None).unwrap();
        assert_eq!(result, "x)");
    }

    #[test]
    fn test_failed_substitution_does_not_mutate() {
        let mut env = Environment::new();
        env.set("KNOWN", Assignment::plain("v"));
        let before_depth = env.depth();
        let _ = env.evaluate("UNSET_NAME");
        assert_eq!(env.depth(), before_depth);
        assert_eq!(env.get("KNOWN").unwrap(), &Value::Str("v".to_string()));
        assert!(!env.contains("UNSET_NAME"));
    }
}
