//! Variable Store - Ordered Stylesheet Variables
//!
//! Variables keep the position of their first insertion; later sets only
//! replace the value. Serialization emits one `@name: value;` line per entry.

use indexmap::IndexMap;
use serde_yaml::Value;
use std::fs;
use std::path::Path;

/// Prefix marking a variable name in the stylesheet source language.
pub const VARIABLE_SIGIL: char = '@';

/// Result of bulk-loading a variable document.
///
/// A failed parse applies nothing; the caller decides whether that is fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(usize),
    ParseFailed(String),
}

/// Render a single declaration line. Empty values become a quoted empty literal.
pub fn declaration(name: &str, value: &str) -> String {
    if value.is_empty() {
        format!("{VARIABLE_SIGIL}{name}: \"\";")
    } else {
        format!("{VARIABLE_SIGIL}{name}: {value};")
    }
}

#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    vars: IndexMap<String, String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Load a YAML mapping file. Unreadable or malformed files apply no pairs.
    pub fn load_from_file(&mut self, path: &Path) -> LoadOutcome {
        match fs::read_to_string(path) {
            Ok(content) => self.load_from_str(&content),
            Err(e) => LoadOutcome::ParseFailed(format!("{}: {}", path.display(), e)),
        }
    }

    pub fn load_from_str(&mut self, document: &str) -> LoadOutcome {
        let value: Value = match serde_yaml::from_str(document) {
            Ok(v) => v,
            Err(e) => return LoadOutcome::ParseFailed(e.to_string()),
        };

        let mapping = match value {
            Value::Null => return LoadOutcome::Loaded(0),
            Value::Mapping(m) => m,
            other => {
                return LoadOutcome::ParseFailed(format!(
                    "expected a mapping of variables, found {}",
                    value_kind(&other)
                ))
            }
        };

        // Collect first so a bad entry can never leave a half-applied document.
        let mut pairs = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let (Some(name), Some(value)) = (scalar_text(&key), scalar_text(&value)) else {
                tracing::warn!(key = ?key, "skipping non-scalar variable entry");
                continue;
            };
            pairs.push((name, value));
        }

        let count = pairs.len();
        for (name, value) in pairs {
            self.set(name, value);
        }
        LoadOutcome::Loaded(count)
    }

    pub fn declarations(&self) -> Vec<String> {
        self.vars.iter().map(|(k, v)| declaration(k, v)).collect()
    }

    pub fn serialize(&self) -> String {
        self.declarations().join("\n")
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
