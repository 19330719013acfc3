//! Flat name→value argument mapping used to construct stages by name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Scope;
use crate::error::{PipelineError, Result};

/// Argument key every registered stage accepts for limiting its scope.
pub const SCOPE_ARG: &str = "only";

/// Constructor arguments for one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageArgs {
    values: BTreeMap<String, Value>,
}

impl StageArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: serde_json::Map<String, Value>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Builder-style insert, mostly for tests and programmatic construction.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Every argument in key order, `only` included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Rejects keys the stage does not understand (`only` is always allowed).
    pub fn ensure_known(&self, stage: &str, allowed: &[&str]) -> Result<()> {
        for key in self.keys() {
            if key != SCOPE_ARG && !allowed.contains(&key) {
                return Err(PipelineError::invalid_argument(format!(
                    "{stage} got an unexpected argument '{key}'"
                )));
            }
        }
        Ok(())
    }

    pub fn required_str(&self, key: &str) -> Result<String> {
        self.optional_str(key)?.ok_or_else(|| missing(key))
    }

    pub fn optional_str(&self, key: &str) -> Result<Option<String>> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(wrong_type(key, "a string", other)),
        }
    }

    pub fn required_str_list(&self, key: &str) -> Result<Vec<String>> {
        self.optional_str_list(key)?.ok_or_else(|| missing(key))
    }

    pub fn optional_str_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(wrong_type(key, "a list of strings", other)),
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(other) => Err(wrong_type(key, "a list of strings", other)),
        }
    }

    /// String→string mapping, in key order.
    pub fn str_map(&self, key: &str) -> Result<Vec<(String, String)>> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => Ok((k.clone(), s.clone())),
                    other => Err(wrong_type(key, "a mapping of strings", other)),
                })
                .collect(),
            Some(other) => Err(wrong_type(key, "a mapping of strings", other)),
        }
    }

    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value
                .as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| wrong_type(key, "a non-negative integer", value)),
        }
    }

    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value
                .as_f64()
                .ok_or_else(|| wrong_type(key, "a number", value)),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value
                .as_bool()
                .ok_or_else(|| wrong_type(key, "a boolean", value)),
        }
    }

    /// The optional `only` argument.
    pub fn scope(&self) -> Result<Option<Scope>> {
        self.values
            .get(SCOPE_ARG)
            .map(Scope::from_value)
            .transpose()
    }
}

fn missing(key: &str) -> PipelineError {
    PipelineError::invalid_argument(format!("missing required argument '{key}'"))
}

fn wrong_type(key: &str, expected: &str, found: &Value) -> PipelineError {
    PipelineError::invalid_argument(format!("argument '{key}' should be {expected}, got {found}"))
}
