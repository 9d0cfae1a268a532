//! Environment lookups.
//!
//! The binary reads the process environment through [`Env::real()`].
//! Tests and embedders hand in a fixed map with [`Env::mock()`] so config
//! loading never depends on `std::env::set_var`.

use std::collections::HashMap;

/// Environment variable reader.
#[derive(Clone, Debug)]
pub struct Env {
    overrides: Option<HashMap<String, String>>,
}

impl Env {
    pub fn real() -> Self {
        Self { overrides: None }
    }

    /// An environment containing exactly `vars`.
    pub fn mock(vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        Self {
            overrides: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    pub fn var(&self, name: &str) -> Result<String, std::env::VarError> {
        match &self.overrides {
            Some(map) => map.get(name).cloned().ok_or(std::env::VarError::NotPresent),
            None => std::env::var(name),
        }
    }

    /// First non-empty value among `names`, in order.
    pub fn first_of(&self, names: &[&str]) -> Option<String> {
        names
            .iter()
            .filter_map(|n| self.var(n).ok())
            .find(|v| !v.trim().is_empty())
    }

    /// `true` when the variable is present and non-empty.
    pub fn is_set(&self, name: &str) -> bool {
        self.var(name).is_ok_and(|v| !v.trim().is_empty())
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::real()
    }
}
