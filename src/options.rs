//! Session option map.
//!
//! Options are typed key/value pairs owned by one session. The map is
//! injected into the script namespace as the `options` handle, so scripts
//! and the host read the same values (e.g. `resume_on_disconnect`).

use std::collections::HashMap;
use std::fmt;

/// A single option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(v) => write!(f, "{v}"),
            OptionValue::Int(v) => write!(f, "{v}"),
            OptionValue::Float(v) => write!(f, "{v}"),
            OptionValue::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> OptionValue {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> OptionValue {
        OptionValue::Int(v)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> OptionValue {
        OptionValue::Float(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> OptionValue {
        OptionValue::Str(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> OptionValue {
        OptionValue::Str(v)
    }
}

/// Typed option map for one session.
#[derive(Debug, Clone, Default)]
pub struct Options {
    values: HashMap<String, OptionValue>,
}

impl Options {
    pub fn new() -> Options {
        Options::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<OptionValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Boolean option with a fallback when unset or of a different type.
    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.values.get(name) {
            Some(OptionValue::Bool(v)) => *v,
            _ => default,
        }
    }

    pub fn get_i64(&self, name: &str, default: i64) -> i64 {
        match self.values.get(name) {
            Some(OptionValue::Int(v)) => *v,
            _ => default,
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(OptionValue::Str(v)) => Some(v),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors() {
        let mut opts = Options::new();
        opts.set("resume_on_disconnect", false);
        opts.set("frequency", 4_000_000i64);
        opts.set("user_script", "init.lua");

        assert!(!opts.get_bool("resume_on_disconnect", true));
        assert!(opts.get_bool("missing", true));
        // wrong type falls back to the default
        assert!(opts.get_bool("frequency", true));
        assert_eq!(opts.get_i64("frequency", 0), 4_000_000);
        assert_eq!(opts.get_str("user_script"), Some("init.lua"));
        assert_eq!(opts.get_str("frequency"), None);
        assert!(opts.is_set("user_script"));
    }
}
