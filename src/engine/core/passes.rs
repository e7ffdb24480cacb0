use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder in encoder pass strings replaced by the worker thread count
pub const THREADS_PLACEHOLDER: &str = "%(threads)s";

/// Ordered `key=value` parameters for one encoder pass.
///
/// Serialized as space-separated tokens, e.g. `pass=1 bitrate=2000 threads=4`.
/// Insertion order is preserved and re-inserting an existing key keeps its slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    entries: Vec<(String, String)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        let mut set = Self::new();
        for token in s.split_whitespace() {
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| format!("expected key=value but got '{}'", token))?;
            if key.is_empty() {
                return Err(format!("missing key in '{}'", token));
            }
            set.insert(key, value);
        }
        Ok(set)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

impl FromStr for ParameterSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ParameterSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ParameterSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Replace the thread placeholder in a pass string
pub fn substitute_threads(pass: &str, threads: usize) -> String {
    pass.replace(THREADS_PLACEHOLDER, &threads.to_string())
}

/// Drop `key` from every pass string, keeping the rest in order
pub fn remove_param_from_passes(passes: &mut [String], key: &str) -> Result<(), String> {
    for pass in passes.iter_mut() {
        let mut params = ParameterSet::parse(pass)?;
        if params.remove(key).is_some() {
            *pass = params.to_string();
        }
    }
    Ok(())
}
