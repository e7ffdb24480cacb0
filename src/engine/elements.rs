//! Element availability and capabilities through gst-inspect

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::process::Command;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::{CapabilityBound, CapsStructure, ElementRegistry, TranscodeError, TranscodeResult};

pub const DEFAULT_INSPECTOR: &str = "gst-inspect-1.0";

/// Check the inspector is installed and return its version line
pub fn inspector_version(inspector: &str) -> Result<String> {
    let output = Command::new(inspector)
        .arg("--version")
        .output()
        .with_context(|| format!("Failed to execute {}. Is GStreamer installed and in PATH?", inspector))?;

    if !output.status.success() {
        anyhow::bail!("{} failed with status: {}", inspector, output.status);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or("Unknown version").to_string())
}

/// Registry backed by the gst-inspect command, caching one lookup per element
#[derive(Debug, Clone)]
pub struct GstInspectRegistry {
    inspector: String,
    cache: Arc<Mutex<HashMap<String, Option<String>>>>,
}

impl GstInspectRegistry {
    pub fn new(inspector: impl Into<String>) -> Self {
        Self {
            inspector: inspector.into(),
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Full inspector output for `name`, None when the element does not exist
    fn inspect(&self, name: &str) -> Option<String> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(cached) = cache.get(name) {
                return cached.clone();
            }
        }

        let text = Command::new(&self.inspector)
            .arg(name)
            .output()
            .ok()
            .filter(|out| out.status.success())
            .map(|out| String::from_utf8_lossy(&out.stdout).into_owned());
        debug!("Inspected {}: {}", name, if text.is_some() { "found" } else { "missing" });

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(name.to_string(), text.clone());
        }
        text
    }
}

impl Default for GstInspectRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_INSPECTOR)
    }
}

impl ElementRegistry for GstInspectRegistry {
    fn has_element(&self, name: &str) -> bool {
        !name.is_empty() && self.inspect(name).is_some()
    }

    fn sink_caps(&self, name: &str) -> TranscodeResult<Vec<CapsStructure>> {
        let unavailable = || TranscodeError::CapabilityUnavailable {
            element: name.to_string(),
        };
        let text = self.inspect(name).ok_or_else(unavailable)?;
        let caps = parse_sink_caps(&text);
        if caps.is_empty() {
            return Err(unavailable());
        }
        Ok(caps)
    }
}

/// Parse the capabilities of the SINK pad templates in gst-inspect output.
///
/// ```text
///   SINK template: 'sink'
///     Capabilities:
///       audio/x-raw
///                  rate: [ 1, 2147483647 ]
///              channels: { (int)1, (int)2 }
/// ```
///
/// Only integer fields are kept.
pub fn parse_sink_caps(text: &str) -> Vec<CapsStructure> {
    let mut structures = Vec::new();
    let mut in_sink = false;
    let mut in_caps = false;
    let mut current: Option<CapsStructure> = None;

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.contains("template:") {
            structures.extend(current.take());
            in_sink = trimmed.starts_with("SINK template");
            in_caps = false;
            continue;
        }
        if !in_sink {
            continue;
        }
        if trimmed.starts_with("Capabilities:") {
            in_caps = true;
            continue;
        }
        if !in_caps {
            continue;
        }
        if trimmed.is_empty() || trimmed == "ANY" || trimmed == "EMPTY" {
            structures.extend(current.take());
            in_caps = trimmed == "ANY" || trimmed == "EMPTY";
            if trimmed.is_empty() {
                in_sink = false;
            }
            continue;
        }

        match trimmed.split_once(": ") {
            Some((field, value)) if current.is_some() => {
                if let (Some(structure), Some(bound)) = (current.as_mut(), parse_bound(value)) {
                    structure.fields.insert(field.trim().to_string(), bound);
                }
            }
            Some(_) => {}
            None => {
                structures.extend(current.take());
                current = Some(CapsStructure::new(trimmed));
            }
        }
    }

    structures.extend(current);
    structures
}

/// `[ a, b ]` is a range, `{ (int)x, (int)y }` a set, a bare number a single value
pub fn parse_bound(value: &str) -> Option<CapabilityBound> {
    let value = value.trim();

    if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
        let mut parts = inner.split(',').map(parse_int);
        let min = parts.next()??;
        let max = parts.next()??;
        return Some(CapabilityBound::range(min, max));
    }

    if let Some(inner) = value.strip_prefix('{').and_then(|v| v.strip_suffix('}')) {
        let values = inner.split(',').map(parse_int).collect::<Option<Vec<u32>>>()?;
        return (!values.is_empty()).then(|| CapabilityBound::discrete(values));
    }

    parse_int(value).map(|v| CapabilityBound::discrete([v]))
}

fn parse_int(s: &str) -> Option<u32> {
    let s = s.trim();
    let s = s.strip_prefix("(int)").unwrap_or(s).trim();
    s.parse().ok()
}
