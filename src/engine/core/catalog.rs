use super::preset::{Device, Preset};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Devices known to the program, keyed by the short name of their file
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    devices: BTreeMap<String, Device>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a single device file, replacing any device with the same short name
    pub fn load_file(&mut self, path: &Path) -> Result<&Device> {
        let device = Device::load(path)?;
        let key = device.short_name.clone();
        debug!("Loaded device {} from {}", key, path.display());
        self.devices.insert(key.clone(), device);
        self.devices
            .get(&key)
            .with_context(|| format!("Device {} vanished from catalog", key))
    }

    /// Add a device from JSON text under the given short name
    pub fn load_json(&mut self, short_name: &str, data: &str) -> Result<&Device> {
        let mut device = Device::from_json(data)
            .with_context(|| format!("Invalid device {}", short_name))?;
        device.short_name = short_name.to_string();
        self.devices.insert(short_name.to_string(), device);
        self.devices
            .get(short_name)
            .with_context(|| format!("Device {} vanished from catalog", short_name))
    }

    /// Load every `*.json` directly inside `dir`. Broken files are skipped
    /// with a warning; the number of devices loaded is returned.
    pub fn load_directory(&mut self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            anyhow::bail!("Preset directory not found: {}", dir.display());
        }

        let mut files: Vec<_> = WalkDir::new(dir)
            .max_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        let mut loaded = 0;
        for path in files {
            match self.load_file(&path) {
                Ok(_) => loaded += 1,
                Err(e) => warn!("Skipping preset file {}: {:#}", path.display(), e),
            }
        }
        Ok(loaded)
    }

    /// Load each existing directory in order, so later paths win
    pub fn load_search_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> usize {
        paths
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| p.is_dir())
            .filter_map(|p| match self.load_directory(p) {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!("{:#}", e);
                    None
                }
            })
            .sum()
    }

    pub fn insert(&mut self, device: Device) {
        self.devices.insert(device.short_name.clone(), device);
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// All devices ordered by short name
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn device(&self, short_name: &str) -> Option<&Device> {
        self.devices.get(short_name)
    }

    /// Look up a preset; an empty name selects the device's default preset
    pub fn preset(&self, device: &str, name: &str) -> Result<&Preset> {
        let dev = self
            .device(device)
            .with_context(|| format!("Unknown device: {}", device))?;

        if name.is_empty() {
            dev.default_preset()
                .with_context(|| format!("Device {} has no presets", device))
        } else {
            dev.preset(name)
                .with_context(|| format!("Device {} has no preset named {}", device, name))
        }
    }

    /// One "short_name, version" line per device
    pub fn version_info(&self) -> String {
        self.devices
            .values()
            .map(|d| format!("{}, {}\n", d.short_name, d.version))
            .collect()
    }
}
