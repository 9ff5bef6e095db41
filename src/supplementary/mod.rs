use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::models::DeviceRecord;

/// Field name -> value. A null value means "not supplied".
pub type Fields = BTreeMap<String, Value>;

const FILE_HEADER: &str = "\
# Device data for lld-forge, generated by `lld-forge init`.
#
# defaults:  fields applied to every device. LLD values override them.
# devices:   per-device fields, keyed by device name. These override both the
#            LLD and the model profile. Leave a field empty (null) to keep the
#            LLD value. Re-running `init` keeps what you filled in.
# selection: optional list of device names. When set, `run` only generates
#            these devices. Names not in the LLD are ignored.
";

/// SupplementaryData is the parsed device data file. `init` writes it with
/// one entry per LLD device and the operator fills in what the LLD lacks
/// (gateways, SNMP targets, VRFs) before `run`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplementaryData {
    #[serde(default)]
    pub defaults: Fields,
    #[serde(default)]
    pub devices: BTreeMap<String, Option<Fields>>,
    #[serde(default)]
    pub selection: Vec<String>,
}

fn supplied(fields: &Fields) -> impl Iterator<Item = (&str, &Value)> {
    fields
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.as_str(), v))
}

impl SupplementaryData {
    /// Load the file, or an empty data set if it does not exist yet
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(
                "Device data file {} not found, using LLD values only (run `init` to create it)",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read device data {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse device data {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Non-null defaults
    pub fn defaults(&self) -> impl Iterator<Item = (&str, &Value)> {
        supplied(&self.defaults)
    }

    /// Non-null fields supplied for one device
    pub fn for_device(&self, device: &str) -> Vec<(&str, &Value)> {
        match self.devices.get(device) {
            Some(Some(fields)) => supplied(fields).collect(),
            _ => Vec::new(),
        }
    }

    /// Devices to generate. An empty selection means every device.
    pub fn select<'a>(&self, devices: &'a [DeviceRecord]) -> Vec<&'a DeviceRecord> {
        if self.selection.is_empty() {
            return devices.iter().collect();
        }
        let known: HashSet<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        for name in &self.selection {
            if !known.contains(name.as_str()) {
                tracing::warn!("Selected device {} is not in the LLD, ignoring", name);
            }
        }
        devices
            .iter()
            .filter(|d| self.selection.iter().any(|s| s == &d.name))
            .collect()
    }

    /// Build a fresh template for the current inventory. Values already
    /// filled in `existing` are kept; devices no longer in the LLD are dropped.
    pub fn regenerate(existing: &SupplementaryData, devices: &[DeviceRecord], fields: &[String]) -> Self {
        let defaults = if existing.defaults.is_empty() {
            seed_defaults()
        } else {
            existing.defaults.clone()
        };

        let mut entries = BTreeMap::new();
        for device in devices {
            let mut entry: Fields = fields.iter().map(|f| (f.clone(), Value::Null)).collect();
            if let Some(Some(previous)) = existing.devices.get(&device.name) {
                for (key, value) in previous {
                    entry.insert(key.clone(), value.clone());
                }
            }
            entries.insert(device.name.clone(), Some(entry));
        }

        let dropped = existing
            .devices
            .keys()
            .filter(|name| !entries.contains_key(*name))
            .count();
        if dropped > 0 {
            tracing::info!("Dropped {} device data entries no longer in the LLD", dropped);
        }

        let selection = existing
            .selection
            .iter()
            .filter(|name| entries.contains_key(*name))
            .cloned()
            .collect();

        Self {
            defaults,
            devices: entries,
            selection,
        }
    }

    /// Write the file with its explanatory header, replacing any previous one
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let body = serde_yaml::to_string(self).context("Failed to serialize device data")?;
        std::fs::write(path, format!("{}\n{}", FILE_HEADER, body))
            .with_context(|| format!("Failed to write device data {}", path.display()))?;
        tracing::info!("Device data template written to {}", path.display());
        Ok(())
    }
}

fn seed_defaults() -> Fields {
    let mut defaults = Fields::new();
    defaults.insert("sftp".to_string(), Value::Bool(false));
    defaults.insert("snmp_udp_port".to_string(), Value::from(10162));
    defaults
}
