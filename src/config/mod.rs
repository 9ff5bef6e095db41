mod layout;

pub use layout::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::CanonicalModel;
use crate::resolve::{ModelMapping, TemplateMapping};

/// Environment variable that points at the settings file
pub const SETTINGS_ENV: &str = "LLD_FORGE_SETTINGS";
pub const DEFAULT_SETTINGS_PATH: &str = "settings/settings.yaml";

/// Problems with the settings document. All of these abort the run
/// before any device is processed.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },
    #[error("template_mapping has no 'default' entry")]
    MissingDefaultTemplate,
    #[error("{table} has an empty pattern or value for key '{key}'")]
    EmptyMappingEntry { table: String, key: String },
    #[error("template '{template}' is mapped but not found in {location}")]
    MissingTemplateFile { template: String, location: String },
    #[error("invalid template in {location}: {reason}")]
    InvalidTemplate { location: String, reason: String },
    #[error("no LLD file configured; set one with `lld --name` or `lld --file`")]
    NoLldFile,
    #[error("LLD file {} does not exist", path.display())]
    LldNotFound { path: PathBuf },
    #[error("cannot write settings file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Settings holds the whole tool configuration, loaded from one YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Where this document was loaded from; `save` writes back here
    #[serde(skip)]
    pub settings_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lld_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lld_file: Option<PathBuf>,
    #[serde(default = "default_supplementary_file")]
    pub supplementary_file: PathBuf,
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: PathBuf,
    #[serde(default)]
    pub model_mapping: ModelMapping,
    pub template_mapping: TemplateMapping,
    #[serde(default)]
    pub model_profiles: BTreeMap<CanonicalModel, BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    pub layout: LldLayout,
    #[serde(default = "default_supplementary_fields")]
    pub supplementary_fields: Vec<String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/configs")
}

fn default_supplementary_file() -> PathBuf {
    PathBuf::from("settings/device_data.yaml")
}

fn default_snapshot_file() -> PathBuf {
    PathBuf::from("data/device_management.xlsx")
}

fn default_supplementary_fields() -> Vec<String> {
    ["manage_vrf_name", "manage_gw_ip", "snmp_target_host", "snmp_target_host_name"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Settings {
    /// Settings file location from the environment, or the default path
    pub fn default_path() -> PathBuf {
        PathBuf::from(get_env(SETTINGS_ENV, DEFAULT_SETTINGS_PATH))
    }

    /// Load and validate the settings file
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_yaml_str(&content, path)?;
        tracing::debug!(
            "Loaded settings from {} ({} model patterns)",
            path.display(),
            settings.model_mapping.len()
        );
        Ok(settings)
    }

    /// Parse a settings document. Mapping tables are validated while parsing,
    /// so a missing default template surfaces here.
    pub fn from_yaml_str(content: &str, path: &Path) -> Result<Self, ConfigurationError> {
        let mut settings: Settings =
            serde_yaml::from_str(content).map_err(|e| ConfigurationError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        settings.settings_path = path.to_path_buf();
        Ok(settings)
    }

    /// Write the settings back to the file they were loaded from
    pub fn save(&self) -> Result<(), ConfigurationError> {
        let yaml = serde_yaml::to_string(self).map_err(|e| ConfigurationError::Parse {
            path: self.settings_path.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(&self.settings_path, yaml).map_err(|source| ConfigurationError::Write {
            path: self.settings_path.clone(),
            source,
        })
    }

    /// Project directory every relative path is resolved against
    pub fn base_dir(&self) -> PathBuf {
        if let Some(base) = &self.base_dir {
            return base.clone();
        }
        self.settings_path
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    pub fn data_path(&self) -> PathBuf {
        self.resolve(&self.data_dir)
    }

    pub fn templates_path(&self) -> PathBuf {
        self.resolve(&self.templates_dir)
    }

    pub fn logs_path(&self) -> PathBuf {
        self.resolve(&self.logs_dir)
    }

    pub fn output_path(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    pub fn supplementary_path(&self) -> PathBuf {
        self.resolve(&self.supplementary_file)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.resolve(&self.snapshot_file)
    }

    /// The LLD workbook: `lld_file` if set, else `lld_file_name` inside the data dir
    pub fn lld_path(&self) -> Result<PathBuf, ConfigurationError> {
        let path = match (&self.lld_file, &self.lld_file_name) {
            (Some(file), _) => self.resolve(file),
            (None, Some(name)) if !name.trim().is_empty() => self.data_path().join(name.trim()),
            _ => return Err(ConfigurationError::NoLldFile),
        };
        if !path.is_file() {
            return Err(ConfigurationError::LldNotFound { path });
        }
        Ok(path)
    }

    /// Point at an LLD by file name inside the data dir
    pub fn set_lld_file_name(&mut self, name: &str) {
        self.lld_file_name = Some(name.trim().to_string());
        self.lld_file = None;
    }

    /// Point at an LLD by explicit path
    pub fn set_lld_file(&mut self, path: &Path) {
        self.lld_file = Some(path.to_path_buf());
    }

    /// Fixed fields for a hardware family, if a profile exists
    pub fn profile_for(&self, model: &CanonicalModel) -> Option<&BTreeMap<String, serde_json::Value>> {
        self.model_profiles.get(model)
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
model_mapping:
  CE168: CE168XX
  CE68: CE68XX
  S57: S57XX
template_mapping:
  CE68XX: ce68.j2
  default: base.j2
"#;

    fn parse(yaml: &str) -> Result<Settings, ConfigurationError> {
        Settings::from_yaml_str(yaml, Path::new("/srv/project/settings/settings.yaml"))
    }

    #[test]
    fn test_defaults_resolve_under_project_dir() {
        let s = parse(MINIMAL).unwrap();
        assert_eq!(s.base_dir(), PathBuf::from("/srv/project"));
        assert_eq!(s.output_path(), PathBuf::from("/srv/project/data/configs"));
        assert_eq!(s.templates_path(), PathBuf::from("/srv/project/templates"));
        assert_eq!(
            s.supplementary_path(),
            PathBuf::from("/srv/project/settings/device_data.yaml")
        );
        assert_eq!(s.layout, LldLayout::default());
        assert_eq!(s.model_mapping.len(), 3);
    }

    #[test]
    fn test_missing_default_template_fails_at_load() {
        let yaml = "template_mapping:\n  CE68XX: ce68.j2\n";
        match parse(yaml) {
            Err(ConfigurationError::Parse { reason, .. }) => assert!(reason.contains("default")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_template_mapping_fails_at_load() {
        assert!(matches!(
            parse("model_mapping:\n  CE68: CE68XX\n"),
            Err(ConfigurationError::Parse { .. })
        ));
    }

    #[test]
    fn test_layout_overrides_merge_with_defaults() {
        let yaml = format!(
            "{}layout:\n  devices:\n    sheet: Inventory\n    columns:\n      name: Hostname\n",
            MINIMAL
        );
        let s = parse(&yaml).unwrap();
        assert_eq!(s.layout.devices.sheet, "Inventory");
        assert_eq!(s.layout.devices.columns.name, "Hostname");
        assert_eq!(s.layout.devices.columns.model, "Model");
        assert_eq!(s.layout.links.sheet, "Links");
    }

    #[test]
    fn test_model_profiles_parse() {
        let yaml = format!(
            "{}model_profiles:\n  S57XX:\n    manage_int: MEth0/0/1\n    option_global_vlan: false\n",
            MINIMAL
        );
        let s = parse(&yaml).unwrap();
        let profile = s.profile_for(&CanonicalModel::new("S57XX")).unwrap();
        assert_eq!(profile["manage_int"], serde_json::json!("MEth0/0/1"));
        assert_eq!(profile["option_global_vlan"], serde_json::json!(false));
    }

    #[test]
    fn test_lld_path_requires_configuration() {
        let s = parse(MINIMAL).unwrap();
        assert!(matches!(s.lld_path(), Err(ConfigurationError::NoLldFile)));
    }

    #[test]
    fn test_lld_file_wins_over_name() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.xlsx");
        std::fs::write(&explicit, b"x").unwrap();

        let mut s = parse(MINIMAL).unwrap();
        s.base_dir = Some(dir.path().to_path_buf());
        s.lld_file_name = Some("named.xlsx".to_string());
        assert!(matches!(s.lld_path(), Err(ConfigurationError::LldNotFound { .. })));

        s.set_lld_file(&explicit);
        assert_eq!(s.lld_path().unwrap(), explicit);
    }

    #[test]
    fn test_save_preserves_other_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, MINIMAL).unwrap();

        let mut s = Settings::load(&path).unwrap();
        s.set_lld_file_name("DC1_LLD.xlsx");
        s.save().unwrap();

        let reloaded = Settings::load(&path).unwrap();
        assert_eq!(reloaded.lld_file_name.as_deref(), Some("DC1_LLD.xlsx"));
        assert_eq!(reloaded.model_mapping, s.model_mapping);
        assert_eq!(reloaded.template_mapping, s.template_mapping);
    }

    #[test]
    fn test_unreadable_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Settings::load(&dir.path().join("missing.yaml")),
            Err(ConfigurationError::Read { .. })
        ));
    }
}
