use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tera::{Tera, Value};
use thiserror::Error;

use crate::config::ConfigurationError;
use crate::context::RenderContext;
use crate::models::TemplateRef;
use crate::utils::{compact_vlan_ranges, is_stp_root_name, parse_vlan_list};

/// Rendering one device failed. Only that device is affected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("device {device}: template {template} uses '{field}', which is not set")]
    MissingField {
        device: String,
        template: String,
        field: String,
    },
    #[error("device {device}: rendering {template} failed: {reason}")]
    Template {
        device: String,
        template: String,
        reason: String,
    },
}

/// TemplateStore is where named template bodies come from
pub trait TemplateStore {
    /// Human-readable location for error messages
    fn location(&self) -> String;

    fn contains(&self, template: &TemplateRef) -> bool;

    /// Every template in the store, so templates can include each other
    fn load_all(&self) -> Result<Vec<(TemplateRef, String)>, ConfigurationError>;
}

/// Templates are the regular files directly inside one directory
pub struct DirTemplateStore {
    dir: PathBuf,
}

impl DirTemplateStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }
}

impl TemplateStore for DirTemplateStore {
    fn location(&self) -> String {
        self.dir.display().to_string()
    }

    fn contains(&self, template: &TemplateRef) -> bool {
        self.dir.join(template.as_str()).is_file()
    }

    fn load_all(&self) -> Result<Vec<(TemplateRef, String)>, ConfigurationError> {
        let read_err = |source: std::io::Error| ConfigurationError::Read {
            path: self.dir.clone(),
            source,
        };
        let mut templates = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !path.is_file() || name.starts_with('.') {
                continue;
            }
            let body = std::fs::read_to_string(&path).map_err(|source| ConfigurationError::Read {
                path: path.clone(),
                source,
            })?;
            templates.push((TemplateRef::new(name), body));
        }
        templates.sort_by(|a, b| a.0.cmp(&b.0));
        tracing::debug!("Loaded {} templates from {}", templates.len(), self.dir.display());
        Ok(templates)
    }
}

/// In-memory templates for tests
#[cfg(test)]
#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: std::collections::BTreeMap<String, String>,
}

#[cfg(test)]
impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, body: &str) {
        self.templates.insert(name.to_string(), body.to_string());
    }
}

#[cfg(test)]
impl TemplateStore for MemoryTemplateStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn contains(&self, template: &TemplateRef) -> bool {
        self.templates.contains_key(template.as_str())
    }

    fn load_all(&self) -> Result<Vec<(TemplateRef, String)>, ConfigurationError> {
        Ok(self
            .templates
            .iter()
            .map(|(name, body)| (TemplateRef::new(name.as_str()), body.clone()))
            .collect())
    }
}

/// Renderer owns a Tera instance with every template and the config filters
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Parse all templates up front. A syntax error is a configuration error.
    pub fn new(store: &dyn TemplateStore) -> Result<Self, ConfigurationError> {
        let templates = store.load_all()?;
        let mut tera = Tera::default();
        tera.add_raw_templates(
            templates
                .iter()
                .map(|(name, body)| (name.as_str(), body.as_str())),
        )
        .map_err(|e| ConfigurationError::InvalidTemplate {
            location: store.location(),
            reason: error_chain(&e),
        })?;

        tera.register_filter("stp_root", stp_root_filter);
        tera.register_filter("unique_by", unique_by_filter);
        tera.register_filter("first_part", first_part_filter);
        tera.register_filter("vlan_range", vlan_range_filter);

        Ok(Self { tera })
    }

    pub fn render(&self, template: &TemplateRef, ctx: &RenderContext) -> Result<String, RenderError> {
        tracing::debug!("Rendering {} for {} ({} values)", template, ctx.device(), ctx.len());
        self.tera
            .render(template.as_str(), &ctx.to_tera())
            .map_err(|e| {
                let reason = error_chain(&e);
                match missing_variable(&reason) {
                    Some(field) => RenderError::MissingField {
                        device: ctx.device().to_string(),
                        template: template.to_string(),
                        field,
                    },
                    None => RenderError::Template {
                        device: ctx.device().to_string(),
                        template: template.to_string(),
                        reason,
                    },
                }
            })
    }
}

/// Tera nests the useful message in the source chain
fn error_chain(err: &tera::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

fn missing_variable(message: &str) -> Option<String> {
    let re = regex_lite::Regex::new(r"Variable `([^`]+)` not found").ok()?;
    re.captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// `{{ device_name | stp_root }}`: true for spine, core and cs names
fn stp_root_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    Ok(Value::Bool(is_stp_root_name(&text)))
}

/// `{{ links | unique_by(attribute="remote_device") }}`: first item per attribute value
fn unique_by_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let items = value
        .as_array()
        .ok_or_else(|| tera::Error::msg("unique_by expects a list"))?;
    let attribute = args
        .get("attribute")
        .and_then(Value::as_str)
        .ok_or_else(|| tera::Error::msg("unique_by requires attribute=\"...\""))?;

    let null = Value::Null;
    let mut seen: Vec<&Value> = Vec::new();
    let mut unique = Vec::new();
    for item in items {
        let key = item.get(attribute).unwrap_or(&null);
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        unique.push(item.clone());
    }
    Ok(Value::Array(unique))
}

/// `{{ name | first_part(sep="-") }}`: text before the first separator
fn first_part_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("first_part expects a string"))?;
    let sep = args.get("sep").and_then(Value::as_str).unwrap_or("_");
    let first = text.split(sep).next().unwrap_or(text);
    Ok(Value::String(first.to_string()))
}

/// `{{ vlans | vlan_range }}`: "10 to 12 20" from a list or a "10-12,20" string
fn vlan_range_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let mut ids: Vec<u16> = Vec::new();
    let mut add = |text: &str| -> tera::Result<()> {
        let parsed = parse_vlan_list(text)
            .ok_or_else(|| tera::Error::msg(format!("vlan_range: invalid VLAN list '{}'", text)))?;
        ids.extend(parsed);
        Ok(())
    };
    match value {
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(s) => add(s)?,
                    Value::Number(n) => add(&n.to_string())?,
                    Value::Null => {}
                    other => {
                        return Err(tera::Error::msg(format!("vlan_range: unexpected {}", other)))
                    }
                }
            }
        }
        Value::String(s) => add(s)?,
        Value::Number(n) => add(&n.to_string())?,
        Value::Null => {}
        other => return Err(tera::Error::msg(format!("vlan_range: unexpected {}", other))),
    }
    Ok(Value::String(compact_vlan_ranges(&ids)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextBuilder;
    use crate::lld::DeviceTables;
    use crate::models::{CanonicalModel, DeviceRecord, LinkEndpoint, LinkRecord};
    use crate::supplementary::SupplementaryData;

    fn context() -> RenderContext {
        let mut device = DeviceRecord::new("DC1-CE16808-SPINE-01");
        device.role = Some("spine".into());
        device.management_ip = Some("10.0.0.1".into());
        let links = [
            LinkRecord {
                local: LinkEndpoint { device: device.name.clone(), interface: "100GE1/0/1".into() },
                remote: LinkEndpoint { device: "LEAF-01".into(), interface: "100GE1/0/49".into() },
                purpose: None,
                vlan: Some("10-12".into()),
                subnet: None,
            },
            LinkRecord {
                local: LinkEndpoint { device: device.name.clone(), interface: "100GE1/0/2".into() },
                remote: LinkEndpoint { device: "LEAF-01".into(), interface: "100GE1/0/50".into() },
                purpose: None,
                vlan: Some("20".into()),
                subnet: None,
            },
        ];
        let refs: Vec<&LinkRecord> = links.iter().collect();
        let supp = SupplementaryData::default();
        let builder = ContextBuilder::new(&supp);
        builder.finish(
            builder.build(&device, &refs, &DeviceTables::new()),
            &CanonicalModel::new("CE168XX"),
            &TemplateRef::new("spine.j2"),
            None,
        )
    }

    fn renderer(templates: &[(&str, &str)]) -> Renderer {
        let mut store = MemoryTemplateStore::new();
        for (name, body) in templates {
            store.insert(name, body);
        }
        Renderer::new(&store).unwrap()
    }

    #[test]
    fn test_render_is_deterministic() {
        let r = renderer(&[(
            "spine.j2",
            "sysname {{ device_name }}\n{% for l in links %}interface {{ l.local_interface }}\n{% endfor %}",
        )]);
        let ctx = context();
        let t = TemplateRef::new("spine.j2");
        let first = r.render(&t, &ctx).unwrap();
        assert_eq!(first, r.render(&t, &ctx).unwrap());
        assert!(first.starts_with("sysname DC1-CE16808-SPINE-01\n"));
        assert!(first.contains("interface 100GE1/0/2"));
    }

    #[test]
    fn test_missing_field_names_device_and_field() {
        let r = renderer(&[("spine.j2", "ip route-static 0.0.0.0 0 {{ manage_gw_ip }}")]);
        let err = r.render(&TemplateRef::new("spine.j2"), &context()).unwrap_err();
        assert_eq!(
            err,
            RenderError::MissingField {
                device: "DC1-CE16808-SPINE-01".into(),
                template: "spine.j2".into(),
                field: "manage_gw_ip".into(),
            }
        );
    }

    #[test]
    fn test_template_default_covers_missing_field() {
        let r = renderer(&[("spine.j2", "vrf {{ manage_vrf_name | default(value=\"MGMT\") }}")]);
        assert_eq!(r.render(&TemplateRef::new("spine.j2"), &context()).unwrap(), "vrf MGMT");
    }

    #[test]
    fn test_if_guard_is_a_template_default() {
        let r = renderer(&[
            ("guarded.j2", "a{% if option_snmp %}snmp-agent {{ snmp_target_host }}{% endif %}b"),
            ("taken.j2", "a{% if device_name %}snmp-agent {{ snmp_target_host }}{% endif %}b"),
        ]);
        let ctx = context();
        // an undefined guard skips its block
        assert_eq!(r.render(&TemplateRef::new("guarded.j2"), &ctx).unwrap(), "ab");
        // fields inside a taken block are still required
        assert!(matches!(
            r.render(&TemplateRef::new("taken.j2"), &ctx),
            Err(RenderError::MissingField { ref field, .. }) if field == "snmp_target_host"
        ));
    }

    #[test]
    fn test_filters() {
        let r = renderer(&[(
            "spine.j2",
            "{{ device_name | stp_root }}|{{ links | unique_by(attribute=\"remote_device\") | length }}|{{ \"CE168XX_spine\" | first_part }}|{{ links | map(attribute=\"vlan\") | vlan_range }}",
        )]);
        assert_eq!(
            r.render(&TemplateRef::new("spine.j2"), &context()).unwrap(),
            "true|1|CE168XX|10 to 12 20"
        );
    }

    #[test]
    fn test_templates_can_include_each_other() {
        let r = renderer(&[
            ("common.j2", "sysname {{ device_name }}"),
            ("spine.j2", "{% include \"common.j2\" %}\nstp root primary"),
        ]);
        assert_eq!(
            r.render(&TemplateRef::new("spine.j2"), &context()).unwrap(),
            "sysname DC1-CE16808-SPINE-01\nstp root primary"
        );
    }

    #[test]
    fn test_syntax_error_is_config_error() {
        let mut store = MemoryTemplateStore::new();
        store.insert("broken.j2", "{% for x in %}");
        assert!(matches!(
            Renderer::new(&store),
            Err(ConfigurationError::InvalidTemplate { .. })
        ));
    }

    #[test]
    fn test_dir_store_lists_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("base.j2"), "x").unwrap();
        std::fs::write(dir.path().join(".hidden"), "y").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let store = DirTemplateStore::new(dir.path());
        assert!(store.contains(&TemplateRef::new("base.j2")));
        assert!(!store.contains(&TemplateRef::new("sub")));
        let names: Vec<String> = store
            .load_all()
            .unwrap()
            .into_iter()
            .map(|(n, _)| n.to_string())
            .collect();
        assert_eq!(names, vec!["base.j2"]);
    }
}
