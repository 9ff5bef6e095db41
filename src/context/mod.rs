use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::lld::DeviceTables;
use crate::models::{CanonicalModel, DeviceRecord, LinkRecord, LinkView, TemplateRef};
use crate::supplementary::{Fields, SupplementaryData};
use crate::utils::{compact_vlan_ranges, ipv4_to_host_name, is_stp_root_name, parse_vlan_list};

/// Which layer a context value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    Defaults,
    Lld,
    Profile,
    Device,
    Derived,
}

/// RenderContext is the full set of values one template sees
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    device: String,
    values: BTreeMap<String, Value>,
    provenance: BTreeMap<String, ValueSource>,
}

impl RenderContext {
    fn new(device: &str) -> Self {
        Self {
            device: device.to_string(),
            values: BTreeMap::new(),
            provenance: BTreeMap::new(),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String value of a field, if set and a string
    pub fn str_value(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn source(&self, key: &str) -> Option<ValueSource> {
        self.provenance.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    fn set(&mut self, key: &str, value: Value, source: ValueSource) {
        self.values.insert(key.to_string(), value);
        self.provenance.insert(key.to_string(), source);
    }

    /// Set only if nothing has supplied the key yet
    fn fill(&mut self, key: &str, value: Value, source: ValueSource) {
        if !self.values.contains_key(key) {
            self.set(key, value, source);
        }
    }

    /// Tera context with every value at the top level
    pub fn to_tera(&self) -> tera::Context {
        let mut ctx = tera::Context::new();
        for (key, value) in &self.values {
            ctx.insert(key.as_str(), value);
        }
        ctx
    }
}

/// ContextBuilder merges LLD records with the operator's device data.
///
/// Values are layered, lowest to highest priority:
/// 1. supplementary `defaults`
/// 2. LLD fields, attributes and per-device tables
/// 3. model profile (only over unset or default values)
/// 4. supplementary per-device fields
///
/// Derived fields (`device_name`, `links`, `vlans`, ...) come last and every
/// value remembers which layer it came from.
pub struct ContextBuilder<'a> {
    supplementary: &'a SupplementaryData,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(supplementary: &'a SupplementaryData) -> Self {
        Self { supplementary }
    }

    /// Merge defaults, LLD values and per-device data for one device.
    /// Only this device's entries are consulted.
    pub fn build(
        &self,
        device: &DeviceRecord,
        links: &[&LinkRecord],
        tables: &DeviceTables,
    ) -> RenderContext {
        let mut ctx = RenderContext::new(&device.name);

        for (key, value) in self.supplementary.defaults() {
            ctx.set(key, value.clone(), ValueSource::Defaults);
        }

        for (key, value) in device.fields() {
            ctx.set(key, Value::String(value.to_string()), ValueSource::Lld);
        }
        for (key, value) in &device.attributes {
            ctx.set(key, Value::String(value.clone()), ValueSource::Lld);
        }
        for (name, rows) in tables {
            ctx.set(name, serde_json::to_value(rows).unwrap_or_default(), ValueSource::Lld);
        }

        for (key, value) in self.supplementary.for_device(&device.name) {
            ctx.set(key, value.clone(), ValueSource::Device);
        }

        let views: Vec<LinkView> = links.iter().filter_map(|l| l.view_from(&device.name)).collect();
        ctx.set("device_name", Value::String(device.name.clone()), ValueSource::Derived);
        ctx.set("links", serde_json::to_value(&views).unwrap_or_default(), ValueSource::Derived);

        let mut vlans: Vec<u16> = Vec::new();
        for view in &views {
            let Some(raw) = view.vlan.as_deref() else {
                continue;
            };
            match parse_vlan_list(raw) {
                Some(ids) => vlans.extend(ids),
                None => tracing::debug!("Device {}: ignoring link VLAN '{}'", device.name, raw),
            }
        }
        vlans.sort_unstable();
        vlans.dedup();
        ctx.fill("vlan_batch", Value::String(compact_vlan_ranges(&vlans)), ValueSource::Derived);
        ctx.fill("vlans", Value::from(vlans), ValueSource::Derived);

        ctx
    }

    /// Attach the model selection, apply the model profile and compute the
    /// fields that depend on the final values
    pub fn finish(
        &self,
        mut ctx: RenderContext,
        canonical: &CanonicalModel,
        template: &TemplateRef,
        profile: Option<&Fields>,
    ) -> RenderContext {
        if let Some(profile) = profile {
            for (key, value) in profile {
                if value.is_null() {
                    continue;
                }
                match ctx.source(key) {
                    None | Some(ValueSource::Defaults) => {
                        ctx.set(key, value.clone(), ValueSource::Profile)
                    }
                    Some(_) => {}
                }
            }
        }

        ctx.set("canonical_model", Value::String(canonical.to_string()), ValueSource::Derived);
        ctx.set("template", Value::String(template.to_string()), ValueSource::Derived);

        let stp_root = [ctx.str_value("role"), Some(ctx.device())]
            .into_iter()
            .flatten()
            .any(is_stp_root_name);
        ctx.fill("is_stp_root", Value::Bool(stp_root), ValueSource::Derived);

        let host_name = ctx.str_value("snmp_target_host").and_then(ipv4_to_host_name);
        if let Some(host_name) = host_name {
            ctx.fill("snmp_target_host_name", Value::String(host_name), ValueSource::Derived);
        }

        for (key, source) in &ctx.provenance {
            tracing::trace!("Device {}: {} <- {:?}", ctx.device, key, source);
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LinkEndpoint;
    use serde_json::json;

    fn leaf() -> DeviceRecord {
        let mut d = DeviceRecord::new("LEAF-01");
        d.role = Some("leaf".into());
        d.raw_model = Some("CE6881".into());
        d.management_ip = Some("10.0.0.11".into());
        d.attributes.insert("bmc_vlan".into(), "100".into());
        d
    }

    fn link(local: &str, remote: &str, vlan: Option<&str>) -> LinkRecord {
        LinkRecord {
            local: LinkEndpoint { device: local.into(), interface: "100GE1/0/1".into() },
            remote: LinkEndpoint { device: remote.into(), interface: "100GE1/0/49".into() },
            purpose: Some("inter-switch".into()),
            vlan: vlan.map(str::to_string),
            subnet: None,
        }
    }

    fn data(yaml: &str) -> SupplementaryData {
        SupplementaryData::from_yaml_str(yaml).unwrap()
    }

    fn finish(builder: &ContextBuilder, ctx: RenderContext, profile: Option<&Fields>) -> RenderContext {
        builder.finish(ctx, &CanonicalModel::new("CE68XX"), &TemplateRef::new("leaf.j2"), profile)
    }

    #[test]
    fn test_lld_value_kept_without_supplement() {
        let supp = SupplementaryData::default();
        let ctx = ContextBuilder::new(&supp).build(&leaf(), &[], &DeviceTables::new());
        assert_eq!(ctx.str_value("management_ip"), Some("10.0.0.11"));
        assert_eq!(ctx.source("management_ip"), Some(ValueSource::Lld));
        assert_eq!(ctx.str_value("bmc_vlan"), Some("100"));
    }

    #[test]
    fn test_supplement_overrides_lld() {
        let supp = data("devices:\n  LEAF-01:\n    management_ip: 10.9.9.9\n    site:\n");
        let ctx = ContextBuilder::new(&supp).build(&leaf(), &[], &DeviceTables::new());
        assert_eq!(ctx.str_value("management_ip"), Some("10.9.9.9"));
        assert_eq!(ctx.source("management_ip"), Some(ValueSource::Device));
        // null means not supplied
        assert_eq!(ctx.get("site"), None);
    }

    #[test]
    fn test_defaults_lose_to_lld() {
        let supp = data("defaults:\n  role: access\n  sftp: true\n");
        let ctx = ContextBuilder::new(&supp).build(&leaf(), &[], &DeviceTables::new());
        assert_eq!(ctx.str_value("role"), Some("leaf"));
        assert_eq!(ctx.get("sftp"), Some(&json!(true)));
    }

    #[test]
    fn test_tables_become_lists() {
        let routes: Vec<crate::lld::TableRow> = vec![
            [("destination".to_string(), "0.0.0.0".to_string()), ("next_hop".to_string(), "10.1.1.1".to_string())].into(),
        ];
        let mut tables = DeviceTables::new();
        tables.insert("static_routes", routes.as_slice());
        tables.insert("vrfs", &[]);

        let supp = data("defaults:\n  static_routes: []\n");
        let ctx = ContextBuilder::new(&supp).build(&leaf(), &[], &tables);
        assert_eq!(
            ctx.get("static_routes"),
            Some(&json!([{"destination": "0.0.0.0", "next_hop": "10.1.1.1"}]))
        );
        assert_eq!(ctx.source("static_routes"), Some(ValueSource::Lld));
        assert_eq!(ctx.get("vrfs"), Some(&json!([])));
    }

    #[test]
    fn test_other_devices_entries_ignored() {
        let supp = data("devices:\n  GHOST-01:\n    management_ip: 1.1.1.1\n");
        let ctx = ContextBuilder::new(&supp).build(&leaf(), &[], &DeviceTables::new());
        assert_eq!(ctx.str_value("management_ip"), Some("10.0.0.11"));
    }

    #[test]
    fn test_build_is_repeatable() {
        let supp = data("defaults:\n  sftp: true\ndevices:\n  LEAF-01:\n    manage_gw_ip: 10.0.0.254\n");
        let links = [link("LEAF-01", "SPINE-01", Some("10"))];
        let refs: Vec<&LinkRecord> = links.iter().collect();
        let builder = ContextBuilder::new(&supp);
        let tables = DeviceTables::new();
        assert_eq!(builder.build(&leaf(), &refs, &tables), builder.build(&leaf(), &refs, &tables));
    }

    #[test]
    fn test_profile_fills_gaps_only() {
        let supp = data("defaults:\n  manage_int: GE0/0/0\ndevices:\n  LEAF-01:\n    option_global_vlan: true\n");
        let mut profile = Fields::new();
        profile.insert("manage_int".into(), json!("MEth0/0/1"));
        profile.insert("option_global_vlan".into(), json!(false));
        profile.insert("role".into(), json!("spine"));
        profile.insert("stack".into(), json!(2));

        let builder = ContextBuilder::new(&supp);
        let ctx = finish(&builder, builder.build(&leaf(), &[], &DeviceTables::new()), Some(&profile));

        assert_eq!(ctx.str_value("manage_int"), Some("MEth0/0/1"));
        assert_eq!(ctx.get("option_global_vlan"), Some(&json!(true)));
        assert_eq!(ctx.str_value("role"), Some("leaf"));
        assert_eq!(ctx.get("stack"), Some(&json!(2)));
        assert_eq!(ctx.source("stack"), Some(ValueSource::Profile));
    }

    #[test]
    fn test_links_are_seen_from_this_device() {
        let links = [
            link("LEAF-01", "SPINE-01", Some("10-12")),
            link("SPINE-02", "LEAF-01", Some("20")),
            link("LEAF-02", "SPINE-01", Some("30")),
        ];
        let refs: Vec<&LinkRecord> = links.iter().collect();
        let supp = SupplementaryData::default();
        let ctx = ContextBuilder::new(&supp).build(&leaf(), &refs, &DeviceTables::new());

        let views = ctx.get("links").unwrap().as_array().unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[1]["remote_device"], json!("SPINE-02"));
        assert_eq!(views[1]["local_interface"], json!("100GE1/0/49"));
        assert_eq!(ctx.get("vlans"), Some(&json!([10, 11, 12, 20])));
        assert_eq!(ctx.str_value("vlan_batch"), Some("10 to 12 20"));
    }

    #[test]
    fn test_derived_fields() {
        let supp = data("devices:\n  LEAF-01:\n    snmp_target_host: 10.1.1.1\n");
        let builder = ContextBuilder::new(&supp);
        let ctx = finish(&builder, builder.build(&leaf(), &[], &DeviceTables::new()), None);

        assert_eq!(ctx.str_value("device_name"), Some("LEAF-01"));
        assert_eq!(ctx.str_value("canonical_model"), Some("CE68XX"));
        assert_eq!(ctx.str_value("template"), Some("leaf.j2"));
        assert_eq!(ctx.get("is_stp_root"), Some(&json!(false)));
        assert_eq!(ctx.str_value("snmp_target_host_name"), Some("host_name0a010101"));
    }

    #[test]
    fn test_spine_is_stp_root() {
        let mut spine = DeviceRecord::new("DC1-CE16808-SPINE-01");
        spine.role = Some("spine".into());
        let supp = SupplementaryData::default();
        let builder = ContextBuilder::new(&supp);
        let ctx = finish(&builder, builder.build(&spine, &[], &DeviceTables::new()), None);
        assert_eq!(ctx.get("is_stp_root"), Some(&json!(true)));
    }

    #[test]
    fn test_supplied_host_name_is_kept() {
        let supp = data(
            "devices:\n  LEAF-01:\n    snmp_target_host: 10.1.1.1\n    snmp_target_host_name: nms01\n",
        );
        let builder = ContextBuilder::new(&supp);
        let ctx = finish(&builder, builder.build(&leaf(), &[], &DeviceTables::new()), None);
        assert_eq!(ctx.str_value("snmp_target_host_name"), Some("nms01"));
    }

    #[test]
    fn test_tera_context_has_every_value() {
        let supp = SupplementaryData::default();
        let ctx = ContextBuilder::new(&supp).build(&leaf(), &[], &DeviceTables::new());
        let tera_ctx = ctx.to_tera();
        assert!(tera_ctx.contains_key("management_ip"));
        assert!(tera_ctx.contains_key("links"));
        assert!(!tera_ctx.contains_key("site"));
    }
}
