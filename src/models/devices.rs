use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical fabric role values
pub mod device_role {
    pub const SPINE: &str = "spine";
    pub const LEAF: &str = "leaf";
    pub const BORDER: &str = "border";
    pub const ACCESS: &str = "access";
    pub const CORE: &str = "core";

    pub const ALL: &[&str] = &[SPINE, LEAF, BORDER, ACCESS, CORE];

    /// Normalize a role cell: known roles are lowercased, anything else is kept as written
    pub fn normalize(role: &str) -> String {
        let lower = role.trim().to_lowercase();
        if ALL.contains(&lower.as_str()) {
            lower
        } else {
            role.trim().to_string()
        }
    }

    /// Best-effort role from a device name like "DC1-CE16808-LEAF-01"
    pub fn infer_from_name(name: &str) -> Option<&'static str> {
        let lower = name.to_lowercase();
        ALL.iter().copied().find(|role| lower.contains(role))
    }
}

/// DeviceRecord is one switch from the LLD device inventory.
/// Unset cells stay `None`; they never become empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_mask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_vlan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loopback_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rack: Option<String>,
    /// LLD columns without a dedicated field, keyed by snake_cased header
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl DeviceRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
            raw_model: None,
            management_ip: None,
            management_mask: None,
            management_vlan: None,
            loopback_ip: None,
            site: None,
            rack: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Named fields as (context key, value) pairs, unset fields skipped
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        let named: [(&'static str, &Option<String>); 8] = [
            ("role", &self.role),
            ("model", &self.raw_model),
            ("management_ip", &self.management_ip),
            ("management_mask", &self.management_mask),
            ("management_vlan", &self.management_vlan),
            ("loopback_ip", &self.loopback_ip),
            ("site", &self.site),
            ("rack", &self.rack),
        ];
        named
            .into_iter()
            .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
            .collect()
    }

    /// Fold a second row for the same device into this one. Cells set on only
    /// one row are kept; a field set to different values on both rows is
    /// returned as the conflict.
    pub fn merge_duplicate(&mut self, other: DeviceRecord) -> Result<(), String> {
        let pairs: [(&str, &mut Option<String>, Option<String>); 8] = [
            ("role", &mut self.role, other.role),
            ("model", &mut self.raw_model, other.raw_model),
            ("management_ip", &mut self.management_ip, other.management_ip),
            ("management_mask", &mut self.management_mask, other.management_mask),
            ("management_vlan", &mut self.management_vlan, other.management_vlan),
            ("loopback_ip", &mut self.loopback_ip, other.loopback_ip),
            ("site", &mut self.site, other.site),
            ("rack", &mut self.rack, other.rack),
        ];
        let mut fills = Vec::new();
        for (field, mine, theirs) in pairs {
            let Some(theirs) = theirs else {
                continue;
            };
            if mine.is_none() {
                fills.push((mine, theirs));
            } else if mine.as_deref() != Some(theirs.as_str()) {
                return Err(field.to_string());
            }
        }
        for (key, value) in &other.attributes {
            match self.attributes.get(key) {
                Some(existing) if existing != value => return Err(key.clone()),
                _ => {}
            }
        }

        for (slot, value) in fills {
            *slot = Some(value);
        }
        for (key, value) in other.attributes {
            self.attributes.entry(key).or_insert(value);
        }
        Ok(())
    }
}
