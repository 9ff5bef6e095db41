use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where the LLD keeps its tables and what the columns are called.
/// Every name here is matched against the workbook as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LldLayout {
    pub devices: DeviceSheetLayout,
    pub links: LinkSheetLayout,
    /// Per-device planning tables (VRFs, static routes, M-LAG, ...) keyed
    /// by the context name their rows are exposed under
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tables: BTreeMap<String, TableLayout>,
    /// Device-name substrings that are never generated (firewalls).
    /// Matched case-sensitively.
    pub exclude: Vec<String>,
}

impl Default for LldLayout {
    fn default() -> Self {
        Self {
            devices: DeviceSheetLayout::default(),
            links: LinkSheetLayout::default(),
            tables: BTreeMap::new(),
            exclude: vec!["USG".to_string(), "fw".to_string()],
        }
    }
}

/// Keep only rows whose `column` equals `value` (case-insensitive)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSheetLayout {
    pub sheet: String,
    /// The table starts on the row after the first row containing this text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_marker: Option<String>,
    /// The table ends before the first row (after the start) containing this text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_marker: Option<String>,
    pub columns: DeviceColumns,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<RowFilter>,
}

impl Default for DeviceSheetLayout {
    fn default() -> Self {
        Self {
            sheet: "Devices".to_string(),
            start_marker: None,
            end_marker: None,
            columns: DeviceColumns::default(),
            filter: None,
        }
    }
}

/// Header names of the device inventory. Only `name` is required;
/// the others become unset when the column is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceColumns {
    pub name: String,
    pub role: String,
    pub model: String,
    pub management_ip: String,
    pub management_mask: String,
    pub management_vlan: String,
    pub loopback_ip: String,
    pub site: String,
    pub rack: String,
}

impl Default for DeviceColumns {
    fn default() -> Self {
        Self {
            name: "Device Name".to_string(),
            role: "Role".to_string(),
            model: "Model".to_string(),
            management_ip: "Management IP".to_string(),
            management_mask: "Management Mask".to_string(),
            management_vlan: "Management VLAN".to_string(),
            loopback_ip: "Loopback IP".to_string(),
            site: "Site".to_string(),
            rack: "Rack".to_string(),
        }
    }
}

impl DeviceColumns {
    /// Every header that maps onto a named DeviceRecord field
    pub fn known(&self) -> [&str; 9] {
        [
            &self.name,
            &self.role,
            &self.model,
            &self.management_ip,
            &self.management_mask,
            &self.management_vlan,
            &self.loopback_ip,
            &self.site,
            &self.rack,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSheetLayout {
    pub sheet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_marker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_marker: Option<String>,
    pub columns: LinkColumns,
}

impl Default for LinkSheetLayout {
    fn default() -> Self {
        Self {
            sheet: "Links".to_string(),
            start_marker: None,
            end_marker: None,
            columns: LinkColumns::default(),
        }
    }
}

/// Header names of the topology sheet. Both endpoints are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkColumns {
    pub local_device: String,
    pub local_interface: String,
    pub remote_device: String,
    pub remote_interface: String,
    pub purpose: String,
    pub vlan: String,
    pub subnet: String,
}

impl Default for LinkColumns {
    fn default() -> Self {
        Self {
            local_device: "Local Device".to_string(),
            local_interface: "Local Interface".to_string(),
            remote_device: "Remote Device".to_string(),
            remote_interface: "Remote Interface".to_string(),
            purpose: "Purpose".to_string(),
            vlan: "VLAN".to_string(),
            subnet: "Subnet".to_string(),
        }
    }
}

/// A table with any number of rows per device. Every column is kept,
/// keyed by its snake_cased header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableLayout {
    pub sheet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_marker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_marker: Option<String>,
    /// Header of the column naming the device a row belongs to
    pub device_column: String,
    /// A missing sheet yields no rows instead of a source error
    #[serde(default)]
    pub optional: bool,
}
