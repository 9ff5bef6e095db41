use serde::{Deserialize, Serialize};

/// Canonical link purpose values
pub mod link_purpose {
    pub const INTER_SWITCH: &str = "inter-switch";
    pub const SERVER_FACING: &str = "server-facing";
    pub const PEER_LINK: &str = "peer-link";
    pub const UPLINK: &str = "uplink";
}

/// One end of a cable: the device name and its local interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEndpoint {
    pub device: String,
    pub interface: String,
}

/// LinkRecord is one row of the LLD topology sheet.
/// Endpoints hold device names only; they are not tied to DeviceRecords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub local: LinkEndpoint,
    pub remote: LinkEndpoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
}

/// A link as seen from one of its devices, handed to templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkView {
    pub local_interface: String,
    pub remote_device: String,
    pub remote_interface: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
}

impl LinkRecord {
    pub fn involves(&self, device: &str) -> bool {
        self.local.device == device || self.remote.device == device
    }

    /// View the link from `device`; the remote end is mirrored when `device`
    /// is on the remote side. Returns None if the device is not on this link.
    pub fn view_from(&self, device: &str) -> Option<LinkView> {
        let (near, far) = if self.local.device == device {
            (&self.local, &self.remote)
        } else if self.remote.device == device {
            (&self.remote, &self.local)
        } else {
            return None;
        };
        Some(LinkView {
            local_interface: near.interface.clone(),
            remote_device: far.device.clone(),
            remote_interface: far.interface.clone(),
            purpose: self.purpose.clone(),
            vlan: self.vlan.clone(),
            subnet: self.subnet.clone(),
        })
    }
}

/// Normalize a purpose cell to the canonical spelling where one exists
pub fn normalize_purpose(raw: &str) -> String {
    let lower = raw.trim().to_lowercase().replace(['_', ' '], "-");
    match lower.as_str() {
        "inter-switch" | "isl" | "fabric" => link_purpose::INTER_SWITCH.to_string(),
        "server-facing" | "server" | "downlink" => link_purpose::SERVER_FACING.to_string(),
        "peer-link" | "peerlink" | "m-lag" | "mlag" => link_purpose::PEER_LINK.to_string(),
        "uplink" => link_purpose::UPLINK.to_string(),
        _ => raw.trim().to_string(),
    }
}
