use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook};
use std::collections::BTreeSet;
use std::path::Path;

use crate::models::DeviceRecord;

const SNAPSHOT_SHEET: &str = "Devices";

const FIXED_COLUMNS: [&str; 9] = [
    "Device Name",
    "Role",
    "Model",
    "Management IP",
    "Management Mask",
    "Management VLAN",
    "Loopback IP",
    "Site",
    "Rack",
];

/// Write the extracted inventory to a device-management workbook.
/// An existing file is replaced, never appended to.
pub fn export_snapshot(path: &Path, devices: &[DeviceRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create snapshot dir {}", parent.display()))?;
    }

    let attribute_keys: BTreeSet<&str> = devices
        .iter()
        .flat_map(|d| d.attributes.keys().map(String::as_str))
        .collect();

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let sheet = workbook
        .add_worksheet()
        .set_name(SNAPSHOT_SHEET)
        .context("Failed to name snapshot sheet")?;

    let headers = FIXED_COLUMNS.iter().copied().chain(attribute_keys.iter().copied());
    for (col, header) in headers.enumerate() {
        sheet
            .write_string_with_format(0, col as u16, header, &header_format)
            .context("Failed to write snapshot header")?;
    }

    for (i, device) in devices.iter().enumerate() {
        let row = (i + 1) as u32;
        let fixed = [
            Some(device.name.as_str()),
            device.role.as_deref(),
            device.raw_model.as_deref(),
            device.management_ip.as_deref(),
            device.management_mask.as_deref(),
            device.management_vlan.as_deref(),
            device.loopback_ip.as_deref(),
            device.site.as_deref(),
            device.rack.as_deref(),
        ];
        let attributes = attribute_keys
            .iter()
            .map(|key| device.attributes.get(*key).map(String::as_str));

        for (col, cell) in fixed.into_iter().chain(attributes).enumerate() {
            if let Some(text) = cell {
                sheet
                    .write_string(row, col as u16, text)
                    .with_context(|| format!("Failed to write snapshot row for {}", device.name))?;
            }
        }
    }
    sheet.autofit();

    workbook
        .save(path)
        .with_context(|| format!("Failed to save snapshot {}", path.display()))?;
    tracing::info!("Device snapshot written to {} ({} devices)", path.display(), devices.len());
    Ok(())
}
