//! Command implementations for the lld-forge CLI

pub mod init;
pub mod lld;
pub mod run;

use anyhow::Result;

use crate::config::Settings;
use crate::lld::{Extractor, LldData, WorkbookSource};

/// Open the configured LLD workbook and extract its devices and links
fn extract(settings: &Settings) -> Result<LldData> {
    let path = settings.lld_path()?;
    tracing::info!("Reading LLD {}", path.display());
    let mut source = WorkbookSource::open(&path)?;
    Ok(Extractor::new(&settings.layout).extract(&mut source)?)
}

#[cfg(test)]
pub(crate) mod test_project {
    use rust_xlsxwriter::Workbook;
    use std::path::{Path, PathBuf};

    pub const SETTINGS: &str = r#"
lld_file_name: DC1_LLD.xlsx
model_mapping:
  CE168: CE168XX
  CE68: CE68XX
  S57: S57XX
template_mapping:
  CE168XX: spine.j2
  CE68XX: spine.j2
  S57XX: access.j2
  default: base.j2
model_profiles:
  S57XX:
    manage_int: MEth0/0/1
"#;

    fn write_row(sheet: &mut rust_xlsxwriter::Worksheet, row: u32, cells: &[&str]) {
        for (col, text) in cells.iter().enumerate() {
            if !text.is_empty() {
                sheet.write_string(row, col as u16, *text).unwrap();
            }
        }
    }

    /// A project dir with settings, templates and an LLD with `devices` rows
    /// (name, role, model, management ip). Returns the settings file path.
    pub fn create(dir: &Path, devices: &[[&str; 4]]) -> PathBuf {
        let settings_dir = dir.join("settings");
        std::fs::create_dir_all(&settings_dir).unwrap();
        let settings_path = settings_dir.join("settings.yaml");
        std::fs::write(&settings_path, SETTINGS).unwrap();

        let templates = dir.join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(
            templates.join("spine.j2"),
            "sysname {{ device_name }}\n{% for l in links %}interface {{ l.local_interface }}\n description to {{ l.remote_device }}\n{% endfor %}",
        )
        .unwrap();
        std::fs::write(
            templates.join("access.j2"),
            "sysname {{ device_name }}\ninterface {{ manage_int }}\n ip address {{ management_ip }}\n",
        )
        .unwrap();
        std::fs::write(templates.join("base.j2"), "sysname {{ device_name }}\n").unwrap();

        let data = dir.join("data");
        std::fs::create_dir_all(&data).unwrap();
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet().set_name("Devices").unwrap();
        write_row(sheet, 0, &["Device Name", "Role", "Model", "Management IP"]);
        for (i, device) in devices.iter().enumerate() {
            write_row(sheet, (i + 1) as u32, device);
        }
        let sheet = workbook.add_worksheet().set_name("Links").unwrap();
        write_row(
            sheet,
            0,
            &["Local Device", "Local Interface", "Remote Device", "Remote Interface", "VLAN"],
        );
        write_row(sheet, 1, &["LEAF-01", "100GE1/0/49", "SPINE-01", "100GE1/0/1", "10"]);
        workbook.save(data.join("DC1_LLD.xlsx")).unwrap();

        settings_path
    }

    pub fn standard(dir: &Path) -> PathBuf {
        create(
            dir,
            &[
                ["SPINE-01", "spine", "CE16808", "10.0.0.1"],
                ["LEAF-01", "leaf", "CE6881-48S6CQ", "10.0.0.11"],
                ["ACC-01", "access", "S5731-H48T4XC", "10.0.0.21"],
            ],
        )
    }
}
