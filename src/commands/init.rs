use anyhow::Result;

use crate::config::Settings;
use crate::lld::export_snapshot;
use crate::supplementary::SupplementaryData;

/// Extract the LLD, regenerate the device data file and write the device snapshot
pub fn run(settings: &Settings) -> Result<()> {
    let lld = super::extract(settings)?;

    let data_path = settings.supplementary_path();
    let existing = if data_path.exists() {
        SupplementaryData::load(&data_path)?
    } else {
        SupplementaryData::default()
    };
    let fresh =
        SupplementaryData::regenerate(&existing, &lld.devices, &settings.supplementary_fields);
    fresh.write(&data_path)?;

    let snapshot_path = settings.snapshot_path();
    export_snapshot(&snapshot_path, &lld.devices)?;

    println!(
        "{} devices extracted\n  device data: {}\n  snapshot:    {}",
        lld.devices.len(),
        data_path.display(),
        snapshot_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_project;

    #[test]
    fn test_init_writes_device_data_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&test_project::standard(dir.path())).unwrap();

        run(&settings).unwrap();

        let data = SupplementaryData::load(&settings.supplementary_path()).unwrap();
        let names: Vec<&str> = data.devices.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["ACC-01", "LEAF-01", "SPINE-01"]);
        assert!(settings.snapshot_path().is_file());
    }

    #[test]
    fn test_init_keeps_operator_values() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&test_project::standard(dir.path())).unwrap();
        std::fs::write(
            settings.supplementary_path(),
            "devices:\n  LEAF-01:\n    manage_gw_ip: 10.0.0.254\n  OLD-01:\n    manage_gw_ip: 1.1.1.1\n",
        )
        .unwrap();

        run(&settings).unwrap();

        let data = SupplementaryData::load(&settings.supplementary_path()).unwrap();
        assert_eq!(
            data.for_device("LEAF-01"),
            vec![("manage_gw_ip", &serde_json::json!("10.0.0.254"))]
        );
        assert!(!data.devices.contains_key("OLD-01"));
    }
}
