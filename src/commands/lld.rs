use anyhow::Result;
use std::path::Path;

use crate::cli::LldArgs;
use crate::config::Settings;

/// Point the settings file at a different LLD workbook
pub fn run(settings_path: &Path, args: LldArgs) -> Result<()> {
    let mut settings = Settings::load(settings_path)?;
    if let Some(name) = &args.name {
        settings.set_lld_file_name(name);
    }
    if let Some(file) = &args.file {
        settings.set_lld_file(file);
    }
    settings.save()?;

    match settings.lld_path() {
        Ok(path) => println!("LLD set to {}", path.display()),
        Err(e) => {
            tracing::warn!("{}", e);
            println!("LLD setting saved, but {}", e);
        }
    }
    Ok(())
}
