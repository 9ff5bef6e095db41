use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::utils::device_config_filename;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("device {device}: file {file} was already written for {other}")]
    Collision {
        device: String,
        file: String,
        other: String,
    },
    #[error("device {device}: cannot write {}: {reason}", path.display())]
    Io {
        device: String,
        path: PathBuf,
        reason: String,
    },
}

/// ConfigWriter puts one `<device>.txt` per device in the output directory
pub struct ConfigWriter {
    output_dir: PathBuf,
    written: HashMap<String, String>,
}

impl ConfigWriter {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            written: HashMap::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write (or overwrite) the config for `device`. A second device whose
    /// name maps to the same file in this run is rejected.
    pub fn write(&mut self, device: &str, text: &str) -> Result<PathBuf, WriteError> {
        let filename = device_config_filename(device);
        if let Some(other) = self.written.get(&filename) {
            return Err(WriteError::Collision {
                device: device.to_string(),
                file: filename,
                other: other.clone(),
            });
        }

        let io_err = |path: &Path, e: std::io::Error| WriteError::Io {
            device: device.to_string(),
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        std::fs::create_dir_all(&self.output_dir).map_err(|e| io_err(&self.output_dir, e))?;

        let path = self.output_dir.join(&filename);
        std::fs::write(&path, text).map_err(|e| io_err(&path, e))?;

        tracing::debug!("Wrote {} ({} bytes)", path.display(), text.len());
        self.written.insert(filename, device.to_string());
        Ok(path)
    }

    /// Remove the config an earlier run left for `device`, so a device that
    /// failed in this run has no file. A file written in this run is kept.
    pub fn discard(&self, device: &str) -> Result<Option<PathBuf>, WriteError> {
        let filename = device_config_filename(device);
        if self.written.contains_key(&filename) {
            return Ok(None);
        }
        let path = self.output_dir.join(&filename);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Removed stale {}", path.display());
                Ok(Some(path))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WriteError::Io {
                device: device.to_string(),
                path,
                reason: e.to_string(),
            }),
        }
    }
}
