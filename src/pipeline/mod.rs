use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::Settings;
use crate::context::ContextBuilder;
use crate::lld::LldData;
use crate::models::{DeviceFailure, DeviceRecord, GeneratedConfig, RunOutcome, RunReport};
use crate::render::{RenderError, Renderer};
use crate::resolve::{AmbiguousMappingError, ModelMappingError, UnknownModelError};
use crate::supplementary::SupplementaryData;
use crate::writer::{ConfigWriter, WriteError};

pub const REPORT_FILE: &str = "generation-report.json";

/// Why one device produced no config
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error(transparent)]
    UnknownModel(#[from] UnknownModelError),
    #[error(transparent)]
    AmbiguousMapping(#[from] AmbiguousMappingError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

impl From<ModelMappingError> for DeviceError {
    fn from(err: ModelMappingError) -> Self {
        match err {
            ModelMappingError::Unknown(e) => DeviceError::UnknownModel(e),
            ModelMappingError::Ambiguous(e) => DeviceError::AmbiguousMapping(e),
        }
    }
}

/// Pipeline runs generation for one LLD with loaded settings and templates.
///
/// For every selected device: build context, map model, pick template,
/// render, write. A failing device is recorded in the [`RunReport`], any
/// config an earlier run left for it is removed, and the run moves on.
pub struct Pipeline<'a> {
    settings: &'a Settings,
    renderer: &'a Renderer,
    supplementary: &'a SupplementaryData,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a Settings,
        renderer: &'a Renderer,
        supplementary: &'a SupplementaryData,
    ) -> Self {
        Self {
            settings,
            renderer,
            supplementary,
        }
    }

    /// Generate every selected device, collecting failures instead of stopping
    pub fn run(&self, lld: &LldData, writer: &mut ConfigWriter) -> RunReport {
        let started_at = Utc::now();
        let devices = self.supplementary.select(&lld.devices);
        tracing::info!(
            "Generating configs for {} devices into {}",
            devices.len(),
            writer.output_dir().display()
        );

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for device in &devices {
            tracing::debug!("Processing {}", device.name);
            match self.generate(device, lld, writer) {
                Ok(generated) => {
                    tracing::info!("{} -> {} ({})", device.name, generated.file, generated.template);
                    succeeded.push(generated);
                }
                Err(e) => {
                    tracing::warn!("{} failed: {}", device.name, e);
                    match writer.discard(&device.name) {
                        Ok(Some(path)) => {
                            tracing::info!("{}: removed previous config {}", device.name, path.display())
                        }
                        Ok(None) => {}
                        Err(discard) => tracing::warn!("{}", discard),
                    }
                    failed.push(DeviceFailure {
                        device: device.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        RunReport {
            started_at,
            finished_at: Utc::now(),
            total: devices.len(),
            eligible: lld.devices.len(),
            succeeded,
            failed,
        }
    }

    fn generate(
        &self,
        device: &DeviceRecord,
        lld: &LldData,
        writer: &mut ConfigWriter,
    ) -> Result<GeneratedConfig, DeviceError> {
        let builder = ContextBuilder::new(self.supplementary);
        let ctx = builder.build(
            device,
            &lld.links_for(&device.name),
            &lld.tables_for(&device.name),
        );

        // the operator may correct the model in the device data
        let raw_model = ctx.str_value("model").unwrap_or_default().to_string();
        let canonical = self.settings.model_mapping.map(&device.name, &raw_model)?;
        let template = self.settings.template_mapping.resolve(&canonical).clone();

        let ctx = builder.finish(
            ctx,
            &canonical,
            &template,
            self.settings.profile_for(&canonical),
        );
        let text = self.renderer.render(&template, &ctx)?;
        let path = writer.write(&device.name, &text)?;

        Ok(GeneratedConfig {
            device: device.name.clone(),
            canonical_model: canonical.to_string(),
            template: template.to_string(),
            file: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })
    }
}

#[derive(Serialize)]
struct ReportFile<'a> {
    outcome: RunOutcome,
    #[serde(flatten)]
    report: &'a RunReport,
}

/// Save the report as JSON next to the logs, replacing the previous one
pub fn write_report(report: &RunReport, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report dir {}", dir.display()))?;
    let path = dir.join(REPORT_FILE);
    let body = serde_json::to_string_pretty(&ReportFile {
        outcome: report.outcome(),
        report,
    })?;
    std::fs::write(&path, body)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(path)
}
