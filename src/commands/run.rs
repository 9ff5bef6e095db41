use anyhow::Result;

use crate::config::Settings;
use crate::models::RunReport;
use crate::pipeline::{write_report, Pipeline};
use crate::render::{DirTemplateStore, Renderer};
use crate::supplementary::SupplementaryData;
use crate::writer::ConfigWriter;

/// Run the full pipeline and print the summary.
/// Configuration and LLD problems are returned as errors before any device is processed.
pub fn run(settings: &Settings) -> Result<RunReport> {
    let templates_dir = settings.templates_path();
    let store = DirTemplateStore::new(&templates_dir);
    settings.template_mapping.verify_against(&store)?;
    tracing::debug!(
        "Templates in {} verified, default {}",
        templates_dir.display(),
        settings.template_mapping.default_template()
    );
    let renderer = Renderer::new(&store)?;

    let lld = super::extract(settings)?;
    let supplementary = SupplementaryData::load(&settings.supplementary_path())?;

    let mut writer = ConfigWriter::new(&settings.output_path());
    let report = Pipeline::new(settings, &renderer, &supplementary).run(&lld, &mut writer);

    print!("{}", report.summary());
    match write_report(&report, &settings.logs_path()) {
        Ok(path) => tracing::debug!("Report written to {}", path.display()),
        Err(e) => tracing::warn!("Could not write report: {:#}", e),
    }
    Ok(report)
}
