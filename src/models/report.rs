use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a generation run ended as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    AllSucceeded,
    PartialFailure,
    NothingToGenerate,
}

/// A device that produced no config, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFailure {
    pub device: String,
    pub reason: String,
}

/// A device whose config was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedConfig {
    pub device: String,
    pub canonical_model: String,
    pub template: String,
    pub file: String,
}

/// RunReport summarizes one `run` over every extracted device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Devices in the selection
    pub total: usize,
    /// Devices the LLD offered before the selection was applied
    #[serde(default)]
    pub eligible: usize,
    pub succeeded: Vec<GeneratedConfig>,
    pub failed: Vec<DeviceFailure>,
}

impl RunReport {
    pub fn outcome(&self) -> RunOutcome {
        if self.total == 0 {
            RunOutcome::NothingToGenerate
        } else if self.failed.is_empty() {
            RunOutcome::AllSucceeded
        } else {
            RunOutcome::PartialFailure
        }
    }

    /// Human-readable summary printed at the end of `run`
    pub fn summary(&self) -> String {
        let mut out = String::new();
        if self.outcome() == RunOutcome::NothingToGenerate {
            if self.eligible == 0 {
                out.push_str("Nothing to generate: the LLD contains no eligible devices\n");
            } else {
                out.push_str(&format!(
                    "Nothing to generate: the device selection matches none of the {} LLD devices\n",
                    self.eligible
                ));
            }
            return out;
        }
        out.push_str(&format!(
            "Generated {} of {} device configs ({} failed)\n",
            self.succeeded.len(),
            self.total,
            self.failed.len()
        ));
        for ok in &self.succeeded {
            out.push_str(&format!(
                "  ok    {:<32} {:<10} {} -> {}\n",
                ok.device, ok.canonical_model, ok.template, ok.file
            ));
        }
        for failure in &self.failed {
            out.push_str(&format!("  FAIL  {:<32} {}\n", failure.device, failure.reason));
        }
        out
    }
}
