//! Machine-readable summary of a run, written as JSON next to the human
//! output when `--report-file` is given.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pipeline::{ExistingPolicy, Outcome, ReferenceReport, RunSummary};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub output_dir: String,
    pub policy: ExistingPolicy,
    pub summary: RunSummary,
    pub entries: Vec<ReportEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metadata_fallback: bool,
}

impl RunReport {
    pub fn new(output_dir: &Path, policy: ExistingPolicy) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            output_dir: output_dir.to_string_lossy().into_owned(),
            policy,
            summary: RunSummary::default(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, report: &ReferenceReport) {
        let path = match &report.outcome {
            Outcome::Saved { path } => Some(path.to_string_lossy().into_owned()),
            Outcome::SkippedExisting { artifact } => Some(artifact.clone()),
            _ => None,
        };
        self.entries.push(ReportEntry {
            reference: report.reference.clone(),
            video_id: report.video_id.as_ref().map(ToString::to_string),
            outcome: report.outcome.label(),
            path,
            replaced: report.prior_artifact.clone(),
            error: report.outcome.error().map(ToString::to_string),
            metadata_fallback: report.metadata_error.is_some(),
        });
    }

    pub fn finish(&mut self, summary: RunSummary) {
        self.summary = summary;
        self.finished_at = Some(Utc::now());
    }
}

/// Writes reports atomically: a reader never sees a half-written file.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn write(&self, report: &RunReport) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating report dir {}", parent.display()))?;
        }

        let payload = serde_json::to_vec_pretty(report).context("serializing run report")?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, payload)
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("finalizing {}", self.path.display()))?;
        Ok(())
    }
}
