//! Ingestion pipeline.
//!
//! Each reference walks through the same gates, in order:
//! 1. id extraction (malformed references fail here);
//! 2. run-scoped dedup (a second reference to the same video in one batch);
//! 3. the on-disk store (videos captured by an earlier run);
//! 4. caption fetch (required), then metadata fetch (best effort);
//! 5. naming and writing the artifact.
//!
//! Failures are confined to the reference that caused them. The batch always
//! runs to the end and the counters are reported once at the end.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::IngestError;
use crate::fetch::{CaptionSource, MetadataSource};
use crate::naming::artifact_file_name;
use crate::run_state::RunState;
use crate::store::TranscriptStore;
use crate::transcript::{VideoMetadata, render_document};
use crate::video_id::{VideoId, extract_video_id};

/// What to do when the store already holds an artifact for a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExistingPolicy {
    /// Leave the earlier artifact alone and count the reference as skipped.
    Skip,
    /// Warn, then fetch again and write a fresh artifact. This is what runs
    /// when neither `--skip-existing` nor `--overwrite` is given.
    WarnAndReplace,
    /// Fetch again and write a fresh artifact without warning.
    Overwrite,
}

impl ExistingPolicy {
    /// `overwrite` wins over `skip_existing`.
    pub fn from_flags(skip_existing: bool, overwrite: bool) -> Self {
        match (skip_existing, overwrite) {
            (_, true) => Self::Overwrite,
            (true, false) => Self::Skip,
            (false, false) => Self::WarnAndReplace,
        }
    }
}

/// Terminal state of one reference.
#[derive(Debug)]
pub enum Outcome {
    Saved { path: PathBuf },
    DuplicateInRun,
    SkippedExisting { artifact: String },
    ExtractFailed { error: IngestError },
    FetchFailed { error: IngestError },
    PersistFailed { error: IngestError },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Saved { .. } => "saved",
            Outcome::DuplicateInRun => "duplicate",
            Outcome::SkippedExisting { .. } => "skipped",
            Outcome::ExtractFailed { .. } => "extractFailed",
            Outcome::FetchFailed { .. } => "fetchFailed",
            Outcome::PersistFailed { .. } => "persistFailed",
        }
    }

    pub fn error(&self) -> Option<&IngestError> {
        match self {
            Outcome::ExtractFailed { error }
            | Outcome::FetchFailed { error }
            | Outcome::PersistFailed { error } => Some(error),
            _ => None,
        }
    }
}

/// Everything the caller needs to describe what happened to one reference.
#[derive(Debug)]
pub struct ReferenceReport {
    pub reference: String,
    pub video_id: Option<VideoId>,
    /// Earlier artifact that was found and deliberately replaced.
    pub prior_artifact: Option<String>,
    /// Set when metadata could not be fetched and fallbacks were used.
    pub metadata_error: Option<String>,
    pub outcome: Outcome,
}

#[derive(Debug, Default)]
struct Notes {
    prior_artifact: Option<String>,
    metadata_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub success: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Saved { .. } => self.success += 1,
            Outcome::SkippedExisting { .. } => self.skipped += 1,
            Outcome::DuplicateInRun => self.duplicates += 1,
            Outcome::ExtractFailed { .. }
            | Outcome::FetchFailed { .. }
            | Outcome::PersistFailed { .. } => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.skipped + self.duplicates + self.failed
    }
}

/// Sequential ingestion of a batch of references into a [`TranscriptStore`].
pub struct Pipeline<C, M> {
    store: TranscriptStore,
    captions: C,
    metadata: M,
    policy: ExistingPolicy,
    run_state: RunState,
    summary: RunSummary,
}

impl<C: CaptionSource, M: MetadataSource> Pipeline<C, M> {
    pub fn new(store: TranscriptStore, captions: C, metadata: M, policy: ExistingPolicy) -> Self {
        Self {
            store,
            captions,
            metadata,
            policy,
            run_state: RunState::new(),
            summary: RunSummary::default(),
        }
    }

    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }

    pub fn policy(&self) -> ExistingPolicy {
        self.policy
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Processes every reference in order.
    pub fn run<I, S>(&mut self, references: I) -> Vec<ReferenceReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        references
            .into_iter()
            .map(|reference| self.process(reference.as_ref()))
            .collect()
    }

    /// Earlier artifact that processing `reference` would replace, if any.
    ///
    /// Read-only: lets callers announce the replacement before the fetch
    /// starts. Malformed references, run duplicates and the skip policy all
    /// yield `None`.
    pub fn pending_replacement(&self, reference: &str) -> Option<(VideoId, String)> {
        if self.policy == ExistingPolicy::Skip {
            return None;
        }
        let video_id = extract_video_id(reference).ok()?;
        if self.run_state.seen(&video_id) {
            return None;
        }
        let artifact = self.store.find_existing(video_id.as_str()).ok()??;
        Some((video_id, artifact))
    }

    /// Processes one reference. Never fails: problems end up in the outcome.
    pub fn process(&mut self, reference: &str) -> ReferenceReport {
        let mut notes = Notes::default();
        let (video_id, outcome) = match extract_video_id(reference) {
            Ok(video_id) => {
                let outcome = self.ingest(&video_id, reference, &mut notes);
                (Some(video_id), outcome)
            }
            Err(error) => {
                tracing::debug!(reference, %error, "malformed reference");
                (None, Outcome::ExtractFailed { error })
            }
        };

        self.summary.record(&outcome);
        ReferenceReport {
            reference: reference.to_owned(),
            video_id,
            prior_artifact: notes.prior_artifact,
            metadata_error: notes.metadata_error,
            outcome,
        }
    }

    fn ingest(&mut self, video_id: &VideoId, reference: &str, notes: &mut Notes) -> Outcome {
        if self.run_state.seen(video_id) {
            tracing::debug!(video_id = %video_id, reference, "duplicate within run");
            return Outcome::DuplicateInRun;
        }

        match self.store.find_existing(video_id.as_str()) {
            Ok(Some(artifact)) => {
                if self.policy == ExistingPolicy::Skip {
                    return Outcome::SkippedExisting { artifact };
                }
                tracing::warn!(
                    video_id = %video_id,
                    %artifact,
                    policy = ?self.policy,
                    "transcript already exists, replacing"
                );
                notes.prior_artifact = Some(artifact);
            }
            Ok(None) => {}
            Err(error) => return Outcome::PersistFailed { error },
        }

        let captions = match self.captions.fetch_captions(video_id) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                return Outcome::FetchFailed {
                    error: IngestError::fetch(video_id.as_str(), "caption track is empty"),
                };
            }
            Err(err) => {
                return Outcome::FetchFailed {
                    error: IngestError::fetch(video_id.as_str(), format!("{err:#}")),
                };
            }
        };

        let metadata = match self.metadata.fetch_metadata(video_id) {
            Ok(metadata) => metadata,
            Err(err) => {
                let message = format!("{err:#}");
                tracing::warn!(
                    video_id = %video_id,
                    error = %message,
                    "metadata unavailable, using fallbacks"
                );
                notes.metadata_error = Some(message);
                VideoMetadata::unavailable()
            }
        };

        let name = artifact_file_name(
            video_id.as_str(),
            metadata.title.as_deref(),
            metadata.author.as_deref(),
        );
        let document = render_document(video_id, &metadata, reference, &captions);

        match self.store.write(&name, &document) {
            Ok(path) => {
                self.run_state.mark(video_id);
                Outcome::Saved { path }
            }
            Err(error) => Outcome::PersistFailed { error },
        }
    }

    /// Consumes the pipeline and returns the final counters.
    pub fn finish(self) -> RunSummary {
        self.summary
    }
}
