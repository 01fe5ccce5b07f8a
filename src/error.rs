//! Error taxonomy for per-reference failures.
//!
//! Every variant is recoverable at the reference boundary: the pipeline turns
//! it into an [`Outcome`](crate::pipeline::Outcome) and moves on to the next
//! reference.

use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Could not extract video ID from URL: {reference}")]
    MalformedReference { reference: String },

    #[error("no transcript available for {identifier}: {reason}")]
    Fetch { identifier: String, reason: String },

    #[error("writing {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl IngestError {
    pub fn malformed(reference: &str) -> Self {
        Self::MalformedReference {
            reference: reference.to_owned(),
        }
    }

    pub fn fetch(identifier: &str, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            identifier: identifier.to_owned(),
            reason: reason.to_string(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}
