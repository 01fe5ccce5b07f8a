//! Video metadata and the artifact document format.

use serde::Serialize;

use crate::video_id::VideoId;

pub const FALLBACK_AUTHOR: &str = "YouTube Creator";

/// Title and author as reported by the metadata lookup.
///
/// Either field may be missing; the header then shows a fallback value while
/// the artifact name drops back to the bare id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
}

impl VideoMetadata {
    /// Blank values count as missing.
    pub fn new(title: Option<String>, author: Option<String>) -> Self {
        Self {
            title: title.filter(|value| !value.trim().is_empty()),
            author: author.filter(|value| !value.trim().is_empty()),
        }
    }

    /// Used when the lookup failed outright.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn title_or_fallback(&self, video_id: &VideoId) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| fallback_title(video_id))
    }

    pub fn author_or_fallback(&self) -> &str {
        self.author.as_deref().unwrap_or(FALLBACK_AUTHOR)
    }
}

pub fn fallback_title(video_id: &VideoId) -> String {
    format!("YouTube Video {video_id}")
}

/// Renders the persisted document: a small header followed by the captions.
///
/// ```text
/// # <title>
/// Author: <author>
///
/// URL: <reference>
///
/// <captions>
/// ```
pub fn render_document(
    video_id: &VideoId,
    metadata: &VideoMetadata,
    reference: &str,
    captions: &str,
) -> String {
    format!(
        "# {}\nAuthor: {}\n\nURL: {}\n\n{}",
        metadata.title_or_fallback(video_id),
        metadata.author_or_fallback(),
        reference,
        captions
    )
}
