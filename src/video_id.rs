//! Turns the many shapes of YouTube links into the canonical video id used as
//! the dedup key everywhere else.
//!
//! Two shapes are recognised:
//! - short links (`youtu.be/<id>`), where the id is the last path segment;
//! - watch pages (`youtube.com/watch?v=<id>`), where the id is the `v` query
//!   parameter.
//!
//! Extraction is a pure string transform: nothing here checks that the video
//! actually exists.

use std::fmt;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::{IngestError, Result};

/// Canonical short token identifying one video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch-page URL, used when talking to metadata endpoints.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Extracts the video id from `reference`, failing with
/// [`IngestError::MalformedReference`] when no recognised shape matches.
pub fn extract_video_id(reference: &str) -> Result<VideoId> {
    let parsed =
        parse_reference(reference.trim()).ok_or_else(|| IngestError::malformed(reference))?;
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();

    let candidate = if is_short_link_host(&host) {
        parsed
            .path_segments()
            .and_then(|segments| segments.filter(|segment| !segment.is_empty()).last())
            // Path segments stay percent-encoded while query values are decoded;
            // decode here so both shapes yield the same id.
            .and_then(|segment| percent_decode_str(segment).decode_utf8().ok())
            .map(|segment| segment.into_owned())
    } else if is_youtube_host(&host) && parsed.path().trim_end_matches('/') == "/watch" {
        parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
    } else {
        None
    };

    candidate
        .map(|value| value.trim().to_owned())
        .filter(|value| value.chars().any(char::is_alphanumeric))
        .map(VideoId)
        .ok_or_else(|| IngestError::malformed(reference))
}

/// Accepts scheme-less input such as `youtu.be/abc` by assuming https.
fn parse_reference(value: &str) -> Option<Url> {
    if value.is_empty() {
        return None;
    }
    if value.contains("://") {
        Url::parse(value).ok()
    } else {
        Url::parse(&format!("https://{value}")).ok()
    }
}

fn is_short_link_host(host: &str) -> bool {
    host == "youtu.be" || host == "www.youtu.be"
}

fn is_youtube_host(host: &str) -> bool {
    host == "youtube.com" || host.ends_with(".youtube.com")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_link_and_watch_page_agree() {
        let short = extract_video_id("https://youtu.be/abc123").unwrap();
        let watch = extract_video_id("https://www.youtube.com/watch?v=abc123").unwrap();
        assert_eq!(short, watch);
        assert_eq!(short.as_str(), "abc123");
    }

    #[test]
    fn short_link_strips_query() {
        let id = extract_video_id("https://youtu.be/dQw4w9WgXcQ?t=42&si=xyz").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn watch_page_ignores_other_params() {
        let id =
            extract_video_id("https://m.youtube.com/watch?list=PL123&v=dQw4w9WgXcQ&t=5s").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn scheme_less_references_are_accepted() {
        assert_eq!(extract_video_id("youtu.be/abc123").unwrap().as_str(), "abc123");
        assert_eq!(
            extract_video_id("  www.youtube.com/watch?v=abc123  ")
                .unwrap()
                .as_str(),
            "abc123"
        );
    }

    #[test]
    fn unrecognised_shapes_are_malformed() {
        for reference in [
            "",
            "not a url",
            "https://vimeo.com/12345",
            "https://www.youtube.com/watch",
            "https://www.youtube.com/watch?v=",
            "https://www.youtube.com/@SomeChannel",
            "https://youtu.be/",
            "https://youtu.be/---",
        ] {
            let err = extract_video_id(reference).unwrap_err();
            assert!(
                matches!(err, IngestError::MalformedReference { .. }),
                "{reference} should be malformed"
            );
        }
    }

    #[test]
    fn percent_encoded_ids_agree_across_shapes() {
        let short = extract_video_id("https://youtu.be/abc%2D1").unwrap();
        let watch = extract_video_id("https://www.youtube.com/watch?v=abc%2D1").unwrap();
        assert_eq!(short, watch);
        assert_eq!(short.as_str(), "abc-1");
    }

    #[test]
    fn watch_url_is_canonical() {
        let id = extract_video_id("https://youtu.be/abc123").unwrap();
        assert_eq!(id.watch_url(), "https://www.youtube.com/watch?v=abc123");
        assert_eq!(id.to_string(), "abc123");
    }
}
