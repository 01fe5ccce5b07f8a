//! Artifact naming.
//!
//! Names always start with the sanitized video id so the store can find an
//! earlier capture by prefix, whatever title or author was known at the time.
//! The id anchor is the only stable part: the same video can legitimately be
//! saved under different names across runs, and uniqueness is enforced by
//! [`TranscriptStore::exists`](crate::store::TranscriptStore::exists) rather
//! than by the name itself.

/// Extension shared by every artifact the tool writes.
pub const ARTIFACT_EXTENSION: &str = "md";

/// Upper bound, in bytes, for each sanitized name component.
pub const MAX_COMPONENT_LEN: usize = 100;

/// Number of title words kept in the name.
const TITLE_WORDS: usize = 5;

const RESERVED: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Builds the artifact file name for a video.
///
/// With both `title` and `author` present the result is
/// `<id>_<author>_<first five title words>.md`; otherwise it is `<id>.md`.
pub fn artifact_file_name(video_id: &str, title: Option<&str>, author: Option<&str>) -> String {
    let safe_id = sanitize_identifier(video_id);
    let title = title.map(str::trim).filter(|value| !value.is_empty());
    let author = author.map(str::trim).filter(|value| !value.is_empty());

    match (title, author) {
        (Some(title), Some(author)) => {
            let short_title = title
                .split_whitespace()
                .take(TITLE_WORDS)
                .collect::<Vec<_>>()
                .join(" ");
            format!(
                "{safe_id}_{}_{}.{ARTIFACT_EXTENSION}",
                sanitize_component(author),
                sanitize_component(&short_title)
            )
        }
        _ => format!("{safe_id}.{ARTIFACT_EXTENSION}"),
    }
}

/// Keeps only alphanumerics, `-` and `_` from an identifier.
pub fn sanitize_identifier(video_id: &str) -> String {
    let cleaned: String = video_id
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    truncate_on_char_boundary(&cleaned, MAX_COMPONENT_LEN).to_owned()
}

/// Replaces reserved and control characters with `_` and caps the length.
pub fn sanitize_component(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if RESERVED.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    truncate_on_char_boundary(&cleaned, MAX_COMPONENT_LEN).to_owned()
}

fn truncate_on_char_boundary(value: &str, max_len: usize) -> &str {
    if value.len() <= max_len {
        return value;
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_id_author_and_short_title() {
        let name = artifact_file_name(
            "abc123",
            Some("Learning Rust the Hard Way, Part Two"),
            Some("Ferris"),
        );
        assert_eq!(name, "abc123_Ferris_Learning Rust the Hard Way,.md");
    }

    #[test]
    fn falls_back_to_id_without_both_fields() {
        assert_eq!(artifact_file_name("abc123", None, None), "abc123.md");
        assert_eq!(artifact_file_name("abc123", Some("Title"), None), "abc123.md");
        assert_eq!(artifact_file_name("abc123", None, Some("Author")), "abc123.md");
        assert_eq!(artifact_file_name("abc123", Some("  "), Some("Author")), "abc123.md");
    }

    #[test]
    fn reserved_characters_never_survive() {
        let name = artifact_file_name(
            "a/b:c?",
            Some(r#"What? A "quote" <in> the|title\/*"#),
            Some("AC/DC: Live"),
        );
        assert!(name.starts_with("abc_"));
        let stem = name.strip_suffix(".md").unwrap();
        for reserved in RESERVED {
            assert!(!stem.contains(*reserved), "{name} contains {reserved}");
        }
    }

    #[test]
    fn control_characters_are_replaced() {
        assert_eq!(sanitize_component("line\nbreak\ttab"), "line_break_tab");
    }

    #[test]
    fn identifier_keeps_dash_and_underscore() {
        assert_eq!(sanitize_identifier("dQw4w9W-_gXcQ"), "dQw4w9W-_gXcQ");
        assert_eq!(sanitize_identifier("ab.c d%"), "abcd");
    }

    #[test]
    fn components_are_bounded() {
        let author = "x".repeat(400);
        let title = "é".repeat(300);
        let name = artifact_file_name("abc123", Some(&title), Some(&author));
        let stem = name.strip_suffix(".md").unwrap();
        let parts: Vec<&str> = stem.splitn(3, '_').collect();
        assert_eq!(parts[0], "abc123");
        assert_eq!(parts[1].len(), MAX_COMPONENT_LEN);
        assert!(parts[2].len() <= MAX_COMPONENT_LEN);
        assert!(parts[2].chars().all(|c| c == 'é'));
    }

    #[test]
    fn same_inputs_give_same_name() {
        let first = artifact_file_name("abc123", Some("Title here"), Some("Someone"));
        let second = artifact_file_name("abc123", Some("Title here"), Some("Someone"));
        assert_eq!(first, second);
    }
}
