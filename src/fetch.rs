//! External capabilities consumed by the pipeline, and their production
//! implementations.
//!
//! Captions come from `yt-dlp` (subtitle-only run into a scratch directory),
//! metadata from YouTube's oEmbed endpoint. Both are single-shot: any failure
//! is reported to the caller, nothing is retried.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

use crate::transcript::VideoMetadata;
use crate::video_id::VideoId;

pub const DEFAULT_OEMBED_ENDPOINT: &str = "https://www.youtube.com/oembed";
pub const DEFAULT_SOCKET_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CAPTION_DEADLINE_SECS: u64 = 120;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Retrieves the caption text for a video.
pub trait CaptionSource {
    fn fetch_captions(&self, video_id: &VideoId) -> Result<String>;
}

/// Retrieves title and author for a video.
pub trait MetadataSource {
    fn fetch_metadata(&self, video_id: &VideoId) -> Result<VideoMetadata>;
}

impl<T: CaptionSource + ?Sized> CaptionSource for &T {
    fn fetch_captions(&self, video_id: &VideoId) -> Result<String> {
        (**self).fetch_captions(video_id)
    }
}

impl<T: MetadataSource + ?Sized> MetadataSource for &T {
    fn fetch_metadata(&self, video_id: &VideoId) -> Result<VideoMetadata> {
        (**self).fetch_metadata(video_id)
    }
}

/// Caption fetcher backed by a `yt-dlp` binary.
///
/// Every run is bounded twice: `socket_timeout` is handed to yt-dlp for each
/// network operation, and `deadline` caps the whole subprocess. A run that
/// outlives its deadline is killed and reported as a fetch failure.
#[derive(Debug, Clone)]
pub struct YtDlpCaptions {
    program: PathBuf,
    sub_langs: String,
    socket_timeout: Duration,
    deadline: Duration,
}

impl YtDlpCaptions {
    pub fn new(program: impl Into<PathBuf>, sub_langs: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            sub_langs: sub_langs.into(),
            socket_timeout: Duration::from_secs(DEFAULT_SOCKET_TIMEOUT_SECS),
            deadline: Duration::from_secs(DEFAULT_CAPTION_DEADLINE_SECS),
        }
    }

    pub fn with_timeouts(mut self, socket_timeout: Duration, deadline: Duration) -> Self {
        self.socket_timeout = socket_timeout;
        self.deadline = deadline;
        self
    }
}

impl CaptionSource for YtDlpCaptions {
    fn fetch_captions(&self, video_id: &VideoId) -> Result<String> {
        let scratch = tempfile::tempdir().context("creating caption scratch directory")?;
        let output_pattern = scratch.path().join("captions");
        // stderr goes to a file so a chatty child can never block on a full pipe
        // while we poll it.
        let stderr_path = scratch.path().join("stderr.log");
        let stderr_file = fs::File::create(&stderr_path)
            .with_context(|| format!("creating {}", stderr_path.display()))?;

        let mut child = Command::new(&self.program)
            .arg("--skip-download")
            .arg("--write-subs")
            .arg("--write-auto-subs")
            .arg("--sub-langs")
            .arg(&self.sub_langs)
            .arg("--sub-format")
            .arg("vtt")
            .arg("--socket-timeout")
            .arg(self.socket_timeout.as_secs().max(1).to_string())
            .arg("--no-warnings")
            .arg("--no-progress")
            .arg("--output")
            .arg(&output_pattern)
            .arg(video_id.watch_url())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_file))
            .spawn()
            .with_context(|| format!("running {} for {video_id}", self.program.display()))?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("waiting for {}", self.program.display()))?
            {
                break status;
            }
            if started.elapsed() >= self.deadline {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(
                    video_id = %video_id,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "subtitle command timed out"
                );
                bail!(
                    "subtitle command for {video_id} timed out after {}s",
                    self.deadline.as_secs_f64()
                );
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            let stderr = fs::read_to_string(&stderr_path).unwrap_or_default();
            bail!(
                "subtitle command failed for {video_id} (status {status}): {}",
                stderr.trim()
            );
        }

        let track = find_caption_track(scratch.path())?
            .ok_or_else(|| anyhow!("no caption track available for {video_id}"))?;
        let raw = fs::read_to_string(&track)
            .with_context(|| format!("reading {}", track.display()))?;
        let text = vtt_to_text(&raw);
        if text.trim().is_empty() {
            bail!("caption track for {video_id} is empty");
        }
        tracing::debug!(video_id = %video_id, track = %track.display(), "captions fetched");
        Ok(text)
    }
}

/// Picks the first `.vtt` file (by name) written into `dir`.
fn find_caption_track(dir: &Path) -> Result<Option<PathBuf>> {
    let mut tracks = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "vtt") {
            tracks.push(path);
        }
    }
    tracks.sort();
    Ok(tracks.into_iter().next())
}

/// Flattens a WebVTT document into one caption line per row.
///
/// Drops the header, NOTE/STYLE/REGION blocks, cue identifiers, timing lines
/// and inline markup. Auto-generated tracks repeat the previous line as they
/// scroll, so consecutive duplicates collapse into one.
pub fn vtt_to_text(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().map(str::trim).collect();
    let mut out: Vec<String> = Vec::new();
    let mut in_header = lines.first().is_some_and(|line| line.starts_with("WEBVTT"));
    let mut skipping_block = false;

    for (index, line) in lines.iter().enumerate() {
        if line.is_empty() {
            in_header = false;
            skipping_block = false;
            continue;
        }
        if in_header || skipping_block {
            continue;
        }
        if line.starts_with("NOTE") || *line == "STYLE" || *line == "REGION" {
            skipping_block = true;
            continue;
        }
        if line.contains("-->") {
            continue;
        }
        if lines.get(index + 1).is_some_and(|next| next.contains("-->")) {
            continue;
        }

        let text = strip_markup(line);
        let text = text.trim();
        if text.is_empty() || out.last().is_some_and(|previous| previous == text) {
            continue;
        }
        out.push(text.to_owned());
    }

    out.join("\n")
}

fn strip_markup(line: &str) -> String {
    let mut text = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[derive(Debug, Deserialize)]
struct OembedResponse {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author_name: Option<String>,
}

/// Metadata fetcher backed by the oEmbed endpoint.
#[derive(Clone)]
pub struct OembedMetadata {
    agent: ureq::Agent,
    endpoint: String,
}

impl OembedMetadata {
    /// `endpoint` is normally [`DEFAULT_OEMBED_ENDPOINT`]; `timeout` bounds the
    /// whole request.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            endpoint: endpoint.into(),
        }
    }
}

impl MetadataSource for OembedMetadata {
    fn fetch_metadata(&self, video_id: &VideoId) -> Result<VideoMetadata> {
        let response = self
            .agent
            .get(&self.endpoint)
            .query("url", &video_id.watch_url())
            .query("format", "json")
            .call()
            .with_context(|| format!("requesting oEmbed data for {video_id}"))?;
        let body: OembedResponse = response
            .into_json()
            .with_context(|| format!("decoding oEmbed data for {video_id}"))?;
        Ok(VideoMetadata::new(body.title, body.author_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video_id::extract_video_id;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use tempfile::tempdir;

    fn id() -> VideoId {
        extract_video_id("https://youtu.be/alpha").unwrap()
    }

    const SAMPLE_VTT: &str = "WEBVTT\nKind: captions\nLanguage: en\n\nNOTE generated\nby a tool\n\n1\n00:00:00.000 --> 00:00:02.000 align:start position:0%\nHello <c.colorE5E5E5>there</c>\n\n2\n00:00:02.000 --> 00:00:04.000\nHello there\nGeneral Kenobi &amp; friends\n\n00:00:04.000 --> 00:00:06.000\n<00:00:04.500><c>you are</c> a bold one\n";

    #[test]
    fn vtt_to_text_flattens_cues() {
        assert_eq!(
            vtt_to_text(SAMPLE_VTT),
            "Hello there\nGeneral Kenobi & friends\nyou are a bold one"
        );
    }

    #[test]
    fn vtt_to_text_handles_headerless_input() {
        assert_eq!(vtt_to_text("00:00.000 --> 00:01.000\nplain line\n"), "plain line");
        assert_eq!(vtt_to_text("WEBVTT\n\n"), "");
    }

    #[cfg(unix)]
    fn install_ytdlp_stub(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script_path = dir.join("yt-dlp");
        let script = format!(
            r#"#!/usr/bin/env bash
set -eu
all_args="$*"
output=""
while [[ $# -gt 0 ]]; do
  case "$1" in
    --output)
      shift
      output="$1"
      ;;
  esac
  shift
done
{body}
"#
        );
        fs::write(&script_path, script).unwrap();
        let mut perms = fs::metadata(&script_path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script_path, perms).unwrap();
        script_path
    }

    #[cfg(unix)]
    #[test]
    fn ytdlp_captions_reads_written_track() {
        let temp = tempdir().unwrap();
        let stub = install_ytdlp_stub(
            temp.path(),
            r#"cat <<'VTT' > "${output}.en.vtt"
WEBVTT

00:00:00.000 --> 00:00:01.000
first line

00:00:01.000 --> 00:00:02.000
second line
VTT"#,
        );
        let captions = YtDlpCaptions::new(stub, "en");
        assert_eq!(captions.fetch_captions(&id()).unwrap(), "first line\nsecond line");
    }

    #[cfg(unix)]
    #[test]
    fn ytdlp_captions_fails_without_track() {
        let temp = tempdir().unwrap();
        let stub = install_ytdlp_stub(temp.path(), "exit 0");
        let err = YtDlpCaptions::new(stub, "en")
            .fetch_captions(&id())
            .unwrap_err();
        assert!(err.to_string().contains("no caption track"));
    }

    #[cfg(unix)]
    #[test]
    fn ytdlp_captions_fails_on_error_status() {
        let temp = tempdir().unwrap();
        let stub = install_ytdlp_stub(temp.path(), "echo 'private video' >&2\nexit 1");
        let err = YtDlpCaptions::new(stub, "en")
            .fetch_captions(&id())
            .unwrap_err();
        assert!(err.to_string().contains("private video"));
    }

    #[cfg(unix)]
    #[test]
    fn ytdlp_captions_rejects_empty_track() {
        let temp = tempdir().unwrap();
        let stub = install_ytdlp_stub(temp.path(), r#"printf 'WEBVTT\n\n' > "${output}.en.vtt""#);
        let err = YtDlpCaptions::new(stub, "en")
            .fetch_captions(&id())
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[cfg(unix)]
    #[test]
    fn ytdlp_captions_passes_socket_timeout() {
        let temp = tempdir().unwrap();
        let args_path = temp.path().join("args.txt");
        let stub = install_ytdlp_stub(
            temp.path(),
            &format!("echo \"$all_args\" > '{}'\nexit 1", args_path.display()),
        );
        let captions = YtDlpCaptions::new(stub, "en")
            .with_timeouts(Duration::from_secs(3), Duration::from_secs(30));
        assert!(captions.fetch_captions(&id()).is_err());

        let args = fs::read_to_string(&args_path).unwrap();
        assert!(args.contains("--socket-timeout 3"), "args were: {args}");
        assert!(args.contains("--sub-langs en"));
    }

    #[cfg(unix)]
    #[test]
    fn ytdlp_captions_kills_stalled_command() {
        let temp = tempdir().unwrap();
        let stub = install_ytdlp_stub(temp.path(), "exec sleep 10");
        let captions = YtDlpCaptions::new(stub, "en")
            .with_timeouts(Duration::from_secs(1), Duration::from_millis(300));

        let started = Instant::now();
        let err = captions.fetch_captions(&id()).unwrap_err();

        assert!(err.to_string().contains("timed out"), "{err:#}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn missing_program_is_an_error() {
        let temp = tempdir().unwrap();
        let captions = YtDlpCaptions::new(temp.path().join("no-such-binary"), "en");
        assert!(captions.fetch_captions(&id()).is_err());
    }

    /// Serves exactly one canned HTTP response and returns the endpoint URL.
    fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                let read = stream.read(&mut buf).unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
        });
        format!("http://{addr}/oembed")
    }

    #[test]
    fn oembed_metadata_reads_title_and_author() {
        let endpoint = serve_once(
            "200 OK",
            r#"{"title":"Alpha Title","author_name":"Alpha Channel","type":"video"}"#,
        );
        let metadata = OembedMetadata::new(endpoint, Duration::from_secs(5))
            .fetch_metadata(&id())
            .unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Alpha Title"));
        assert_eq!(metadata.author.as_deref(), Some("Alpha Channel"));
    }

    #[test]
    fn oembed_metadata_fills_missing_fields() {
        let endpoint = serve_once("200 OK", r#"{"title":"Only Title"}"#);
        let metadata = OembedMetadata::new(endpoint, Duration::from_secs(5))
            .fetch_metadata(&id())
            .unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Only Title"));
        assert!(metadata.author.is_none());
        assert_eq!(metadata.author_or_fallback(), "YouTube Creator");
    }

    #[test]
    fn oembed_metadata_reports_http_errors() {
        let endpoint = serve_once("404 Not Found", r#"{"error":"nope"}"#);
        let result = OembedMetadata::new(endpoint, Duration::from_secs(5))
            .fetch_metadata(&id());
        assert!(result.is_err());
    }
}
