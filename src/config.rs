#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::fetch::{DEFAULT_CAPTION_DEADLINE_SECS, DEFAULT_OEMBED_ENDPOINT};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_TRANSCRIPTS_DIR: &str = "transcripts";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_YT_DLP: &str = "yt-dlp";
pub const DEFAULT_SUB_LANGS: &str = "en";

#[derive(Debug, Clone)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub http_timeout: Duration,
    /// Wall-clock cap on one yt-dlp run.
    pub caption_deadline: Duration,
    pub yt_dlp: PathBuf,
    pub sub_langs: String,
    pub oembed_endpoint: String,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub output_dir: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
}

/// Resolves settings from CLI overrides, then the environment, then the env
/// file, then built-in defaults.
pub fn resolve_settings(overrides: SettingsOverrides) -> Result<Settings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    Ok(build_settings_with_overrides(
        &file_vars,
        env_var_string,
        overrides,
    ))
}

#[cfg(test)]
fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Settings {
    build_settings_with_overrides(file_vars, env_lookup, SettingsOverrides::default())
}

fn build_settings_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: SettingsOverrides,
) -> Settings {
    let output_dir = overrides
        .output_dir
        .filter(|path| !path.as_os_str().is_empty())
        .or_else(|| lookup_value("TRANSCRIPTS_DIR", file_vars, &env_lookup).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TRANSCRIPTS_DIR));
    let http_timeout_secs = lookup_secs(
        "TRANSCRIPTS_HTTP_TIMEOUT_SECS",
        file_vars,
        &env_lookup,
        DEFAULT_HTTP_TIMEOUT_SECS,
    );
    let caption_deadline_secs = lookup_secs(
        "TRANSCRIPTS_CAPTION_TIMEOUT_SECS",
        file_vars,
        &env_lookup,
        DEFAULT_CAPTION_DEADLINE_SECS,
    );
    let yt_dlp = lookup_value("YT_DLP_BIN", file_vars, &env_lookup)
        .unwrap_or_else(|| DEFAULT_YT_DLP.to_string());
    let sub_langs = lookup_value("TRANSCRIPTS_SUB_LANGS", file_vars, &env_lookup)
        .unwrap_or_else(|| DEFAULT_SUB_LANGS.to_string());
    let oembed_endpoint = lookup_value("TRANSCRIPTS_OEMBED_ENDPOINT", file_vars, &env_lookup)
        .unwrap_or_else(|| DEFAULT_OEMBED_ENDPOINT.to_string());

    Settings {
        output_dir,
        http_timeout: Duration::from_secs(http_timeout_secs),
        caption_deadline: Duration::from_secs(caption_deadline_secs),
        yt_dlp: PathBuf::from(yt_dlp),
        sub_langs,
        oembed_endpoint,
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_owned())
}

/// Env, then file. Blank values count as unset.
fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key)
        .filter(|value| !value.trim().is_empty())
        .or_else(|| file_vars.get(key).cloned())
        .filter(|value| !value.trim().is_empty())
}

/// Positive whole seconds; anything else falls back to `default`.
fn lookup_secs(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
    default: u64,
) -> u64 {
    lookup_value(key, file_vars, env_lookup)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(default)
}

/// Parses a dotenv-style file. A missing file yields no variables.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("reading env file {}", path.display()))?;
    Ok(content
        .lines()
        .filter_map(parse_env_line)
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect())
}

/// `KEY=value`, optionally prefixed with `export` and with the value wrapped in
/// matching single or double quotes. Comments and junk lines yield `None`.
fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, unquote(value.trim())))
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .into_iter()
        .find_map(|quote| value.strip_prefix(quote)?.strip_suffix(quote))
        .unwrap_or(value)
}
