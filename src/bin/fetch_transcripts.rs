#![forbid(unsafe_code)]

//! Command-line tool that takes a batch of YouTube links, pulls each video's
//! captions plus title/author, and stores one Markdown transcript per video.
//!
//! Videos are processed strictly one after another. A failing link is reported
//! and skipped; it never stops the batch.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use transcript_tools::config::{SettingsOverrides, resolve_settings};
use transcript_tools::fetch::{CaptionSource, MetadataSource, OembedMetadata, YtDlpCaptions};
use transcript_tools::pipeline::{ExistingPolicy, Outcome, Pipeline, ReferenceReport, RunSummary};
use transcript_tools::report::{ReportWriter, RunReport};
use transcript_tools::store::TranscriptStore;

#[derive(Debug, Parser)]
#[command(
    name = "fetch_transcripts",
    about = "Extract YouTube video transcriptions and save them to files."
)]
struct Cli {
    /// Comma-separated list of YouTube URLs.
    #[arg(long, value_name = "URLS")]
    urls: Option<String>,

    /// File containing YouTube URLs, one per line (`#` starts a comment).
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Directory to save transcript files (defaults to TRANSCRIPTS_DIR or
    /// `transcripts`).
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Skip videos that already have transcript files.
    #[arg(long)]
    skip_existing: bool,

    /// Overwrite existing transcript files.
    #[arg(long)]
    overwrite: bool,

    /// Write a JSON report of the run to this path.
    #[arg(long, value_name = "PATH")]
    report_file: Option<PathBuf>,

    /// Alternative env file (defaults to `.env`).
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("transcript_tools=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse())?;
    Ok(())
}

fn run(cli: Cli) -> Result<RunSummary> {
    let references = collect_references(&cli)?;

    let settings = resolve_settings(SettingsOverrides {
        output_dir: cli.output_dir.clone(),
        env_path: cli.env_file.clone(),
    })?;
    let store = TranscriptStore::open(&settings.output_dir)
        .with_context(|| format!("preparing {}", settings.output_dir.display()))?;
    let captions = YtDlpCaptions::new(&settings.yt_dlp, settings.sub_langs.clone())
        .with_timeouts(settings.http_timeout, settings.caption_deadline);
    let metadata = OembedMetadata::new(settings.oembed_endpoint.clone(), settings.http_timeout);
    let policy = ExistingPolicy::from_flags(cli.skip_existing, cli.overwrite);

    let summary = process_all(
        Pipeline::new(store, captions, metadata, policy),
        &references,
        cli.report_file,
    );
    Ok(summary)
}

/// Drives the pipeline over every reference and prints the operator output.
fn process_all<C, M>(
    mut pipeline: Pipeline<C, M>,
    references: &[String],
    report_file: Option<PathBuf>,
) -> RunSummary
where
    C: CaptionSource,
    M: MetadataSource,
{
    let output_dir = absolute_dir(pipeline.store().dir());
    let policy = pipeline.policy();
    let mut run_report = report_file
        .as_ref()
        .map(|_| RunReport::new(&output_dir, policy));

    for reference in references {
        println!("Processing: {reference}");
        // Announced before the fetch starts, since it can take a while.
        if policy == ExistingPolicy::WarnAndReplace
            && let Some((video_id, prior)) = pipeline.pending_replacement(reference)
        {
            println!(
                "Warning: Transcript for video ID {video_id} already exists ({prior}). Use --overwrite to replace it."
            );
        }
        let report = pipeline.process(reference);
        print_reference_report(&report);
        if let Some(run_report) = run_report.as_mut() {
            run_report.push(&report);
        }
    }

    let summary = pipeline.finish();
    println!(
        "Completed: {} videos processed successfully, {} skipped, {} duplicates, {} failed.",
        summary.success, summary.skipped, summary.duplicates, summary.failed
    );
    println!("Transcripts saved to: {}", output_dir.display());

    if let (Some(path), Some(mut run_report)) = (report_file, run_report) {
        run_report.finish(summary);
        if let Err(err) = ReportWriter::new(path.clone()).write(&run_report) {
            eprintln!("Warning: could not write report {}: {err:#}", path.display());
        }
    }

    summary
}

fn print_reference_report(report: &ReferenceReport) {
    let video_id = report
        .video_id
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();

    if let Some(err) = &report.metadata_error {
        eprintln!("  Warning: using fallback title/author for {video_id}: {err}");
    }

    match &report.outcome {
        Outcome::Saved { path } => println!("Saved transcript to: {}", path.display()),
        Outcome::DuplicateInRun => {
            println!("Skipping: Duplicate URL for video ID {video_id}")
        }
        Outcome::SkippedExisting { artifact } => {
            println!("Skipping: Transcript for video ID {video_id} already exists ({artifact})")
        }
        Outcome::ExtractFailed { error }
        | Outcome::FetchFailed { error }
        | Outcome::PersistFailed { error } => {
            eprintln!("Error processing {}: {error}", report.reference)
        }
    }
}

fn absolute_dir(dir: &Path) -> PathBuf {
    fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
}

/// `--urls` wins over `--file`. Errors when no usable reference remains.
fn collect_references(cli: &Cli) -> Result<Vec<String>> {
    let references = if let Some(urls) = &cli.urls {
        split_url_list(urls)
    } else if let Some(path) = &cli.file {
        read_reference_file(path)?
    } else {
        bail!("No URLs provided. Use --urls or --file argument.");
    };

    if references.is_empty() {
        bail!("No valid URLs found.");
    }
    Ok(references)
}

fn split_url_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .collect()
}

/// One reference per line; blank lines and `#` comments are ignored.
fn read_reference_file(path: &Path) -> Result<Vec<String>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect())
}
