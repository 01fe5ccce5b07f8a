#![forbid(unsafe_code)]

//! Building blocks for the `fetch_transcripts` tool: reference parsing,
//! artifact naming, the on-disk transcript store and the ingestion pipeline
//! that ties them together.

pub mod config;
pub mod error;
pub mod fetch;
pub mod naming;
pub mod pipeline;
pub mod report;
pub mod run_state;
pub mod store;
pub mod transcript;
pub mod video_id;
