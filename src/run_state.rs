//! Ids handled during the current invocation.
//!
//! Lives only as long as the pipeline that owns it and never touches disk.

use std::collections::HashSet;

use crate::video_id::VideoId;

#[derive(Debug, Default)]
pub struct RunState {
    handled: HashSet<VideoId>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, video_id: &VideoId) -> bool {
        self.handled.contains(video_id)
    }

    /// Records `video_id`; returns false when it was already present.
    pub fn mark(&mut self, video_id: &VideoId) -> bool {
        self.handled.insert(video_id.clone())
    }

    pub fn len(&self) -> usize {
        self.handled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handled.is_empty()
    }
}
