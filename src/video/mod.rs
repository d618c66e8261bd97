//! Looping video playback into a shared latest-frame slot.
//!
//! A [`FrameSource`] decodes frames off the render thread and pushes them into
//! a [`VideoFeed`]. The renderer only ever reads the most recent frame; older
//! frames are overwritten, never queued.

use std::{
    fmt::Debug,
    path::PathBuf,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use image::RgbaImage;

pub mod ffmpeg;

pub use ffmpeg::FfmpegVideo;

pub type VideoResult<T> = Result<T, VideoError>;

#[derive(thiserror::Error, Debug)]
pub enum VideoError {
    #[error("failed to run ffprobe: {0}")]
    ProbeSpawn(#[source] std::io::Error),

    #[error("ffprobe failed for '{}': {stderr}", .path.display())]
    ProbeFailed { path: PathBuf, stderr: String },

    #[error("ffprobe json parse failed: {0}")]
    ProbeOutput(#[from] serde_json::Error),

    #[error("no video stream found")]
    NoVideoStream,

    #[error("missing video {0} from ffprobe")]
    MissingDimension(&'static str),

    #[error("failed to run ffmpeg for video decode: {0}")]
    DecoderSpawn(#[source] std::io::Error),

    #[error(transparent)]
    Asset(#[from] anyhow::Error),
}

#[derive(Debug, Default)]
struct FeedSlot {
    frame: Mutex<Option<Arc<RgbaImage>>>,
    generation: AtomicU64,
}

/// Read side of a video: the most recently decoded frame.
///
/// Clones share the same slot. Two feeds are equal when they share a slot.
#[derive(Clone, Default)]
pub struct VideoFeed {
    slot: Arc<FeedSlot>,
}

impl VideoFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current frame.
    pub fn push(&self, frame: RgbaImage) {
        let mut slot = self.slot.frame.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(frame));
        self.slot.generation.fetch_add(1, Ordering::Release);
    }

    /// Number of frames pushed so far. Zero means the surface is still blank.
    pub fn generation(&self) -> u64 {
        self.slot.generation.load(Ordering::Acquire)
    }

    pub fn latest(&self) -> Option<Arc<RgbaImage>> {
        self.slot
            .frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PartialEq for VideoFeed {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl Debug for VideoFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFeed")
            .field("generation", &self.generation())
            .finish()
    }
}

/// A playable video owned by exactly one emitter.
pub trait FrameSource: Send {
    /// Starts playback. Calling it again while playing is a no-op.
    fn play(&mut self) -> VideoResult<()>;

    /// The feed this source writes into. Always the same slot.
    fn feed(&self) -> VideoFeed;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_keeps_only_the_latest_frame() {
        let feed = VideoFeed::new();
        assert!(feed.latest().is_none());
        assert_eq!(feed.generation(), 0);

        feed.push(RgbaImage::new(2, 2));
        feed.push(RgbaImage::from_pixel(4, 1, image::Rgba([9, 9, 9, 255])));

        let frame = feed.latest().unwrap();
        assert_eq!(frame.dimensions(), (4, 1));
        assert_eq!(feed.generation(), 2);
    }

    #[test]
    fn clones_share_a_slot() {
        let feed = VideoFeed::new();
        let reader = feed.clone();
        feed.push(RgbaImage::new(1, 1));

        assert_eq!(reader.generation(), 1);
        assert_eq!(reader, feed);
        assert_ne!(reader, VideoFeed::new());
    }
}
