//! Latest-frame slot shared by one frame producer and one tick loop.
//!
//! The slot holds a single encoded frame. Publishing overwrites whatever is
//! there; reading never consumes. A slow producer therefore shows up as
//! repeated frames in the output, never as a growing queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// One encoded frame (JPEG from the screencast).
pub type Frame = Arc<[u8]>;

/// Create a connected writer/reader pair over an empty slot.
pub fn frame_slot() -> (FrameWriter, FrameReader) {
    let (tx, rx) = watch::channel(None);
    let published = Arc::new(AtomicU64::new(0));
    (
        FrameWriter {
            tx,
            published: published.clone(),
        },
        FrameReader { rx, published },
    )
}

/// Producer side of the slot.
#[derive(Debug)]
pub struct FrameWriter {
    tx: watch::Sender<Option<Frame>>,
    published: Arc<AtomicU64>,
}

impl FrameWriter {
    /// Replace the slot contents with `frame`.
    pub fn publish(&self, frame: impl Into<Frame>) {
        self.tx.send_replace(Some(frame.into()));
        self.published.fetch_add(1, Ordering::Relaxed);
    }
}

/// Consumer side of the slot.
#[derive(Debug, Clone)]
pub struct FrameReader {
    rx: watch::Receiver<Option<Frame>>,
    published: Arc<AtomicU64>,
}

impl FrameReader {
    /// The most recent frame, if any has arrived.
    pub fn latest(&self) -> Option<Frame> {
        self.rx.borrow().clone()
    }

    /// Total frames published so far, including overwritten ones.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Wait until the first frame arrives. Returns `false` on timeout or if
    /// the writer went away before publishing anything.
    pub async fn wait_first(&mut self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.rx.wait_for(|f| f.is_some())).await {
            Ok(Ok(_)) => true,
            Ok(Err(_)) | Err(_) => false,
        }
    }
}
