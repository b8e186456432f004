//! Frames handed from sources to detectors.
//!
//! The core never inspects pixels. A frame carries its 1-based position in the
//! source stream, its dimensions, and an opaque pixel buffer that only detector
//! backends read. Replay and synthetic sources emit metadata-only frames.

/// One video frame.
pub struct Frame {
    /// 1-based index in the source stream (not the count of processed frames).
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    pub fn new(index: u64, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            index,
            width,
            height,
            pixels,
        }
    }

    /// Frame without pixel data, for sources whose detections are precomputed.
    pub fn metadata_only(index: u64, width: u32, height: u32) -> Self {
        Self::new(index, width, height, Vec::new())
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn has_pixels(&self) -> bool {
        !self.pixels.is_empty()
    }

    /// Presentation time in seconds at the given source frame rate.
    pub fn timestamp_secs(&self, fps: f64) -> f64 {
        frame_timestamp(self.index, fps)
    }
}

/// `frame / fps`, or 0 when the frame rate is unknown.
pub fn frame_timestamp(frame: u64, fps: f64) -> f64 {
    if fps > 0.0 {
        frame as f64 / fps
    } else {
        0.0
    }
}
