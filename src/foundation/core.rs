use std::sync::Arc;

use crate::foundation::error::{MoshError, MoshResult};

pub use kurbo::Rect;

/// Absolute frame index on a timeline.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Half-open frame range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    /// First frame in the range.
    pub start: FrameIndex,
    /// One past the last frame in the range.
    pub end: FrameIndex, // exclusive
}

impl FrameRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: FrameIndex, end: FrameIndex) -> MoshResult<Self> {
        if start.0 > end.0 {
            return Err(MoshError::validation("FrameRange start must be <= end"));
        }
        Ok(Self { start, end })
    }

    /// Number of frames covered.
    pub fn len_frames(self) -> u64 {
        self.end.0.saturating_sub(self.start.0)
    }

    /// Whether the range covers no frames.
    pub fn is_empty(self) -> bool {
        self.start.0 == self.end.0
    }

    /// Whether `f` lies inside the range.
    pub fn contains(self, f: FrameIndex) -> bool {
        self.start.0 <= f.0 && f.0 < self.end.0
    }
}

/// Number of interleaved channels in a [`Frame`] (RGBA).
pub const FRAME_CHANNELS: usize = 4;

/// An immutable RGBA8 frame buffer.
///
/// The sample data lives behind an [`Arc`], so cloning a frame is cheap and a
/// frame handed downstream can never be mutated through a stale handle. All
/// pipeline stages consume `&Frame` and produce a fresh `Frame`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Arc<[u8]>, // interleaved RGBA8, straight alpha
}

impl Frame {
    /// Wrap an RGBA8 buffer, rejecting size mismatches and zero dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> MoshResult<Self> {
        if width == 0 || height == 0 {
            return Err(MoshError::validation("frame width/height must be > 0"));
        }
        let expected = width as usize * height as usize * FRAME_CHANNELS;
        if data.len() != expected {
            return Err(MoshError::validation(format!(
                "frame buffer length {} does not match {}x{} rgba8 ({expected})",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data: data.into(),
        })
    }

    /// A frame filled with a single RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> MoshResult<Self> {
        let mut data = Vec::with_capacity(width as usize * height as usize * FRAME_CHANNELS);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&rgba);
        }
        Self::new(width, height, data)
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Interleaved RGBA8 sample data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// RGBA value at `(x, y)`. Coordinates must be in bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        debug_assert!(x < self.width && y < self.height);
        let i = (y as usize * self.width as usize + x as usize) * FRAME_CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Whether `other` has the same dimensions.
    pub fn same_dims(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Size of the sample buffer in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
