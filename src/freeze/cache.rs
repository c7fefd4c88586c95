//! Pre-rendered frame caches that substitute for live chain execution.
//!
//! Freezing stores a track's rendered frames as an immutable cache and locks
//! the track's chain against edits; unfreezing discards the cache and
//! restores live evaluation. Flattening irreversibly bakes the frozen output
//! into the track's source material. A global byte budget across all tracks
//! is enforced by evicting whole least-recently-used caches.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use tracing::{info, warn};

use crate::foundation::core::{Frame, FrameIndex, FrameRange};
use crate::foundation::error::{MoshError, MoshResult};
use crate::track::Track;

/// Freeze cache sizing configuration.
#[derive(Clone, Copy, Debug)]
pub struct FreezeConfig {
    /// Maximum frames stored per frozen track.
    pub max_frames_per_track: usize,
    /// Global byte budget across all tracks' caches.
    pub max_total_bytes: usize,
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self {
            max_frames_per_track: 300,
            max_total_bytes: 512 * 1024 * 1024,
        }
    }
}

#[derive(Debug)]
struct FrozenTrack {
    range: FrameRange,
    frames: Vec<Frame>,
    bytes: usize,
}

/// Per-track frozen frame storage with a global LRU byte budget.
///
/// Reads ([`FreezeCache::frame_at`]) take `&self` and are safe for concurrent
/// access; freezing, unfreezing, and flattening take `&mut self`, so the
/// borrow checker enforces the exclusive per-track write lock.
#[derive(Debug)]
pub struct FreezeCache {
    config: FreezeConfig,
    caches: HashMap<String, FrozenTrack>,
    // Recency order, oldest first. Interior mutability keeps reads `&self`.
    lru: Mutex<VecDeque<String>>,
    total_bytes: usize,
}

impl FreezeCache {
    /// An empty cache with the given configuration.
    pub fn new(config: FreezeConfig) -> Self {
        Self {
            config,
            caches: HashMap::new(),
            lru: Mutex::new(VecDeque::new()),
            total_bytes: 0,
        }
    }

    /// Freeze a track: store its rendered frames and lock its chain.
    ///
    /// `frames` must cover `range` in order, one frame per index. Ranges
    /// longer than the per-track cap are truncated to the first
    /// `max_frames_per_track` frames. Freezing an already-frozen track
    /// replaces its cache.
    pub fn freeze(
        &mut self,
        track: &mut Track,
        range: FrameRange,
        mut frames: Vec<Frame>,
    ) -> MoshResult<()> {
        if range.is_empty() {
            return Err(MoshError::validation("freeze range must be non-empty"));
        }
        if frames.len() as u64 != range.len_frames() {
            return Err(MoshError::validation(format!(
                "freeze expected {} frames for the range, got {}",
                range.len_frames(),
                frames.len()
            )));
        }

        let cap = self.config.max_frames_per_track;
        let range = if frames.len() > cap {
            warn!(
                track = %track.id,
                requested = frames.len(),
                cap,
                "freeze range exceeds per-track cap; truncating"
            );
            frames.truncate(cap);
            FrameRange {
                start: range.start,
                end: FrameIndex(range.start.0 + cap as u64),
            }
        } else {
            range
        };

        self.discard(&track.id);
        let bytes: usize = frames.iter().map(Frame::byte_len).sum();
        self.caches.insert(
            track.id.clone(),
            FrozenTrack {
                range,
                frames,
                bytes,
            },
        );
        self.total_bytes += bytes;
        self.touch(&track.id);
        track.set_frozen(true);

        info!(
            track = %track.id,
            frames = range.len_frames(),
            bytes,
            "track frozen"
        );

        self.evict_over_budget();
        Ok(())
    }

    /// Cached frame for `(track_id, frame)`, or `None` when the index is
    /// outside the frozen range (the caller falls back to live chain
    /// evaluation) or the cache was evicted.
    pub fn frame_at(&self, track_id: &str, frame: FrameIndex) -> Option<Frame> {
        let cached = self.caches.get(track_id)?;
        if !cached.range.contains(frame) {
            return None;
        }
        let idx = (frame.0 - cached.range.start.0) as usize;
        let out = cached.frames[idx].clone();
        self.touch(track_id);
        Some(out)
    }

    /// Whether a track currently holds a cache.
    pub fn is_frozen(&self, track_id: &str) -> bool {
        self.caches.contains_key(track_id)
    }

    /// Discard a track's cache and restore live chain evaluation.
    pub fn unfreeze(&mut self, track: &mut Track) {
        self.discard(&track.id);
        track.set_frozen(false);
        info!(track = %track.id, "track unfrozen");
    }

    /// Irreversibly bake the frozen output: the cached frames are handed
    /// back as the track's new source material and the chain is cleared.
    ///
    /// Destructive, so it requires `confirm` to be explicitly set; the track
    /// must currently be frozen.
    pub fn flatten(&mut self, track: &mut Track, confirm: bool) -> MoshResult<Vec<Frame>> {
        if !confirm {
            return Err(MoshError::validation(
                "flatten is destructive and requires explicit confirmation",
            ));
        }
        let cached = self.caches.remove(&track.id).ok_or_else(|| {
            MoshError::validation(format!(
                "track '{}' is not frozen; freeze before flattening",
                track.id
            ))
        })?;
        self.total_bytes -= cached.bytes;
        self.lru_mut().retain(|id| id != &track.id);

        track.set_frozen(false);
        track.clear_chain();

        info!(
            track = %track.id,
            frames = cached.frames.len(),
            "track flattened; chain cleared"
        );
        Ok(cached.frames)
    }

    /// Total bytes currently held across all tracks.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    fn discard(&mut self, track_id: &str) {
        if let Some(old) = self.caches.remove(track_id) {
            self.total_bytes -= old.bytes;
        }
        self.lru_mut().retain(|id| id != track_id);
    }

    fn touch(&self, track_id: &str) {
        let mut lru = self.lru_mut();
        if let Some(pos) = lru.iter().position(|id| id == track_id) {
            lru.remove(pos);
        }
        lru.push_back(track_id.to_string());
    }

    fn evict_over_budget(&mut self) {
        while self.total_bytes > self.config.max_total_bytes {
            let oldest = {
                let mut lru = self.lru_mut();
                if lru.len() <= 1 {
                    break;
                }
                lru.pop_front()
            };
            let Some(oldest) = oldest else {
                break;
            };
            if let Some(evicted) = self.caches.remove(&oldest) {
                self.total_bytes -= evicted.bytes;
                warn!(
                    track = %oldest,
                    bytes = evicted.bytes,
                    "freeze cache evicted over global budget"
                );
            }
        }
    }

    fn lru_mut(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        self.lru.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FreezeCache {
    fn default() -> Self {
        Self::new(FreezeConfig::default())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/freeze/cache.rs"]
mod tests;
