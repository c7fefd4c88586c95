use std::collections::{BTreeMap, VecDeque};

use crate::foundation::core::{Frame, FrameIndex};

/// Opaque temporal state owned by one `(track, instance)` pair.
///
/// Only the owning effect's evaluation ever reads or replaces a value; the
/// store itself never interprets the contents.
#[derive(Clone, Debug)]
pub enum EffectState {
    /// A decaying accumulation buffer (feedback, trails).
    Accumulator(Frame),
    /// A bounded ring buffer of previously seen frames (datamosh-style
    /// history-referencing effects).
    FrameHistory {
        /// Most recent frames, oldest first.
        frames: VecDeque<Frame>,
        /// Maximum retained frame count.
        cap: usize,
    },
    /// An integrated motion state (position and velocity) for physics
    /// effects that advance one step per frame.
    Motion {
        /// Current displacement in pixels.
        pos: [f64; 2],
        /// Current velocity in pixels per frame.
        vel: [f64; 2],
    },
}

impl EffectState {
    /// Push a frame into a history state, evicting the oldest past `cap`.
    pub fn push_history(frames: &mut VecDeque<Frame>, cap: usize, frame: Frame) {
        frames.push_back(frame);
        while frames.len() > cap.max(1) {
            frames.pop_front();
        }
    }
}

/// Storage key: the `(track, instance)` pair that owns one state entry.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct StateKey {
    /// Owning track id.
    pub track: String,
    /// Owning effect instance id.
    pub instance: String,
}

impl StateKey {
    /// Build a key from track and instance ids.
    pub fn new(track: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            track: track.into(),
            instance: instance.into(),
        }
    }
}

/// One stored state value plus the bookkeeping that makes it addressable by
/// frame index instead of call order.
#[derive(Clone, Debug)]
pub struct StateEntry {
    /// The effect-owned state blob.
    pub state: EffectState,
    /// Last frame index this state was advanced to.
    pub cursor: FrameIndex,
    /// Fingerprint of the state-resetting parameters the state was built
    /// under; a mismatch invalidates the entry.
    pub params_fingerprint: u64,
}

/// Keyed storage for per-instance temporal state.
///
/// An explicit store is passed by reference into every chain run; it is
/// scoped per session/track by its owner and is never a process-wide
/// singleton. Only the single execution context owning a `(track, instance)`
/// pair may mutate its entry.
#[derive(Debug, Default)]
pub struct StateStore {
    entries: BTreeMap<StateKey, StateEntry>,
}

impl StateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the entry for a key.
    pub fn get(&self, key: &StateKey) -> Option<&StateEntry> {
        self.entries.get(key)
    }

    /// Insert or replace the entry for a key.
    pub fn put(&mut self, key: StateKey, entry: StateEntry) {
        self.entries.insert(key, entry);
    }

    /// Destroy the entry for a removed instance.
    pub fn remove_instance(&mut self, key: &StateKey) -> Option<StateEntry> {
        self.entries.remove(key)
    }

    /// Explicit user re-seed: drop the entry so the next evaluation starts
    /// fresh.
    pub fn reset(&mut self, key: &StateKey) {
        self.entries.remove(key);
    }

    /// Drop every entry owned by a track (track reload).
    pub fn clear_track(&mut self, track: &str) {
        self.entries.retain(|k, _| k.track != track);
    }

    /// Invalidate the entry if it was built under different state-resetting
    /// parameters. Returns `true` when an entry was dropped.
    pub fn sync_params(&mut self, key: &StateKey, fingerprint: u64) -> bool {
        if let Some(entry) = self.entries.get(key)
            && entry.params_fingerprint != fingerprint
        {
            tracing::debug!(
                track = %key.track,
                instance = %key.instance,
                "state invalidated by parameter change"
            );
            self.entries.remove(key);
            return true;
        }
        false
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/state/store.rs"]
mod tests;
