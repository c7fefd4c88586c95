use super::*;

use crate::track::EffectInstance;

fn frames(n: u64, v: u8) -> Vec<Frame> {
    (0..n).map(|_| Frame::filled(4, 4, [v, v, v, 255]).unwrap()).collect()
}

fn range(start: u64, end: u64) -> FrameRange {
    FrameRange::new(FrameIndex(start), FrameIndex(end)).unwrap()
}

#[test]
fn frozen_range_serves_frames_and_beyond_falls_back() {
    let mut cache = FreezeCache::default();
    let mut track = Track::new("a", "a");

    cache.freeze(&mut track, range(0, 300), frames(300, 10)).unwrap();
    assert!(track.is_frozen());

    // Inside the frozen range: served from the cache.
    assert!(cache.frame_at("a", FrameIndex(0)).is_some());
    assert!(cache.frame_at("a", FrameIndex(299)).is_some());

    // Frame 350 is outside the cache: the caller falls back to live chain
    // evaluation, with no error.
    assert!(cache.frame_at("a", FrameIndex(350)).is_none());
}

#[test]
fn freeze_validates_frame_count() {
    let mut cache = FreezeCache::default();
    let mut track = Track::new("a", "a");
    assert!(cache.freeze(&mut track, range(0, 10), frames(3, 0)).is_err());
    assert!(!track.is_frozen());
}

#[test]
fn freeze_truncates_to_per_track_cap() {
    let mut cache = FreezeCache::new(FreezeConfig {
        max_frames_per_track: 5,
        max_total_bytes: usize::MAX,
    });
    let mut track = Track::new("a", "a");
    cache.freeze(&mut track, range(0, 20), frames(20, 1)).unwrap();

    assert!(cache.frame_at("a", FrameIndex(4)).is_some());
    assert!(cache.frame_at("a", FrameIndex(5)).is_none());
}

#[test]
fn frozen_track_rejects_chain_edits_until_unfreeze() {
    let mut cache = FreezeCache::default();
    let mut track = Track::new("a", "a");
    track
        .push_instance(EffectInstance::new("fx", "invert"))
        .unwrap();

    cache.freeze(&mut track, range(0, 2), frames(2, 0)).unwrap();

    assert!(track.push_instance(EffectInstance::new("fx2", "grain")).is_err());
    assert!(track
        .set_instance_params("fx", serde_json::json!({}))
        .is_err());
    assert!(track.remove_instance("fx").is_err());

    cache.unfreeze(&mut track);
    assert!(!track.is_frozen());
    assert!(track
        .set_instance_params("fx", serde_json::json!({}))
        .is_ok());
}

#[test]
fn unfreeze_discards_cache() {
    let mut cache = FreezeCache::default();
    let mut track = Track::new("a", "a");
    cache.freeze(&mut track, range(0, 4), frames(4, 9)).unwrap();
    assert!(cache.is_frozen("a"));

    cache.unfreeze(&mut track);
    assert!(!cache.is_frozen("a"));
    assert!(cache.frame_at("a", FrameIndex(0)).is_none());
    assert_eq!(cache.total_bytes(), 0);
}

#[test]
fn flatten_requires_confirmation_and_clears_chain() {
    let mut cache = FreezeCache::default();
    let mut track = Track::new("a", "a");
    track
        .push_instance(EffectInstance::new("fx", "invert"))
        .unwrap();
    cache.freeze(&mut track, range(0, 3), frames(3, 42)).unwrap();

    // Unconfirmed flatten is refused and changes nothing.
    assert!(cache.flatten(&mut track, false).is_err());
    assert!(track.is_frozen());

    let baked = cache.flatten(&mut track, true).unwrap();
    assert_eq!(baked.len(), 3);
    assert_eq!(baked[0].pixel(0, 0), [42, 42, 42, 255]);
    assert!(track.chain().is_empty());
    assert!(!track.is_frozen());
    assert!(!cache.is_frozen("a"));
}

#[test]
fn flatten_without_freeze_is_an_error() {
    let mut cache = FreezeCache::default();
    let mut track = Track::new("a", "a");
    assert!(cache.flatten(&mut track, true).is_err());
}

#[test]
fn global_budget_evicts_least_recently_used_cache() {
    // Each 4x4 frame is 64 bytes; two frames per track = 128 bytes.
    let mut cache = FreezeCache::new(FreezeConfig {
        max_frames_per_track: 300,
        max_total_bytes: 300,
    });
    let mut a = Track::new("a", "a");
    let mut b = Track::new("b", "b");
    let mut c = Track::new("c", "c");

    cache.freeze(&mut a, range(0, 2), frames(2, 1)).unwrap();
    cache.freeze(&mut b, range(0, 2), frames(2, 2)).unwrap();

    // Touch 'a' so 'b' becomes the least recently used.
    assert!(cache.frame_at("a", FrameIndex(0)).is_some());

    cache.freeze(&mut c, range(0, 2), frames(2, 3)).unwrap();

    assert!(cache.is_frozen("a"));
    assert!(!cache.is_frozen("b"), "LRU cache should have been evicted");
    assert!(cache.is_frozen("c"));
    assert!(cache.total_bytes() <= 300);
}
