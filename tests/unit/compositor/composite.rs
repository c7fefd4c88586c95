use super::*;

use crate::compositor::blend::BlendMode;

fn frame(v: [u8; 4]) -> Frame {
    Frame::filled(4, 4, v).unwrap()
}

fn track(id: &str) -> Track {
    Track::new(id, id)
}

#[test]
fn single_track_normal_full_opacity_is_its_frame() {
    let t = track("a");
    let out = composite(&[TrackFrame {
        track: &t,
        frame: frame([10, 20, 30, 255]),
    }])
    .unwrap();
    assert_eq!(out.pixel(0, 0), [10, 20, 30, 255]);
}

#[test]
fn all_tracks_excluded_is_an_error() {
    let mut t = track("a");
    t.muted = true;
    let err = composite(&[TrackFrame {
        track: &t,
        frame: frame([0, 0, 0, 255]),
    }])
    .unwrap_err();
    assert!(err.to_string().contains("at least one contributing track"));
}

#[test]
fn muted_tracks_do_not_contribute() {
    let bottom = track("bottom");
    let mut top = track("top");
    top.muted = true;

    let out = composite(&[
        TrackFrame {
            track: &bottom,
            frame: frame([10, 10, 10, 255]),
        },
        TrackFrame {
            track: &top,
            frame: frame([200, 200, 200, 255]),
        },
    ])
    .unwrap();
    assert_eq!(out.pixel(0, 0), [10, 10, 10, 255]);
}

#[test]
fn solo_excludes_non_soloed_identically_to_removal() {
    let mut a = track("a");
    a.solo = true;
    let b = track("b");
    let c = track("c");

    let fa = frame([40, 50, 60, 255]);
    let with_all = composite(&[
        TrackFrame {
            track: &b,
            frame: frame([200, 0, 0, 255]),
        },
        TrackFrame {
            track: &a,
            frame: fa.clone(),
        },
        TrackFrame {
            track: &c,
            frame: frame([0, 200, 0, 255]),
        },
    ])
    .unwrap();

    let alone = composite(&[TrackFrame {
        track: &a,
        frame: fa,
    }])
    .unwrap();

    assert_eq!(with_all.data(), alone.data());
}

#[test]
fn multiply_at_full_opacity_is_per_texel_product() {
    let bottom = track("b");
    let mut top = track("t");
    top.blend = BlendMode::Multiply;

    let out = composite(&[
        TrackFrame {
            track: &bottom,
            frame: frame([128, 255, 64, 255]),
        },
        TrackFrame {
            track: &top,
            frame: frame([128, 128, 255, 255]),
        },
    ])
    .unwrap();

    // Normalized product, clamped to range: 0.502*0.502, 1.0*0.502, 0.251*1.0.
    assert_eq!(out.pixel(0, 0), [64, 128, 64, 255]);
}

#[test]
fn opacity_scales_top_contribution() {
    let bottom = track("b");
    let mut top = track("t");
    top.opacity = 0.5;

    let out = composite(&[
        TrackFrame {
            track: &bottom,
            frame: frame([0, 0, 0, 255]),
        },
        TrackFrame {
            track: &top,
            frame: frame([255, 255, 255, 255]),
        },
    ])
    .unwrap();
    assert_eq!(out.pixel(0, 0)[0], 128);
}

#[test]
fn dimension_mismatch_is_rejected() {
    let a = track("a");
    let b = track("b");
    let err = composite(&[
        TrackFrame {
            track: &a,
            frame: Frame::filled(4, 4, [0, 0, 0, 255]).unwrap(),
        },
        TrackFrame {
            track: &b,
            frame: Frame::filled(8, 8, [0, 0, 0, 255]).unwrap(),
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("expected 4x4"));
}

#[test]
fn add_blend_overflow_is_clamped_between_layers() {
    let bottom = track("b");
    let mut mid = track("m");
    mid.blend = BlendMode::Add;
    let mut top = track("t");
    top.blend = BlendMode::Subtract;

    let out = composite(&[
        TrackFrame {
            track: &bottom,
            frame: frame([200, 200, 200, 255]),
        },
        TrackFrame {
            track: &mid,
            frame: frame([200, 200, 200, 255]),
        },
        TrackFrame {
            track: &top,
            frame: frame([55, 55, 55, 255]),
        },
    ])
    .unwrap();

    // 200 + 200 clamps to 255 before the subtract layer sees it.
    assert_eq!(out.pixel(0, 0), [200, 200, 200, 255]);
}
