//! Built-in effects.
//!
//! The set is small but covers every statefulness class the pipeline has to
//! handle: pure per-pixel kernels, frame-index-pure procedural effects, and
//! sequential-only effects carrying accumulation buffers, frame history, and
//! integrated motion state.

use std::collections::VecDeque;

use crate::effects::params::{OutOfRange, ParamDef, ParamKind, ParamValue};
use crate::effects::traits::{Effect, EffectCall, EffectCategory, EffectOutput, Statefulness};
use crate::foundation::core::{FRAME_CHANNELS, Frame};
use crate::foundation::error::MoshResult;
use crate::foundation::math::{hash01, lerp_u8};
use crate::state::store::EffectState;

/// Apply a per-channel function to RGB, leaving alpha untouched.
fn map_rgb(input: &Frame, f: impl Fn(u8) -> u8) -> MoshResult<Frame> {
    let src = input.data();
    let mut data = Vec::with_capacity(src.len());
    for px in src.chunks_exact(FRAME_CHANNELS) {
        data.push(f(px[0]));
        data.push(f(px[1]));
        data.push(f(px[2]));
        data.push(px[3]);
    }
    Frame::new(input.width(), input.height(), data)
}

/// Translate a frame by whole pixels, filling vacated area with transparent
/// black.
fn shift(input: &Frame, dx: i64, dy: i64) -> MoshResult<Frame> {
    let w = i64::from(input.width());
    let h = i64::from(input.height());
    let mut data = vec![0u8; input.data().len()];
    for y in 0..h {
        let sy = y - dy;
        if sy < 0 || sy >= h {
            continue;
        }
        for x in 0..w {
            let sx = x - dx;
            if sx < 0 || sx >= w {
                continue;
            }
            let src = input.pixel(sx as u32, sy as u32);
            let i = (y * w + x) as usize * FRAME_CHANNELS;
            data[i..i + FRAME_CHANNELS].copy_from_slice(&src);
        }
    }
    Frame::new(input.width(), input.height(), data)
}

fn rel_luma(px: [u8; 4]) -> f32 {
    (0.2126 * f32::from(px[0]) + 0.7152 * f32::from(px[1]) + 0.0722 * f32::from(px[2])) / 255.0
}

// ---------------------------------------------------------------------------
// Pure effects
// ---------------------------------------------------------------------------

/// Multiplies RGB by a gain factor.
pub struct BrightnessEffect;

static BRIGHTNESS_PARAMS: [ParamDef; 1] = [ParamDef {
    key: "gain",
    kind: ParamKind::Float { min: 0.0, max: 4.0 },
    default: ParamValue::Float(1.0),
    out_of_range: OutOfRange::Clamp,
    essential: true,
    resets_state: false,
}];

impl Effect for BrightnessEffect {
    fn key(&self) -> &'static str {
        "brightness"
    }

    fn display_name(&self) -> &'static str {
        "Brightness"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Color
    }

    fn param_defs(&self) -> &[ParamDef] {
        &BRIGHTNESS_PARAMS
    }

    fn process(&self, input: &Frame, call: EffectCall<'_>) -> MoshResult<EffectOutput> {
        let gain = call.params.f64("gain") as f32;
        let frame = map_rgb(input, |c| {
            (f32::from(c) * gain).round().clamp(0.0, 255.0) as u8
        })?;
        Ok(EffectOutput::pure(frame))
    }
}

/// Inverts RGB.
pub struct InvertEffect;

impl Effect for InvertEffect {
    fn key(&self) -> &'static str {
        "invert"
    }

    fn display_name(&self) -> &'static str {
        "Invert"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Color
    }

    fn param_defs(&self) -> &[ParamDef] {
        &[]
    }

    fn process(&self, input: &Frame, _call: EffectCall<'_>) -> MoshResult<EffectOutput> {
        Ok(EffectOutput::pure(map_rgb(input, |c| 255 - c)?))
    }
}

/// Quantizes RGB into a fixed number of levels per channel.
pub struct PosterizeEffect;

static POSTERIZE_PARAMS: [ParamDef; 1] = [ParamDef {
    key: "levels",
    kind: ParamKind::Int { min: 2, max: 64 },
    default: ParamValue::Int(4),
    out_of_range: OutOfRange::Reject,
    essential: true,
    resets_state: false,
}];

impl Effect for PosterizeEffect {
    fn key(&self) -> &'static str {
        "posterize"
    }

    fn display_name(&self) -> &'static str {
        "Posterize"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Stylize
    }

    fn param_defs(&self) -> &[ParamDef] {
        &POSTERIZE_PARAMS
    }

    fn process(&self, input: &Frame, call: EffectCall<'_>) -> MoshResult<EffectOutput> {
        let steps = (call.params.i64("levels") - 1).max(1) as f32;
        let frame = map_rgb(input, |c| {
            ((f32::from(c) / 255.0 * steps).round() / steps * 255.0).round() as u8
        })?;
        Ok(EffectOutput::pure(frame))
    }
}

/// Replaces each block of pixels with its top-left sample.
pub struct PixelateEffect;

static PIXELATE_PARAMS: [ParamDef; 1] = [ParamDef {
    key: "block",
    kind: ParamKind::Int { min: 1, max: 256 },
    default: ParamValue::Int(8),
    out_of_range: OutOfRange::Clamp,
    essential: true,
    resets_state: false,
}];

impl Effect for PixelateEffect {
    fn key(&self) -> &'static str {
        "pixelate"
    }

    fn display_name(&self) -> &'static str {
        "Pixelate"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Stylize
    }

    fn param_defs(&self) -> &[ParamDef] {
        &PIXELATE_PARAMS
    }

    fn process(&self, input: &Frame, call: EffectCall<'_>) -> MoshResult<EffectOutput> {
        let block = call.params.i64("block").max(1) as u32;
        let mut data = Vec::with_capacity(input.data().len());
        for y in 0..input.height() {
            for x in 0..input.width() {
                let px = input.pixel(x - x % block, y - y % block);
                data.extend_from_slice(&px);
            }
        }
        Ok(EffectOutput::pure(Frame::new(
            input.width(),
            input.height(),
            data,
        )?))
    }
}

// ---------------------------------------------------------------------------
// Frame-index-pure effects
// ---------------------------------------------------------------------------

/// Additive luma noise seeded by `(seed, frame_index, x, y)`.
///
/// The noise field is a pure function of the frame index, so scrubbing to any
/// frame reproduces exactly the grain an in-order playback would show there.
pub struct GrainEffect;

static GRAIN_PARAMS: [ParamDef; 1] = [ParamDef {
    key: "amount",
    kind: ParamKind::Float { min: 0.0, max: 1.0 },
    default: ParamValue::Float(0.25),
    out_of_range: OutOfRange::Clamp,
    essential: true,
    resets_state: false,
}];

impl Effect for GrainEffect {
    fn key(&self) -> &'static str {
        "grain"
    }

    fn display_name(&self) -> &'static str {
        "Grain"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Stylize
    }

    fn param_defs(&self) -> &[ParamDef] {
        &GRAIN_PARAMS
    }

    fn statefulness(&self) -> Statefulness {
        Statefulness::FrameIndexPure
    }

    fn process(&self, input: &Frame, call: EffectCall<'_>) -> MoshResult<EffectOutput> {
        let amount = call.params.f64("amount") as f32;
        let src = input.data();
        let mut data = Vec::with_capacity(src.len());
        for (idx, px) in src.chunks_exact(FRAME_CHANNELS).enumerate() {
            let x = (idx as u64) % u64::from(input.width());
            let y = (idx as u64) / u64::from(input.width());
            let n = (hash01(call.seed, call.frame_index.0, x, y) - 0.5) * 2.0 * amount * 96.0;
            for c in 0..3 {
                data.push((f32::from(px[c]) + n).round().clamp(0.0, 255.0) as u8);
            }
            data.push(px[3]);
        }
        Ok(EffectOutput::pure(Frame::new(
            input.width(),
            input.height(),
            data,
        )?))
    }
}

/// Vertical bounce displacement integrated analytically from t = 0.
///
/// The trajectory is closed-form in the frame index, so there is no physics
/// state to replay on seeks.
pub struct BounceEffect;

static BOUNCE_PARAMS: [ParamDef; 2] = [
    ParamDef {
        key: "period",
        kind: ParamKind::Int { min: 1, max: 600 },
        default: ParamValue::Int(48),
        out_of_range: OutOfRange::Clamp,
        essential: true,
        resets_state: false,
    },
    ParamDef {
        key: "height",
        kind: ParamKind::Float {
            min: 0.0,
            max: 4096.0,
        },
        default: ParamValue::Float(120.0),
        out_of_range: OutOfRange::Clamp,
        essential: true,
        resets_state: false,
    },
];

impl Effect for BounceEffect {
    fn key(&self) -> &'static str {
        "bounce"
    }

    fn display_name(&self) -> &'static str {
        "Bounce"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Distort
    }

    fn param_defs(&self) -> &[ParamDef] {
        &BOUNCE_PARAMS
    }

    fn statefulness(&self) -> Statefulness {
        Statefulness::FrameIndexPure
    }

    fn process(&self, input: &Frame, call: EffectCall<'_>) -> MoshResult<EffectOutput> {
        let period = call.params.i64("period").max(1) as u64;
        let height = call.params.f64("height");
        let phase = (call.frame_index.0 % period) as f64 / period as f64;
        // Parabolic arc touching the rest position at both ends of the period.
        let lift = height * (1.0 - (2.0 * phase - 1.0).powi(2));
        let frame = shift(input, 0, -(lift.round() as i64))?;
        Ok(EffectOutput::pure(frame))
    }
}

// ---------------------------------------------------------------------------
// Sequential-only effects
// ---------------------------------------------------------------------------

/// Classic video feedback: each output is a blend of the input with the
/// previous output.
pub struct FeedbackEffect;

static FEEDBACK_PARAMS: [ParamDef; 1] = [ParamDef {
    key: "decay",
    kind: ParamKind::Float { min: 0.0, max: 0.99 },
    default: ParamValue::Float(0.85),
    out_of_range: OutOfRange::Clamp,
    essential: true,
    resets_state: false,
}];

impl Effect for FeedbackEffect {
    fn key(&self) -> &'static str {
        "feedback"
    }

    fn display_name(&self) -> &'static str {
        "Feedback"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Temporal
    }

    fn param_defs(&self) -> &[ParamDef] {
        &FEEDBACK_PARAMS
    }

    fn statefulness(&self) -> Statefulness {
        Statefulness::SequentialOnly
    }

    fn process(&self, input: &Frame, call: EffectCall<'_>) -> MoshResult<EffectOutput> {
        let decay = call.params.f64("decay") as f32;
        let acc = match call.state {
            Some(EffectState::Accumulator(prev)) if prev.same_dims(input) => Some(prev),
            _ => None,
        };
        let frame = match acc {
            None => input.clone(),
            Some(prev) => {
                let mut data = Vec::with_capacity(input.data().len());
                for (i, p) in input.data().iter().zip(prev.data()) {
                    data.push(lerp_u8(*i, *p, decay));
                }
                Frame::new(input.width(), input.height(), data)?
            }
        };
        let state = EffectState::Accumulator(frame.clone());
        Ok(EffectOutput::with_state(frame, state))
    }
}

/// Bright samples leave a decaying trail over subsequent frames.
pub struct TrailEffect;

static TRAIL_PARAMS: [ParamDef; 2] = [
    ParamDef {
        key: "threshold",
        kind: ParamKind::Float { min: 0.0, max: 1.0 },
        default: ParamValue::Float(0.6),
        out_of_range: OutOfRange::Clamp,
        essential: true,
        resets_state: false,
    },
    ParamDef {
        key: "decay",
        kind: ParamKind::Float { min: 0.0, max: 0.99 },
        default: ParamValue::Float(0.8),
        out_of_range: OutOfRange::Clamp,
        essential: false,
        resets_state: false,
    },
];

impl Effect for TrailEffect {
    fn key(&self) -> &'static str {
        "trail"
    }

    fn display_name(&self) -> &'static str {
        "Trail"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Temporal
    }

    fn param_defs(&self) -> &[ParamDef] {
        &TRAIL_PARAMS
    }

    fn statefulness(&self) -> Statefulness {
        Statefulness::SequentialOnly
    }

    fn process(&self, input: &Frame, call: EffectCall<'_>) -> MoshResult<EffectOutput> {
        let threshold = call.params.f64("threshold") as f32;
        let decay = call.params.f64("decay") as f32;

        let acc = match call.state {
            Some(EffectState::Accumulator(prev)) if prev.same_dims(input) => Some(prev),
            _ => None,
        };

        let pixels = input.pixel_count();
        let mut acc_data = Vec::with_capacity(input.data().len());
        let mut out_data = Vec::with_capacity(input.data().len());
        for i in 0..pixels {
            let o = i * FRAME_CHANNELS;
            let px = [
                input.data()[o],
                input.data()[o + 1],
                input.data()[o + 2],
                input.data()[o + 3],
            ];
            let bright = rel_luma(px) >= threshold;
            for c in 0..FRAME_CHANNELS {
                let decayed = acc.map_or(0.0, |a| f32::from(a.data()[o + c]) * decay);
                let held = if bright {
                    f32::from(px[c]).max(decayed)
                } else {
                    decayed
                };
                let held = held.round().clamp(0.0, 255.0) as u8;
                acc_data.push(held);
                out_data.push(px[c].max(held));
            }
        }

        let acc_frame = Frame::new(input.width(), input.height(), acc_data)?;
        let out_frame = Frame::new(input.width(), input.height(), out_data)?;
        Ok(EffectOutput::with_state(
            out_frame,
            EffectState::Accumulator(acc_frame),
        ))
    }
}

/// Integrated camera drift: seeded impulses accumulate into velocity, a
/// spring pulls the image back toward rest.
///
/// Unlike [`BounceEffect`] the motion is numerically integrated one frame at
/// a time, so the state is sequential-only.
pub struct DriftEffect;

static DRIFT_PARAMS: [ParamDef; 3] = [
    ParamDef {
        key: "impulse",
        kind: ParamKind::Float { min: 0.0, max: 50.0 },
        default: ParamValue::Float(6.0),
        out_of_range: OutOfRange::Clamp,
        essential: true,
        resets_state: false,
    },
    ParamDef {
        key: "spring",
        kind: ParamKind::Float { min: 0.0, max: 1.0 },
        default: ParamValue::Float(0.12),
        out_of_range: OutOfRange::Clamp,
        essential: false,
        resets_state: false,
    },
    ParamDef {
        key: "damping",
        kind: ParamKind::Float { min: 0.0, max: 1.0 },
        default: ParamValue::Float(0.92),
        out_of_range: OutOfRange::Clamp,
        essential: false,
        resets_state: false,
    },
];

impl Effect for DriftEffect {
    fn key(&self) -> &'static str {
        "drift"
    }

    fn display_name(&self) -> &'static str {
        "Drift"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Distort
    }

    fn param_defs(&self) -> &[ParamDef] {
        &DRIFT_PARAMS
    }

    fn statefulness(&self) -> Statefulness {
        Statefulness::SequentialOnly
    }

    fn process(&self, input: &Frame, call: EffectCall<'_>) -> MoshResult<EffectOutput> {
        let impulse = call.params.f64("impulse");
        let spring = call.params.f64("spring");
        let damping = call.params.f64("damping");

        let (mut pos, mut vel) = match call.state {
            Some(EffectState::Motion { pos, vel }) => (*pos, *vel),
            _ => ([0.0, 0.0], [0.0, 0.0]),
        };

        let f = call.frame_index.0;
        let ix = (f64::from(hash01(call.seed, f, 0, 1)) - 0.5) * 2.0 * impulse;
        let iy = (f64::from(hash01(call.seed, f, 1, 0)) - 0.5) * 2.0 * impulse;
        for (axis, imp) in [(0usize, ix), (1usize, iy)] {
            vel[axis] = damping * (vel[axis] + imp - spring * pos[axis]);
            pos[axis] += vel[axis];
        }

        let frame = shift(input, pos[0].round() as i64, pos[1].round() as i64)?;
        Ok(EffectOutput::with_state(
            frame,
            EffectState::Motion { pos, vel },
        ))
    }
}

/// Block-level corruption that pulls macroblocks from recent frame history.
pub struct DatamoshEffect;

static DATAMOSH_PARAMS: [ParamDef; 3] = [
    ParamDef {
        key: "strength",
        kind: ParamKind::Float { min: 0.0, max: 1.0 },
        default: ParamValue::Float(0.5),
        out_of_range: OutOfRange::Clamp,
        essential: true,
        resets_state: false,
    },
    ParamDef {
        key: "history",
        kind: ParamKind::Int { min: 1, max: 30 },
        default: ParamValue::Int(8),
        out_of_range: OutOfRange::Clamp,
        essential: false,
        // The ring buffer is sized by this value; resizing it mid-run would
        // change which past frames are reachable.
        resets_state: true,
    },
    ParamDef {
        key: "block",
        kind: ParamKind::Int { min: 2, max: 64 },
        default: ParamValue::Int(16),
        out_of_range: OutOfRange::Clamp,
        essential: false,
        resets_state: false,
    },
];

impl Effect for DatamoshEffect {
    fn key(&self) -> &'static str {
        "datamosh"
    }

    fn display_name(&self) -> &'static str {
        "Datamosh"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Temporal
    }

    fn param_defs(&self) -> &[ParamDef] {
        &DATAMOSH_PARAMS
    }

    fn statefulness(&self) -> Statefulness {
        Statefulness::SequentialOnly
    }

    fn process(&self, input: &Frame, call: EffectCall<'_>) -> MoshResult<EffectOutput> {
        let strength = call.params.f64("strength") as f32;
        let cap = call.params.i64("history").max(1) as usize;
        let block = call.params.i64("block").max(2) as u32;

        let mut history: VecDeque<Frame> = match call.state {
            Some(EffectState::FrameHistory { frames, .. }) => frames
                .iter()
                .filter(|f| f.same_dims(input))
                .cloned()
                .collect(),
            _ => VecDeque::new(),
        };

        let frame = if history.is_empty() {
            input.clone()
        } else {
            let mut data = input.data().to_vec();
            let blocks_x = input.width().div_ceil(block);
            let blocks_y = input.height().div_ceil(block);
            for by in 0..blocks_y {
                for bx in 0..blocks_x {
                    let r = hash01(call.seed, call.frame_index.0, u64::from(bx), u64::from(by));
                    if r >= strength {
                        continue;
                    }
                    // A second hash picks which past frame the block is held from.
                    let pick = hash01(
                        call.seed ^ 0x6d6f_7368,
                        call.frame_index.0,
                        u64::from(bx),
                        u64::from(by),
                    );
                    let held = &history[(pick * history.len() as f32) as usize % history.len()];
                    copy_block(&mut data, held, bx * block, by * block, block);
                }
            }
            Frame::new(input.width(), input.height(), data)?
        };

        EffectState::push_history(&mut history, cap, input.clone());
        Ok(EffectOutput::with_state(
            frame,
            EffectState::FrameHistory {
                frames: history,
                cap,
            },
        ))
    }
}

fn copy_block(dst: &mut [u8], src: &Frame, x0: u32, y0: u32, block: u32) {
    let w = src.width();
    let h = src.height();
    for y in y0..(y0 + block).min(h) {
        for x in x0..(x0 + block).min(w) {
            let px = src.pixel(x, y);
            let i = (y as usize * w as usize + x as usize) * FRAME_CHANNELS;
            dst[i..i + FRAME_CHANNELS].copy_from_slice(&px);
        }
    }
}

/// All built-in effects, in registration order.
pub(crate) fn builtin_effects() -> Vec<Box<dyn Effect>> {
    vec![
        Box::new(BrightnessEffect),
        Box::new(InvertEffect),
        Box::new(PosterizeEffect),
        Box::new(PixelateEffect),
        Box::new(GrainEffect),
        Box::new(BounceEffect),
        Box::new(FeedbackEffect),
        Box::new(TrailEffect),
        Box::new(DriftEffect),
        Box::new(DatamoshEffect),
    ]
}

#[cfg(test)]
#[path = "../../tests/unit/effects/builtin.rs"]
mod tests;
