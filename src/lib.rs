//! Moshpit is the effect pipeline core of a glitch-oriented video editor.
//!
//! It resolves spatial region masks, validates and applies ordered effect
//! chains (including stateful, temporally-accumulating effects such as
//! feedback, trails, and datamosh-style frame-history corruption), and
//! composites multiple tracks into one output frame.
//!
//! # Pipeline overview
//!
//! 1. **Compile**: `EffectRegistry + [EffectInstance] -> CompiledChain`
//!    (keys, parameter schemas, regions, and depth validated once)
//! 2. **Execute**: `CompiledChain + Frame + FrameIndex -> Frame` per track,
//!    with temporal state in an explicit [`StateStore`]
//! 3. **Composite**: per-track frames blend bottom-to-top into one output
//! 4. **Deliver**: preview requests supersede each other per target; export
//!    streams composited frames to an [`ExportSink`]
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic-by-default**: for a fixed `(chain, frame_index, initial
//!   state)` the output is byte-identical across calls, so scrubbing,
//!   seeking, and export always agree.
//! - **Frame-addressable state**: temporal state is keyed by
//!   `(track, instance)` and carries the frame index it was advanced to; a
//!   sequential-only effect asked for an unreachable frame either replays
//!   from its checkpoint or fails loudly; it never silently returns an
//!   unchanged frame.
//! - **No IO in the pipeline**: raw RGBA8 frames come in from and go out to
//!   external decode/encode collaborators.
#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(missing_docs_in_private_items)]

mod chain;
mod compositor;
mod effects;
mod foundation;
mod freeze;
mod region;
mod render;
mod state;
mod track;

pub use chain::executor::{
    ChainExecutor, ChainLimits, CompiledChain, CompiledInstance, FrameSource, compile_chain,
};
pub use compositor::blend::{BlendMode, blend_pixel};
pub use compositor::composite::{TrackFrame, composite};
pub use effects::builtin::{
    BounceEffect, BrightnessEffect, DatamoshEffect, DriftEffect, FeedbackEffect, GrainEffect,
    InvertEffect, PixelateEffect, PosterizeEffect, TrailEffect,
};
pub use effects::params::{
    OutOfRange, ParamDef, ParamKind, ParamValue, ResolvedParams, resolve_params,
};
pub use effects::registry::EffectRegistry;
pub use effects::traits::{
    Effect, EffectCall, EffectCategory, EffectOutput, Statefulness,
};
pub use foundation::core::{FRAME_CHANNELS, Frame, FrameIndex, FrameRange};
pub use foundation::error::{MoshError, MoshResult};
pub use freeze::cache::{FreezeCache, FreezeConfig};
pub use region::resolver::{
    InterpretationNote, Mask, PixelRect, REGION_PRESETS, RegionInterpretation, RegionMode,
    RegionSpec, ResolvedRegion, parse_region, resolve,
};
pub use render::export::{
    CancelToken, ExportJob, ExportSink, ExportStats, ExportThreading, export_range,
};
pub use render::preview::{PreviewGate, PreviewTicket, RenderTarget};
pub use state::store::{EffectState, StateEntry, StateKey, StateStore};
pub use track::{EffectInstance, Track};
