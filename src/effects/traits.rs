//! Effect trait definition.
//!
//! All effects implement [`Effect`], which describes their parameter schema,
//! statefulness class, and processing kernel. The chain executor owns
//! masking, mixing, and state persistence; an effect only transforms pixels.

use crate::effects::params::{ParamDef, ResolvedParams};
use crate::foundation::core::{Frame, FrameIndex};
use crate::foundation::error::MoshResult;
use crate::state::store::EffectState;

/// Category for UI grouping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectCategory {
    /// Per-pixel color adjustments.
    Color,
    /// Stylization (grain, posterize, pixelate).
    Stylize,
    /// Spatial displacement.
    Distort,
    /// Effects whose output depends on time or evaluation history.
    Temporal,
}

/// How an effect's output relates to evaluation history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Statefulness {
    /// Output depends only on the current frame and parameters; safe under
    /// arbitrary seek order.
    Pure,
    /// Time-dependent, but a closed-form function of the frame index alone;
    /// safe under arbitrary seek without replay.
    FrameIndexPure,
    /// State advances only by evaluating frames in increasing order from a
    /// checkpoint; out-of-order requests need explicit reconstruction.
    SequentialOnly,
}

/// Per-invocation context handed to [`Effect::process`].
#[derive(Debug)]
pub struct EffectCall<'a> {
    /// Validated parameters for this instance.
    pub params: &'a ResolvedParams,
    /// Frame being evaluated.
    pub frame_index: FrameIndex,
    /// Global deterministic seed for frame-seeded pseudo-random fields.
    pub seed: u64,
    /// Prior state for stateful effects; `None` on first evaluation.
    pub state: Option<&'a EffectState>,
}

/// Result of one effect invocation.
#[derive(Debug)]
pub struct EffectOutput {
    /// Processed frame, same dimensions as the input.
    pub frame: Frame,
    /// Replacement state to persist; `None` for pure effects.
    pub state: Option<EffectState>,
}

impl EffectOutput {
    /// Output with no state to persist.
    pub fn pure(frame: Frame) -> Self {
        Self { frame, state: None }
    }

    /// Output with replacement state.
    pub fn with_state(frame: Frame, state: EffectState) -> Self {
        Self {
            frame,
            state: Some(state),
        }
    }
}

/// Trait for all effects.
pub trait Effect: Send + Sync {
    /// Unique effect key (stable, used in chains and project files).
    fn key(&self) -> &'static str;

    /// Display name for UI.
    fn display_name(&self) -> &'static str;

    /// Category for UI grouping.
    fn category(&self) -> EffectCategory;

    /// Parameter schema (for UI generation and chain-build validation).
    fn param_defs(&self) -> &[ParamDef];

    /// Statefulness class; governs seek safety and export scheduling.
    fn statefulness(&self) -> Statefulness {
        Statefulness::Pure
    }

    /// Transform one frame.
    ///
    /// Stateful effects receive their prior state in `call.state` and return
    /// the replacement via [`EffectOutput::with_state`]; they must never keep
    /// state anywhere else. A broken invocation must return an error, never a
    /// silently unchanged frame.
    fn process(&self, input: &Frame, call: EffectCall<'_>) -> MoshResult<EffectOutput>;
}

impl core::fmt::Debug for dyn Effect + '_ {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Effect").field("key", &self.key()).finish()
    }
}
