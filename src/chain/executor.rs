//! Chain compilation and execution.
//!
//! A chain is validated once into a [`CompiledChain`] (depth, effect keys,
//! parameters, regions); per-frame execution then runs the compiled
//! instances in declared order with masking, dry/wet mixing, and state
//! persistence. For a fixed `(chain, frame_index, initial state)` the output
//! is byte-identical across repeated calls.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::effects::params::ResolvedParams;
use crate::effects::registry::EffectRegistry;
use crate::effects::traits::{Effect, EffectCall, Statefulness};
use crate::foundation::core::{FRAME_CHANNELS, Frame, FrameIndex};
use crate::foundation::error::{MoshError, MoshResult};
use crate::foundation::math::{Fnv1a64, lerp_u8};
use crate::region::resolver::{self, Mask, RegionSpec};
use crate::state::store::{EffectState, StateEntry, StateKey, StateStore};
use crate::track::EffectInstance;

/// Supplies track source frames by index.
///
/// The export driver and the sequential-state reconstruction path both need
/// to pull arbitrary source frames; the trait keeps decode concerns outside
/// this crate.
pub trait FrameSource: Sync {
    /// Source frame for `frame`.
    fn frame_at(&self, frame: FrameIndex) -> MoshResult<Frame>;
}

/// Execution limits enforced per `apply_chain` call.
#[derive(Clone, Copy, Debug)]
pub struct ChainLimits {
    /// Maximum instances per chain, checked at build time.
    pub max_depth: usize,
    /// Wall-clock budget for one chain run, checked between instances.
    pub frame_budget: Duration,
}

impl Default for ChainLimits {
    fn default() -> Self {
        Self {
            max_depth: 10,
            frame_budget: Duration::from_secs(2),
        }
    }
}

/// One validated instance inside a compiled chain.
#[derive(Clone, Debug)]
pub struct CompiledInstance {
    /// Stable instance id.
    pub id: String,
    /// Effect key, guaranteed present in the registry at compile time.
    pub effect: String,
    /// Validated parameters.
    pub params: ResolvedParams,
    /// Statefulness class of the effect.
    pub statefulness: Statefulness,
    /// Optional region restriction.
    pub region: Option<RegionSpec>,
    /// Feather radius for the region mask.
    pub feather_px: f32,
    /// Dry/wet mix in `[0, 1]`.
    pub mix: f32,
    /// Skip entirely when set.
    pub bypass: bool,
    /// Fingerprint over the state-resetting parameters.
    pub state_fingerprint: u64,
    mask_fingerprint: u64,
}

impl CompiledInstance {
    fn is_active_sequential(&self) -> bool {
        self.statefulness == Statefulness::SequentialOnly && !self.bypass && self.mix > 0.0
    }
}

/// A validated, executable effect chain.
#[derive(Clone, Debug, Default)]
pub struct CompiledChain {
    instances: Vec<CompiledInstance>,
}

impl CompiledChain {
    /// Instances in execution order.
    pub fn instances(&self) -> &[CompiledInstance] {
        &self.instances
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Whether every active instance is safe under arbitrary seek order
    /// (no sequential-only state anywhere in the chain).
    pub fn is_seek_safe(&self) -> bool {
        !self.instances.iter().any(CompiledInstance::is_active_sequential)
    }
}

/// Validate raw instances into a [`CompiledChain`].
///
/// All validation happens here, not per frame: chain depth, effect keys
/// (with fuzzy suggestions), parameter schemas (NaN/Inf always rejected),
/// and region specs.
pub fn compile_chain(
    registry: &EffectRegistry,
    instances: &[EffectInstance],
    limits: &ChainLimits,
) -> MoshResult<CompiledChain> {
    if instances.len() > limits.max_depth {
        return Err(MoshError::ChainTooDeep {
            len: instances.len(),
            max: limits.max_depth,
        });
    }

    let mut compiled = Vec::with_capacity(instances.len());
    for inst in instances {
        inst.validate()?;
        if compiled.iter().any(|c: &CompiledInstance| c.id == inst.id) {
            return Err(MoshError::validation(format!(
                "duplicate instance id '{}' in chain",
                inst.id
            )));
        }

        let effect = registry.require(&inst.effect)?;
        let params = registry.resolve_params(&inst.effect, &inst.params)?;
        if let Some(region) = &inst.region {
            resolver::validate_spec(region)?;
        }

        let reset_keys = effect
            .param_defs()
            .iter()
            .filter(|d| d.resets_state)
            .map(|d| d.key);
        let state_fingerprint = params.fingerprint_of(reset_keys);

        compiled.push(CompiledInstance {
            id: inst.id.clone(),
            effect: inst.effect.clone(),
            statefulness: effect.statefulness(),
            mask_fingerprint: mask_fingerprint(inst.region.as_ref(), inst.feather_px),
            params,
            region: inst.region.clone(),
            feather_px: inst.feather_px,
            mix: inst.mix,
            bypass: inst.bypass,
            state_fingerprint,
        });
    }

    Ok(CompiledChain {
        instances: compiled,
    })
}

fn mask_fingerprint(region: Option<&RegionSpec>, feather_px: f32) -> u64 {
    let mut h = Fnv1a64::new_default();
    match region {
        None => h.write_u64(0),
        Some(spec) => {
            // Serde form is stable for a given spec value.
            let json = serde_json::to_string(spec).unwrap_or_default();
            h.write_bytes(json.as_bytes());
        }
    }
    h.write_u64(u64::from(feather_px.to_bits()));
    h.finish()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StateMode {
    /// Out-of-order sequential state raises `StateInconsistency`.
    Strict,
    /// Frames are being fed in order by the replay driver.
    Replay,
}

/// Applies compiled chains to frames, memoizing region masks per
/// `(region, resolution)` pair.
pub struct ChainExecutor<'r> {
    registry: &'r EffectRegistry,
    limits: ChainLimits,
    seed: u64,
    mask_cache: HashMap<(u64, u32, u32), Mask>,
}

impl<'r> ChainExecutor<'r> {
    /// Build an executor over a registry with the given limits and global
    /// determinism seed.
    pub fn new(registry: &'r EffectRegistry, limits: ChainLimits, seed: u64) -> Self {
        Self {
            registry,
            limits,
            seed,
            mask_cache: HashMap::new(),
        }
    }

    /// Apply a chain to one frame.
    ///
    /// Strict stateful contract: a sequential-only instance whose stored
    /// state is not already at `frame_index - 1` fails with
    /// [`MoshError::StateInconsistency`]; it never silently returns an
    /// unmodified frame. Use [`ChainExecutor::apply_chain_replaying`] when a
    /// frame source is available for reconstruction.
    #[tracing::instrument(skip(self, input, chain, store), fields(frame = frame_index.0))]
    pub fn apply_chain(
        &mut self,
        input: &Frame,
        chain: &CompiledChain,
        frame_index: FrameIndex,
        track_id: &str,
        store: &mut StateStore,
    ) -> MoshResult<Frame> {
        self.run_frame(input, chain, frame_index, track_id, store, StateMode::Strict)
    }

    /// Apply a chain at `frame_index`, reconstructing sequential state
    /// invisibly when it is not already positioned at `frame_index - 1`.
    ///
    /// Reconstruction continues from the stored cursor when the request is
    /// ahead of it, and replays from frame 0 with fresh state on backward or
    /// repeated requests. Output is byte-identical to having evaluated every
    /// frame in order from the start.
    #[tracing::instrument(skip(self, source, chain, store), fields(frame = frame_index.0))]
    pub fn apply_chain_replaying(
        &mut self,
        source: &dyn FrameSource,
        chain: &CompiledChain,
        frame_index: FrameIndex,
        track_id: &str,
        store: &mut StateStore,
    ) -> MoshResult<Frame> {
        let sequential: Vec<&CompiledInstance> = chain
            .instances()
            .iter()
            .filter(|i| i.is_active_sequential())
            .collect();

        if sequential.is_empty() {
            let input = source.frame_at(frame_index)?;
            return self.run_frame(&input, chain, frame_index, track_id, store, StateMode::Strict);
        }

        // Drop any state built under different state-resetting params before
        // inspecting cursors.
        for inst in &sequential {
            let key = StateKey::new(track_id, &inst.id);
            store.sync_params(&key, inst.state_fingerprint);
        }

        let cursors: Vec<Option<u64>> = sequential
            .iter()
            .map(|i| {
                store
                    .get(&StateKey::new(track_id, &i.id))
                    .map(|e| e.cursor.0)
            })
            .collect();

        let aligned = cursors.iter().all(|c| *c == cursors[0]);
        let replay_from = match (aligned, cursors[0]) {
            // Every instance agrees on the last evaluated frame and the
            // request is ahead of it: continue from the checkpoint.
            (true, Some(c)) if c < frame_index.0 => c + 1,
            // Cold start evaluating forward from the beginning.
            (true, None) => 0,
            // Backward seek, repeat, or instances out of step with each
            // other: reset and rebuild the whole span.
            _ => {
                for inst in &sequential {
                    store.reset(&StateKey::new(track_id, &inst.id));
                }
                0
            }
        };

        if replay_from < frame_index.0 {
            debug!(
                from = replay_from,
                to = frame_index.0,
                "reconstructing sequential state by replay"
            );
        }

        let mut out = None;
        for f in replay_from..=frame_index.0 {
            let input = source.frame_at(FrameIndex(f))?;
            out = Some(self.run_frame(
                &input,
                chain,
                FrameIndex(f),
                track_id,
                store,
                StateMode::Replay,
            )?);
        }
        // The loop always runs at least once (replay_from <= frame_index).
        out.ok_or_else(|| MoshError::validation("replay produced no output frame"))
    }

    fn run_frame(
        &mut self,
        input: &Frame,
        chain: &CompiledChain,
        frame_index: FrameIndex,
        track_id: &str,
        store: &mut StateStore,
        mode: StateMode,
    ) -> MoshResult<Frame> {
        let started = Instant::now();
        let mut current = input.clone();

        for inst in chain.instances() {
            if started.elapsed() > self.limits.frame_budget {
                return Err(MoshError::RenderTimeout {
                    budget_ms: self.limits.frame_budget.as_millis() as u64,
                    instance: inst.id.clone(),
                });
            }
            // mix == 0 is exact passthrough and must not advance state:
            // an instance contributing nothing must not mutate history.
            if inst.bypass || inst.mix <= 0.0 {
                continue;
            }

            let effect = self.registry.require(&inst.effect)?;
            let key = StateKey::new(track_id, &inst.id);

            let state: Option<EffectState> = if inst.statefulness == Statefulness::SequentialOnly {
                store.sync_params(&key, inst.state_fingerprint);
                let cursor = store.get(&key).map(|e| e.cursor.0);
                let in_order = match cursor {
                    Some(c) => c + 1 == frame_index.0,
                    None => frame_index.0 == 0,
                };
                if !in_order {
                    match mode {
                        StateMode::Strict => {
                            return Err(MoshError::StateInconsistency {
                                instance: inst.id.clone(),
                                requested: frame_index.0,
                                cursor,
                            });
                        }
                        StateMode::Replay => {
                            // The replay driver feeds frames in order from a
                            // reset checkpoint; a mismatch here means the
                            // entry is stale from another run. Start fresh
                            // rather than consume it.
                            store.reset(&key);
                        }
                    }
                }
                store.get(&key).map(|e| e.state.clone())
            } else {
                None
            };

            let call = EffectCall {
                params: &inst.params,
                frame_index,
                seed: self.seed,
                state: state.as_ref(),
            };
            let output = effect.process(&current, call).map_err(|e| {
                MoshError::validation(format!(
                    "effect instance '{}' ('{}') failed at frame {}: {e}",
                    inst.id, inst.effect, frame_index.0
                ))
            })?;
            if !output.frame.same_dims(&current) {
                return Err(MoshError::validation(format!(
                    "effect instance '{}' ('{}') changed frame dimensions",
                    inst.id, inst.effect
                )));
            }

            let blended = self.blend_instance(&current, &output.frame, inst)?;

            if let Some(new_state) = output.state {
                store.put(
                    key,
                    StateEntry {
                        state: new_state,
                        cursor: frame_index,
                        params_fingerprint: inst.state_fingerprint,
                    },
                );
            }

            current = blended;
        }

        Ok(current)
    }

    /// Per-texel `lerp(input, effect_result, mix * mask)`.
    fn blend_instance(
        &mut self,
        input: &Frame,
        processed: &Frame,
        inst: &CompiledInstance,
    ) -> MoshResult<Frame> {
        if inst.region.is_none() && inst.mix >= 1.0 {
            return Ok(processed.clone());
        }

        let mask = match &inst.region {
            None => None,
            Some(region) => {
                let cache_key = (inst.mask_fingerprint, input.width(), input.height());
                if !self.mask_cache.contains_key(&cache_key) {
                    let resolved =
                        resolver::resolve(region, inst.feather_px, input.width(), input.height())?;
                    debug!(
                        instance = %inst.id,
                        note = %resolved.note,
                        "resolved region mask"
                    );
                    self.mask_cache.insert(cache_key, resolved.mask);
                }
                self.mask_cache.get(&cache_key)
            }
        };

        let mut data = Vec::with_capacity(input.data().len());
        let width = input.width() as usize;
        for (idx, (i_px, p_px)) in input
            .data()
            .chunks_exact(FRAME_CHANNELS)
            .zip(processed.data().chunks_exact(FRAME_CHANNELS))
            .enumerate()
        {
            let weight = match mask {
                None => inst.mix,
                Some(m) => {
                    let x = (idx % width) as u32;
                    let y = (idx / width) as u32;
                    inst.mix * m.weight_at(x, y)
                }
            };
            for c in 0..FRAME_CHANNELS {
                data.push(lerp_u8(i_px[c], p_px[c], weight));
            }
        }
        Frame::new(input.width(), input.height(), data)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/chain/executor.rs"]
mod tests;
