use super::*;

use crate::effects::params::ParamDef;
use crate::effects::registry::EffectRegistry;
use crate::effects::traits::{EffectCategory, EffectOutput};
use crate::region::resolver::parse_region;
use crate::state::store::StateKey;
use crate::track::EffectInstance;

fn gray(v: u8) -> Frame {
    Frame::filled(8, 8, [v, v, v, 255]).unwrap()
}

fn compile(registry: &EffectRegistry, instances: &[EffectInstance]) -> CompiledChain {
    compile_chain(registry, instances, &ChainLimits::default()).unwrap()
}

fn executor(registry: &EffectRegistry) -> ChainExecutor<'_> {
    ChainExecutor::new(registry, ChainLimits::default(), 7)
}

/// Source whose frame value encodes its index, so replayed outputs are
/// distinguishable per frame.
struct RampSource;

impl FrameSource for RampSource {
    fn frame_at(&self, frame: FrameIndex) -> MoshResult<Frame> {
        Ok(gray((frame.0 * 7 % 251) as u8))
    }
}

struct FailingEffect;

impl Effect for FailingEffect {
    fn key(&self) -> &'static str {
        "always_fails"
    }

    fn display_name(&self) -> &'static str {
        "Always Fails"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::Stylize
    }

    fn param_defs(&self) -> &[ParamDef] {
        &[]
    }

    fn process(&self, _input: &Frame, _call: EffectCall<'_>) -> MoshResult<EffectOutput> {
        Err(MoshError::validation("kernel exploded"))
    }
}

#[test]
fn mix_zero_is_exact_passthrough_and_does_not_advance_state() {
    let registry = EffectRegistry::with_builtins();
    let mut inst = EffectInstance::new("fb", "feedback");
    inst.mix = 0.0;
    let chain = compile(&registry, &[inst]);

    let mut store = StateStore::new();
    let mut exec = executor(&registry);
    let input = gray(90);
    let out = exec
        .apply_chain(&input, &chain, FrameIndex(0), "t", &mut store)
        .unwrap();

    assert_eq!(out, input);
    assert!(store.is_empty(), "mix 0 must not mutate state history");
}

#[test]
fn bypass_skips_instance_entirely() {
    let registry = EffectRegistry::with_builtins();
    let mut inst = EffectInstance::new("inv", "invert");
    inst.bypass = true;
    let chain = compile(&registry, &[inst]);

    let mut store = StateStore::new();
    let mut exec = executor(&registry);
    let input = gray(90);
    let out = exec
        .apply_chain(&input, &chain, FrameIndex(0), "t", &mut store)
        .unwrap();
    assert_eq!(out, input);
}

#[test]
fn chain_depth_over_maximum_is_rejected_at_build_time() {
    let registry = EffectRegistry::with_builtins();
    let instances: Vec<EffectInstance> = (0..11)
        .map(|i| EffectInstance::new(format!("inv-{i}"), "invert"))
        .collect();

    let err = compile_chain(&registry, &instances, &ChainLimits::default()).unwrap_err();
    assert!(matches!(err, MoshError::ChainTooDeep { len: 11, max: 10 }));

    // Exactly at the limit is fine.
    assert!(compile_chain(&registry, &instances[..10], &ChainLimits::default()).is_ok());
}

#[test]
fn duplicate_instance_ids_rejected_at_build_time() {
    let registry = EffectRegistry::with_builtins();
    let instances = vec![
        EffectInstance::new("same", "invert"),
        EffectInstance::new("same", "brightness"),
    ];
    assert!(compile_chain(&registry, &instances, &ChainLimits::default()).is_err());
}

#[test]
fn unknown_effect_key_rejected_with_suggestion_at_build_time() {
    let registry = EffectRegistry::with_builtins();
    let instances = vec![EffectInstance::new("x", "datamsh")];
    let err = compile_chain(&registry, &instances, &ChainLimits::default()).unwrap_err();
    match err {
        MoshError::ParamValidation { suggestions, .. } => {
            assert_eq!(suggestions.first().map(String::as_str), Some("datamosh"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn repeated_apply_of_pure_chain_is_byte_identical() {
    let registry = EffectRegistry::with_builtins();
    let mut grain = EffectInstance::new("g", "grain");
    grain.params = serde_json::json!({ "amount": 0.8 });
    let chain = compile(
        &registry,
        &[EffectInstance::new("b", "brightness"), grain],
    );

    let input = gray(100);
    let mut store = StateStore::new();
    let mut exec = executor(&registry);

    let a = exec
        .apply_chain(&input, &chain, FrameIndex(3), "t", &mut store)
        .unwrap();
    let b = exec
        .apply_chain(&input, &chain, FrameIndex(3), "t", &mut store)
        .unwrap();
    assert_eq!(a.data(), b.data());
}

#[test]
fn pure_chain_frame_50_direct_equals_sequential_render() {
    let registry = EffectRegistry::with_builtins();
    let chain = compile(&registry, &[EffectInstance::new("g", "grain")]);
    let source = RampSource;

    let mut store = StateStore::new();
    let mut exec = executor(&registry);

    // Render 0..=50 in order, keeping frame 50.
    let mut sequential = None;
    for f in 0..=50u64 {
        let input = source.frame_at(FrameIndex(f)).unwrap();
        sequential = Some(
            exec.apply_chain(&input, &chain, FrameIndex(f), "t", &mut store)
                .unwrap(),
        );
    }

    // Render frame 50 directly with a fresh executor and store.
    let mut fresh_store = StateStore::new();
    let mut fresh_exec = executor(&registry);
    let direct = fresh_exec
        .apply_chain(
            &source.frame_at(FrameIndex(50)).unwrap(),
            &chain,
            FrameIndex(50),
            "t",
            &mut fresh_store,
        )
        .unwrap();

    assert_eq!(sequential.unwrap().data(), direct.data());
}

#[test]
fn strict_sequential_cold_start_past_zero_errors() {
    let registry = EffectRegistry::with_builtins();
    let chain = compile(&registry, &[EffectInstance::new("fb", "feedback")]);

    let mut store = StateStore::new();
    let mut exec = executor(&registry);
    let err = exec
        .apply_chain(&gray(10), &chain, FrameIndex(50), "t", &mut store)
        .unwrap_err();
    match err {
        MoshError::StateInconsistency {
            instance,
            requested,
            cursor,
        } => {
            assert_eq!(instance, "fb");
            assert_eq!(requested, 50);
            assert_eq!(cursor, None);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn strict_sequential_gap_errors_with_cursor() {
    let registry = EffectRegistry::with_builtins();
    let chain = compile(&registry, &[EffectInstance::new("fb", "feedback")]);

    let mut store = StateStore::new();
    let mut exec = executor(&registry);
    exec.apply_chain(&gray(10), &chain, FrameIndex(0), "t", &mut store)
        .unwrap();
    exec.apply_chain(&gray(20), &chain, FrameIndex(1), "t", &mut store)
        .unwrap();
    assert_eq!(
        store.get(&StateKey::new("t", "fb")).unwrap().cursor,
        FrameIndex(1)
    );

    let err = exec
        .apply_chain(&gray(30), &chain, FrameIndex(3), "t", &mut store)
        .unwrap_err();
    match err {
        MoshError::StateInconsistency { cursor, .. } => assert_eq!(cursor, Some(1)),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn replaying_seek_matches_in_order_playback() {
    let registry = EffectRegistry::with_builtins();
    let chain = compile(&registry, &[EffectInstance::new("fb", "feedback")]);
    let source = RampSource;

    // Ground truth: strict in-order playback to frame 10.
    let mut ordered_store = StateStore::new();
    let mut ordered_exec = executor(&registry);
    let mut expected = None;
    for f in 0..=10u64 {
        let input = source.frame_at(FrameIndex(f)).unwrap();
        expected = Some(
            ordered_exec
                .apply_chain(&input, &chain, FrameIndex(f), "t", &mut ordered_store)
                .unwrap(),
        );
    }

    // Cold request for frame 10 reconstructs invisibly.
    let mut store = StateStore::new();
    let mut exec = executor(&registry);
    let replayed = exec
        .apply_chain_replaying(&source, &chain, FrameIndex(10), "t", &mut store)
        .unwrap();

    assert_eq!(expected.unwrap().data(), replayed.data());
    assert_eq!(
        store.get(&StateKey::new("t", "fb")).unwrap().cursor,
        FrameIndex(10)
    );
}

#[test]
fn replaying_backward_seek_resets_and_matches() {
    let registry = EffectRegistry::with_builtins();
    let chain = compile(&registry, &[EffectInstance::new("fb", "feedback")]);
    let source = RampSource;

    let mut store = StateStore::new();
    let mut exec = executor(&registry);
    exec.apply_chain_replaying(&source, &chain, FrameIndex(10), "t", &mut store)
        .unwrap();

    // Backward seek: state is rebuilt from frame 0, not reused stale.
    let back = exec
        .apply_chain_replaying(&source, &chain, FrameIndex(4), "t", &mut store)
        .unwrap();

    let mut fresh_store = StateStore::new();
    let mut fresh_exec = executor(&registry);
    let mut expected = None;
    for f in 0..=4u64 {
        let input = source.frame_at(FrameIndex(f)).unwrap();
        expected = Some(
            fresh_exec
                .apply_chain(&input, &chain, FrameIndex(f), "t", &mut fresh_store)
                .unwrap(),
        );
    }
    assert_eq!(expected.unwrap().data(), back.data());
}

#[test]
fn replaying_continues_from_checkpoint_without_full_replay() {
    let registry = EffectRegistry::with_builtins();
    let chain = compile(&registry, &[EffectInstance::new("fb", "feedback")]);
    let source = RampSource;

    let mut store = StateStore::new();
    let mut exec = executor(&registry);
    exec.apply_chain_replaying(&source, &chain, FrameIndex(5), "t", &mut store)
        .unwrap();

    // Continuing forward advances from the stored cursor.
    exec.apply_chain_replaying(&source, &chain, FrameIndex(9), "t", &mut store)
        .unwrap();
    assert_eq!(
        store.get(&StateKey::new("t", "fb")).unwrap().cursor,
        FrameIndex(9)
    );
}

#[test]
fn state_resetting_param_change_invalidates_between_calls() {
    let registry = EffectRegistry::with_builtins();
    let source = RampSource;

    let mut inst = EffectInstance::new("dm", "datamosh");
    inst.params = serde_json::json!({ "history": 4 });
    let chain_a = compile(&registry, &[inst.clone()]);

    let mut store = StateStore::new();
    let mut exec = executor(&registry);
    exec.apply_chain_replaying(&source, &chain_a, FrameIndex(3), "t", &mut store)
        .unwrap();
    assert_eq!(
        store.get(&StateKey::new("t", "dm")).unwrap().cursor,
        FrameIndex(3)
    );

    // Changing the ring buffer size rebuilds state from scratch; a strict
    // request now fails mid-timeline because the old state is gone.
    inst.params = serde_json::json!({ "history": 9 });
    let chain_b = compile(&registry, &[inst]);
    let err = exec
        .apply_chain(
            &source.frame_at(FrameIndex(4)).unwrap(),
            &chain_b,
            FrameIndex(4),
            "t",
            &mut store,
        )
        .unwrap_err();
    assert!(matches!(err, MoshError::StateInconsistency { .. }));

    // The replaying path absorbs the same change invisibly.
    exec.apply_chain_replaying(&source, &chain_b, FrameIndex(4), "t", &mut store)
        .unwrap();
    assert_eq!(
        store.get(&StateKey::new("t", "dm")).unwrap().cursor,
        FrameIndex(4)
    );
}

#[test]
fn mid_chain_failure_names_the_instance() {
    let mut registry = EffectRegistry::with_builtins();
    registry.register(Box::new(FailingEffect));

    let chain = compile(
        &registry,
        &[
            EffectInstance::new("ok", "invert"),
            EffectInstance::new("broken", "always_fails"),
        ],
    );

    let mut store = StateStore::new();
    let mut exec = ChainExecutor::new(&registry, ChainLimits::default(), 7);
    let err = exec
        .apply_chain(&gray(10), &chain, FrameIndex(0), "t", &mut store)
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("broken"));
    assert!(text.contains("always_fails"));
}

#[test]
fn zero_budget_times_out_and_discards_partial_output() {
    let registry = EffectRegistry::with_builtins();
    let limits = ChainLimits {
        max_depth: 10,
        frame_budget: std::time::Duration::ZERO,
    };
    let chain = compile_chain(&registry, &[EffectInstance::new("inv", "invert")], &limits).unwrap();

    let mut store = StateStore::new();
    let mut exec = ChainExecutor::new(&registry, limits, 7);
    let err = exec
        .apply_chain(&gray(10), &chain, FrameIndex(0), "t", &mut store)
        .unwrap_err();
    assert!(matches!(err, MoshError::RenderTimeout { .. }));
}

#[test]
fn region_restricts_effect_to_masked_texels() {
    let registry = EffectRegistry::with_builtins();
    let mut inst = EffectInstance::new("inv", "invert");
    inst.region = Some(parse_region("px:0,0,4,8").unwrap());
    let chain = compile(&registry, &[inst]);

    let mut store = StateStore::new();
    let mut exec = executor(&registry);
    let out = exec
        .apply_chain(&gray(100), &chain, FrameIndex(0), "t", &mut store)
        .unwrap();

    // Left half inverted, right half untouched.
    assert_eq!(out.pixel(0, 0), [155, 155, 155, 255]);
    assert_eq!(out.pixel(7, 0), [100, 100, 100, 255]);
}

#[test]
fn half_mix_blends_dry_and_wet() {
    let registry = EffectRegistry::with_builtins();
    let mut inst = EffectInstance::new("inv", "invert");
    inst.mix = 0.5;
    let chain = compile(&registry, &[inst]);

    let mut store = StateStore::new();
    let mut exec = executor(&registry);
    let out = exec
        .apply_chain(&gray(100), &chain, FrameIndex(0), "t", &mut store)
        .unwrap();
    // Halfway between 100 and 155.
    assert_eq!(out.pixel(3, 3), [128, 128, 128, 255]);
}

#[test]
fn seek_safety_classification() {
    let registry = EffectRegistry::with_builtins();

    let pure = compile(&registry, &[EffectInstance::new("g", "grain")]);
    assert!(pure.is_seek_safe());

    let seq = compile(&registry, &[EffectInstance::new("fb", "feedback")]);
    assert!(!seq.is_seek_safe());

    let mut bypassed = EffectInstance::new("fb", "feedback");
    bypassed.bypass = true;
    let chain = compile(&registry, &[bypassed]);
    assert!(chain.is_seek_safe());
}
