use super::*;

fn defs() -> Vec<ParamDef> {
    vec![
        ParamDef {
            key: "gain",
            kind: ParamKind::Float { min: 0.0, max: 4.0 },
            default: ParamValue::Float(1.0),
            out_of_range: OutOfRange::Clamp,
            essential: true,
            resets_state: false,
        },
        ParamDef {
            key: "levels",
            kind: ParamKind::Int { min: 2, max: 64 },
            default: ParamValue::Int(4),
            out_of_range: OutOfRange::Reject,
            essential: true,
            resets_state: true,
        },
        ParamDef {
            key: "wrap",
            kind: ParamKind::Bool,
            default: ParamValue::Bool(false),
            out_of_range: OutOfRange::Reject,
            essential: false,
            resets_state: false,
        },
        ParamDef {
            key: "edge",
            kind: ParamKind::Enum {
                choices: &["hard", "soft"],
            },
            default: ParamValue::Choice(String::new()),
            out_of_range: OutOfRange::Reject,
            essential: false,
            resets_state: false,
        },
    ]
}

#[test]
fn defaults_fill_missing_params() {
    let p = resolve_params("fx", &defs(), &serde_json::Value::Null).unwrap();
    assert_eq!(p.f64("gain"), 1.0);
    assert_eq!(p.i64("levels"), 4);
    assert!(!p.bool("wrap"));
}

#[test]
fn nan_and_infinity_always_rejected() {
    // serde_json maps non-finite floats to null, which fails the number
    // check; either way the value never reaches a kernel.
    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let raw = serde_json::json!({ "gain": bad });
        assert!(resolve_params("fx", &defs(), &raw).is_err());
    }
}

#[test]
fn clamp_policy_clamps_reject_policy_rejects() {
    let p = resolve_params("fx", &defs(), &serde_json::json!({ "gain": 9.5 })).unwrap();
    assert_eq!(p.f64("gain"), 4.0);

    let err = resolve_params("fx", &defs(), &serde_json::json!({ "levels": 100 })).unwrap_err();
    assert!(err.to_string().contains("outside"));
}

#[test]
fn unknown_param_key_suggests_known_keys() {
    let err = resolve_params("fx", &defs(), &serde_json::json!({ "gian": 2.0 })).unwrap_err();
    match err {
        MoshError::ParamValidation { suggestions, .. } => {
            assert_eq!(suggestions, vec!["gain".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn enum_values_validated_with_suggestions() {
    let p = resolve_params("fx", &defs(), &serde_json::json!({ "edge": "soft" })).unwrap();
    assert_eq!(p.choice("edge"), Some("soft"));

    let err = resolve_params("fx", &defs(), &serde_json::json!({ "edge": "sofft" })).unwrap_err();
    match err {
        MoshError::ParamValidation { suggestions, .. } => {
            assert!(suggestions.contains(&"soft".to_string()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn params_must_be_an_object() {
    let err = resolve_params("fx", &defs(), &serde_json::json!([1, 2])).unwrap_err();
    assert!(err.to_string().contains("must be an object"));
}

#[test]
fn fingerprint_tracks_only_requested_keys() {
    let a = resolve_params("fx", &defs(), &serde_json::json!({ "levels": 8, "gain": 1.0 })).unwrap();
    let b = resolve_params("fx", &defs(), &serde_json::json!({ "levels": 8, "gain": 3.0 })).unwrap();
    let c = resolve_params("fx", &defs(), &serde_json::json!({ "levels": 16 })).unwrap();

    // Fingerprinting only the state-resetting key ignores the gain change.
    assert_eq!(a.fingerprint_of(["levels"]), b.fingerprint_of(["levels"]));
    assert_ne!(a.fingerprint_of(["levels"]), c.fingerprint_of(["levels"]));
    // Fingerprinting everything sees the gain change.
    assert_ne!(
        a.fingerprint_of(["levels", "gain"]),
        b.fingerprint_of(["levels", "gain"])
    );
}

#[test]
fn float_accepts_integer_json_numbers() {
    let p = resolve_params("fx", &defs(), &serde_json::json!({ "gain": 2 })).unwrap();
    assert_eq!(p.f64("gain"), 2.0);
}
