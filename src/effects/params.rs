use std::collections::BTreeMap;

use crate::foundation::error::{MoshError, MoshResult};
use crate::foundation::fuzzy;
use crate::foundation::math::Fnv1a64;

/// A validated parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// Finite floating-point value.
    Float(f64),
    /// Integer value.
    Int(i64),
    /// Boolean flag.
    Bool(bool),
    /// One of a declared set of choices.
    Choice(String),
}

/// Declared type and range of a parameter.
#[derive(Clone, Debug)]
pub enum ParamKind {
    /// Floating-point value within `[min, max]`.
    Float {
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// Integer value within `[min, max]`.
    Int {
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
    },
    /// Boolean flag.
    Bool,
    /// Enumerated choice.
    Enum {
        /// Accepted values.
        choices: &'static [&'static str],
    },
}

/// What to do with a numeric value outside its declared range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutOfRange {
    /// Clamp into range silently.
    Clamp,
    /// Reject with a validation error.
    Reject,
}

/// Schema entry for one effect parameter.
#[derive(Clone, Debug)]
pub struct ParamDef {
    /// Parameter key.
    pub key: &'static str,
    /// Type and range.
    pub kind: ParamKind,
    /// Default used when the parameter is omitted.
    pub default: ParamValue,
    /// Per-parameter out-of-range policy. NaN/Infinity are always rejected
    /// regardless of this policy.
    pub out_of_range: OutOfRange,
    /// Essential (always shown) vs. advanced disclosure in a UI.
    pub essential: bool,
    /// Whether changing this parameter invalidates accumulated effect state.
    pub resets_state: bool,
}

/// Validated parameter set for one effect instance.
///
/// Built once at chain-build time; per-frame execution never re-validates.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ResolvedParams {
    values: BTreeMap<String, ParamValue>,
}

impl ResolvedParams {
    /// Float value for `key`. The key must exist in the schema the set was
    /// resolved against.
    pub fn f64(&self, key: &str) -> f64 {
        match self.values.get(key) {
            Some(ParamValue::Float(v)) => *v,
            Some(ParamValue::Int(v)) => *v as f64,
            _ => 0.0,
        }
    }

    /// Integer value for `key`.
    pub fn i64(&self, key: &str) -> i64 {
        match self.values.get(key) {
            Some(ParamValue::Int(v)) => *v,
            _ => 0,
        }
    }

    /// Boolean value for `key`.
    pub fn bool(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(ParamValue::Bool(true)))
    }

    /// Choice value for `key`, if present.
    pub fn choice(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(ParamValue::Choice(v)) => Some(v),
            _ => None,
        }
    }

    /// Stable fingerprint over a subset of parameters, keyed in sorted order.
    ///
    /// Passing only the `resets_state` keys yields the state-invalidation
    /// fingerprint: changes to other parameters leave it untouched.
    pub fn fingerprint_of(&self, keys: impl IntoIterator<Item = impl AsRef<str>>) -> u64 {
        let mut h = Fnv1a64::new_default();
        for key in keys {
            let key = key.as_ref();
            h.write_bytes(key.as_bytes());
            match self.values.get(key) {
                Some(ParamValue::Float(v)) => h.write_f64_bits(*v),
                Some(ParamValue::Int(v)) => h.write_u64(*v as u64),
                Some(ParamValue::Bool(v)) => h.write_u64(u64::from(*v)),
                Some(ParamValue::Choice(v)) => h.write_bytes(v.as_bytes()),
                None => h.write_u64(0),
            }
        }
        h.finish()
    }
}

/// Validate raw JSON parameters against a schema, producing a
/// [`ResolvedParams`] with defaults filled in.
///
/// Unknown keys are rejected with nearest-match suggestions; NaN/Infinity are
/// always rejected; out-of-range numeric values are clamped or rejected per
/// the parameter's declared policy.
pub fn resolve_params(
    effect_key: &str,
    defs: &[ParamDef],
    raw: &serde_json::Value,
) -> MoshResult<ResolvedParams> {
    let mut values = BTreeMap::new();

    let raw_obj = match raw {
        serde_json::Value::Null => None,
        serde_json::Value::Object(map) => Some(map),
        _ => {
            return Err(MoshError::param(
                effect_key,
                "params must be an object when set",
            ));
        }
    };

    if let Some(map) = raw_obj {
        for key in map.keys() {
            if !defs.iter().any(|d| d.key == key) {
                let suggestions = fuzzy::suggestions(key, defs.iter().map(|d| d.key), 3)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                return Err(MoshError::ParamValidation {
                    effect: effect_key.to_string(),
                    message: format!("unknown param '{key}'"),
                    suggestions,
                });
            }
        }
    }

    for def in defs {
        let supplied = raw_obj.and_then(|m| m.get(def.key));
        let value = match supplied {
            None => def.default.clone(),
            Some(v) => coerce(effect_key, def, v)?,
        };
        values.insert(def.key.to_string(), value);
    }

    Ok(ResolvedParams { values })
}

fn coerce(effect_key: &str, def: &ParamDef, raw: &serde_json::Value) -> MoshResult<ParamValue> {
    match &def.kind {
        ParamKind::Float { min, max } => {
            let v = raw.as_f64().ok_or_else(|| {
                MoshError::param(effect_key, format!("param '{}' must be a number", def.key))
            })?;
            if !v.is_finite() {
                return Err(MoshError::param(
                    effect_key,
                    format!("param '{}' must be finite", def.key),
                ));
            }
            if v < *min || v > *max {
                return match def.out_of_range {
                    OutOfRange::Clamp => Ok(ParamValue::Float(v.clamp(*min, *max))),
                    OutOfRange::Reject => Err(MoshError::param(
                        effect_key,
                        format!("param '{}' = {v} is outside [{min}, {max}]", def.key),
                    )),
                };
            }
            Ok(ParamValue::Float(v))
        }
        ParamKind::Int { min, max } => {
            let v = raw.as_i64().ok_or_else(|| {
                MoshError::param(effect_key, format!("param '{}' must be an integer", def.key))
            })?;
            if v < *min || v > *max {
                return match def.out_of_range {
                    OutOfRange::Clamp => Ok(ParamValue::Int(v.clamp(*min, *max))),
                    OutOfRange::Reject => Err(MoshError::param(
                        effect_key,
                        format!("param '{}' = {v} is outside [{min}, {max}]", def.key),
                    )),
                };
            }
            Ok(ParamValue::Int(v))
        }
        ParamKind::Bool => {
            let v = raw.as_bool().ok_or_else(|| {
                MoshError::param(effect_key, format!("param '{}' must be a bool", def.key))
            })?;
            Ok(ParamValue::Bool(v))
        }
        ParamKind::Enum { choices } => {
            let v = raw.as_str().ok_or_else(|| {
                MoshError::param(effect_key, format!("param '{}' must be a string", def.key))
            })?;
            if !choices.contains(&v) {
                let suggestions = fuzzy::suggestions(v, choices.iter().copied(), 3)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                return Err(MoshError::ParamValidation {
                    effect: effect_key.to_string(),
                    message: format!(
                        "param '{}' = '{v}' is not one of [{}]",
                        def.key,
                        choices.join(", ")
                    ),
                    suggestions,
                });
            }
            Ok(ParamValue::Choice(v.to_string()))
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/params.rs"]
mod tests;
