use crate::compositor::blend::BlendMode;
use crate::foundation::error::{MoshError, MoshResult};
use crate::region::resolver::RegionSpec;

/// One placement of an effect in a chain.
///
/// Parameters stay raw JSON here; they are validated against the registry
/// schema when the chain is compiled, before the instance enters any chain.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EffectInstance {
    /// Stable instance id, unique within its track.
    pub id: String,
    /// Effect key into the registry.
    pub effect: String,
    /// Raw effect parameter object.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
    /// Optional spatial region restricting the effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<RegionSpec>,
    /// Feather radius in pixels applied to the region mask edge.
    #[serde(default)]
    pub feather_px: f32,
    /// Dry/wet mix in `[0, 1]`; 0 is exact passthrough.
    #[serde(default = "default_mix")]
    pub mix: f32,
    /// Skip this instance entirely when `true`.
    #[serde(default)]
    pub bypass: bool,
}

fn default_mix() -> f32 {
    1.0
}

impl EffectInstance {
    /// A full-frame instance of `effect` with default parameters.
    pub fn new(id: impl Into<String>, effect: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            effect: effect.into(),
            params: serde_json::Value::Null,
            region: None,
            feather_px: 0.0,
            mix: 1.0,
            bypass: false,
        }
    }

    /// Validate instance-level invariants (not the effect schema).
    pub fn validate(&self) -> MoshResult<()> {
        if self.id.trim().is_empty() {
            return Err(MoshError::validation("effect instance id must be non-empty"));
        }
        if !self.mix.is_finite() || !(0.0..=1.0).contains(&self.mix) {
            return Err(MoshError::validation(format!(
                "instance '{}' mix must be finite and within [0, 1]",
                self.id
            )));
        }
        if !self.feather_px.is_finite() || self.feather_px < 0.0 {
            return Err(MoshError::validation(format!(
                "instance '{}' feather_px must be finite and >= 0",
                self.id
            )));
        }
        Ok(())
    }
}

/// One track: an ordered effect chain plus compositing controls.
///
/// A track owns its namespace in the state store (keyed by its id). While the
/// track is frozen its chain is read-only; edits are rejected until unfreeze.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Track {
    /// Stable track id.
    pub id: String,
    /// Track name for authoring/debugging.
    pub name: String,
    /// Ordered effect chain.
    chain: Vec<EffectInstance>,
    /// Compositing opacity in `[0, 1]`.
    pub opacity: f32,
    /// Blend mode against the stack below.
    pub blend: BlendMode,
    /// When any track is soloed, only soloed tracks contribute.
    pub solo: bool,
    /// Muted tracks never contribute.
    pub muted: bool,
    /// Display color for UI (RGBA8).
    pub color_rgba8: [u8; 4],
    /// Set while a freeze cache substitutes for live chain evaluation.
    #[serde(default)]
    frozen: bool,
}

impl Track {
    /// A new unmuted, unfrozen track with an empty chain.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            chain: Vec::new(),
            opacity: 1.0,
            blend: BlendMode::Normal,
            solo: false,
            muted: false,
            color_rgba8: [128, 128, 128, 255],
            frozen: false,
        }
    }

    /// The ordered effect chain.
    pub fn chain(&self) -> &[EffectInstance] {
        &self.chain
    }

    /// Whether the track is currently frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub(crate) fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    pub(crate) fn clear_chain(&mut self) {
        self.chain.clear();
    }

    /// Append an instance to the chain. Rejected while frozen.
    pub fn push_instance(&mut self, instance: EffectInstance) -> MoshResult<()> {
        self.reject_if_frozen("add an effect")?;
        instance.validate()?;
        if self.chain.iter().any(|i| i.id == instance.id) {
            return Err(MoshError::validation(format!(
                "track '{}' already has an instance '{}'",
                self.id, instance.id
            )));
        }
        self.chain.push(instance);
        Ok(())
    }

    /// Remove an instance by id. Rejected while frozen.
    ///
    /// The caller is responsible for destroying the instance's state store
    /// entry ([`crate::StateStore::remove_instance`]).
    pub fn remove_instance(&mut self, instance_id: &str) -> MoshResult<EffectInstance> {
        self.reject_if_frozen("remove an effect")?;
        let idx = self
            .chain
            .iter()
            .position(|i| i.id == instance_id)
            .ok_or_else(|| {
                MoshError::validation(format!(
                    "track '{}' has no instance '{instance_id}'",
                    self.id
                ))
            })?;
        Ok(self.chain.remove(idx))
    }

    /// Replace the raw params of an instance. Rejected while frozen.
    pub fn set_instance_params(
        &mut self,
        instance_id: &str,
        params: serde_json::Value,
    ) -> MoshResult<()> {
        self.reject_if_frozen("edit effect parameters")?;
        let inst = self
            .chain
            .iter_mut()
            .find(|i| i.id == instance_id)
            .ok_or_else(|| {
                MoshError::validation(format!(
                    "track '{}' has no instance '{instance_id}'",
                    self.id
                ))
            })?;
        inst.params = params;
        Ok(())
    }

    fn reject_if_frozen(&self, what: &str) -> MoshResult<()> {
        if self.frozen {
            return Err(MoshError::validation(format!(
                "track '{}' is frozen; unfreeze before trying to {what}",
                self.id
            )));
        }
        Ok(())
    }

    /// Validate track-level invariants.
    pub fn validate(&self) -> MoshResult<()> {
        if self.id.trim().is_empty() {
            return Err(MoshError::validation("track id must be non-empty"));
        }
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(MoshError::validation(format!(
                "track '{}' opacity must be finite and within [0, 1]",
                self.id
            )));
        }
        for inst in &self.chain {
            inst.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/track.rs"]
mod tests;
