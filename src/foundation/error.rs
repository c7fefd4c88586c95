/// Convenience result type used across Moshpit.
pub type MoshResult<T> = Result<T, MoshError>;

/// Top-level error taxonomy used by pipeline APIs.
#[derive(thiserror::Error, Debug)]
pub enum MoshError {
    /// Syntactically invalid region specification. Always carries the full
    /// preset table so a caller can present valid alternatives.
    #[error("region parse error: {message} (valid presets: {})", .valid_presets.join(", "))]
    RegionParse {
        /// What was wrong with the input.
        message: String,
        /// All accepted preset names.
        valid_presets: Vec<&'static str>,
        /// Nearest-match preset when the input resembled one.
        suggestion: Option<&'static str>,
    },

    /// A parameter value was rejected before any pixel was touched.
    #[error("param validation error for effect '{effect}': {message}")]
    ParamValidation {
        /// Effect key the parameters were validated against.
        effect: String,
        /// What was wrong with the value.
        message: String,
        /// Nearest-match candidates for unknown keys.
        suggestions: Vec<String>,
    },

    /// Chain length exceeded the configured maximum at build time.
    #[error("chain too deep: {len} instances exceeds maximum {max}")]
    ChainTooDeep {
        /// Declared chain length.
        len: usize,
        /// Configured maximum depth.
        max: usize,
    },

    /// A chain run overran its wall-clock budget; partial output is discarded.
    #[error("render timeout: chain exceeded {budget_ms} ms budget at instance '{instance}'")]
    RenderTimeout {
        /// Budget that was exceeded, in milliseconds.
        budget_ms: u64,
        /// Instance id at which the overrun was detected.
        instance: String,
    },

    /// A sequential-only stateful effect was asked to evaluate a frame its
    /// state cannot reach. Surfaced explicitly rather than silently returning
    /// an unchanged frame.
    #[error(
        "state inconsistency for instance '{instance}': requested frame {requested}, state cursor at {}",
        .cursor.map_or("none".to_string(), |c| c.to_string())
    )]
    StateInconsistency {
        /// Instance whose state could not be advanced.
        instance: String,
        /// Frame index that was requested.
        requested: u64,
        /// Last frame index the stored state was advanced to, if any.
        cursor: Option<u64>,
    },

    /// Invalid user-provided or model data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MoshError {
    /// Build a [`MoshError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MoshError::ParamValidation`] value with no suggestions.
    pub fn param(effect: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ParamValidation {
            effect: effect.into(),
            message: msg.into(),
            suggestions: Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
