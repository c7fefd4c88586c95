//! Preview request supersession.
//!
//! Preview rendering is request/response with at most one in-flight render
//! per target; a new request for the same target supersedes any in-flight
//! one, whose result must then be discarded rather than displayed.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// What a preview render produces: one track's chain output, or the full
/// composite.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// A single track's processed frame.
    Track(String),
    /// The composited output frame.
    Composite,
}

/// Proof of a started preview render; stale once superseded.
#[derive(Clone, Debug)]
pub struct PreviewTicket {
    target: RenderTarget,
    generation: u64,
}

impl PreviewTicket {
    /// The target this ticket renders.
    pub fn target(&self) -> &RenderTarget {
        &self.target
    }
}

/// Per-target generation counter backing the supersession contract.
#[derive(Debug, Default)]
pub struct PreviewGate {
    generations: Mutex<HashMap<RenderTarget, u64>>,
}

impl PreviewGate {
    /// A gate with no outstanding renders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a render for `target`, superseding any in-flight render for the
    /// same target.
    pub fn begin(&self, target: RenderTarget) -> PreviewTicket {
        let mut generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let generation = generations
            .entry(target.clone())
            .and_modify(|g| *g += 1)
            .or_insert(1);
        PreviewTicket {
            target,
            generation: *generation,
        }
    }

    /// Whether a ticket still represents the newest request for its target.
    ///
    /// A renderer checks this before (and ideally during) delivery; a stale
    /// ticket's output is dropped silently.
    pub fn is_current(&self, ticket: &PreviewTicket) -> bool {
        let generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        generations.get(&ticket.target) == Some(&ticket.generation)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/preview.rs"]
mod tests;
