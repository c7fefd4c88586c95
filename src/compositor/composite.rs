//! Track compositor: blends per-track chain outputs into one frame.

use tracing::debug;

use crate::compositor::blend::blend_in_place;
use crate::foundation::core::Frame;
use crate::foundation::error::{MoshError, MoshResult};
use crate::track::Track;

/// One track's chain output, paired with the track it came from.
#[derive(Debug)]
pub struct TrackFrame<'a> {
    /// Source track (supplies blend mode, opacity, solo/mute).
    pub track: &'a Track,
    /// The track's processed frame for the current frame index.
    pub frame: Frame,
}

/// Blend track frames bottom-to-top into a single output frame.
///
/// Solo semantics are exclusion, not opacity: if any track is soloed, every
/// non-soloed track is dropped before blending, so the result is identical to
/// removing those tracks entirely. Muted tracks are always dropped. The
/// compositor only reads frames and track settings; it never touches effect
/// state, so reordering tracks is a pure view-order operation.
pub fn composite(layers: &[TrackFrame<'_>]) -> MoshResult<Frame> {
    let any_solo = layers.iter().any(|l| l.track.solo);
    let contributing: Vec<&TrackFrame<'_>> = layers
        .iter()
        .filter(|l| !l.track.muted && (!any_solo || l.track.solo))
        .collect();

    let Some(first) = contributing.first() else {
        return Err(MoshError::validation(
            "composite requires at least one contributing track",
        ));
    };

    for layer in &contributing {
        if !layer.frame.same_dims(&first.frame) {
            return Err(MoshError::validation(format!(
                "track '{}' frame is {}x{}, expected {}x{}",
                layer.track.id,
                layer.frame.width(),
                layer.frame.height(),
                first.frame.width(),
                first.frame.height()
            )));
        }
    }

    debug!(
        tracks = contributing.len(),
        solo = any_solo,
        "compositing track frames"
    );

    // Start from transparent black and blend bottom-to-top; every blend step
    // clamps, so overflow never crosses layer boundaries.
    let mut out = vec![0u8; first.frame.data().len()];
    for layer in &contributing {
        blend_in_place(
            layer.track.blend,
            &mut out,
            layer.frame.data(),
            layer.track.opacity,
        );
    }

    Frame::new(first.frame.width(), first.frame.height(), out)
}

#[cfg(test)]
#[path = "../../tests/unit/compositor/composite.rs"]
mod tests;
