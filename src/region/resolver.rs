use crate::foundation::core::Rect;
use crate::foundation::error::{MoshError, MoshResult};
use crate::foundation::fuzzy;

/// All accepted region preset names.
///
/// Presets are resolved against the frame size at evaluation time, so the
/// same spec is valid at any resolution.
pub const REGION_PRESETS: &[&str] = &[
    "full",
    "center",
    "left_half",
    "right_half",
    "top_half",
    "bottom_half",
    "top_left",
    "top_right",
    "bottom_left",
    "bottom_right",
    "left_third",
    "center_third",
    "right_third",
];

/// How the four rectangle values are interpreted.
///
/// A bare tuple is ambiguous between "percent" and "pixel at the origin", so
/// the mode is always an explicit tag and never guessed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RegionMode {
    /// Values are absolute pixel coordinates.
    Px,
    /// Values are fractions of the frame size in `[0, 1]`.
    Percent,
}

/// A spatial region specification, resolved per frame resolution.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum RegionSpec {
    /// A named preset from [`REGION_PRESETS`].
    Preset(String),
    /// An explicit rectangle with a declared interpretation mode.
    Rect {
        /// Interpretation of the four values.
        mode: RegionMode,
        /// Left edge.
        x: f64,
        /// Top edge.
        y: f64,
        /// Width.
        w: f64,
        /// Height.
        h: f64,
    },
}

/// Integer pixel rectangle, clamped to frame bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels (may be 0 for a degenerate region).
    pub w: u32,
    /// Height in pixels (may be 0 for a degenerate region).
    pub h: u32,
}

/// Per-pixel spatial weight grid with all values in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    weights: Vec<f32>,
}

impl Mask {
    /// Mask width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Weight at `(x, y)`. Coordinates must be in bounds.
    pub fn weight_at(&self, x: u32, y: u32) -> f32 {
        self.weights[y as usize * self.width as usize + x as usize]
    }

    /// All weights in row-major order.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }
}

/// Which interpretation the resolver actually applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegionInterpretation {
    /// A named preset was expanded.
    Preset(String),
    /// The rectangle was read as pixel coordinates.
    Pixels,
    /// The rectangle was read as fractions of the frame size.
    Percent,
}

/// Report of how a region spec was resolved, for caller-side verification.
#[derive(Clone, Debug, PartialEq)]
pub struct InterpretationNote {
    /// Interpretation that was applied.
    pub interpretation: RegionInterpretation,
    /// Whether the requested rectangle was clamped to frame bounds.
    pub clamped: bool,
    /// Whether the region is empty after clamping (all-zero mask).
    pub empty: bool,
    /// Effective feather radius after clamping to half the shorter rect side.
    pub feather_px: f32,
}

impl std::fmt::Display for InterpretationNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.interpretation {
            RegionInterpretation::Preset(name) => format!("preset '{name}'"),
            RegionInterpretation::Pixels => "pixel rect".to_string(),
            RegionInterpretation::Percent => "percent rect".to_string(),
        };
        write!(f, "{mode}, feather {:.1}px", self.feather_px)?;
        if self.clamped {
            write!(f, ", clamped to frame bounds")?;
        }
        if self.empty {
            write!(f, ", empty after clamping")?;
        }
        Ok(())
    }
}

/// A fully resolved region: clamped pixel rect, weight mask, and the
/// interpretation that produced them.
#[derive(Clone, Debug)]
pub struct ResolvedRegion {
    /// Rectangle in pixels, guaranteed within frame bounds.
    pub rect: PixelRect,
    /// Spatial weight mask covering the whole frame.
    pub mask: Mask,
    /// What the resolver actually did.
    pub note: InterpretationNote,
}

/// Parse the textual region grammar: a preset name, `px:x,y,w,h`, or
/// `pct:x,y,w,h`.
///
/// Fails with [`MoshError::RegionParse`] on anything else; the error payload
/// enumerates every valid preset name.
pub fn parse_region(input: &str) -> MoshResult<RegionSpec> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(region_err("region spec must be non-empty", None));
    }

    if let Some(rest) = strip_tag(trimmed, "px:") {
        let [x, y, w, h] = parse_rect_values(rest)?;
        return Ok(RegionSpec::Rect {
            mode: RegionMode::Px,
            x,
            y,
            w,
            h,
        });
    }
    if let Some(rest) = strip_tag(trimmed, "pct:") {
        let [x, y, w, h] = parse_rect_values(rest)?;
        return Ok(RegionSpec::Rect {
            mode: RegionMode::Percent,
            x,
            y,
            w,
            h,
        });
    }

    let name = trimmed.to_ascii_lowercase();
    if REGION_PRESETS.contains(&name.as_str()) {
        return Ok(RegionSpec::Preset(name));
    }

    // A bare tuple is deliberately not accepted: `0,0,1,1` cannot be
    // distinguished from a 1x1-pixel request without a mode tag.
    if name.contains(',') {
        return Err(region_err(
            format!("rect '{trimmed}' is missing its mode tag; use 'px:{name}' or 'pct:{name}'"),
            None,
        ));
    }

    let suggestion = fuzzy::closest(&name, REGION_PRESETS.iter().copied());
    Err(region_err(
        format!("unknown region preset '{trimmed}'"),
        suggestion,
    ))
}

/// Validate a region spec without resolving it: preset names must be known
/// and rect values finite. Used at chain-build time so per-frame resolution
/// can assume a well-formed spec.
pub fn validate_spec(spec: &RegionSpec) -> MoshResult<()> {
    match spec {
        RegionSpec::Preset(name) => {
            if preset_fractions(name).is_none() {
                let suggestion = fuzzy::closest(name, REGION_PRESETS.iter().copied());
                return Err(region_err(format!("unknown region preset '{name}'"), suggestion));
            }
            Ok(())
        }
        RegionSpec::Rect { x, y, w, h, .. } => {
            for v in [x, y, w, h] {
                if !v.is_finite() {
                    return Err(region_err("rect values must be finite", None));
                }
            }
            Ok(())
        }
    }
}

/// Resolve a region spec against a frame resolution.
///
/// Out-of-bounds rectangles are clamped, never rejected; the feather radius
/// is clamped to half the rectangle's shorter dimension so a feathered mask
/// can never degenerate to all-zero on a non-empty rect.
pub fn resolve(
    spec: &RegionSpec,
    feather_px: f32,
    frame_width: u32,
    frame_height: u32,
) -> MoshResult<ResolvedRegion> {
    if frame_width == 0 || frame_height == 0 {
        return Err(MoshError::validation(
            "region resolution requires non-zero frame dimensions",
        ));
    }
    if !feather_px.is_finite() || feather_px < 0.0 {
        return Err(MoshError::validation(
            "feather_px must be finite and >= 0",
        ));
    }

    let fw = f64::from(frame_width);
    let fh = f64::from(frame_height);

    let (requested, interpretation) = match spec {
        RegionSpec::Preset(name) => {
            let Some(frac) = preset_fractions(name) else {
                let suggestion = fuzzy::closest(name, REGION_PRESETS.iter().copied());
                return Err(region_err(format!("unknown region preset '{name}'"), suggestion));
            };
            (
                Rect::new(frac[0] * fw, frac[1] * fh, (frac[0] + frac[2]) * fw, (frac[1] + frac[3]) * fh),
                RegionInterpretation::Preset(name.clone()),
            )
        }
        RegionSpec::Rect { mode, x, y, w, h } => {
            for v in [x, y, w, h] {
                if !v.is_finite() {
                    return Err(region_err("rect values must be finite", None));
                }
            }
            match mode {
                RegionMode::Px => (
                    Rect::new(*x, *y, x + w.max(0.0), y + h.max(0.0)),
                    RegionInterpretation::Pixels,
                ),
                RegionMode::Percent => (
                    Rect::new(x * fw, y * fh, (x + w.max(0.0)) * fw, (y + h.max(0.0)) * fh),
                    RegionInterpretation::Percent,
                ),
            }
        }
    };

    let frame_rect = Rect::new(0.0, 0.0, fw, fh);
    let clipped = requested.intersect(frame_rect);
    let clamped = (clipped.area() - requested.area()).abs() > f64::EPSILON;

    let rect = PixelRect {
        x: clipped.x0.round().clamp(0.0, fw) as u32,
        y: clipped.y0.round().clamp(0.0, fh) as u32,
        w: (clipped.x1.round() - clipped.x0.round()).max(0.0) as u32,
        h: (clipped.y1.round() - clipped.y0.round()).max(0.0) as u32,
    };
    let empty = rect.w == 0 || rect.h == 0;

    let max_feather = (rect.w.min(rect.h) as f32) / 2.0;
    let feather = if empty { 0.0 } else { feather_px.min(max_feather) };

    let mask = build_mask(rect, feather, frame_width, frame_height);
    Ok(ResolvedRegion {
        rect,
        mask,
        note: InterpretationNote {
            interpretation,
            clamped,
            empty,
            feather_px: feather,
        },
    })
}

fn build_mask(rect: PixelRect, feather: f32, frame_width: u32, frame_height: u32) -> Mask {
    let mut weights = vec![0.0f32; frame_width as usize * frame_height as usize];
    if rect.w == 0 || rect.h == 0 {
        return Mask {
            width: frame_width,
            height: frame_height,
            weights,
        };
    }

    let x0 = rect.x as f32;
    let y0 = rect.y as f32;
    let x1 = (rect.x + rect.w) as f32;
    let y1 = (rect.y + rect.h) as f32;

    for py in 0..frame_height {
        let cy = py as f32 + 0.5;
        let dy = (y0 - cy).max(cy - y1).max(0.0);
        for px in 0..frame_width {
            let cx = px as f32 + 0.5;
            let dx = (x0 - cx).max(cx - x1).max(0.0);
            let w = if dx == 0.0 && dy == 0.0 {
                1.0
            } else if feather > 0.0 {
                let dist = (dx * dx + dy * dy).sqrt();
                (1.0 - dist / feather).clamp(0.0, 1.0)
            } else {
                0.0
            };
            weights[py as usize * frame_width as usize + px as usize] = w;
        }
    }

    Mask {
        width: frame_width,
        height: frame_height,
        weights,
    }
}

fn preset_fractions(name: &str) -> Option<[f64; 4]> {
    let third = 1.0 / 3.0;
    Some(match name {
        "full" => [0.0, 0.0, 1.0, 1.0],
        "center" => [0.25, 0.25, 0.5, 0.5],
        "left_half" => [0.0, 0.0, 0.5, 1.0],
        "right_half" => [0.5, 0.0, 0.5, 1.0],
        "top_half" => [0.0, 0.0, 1.0, 0.5],
        "bottom_half" => [0.0, 0.5, 1.0, 0.5],
        "top_left" => [0.0, 0.0, 0.5, 0.5],
        "top_right" => [0.5, 0.0, 0.5, 0.5],
        "bottom_left" => [0.0, 0.5, 0.5, 0.5],
        "bottom_right" => [0.5, 0.5, 0.5, 0.5],
        "left_third" => [0.0, 0.0, third, 1.0],
        "center_third" => [third, 0.0, third, 1.0],
        "right_third" => [2.0 * third, 0.0, third, 1.0],
        _ => return None,
    })
}

fn strip_tag<'a>(input: &'a str, tag: &str) -> Option<&'a str> {
    let lower = input.to_ascii_lowercase();
    lower.starts_with(tag).then(|| &input[tag.len()..])
}

fn parse_rect_values(rest: &str) -> MoshResult<[f64; 4]> {
    let parts: Vec<&str> = rest.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(region_err(
            format!("rect needs exactly 4 values, got {}", parts.len()),
            None,
        ));
    }
    let mut out = [0.0f64; 4];
    for (i, p) in parts.iter().enumerate() {
        let v: f64 = p
            .parse()
            .map_err(|_| region_err(format!("rect value '{p}' is not a number"), None))?;
        if !v.is_finite() {
            return Err(region_err(format!("rect value '{p}' must be finite"), None));
        }
        out[i] = v;
    }
    Ok(out)
}

fn region_err(message: impl Into<String>, suggestion: Option<&'static str>) -> MoshError {
    MoshError::RegionParse {
        message: message.into(),
        valid_presets: REGION_PRESETS.to_vec(),
        suggestion,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/region/resolver.rs"]
mod tests;
