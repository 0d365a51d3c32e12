//! Detection → pixel box normalization.
//!
//! The detector reports a face box. The region of interest is the shirt
//! below it, so the box is widened, pushed down, and its top edge is
//! rebuilt from the padded bottom edge.

use crate::types::{BoundingBox, Detection};

// --- Named constants ---
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.4;
const HORIZONTAL_PADDING: f32 = 20.0;
const BOTTOM_PADDING: f32 = 100.0;
const TOP_OFFSET_FROM_BOTTOM: f32 = 100.0;

/// Convert a fractional detection into a clamped pixel box.
///
/// Returns `None` when `confidence < threshold`. The top edge is derived
/// from the padded bottom edge (`bottom + TOP_OFFSET_FROM_BOTTOM`), not
/// from `detection.top`, so after clamping `top >= bottom`.
pub fn normalize(
    detection: &Detection,
    width: u32,
    height: u32,
    threshold: f32,
) -> Option<BoundingBox> {
    if detection.confidence < threshold {
        return None;
    }

    let w = width as f32;
    let h = height as f32;

    let left = detection.left * w;
    let right = detection.right * w;
    let bottom = detection.bottom * h;

    let left = clamp(left - HORIZONTAL_PADDING, w - 1.0);
    let right = clamp(right + HORIZONTAL_PADDING, w - 1.0);
    let bottom = clamp(bottom + BOTTOM_PADDING, h - 1.0);
    // Literal: ignores the detector's top coordinate.
    let top = clamp(bottom + TOP_OFFSET_FROM_BOTTOM, h - 1.0);

    Some(BoundingBox { left, top, right, bottom })
}

fn clamp(value: f32, upper: f32) -> f32 {
    value.max(0.0).min(upper.max(0.0))
}
