//! Frames, the capture/detection collaborator traits, and per-frame analysis.

use crate::color;
use crate::geometry;
use crate::quantizer::{ColorQuantizer, QuantizeError};
use crate::team;
use crate::types::{BoundingBox, Detection, ShirtColor};
use chrono::{DateTime, Utc};
use image::{imageops, RgbImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("frame source: {0}")]
    Source(String),
    #[error("detector: {0}")]
    Detector(String),
}

/// A captured RGB frame.
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
    /// Position in the stream, starting at 0.
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Produces frames one at a time. `Ok(None)` marks the end of the stream.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameError>;
}

/// Produces candidate face detections for a frame, in fractional coordinates.
pub trait Detector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, FrameError>;
}

/// One detection that passed the confidence threshold, with its shirt colors.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedDetection {
    pub detection: Detection,
    pub bbox: BoundingBox,
    pub shirt_colors: Vec<ShirtColor>,
    pub team: &'static str,
}

/// Everything the presence logic needs to know about one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameObservation {
    pub detections: Vec<AnalyzedDetection>,
    /// Colors of all qualifying detections, in detection order.
    pub shirt_colors: Vec<ShirtColor>,
    /// Team folded over `shirt_colors`.
    pub team: &'static str,
}

impl FrameObservation {
    /// At least one detection passed the confidence threshold.
    pub fn face_present(&self) -> bool {
        !self.detections.is_empty()
    }
}

/// Runs normalize → quantize → classify → infer for every detection.
pub struct FrameAnalyzer<Q> {
    quantizer: Q,
    confidence_threshold: f32,
    saturation_threshold: f32,
}

impl<Q: ColorQuantizer> FrameAnalyzer<Q> {
    pub fn new(quantizer: Q) -> Self {
        Self {
            quantizer,
            confidence_threshold: geometry::DEFAULT_CONFIDENCE_THRESHOLD,
            saturation_threshold: color::DEFAULT_SATURATION_THRESHOLD,
        }
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_saturation_threshold(mut self, threshold: f32) -> Self {
        self.saturation_threshold = threshold;
        self
    }

    /// Quantize a region and classify each dominant color, most prominent first.
    pub fn classify_region(&self, region: &RgbImage) -> Result<Vec<ShirtColor>, QuantizeError> {
        let dominant = self.quantizer.dominant_colors(region)?;
        Ok(dominant
            .into_iter()
            .map(|d| ShirtColor {
                color: color::classify_rgb(d.color, self.saturation_threshold),
                rating: d.share,
            })
            .collect())
    }

    /// Analyze one frame. Quantizer failures are logged and leave that
    /// detection with no colors (team "unknown").
    pub fn analyze(&self, frame: &Frame, detections: &[Detection]) -> FrameObservation {
        let mut analyzed = Vec::new();

        for detection in detections {
            let Some(bbox) = geometry::normalize(
                detection,
                frame.width(),
                frame.height(),
                self.confidence_threshold,
            ) else {
                continue;
            };

            let (x, y, w, h) = bbox.crop_rect();
            let region = imageops::crop_imm(&frame.image, x, y, w, h).to_image();

            let shirt_colors = match self.classify_region(&region) {
                Ok(colors) => colors,
                Err(err) => {
                    tracing::warn!(
                        frame = frame.sequence,
                        error = %err,
                        "color extraction failed; treating detection as colorless"
                    );
                    Vec::new()
                }
            };

            let team = team::infer_team(shirt_colors.iter().map(|c| c.color));
            analyzed.push(AnalyzedDetection {
                detection: *detection,
                bbox,
                shirt_colors,
                team,
            });
        }

        let shirt_colors: Vec<ShirtColor> = analyzed
            .iter()
            .flat_map(|d| d.shirt_colors.iter().cloned())
            .collect();
        let team = team::infer_team(shirt_colors.iter().map(|c| c.color));

        FrameObservation {
            detections: analyzed,
            shirt_colors,
            team,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantizer::KmeansQuantizer;
    use crate::types::ColorName;

    const W: u32 = 320;
    const H: u32 = 240;

    /// Top half `upper`, bottom half `lower`.
    fn frame(upper: [u8; 3], lower: [u8; 3]) -> Frame {
        Frame {
            image: RgbImage::from_fn(W, H, |_, y| image::Rgb(if y < H / 2 { upper } else { lower })),
            sequence: 0,
            captured_at: Utc::now(),
        }
    }

    fn face(confidence: f32) -> Detection {
        // bottom at 0.1*240 = 24 → shirt band 124..224 lies in the lower half
        Detection { confidence, left: 0.3, top: 0.0, right: 0.6, bottom: 0.1 }
    }

    fn analyzer() -> FrameAnalyzer<KmeansQuantizer> {
        FrameAnalyzer::new(KmeansQuantizer::default())
    }

    #[test]
    fn test_no_detections_is_absent() {
        let obs = analyzer().analyze(&frame([0, 0, 0], [0, 0, 0]), &[]);
        assert!(!obs.face_present());
        assert!(obs.shirt_colors.is_empty());
        assert_eq!(obs.team, "unknown");
    }

    #[test]
    fn test_low_confidence_detections_are_dropped() {
        let obs = analyzer().analyze(&frame([0, 0, 0], [20, 30, 210]), &[face(0.3), face(0.1)]);
        assert!(!obs.face_present());
    }

    #[test]
    fn test_blue_shirt_is_ucla() {
        let obs = analyzer().analyze(&frame([240, 200, 180], [20, 30, 210]), &[face(0.9)]);
        assert!(obs.face_present());
        assert_eq!(obs.detections.len(), 1);
        assert_eq!(obs.shirt_colors.len(), 1);
        assert_eq!(obs.shirt_colors[0].color, ColorName::Blue);
        assert_eq!(obs.team, "ucla");
    }

    #[test]
    fn test_red_shirt_is_usc() {
        let obs = analyzer().analyze(&frame([0, 0, 0], [210, 20, 20]), &[face(0.95)]);
        assert_eq!(obs.team, "usc");
        assert_eq!(obs.detections[0].team, "usc");
    }

    #[test]
    fn test_degenerate_crop_yields_unknown() {
        // bottom at the last row: padded bottom and top both clamp to H-1
        let d = Detection { confidence: 0.9, left: 0.2, top: 0.5, right: 0.4, bottom: 0.99 };
        let obs = analyzer().analyze(&frame([0, 0, 0], [20, 30, 210]), &[d]);
        assert!(obs.face_present());
        assert!(obs.shirt_colors.is_empty());
        assert_eq!(obs.team, "unknown");
    }

    #[test]
    fn test_frame_team_folds_across_detections() {
        // left half red shirts, right half blue shirts
        let image = RgbImage::from_fn(W, H, |x, y| {
            image::Rgb(if y < H / 2 {
                [0, 0, 0]
            } else if x < W / 2 {
                [210, 20, 20]
            } else {
                [20, 30, 210]
            })
        });
        let frame = Frame { image, sequence: 3, captured_at: Utc::now() };
        let red = Detection { confidence: 0.9, left: 0.1, top: 0.0, right: 0.3, bottom: 0.1 };
        let blue = Detection { confidence: 0.9, left: 0.7, top: 0.0, right: 0.9, bottom: 0.1 };

        let obs = analyzer().analyze(&frame, &[red, blue]);
        assert_eq!(obs.detections[0].team, "usc");
        assert_eq!(obs.detections[1].team, "ucla");
        assert_eq!(obs.team, "ucla");
        assert_eq!(obs.shirt_colors.len(), 2);
    }

    #[test]
    fn test_saturation_threshold_applies() {
        // washed-out blue: s ≈ 0.15
        let washed = [110, 115, 150];
        let strict = analyzer().with_saturation_threshold(0.2);
        let obs = strict.analyze(&frame([0, 0, 0], washed), &[face(0.9)]);
        assert_eq!(obs.shirt_colors[0].color, ColorName::Gray);

        let lenient = analyzer().with_saturation_threshold(0.1);
        let obs = lenient.analyze(&frame([0, 0, 0], washed), &[face(0.9)]);
        assert_eq!(obs.shirt_colors[0].color, ColorName::Blue);
    }
}
