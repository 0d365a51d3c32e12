use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One candidate face reported by the detector for one frame.
///
/// Coordinates are fractions of the frame size, as emitted by SSD-style
/// detectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub confidence: f32,
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// Pixel-space rectangle, every edge clamped into the frame.
///
/// `top` is not the detector's top edge, see [`crate::geometry::normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    /// Integer crop rectangle `(x, y, width, height)` spanned by the box corners.
    ///
    /// Corners are truncated toward zero and swapped when inverted, so a box
    /// whose `top` lies below its `bottom` crops the band between them.
    pub fn crop_rect(&self) -> (u32, u32, u32, u32) {
        let x0 = self.left.max(0.0) as u32;
        let x1 = self.right.max(0.0) as u32;
        let y0 = self.top.max(0.0) as u32;
        let y1 = self.bottom.max(0.0) as u32;
        let (x_min, x_max) = (x0.min(x1), x0.max(x1));
        let (y_min, y_max) = (y0.min(y1), y0.max(y1));
        (x_min, y_min, x_max - x_min, y_max - y_min)
    }
}

/// 8-bit RGB sample produced by the color quantizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Lowercase `rrggbb` hex string.
    pub fn to_hex(self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Hue in degrees, saturation and lightness in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

/// Semantic color name assigned to a dominant color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorName {
    Black,
    White,
    Gray,
    Red,
    Yellow,
    Green,
    Blue,
    Magenta,
}

impl ColorName {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorName::Black => "black",
            ColorName::White => "white",
            ColorName::Gray => "gray",
            ColorName::Red => "red",
            ColorName::Yellow => "yellow",
            ColorName::Green => "green",
            ColorName::Blue => "blue",
            ColorName::Magenta => "magenta",
        }
    }
}

impl fmt::Display for ColorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified shirt color as persisted on the session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShirtColor {
    pub color: ColorName,
    /// Share of the region's pixels that belong to this color, in [0, 1].
    pub rating: f32,
}

/// One continuous presence episode ("customer visit").
///
/// Everything except `end_time` is fixed at creation. `end_time` is set
/// once, when the departure is confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub device_id: String,
    pub perceived_team: String,
    pub shirt_colors: Vec<ShirtColor>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Fields that may change on a stored session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionUpdate {
    pub end_time: DateTime<Utc>,
}
