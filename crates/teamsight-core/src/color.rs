//! RGB → HSL conversion and semantic color classification.

use crate::types::{ColorName, Hsl, Rgb};

/// Saturation below which a mid-lightness color is called gray.
///
/// Tunable: 0.2 is the stricter alternative that pushes washed-out
/// colors to gray.
pub const DEFAULT_SATURATION_THRESHOLD: f32 = 0.1;

const BLACK_LIGHTNESS: f32 = 0.2;
const WHITE_LIGHTNESS: f32 = 0.8;

/// Upper hue bounds (exclusive, degrees) in decision order.
const HUE_BANDS: [(f32, ColorName); 5] = [
    (30.0, ColorName::Red),
    (90.0, ColorName::Yellow),
    (170.0, ColorName::Green),
    (270.0, ColorName::Blue),
    (330.0, ColorName::Magenta),
];

/// Convert an 8-bit RGB sample to HSL.
///
/// Achromatic input (max == min) yields `h = 0` and `s = 0`. Saturation is
/// also 0 when lightness is exactly 0 or 1. Hue is not wrapped, so it can be
/// negative for colors between magenta and red; the classifier treats
/// negative hue as red.
pub fn rgb_to_hsl(rgb: Rgb) -> Hsl {
    let r = rgb.r as f32 / 255.0;
    let g = rgb.g as f32 / 255.0;
    let b = rgb.b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let l = (max + min) / 2.0;

    if delta == 0.0 {
        return Hsl { h: 0.0, s: 0.0, l };
    }

    let hue = if max == r {
        (g - b) / delta
    } else if max == g {
        2.0 + (b - r) / delta
    } else {
        4.0 + (r - g) / delta
    };

    let denom = 1.0 - (2.0 * l - 1.0).abs();
    let s = if denom > 0.0 { delta / denom } else { 0.0 };

    Hsl { h: hue * 60.0, s, l }
}

/// Classify an HSL triple. First matching rule wins:
/// lightness, then saturation, then hue band.
pub fn classify(hsl: Hsl, saturation_threshold: f32) -> ColorName {
    if hsl.l < BLACK_LIGHTNESS {
        return ColorName::Black;
    }
    if hsl.l > WHITE_LIGHTNESS {
        return ColorName::White;
    }
    if hsl.s < saturation_threshold {
        return ColorName::Gray;
    }
    HUE_BANDS
        .iter()
        .find(|(bound, _)| hsl.h < *bound)
        .map(|&(_, name)| name)
        .unwrap_or(ColorName::Red)
}

/// Convert and classify in one step.
pub fn classify_rgb(rgb: Rgb, saturation_threshold: f32) -> ColorName {
    classify(rgb_to_hsl(rgb), saturation_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hsl(h: f32, s: f32, l: f32) -> Hsl {
        Hsl { h, s, l }
    }

    #[test]
    fn test_hsl_primaries() {
        let red = rgb_to_hsl(Rgb::new(255, 0, 0));
        assert!(red.h.abs() < 1e-4);
        assert!((red.s - 1.0).abs() < 1e-4);
        assert!((red.l - 0.5).abs() < 1e-4);

        let green = rgb_to_hsl(Rgb::new(0, 255, 0));
        assert!((green.h - 120.0).abs() < 1e-3);

        let blue = rgb_to_hsl(Rgb::new(0, 0, 255));
        assert!((blue.h - 240.0).abs() < 1e-3);
    }

    #[test]
    fn test_hsl_achromatic_is_defined() {
        for v in [0u8, 1, 128, 254, 255] {
            let c = rgb_to_hsl(Rgb::new(v, v, v));
            assert_eq!(c.h, 0.0);
            assert_eq!(c.s, 0.0);
            assert!(c.l.is_finite());
        }
    }

    #[test]
    fn test_hue_negative_between_magenta_and_red() {
        // max == r and b > g → negative hue
        let c = rgb_to_hsl(Rgb::new(200, 20, 60));
        assert!(c.h < 0.0);
        assert_eq!(classify(c, DEFAULT_SATURATION_THRESHOLD), ColorName::Red);
    }

    #[test]
    fn test_dark_is_black_regardless_of_hue_and_saturation() {
        for h in [-30.0, 0.0, 100.0, 240.0, 359.0] {
            for s in [0.0, 0.5, 1.0] {
                assert_eq!(classify(hsl(h, s, 0.19), 0.1), ColorName::Black);
                assert_eq!(classify(hsl(h, s, 0.0), 0.2), ColorName::Black);
            }
        }
    }

    #[test]
    fn test_light_is_white_regardless_of_hue_and_saturation() {
        for h in [0.0, 100.0, 240.0] {
            for s in [0.0, 1.0] {
                assert_eq!(classify(hsl(h, s, 0.81), 0.1), ColorName::White);
                assert_eq!(classify(hsl(h, s, 1.0), 0.1), ColorName::White);
            }
        }
    }

    #[test]
    fn test_lightness_boundaries_fall_through() {
        // exactly 0.2 and 0.8 are neither black nor white
        assert_eq!(classify(hsl(240.0, 0.9, 0.2), 0.1), ColorName::Blue);
        assert_eq!(classify(hsl(240.0, 0.9, 0.8), 0.1), ColorName::Blue);
    }

    #[test]
    fn test_gray_threshold_is_configurable() {
        let washed = hsl(240.0, 0.15, 0.5);
        assert_eq!(classify(washed, 0.1), ColorName::Blue);
        assert_eq!(classify(washed, 0.2), ColorName::Gray);
    }

    #[test]
    fn test_hue_bands() {
        let cases = [
            (0.0, ColorName::Red),
            (29.9, ColorName::Red),
            (30.0, ColorName::Yellow),
            (89.9, ColorName::Yellow),
            (90.0, ColorName::Green),
            (169.9, ColorName::Green),
            (170.0, ColorName::Blue),
            (269.9, ColorName::Blue),
            (270.0, ColorName::Magenta),
            (329.9, ColorName::Magenta),
            (330.0, ColorName::Red),
            (359.0, ColorName::Red),
        ];
        for (h, expected) in cases {
            assert_eq!(classify(hsl(h, 0.8, 0.5), 0.1), expected, "hue {h}");
        }
    }

    #[test]
    fn test_classify_rgb_samples() {
        let t = DEFAULT_SATURATION_THRESHOLD;
        assert_eq!(classify_rgb(Rgb::new(10, 10, 10), t), ColorName::Black);
        assert_eq!(classify_rgb(Rgb::new(250, 250, 250), t), ColorName::White);
        assert_eq!(classify_rgb(Rgb::new(128, 128, 128), t), ColorName::Gray);
        assert_eq!(classify_rgb(Rgb::new(200, 30, 30), t), ColorName::Red);
        assert_eq!(classify_rgb(Rgb::new(220, 200, 30), t), ColorName::Yellow);
        assert_eq!(classify_rgb(Rgb::new(30, 160, 40), t), ColorName::Green);
        assert_eq!(classify_rgb(Rgb::new(30, 60, 200), t), ColorName::Blue);
        assert_eq!(classify_rgb(Rgb::new(180, 30, 200), t), ColorName::Magenta);
    }
}
