//! RGB to HSV conversion and HSV acceptance ranges.
//!
//! Hue is expressed on the 0..=179 half-degree scale and saturation/value on
//! 0..=255, matching the convention the color ranges were tuned against.

use serde::{Deserialize, Serialize};

/// Convert an 8-bit RGB pixel to HSV.
///
/// Returns `(h, s, v)` with `h` in 0..=179 (degrees / 2), `s` and `v` in
/// 0..=255. Achromatic pixels (zero chroma) report hue 0.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta / max * 255.0 } else { 0.0 };

    let h = if delta > 0.0 {
        let hue_degrees = if max == rf {
            60.0 * (gf - bf) / delta
        } else if max == gf {
            120.0 + 60.0 * (bf - rf) / delta
        } else {
            240.0 + 60.0 * (rf - gf) / delta
        };
        let hue_degrees = if hue_degrees < 0.0 {
            hue_degrees + 360.0
        } else {
            hue_degrees
        };
        hue_degrees / 2.0
    } else {
        0.0
    };

    (h.round() as u8, s.round().min(255.0) as u8, v as u8)
}

/// Inclusive HSV acceptance band.
///
/// Components are `[hue, saturation, value]`. A hue band that wraps the color
/// wheel's zero point (red) cannot be expressed by a single range; configure
/// two ranges instead, which the detector combines with logical OR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    /// Lower bound, inclusive.
    pub lower: [u8; 3],
    /// Upper bound, inclusive.
    pub upper: [u8; 3],
}

impl HsvRange {
    /// Range covering `lower..=upper` on each component.
    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    /// Whether every component of `hsv` lies within the band.
    pub fn contains(&self, hsv: (u8, u8, u8)) -> bool {
        let (h, s, v) = hsv;
        let inside =
            |value: u8, lo: u8, hi: u8| -> bool { value >= lo && value <= hi };
        inside(h, self.lower[0], self.upper[0])
            && inside(s, self.lower[1], self.upper[1])
            && inside(v, self.lower[2], self.upper[2])
    }

    /// Each lower bound must not exceed its upper bound.
    pub fn is_well_formed(&self) -> bool {
        self.lower
            .iter()
            .zip(self.upper.iter())
            .all(|(lo, hi)| lo <= hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_colors_land_on_expected_hues() {
        let (h, s, v) = rgb_to_hsv(255, 0, 0);
        assert_eq!((h, s, v), (0, 255, 255));

        let (h, _, _) = rgb_to_hsv(0, 255, 0);
        assert_eq!(h, 60);

        let (h, _, _) = rgb_to_hsv(0, 0, 255);
        assert_eq!(h, 120);
    }

    #[test]
    fn achromatic_pixels_have_zero_saturation() {
        assert_eq!(rgb_to_hsv(0, 0, 0), (0, 0, 0));
        assert_eq!(rgb_to_hsv(255, 255, 255), (0, 0, 255));
        let (_, s, v) = rgb_to_hsv(128, 128, 128);
        assert_eq!(s, 0);
        assert_eq!(v, 128);
    }

    #[test]
    fn deep_red_wraps_toward_top_of_hue_scale() {
        // Red with a blue tint sits just below the wrap point.
        let (h, _, _) = rgb_to_hsv(255, 0, 30);
        assert!(h > 170, "hue {h} should be near the wrap point");
    }

    #[test]
    fn range_membership_is_inclusive_on_both_bounds() {
        let range = HsvRange::new([0, 120, 70], [10, 255, 255]);
        assert!(range.contains((0, 120, 70)));
        assert!(range.contains((10, 255, 255)));
        assert!(!range.contains((11, 255, 255)));
        assert!(!range.contains((5, 119, 255)));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let range = HsvRange::new([10, 0, 0], [5, 255, 255]);
        assert!(!range.is_well_formed());
    }
}
