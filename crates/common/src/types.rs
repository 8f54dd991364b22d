//! Value types carried on track records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel (sample) aspect ratio: the shape of one encoded pixel.
///
/// `1:1` means square pixels. Anamorphic content (e.g. NTSC DV at `8:9`)
/// must be stretched horizontally by `numerator / denominator` for display.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleAspectRatio {
    pub numerator: u32,
    pub denominator: u32,
}

impl SampleAspectRatio {
    pub const SQUARE: Self = Self {
        numerator: 1,
        denominator: 1,
    };

    /// Build a ratio reduced to lowest terms. A zero component yields
    /// square pixels, since such a ratio carries no usable information.
    pub fn new(numerator: u32, denominator: u32) -> Self {
        if numerator == 0 || denominator == 0 {
            return Self::SQUARE;
        }
        let g = gcd(numerator as u64, denominator as u64) as u32;
        Self {
            numerator: numerator / g,
            denominator: denominator / g,
        }
    }

    /// Ratio of display size to coded size, i.e. the pixel shape implied by
    /// showing `coded_width x coded_height` pixels in a
    /// `display_width x display_height` area.
    pub fn from_display(
        coded_width: u32,
        coded_height: u32,
        display_width: u32,
        display_height: u32,
    ) -> Self {
        let num = display_width as u64 * coded_height as u64;
        let den = display_height as u64 * coded_width as u64;
        if num == 0 || den == 0 {
            return Self::SQUARE;
        }
        let g = gcd(num, den);
        let (num, den) = (num / g, den / g);
        match (u32::try_from(num), u32::try_from(den)) {
            (Ok(n), Ok(d)) => Self::new(n, d),
            _ => Self::SQUARE,
        }
    }

    pub fn is_square(self) -> bool {
        self.numerator == self.denominator
    }

    /// Displayed dimensions for coded `width x height`.
    ///
    /// Only the width is stretched; the height is kept. The returned values
    /// are new numbers, the coded dimensions are untouched.
    pub fn apply(self, width: u32, height: u32) -> (u32, u32) {
        if self.is_square() || self.denominator == 0 {
            return (width, height);
        }
        let scaled = (width as u64 * self.numerator as u64 + self.denominator as u64 / 2)
            / self.denominator as u64;
        (scaled.min(u32::MAX as u64) as u32, height)
    }
}

impl Default for SampleAspectRatio {
    fn default() -> Self {
        Self::SQUARE
    }
}

impl fmt::Display for SampleAspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.numerator, self.denominator)
    }
}

/// Location and timing of one encoded sample inside the media payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePosition {
    /// Absolute byte offset of the sample in the file.
    pub offset: u64,
    /// Sample size in bytes.
    pub size: u32,
    /// Decoding timestamp in track timescale units.
    pub dts: u64,
    /// Composition (presentation) timestamp in track timescale units.
    pub cts: i64,
    /// Sample duration in track timescale units.
    pub duration: u32,
    pub is_keyframe: bool,
}

/// Greatest common divisor (Euclidean algorithm).
fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_reduces() {
        let sar = SampleAspectRatio::new(64, 72);
        assert_eq!(sar.numerator, 8);
        assert_eq!(sar.denominator, 9);
        assert_eq!(sar.to_string(), "8:9");
    }

    #[test]
    fn test_zero_component_is_square() {
        assert_eq!(SampleAspectRatio::new(0, 1), SampleAspectRatio::SQUARE);
        assert_eq!(SampleAspectRatio::new(4, 0), SampleAspectRatio::SQUARE);
    }

    #[test]
    fn test_apply_square_is_identity() {
        assert_eq!(SampleAspectRatio::SQUARE.apply(1920, 1080), (1920, 1080));
    }

    #[test]
    fn test_apply_anamorphic() {
        // NTSC DV widescreen: 720x480 with 32:27 pixels displays as 853x480
        let sar = SampleAspectRatio::new(32, 27);
        assert_eq!(sar.apply(720, 480), (853, 480));

        // 4:3 NTSC: 720x480 with 8:9 pixels displays as 640x480
        let sar = SampleAspectRatio::new(8, 9);
        assert_eq!(sar.apply(720, 480), (640, 480));
    }

    #[test]
    fn test_from_display_matches_apply() {
        let sar = SampleAspectRatio::from_display(720, 480, 640, 480);
        assert_eq!(sar, SampleAspectRatio::new(8, 9));
        assert_eq!(sar.apply(720, 480), (640, 480));
    }

    #[test]
    fn test_from_display_degenerate() {
        assert_eq!(
            SampleAspectRatio::from_display(0, 0, 1920, 1080),
            SampleAspectRatio::SQUARE
        );
        assert_eq!(
            SampleAspectRatio::from_display(1920, 1080, 1920, 1080),
            SampleAspectRatio::SQUARE
        );
    }

    #[test]
    fn test_gcd_basics() {
        assert_eq!(gcd(30000, 1001), 1);
        assert_eq!(gcd(48000, 1000), 1000);
        assert_eq!(gcd(24, 8), 8);
    }
}
