//! Detector tests over synthetic frames, no camera required.

use image::{Rgb, RgbImage};
use vision::{DetectorConfig, DotDetector, Frame, HsvRange};

const RED: Rgb<u8> = Rgb([255, 0, 0]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Paint a filled axis-aligned square of `side` pixels with its top-left
/// corner at (x0, y0), giving an exact blob area of side^2.
fn paint_square(image: &mut RgbImage, x0: u32, y0: u32, side: u32, color: Rgb<u8>) {
    for y in y0..y0 + side {
        for x in x0..x0 + side {
            image.put_pixel(x, y, color);
        }
    }
}

fn frame_with_squares(squares: &[(u32, u32, u32)]) -> Frame {
    let mut image = RgbImage::from_pixel(64, 64, BLACK);
    for &(x0, y0, side) in squares {
        paint_square(&mut image, x0, y0, side, RED);
    }
    Frame::new(image)
}

fn detector(min_area: f64, max_area: f64) -> DotDetector {
    let config = DetectorConfig {
        min_area,
        max_area,
        ..DetectorConfig::default()
    };
    DotDetector::new(config).unwrap()
}

#[test]
fn blank_frame_yields_no_detection() {
    let frame = frame_with_squares(&[]);
    assert!(detector(1.0, 50.0).detect(&frame).is_none());
}

#[test]
fn single_dot_centroid_is_recovered() {
    // 3x3 square with top-left at (20, 30) -> centroid (21, 31), area 9.
    let frame = frame_with_squares(&[(20, 30, 3)]);
    let hit = detector(1.0, 50.0).detect(&frame).expect("dot present");
    assert_eq!((hit.x, hit.y), (21, 31));
    assert_eq!(hit.area, 9.0);
}

#[test]
fn area_band_bounds_are_exclusive() {
    // 2x2 square: area exactly 4.
    let frame = frame_with_squares(&[(10, 10, 2)]);

    // area == min_area is excluded.
    assert!(detector(4.0, 50.0).detect(&frame).is_none());
    // area == max_area is excluded.
    assert!(detector(1.0, 4.0).detect(&frame).is_none());
    // strictly inside the band is accepted.
    assert!(detector(3.0, 5.0).detect(&frame).is_some());
}

#[test]
fn oversized_blob_is_ignored_in_favor_of_qualifying_one() {
    // A big 8x8 patch (area 64, above the band) plus a small 3x3 dot.
    let frame = frame_with_squares(&[(2, 2, 8), (40, 40, 3)]);
    let hit = detector(1.0, 50.0).detect(&frame).expect("small dot qualifies");
    assert_eq!((hit.x, hit.y), (41, 41));
}

#[test]
fn largest_qualifying_blob_wins() {
    let frame = frame_with_squares(&[(5, 5, 2), (40, 40, 4)]);
    let hit = detector(1.0, 50.0).detect(&frame).unwrap();
    assert_eq!(hit.area, 16.0);
}

#[test]
fn wrapped_hue_needs_the_second_range() {
    // A dot whose red sits just below the hue wrap point.
    let mut image = RgbImage::from_pixel(32, 32, BLACK);
    for y in 10..13 {
        for x in 10..13 {
            image.put_pixel(x, y, Rgb([255, 0, 25]));
        }
    }
    let frame = Frame::new(image);

    // Only the low band: miss.
    let low_only = DotDetector::new(DetectorConfig {
        ranges: vec![HsvRange::new([0, 120, 70], [10, 255, 255])],
        ..DetectorConfig::default()
    })
    .unwrap();
    assert!(low_only.detect(&frame).is_none());

    // Default config carries both bands: hit.
    let both = DotDetector::new(DetectorConfig::default()).unwrap();
    assert!(both.detect(&frame).is_some());
}

#[test]
fn morphology_suppresses_speckle_noise() {
    let mut image = RgbImage::from_pixel(32, 32, BLACK);
    // Scattered single red pixels, no coherent dot.
    for &(x, y) in &[(3u32, 3u32), (9, 20), (25, 7), (17, 28)] {
        image.put_pixel(x, y, RED);
    }
    let frame = Frame::new(image);

    let cleaned = DotDetector::new(DetectorConfig {
        morphology: true,
        kernel_size: 3,
        min_area: 0.5,
        ..DetectorConfig::default()
    })
    .unwrap();
    assert!(cleaned.detect(&frame).is_none());
}
