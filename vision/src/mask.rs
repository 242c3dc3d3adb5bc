//! Binary mask construction and morphological cleanup.
//!
//! Masks are `Array2<u8>` with 1 for selected pixels, indexed `[row, col]`.

use image::RgbImage;
use ndarray::Array2;

use crate::color::{rgb_to_hsv, HsvRange};

/// Build a binary mask of pixels falling inside any of the given HSV ranges.
///
/// Ranges combine with logical OR, which is how a wrapped hue band (two
/// ranges straddling hue zero) is expressed.
pub fn color_mask(image: &RgbImage, ranges: &[HsvRange]) -> Array2<u8> {
    let (width, height) = image.dimensions();
    let mut mask = Array2::<u8>::zeros((height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        let hsv = rgb_to_hsv(pixel.0[0], pixel.0[1], pixel.0[2]);
        if ranges.iter().any(|range| range.contains(hsv)) {
            mask[[y as usize, x as usize]] = 1;
        }
    }
    mask
}

/// Morphological opening: erosion then dilation.
///
/// Suppresses isolated noise pixels smaller than the structuring element.
pub fn open(mask: &Array2<u8>, kernel_size: usize) -> Array2<u8> {
    dilate(&erode(mask, kernel_size), kernel_size)
}

/// Morphological closing: dilation then erosion.
///
/// Bridges small gaps inside blobs without growing their outer extent.
pub fn close(mask: &Array2<u8>, kernel_size: usize) -> Array2<u8> {
    erode(&dilate(mask, kernel_size), kernel_size)
}

/// Erode with a `kernel_size` x `kernel_size` all-ones structuring element.
///
/// Pixels beyond the image edge count as background, so blobs touching the
/// border shrink from that side as well.
pub fn erode(mask: &Array2<u8>, kernel_size: usize) -> Array2<u8> {
    morph(mask, kernel_size, true)
}

/// Dilate with a `kernel_size` x `kernel_size` all-ones structuring element.
pub fn dilate(mask: &Array2<u8>, kernel_size: usize) -> Array2<u8> {
    morph(mask, kernel_size, false)
}

fn morph(mask: &Array2<u8>, kernel_size: usize, erosion: bool) -> Array2<u8> {
    let radius = (kernel_size / 2) as isize;
    let (rows, cols) = mask.dim();
    let mut out = Array2::<u8>::zeros((rows, cols));

    for row in 0..rows {
        for col in 0..cols {
            let mut hit = erosion;
            'window: for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let r = row as isize + dy;
                    let c = col as isize + dx;
                    let value = if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
                        0
                    } else {
                        mask[[r as usize, c as usize]]
                    };
                    if erosion && value == 0 {
                        hit = false;
                        break 'window;
                    }
                    if !erosion && value != 0 {
                        hit = true;
                        break 'window;
                    }
                }
            }
            if hit {
                out[[row, col]] = 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn red_image_with_dot(width: u32, height: u32, cx: u32, cy: u32, radius: u32) -> RgbImage {
        let mut image = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));
        for y in 0..height {
            for x in 0..width {
                let dx = x as i64 - cx as i64;
                let dy = y as i64 - cy as i64;
                if dx * dx + dy * dy <= (radius as i64).pow(2) {
                    image.put_pixel(x, y, Rgb([255, 0, 0]));
                }
            }
        }
        image
    }

    #[test]
    fn color_mask_selects_only_matching_pixels() {
        let image = red_image_with_dot(20, 20, 10, 10, 3);
        let ranges = [HsvRange::new([0, 120, 70], [10, 255, 255])];
        let mask = color_mask(&image, &ranges);

        assert_eq!(mask[[10, 10]], 1);
        assert_eq!(mask[[0, 0]], 0);
    }

    #[test]
    fn ranges_combine_with_or() {
        let mut image = RgbImage::from_pixel(4, 1, Rgb([0, 0, 0]));
        image.put_pixel(0, 0, Rgb([255, 0, 0])); // hue 0
        image.put_pixel(1, 0, Rgb([255, 0, 20])); // hue near wrap point

        let ranges = [
            HsvRange::new([0, 120, 70], [10, 255, 255]),
            HsvRange::new([170, 120, 70], [179, 255, 255]),
        ];
        let mask = color_mask(&image, &ranges);
        assert_eq!(mask[[0, 0]], 1);
        assert_eq!(mask[[0, 1]], 1);
        assert_eq!(mask[[0, 2]], 0);
    }

    #[test]
    fn opening_removes_isolated_pixels() {
        let mut mask = Array2::<u8>::zeros((9, 9));
        mask[[4, 4]] = 1; // lone noise pixel
        for r in 0..5 {
            for c in 5..9 {
                mask[[r, c]] = 1; // solid 5x4 block survives
            }
        }

        let opened = open(&mask, 3);
        assert_eq!(opened[[4, 4]], 0);
        assert_eq!(opened[[2, 7]], 1);
    }

    #[test]
    fn closing_bridges_small_gaps() {
        let mut mask = Array2::<u8>::zeros((7, 7));
        for r in 1..6 {
            for c in 1..6 {
                mask[[r, c]] = 1;
            }
        }
        mask[[3, 3]] = 0; // pinhole

        let closed = close(&mask, 3);
        assert_eq!(closed[[3, 3]], 1);
    }
}
