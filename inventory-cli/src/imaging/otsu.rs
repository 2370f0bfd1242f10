//! Otsu binarization
//!
//! Serial plates are photographed under uneven light, so the black/white
//! split is chosen per image: the threshold maximizing between-class
//! variance of the grayscale histogram.

use image::{Rgba, RgbaImage};

const BLACK: u8 = 0;
const WHITE: u8 = 255;

/// Luma of an RGB triple, rounded to the nearest level
pub fn gray(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64).round() as u8
}

/// 256-bin histogram of grayscale levels
pub fn histogram(image: &RgbaImage) -> [u64; 256] {
    let mut hist = [0u64; 256];
    for pixel in image.pixels() {
        let [r, g, b, _] = pixel.0;
        hist[gray(r, g, b) as usize] += 1;
    }
    hist
}

/// Threshold maximizing between-class variance
///
/// Levels are scanned upward; only a strict improvement moves the
/// threshold, so ties keep the lowest level. An empty or single-level
/// histogram yields 0.
pub fn otsu_threshold(hist: &[u64; 256]) -> u8 {
    let total: u64 = hist.iter().sum();
    let sum: f64 = hist
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut sum_b = 0.0;
    let mut w_b: u64 = 0;
    let mut max_variance = 0.0;
    let mut threshold = 0u8;

    for (level, &count) in hist.iter().enumerate() {
        w_b += count;
        if w_b == 0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f == 0 {
            break;
        }

        sum_b += level as f64 * count as f64;
        let m_b = sum_b / w_b as f64;
        let m_f = (sum - sum_b) / w_f as f64;
        let variance = w_b as f64 * w_f as f64 * (m_b - m_f).powi(2);

        if variance > max_variance {
            max_variance = variance;
            threshold = level as u8;
        }
    }

    threshold
}

/// Pure black/white copy of an image
///
/// A pixel turns white when its gray level is above the Otsu threshold.
/// Dimensions and alpha are preserved.
pub fn binarize(image: &RgbaImage) -> RgbaImage {
    let threshold = otsu_threshold(&histogram(image));
    log::debug!(
        "Binarizing {}x{} image at threshold {}",
        image.width(),
        image.height(),
        threshold
    );

    let mut out = RgbaImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let level = if gray(r, g, b) > threshold { WHITE } else { BLACK };
        out.put_pixel(x, y, Rgba([level, level, level, a]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn two_region(width: u32, height: u32, dark: u8, light: u8) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, _| {
            let v = if x < width / 2 { dark } else { light };
            Rgba([v, v, v, 255])
        })
    }

    #[test]
    fn test_gray_weights() {
        assert_eq!(gray(255, 255, 255), 255);
        assert_eq!(gray(0, 0, 0), 0);
        assert_eq!(gray(255, 0, 0), 76);
        assert_eq!(gray(0, 255, 0), 150);
        assert_eq!(gray(0, 0, 255), 29);
    }

    #[test]
    fn test_two_region_partition() {
        let image = two_region(8, 4, 20, 220);
        let threshold = otsu_threshold(&histogram(&image));
        assert!((20..220).contains(&threshold));

        let out = binarize(&image);
        assert_eq!(out.dimensions(), (8, 4));
        for (x, _, pixel) in out.enumerate_pixels() {
            let expected = if x < 4 { BLACK } else { WHITE };
            assert_eq!(pixel.0, [expected, expected, expected, 255]);
        }
    }

    #[test]
    fn test_alpha_is_preserved() {
        let mut image = two_region(4, 1, 0, 255);
        image.put_pixel(0, 0, Rgba([0, 0, 0, 17]));
        image.put_pixel(3, 0, Rgba([255, 255, 255, 0]));

        let out = binarize(&image);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 17]);
        assert_eq!(out.get_pixel(3, 0).0, [255, 255, 255, 0]);
    }

    #[test]
    fn test_degenerate_histograms() {
        assert_eq!(otsu_threshold(&[0; 256]), 0);

        let mut single = [0u64; 256];
        single[128] = 50;
        assert_eq!(otsu_threshold(&single), 0);

        let empty = RgbaImage::new(0, 0);
        assert_eq!(binarize(&empty).dimensions(), (0, 0));
    }

    #[test]
    fn test_threshold_separates_clusters() {
        let mut hist = [0u64; 256];
        for level in 30..40 {
            hist[level] = 10;
        }
        for level in 200..210 {
            hist[level] = 10;
        }
        let threshold = otsu_threshold(&hist);
        assert!((39..200).contains(&threshold));
    }

    proptest! {
        #[test]
        fn prop_output_is_pure_black_or_white(
            pixels in proptest::collection::vec(any::<[u8; 4]>(), 1..64),
        ) {
            let width = pixels.len() as u32;
            let image = RgbaImage::from_fn(width, 1, |x, _| Rgba(pixels[x as usize]));
            let out = binarize(&image);

            prop_assert_eq!(out.dimensions(), image.dimensions());
            for (src, dst) in image.pixels().zip(out.pixels()) {
                let [r, g, b, a] = dst.0;
                prop_assert!(r == g && g == b);
                prop_assert!(r == BLACK || r == WHITE);
                prop_assert_eq!(a, src.0[3]);
            }
        }

        #[test]
        fn prop_two_levels_split_exactly(
            dark in 0u8..255,
            gap in 1u8..=255,
            width in 2u32..16,
            height in 1u32..8,
        ) {
            let light = dark.saturating_add(gap);
            prop_assume!(light > dark);

            let image = two_region(width, height, dark, light);
            let threshold = otsu_threshold(&histogram(&image));
            prop_assert!(threshold >= dark && threshold < light);

            let out = binarize(&image);
            for (x, _, pixel) in out.enumerate_pixels() {
                let expected = if x < width / 2 { BLACK } else { WHITE };
                prop_assert_eq!(pixel.0[0], expected);
            }
        }
    }
}
