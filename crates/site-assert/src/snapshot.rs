//! Visual snapshot comparison against PNG baselines.
//!
//! The first comparison against a missing baseline writes it. Later runs paint
//! the ignored regions black on both images, count the pixels whose perceived
//! color difference exceeds the threshold and, on failure, leave
//! `<name>-failed.png` and `<name>-diff.png` next to the baseline.

use crate::result::{TestError, TestResult};
use image::{GenericImageView, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Maximum YIQ delta between two pixels
const MAX_YIQ_DELTA: f64 = 35_215.0;

/// Default per-pixel sensitivity
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Rectangle excluded from comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreRegion {
    /// X coordinate of top-left corner
    pub x: u32,
    /// Y coordinate of top-left corner
    pub y: u32,
    /// Width of the region
    pub width: u32,
    /// Height of the region
    pub height: u32,
}

impl IgnoreRegion {
    /// Create a new region
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the region lies inside a `width` x `height` image
    #[must_use]
    pub const fn fits(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

/// Snapshot comparison options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapshotOptions {
    /// Differing pixels tolerated
    pub max_different_pixels: usize,
    /// Per-pixel sensitivity, 0 (exact) to 1 (anything matches)
    pub threshold: f64,
    /// Regions painted black on both images before diffing
    pub ignored_regions: Vec<IgnoreRegion>,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            max_different_pixels: 0,
            threshold: DEFAULT_THRESHOLD,
            ignored_regions: Vec::new(),
        }
    }
}

impl SnapshotOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tolerated differing pixel count
    #[must_use]
    pub const fn with_max_different_pixels(mut self, count: usize) -> Self {
        self.max_different_pixels = count;
        self
    }

    /// Set the per-pixel sensitivity
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Exclude a region
    #[must_use]
    pub fn with_ignored_region(mut self, region: IgnoreRegion) -> Self {
        self.ignored_regions.push(region);
        self
    }

    /// Check the threshold range and that every region fits a capture of
    /// `width` x `height`
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the offending option
    pub fn validate(&self, width: u32, height: u32) -> TestResult<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(TestError::configuration(format!(
                "snapshot threshold must be between 0 and 1, got {}",
                self.threshold
            )));
        }
        if let Some(region) = self.ignored_regions.iter().find(|r| !r.fits(width, height)) {
            return Err(TestError::configuration(format!(
                "ignored region {}x{} at ({}, {}) exceeds image bounds {width}x{height}",
                region.width, region.height, region.x, region.y
            )));
        }
        Ok(())
    }
}

/// What a comparison concluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// No baseline existed; the capture became the baseline
    BaselineCreated,
    /// Within tolerance
    Matched {
        /// Pixels above the threshold
        different_pixels: usize,
    },
    /// Baseline and capture dimensions differ; no diff was run
    SizeMismatch {
        /// Baseline (width, height)
        baseline: (u32, u32),
        /// Capture (width, height)
        actual: (u32, u32),
    },
    /// Too many differing pixels; artifacts written
    Exceeded {
        /// Pixels above the threshold
        different_pixels: usize,
        /// Tolerated count
        allowed: usize,
        /// Where the capture was written
        actual_path: PathBuf,
        /// Where the diff visualization was written
        diff_path: PathBuf,
    },
}

impl SnapshotOutcome {
    /// Whether the assertion passes
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::BaselineCreated | Self::Matched { .. })
    }

    /// Failure message for the baseline at `path`, if this is a failure
    #[must_use]
    pub fn failure_message(&self, path: &Path) -> Option<String> {
        match self {
            Self::BaselineCreated | Self::Matched { .. } => None,
            Self::SizeMismatch { baseline, actual } => Some(format!(
                "snapshot {}: size mismatch, baseline is {}x{} but capture is {}x{}",
                path.display(),
                baseline.0,
                baseline.1,
                actual.0,
                actual.1
            )),
            Self::Exceeded {
                different_pixels,
                allowed,
                actual_path,
                diff_path,
            } => Some(format!(
                "snapshot {}: {different_pixels} different pixels found, {allowed} allowed (actual: {}, diff: {})",
                path.display(),
                actual_path.display(),
                diff_path.display()
            )),
        }
    }
}

/// Result of diffing two equally sized images
#[derive(Debug, Clone)]
pub struct PixelDiff {
    /// Pixels above the threshold
    pub different_pixels: usize,
    /// Differences in red over a faded copy of the baseline
    pub image: RgbaImage,
}

/// Compares captures against baseline files
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotComparator;

impl SnapshotComparator {
    /// Create a comparator
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Reject paths that are not `.png` files in an existing directory
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the bad path
    pub fn validate_path(path: &Path) -> TestResult<()> {
        let is_png = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if !is_png {
            return Err(TestError::configuration(format!(
                "snapshot path must be a .png file: {}",
                path.display()
            )));
        }
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if !dir.is_dir() {
            return Err(TestError::configuration(format!(
                "snapshot directory does not exist: {}",
                dir.display()
            )));
        }
        Ok(())
    }

    /// Compare PNG bytes against the baseline at `path`.
    ///
    /// # Errors
    ///
    /// Configuration errors for a bad path, a threshold outside `0..=1` or a
    /// region outside the capture, checked before any baseline is written;
    /// image or I/O errors when decoding or writing fails. Mismatches are
    /// outcomes, not errors.
    pub fn compare(&self, path: &Path, png: &[u8], options: &SnapshotOptions) -> TestResult<SnapshotOutcome> {
        Self::validate_path(path)?;

        let mut actual = image::load_from_memory(png)
            .map_err(|e| image_error("Failed to decode capture", &e))?
            .to_rgba8();
        let (width, height) = actual.dimensions();
        options.validate(width, height)?;

        if !path.exists() {
            std::fs::write(path, png)?;
            info!(path = %path.display(), "snapshot baseline created");
            return Ok(SnapshotOutcome::BaselineCreated);
        }

        let mut baseline = image::open(path)
            .map_err(|e| image_error("Failed to decode baseline", &e))?
            .to_rgba8();

        if actual.dimensions() != baseline.dimensions() {
            return Ok(SnapshotOutcome::SizeMismatch {
                baseline: baseline.dimensions(),
                actual: actual.dimensions(),
            });
        }

        for region in &options.ignored_regions {
            paint_black(&mut actual, region);
            paint_black(&mut baseline, region);
        }

        let diff = diff_images(&baseline, &actual, options.threshold);
        if diff.different_pixels <= options.max_different_pixels {
            return Ok(SnapshotOutcome::Matched {
                different_pixels: diff.different_pixels,
            });
        }

        let actual_path = sibling(path, "failed");
        let diff_path = sibling(path, "diff");
        std::fs::write(&actual_path, png)?;
        std::fs::write(&diff_path, encode_png(&diff.image)?)?;
        warn!(
            path = %path.display(),
            different = diff.different_pixels,
            allowed = options.max_different_pixels,
            "snapshot mismatch"
        );

        Ok(SnapshotOutcome::Exceeded {
            different_pixels: diff.different_pixels,
            allowed: options.max_different_pixels,
            actual_path,
            diff_path,
        })
    }
}

fn image_error(context: &str, e: &image::ImageError) -> TestError {
    TestError::Image {
        message: format!("{context}: {e}"),
    }
}

/// `dir/name.png` → `dir/name-<suffix>.png`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}-{suffix}.png"))
}

fn paint_black(img: &mut RgbaImage, region: &IgnoreRegion) {
    for y in region.y..region.y + region.height {
        for x in region.x..region.x + region.width {
            img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
        }
    }
}

/// Encode an RGBA image as PNG bytes
///
/// # Errors
///
/// Returns an image error if encoding fails
pub fn encode_png(img: &RgbaImage) -> TestResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| image_error("Failed to encode PNG", &e))?;
    Ok(buffer.into_inner())
}

/// Count pixels whose YIQ color delta exceeds `threshold` and build the diff image
#[must_use]
pub fn diff_images(expected: &RgbaImage, actual: &RgbaImage, threshold: f64) -> PixelDiff {
    let max_delta = MAX_YIQ_DELTA * threshold * threshold;
    let (width, height) = expected.dimensions();
    let mut image = RgbaImage::new(width, height);
    let mut different_pixels = 0usize;

    for (x, y, expected_pixel) in expected.enumerate_pixels() {
        let Some(actual_pixel) = actual.get_pixel_checked(x, y) else {
            continue;
        };
        if yiq_delta(*expected_pixel, *actual_pixel) > max_delta {
            different_pixels += 1;
            image.put_pixel(x, y, Rgba([255, 0, 0, 255]));
        } else {
            let Rgba([r, g, b, _]) = *expected_pixel;
            image.put_pixel(x, y, Rgba([r / 2, g / 2, b / 2, 128]));
        }
    }

    PixelDiff {
        different_pixels,
        image,
    }
}

/// Perceived squared color distance in YIQ space, alpha blended over white
#[must_use]
pub fn yiq_delta(a: Rgba<u8>, b: Rgba<u8>) -> f64 {
    if a == b {
        return 0.0;
    }
    let (r1, g1, b1) = blend_white(a);
    let (r2, g2, b2) = blend_white(b);
    let (dr, dg, db) = (r1 - r2, g1 - g2, b1 - b2);

    let y = dr * 0.298_895_31 + dg * 0.586_622_47 + db * 0.114_482_23;
    let i = dr * 0.595_977_99 - dg * 0.274_176_10 - db * 0.321_801_89;
    let q = dr * 0.211_470_17 - dg * 0.522_617_11 + db * 0.311_146_94;

    0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q
}

fn blend_white(px: Rgba<u8>) -> (f64, f64, f64) {
    let Rgba([r, g, b, a]) = px;
    let alpha = f64::from(a) / 255.0;
    let blend = |c: u8| 255.0 + (f64::from(c) - 255.0) * alpha;
    (blend(r), blend(g), blend(b))
}

/// Dimensions of an encoded image
///
/// # Errors
///
/// Returns an image error if the bytes cannot be decoded
pub fn png_dimensions(png: &[u8]) -> TestResult<(u32, u32)> {
    image::load_from_memory(png)
        .map(|img| img.dimensions())
        .map_err(|e| image_error("Failed to decode image", &e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    fn png(img: &RgbaImage) -> Vec<u8> {
        encode_png(img).unwrap()
    }

    mod diff_tests {
        use super::*;

        #[test]
        fn test_identical_pixels_have_zero_delta() {
            let px = Rgba([10, 20, 30, 255]);
            assert!(yiq_delta(px, px).abs() < f64::EPSILON);
        }

        #[test]
        fn test_black_white_is_pure_luma_delta() {
            let delta = yiq_delta(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 255]));
            assert!((delta - 0.5053 * 255.0 * 255.0).abs() < 1.0);
            assert!(delta < MAX_YIQ_DELTA);
        }

        #[test]
        fn test_transparent_blends_over_white() {
            let delta = yiq_delta(Rgba([0, 0, 0, 0]), Rgba([255, 255, 255, 255]));
            assert!(delta.abs() < f64::EPSILON);
        }

        #[test]
        fn test_threshold_controls_sensitivity() {
            let a = solid(4, 4, [100, 100, 100, 255]);
            let b = solid(4, 4, [104, 104, 104, 255]);
            assert_eq!(diff_images(&a, &b, 0.1).different_pixels, 0);
            assert_eq!(diff_images(&a, &b, 0.0).different_pixels, 16);
        }

        #[test]
        fn test_diff_image_marks_red() {
            let a = solid(2, 1, [0, 0, 0, 255]);
            let mut b = a.clone();
            b.put_pixel(1, 0, Rgba([255, 255, 255, 255]));
            let diff = diff_images(&a, &b, 0.1);
            assert_eq!(diff.different_pixels, 1);
            assert_eq!(*diff.image.get_pixel(1, 0), Rgba([255, 0, 0, 255]));
        }

        #[test]
        fn test_region_bounds() {
            assert!(IgnoreRegion::new(0, 0, 10, 10).fits(10, 10));
            assert!(!IgnoreRegion::new(5, 0, 6, 1).fits(10, 10));
            assert!(!IgnoreRegion::new(u32::MAX, 0, 2, 1).fits(10, 10));
        }
    }

    mod path_tests {
        use super::*;

        #[test]
        fn test_non_png_rejected() {
            let dir = tempfile::tempdir().unwrap();
            let err = SnapshotComparator::validate_path(&dir.path().join("shot.jpg")).unwrap_err();
            assert!(err.is_configuration());
        }

        #[test]
        fn test_missing_directory_rejected() {
            let dir = tempfile::tempdir().unwrap();
            let err = SnapshotComparator::validate_path(&dir.path().join("nope/shot.png")).unwrap_err();
            assert!(err.to_string().contains("does not exist"));
        }

        #[test]
        fn test_sibling_names() {
            let path = Path::new("/tmp/shots/home.png");
            assert_eq!(sibling(path, "diff"), Path::new("/tmp/shots/home-diff.png"));
        }
    }

    mod compare_tests {
        use super::*;

        #[test]
        fn test_first_run_creates_baseline_then_matches() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("home.png");
            let capture = png(&solid(8, 8, [200, 10, 10, 255]));
            let comparator = SnapshotComparator::new();
            let options = SnapshotOptions::new();

            assert_eq!(
                comparator.compare(&path, &capture, &options).unwrap(),
                SnapshotOutcome::BaselineCreated
            );
            assert!(path.exists());
            assert_eq!(
                comparator.compare(&path, &capture, &options).unwrap(),
                SnapshotOutcome::Matched { different_pixels: 0 }
            );
        }

        #[test]
        fn test_size_mismatch_before_diff() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("home.png");
            std::fs::write(&path, png(&solid(8, 8, [0, 0, 0, 255]))).unwrap();
            let outcome = SnapshotComparator::new()
                .compare(&path, &png(&solid(8, 9, [0, 0, 0, 255])), &SnapshotOptions::new())
                .unwrap();
            assert!(!outcome.is_pass());
            assert!(outcome.failure_message(&path).unwrap().contains("size mismatch"));
            assert!(!dir.path().join("home-diff.png").exists());
        }

        #[test]
        fn test_exceeded_writes_artifacts() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("home.png");
            std::fs::write(&path, png(&solid(4, 4, [0, 0, 0, 255]))).unwrap();
            let mut changed = solid(4, 4, [0, 0, 0, 255]);
            changed.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
            changed.put_pixel(3, 3, Rgba([255, 255, 255, 255]));

            let outcome = SnapshotComparator::new()
                .compare(&path, &png(&changed), &SnapshotOptions::new().with_max_different_pixels(1))
                .unwrap();
            let message = outcome.failure_message(&path).unwrap();
            assert!(message.contains("2 different pixels found, 1 allowed"));
            assert!(dir.path().join("home-failed.png").exists());
            assert!(dir.path().join("home-diff.png").exists());
        }

        #[test]
        fn test_ignored_region_masks_difference() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("clock.png");
            std::fs::write(&path, png(&solid(4, 4, [255, 255, 255, 255]))).unwrap();
            let mut changed = solid(4, 4, [255, 255, 255, 255]);
            changed.put_pixel(1, 1, Rgba([0, 0, 0, 255]));

            let options = SnapshotOptions::new().with_ignored_region(IgnoreRegion::new(1, 1, 1, 1));
            let outcome = SnapshotComparator::new().compare(&path, &png(&changed), &options).unwrap();
            assert_eq!(outcome, SnapshotOutcome::Matched { different_pixels: 0 });
        }

        #[test]
        fn test_out_of_bounds_region_is_configuration_error() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("home.png");
            let capture = png(&solid(4, 4, [0, 0, 0, 255]));
            std::fs::write(&path, &capture).unwrap();
            let options = SnapshotOptions::new().with_ignored_region(IgnoreRegion::new(2, 2, 3, 1));
            let err = SnapshotComparator::new().compare(&path, &capture, &options).unwrap_err();
            assert!(err.is_configuration());
        }

        #[test]
        fn test_bad_region_rejected_before_baseline_written() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("home.png");
            let options = SnapshotOptions::new().with_ignored_region(IgnoreRegion::new(100, 100, 50, 50));
            let comparator = SnapshotComparator::new();

            let err = comparator
                .compare(&path, &png(&solid(4, 4, [0, 0, 0, 255])), &options)
                .unwrap_err();
            assert!(err.is_configuration());
            assert!(!path.exists());

            std::fs::write(&path, png(&solid(4, 4, [0, 0, 0, 255]))).unwrap();
            let err = comparator
                .compare(&path, &png(&solid(5, 4, [0, 0, 0, 255])), &options)
                .unwrap_err();
            assert!(err.is_configuration());
        }

        #[test]
        fn test_threshold_out_of_range_rejected() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("home.png");
            let capture = png(&solid(4, 4, [0, 0, 0, 255]));
            std::fs::write(&path, &capture).unwrap();
            let comparator = SnapshotComparator::new();

            for threshold in [-5.0, 1.5, f64::NAN] {
                let options = SnapshotOptions::new().with_threshold(threshold);
                let err = comparator.compare(&path, &capture, &options).unwrap_err();
                assert!(err.to_string().contains("threshold"));
            }
            let edge = SnapshotOptions::new().with_threshold(1.0);
            assert!(comparator.compare(&path, &capture, &edge).unwrap().is_pass());
        }

        #[test]
        fn test_png_dimensions() {
            assert_eq!(png_dimensions(&png(&solid(7, 3, [1, 2, 3, 255]))).unwrap(), (7, 3));
            assert!(matches!(png_dimensions(b"not a png"), Err(TestError::Image { .. })));
        }
    }
}
