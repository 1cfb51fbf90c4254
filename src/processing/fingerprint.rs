use crate::models::{
    FeatureVector, FingerprintConfig, Modality, QualityGrade, QualityReport,
};
use crate::processing::descriptor::{normalized_histogram, DescriptorBuilder};
use crate::processing::{FeatureExtractor, Sample};
use crate::utils::{BiometricError, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use imageproc::contrast::{adaptive_threshold, stretch_contrast};
use imageproc::distance_transform::Norm;
use imageproc::filter::{filter3x3, gaussian_blur_f32};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use imageproc::morphology::{close, open};

const BLOCK_GRID: u32 = 8;
const INTENSITY_BINS: usize = 32;
const THRESHOLD_RADIUS: u32 = 5;
const LAPLACIAN: [i32; 9] = [0, 1, 0, 1, -4, 1, 0, 1, 0];

// Ridge periods in pixels, binned two pixels wide over [3, 21)
const PERIOD_MIN: f64 = 3.0;
const PERIOD_BIN_WIDTH: f64 = 2.0;
const PERIOD_BINS: usize = 9;
// Cells whose gradients agree less than this carry no usable period
const MIN_COHERENCE: f64 = 0.3;
const SIGNATURE_HALF_LENGTH: i32 = 24;
const SIGNATURE_HALF_WIDTH: i32 = 4;
// Orientation and period do not change when ridges merely shift, so they
// outweigh the minutia and intensity blocks
const ORIENTATION_WEIGHT: f64 = 2.0;
const PERIOD_WEIGHT: f64 = 2.0;

/// Binary ridge map reduced to one-pixel-wide lines.
#[derive(Debug, Clone)]
struct Skeleton {
    width: u32,
    height: u32,
    pixels: Vec<bool>,
}

impl Skeleton {
    fn from_mask(mask: &GrayImage) -> Self {
        let (width, height) = mask.dimensions();
        let pixels = mask
            .enumerate_pixels()
            .map(|(x, y, p)| p[0] > 0 && x > 0 && y > 0 && x + 1 < width && y + 1 < height)
            .collect();
        Skeleton {
            width,
            height,
            pixels,
        }
    }

    fn get(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        self.pixels[(y as u64 * self.width as u64 + x as u64) as usize]
    }

    fn clear(&mut self, x: u32, y: u32) {
        self.pixels[(y as u64 * self.width as u64 + x as u64) as usize] = false;
    }

    /// N, NE, E, SE, S, SW, W, NW
    fn neighbours(&self, x: u32, y: u32) -> [bool; 8] {
        let (x, y) = (x as i64, y as i64);
        [
            self.get(x, y - 1),
            self.get(x + 1, y - 1),
            self.get(x + 1, y),
            self.get(x + 1, y + 1),
            self.get(x, y + 1),
            self.get(x - 1, y + 1),
            self.get(x - 1, y),
            self.get(x - 1, y - 1),
        ]
    }

    // Zhang-Suen: alternate the two sub-iterations until nothing is removed
    fn thin(&mut self) {
        loop {
            let mut changed = false;
            for step in 0..2 {
                let mut removable = Vec::new();
                for y in 1..self.height.saturating_sub(1) {
                    for x in 1..self.width.saturating_sub(1) {
                        if !self.get(x as i64, y as i64) {
                            continue;
                        }
                        let n = self.neighbours(x, y);
                        let set = n.iter().filter(|v| **v).count();
                        if !(2..=6).contains(&set) {
                            continue;
                        }
                        let transitions = (0..8).filter(|&i| !n[i] && n[(i + 1) % 8]).count();
                        if transitions != 1 {
                            continue;
                        }
                        let (north, east, south, west) = (n[0], n[2], n[4], n[6]);
                        let deletable = if step == 0 {
                            !(north && east && south) && !(east && south && west)
                        } else {
                            !(north && east && west) && !(north && south && west)
                        };
                        if deletable {
                            removable.push((x, y));
                        }
                    }
                }
                changed |= !removable.is_empty();
                for (x, y) in removable {
                    self.clear(x, y);
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Ridge endings (one neighbour) and bifurcations (three neighbours),
    /// in row-major order, ignoring anything within `margin` of the frame.
    fn minutiae(&self, margin: u32) -> Minutiae {
        let mut found = Minutiae::default();
        for y in margin..self.height.saturating_sub(margin) {
            for x in margin..self.width.saturating_sub(margin) {
                if !self.get(x as i64, y as i64) {
                    continue;
                }
                match self.neighbours(x, y).iter().filter(|v| **v).count() {
                    1 => found.terminations.push((x, y)),
                    3 => found.bifurcations.push((x, y)),
                    _ => {}
                }
            }
        }
        found
    }
}

#[derive(Debug, Default)]
struct Minutiae {
    terminations: Vec<(u32, u32)>,
    bifurcations: Vec<(u32, u32)>,
}

/// Per-cell ridge flow: doubled-angle orientation weighted by coherence,
/// plus a histogram of the local ridge periods.
#[derive(Debug)]
struct RidgeField {
    orientation: Vec<f64>,
    periods: Vec<f64>,
}

impl RidgeField {
    fn measure(smoothed: &GrayImage) -> Self {
        let (width, height) = smoothed.dimensions();
        let gx = horizontal_sobel(smoothed);
        let gy = vertical_sobel(smoothed);

        let cells = (BLOCK_GRID * BLOCK_GRID) as usize;
        let mut tensor = vec![[0.0f64; 3]; cells];
        for (x, y, p) in gx.enumerate_pixels() {
            let dx = p[0] as f64;
            let dy = gy.get_pixel(x, y)[0] as f64;
            let cell = ((y * BLOCK_GRID / height) * BLOCK_GRID + x * BLOCK_GRID / width) as usize;
            tensor[cell][0] += dx * dx;
            tensor[cell][1] += dy * dy;
            tensor[cell][2] += dx * dy;
        }

        let mut orientation = Vec::with_capacity(2 * cells);
        let mut periods = vec![0.0; PERIOD_BINS];
        for (cell, &[gxx, gyy, gxy]) in tensor.iter().enumerate() {
            let energy = gxx + gyy;
            if energy <= 0.0 {
                orientation.extend([0.0, 0.0]);
                continue;
            }
            let coherence = ((gxx - gyy).powi(2) + 4.0 * gxy * gxy).sqrt() / energy;
            // Direction across the ridges, in [-pi/2, pi/2]
            let normal = 0.5 * (2.0 * gxy).atan2(gxx - gyy);
            orientation.push(coherence * (2.0 * normal).cos());
            orientation.push(coherence * (2.0 * normal).sin());
            if coherence < MIN_COHERENCE {
                continue;
            }

            let column = (cell as u32 % BLOCK_GRID) as f64;
            let row = (cell as u32 / BLOCK_GRID) as f64;
            let centre = (
                (column + 0.5) * width as f64 / BLOCK_GRID as f64,
                (row + 0.5) * height as f64 / BLOCK_GRID as f64,
            );
            if let Some(bin) = ridge_period(smoothed, centre, normal).and_then(period_bin) {
                periods[bin] += 1.0;
            }
        }
        RidgeField {
            orientation,
            periods,
        }
    }
}

/// Distance between ridges through `centre`, measured along `normal`.
///
/// Averages a strip of pixels parallel to the ridges into a 1-D signature,
/// then takes twice the mean spacing of its mean crossings.
fn ridge_period(image: &GrayImage, centre: (f64, f64), normal: f64) -> Option<f64> {
    let (width, height) = image.dimensions();
    let (sin, cos) = normal.sin_cos();
    let sample = |px: f64, py: f64| {
        let x = px.round().clamp(0.0, (width - 1) as f64) as u32;
        let y = py.round().clamp(0.0, (height - 1) as f64) as u32;
        image.get_pixel(x, y)[0] as f64
    };

    let strip = (2 * SIGNATURE_HALF_WIDTH + 1) as f64;
    let signature: Vec<f64> = (-SIGNATURE_HALF_LENGTH..=SIGNATURE_HALF_LENGTH)
        .map(|t| {
            let t = t as f64;
            (-SIGNATURE_HALF_WIDTH..=SIGNATURE_HALF_WIDTH)
                .map(|s| {
                    let s = s as f64;
                    sample(centre.0 + t * cos - s * sin, centre.1 + t * sin + s * cos)
                })
                .sum::<f64>()
                / strip
        })
        .collect();
    let mean = signature.iter().sum::<f64>() / signature.len() as f64;

    let crossings: Vec<f64> = signature
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let (a, b) = (pair[0] - mean, pair[1] - mean);
            ((a < 0.0) != (b < 0.0)).then(|| i as f64 + a / (a - b))
        })
        .collect();
    if crossings.len() < 3 {
        return None;
    }
    let span = crossings[crossings.len() - 1] - crossings[0];
    Some(2.0 * span / (crossings.len() - 1) as f64)
}

fn period_bin(period: f64) -> Option<usize> {
    let bin = ((period - PERIOD_MIN) / PERIOD_BIN_WIDTH).floor();
    (bin >= 0.0 && bin < PERIOD_BINS as f64).then(|| bin as usize)
}

/// Skeleton-minutiae descriptor with block statistics and ridge flow.
#[derive(Debug, Clone)]
pub struct FingerprintExtractor {
    config: FingerprintConfig,
}

impl FingerprintExtractor {
    pub fn new(config: FingerprintConfig) -> Self {
        FingerprintExtractor { config }
    }

    pub fn dimensions(&self) -> usize {
        2 + 4 * self.config.max_minutiae
            + 2 * (BLOCK_GRID * BLOCK_GRID) as usize
            + INTENSITY_BINS
            + 2 * (BLOCK_GRID * BLOCK_GRID) as usize
            + PERIOD_BINS
    }

    fn check_size(&self, gray: &GrayImage) -> Result<()> {
        let (width, height) = gray.dimensions();
        if (width as u64) * (height as u64) < self.config.min_area as u64 {
            return Err(BiometricError::ImageTooSmall {
                width,
                height,
                min_area: self.config.min_area,
            });
        }
        Ok(())
    }

    // Canonical square with intensities stretched to the full range
    fn enhance(&self, gray: &GrayImage) -> GrayImage {
        let size = self.config.canonical_size;
        let resized = imageops::resize(gray, size, size, FilterType::Triangle);
        let (lo, hi) = resized
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
        if hi > lo {
            stretch_contrast(&resized, lo, hi)
        } else {
            resized
        }
    }

    fn ridge_skeleton(smoothed: &GrayImage) -> Skeleton {
        let mut inverted = smoothed.clone();
        // Ridges are dark; make them the foreground
        imageops::invert(&mut inverted);
        let binary = adaptive_threshold(&inverted, THRESHOLD_RADIUS);
        let cleaned = open(&close(&binary, Norm::LInf, 1), Norm::LInf, 1);

        let mut skeleton = Skeleton::from_mask(&cleaned);
        skeleton.thin();
        skeleton
    }

    fn coordinate_slots(&self, points: &[(u32, u32)]) -> Vec<f64> {
        let size = self.config.canonical_size as f64;
        let mut slots = vec![0.0; 2 * self.config.max_minutiae];
        for (slot, (x, y)) in slots.chunks_mut(2).zip(points.iter()) {
            slot[0] = *x as f64 / size;
            slot[1] = *y as f64 / size;
        }
        slots
    }

    fn block_statistics(enhanced: &GrayImage) -> Vec<f64> {
        let (width, height) = enhanced.dimensions();
        let cells = (BLOCK_GRID * BLOCK_GRID) as usize;
        let mut sum = vec![0.0; cells];
        let mut sum_sq = vec![0.0; cells];
        let mut count = vec![0.0; cells];
        for (x, y, p) in enhanced.enumerate_pixels() {
            let cell = ((y * BLOCK_GRID / height) * BLOCK_GRID + x * BLOCK_GRID / width) as usize;
            let v = p[0] as f64 / 255.0;
            sum[cell] += v;
            sum_sq[cell] += v * v;
            count[cell] += 1.0;
        }

        let mut means = Vec::with_capacity(cells);
        let mut stds = Vec::with_capacity(cells);
        for cell in 0..cells {
            if count[cell] == 0.0 {
                means.push(0.0);
                stds.push(0.0);
                continue;
            }
            let mean = sum[cell] / count[cell];
            means.push(mean);
            stds.push((sum_sq[cell] / count[cell] - mean * mean).max(0.0).sqrt());
        }
        means.extend(stds);
        means
    }

    /// Capture-time quality feedback from sharpness and global contrast.
    pub fn assess_quality(&self, image: &DynamicImage) -> QualityReport {
        let gray = image.to_luma8();
        if self.check_size(&gray).is_err() {
            let grade = QualityGrade::Poor;
            return QualityReport {
                grade,
                score: 0.0,
                sharpness: 0.0,
                contrast: 0.0,
                message: grade.message().to_string(),
            };
        }

        let laplacian = filter3x3::<_, i32, i16>(&gray, &LAPLACIAN);
        let sharpness = variance(laplacian.pixels().map(|p| p[0] as f64)).min(100.0);
        let deviation = variance(gray.pixels().map(|p| p[0] as f64)).sqrt();
        let contrast = (deviation / 50.0 * 100.0).min(100.0);
        let score = (sharpness + contrast) / 2.0;
        let grade = QualityGrade::from_score(score);

        log::debug!(
            "Fingerprint quality {:.1} (sharpness {:.1}, contrast {:.1})",
            score,
            sharpness,
            contrast
        );
        QualityReport {
            grade,
            score,
            sharpness,
            contrast,
            message: grade.message().to_string(),
        }
    }
}

fn variance(values: impl Iterator<Item = f64>) -> f64 {
    let (mut n, mut sum, mut sum_sq) = (0.0, 0.0, 0.0);
    for v in values {
        n += 1.0;
        sum += v;
        sum_sq += v * v;
    }
    if n == 0.0 {
        return 0.0;
    }
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

impl FeatureExtractor for FingerprintExtractor {
    fn modality(&self) -> Modality {
        Modality::Fingerprint
    }

    fn extract(&self, sample: &Sample) -> Result<FeatureVector> {
        let gray = sample.as_image(Modality::Fingerprint)?.to_luma8();
        self.check_size(&gray)?;

        let enhanced = self.enhance(&gray);
        let smoothed = gaussian_blur_f32(&enhanced, 1.0);
        let minutiae = Self::ridge_skeleton(&smoothed).minutiae(self.config.border_margin);
        let field = RidgeField::measure(&smoothed);
        log::debug!(
            "Fingerprint minutiae: {} terminations, {} bifurcations",
            minutiae.terminations.len(),
            minutiae.bifurcations.len()
        );

        let slots = self.config.max_minutiae as f64;
        let counts = [
            minutiae.terminations.len() as f64,
            minutiae.bifurcations.len() as f64,
        ]
        .map(|count| if slots > 0.0 { count / (count + slots) } else { 0.0 });

        let intensity = normalized_histogram(
            enhanced.pixels().map(|p| p[0] as f64),
            INTENSITY_BINS,
            0.0,
            256.0,
        );
        let mut builder = DescriptorBuilder::with_capacity(self.dimensions());
        builder
            .push_raw(&counts)
            .push_block(&self.coordinate_slots(&minutiae.terminations))
            .push_block(&self.coordinate_slots(&minutiae.bifurcations))
            .push_block(&Self::block_statistics(&enhanced))
            .push_block(&intensity)
            .push_weighted(&field.orientation, ORIENTATION_WEIGHT)
            .push_weighted(&field.periods, PERIOD_WEIGHT);

        if builder.len() != self.dimensions() {
            return Err(BiometricError::encoding(
                Modality::Fingerprint,
                format!("expected {} values, built {}", self.dimensions(), builder.len()),
            ));
        }
        Ok(builder.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::DecisionPolicy;
    use crate::processing::synthetic;
    use image::Luma;

    fn extractor() -> FingerprintExtractor {
        FingerprintExtractor::new(FingerprintConfig::default())
    }

    fn skeleton_from(points: &[(u32, u32)], size: u32) -> Skeleton {
        let mut mask = GrayImage::new(size, size);
        for &(x, y) in points {
            mask.put_pixel(x, y, Luma([255]));
        }
        Skeleton::from_mask(&mask)
    }

    #[test]
    fn test_line_has_two_endings() {
        let points: Vec<(u32, u32)> = (4..20).map(|x| (x, 10)).collect();
        let minutiae = skeleton_from(&points, 24).minutiae(2);
        assert_eq!(minutiae.terminations, vec![(4, 10), (19, 10)]);
        assert!(minutiae.bifurcations.is_empty());
    }

    #[test]
    fn test_fork_has_one_bifurcation() {
        let mut points = vec![(10, 10)];
        points.extend((4..10).map(|x| (x, 10)));
        points.extend((1..6).map(|d| (10 + d, 10 - d)));
        points.extend((1..6).map(|d| (10 + d, 10 + d)));
        let minutiae = skeleton_from(&points, 24).minutiae(2);
        assert_eq!(minutiae.bifurcations, vec![(10, 10)]);
        assert_eq!(minutiae.terminations.len(), 3);
    }

    #[test]
    fn test_thinning_reduces_bar_to_line() {
        let mut mask = GrayImage::new(40, 20);
        for y in 8..13 {
            for x in 5..35 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let mut skeleton = Skeleton::from_mask(&mask);
        skeleton.thin();
        for x in 10..30 {
            let column = (0..20).filter(|&y| skeleton.get(x, y)).count();
            assert_eq!(column, 1, "column {}", x);
        }
    }

    #[test]
    fn test_descriptor_shape() {
        let vector = extractor()
            .extract(&Sample::Image(synthetic::ridge_image(256, 9.0, 30.0)))
            .unwrap();
        assert_eq!(vector.len(), 427);
        assert_eq!(extractor().dimensions(), 427);
        let norm: f64 = vector.as_slice().iter().map(|v| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_small_image_rejected() {
        let err = extractor()
            .extract(&Sample::Image(synthetic::ridge_image(80, 9.0, 0.0)))
            .unwrap_err();
        assert!(matches!(
            err,
            BiometricError::ImageTooSmall {
                width: 80,
                height: 80,
                min_area: 10_000
            }
        ));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_matching_behaviour() {
        let policy =
            DecisionPolicy::from_scoring(&FingerprintConfig::default().scoring, None).unwrap();
        let extract = |image: DynamicImage| extractor().extract(&Sample::Image(image)).unwrap();

        let enrolled = extract(synthetic::whorl_image(256, 10.0));
        let same = policy.evaluate(&enrolled, &extract(synthetic::whorl_image(256, 10.0)));
        assert!(same.success);
        assert!((same.similarity - 1.0).abs() < 1e-9);

        let distinct = [
            ("whorl vs diagonal ridges", synthetic::ridge_image(256, 7.0, 45.0)),
            ("whorl vs finer whorl", synthetic::whorl_image(256, 6.0)),
        ];
        for (label, image) in distinct {
            let other = policy.evaluate(&enrolled, &extract(image));
            assert!(!other.success, "{}: similarity {}", label, other.similarity);
        }

        let vertical = extract(synthetic::ridge_image(256, 9.0, 0.0));
        let horizontal = extract(synthetic::ridge_image(256, 9.0, 90.0));
        let rotated = policy.evaluate(&vertical, &horizontal);
        assert!(!rotated.success, "similarity {}", rotated.similarity);
        assert!(policy.evaluate(&vertical, &vertical).success);
    }

    #[test]
    fn test_ridge_field_follows_pattern() {
        let smoothed = |image: DynamicImage| gaussian_blur_f32(&image.to_luma8(), 1.0);
        let dominant = |field: &RidgeField| {
            (0..PERIOD_BINS)
                .max_by(|&a, &b| field.periods[a].total_cmp(&field.periods[b]))
                .unwrap()
        };

        let vertical = RidgeField::measure(&smoothed(synthetic::ridge_image(256, 10.0, 0.0)));
        let horizontal = RidgeField::measure(&smoothed(synthetic::ridge_image(256, 10.0, 90.0)));
        // Cell (3, 3) is well inside the frame
        let cell = 3 * BLOCK_GRID as usize + 3;
        assert!(vertical.orientation[2 * cell] > 0.9);
        assert!(horizontal.orientation[2 * cell] < -0.9);
        assert!(vertical.orientation[2 * cell + 1].abs() < 0.1);

        assert_eq!(period_bin(10.0), Some(3));
        assert_eq!(dominant(&vertical), 3);
        assert_eq!(dominant(&horizontal), 3);

        let fine = RidgeField::measure(&smoothed(synthetic::whorl_image(256, 6.0)));
        assert_eq!(dominant(&fine), period_bin(6.0).unwrap());
        assert_eq!(period_bin(2.0), None);
        assert_eq!(period_bin(25.0), None);
    }

    #[test]
    fn test_quality_grades() {
        let ridges = extractor().assess_quality(&synthetic::ridge_image(256, 8.0, 0.0));
        assert_eq!(ridges.grade, QualityGrade::Excellent);
        assert!(ridges.score > 70.0);

        let flat = extractor().assess_quality(&synthetic::blank_image(256, 256, 128));
        assert_eq!(flat.grade, QualityGrade::Poor);
        assert_eq!(flat.score, 0.0);

        let tiny = extractor().assess_quality(&synthetic::ridge_image(64, 8.0, 0.0));
        assert_eq!(tiny.grade, QualityGrade::Poor);
        assert_eq!(tiny.message, QualityGrade::Poor.message());
    }
}
