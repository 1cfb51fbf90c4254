use crate::models::{FaceConfig, FaceDetection, FaceRegion, FeatureVector, Modality};
use crate::processing::descriptor::{normalized_histogram, DescriptorBuilder};
use crate::processing::{FeatureExtractor, Sample};
use crate::utils::{BiometricError, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::{equalize_histogram, otsu_level};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::BTreeMap;

const LBP_GRID: u32 = 4;
const LBP_BINS: usize = 16;
const HOG_GRID: u32 = 8;
const HOG_BINS: usize = 9;
const INTENSITY_BINS: usize = 32;
const THUMBNAIL_SIZE: u32 = 16;

/// Clockwise from the top-left neighbour, so bit `i` and bit `i + 4` are opposite pixels.
const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
];

#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    count: u64,
}

impl Bounds {
    fn new(x: u32, y: u32) -> Self {
        Bounds {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            count: 0,
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.count += 1;
    }

    fn region(&self) -> FaceRegion {
        FaceRegion {
            x: self.min_x,
            y: self.min_y,
            width: self.max_x - self.min_x + 1,
            height: self.max_y - self.min_y + 1,
        }
    }
}

/// Finds face-like blobs: one connected foreground region per face, separated
/// from the background by an Otsu threshold.
#[derive(Debug, Clone)]
pub struct FaceDetector {
    config: FaceConfig,
}

impl FaceDetector {
    pub fn new(config: FaceConfig) -> Self {
        FaceDetector { config }
    }

    /// Candidate face regions ordered top to bottom, then left to right.
    pub fn locate(&self, gray: &GrayImage) -> Vec<FaceRegion> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }
        let level = otsu_level(gray);

        // Whichever side of the threshold dominates the border is background
        let (mut border, mut above) = (0usize, 0usize);
        for (x, y, pixel) in gray.enumerate_pixels() {
            if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                border += 1;
                if pixel[0] > level {
                    above += 1;
                }
            }
        }
        let bright_background = above * 2 > border;

        let mask = GrayImage::from_fn(width, height, |x, y| {
            let value = gray.get_pixel(x, y)[0];
            let foreground = if bright_background {
                value <= level
            } else {
                value > level
            };
            Luma([if foreground { 255 } else { 0 }])
        });

        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));
        let mut components: BTreeMap<u32, Bounds> = BTreeMap::new();
        for (x, y, label) in labels.enumerate_pixels() {
            if label[0] == 0 {
                continue;
            }
            components
                .entry(label[0])
                .or_insert_with(|| Bounds::new(x, y))
                .include(x, y);
        }

        let frame_area = width as f64 * height as f64;
        let mut regions: Vec<FaceRegion> = components
            .values()
            .filter(|bounds| self.is_face_like(bounds, frame_area))
            .map(Bounds::region)
            .collect();
        regions.sort_by_key(|r| (r.y, r.x));
        regions
    }

    fn is_face_like(&self, bounds: &Bounds, frame_area: f64) -> bool {
        let region = bounds.region();
        if region.width < self.config.min_face_size || region.height < self.config.min_face_size {
            return false;
        }
        let (long, short) = if region.width > region.height {
            (region.width, region.height)
        } else {
            (region.height, region.width)
        };
        let box_area = region.width as f64 * region.height as f64;
        long as f64 / short as f64 <= self.config.max_aspect_ratio
            && bounds.count as f64 / box_area >= self.config.min_fill_ratio
            && box_area / frame_area <= self.config.max_area_ratio
    }

    /// Preview report for capture UIs. Not used for matching.
    pub fn detect(&self, image: &DynamicImage) -> FaceDetection {
        let regions = self.locate(&image.to_luma8());
        let message = match regions.len() {
            0 => "No face detected",
            1 => "Face detected",
            _ => "Multiple faces detected",
        };
        FaceDetection {
            face_count: regions.len(),
            regions,
            message: message.to_string(),
        }
    }
}

/// Texture and gradient descriptor of a single detected face.
#[derive(Debug, Clone)]
pub struct FaceExtractor {
    config: FaceConfig,
    detector: FaceDetector,
}

impl FaceExtractor {
    pub fn new(config: FaceConfig) -> Self {
        FaceExtractor {
            detector: FaceDetector::new(config.clone()),
            config,
        }
    }

    pub fn detector(&self) -> &FaceDetector {
        &self.detector
    }

    pub fn dimensions(&self) -> usize {
        (LBP_GRID * LBP_GRID) as usize * LBP_BINS
            + (HOG_GRID * HOG_GRID) as usize * HOG_BINS
            + INTENSITY_BINS
            + (THUMBNAIL_SIZE * THUMBNAIL_SIZE) as usize
    }

    fn single_face(&self, gray: &GrayImage) -> Result<FaceRegion> {
        let regions = self.detector.locate(gray);
        match regions.as_slice() {
            [] => Err(BiometricError::NoFaceDetected),
            [region] => Ok(*region),
            _ => Err(BiometricError::MultipleFacesDetected(regions.len())),
        }
    }

    // Padded crop, resized to the canonical square and histogram-equalized
    fn canonical_face(&self, gray: &GrayImage, region: FaceRegion) -> Result<GrayImage> {
        let (width, height) = gray.dimensions();
        let pad_x = (region.width as f64 * self.config.padding_ratio).round() as u32;
        let pad_y = (region.height as f64 * self.config.padding_ratio).round() as u32;
        let x0 = region.x.saturating_sub(pad_x);
        let y0 = region.y.saturating_sub(pad_y);
        let x1 = (region.x + region.width + pad_x).min(width);
        let y1 = (region.y + region.height + pad_y).min(height);
        if x1 <= x0 || y1 <= y0 {
            return Err(BiometricError::encoding(
                Modality::Face,
                format!("face crop is empty for region {:?}", region),
            ));
        }

        let crop = imageops::crop_imm(gray, x0, y0, x1 - x0, y1 - y0).to_image();
        let size = self.config.canonical_size;
        let resized = imageops::resize(&crop, size, size, FilterType::Triangle);
        Ok(equalize_histogram(&resized))
    }
}

// Each bit marks a neighbour pair where exactly one side is brighter than the centre
fn texture_histograms(face: &GrayImage) -> Vec<f64> {
    let (width, height) = face.dimensions();
    let mut hist = vec![0.0; (LBP_GRID * LBP_GRID) as usize * LBP_BINS];
    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let centre = face.get_pixel(x, y)[0];
            let mut code = 0u8;
            for (bit, (dx, dy)) in NEIGHBOURS.iter().enumerate() {
                let nx = (x as i32 + dx) as u32;
                let ny = (y as i32 + dy) as u32;
                if face.get_pixel(nx, ny)[0] > centre {
                    code |= 1 << bit;
                }
            }
            let bin = ((code >> 4) ^ (code & 0x0f)) as usize;
            let cell = ((y * LBP_GRID / height) * LBP_GRID + x * LBP_GRID / width) as usize;
            hist[cell * LBP_BINS + bin] += 1.0;
        }
    }
    for cell in hist.chunks_mut(LBP_BINS) {
        let total: f64 = cell.iter().sum();
        if total > 0.0 {
            cell.iter_mut().for_each(|v| *v /= total);
        }
    }
    hist
}

fn gradient_histograms(face: &GrayImage) -> Vec<f64> {
    let (width, height) = face.dimensions();
    let gx = horizontal_sobel(face);
    let gy = vertical_sobel(face);
    let mut hist = vec![0.0; (HOG_GRID * HOG_GRID) as usize * HOG_BINS];

    for (x, y, dx) in gx.enumerate_pixels() {
        let dx = dx[0] as f64;
        let dy = gy.get_pixel(x, y)[0] as f64;
        let magnitude = (dx * dx + dy * dy).sqrt();
        if magnitude == 0.0 {
            continue;
        }
        // Unsigned orientation in [0, 180)
        let mut angle = dy.atan2(dx).to_degrees();
        if angle < 0.0 {
            angle += 180.0;
        }
        if angle >= 180.0 {
            angle -= 180.0;
        }
        let bin = ((angle / (180.0 / HOG_BINS as f64)) as usize).min(HOG_BINS - 1);
        let cell = ((y * HOG_GRID / height) * HOG_GRID + x * HOG_GRID / width) as usize;
        hist[cell * HOG_BINS + bin] += magnitude;
    }

    for cell in hist.chunks_mut(HOG_BINS) {
        let norm = cell.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            cell.iter_mut().for_each(|v| *v /= norm);
        }
    }
    hist
}

fn thumbnail(face: &GrayImage) -> Vec<f64> {
    imageops::resize(face, THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Triangle)
        .pixels()
        .map(|p| p[0] as f64 / 255.0)
        .collect()
}

impl FeatureExtractor for FaceExtractor {
    fn modality(&self) -> Modality {
        Modality::Face
    }

    fn extract(&self, sample: &Sample) -> Result<FeatureVector> {
        let gray = sample.as_image(Modality::Face)?.to_luma8();
        if gray.width() == 0 || gray.height() == 0 {
            return Err(BiometricError::InvalidInput(
                "Face image has no pixel data".to_string(),
            ));
        }
        let region = self.single_face(&gray)?;
        log::debug!(
            "Face region at ({}, {}) size {}x{}",
            region.x,
            region.y,
            region.width,
            region.height
        );
        let face = self.canonical_face(&gray, region)?;

        let intensity = normalized_histogram(
            face.pixels().map(|p| p[0] as f64),
            INTENSITY_BINS,
            0.0,
            256.0,
        );
        let mut builder = DescriptorBuilder::with_capacity(self.dimensions());
        builder
            .push_block(&texture_histograms(&face))
            .push_block(&gradient_histograms(&face))
            .push_block(&intensity)
            .push_block(&thumbnail(&face));

        if builder.len() != self.dimensions() {
            return Err(BiometricError::encoding(
                Modality::Face,
                format!("expected {} values, built {}", self.dimensions(), builder.len()),
            ));
        }
        Ok(builder.finish())
    }
}
