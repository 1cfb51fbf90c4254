//! Deterministic synthetic captures for demos and tests.

use crate::models::AudioClip;
use image::{DynamicImage, GrayImage, Luma};
use std::f64::consts::PI;

struct Ellipse {
    cx: f64,
    cy: f64,
    rx: f64,
    ry: f64,
}

impl Ellipse {
    fn contains(&self, x: u32, y: u32) -> bool {
        let dx = (x as f64 - self.cx) / self.rx;
        let dy = (y as f64 - self.cy) / self.ry;
        dx * dx + dy * dy <= 1.0
    }
}

fn within(x: u32, y: u32, cx: f64, cy: f64, r: f64) -> bool {
    let dx = x as f64 - cx;
    let dy = y as f64 - cy;
    dx * dx + dy * dy <= r * r
}

fn paint_face(x: u32, y: u32, cx: f64, cy: f64) -> Option<u8> {
    let head = Ellipse {
        cx,
        cy,
        rx: 50.0,
        ry: 65.0,
    };
    if !head.contains(x, y) {
        return None;
    }
    if within(x, y, cx - 20.0, cy - 20.0, 8.0) || within(x, y, cx + 20.0, cy - 20.0, 8.0) {
        return Some(40);
    }
    let (fx, fy) = (x as f64, y as f64);
    if (cx - 20.0..cx + 20.0).contains(&fx) && (cy + 28.0..cy + 36.0).contains(&fy) {
        return Some(60);
    }
    Some((200.0 - (fx - cx).abs() / 2.0) as u8)
}

/// 200x200 frame with one bright, shaded face on a dark background.
pub fn face_image() -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_fn(200, 200, |x, y| {
        Luma([paint_face(x, y, 100.0, 100.0).unwrap_or(30)])
    }))
}

/// Same face lifted by a constant brightness offset.
pub fn brighter_face_image(offset: u8) -> DynamicImage {
    let mut image = face_image().to_luma8();
    for pixel in image.pixels_mut() {
        pixel.0[0] = pixel.0[0].saturating_add(offset);
    }
    DynamicImage::ImageLuma8(image)
}

/// A dark, checker-textured head on a bright background.
pub fn different_face_image() -> DynamicImage {
    let head = Ellipse {
        cx: 100.0,
        cy: 100.0,
        rx: 55.0,
        ry: 62.0,
    };
    DynamicImage::ImageLuma8(GrayImage::from_fn(200, 200, |x, y| {
        if head.contains(x, y) {
            Luma([if (x / 6 + y / 6) % 2 == 0 { 60 } else { 120 }])
        } else {
            Luma([230])
        }
    }))
}

pub fn two_faces_image() -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_fn(360, 200, |x, y| {
        let value = paint_face(x, y, 90.0, 100.0)
            .or_else(|| paint_face(x, y, 270.0, 100.0))
            .unwrap_or(30);
        Luma([value])
    }))
}

pub fn blank_image(width: u32, height: u32, value: u8) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value])))
}

/// Parallel sinusoidal ridges. `angle` is in degrees.
pub fn ridge_image(size: u32, period: f64, angle: f64) -> DynamicImage {
    let (sin, cos) = angle.to_radians().sin_cos();
    DynamicImage::ImageLuma8(GrayImage::from_fn(size, size, |x, y| {
        let t = x as f64 * cos + y as f64 * sin;
        Luma([(128.0 + 100.0 * (2.0 * PI * t / period).sin()) as u8])
    }))
}

/// Concentric ridges around the frame centre.
pub fn whorl_image(size: u32, period: f64) -> DynamicImage {
    let centre = size as f64 / 2.0;
    DynamicImage::ImageLuma8(GrayImage::from_fn(size, size, |x, y| {
        let r = ((x as f64 - centre).powi(2) + (y as f64 - centre).powi(2)).sqrt();
        Luma([(128.0 + 100.0 * (2.0 * PI * r / period).sin()) as u8])
    }))
}

pub fn tone(frequency: f64, duration_secs: f64, sample_rate: u32) -> AudioClip {
    let count = (duration_secs * sample_rate as f64).round() as usize;
    let samples = (0..count)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (0.6 * (2.0 * PI * frequency * t).sin() + 0.2 * (4.0 * PI * frequency * t).sin())
                as f32
        })
        .collect();
    AudioClip::new(samples, sample_rate)
}
