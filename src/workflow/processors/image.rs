//! Image processing module - every raster operation the modifiers use
//!
//! Includes:
//! - Image decoding and encoding
//! - Named convolution kernels
//! - Enhancement blends (contrast, brightness, color, sharpness)
//! - Expanding rotation
//! - Threshold binarization with autocontrast

use anyhow::{Context, Result, bail};
use image::{
    ColorType, DynamicImage, GrayImage, ImageFormat, Rgba, RgbaImage, imageops,
    imageops::FilterType,
};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use std::{fs::read, path::Path};

// ────────────────────────────────────────────────────────────────
// Decoding / Encoding
// ────────────────────────────────────────────────────────────────

pub fn generate_dynamic_image_from_path(file_path: &Path) -> Result<DynamicImage> {
    let file_in_memory =
        read(file_path).context(format!("failed to read file into memory: {:?}", file_path))?;

    let decoders: Vec<fn(&[u8]) -> Result<DynamicImage>> = vec![image_crate_decoder];

    for decoder in decoders {
        match decoder(&file_in_memory) {
            Ok(decoded_image) => return Ok(decoded_image),
            Err(_) => continue,
        }
    }

    bail!("all decoders failed for file: {:?}", file_path);
}

fn image_crate_decoder(file_in_memory: &[u8]) -> Result<DynamicImage> {
    let dynamic_image = image::load_from_memory(file_in_memory)
        .context("image crate failed to decode image from memory")?;
    Ok(dynamic_image)
}

/// Encode `image` to `path`, format chosen by extension.
///
/// Formats without an alpha channel get the image flattened to RGB first.
pub fn save_dynamic_image(image: &DynamicImage, path: &Path) -> Result<()> {
    let format = ImageFormat::from_path(path)
        .context(format!("cannot infer an image format from {:?}", path))?;
    let flatten = matches!(format, ImageFormat::Jpeg) && image.color().has_alpha();
    let saved = if flatten {
        DynamicImage::ImageRgb8(image.to_rgb8()).save_with_format(path, format)
    } else {
        image.save_with_format(path, format)
    };
    saved.context(format!("failed to save image to {:?}", path))
}

// ────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────

pub fn resize_exact(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    image.resize_exact(width.max(1), height.max(1), FilterType::CatmullRom)
}

/// Cut the `width` x `height` box whose top-left corner is `(x, y)`.
///
/// The result always has the requested size. Any part of the box outside the
/// source is left zeroed.
pub fn crop_padded(
    image: &DynamicImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> DynamicImage {
    let inside = x as u64 + width as u64 <= image.width() as u64
        && y as u64 + height as u64 <= image.height() as u64;
    if inside {
        return image.crop_imm(x, y, width, height);
    }
    let mut canvas = DynamicImage::new(width, height, image.color());
    imageops::replace(&mut canvas, image, -(x as i64), -(y as i64));
    canvas
}

/// Size of the canvas `rotate_expand` produces.
pub fn rotated_extent(width: u32, height: u32, degrees: f64) -> (u64, u64) {
    let normalized = degrees.rem_euclid(360.0);
    if normalized == 90.0 || normalized == 270.0 {
        return (height as u64, width as u64);
    }
    let theta = normalized.to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let expanded = |a: u32, b: u32| -> u64 {
        ((a as f64 * cos + b as f64 * sin) - 1e-6).ceil().max(1.0) as u64
    };
    (expanded(width, height), expanded(height, width))
}

/// Rotate counter-clockwise by `degrees`, growing the canvas so no corner is
/// cut off. Uncovered area is transparent (black once alpha is dropped).
pub fn rotate_expand(image: &DynamicImage, degrees: f64) -> DynamicImage {
    let normalized = degrees.rem_euclid(360.0);
    if normalized == 0.0 {
        return image.clone();
    } else if normalized == 90.0 {
        return image.rotate270();
    } else if normalized == 180.0 {
        return image.rotate180();
    } else if normalized == 270.0 {
        return image.rotate90();
    }

    let color = image.color();
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let theta = normalized.to_radians();
    let (new_width, new_height) = rotated_extent(width, height, degrees);
    let (new_width, new_height) = (new_width as u32, new_height as u32);

    // Work on a canvas large enough for both the original and the result.
    let (canvas_width, canvas_height) = (new_width.max(width), new_height.max(height));
    let mut canvas = RgbaImage::new(canvas_width, canvas_height);
    imageops::overlay(
        &mut canvas,
        &rgba,
        ((canvas_width - width) / 2) as i64,
        ((canvas_height - height) / 2) as i64,
    );
    let rotated = rotate_about_center(
        &canvas,
        -(theta as f32),
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
    );
    let cropped = imageops::crop_imm(
        &rotated,
        (canvas_width - new_width) / 2,
        (canvas_height - new_height) / 2,
        new_width,
        new_height,
    )
    .to_image();

    with_color(color, DynamicImage::ImageRgba8(cropped))
}

// ────────────────────────────────────────────────────────────────
// Convolution Kernels
// ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedKernel {
    Blur,
    Contour,
    Detail,
    EdgeEnhance,
    EdgeEnhanceMore,
    Emboss,
    FindEdges,
    Sharpen,
    Smooth,
    SmoothMore,
}

impl NamedKernel {
    pub const ALL: [NamedKernel; 10] = [
        NamedKernel::Blur,
        NamedKernel::Contour,
        NamedKernel::Detail,
        NamedKernel::EdgeEnhance,
        NamedKernel::EdgeEnhanceMore,
        NamedKernel::Emboss,
        NamedKernel::FindEdges,
        NamedKernel::Sharpen,
        NamedKernel::Smooth,
        NamedKernel::SmoothMore,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NamedKernel::Blur => "blur",
            NamedKernel::Contour => "contour",
            NamedKernel::Detail => "detail",
            NamedKernel::EdgeEnhance => "edge_enhance",
            NamedKernel::EdgeEnhanceMore => "edge_enhance_more",
            NamedKernel::Emboss => "emboss",
            NamedKernel::FindEdges => "find_edges",
            NamedKernel::Sharpen => "sharpen",
            NamedKernel::Smooth => "smooth",
            NamedKernel::SmoothMore => "smooth_more",
        }
    }

    /// Accepts any case and spaces in place of underscores.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ALL.into_iter().find(|k| k.name() == wanted)
    }

    /// `(size, scale, offset, weights)`
    fn definition(&self) -> (usize, f32, f32, &'static [f32]) {
        match self {
            NamedKernel::Blur => (
                5,
                16.0,
                0.0,
                &[
                    1.0, 1.0, 1.0, 1.0, 1.0, //
                    1.0, 0.0, 0.0, 0.0, 1.0, //
                    1.0, 0.0, 0.0, 0.0, 1.0, //
                    1.0, 0.0, 0.0, 0.0, 1.0, //
                    1.0, 1.0, 1.0, 1.0, 1.0,
                ],
            ),
            NamedKernel::Contour => (
                3,
                1.0,
                255.0,
                &[-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0],
            ),
            NamedKernel::Detail => (
                3,
                6.0,
                0.0,
                &[0.0, -1.0, 0.0, -1.0, 10.0, -1.0, 0.0, -1.0, 0.0],
            ),
            NamedKernel::EdgeEnhance => (
                3,
                2.0,
                0.0,
                &[-1.0, -1.0, -1.0, -1.0, 10.0, -1.0, -1.0, -1.0, -1.0],
            ),
            NamedKernel::EdgeEnhanceMore => (
                3,
                1.0,
                0.0,
                &[-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0],
            ),
            NamedKernel::Emboss => (
                3,
                1.0,
                128.0,
                &[-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            ),
            NamedKernel::FindEdges => (
                3,
                1.0,
                0.0,
                &[-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0],
            ),
            NamedKernel::Sharpen => (
                3,
                16.0,
                0.0,
                &[-2.0, -2.0, -2.0, -2.0, 32.0, -2.0, -2.0, -2.0, -2.0],
            ),
            NamedKernel::Smooth => (
                3,
                13.0,
                0.0,
                &[1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0],
            ),
            NamedKernel::SmoothMore => (
                5,
                100.0,
                0.0,
                &[
                    1.0, 1.0, 1.0, 1.0, 1.0, //
                    1.0, 5.0, 5.0, 5.0, 1.0, //
                    1.0, 5.0, 44.0, 5.0, 1.0, //
                    1.0, 5.0, 5.0, 5.0, 1.0, //
                    1.0, 1.0, 1.0, 1.0, 1.0,
                ],
            ),
        }
    }
}

/// Convolve the color channels with `kernel`; alpha is kept as is and edges
/// are clamped.
pub fn apply_kernel(image: &DynamicImage, kernel: NamedKernel) -> DynamicImage {
    let (size, scale, offset, weights) = kernel.definition();
    let source = image.to_rgba8();
    let (width, height) = source.dimensions();
    let radius = (size / 2) as i64;

    let output = RgbaImage::from_fn(width, height, |x, y| {
        let mut sums = [0f32; 3];
        for ky in 0..size {
            for kx in 0..size {
                let weight = weights[ky * size + kx];
                if weight == 0.0 {
                    continue;
                }
                let sx = (x as i64 + kx as i64 - radius).clamp(0, width as i64 - 1) as u32;
                let sy = (y as i64 + ky as i64 - radius).clamp(0, height as i64 - 1) as u32;
                let pixel = source.get_pixel(sx, sy);
                for (channel, sum) in sums.iter_mut().enumerate() {
                    *sum += weight * pixel[channel] as f32;
                }
            }
        }
        let alpha = source.get_pixel(x, y)[3];
        let [r, g, b] = sums.map(|s| (s / scale + offset).round().clamp(0.0, 255.0) as u8);
        Rgba([r, g, b, alpha])
    });

    with_color(image.color(), DynamicImage::ImageRgba8(output))
}

// ────────────────────────────────────────────────────────────────
// Enhancement
// ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enhancement {
    Contrast,
    Brightness,
    Color,
    Sharpness,
}

/// Blend the image with a degenerate version of itself:
/// `degenerate + (image - degenerate) * factor`.
///
/// A factor of 1.0 returns the original image.
pub fn enhance(image: &DynamicImage, enhancement: Enhancement, factor: f32) -> DynamicImage {
    let source = image.to_rgba8();
    let (width, height) = source.dimensions();
    let degenerate: RgbaImage = match enhancement {
        Enhancement::Brightness => {
            RgbaImage::from_fn(width, height, |x, y| Rgba([0, 0, 0, source.get_pixel(x, y)[3]]))
        }
        Enhancement::Contrast => {
            let gray = image.to_luma8();
            let total: u64 = gray.pixels().map(|p| p[0] as u64).sum();
            let count = (gray.width() as u64 * gray.height() as u64).max(1);
            let mean = (total as f64 / count as f64 + 0.5) as u8;
            RgbaImage::from_fn(width, height, |x, y| {
                Rgba([mean, mean, mean, source.get_pixel(x, y)[3]])
            })
        }
        Enhancement::Color => DynamicImage::ImageLumaA8(image.to_luma_alpha8()).to_rgba8(),
        Enhancement::Sharpness => apply_kernel(image, NamedKernel::Smooth).to_rgba8(),
    };

    let output = RgbaImage::from_fn(width, height, |x, y| {
        let original = source.get_pixel(x, y);
        let base = degenerate.get_pixel(x, y);
        let mut blended = *original;
        for channel in 0..3 {
            let value =
                base[channel] as f32 + (original[channel] as f32 - base[channel] as f32) * factor;
            blended[channel] = value.round().clamp(0.0, 255.0) as u8;
        }
        blended
    });

    with_color(image.color(), DynamicImage::ImageRgba8(output))
}

// ────────────────────────────────────────────────────────────────
// Tone
// ────────────────────────────────────────────────────────────────

/// Grayscale, then 0 below `threshold` and 255 at or above it, then stretch
/// the result to the full range.
pub fn threshold_autocontrast(image: &DynamicImage, threshold: f64) -> DynamicImage {
    let mut gray = binarize(&image.to_luma8(), threshold);
    autocontrast(&mut gray);
    DynamicImage::ImageLuma8(gray)
}

pub fn binarize(gray: &GrayImage, threshold: f64) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y)[0];
        image::Luma([if (value as f64) < threshold { 0 } else { 255 }])
    })
}

/// Linearly map the darkest pixel to 0 and the brightest to 255. Flat images
/// are left untouched.
pub fn autocontrast(gray: &mut GrayImage) {
    let (low, high) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if high <= low {
        return;
    }
    let span = (high - low) as f32;
    for pixel in gray.pixels_mut() {
        pixel[0] = (((pixel[0] - low) as f32) * 255.0 / span).round() as u8;
    }
}

pub fn median_blur(image: &DynamicImage, radius: u32) -> DynamicImage {
    let filtered = imageproc::filter::median_filter(&image.to_rgba8(), radius, radius);
    with_color(image.color(), DynamicImage::ImageRgba8(filtered))
}

// ────────────────────────────────────────────────────────────────
// Helper Functions
// ────────────────────────────────────────────────────────────────

/// Convert a working RGBA copy back to the color type the image came in.
fn with_color(color: ColorType, image: DynamicImage) -> DynamicImage {
    match color {
        ColorType::L8 => DynamicImage::ImageLuma8(image.to_luma8()),
        ColorType::La8 => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        ColorType::Rgb8 => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    }
}
