// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the Donut vision encoder
//!
//! Mirrors the Donut image processor: align long axis, resize shortest edge,
//! thumbnail, centre pad, rescale and normalize into an NCHW tensor.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;
use serde::Deserialize;
use tracing::debug;

/// Default target height of the Donut base encoder
pub const DEFAULT_INPUT_HEIGHT: u32 = 2560;

/// Default target width of the Donut base encoder
pub const DEFAULT_INPUT_WIDTH: u32 = 1920;

/// Donut normalizes with 0.5/0.5, mapping pixels to [-1, 1]
pub const DEFAULT_MEAN: [f32; 3] = [0.5, 0.5, 0.5];
pub const DEFAULT_STD: [f32; 3] = [0.5, 0.5, 0.5];

/// Target size as stored in `preprocessor_config.json`
///
/// Current exports write `{"height": H, "width": W}`; legacy feature
/// extractor configs store `[width, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ImageSize {
    Dims { height: u32, width: u32 },
    Legacy([u32; 2]),
}

impl ImageSize {
    pub fn height(&self) -> u32 {
        match self {
            Self::Dims { height, .. } => *height,
            Self::Legacy([_, height]) => *height,
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Self::Dims { width, .. } => *width,
            Self::Legacy([width, _]) => *width,
        }
    }
}

fn default_size() -> ImageSize {
    ImageSize::Dims {
        height: DEFAULT_INPUT_HEIGHT,
        width: DEFAULT_INPUT_WIDTH,
    }
}

fn default_true() -> bool {
    true
}

fn default_rescale_factor() -> f32 {
    1.0 / 255.0
}

fn default_mean() -> [f32; 3] {
    DEFAULT_MEAN
}

fn default_std() -> [f32; 3] {
    DEFAULT_STD
}

/// Image transform settings loaded from `preprocessor_config.json`
#[derive(Debug, Clone, Deserialize)]
pub struct DonutImageConfig {
    #[serde(default = "default_size")]
    pub size: ImageSize,
    #[serde(default = "default_true")]
    pub do_align_long_axis: bool,
    #[serde(default = "default_true")]
    pub do_resize: bool,
    #[serde(default = "default_true")]
    pub do_thumbnail: bool,
    #[serde(default = "default_true")]
    pub do_pad: bool,
    #[serde(default = "default_true")]
    pub do_rescale: bool,
    #[serde(default = "default_rescale_factor")]
    pub rescale_factor: f32,
    #[serde(default = "default_true")]
    pub do_normalize: bool,
    #[serde(default = "default_mean")]
    pub image_mean: [f32; 3],
    #[serde(default = "default_std")]
    pub image_std: [f32; 3],
}

impl Default for DonutImageConfig {
    fn default() -> Self {
        Self {
            size: default_size(),
            do_align_long_axis: true,
            do_resize: true,
            do_thumbnail: true,
            do_pad: true,
            do_rescale: true,
            rescale_factor: default_rescale_factor(),
            do_normalize: true,
            image_mean: DEFAULT_MEAN,
            image_std: DEFAULT_STD,
        }
    }
}

impl DonutImageConfig {
    pub fn target_height(&self) -> u32 {
        self.size.height()
    }

    pub fn target_width(&self) -> u32 {
        self.size.width()
    }
}

/// Run the full Donut transform and return a `[1, 3, H, W]` tensor
pub fn preprocess_for_donut(image: &DynamicImage, config: &DonutImageConfig) -> Array4<f32> {
    let (target_h, target_w) = (config.target_height(), config.target_width());
    let mut img = DynamicImage::ImageRgb8(image.to_rgb8());

    if config.do_align_long_axis {
        img = align_long_axis(img, target_h, target_w);
    }
    if config.do_resize {
        img = resize_shortest_edge(&img, target_h.min(target_w));
    }
    if config.do_thumbnail {
        img = thumbnail(&img, target_h, target_w);
    }
    if config.do_pad {
        img = pad_centered(&img, target_h, target_w);
    }

    debug!(
        "Donut preprocessing: {}x{} -> {}x{}",
        image.width(),
        image.height(),
        img.width(),
        img.height()
    );

    to_normalized_tensor(&img.to_rgb8(), config)
}

/// Rotate 90° clockwise when the image orientation disagrees with the target
pub fn align_long_axis(image: DynamicImage, target_h: u32, target_w: u32) -> DynamicImage {
    let (w, h) = image.dimensions();

    let portrait_target = target_w < target_h;
    let landscape_target = target_w > target_h;
    if (portrait_target && w > h) || (landscape_target && w < h) {
        image.rotate90()
    } else {
        image
    }
}

/// Resize so the shortest edge equals `size`, keeping the aspect ratio
pub fn resize_shortest_edge(image: &DynamicImage, size: u32) -> DynamicImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return image.clone();
    }

    let (new_w, new_h) = if w <= h {
        (size, (size as u64 * h as u64 / w as u64) as u32)
    } else {
        ((size as u64 * w as u64 / h as u64) as u32, size)
    };

    image.resize_exact(new_w.max(1), new_h.max(1), FilterType::Triangle)
}

/// Shrink to fit inside `target_h` x `target_w` keeping the aspect ratio.
/// Never enlarges.
pub fn thumbnail(image: &DynamicImage, target_h: u32, target_w: u32) -> DynamicImage {
    let (in_w, in_h) = image.dimensions();

    let mut height = in_h.min(target_h);
    let mut width = in_w.min(target_w);

    if height == in_h && width == in_w {
        return image.clone();
    }

    if in_h > in_w {
        width = (in_w as u64 * height as u64 / in_h as u64) as u32;
    } else if in_w > in_h {
        height = (in_h as u64 * width as u64 / in_w as u64) as u32;
    }

    image.resize_exact(width.max(1), height.max(1), FilterType::Triangle)
}

/// Centre the image on a black canvas of exactly `target_h` x `target_w`
pub fn pad_centered(image: &DynamicImage, target_h: u32, target_w: u32) -> DynamicImage {
    let rgb = image.to_rgb8();
    let (w, h) = rgb.dimensions();

    let mut output = RgbImage::from_pixel(target_w, target_h, Rgb([0, 0, 0]));
    let offset_x = target_w.saturating_sub(w) / 2;
    let offset_y = target_h.saturating_sub(h) / 2;

    for y in 0..h.min(target_h) {
        for x in 0..w.min(target_w) {
            output.put_pixel(x + offset_x, y + offset_y, *rgb.get_pixel(x, y));
        }
    }

    DynamicImage::ImageRgb8(output)
}

fn to_normalized_tensor(rgb: &RgbImage, config: &DonutImageConfig) -> Array4<f32> {
    let (w, h) = rgb.dimensions();
    let mut tensor = Array4::zeros((1, 3, h as usize, w as usize));

    let scale = if config.do_rescale {
        config.rescale_factor
    } else {
        1.0
    };

    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            let mut value = pixel[c] as f32 * scale;
            if config.do_normalize {
                value = (value - config.image_mean[c]) / config.image_std[c];
            }
            tensor[[0, c, y as usize, x as usize]] = value;
        }
    }

    tensor
}
