// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision module for receipt understanding
//!
//! This module provides:
//! - Image decoding for fetched receipt bytes
//! - The Donut model and processor
//! - The process-wide model holder

pub mod donut;
pub mod image_utils;
pub mod model_holder;

pub use image_utils::{decode_rgb_image, ImageError, ImageInfo};
pub use model_holder::{LoadedModel, ModelConfig, ModelHolder};
