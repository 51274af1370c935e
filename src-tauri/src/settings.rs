//! Settings form bindings: the aspect-ratio coupling between width and
//! height, numeric field parsing and which controls a codec shows.

use std::str::FromStr;

use serde::Serialize;

use crate::codec::{Codec, CodecGroup};
use crate::error::{ConvertError, Result};
use crate::options::{ConversionOptions, Dimensions};

pub const FPS_CHOICES: [u32; 4] = [5, 10, 15, 20];

/// GIF quality levels; lower samples more pixels and looks better.
pub const QUALITY_CHOICES: [(u8, &str); 4] = [
    (1, "Best"),
    (5, "High"),
    (10, "Standard"),
    (20, "Low"),
];

pub const BITRATE_CHOICES: [(u32, &str); 4] = [
    (500_000, "500 Kbps"),
    (1_000_000, "1 Mbps"),
    (2_000_000, "2 Mbps"),
    (5_000_000, "5 Mbps"),
];

/// Parse a numeric form field. Blank input is "unset", never zero.
pub fn parse_field<T: FromStr>(field: &'static str, raw: &str) -> Result<Option<T>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConvertError::InvalidField {
            field,
            value: raw.to_string(),
        })
}

fn scale(value: u32, numerator: u32, denominator: u32) -> u32 {
    (value as f64 * numerator as f64 / denominator as f64).round() as u32
}

fn usable(natural: Option<Dimensions>) -> Option<Dimensions> {
    natural.filter(|dims| !dims.is_empty())
}

pub fn set_width(
    options: &mut ConversionOptions,
    width: Option<u32>,
    aspect_lock: bool,
    natural: Option<Dimensions>,
) {
    options.width = width;
    if !aspect_lock {
        return;
    }
    if let (Some(width), Some(natural)) = (width, usable(natural)) {
        options.height = Some(scale(width, natural.height, natural.width));
    }
}

pub fn set_height(
    options: &mut ConversionOptions,
    height: Option<u32>,
    aspect_lock: bool,
    natural: Option<Dimensions>,
) {
    options.height = height;
    if !aspect_lock {
        return;
    }
    if let (Some(height), Some(natural)) = (height, usable(natural)) {
        options.width = Some(scale(height, natural.width, natural.height));
    }
}

/// Controls the form shows for a codec. Hidden controls keep their values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleParams {
    pub resolution: bool,
    pub bitrate: bool,
    pub fps: bool,
    pub quality: bool,
}

pub fn visible_params(codec: Codec) -> VisibleParams {
    match codec.group() {
        CodecGroup::Image => VisibleParams {
            resolution: true,
            bitrate: false,
            fps: true,
            quality: true,
        },
        CodecGroup::Video => VisibleParams {
            resolution: true,
            bitrate: true,
            fps: false,
            quality: false,
        },
        CodecGroup::Audio => VisibleParams {
            resolution: false,
            bitrate: true,
            fps: false,
            quality: false,
        },
    }
}
