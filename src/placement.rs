//! Canvas placement: how source media is scaled, positioned and cropped on a
//! differently shaped target canvas before the service fills the remainder.
//!
//! Everything here is deterministic integer geometry. Caller overrides are
//! validated, never clamped.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Output aspect ratios accepted by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[default]
    #[serde(rename = "16:9")]
    Landscape16x9,
    #[serde(rename = "9:21")]
    Portrait9x21,
    #[serde(rename = "21:9")]
    Landscape21x9,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 7] = [
        AspectRatio::Square,
        AspectRatio::Portrait3x4,
        AspectRatio::Landscape4x3,
        AspectRatio::Portrait9x16,
        AspectRatio::Landscape16x9,
        AspectRatio::Portrait9x21,
        AspectRatio::Landscape21x9,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Landscape16x9 => "16:9",
            AspectRatio::Portrait9x21 => "9:21",
            AspectRatio::Landscape21x9 => "21:9",
        }
    }

    /// Canonical output size for this ratio (1080 px on the short side)
    pub fn canvas(&self) -> CanvasSize {
        let (width, height) = match self {
            AspectRatio::Square => (1080, 1080),
            AspectRatio::Portrait3x4 => (1080, 1440),
            AspectRatio::Landscape4x3 => (1440, 1080),
            AspectRatio::Portrait9x16 => (1080, 1920),
            AspectRatio::Landscape16x9 => (1920, 1080),
            AspectRatio::Portrait9x21 => (1080, 2520),
            AspectRatio::Landscape21x9 => (2520, 1080),
        };
        CanvasSize { width, height }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = PlacementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == s.trim())
            .ok_or_else(|| PlacementError::UnknownAspectRatio(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::X => "x",
            Axis::Y => "y",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("unsupported aspect ratio '{0}'")]
    UnknownAspectRatio(String),

    #[error("source dimensions must be positive, got {width}x{height}")]
    InvalidSource { width: u32, height: u32 },

    #[error("resized dimensions must be positive, got {width}x{height}")]
    InvalidResize { width: u32, height: u32 },

    #[error("crop {axis}_start ({start}) is greater than {axis}_end ({end})")]
    CropInverted { axis: Axis, start: u32, end: u32 },

    #[error("crop {axis}_end ({end}) exceeds resized extent ({extent})")]
    CropOutOfBounds { axis: Axis, end: u32, extent: u32 },

    #[error("grid_position_{axis} ({position}) places {extent}px of content entirely off a {canvas}px canvas")]
    OffCanvas {
        axis: Axis,
        position: i64,
        extent: u32,
        canvas: u32,
    },
}

/// Visible window of the resized content, in resized pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropBounds {
    pub x_start: u32,
    pub x_end: u32,
    pub y_start: u32,
    pub y_end: u32,
}

/// Caller-supplied values that replace the derived ones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct PlacementOverrides {
    pub resized_width: Option<u32>,
    pub resized_height: Option<u32>,
    pub grid_position_x: Option<i64>,
    pub grid_position_y: Option<i64>,
    pub x_start: Option<u32>,
    pub x_end: Option<u32>,
    pub y_start: Option<u32>,
    pub y_end: Option<u32>,
}

impl PlacementOverrides {
    pub fn is_empty(&self) -> bool {
        *self == PlacementOverrides::default()
    }
}

/// Resolved geometry handed to the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasPlacement {
    pub source_width: u32,
    pub source_height: u32,
    pub target_aspect_ratio: AspectRatio,
    pub canvas: CanvasSize,
    pub resized_width: u32,
    pub resized_height: u32,
    pub grid_position_x: i64,
    pub grid_position_y: i64,
    pub crop_bounds: CropBounds,
}

impl CanvasPlacement {
    pub fn compute(
        source_width: u32,
        source_height: u32,
        target_aspect_ratio: AspectRatio,
        overrides: &PlacementOverrides,
    ) -> Result<Self, PlacementError> {
        if source_width == 0 || source_height == 0 {
            return Err(PlacementError::InvalidSource {
                width: source_width,
                height: source_height,
            });
        }

        let canvas = target_aspect_ratio.canvas();
        let (resized_width, resized_height) =
            resolve_resize(source_width, source_height, canvas, overrides);

        if resized_width == 0 || resized_height == 0 {
            return Err(PlacementError::InvalidResize {
                width: resized_width,
                height: resized_height,
            });
        }

        let grid_position_x = overrides
            .grid_position_x
            .unwrap_or_else(|| centered(canvas.width, resized_width));
        let grid_position_y = overrides
            .grid_position_y
            .unwrap_or_else(|| centered(canvas.height, resized_height));

        let crop_bounds = CropBounds {
            x_start: overrides.x_start.unwrap_or(0),
            x_end: overrides.x_end.unwrap_or(resized_width),
            y_start: overrides.y_start.unwrap_or(0),
            y_end: overrides.y_end.unwrap_or(resized_height),
        };

        let placement = Self {
            source_width,
            source_height,
            target_aspect_ratio,
            canvas,
            resized_width,
            resized_height,
            grid_position_x,
            grid_position_y,
            crop_bounds,
        };
        placement.validate()?;
        Ok(placement)
    }

    fn validate(&self) -> Result<(), PlacementError> {
        let crop = &self.crop_bounds;
        check_axis(Axis::X, crop.x_start, crop.x_end, self.resized_width)?;
        check_axis(Axis::Y, crop.y_start, crop.y_end, self.resized_height)?;
        check_position(Axis::X, self.grid_position_x, self.resized_width, self.canvas.width)?;
        check_position(Axis::Y, self.grid_position_y, self.resized_height, self.canvas.height)
    }

    /// True when the content covers the whole canvas and nothing is left to fill
    pub fn covers_canvas(&self) -> bool {
        let crop = &self.crop_bounds;
        let left = self.grid_position_x + i64::from(crop.x_start);
        let top = self.grid_position_y + i64::from(crop.y_start);
        let right = self.grid_position_x + i64::from(crop.x_end);
        let bottom = self.grid_position_y + i64::from(crop.y_end);
        left <= 0
            && top <= 0
            && right >= i64::from(self.canvas.width)
            && bottom >= i64::from(self.canvas.height)
    }
}

fn resolve_resize(
    source_width: u32,
    source_height: u32,
    canvas: CanvasSize,
    overrides: &PlacementOverrides,
) -> (u32, u32) {
    let (sw, sh) = (u64::from(source_width), u64::from(source_height));
    match (overrides.resized_width, overrides.resized_height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scale(u64::from(w), sh, sw)),
        (None, Some(h)) => (scale(u64::from(h), sw, sh), h),
        (None, None) => {
            let (cw, ch) = (u64::from(canvas.width), u64::from(canvas.height));
            // Compare sw/sh against cw/ch without floats
            if sw * ch >= sh * cw {
                (canvas.width, scale(cw, sh, sw).max(1))
            } else {
                (scale(ch, sw, sh).max(1), canvas.height)
            }
        }
    }
}

/// `value * num / den`, rounded half up
fn scale(value: u64, num: u64, den: u64) -> u32 {
    let scaled = (value * num + den / 2) / den;
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

fn centered(canvas: u32, resized: u32) -> i64 {
    (i64::from(canvas) - i64::from(resized)).div_euclid(2)
}

fn check_axis(axis: Axis, start: u32, end: u32, extent: u32) -> Result<(), PlacementError> {
    if start > end {
        return Err(PlacementError::CropInverted { axis, start, end });
    }
    if end > extent {
        return Err(PlacementError::CropOutOfBounds { axis, end, extent });
    }
    Ok(())
}

fn check_position(axis: Axis, position: i64, extent: u32, canvas: u32) -> Result<(), PlacementError> {
    if position < -i64::from(extent) || position > i64::from(canvas) {
        return Err(PlacementError::OffCanvas {
            axis,
            position,
            extent,
            canvas,
        });
    }
    Ok(())
}
