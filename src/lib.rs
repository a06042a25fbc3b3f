// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Control logic for a fixed-function video enhancement engine (the "vebox").
//!
//! The crate decides which hardware path processes a frame, keeps the auxiliary surfaces that
//! path needs alive, derives the denoise/deinterlace/chroma parameters and finally produces a
//! [`vebox::FrameDescriptor`] that a command encoder can translate into hardware commands.
//!
//! Resource allocation, command encoding and the scaling/composition renderers are provided by
//! the caller through the traits in [`backend`] and [`vebox::pipe`].

pub mod backend;
pub mod surface;
pub mod utils;
pub mod vebox;

use std::str::FromStr;

#[cfg(feature = "vaapi")]
pub use libva;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<(u32, u32)> for Resolution {
    fn from(value: (u32, u32)) -> Self {
        Self {
            width: value.0,
            height: value.1,
        }
    }
}

impl From<Resolution> for (u32, u32) {
    fn from(value: Resolution) -> Self {
        (value.width, value.height)
    }
}

/// A rectangle in pixel coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering all of a surface of size `resolution`.
    pub fn full(resolution: Resolution) -> Self {
        Self::new(0, 0, resolution.width, resolution.height)
    }

    pub fn size(&self) -> Resolution {
        Resolution::from((self.width, self.height))
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// Whether `self` lies entirely within a surface of size `resolution`.
    pub fn fits_in(&self, resolution: Resolution) -> bool {
        self.right() <= resolution.width as u64 && self.bottom() <= resolution.height as u64
    }
}

/// Pixel formats the post-processing pipeline knows about.
///
/// `Buffer` designates linear, untyped memory such as the statistics or LUT surfaces.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PixelFormat {
    NV12,
    P010,
    P016,
    I420,
    YV12,
    YUY2,
    UYVY,
    Y210,
    Y216,
    AYUV,
    Y410,
    Y416,
    ARGB,
    ABGR,
    A2R10G10B10,
    Y8,
    Y16,
    Buffer,
}

impl PixelFormat {
    pub fn is_rgb(&self) -> bool {
        matches!(
            self,
            PixelFormat::ARGB | PixelFormat::ABGR | PixelFormat::A2R10G10B10
        )
    }

    /// Whether the format carries chroma samples at all.
    pub fn has_chroma(&self) -> bool {
        !matches!(self, PixelFormat::Y8 | PixelFormat::Y16 | PixelFormat::Buffer)
    }
}

impl FromStr for PixelFormat {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nv12" | "NV12" => Ok(PixelFormat::NV12),
            "p010" | "P010" => Ok(PixelFormat::P010),
            "p016" | "P016" => Ok(PixelFormat::P016),
            "i420" | "I420" => Ok(PixelFormat::I420),
            "yv12" | "YV12" => Ok(PixelFormat::YV12),
            "yuy2" | "YUY2" => Ok(PixelFormat::YUY2),
            "uyvy" | "UYVY" => Ok(PixelFormat::UYVY),
            "y210" | "Y210" => Ok(PixelFormat::Y210),
            "y216" | "Y216" => Ok(PixelFormat::Y216),
            "ayuv" | "AYUV" => Ok(PixelFormat::AYUV),
            "y410" | "Y410" => Ok(PixelFormat::Y410),
            "y416" | "Y416" => Ok(PixelFormat::Y416),
            "argb" | "ARGB" => Ok(PixelFormat::ARGB),
            "abgr" | "ABGR" => Ok(PixelFormat::ABGR),
            "a2r10g10b10" | "A2R10G10B10" => Ok(PixelFormat::A2R10G10B10),
            "y8" | "Y8" => Ok(PixelFormat::Y8),
            "y16" | "Y16" => Ok(PixelFormat::Y16),
            _ => Err(concat!(
                "unrecognized pixel format. Valid values: nv12, p010, p016, i420, yv12, yuy2, ",
                "uyvy, y210, y216, ayuv, y410, y416, argb, abgr, a2r10g10b10, y8, y16"
            )),
        }
    }
}
