// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Chroma up/down-sampling configuration.
//!
//! Color processing works on 4:4:4 data, so subsampled sources are upsampled on the way in and
//! subsampled targets downsampled on the way out. The filters need to know where the chroma
//! samples sit relative to luma, expressed as offsets in quarter-pixel units.

use crate::surface::ChromaSiting;
use crate::surface::HorizontalSiting;
use crate::surface::SurfaceInfo;
use crate::surface::VerticalSiting;
use crate::PixelFormat;

/// Subsampling of the chroma planes of a format.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChromaPacking {
    Yuv420,
    Yuv422,
    Yuv444,
}

impl ChromaPacking {
    /// Packing of `format`. Formats without chroma subsampling, including RGB and luma-only
    /// formats, are 4:4:4.
    pub fn of(format: PixelFormat) -> Self {
        match format {
            PixelFormat::NV12
            | PixelFormat::P010
            | PixelFormat::P016
            | PixelFormat::I420
            | PixelFormat::YV12 => ChromaPacking::Yuv420,
            PixelFormat::YUY2 | PixelFormat::UYVY | PixelFormat::Y210 | PixelFormat::Y216 => {
                ChromaPacking::Yuv422
            }
            PixelFormat::AYUV
            | PixelFormat::Y410
            | PixelFormat::Y416
            | PixelFormat::ARGB
            | PixelFormat::ABGR
            | PixelFormat::A2R10G10B10
            | PixelFormat::Y8
            | PixelFormat::Y16
            | PixelFormat::Buffer => ChromaPacking::Yuv444,
        }
    }
}

/// Position of the chroma samples relative to the top-left luma sample, in quarter pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChromaOffsets {
    pub horizontal: u32,
    pub vertical: u32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChromaSitingConfig {
    pub upsampling: bool,
    pub downsampling: bool,
    /// Siting of the source after the packing rules have been applied.
    pub source_siting: ChromaSiting,
    /// Siting of the target after the packing rules have been applied.
    pub target_siting: ChromaSiting,
    pub upsampling_offsets: ChromaOffsets,
    pub downsampling_offsets: ChromaOffsets,
}

/// Siting actually used for a surface: the declared one for 4:2:0, with the vertical position
/// forced to the top for 4:2:2 (chroma is present on every line) and co-sited for 4:4:4.
pub fn effective_siting(info: &SurfaceInfo) -> ChromaSiting {
    let declared = info.chroma_siting.unwrap_or_default();

    match ChromaPacking::of(info.format) {
        ChromaPacking::Yuv420 => declared,
        ChromaPacking::Yuv422 => ChromaSiting::new(declared.horizontal, VerticalSiting::Top),
        ChromaPacking::Yuv444 => ChromaSiting::LEFT_TOP,
    }
}

/// Offsets of one of the six siting types. With `deinterlace`, the vertical offset is relative to
/// a field, whose lines are twice as far apart as those of the frame.
pub fn siting_offsets(siting: ChromaSiting, deinterlace: bool) -> ChromaOffsets {
    let horizontal = match siting.horizontal {
        HorizontalSiting::Left => 0,
        HorizontalSiting::Center => 2,
    };

    let vertical = match (siting.vertical, deinterlace) {
        (VerticalSiting::Top, _) => 0,
        (VerticalSiting::Center, false) => 2,
        (VerticalSiting::Bottom, false) => 4,
        (VerticalSiting::Center, true) => 1,
        (VerticalSiting::Bottom, true) => 2,
    };

    ChromaOffsets {
        horizontal,
        vertical,
    }
}

/// Derives the chroma sampling configuration for processing `src` into `dst`.
///
/// Upsampling is only needed when color processing runs on a subsampled source; downsampling
/// only when color processing writes a subsampled target. The deinterlace-specific offsets only
/// apply to upsampling, as the output of the vebox is always progressive.
pub fn derive_chroma_siting(
    src: &SurfaceInfo,
    dst: &SurfaceInfo,
    deinterlace: bool,
    color_processing: bool,
) -> ChromaSitingConfig {
    let source_siting = effective_siting(src);
    let target_siting = effective_siting(dst);

    let upsampling = color_processing && ChromaPacking::of(src.format) != ChromaPacking::Yuv444;
    let downsampling = color_processing && ChromaPacking::of(dst.format) != ChromaPacking::Yuv444;

    ChromaSitingConfig {
        upsampling,
        downsampling,
        source_siting,
        target_siting,
        upsampling_offsets: if upsampling {
            siting_offsets(source_siting, deinterlace)
        } else {
            Default::default()
        },
        downsampling_offsets: if downsampling {
            siting_offsets(target_siting, false)
        } else {
            Default::default()
        },
    }
}
