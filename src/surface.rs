// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! GPU surface description shared by the pipeline and its backends.

use crate::PixelFormat;
use crate::Resolution;

/// Memory tiling of a surface.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TileMode {
    Linear,
    TileX,
    #[default]
    TileY,
    Tile4,
}

/// Lossless memory compression scheme applied to a surface.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompressionMode {
    #[default]
    None,
    Horizontal,
    Vertical,
    /// Render-engine compression.
    Render,
    /// Media-engine compression.
    Media,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Compression {
    pub enabled: bool,
    pub mode: CompressionMode,
}

impl Compression {
    pub const DISABLED: Self = Self {
        enabled: false,
        mode: CompressionMode::None,
    };

    pub fn enabled(mode: CompressionMode) -> Self {
        Self {
            enabled: true,
            mode,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    Bt601,
    Bt601FullRange,
    #[default]
    Bt709,
    Bt709FullRange,
    Bt2020,
    Bt2020FullRange,
    Srgb,
}

/// How the lines of a surface map to video fields.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SampleType {
    #[default]
    Progressive,
    /// Both fields interleaved in one frame, top field first.
    InterleavedTopFirst,
    /// Both fields interleaved in one frame, bottom field first.
    InterleavedBottomFirst,
    SingleTopField,
    SingleBottomField,
}

impl SampleType {
    pub fn is_interlaced(&self) -> bool {
        !matches!(self, SampleType::Progressive)
    }

    pub fn is_single_field(&self) -> bool {
        matches!(self, SampleType::SingleTopField | SampleType::SingleBottomField)
    }

    pub fn top_field_first(&self) -> bool {
        matches!(
            self,
            SampleType::InterleavedTopFirst | SampleType::SingleTopField
        )
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum HorizontalSiting {
    #[default]
    Left,
    Center,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum VerticalSiting {
    Top,
    #[default]
    Center,
    Bottom,
}

/// Position of chroma samples relative to luma samples.
///
/// The default is the MPEG-2 convention for 4:2:0 content: horizontally co-sited with the left
/// luma sample, vertically between the two luma lines.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChromaSiting {
    pub horizontal: HorizontalSiting,
    pub vertical: VerticalSiting,
}

impl ChromaSiting {
    pub const LEFT_TOP: Self = Self {
        horizontal: HorizontalSiting::Left,
        vertical: VerticalSiting::Top,
    };

    pub fn new(horizontal: HorizontalSiting, vertical: VerticalSiting) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }
}

/// Attributes of a surface, independent of the backend object holding its memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SurfaceInfo {
    pub resolution: Resolution,
    /// Bytes per line of the first plane.
    pub pitch: u32,
    pub format: PixelFormat,
    pub tile_mode: TileMode,
    pub compression: Compression,
    pub color_space: ColorSpace,
    pub sample_type: SampleType,
    /// Chroma siting declared by the producer of the surface, if any.
    pub chroma_siting: Option<ChromaSiting>,
    /// Position of the frame in its sequence.
    pub frame_id: u64,
}

impl SurfaceInfo {
    pub fn new(resolution: Resolution, format: PixelFormat) -> Self {
        Self {
            resolution,
            pitch: 0,
            format,
            tile_mode: Default::default(),
            compression: Compression::DISABLED,
            color_space: Default::default(),
            sample_type: SampleType::Progressive,
            chroma_siting: None,
            frame_id: 0,
        }
    }
}

/// A GPU-resident image or buffer: its attributes and the backend handle that owns its memory.
#[derive(Debug)]
pub struct Surface<H> {
    pub info: SurfaceInfo,
    pub handle: H,
}

impl<H> Surface<H> {
    pub fn new(info: SurfaceInfo, handle: H) -> Self {
        Self { info, handle }
    }

    pub fn resolution(&self) -> Resolution {
        self.info.resolution
    }
}

/// The auxiliary surfaces the vebox needs besides the caller's input and output.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SurfaceKind {
    /// Denoised current frame (FFDN). Double-buffered: the previous frame's output is the
    /// denoise history of the current one.
    Denoised,
    /// Spatial-temporal motion measure (STMM). Double-buffered history in/out.
    MotionHistory,
    /// Deinterlaced or intermediate output (FFDI). Double-buffered field pair.
    Deinterlaced,
    /// Per-block and per-frame statistics written by the hardware.
    Statistics,
    /// Luma histogram used by adaptive contrast enhancement.
    Histogram,
    /// 3D lookup table used by HDR tone mapping.
    Lut3d,
}

impl SurfaceKind {
    /// Whether surfaces of this kind alternate between two slots from frame to frame.
    pub fn is_double_buffered(&self) -> bool {
        matches!(
            self,
            SurfaceKind::Denoised | SurfaceKind::MotionHistory | SurfaceKind::Deinterlaced
        )
    }
}
