// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Resource backends.
//!
//! A backend provides the GPU memory the vebox pipeline works with, most likely through a driver
//! API like VAAPI. The pipeline only needs a narrow set of capabilities from it, expressed by the
//! traits of this module, so it can run on top of any driver and be tested in isolation.

#[cfg(test)]
pub(crate) mod dummy;
#[cfg(feature = "vaapi")]
pub mod vaapi;

use crate::surface::Compression;
use crate::surface::Surface;
use crate::surface::SurfaceInfo;
use crate::surface::SurfaceKind;
use crate::surface::TileMode;
use crate::PixelFormat;
use crate::Resolution;

/// Parameters of a surface allocation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AllocationRequest {
    /// What the surface will be used for. Backends may use it for naming or usage hints.
    pub kind: SurfaceKind,
    pub resolution: Resolution,
    pub format: PixelFormat,
    pub tile_mode: TileMode,
    pub compression: Compression,
}

impl AllocationRequest {
    /// Returns `true` if a surface described by `info` can be used as-is to satisfy this request.
    ///
    /// The compression state is part of the comparison: a surface cannot change its compression
    /// state without being reallocated.
    pub fn is_satisfied_by(&self, info: &SurfaceInfo) -> bool {
        info.resolution == self.resolution
            && info.format == self.format
            && info.tile_mode == self.tile_mode
            && info.compression == self.compression
    }
}

/// Allocator of GPU surfaces.
pub trait ResourceAllocator {
    /// Backend object owning the memory of a surface.
    type Handle;

    /// Allocate a new surface fulfilling `request`.
    fn allocate(&mut self, request: &AllocationRequest) -> anyhow::Result<Surface<Self::Handle>>;

    /// Release the memory of `surface`.
    fn free(&mut self, surface: Surface<Self::Handle>);

    /// Set every byte of `surface` to `value`.
    fn fill(&mut self, surface: &mut Surface<Self::Handle>, value: u8) -> anyhow::Result<()>;
}

/// Runtime query of the memory compression capabilities of the platform.
pub trait CompressionCaps {
    /// Whether surfaces of `format` can be compressed.
    fn is_format_compression_supported(&self, format: PixelFormat) -> bool;

    /// Whether memory compression is enabled at all on this platform.
    fn is_global_compression_enabled(&self) -> bool;
}

/// Compression capabilities of a platform without memory compression.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCompression;

impl CompressionCaps for NoCompression {
    fn is_format_compression_supported(&self, _: PixelFormat) -> bool {
        false
    }

    fn is_global_compression_enabled(&self) -> bool {
        false
    }
}

/// A trait for backend handles whose memory can be written from the CPU.
pub trait WritableHandle {
    /// Write `data` into the surface memory, starting at byte `offset`.
    fn write(&mut self, offset: usize, data: &[u8]) -> anyhow::Result<()>;
}
