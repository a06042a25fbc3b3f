// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! This file contains a dummy backend whose only purpose is to let the vebox pipeline run so we
//! can test it in isolation.

use std::collections::BTreeSet;

use anyhow::anyhow;

use crate::backend::AllocationRequest;
use crate::backend::CompressionCaps;
use crate::backend::ResourceAllocator;
use crate::backend::WritableHandle;
use crate::surface::Surface;
use crate::surface::SurfaceInfo;
use crate::surface::SurfaceKind;
use crate::PixelFormat;

#[derive(Debug)]
pub struct Handle {
    pub id: u64,
    /// Value of the last `fill` applied to the surface.
    pub fill_value: Option<u8>,
    /// Bytes written through `WritableHandle`.
    pub data: Vec<u8>,
}

impl WritableHandle for Handle {
    fn write(&mut self, offset: usize, data: &[u8]) -> anyhow::Result<()> {
        let end = offset + data.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[offset..end].copy_from_slice(data);
        Ok(())
    }
}

fn bytes_per_pixel(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::NV12
        | PixelFormat::I420
        | PixelFormat::YV12
        | PixelFormat::Y8
        | PixelFormat::Buffer => 1,
        PixelFormat::P010 | PixelFormat::P016 | PixelFormat::YUY2 | PixelFormat::UYVY => 2,
        PixelFormat::Y16 => 2,
        PixelFormat::Y210 | PixelFormat::Y216 => 4,
        PixelFormat::AYUV
        | PixelFormat::Y410
        | PixelFormat::ARGB
        | PixelFormat::ABGR
        | PixelFormat::A2R10G10B10 => 4,
        PixelFormat::Y416 => 8,
    }
}

/// Allocator handing out fake surfaces, with optional failure injection.
#[derive(Default)]
pub(crate) struct Allocator {
    next_id: u64,
    live: BTreeSet<u64>,
    /// Total number of successful allocations.
    pub allocations: usize,
    /// Allocations of this kind fail.
    pub fail_on: Option<SurfaceKind>,
    /// Fill operations fail.
    pub fail_fill: bool,
}

impl Allocator {
    pub fn new() -> Self {
        Default::default()
    }

    /// Number of surfaces currently allocated and not freed.
    pub fn num_live(&self) -> usize {
        self.live.len()
    }
}

impl ResourceAllocator for Allocator {
    type Handle = Handle;

    fn allocate(&mut self, request: &AllocationRequest) -> anyhow::Result<Surface<Handle>> {
        if self.fail_on == Some(request.kind) {
            return Err(anyhow!("injected allocation failure for {:?}", request.kind));
        }

        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id);
        self.allocations += 1;

        let mut info = SurfaceInfo::new(request.resolution, request.format);
        info.pitch = request.resolution.width * bytes_per_pixel(request.format);
        info.tile_mode = request.tile_mode;
        info.compression = request.compression;

        Ok(Surface::new(
            info,
            Handle {
                id,
                fill_value: None,
                data: Vec::new(),
            },
        ))
    }

    fn free(&mut self, surface: Surface<Handle>) {
        let was_live = self.live.remove(&surface.handle.id);
        assert!(was_live, "double free of surface {}", surface.handle.id);
    }

    fn fill(&mut self, surface: &mut Surface<Handle>, value: u8) -> anyhow::Result<()> {
        if self.fail_fill {
            return Err(anyhow!("injected fill failure"));
        }
        surface.handle.fill_value = Some(value);
        Ok(())
    }
}

/// Compression capabilities with fixed answers.
#[derive(Clone, Copy)]
pub(crate) struct Compression {
    pub global: bool,
    pub formats: bool,
}

impl CompressionCaps for Compression {
    fn is_format_compression_supported(&self, format: PixelFormat) -> bool {
        self.formats && format != PixelFormat::Buffer
    }

    fn is_global_compression_enabled(&self) -> bool {
        self.global
    }
}

/// Builds a caller-owned surface that does not come from any allocator.
pub(crate) fn external_surface(id: u64, info: SurfaceInfo) -> Surface<Handle> {
    Surface::new(
        info,
        Handle {
            id,
            fill_value: None,
            data: Vec::new(),
        },
    )
}
