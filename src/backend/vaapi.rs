// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! VAAPI backend, allocating the vebox surfaces as VA surfaces.
//!
//! VAAPI has no notion of untyped buffers, so `Buffer` surfaces (statistics, histogram, LUT) are
//! allocated as single-plane 8-bit luma surfaces with one byte per pixel, folded into rows no
//! wider than [`MAX_BUFFER_WIDTH`]. Tiling and compression are decided by the driver and only
//! recorded in the surface attributes.

use std::rc::Rc;

use anyhow::anyhow;
use libva::Display;
use libva::UsageHint;
use libva::VAImageFormat;

use crate::backend::AllocationRequest;
use crate::backend::ResourceAllocator;
use crate::backend::WritableHandle;
use crate::surface::Surface;
use crate::surface::SurfaceInfo;
use crate::utils::align_up;
use crate::PixelFormat;
use crate::Resolution;

/// Widest VA surface a buffer is allocated as. Drivers reject wider surfaces.
pub const MAX_BUFFER_WIDTH: u32 = 16384;
const BUFFER_WIDTH_ALIGN: u32 = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct FormatMap {
    pub rt_format: u32,
    pub va_fourcc: u32,
    pub format: PixelFormat,
}

/// Maps each pixel format to the VA RT format and fourcc used to allocate it.
const FORMAT_MAP: [FormatMap; 18] = [
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_YUV420,
        va_fourcc: libva::VA_FOURCC_NV12,
        format: PixelFormat::NV12,
    },
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_YUV420_10,
        va_fourcc: libva::VA_FOURCC_P010,
        format: PixelFormat::P010,
    },
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_YUV420_12,
        va_fourcc: libva::VA_FOURCC_P016,
        format: PixelFormat::P016,
    },
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_YUV420,
        va_fourcc: libva::VA_FOURCC_I420,
        format: PixelFormat::I420,
    },
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_YUV420,
        va_fourcc: libva::VA_FOURCC_YV12,
        format: PixelFormat::YV12,
    },
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_YUV422,
        va_fourcc: libva::VA_FOURCC_YUY2,
        format: PixelFormat::YUY2,
    },
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_YUV422,
        va_fourcc: libva::VA_FOURCC_UYVY,
        format: PixelFormat::UYVY,
    },
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_YUV422_10,
        va_fourcc: libva::VA_FOURCC_Y210,
        format: PixelFormat::Y210,
    },
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_YUV422_12,
        va_fourcc: libva::VA_FOURCC_Y216,
        format: PixelFormat::Y216,
    },
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_YUV444,
        va_fourcc: libva::VA_FOURCC_AYUV,
        format: PixelFormat::AYUV,
    },
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_YUV444_10,
        va_fourcc: libva::VA_FOURCC_Y410,
        format: PixelFormat::Y410,
    },
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_YUV444_12,
        va_fourcc: libva::VA_FOURCC_Y416,
        format: PixelFormat::Y416,
    },
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_RGB32,
        va_fourcc: libva::VA_FOURCC_ARGB,
        format: PixelFormat::ARGB,
    },
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_RGB32,
        va_fourcc: libva::VA_FOURCC_ABGR,
        format: PixelFormat::ABGR,
    },
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_RGB32_10,
        va_fourcc: libva::VA_FOURCC_A2R10G10B10,
        format: PixelFormat::A2R10G10B10,
    },
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_YUV400,
        va_fourcc: libva::VA_FOURCC_Y800,
        format: PixelFormat::Y8,
    },
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_YUV400,
        va_fourcc: libva::VA_FOURCC_Y16,
        format: PixelFormat::Y16,
    },
    FormatMap {
        rt_format: libva::VA_RT_FORMAT_YUV400,
        va_fourcc: libva::VA_FOURCC_Y800,
        format: PixelFormat::Buffer,
    },
];

/// Returns the extent of the VA surface holding `request`.
///
/// Buffers of `width * height` bytes are laid out row after row in a surface of at most
/// [`MAX_BUFFER_WIDTH`] bytes per line.
fn surface_extent(request: &AllocationRequest) -> Resolution {
    if request.format != PixelFormat::Buffer {
        return request.resolution;
    }

    let size = request.resolution.area();
    let width = align_up(
        size.clamp(1, MAX_BUFFER_WIDTH as u64) as u32,
        BUFFER_WIDTH_ALIGN,
    );
    let height = size.div_ceil(width as u64).max(1) as u32;

    Resolution::from((width, height))
}

fn format_map(format: PixelFormat) -> anyhow::Result<&'static FormatMap> {
    FORMAT_MAP
        .iter()
        .find(|map| map.format == format)
        .ok_or_else(|| anyhow!("no VA format for {:?}", format))
}

/// A VA surface allocated for the vebox, along with what is needed to map it.
pub struct VaSurfaceHandle {
    surface: libva::Surface<()>,
    image_format: VAImageFormat,
    /// Bytes of the first plane that can be written, without line padding.
    len: usize,
}

impl VaSurfaceHandle {
    pub fn surface(&self) -> &libva::Surface<()> {
        &self.surface
    }

    fn map(&self) -> anyhow::Result<libva::Image<'_>> {
        libva::Image::create_from(
            &self.surface,
            self.image_format,
            self.surface.size(),
            self.surface.size(),
        )
        .map_err(|e| anyhow!("failed to map VA surface {}: {:?}", self.surface.id(), e))
    }
}

impl WritableHandle for VaSurfaceHandle {
    /// Writes `data` at `offset`, counted in bytes of the first plane without line padding.
    fn write(&mut self, offset: usize, data: &[u8]) -> anyhow::Result<()> {
        if offset + data.len() > self.len {
            return Err(anyhow!(
                "write of {} bytes at {} exceeds surface of {} bytes",
                data.len(),
                offset,
                self.len
            ));
        }

        let width = self.surface.size().0 as usize;
        let mut image = self.map()?;
        let va_image = *image.image();
        let pitch = va_image.pitches[0] as usize;
        let plane_offset = va_image.offsets[0] as usize;
        let dest = image.as_mut();

        let mut pos = offset;
        let mut src = data;
        while !src.is_empty() {
            let (row, col) = (pos / width, pos % width);
            let len = src.len().min(width - col);
            let start = plane_offset + row * pitch + col;
            let line = dest.get_mut(start..start + len).ok_or_else(|| {
                anyhow!(
                    "write of {} bytes at {} exceeds surface",
                    data.len(),
                    offset
                )
            })?;

            line.copy_from_slice(&src[..len]);
            src = &src[len..];
            pos += len;
        }

        Ok(())
    }
}

/// Allocator of VA surfaces.
pub struct VaapiAllocator {
    display: Rc<Display>,
    image_formats: Vec<VAImageFormat>,
}

impl VaapiAllocator {
    pub fn new(display: Rc<Display>) -> anyhow::Result<Self> {
        let image_formats = display.query_image_formats()?;

        Ok(Self {
            display,
            image_formats,
        })
    }

    fn image_format(&self, va_fourcc: u32) -> anyhow::Result<VAImageFormat> {
        self.image_formats
            .iter()
            .find(|f| f.fourcc == va_fourcc)
            .copied()
            .ok_or_else(|| anyhow!("VA image format {:#x} not supported by driver", va_fourcc))
    }
}

impl ResourceAllocator for VaapiAllocator {
    type Handle = VaSurfaceHandle;

    fn allocate(
        &mut self,
        request: &AllocationRequest,
    ) -> anyhow::Result<Surface<VaSurfaceHandle>> {
        let map = format_map(request.format)?;
        let image_format = self.image_format(map.va_fourcc)?;
        let extent = surface_extent(request);

        let mut surfaces = self.display.create_surfaces(
            map.rt_format,
            Some(map.va_fourcc),
            extent.width,
            extent.height,
            Some(UsageHint::USAGE_HINT_VPP_READ | UsageHint::USAGE_HINT_VPP_WRITE),
            vec![()],
        )?;
        let surface = surfaces
            .pop()
            .ok_or_else(|| anyhow!("driver returned no surface"))?;

        log::debug!(
            "Created VA surface {} of {:?} for {:?}: {:?} {:?}",
            surface.id(),
            extent,
            request.kind,
            request.resolution,
            request.format
        );

        let handle = VaSurfaceHandle {
            surface,
            image_format,
            len: request.resolution.area() as usize,
        };
        let pitch = handle.map()?.image().pitches[0];

        let mut info = SurfaceInfo::new(request.resolution, request.format);
        info.pitch = pitch;
        info.tile_mode = request.tile_mode;
        info.compression = request.compression;

        Ok(Surface::new(info, handle))
    }

    fn free(&mut self, surface: Surface<VaSurfaceHandle>) {
        log::debug!("Destroying VA surface {}", surface.handle.surface.id());
        // The VA surface is destroyed when dropped.
        drop(surface);
    }

    fn fill(&mut self, surface: &mut Surface<VaSurfaceHandle>, value: u8) -> anyhow::Result<()> {
        let mut image = surface.handle.map()?;
        image.as_mut().fill(value);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::AllocationRequest;
    use crate::surface::Compression;
    use crate::surface::SurfaceKind;
    use crate::surface::TileMode;
    use crate::Resolution;

    #[test]
    fn every_format_is_mapped() {
        for format in [
            PixelFormat::NV12,
            PixelFormat::P010,
            PixelFormat::P016,
            PixelFormat::I420,
            PixelFormat::YV12,
            PixelFormat::YUY2,
            PixelFormat::UYVY,
            PixelFormat::Y210,
            PixelFormat::Y216,
            PixelFormat::AYUV,
            PixelFormat::Y410,
            PixelFormat::Y416,
            PixelFormat::ARGB,
            PixelFormat::ABGR,
            PixelFormat::A2R10G10B10,
            PixelFormat::Y8,
            PixelFormat::Y16,
            PixelFormat::Buffer,
        ] {
            assert_eq!(format_map(format).unwrap().format, format);
        }
    }

    fn buffer_request(kind: SurfaceKind, width: u32, height: u32) -> AllocationRequest {
        AllocationRequest {
            kind,
            resolution: Resolution::from((width, height)),
            format: PixelFormat::Buffer,
            tile_mode: TileMode::Linear,
            compression: Compression::DISABLED,
        }
    }

    #[test]
    fn large_buffers_are_folded() {
        // 65x65x65 LUT entries of 8 bytes.
        let lut = buffer_request(SurfaceKind::Lut3d, 65 * 65 * 65 * 8, 1);
        let extent = surface_extent(&lut);
        assert_eq!(extent.width, MAX_BUFFER_WIDTH);
        assert_eq!(extent.height, 135);
        assert!(extent.area() >= lut.resolution.area());

        let histogram = buffer_request(SurfaceKind::Histogram, 1000, 1);
        assert_eq!(surface_extent(&histogram), Resolution::from((1024, 1)));

        let statistics = buffer_request(SurfaceKind::Statistics, 1920, 271);
        let extent = surface_extent(&statistics);
        assert!(extent.width <= MAX_BUFFER_WIDTH);
        assert!(extent.area() >= statistics.resolution.area());

        let mut image = lut;
        image.format = PixelFormat::NV12;
        image.resolution = Resolution::from((1920, 1080));
        assert_eq!(surface_extent(&image), image.resolution);
    }

    #[test]
    // Ignore this test by default as it requires libva-compatible hardware.
    #[ignore]
    fn allocate_fill_and_write() {
        let _ = env_logger::try_init();

        let display = Display::open().unwrap();
        let mut allocator = VaapiAllocator::new(display).unwrap();

        let mut surface = allocator
            .allocate(&AllocationRequest {
                kind: SurfaceKind::Statistics,
                resolution: Resolution::from((256, 8)),
                format: PixelFormat::Buffer,
                tile_mode: TileMode::Linear,
                compression: Compression::DISABLED,
            })
            .unwrap();
        assert!(surface.info.pitch >= 256);

        allocator.fill(&mut surface, 0).unwrap();
        surface.handle.write(250, &[1u8; 12]).unwrap();
        assert!(surface.handle.write(256 * 8 - 4, &[1u8; 8]).is_err());
        allocator.free(surface);

        let lut_size = 65 * 65 * 65 * 8;
        let mut lut = allocator
            .allocate(&buffer_request(SurfaceKind::Lut3d, lut_size, 1))
            .unwrap();
        assert_eq!(lut.info.resolution, Resolution::from((lut_size, 1)));
        lut.handle.write(lut_size as usize - 8, &[1u8; 8]).unwrap();
        allocator.free(lut);
    }
}
