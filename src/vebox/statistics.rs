// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Layout and read-back of the statistics surface.
//!
//! The vebox writes two kinds of statistics into the same surface: per-block statistics covering
//! the source frame in `block_width`x`block_height` blocks, followed by one fixed-size record of
//! per-frame statistics for each hardware slice. The per-frame record holds the film mode
//! detection counters, the global noise estimate and the standard deviation of the frame.

use anyhow::anyhow;
use bytes::Buf;

use crate::utils::align_up;
use crate::Resolution;

/// Number of film mode detection counters in a per-frame record.
pub const FMD_COUNTERS: usize = 11;

/// Placement of the statistics inside the statistics surface. Constant for a hardware generation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StatisticsLayout {
    pub block_width: u32,
    pub block_height: u32,
    /// Bytes of statistics per block.
    pub per_block_bytes: u32,
    /// Size of the per-frame record of a slice.
    pub per_frame_size: u32,
    /// Offset of the film mode detection counters within a per-frame record.
    pub fmd_offset: u32,
    /// Offset of the global noise estimate within a per-frame record.
    pub gne_offset: u32,
    /// Offset of the standard deviation within a per-frame record.
    pub std_offset: u32,
    /// Number of hardware slices, each writing its own per-frame record.
    pub slices: u32,
}

impl StatisticsLayout {
    /// Bytes per line of the statistics surface for a source `width`.
    pub fn pitch(&self, width: u32) -> u32 {
        align_up(width, 64) / self.block_width * self.per_block_bytes
    }

    /// Lines of per-block statistics for a source `height`.
    pub fn block_rows(&self, height: u32) -> u32 {
        align_up(height, self.block_height) / self.block_height
    }

    /// Size of the statistics surface, as a `Buffer` of `width` bytes per line, needed for a
    /// source of `resolution`.
    pub fn extent(&self, resolution: Resolution) -> Resolution {
        let pitch = self.pitch(resolution.width);
        let frame_rows = (self.per_frame_size * self.slices).div_ceil(pitch);

        Resolution::from((pitch, self.block_rows(resolution.height) + frame_rows))
    }

    /// Byte offset of the per-frame record of `slice`.
    pub fn frame_offset(&self, resolution: Resolution, slice: u32) -> usize {
        let per_block_size =
            self.pitch(resolution.width) as usize * self.block_rows(resolution.height) as usize;

        per_block_size + (slice * self.per_frame_size) as usize
    }
}

/// Per-frame statistics of one or more slices.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameStatistics {
    pub fmd_counters: [u32; FMD_COUNTERS],
    pub gne_luma_sum: u32,
    pub gne_luma_count: u32,
    pub gne_u_sum: u32,
    pub gne_u_count: u32,
    pub gne_v_sum: u32,
    pub gne_v_count: u32,
    /// Standard deviation of Y, U and V.
    pub std_dev: [u32; 3],
}

impl FrameStatistics {
    /// Parses the per-frame record of `slice` from a mapped statistics surface `data`, written for
    /// a source of `resolution`.
    pub fn read(
        layout: &StatisticsLayout,
        resolution: Resolution,
        data: &[u8],
        slice: u32,
    ) -> anyhow::Result<Self> {
        if slice >= layout.slices {
            return Err(anyhow!(
                "slice {} out of range, layout has {} slices",
                slice,
                layout.slices
            ));
        }

        let offset = layout.frame_offset(resolution, slice);
        let record = data
            .get(offset..offset + layout.per_frame_size as usize)
            .ok_or_else(|| {
                anyhow!(
                    "statistics buffer too small: {} bytes, record of slice {} ends at {}",
                    data.len(),
                    slice,
                    offset + layout.per_frame_size as usize
                )
            })?;

        let field = |start: u32, words: usize| {
            record
                .get(start as usize..start as usize + words * 4)
                .ok_or_else(|| anyhow!("statistics field at {:#x} exceeds the record", start))
        };

        let mut stats = FrameStatistics::default();

        let mut fmd = field(layout.fmd_offset, FMD_COUNTERS)?;
        for counter in stats.fmd_counters.iter_mut() {
            *counter = fmd.get_u32_le();
        }

        let mut gne = field(layout.gne_offset, 6)?;
        stats.gne_luma_sum = gne.get_u32_le();
        stats.gne_luma_count = gne.get_u32_le();
        stats.gne_u_sum = gne.get_u32_le();
        stats.gne_u_count = gne.get_u32_le();
        stats.gne_v_sum = gne.get_u32_le();
        stats.gne_v_count = gne.get_u32_le();

        let mut std = field(layout.std_offset, 3)?;
        for value in stats.std_dev.iter_mut() {
            *value = std.get_u32_le();
        }

        Ok(stats)
    }

    /// Parses and sums the per-frame records of all slices.
    pub fn read_all(
        layout: &StatisticsLayout,
        resolution: Resolution,
        data: &[u8],
    ) -> anyhow::Result<Self> {
        let mut total = FrameStatistics::default();
        for slice in 0..layout.slices {
            total.accumulate(&Self::read(layout, resolution, data, slice)?);
        }

        Ok(total)
    }

    fn accumulate(&mut self, other: &Self) {
        for (a, b) in self.fmd_counters.iter_mut().zip(other.fmd_counters) {
            *a = a.wrapping_add(b);
        }
        self.gne_luma_sum = self.gne_luma_sum.wrapping_add(other.gne_luma_sum);
        self.gne_luma_count = self.gne_luma_count.wrapping_add(other.gne_luma_count);
        self.gne_u_sum = self.gne_u_sum.wrapping_add(other.gne_u_sum);
        self.gne_u_count = self.gne_u_count.wrapping_add(other.gne_u_count);
        self.gne_v_sum = self.gne_v_sum.wrapping_add(other.gne_v_sum);
        self.gne_v_count = self.gne_v_count.wrapping_add(other.gne_v_count);
        for (a, b) in self.std_dev.iter_mut().zip(other.std_dev) {
            *a = (*a).max(b);
        }
    }

    /// Average luma noise over the blocks the hardware considered flat, if any.
    pub fn global_noise_estimate(&self) -> Option<u32> {
        (self.gne_luma_count != 0).then(|| self.gne_luma_sum / self.gne_luma_count)
    }
}
