// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Hardware generations and their capabilities.
//!
//! Everything that differs between generations of the vebox is data in a [`GenerationCaps`]
//! record, selected once when the processor is created.

use std::str::FromStr;

use enumn::N;

use crate::surface::CompressionMode;
use crate::surface::TileMode;
use crate::vebox::denoise::ChromaDenoiseParams;
use crate::vebox::denoise::DenoiseDefaults;
use crate::vebox::denoise::LumaDenoiseParams;
use crate::vebox::statistics::StatisticsLayout;
use crate::PixelFormat;
use crate::Resolution;

#[derive(N, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum HardwareGeneration {
    Gen8 = 8,
    Gen9 = 9,
    Gen11 = 11,
    Gen12 = 12,
}

impl HardwareGeneration {
    pub fn caps(&self) -> &'static GenerationCaps {
        match self {
            HardwareGeneration::Gen8 => &GEN8_CAPS,
            HardwareGeneration::Gen9 => &GEN9_CAPS,
            HardwareGeneration::Gen11 => &GEN11_CAPS,
            HardwareGeneration::Gen12 => &GEN12_CAPS,
        }
    }
}

impl Default for HardwareGeneration {
    fn default() -> Self {
        Self::Gen9
    }
}

impl FromStr for HardwareGeneration {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_ascii_lowercase();
        let number = s.strip_prefix("gen").unwrap_or(&s);

        number
            .parse::<u32>()
            .ok()
            .and_then(HardwareGeneration::n)
            .ok_or("unrecognized hardware generation. Valid values: gen8, gen9, gen11, gen12")
    }
}

/// Capabilities and constants of a vebox generation.
#[derive(Debug)]
pub struct GenerationCaps {
    /// The vebox only accepts sources strictly larger than this extent.
    pub min_extent: Resolution,
    /// Whether a scaler can be chained after the vebox.
    pub scaler: bool,
    /// Whether the vebox can apply a 3D LUT for HDR tone mapping.
    pub hdr_3dlut: bool,
    /// Number of entries per dimension of the 3D LUT.
    pub lut_dimension: u32,
    /// Whether the vebox can read and write compressed surfaces.
    pub memory_compression: bool,
    /// Compression mode of compressed auxiliary surfaces.
    pub compression_mode: CompressionMode,
    /// Tiling of the auxiliary image surfaces.
    pub tile_mode: TileMode,
    /// Size in bytes of the ACE histogram.
    pub histogram_size: u32,
    pub statistics: StatisticsLayout,
    /// Denoise parameters used when the hardware detects the noise level by itself.
    pub denoise_defaults: DenoiseDefaults,
    /// Formats the vebox accepts as input.
    pub input_formats: &'static [PixelFormat],
    /// Formats the vebox can write to the render target.
    pub output_formats: &'static [PixelFormat],
}

impl GenerationCaps {
    pub fn supports_input(&self, format: PixelFormat) -> bool {
        self.input_formats.contains(&format)
    }

    pub fn supports_output(&self, format: PixelFormat) -> bool {
        self.output_formats.contains(&format)
    }

    /// Size in bytes of the 3D LUT surface, with 16 bits for each of R, G, B and A.
    pub fn lut_size(&self) -> u32 {
        self.lut_dimension.pow(3) * 8
    }
}

const LEGACY_INPUT_FORMATS: &[PixelFormat] = &[
    PixelFormat::NV12,
    PixelFormat::I420,
    PixelFormat::YV12,
    PixelFormat::YUY2,
    PixelFormat::UYVY,
    PixelFormat::AYUV,
    PixelFormat::Y8,
    PixelFormat::Y16,
    PixelFormat::P010,
    PixelFormat::P016,
];

const LEGACY_OUTPUT_FORMATS: &[PixelFormat] = &[
    PixelFormat::NV12,
    PixelFormat::YUY2,
    PixelFormat::UYVY,
    PixelFormat::AYUV,
    PixelFormat::P010,
    PixelFormat::P016,
    PixelFormat::Y8,
    PixelFormat::Y16,
];

const INPUT_FORMATS: &[PixelFormat] = &[
    PixelFormat::NV12,
    PixelFormat::I420,
    PixelFormat::YV12,
    PixelFormat::YUY2,
    PixelFormat::UYVY,
    PixelFormat::AYUV,
    PixelFormat::Y8,
    PixelFormat::Y16,
    PixelFormat::P010,
    PixelFormat::P016,
    PixelFormat::Y210,
    PixelFormat::Y216,
    PixelFormat::Y410,
    PixelFormat::Y416,
];

const OUTPUT_FORMATS: &[PixelFormat] = &[
    PixelFormat::NV12,
    PixelFormat::YUY2,
    PixelFormat::UYVY,
    PixelFormat::AYUV,
    PixelFormat::P010,
    PixelFormat::P016,
    PixelFormat::Y8,
    PixelFormat::Y16,
    PixelFormat::Y210,
    PixelFormat::Y216,
    PixelFormat::Y410,
    PixelFormat::Y416,
    PixelFormat::ARGB,
    PixelFormat::ABGR,
    PixelFormat::A2R10G10B10,
];

const STATISTICS_LAYOUT: StatisticsLayout = StatisticsLayout {
    block_width: 16,
    block_height: 4,
    per_block_bytes: 16,
    per_frame_size: 128,
    fmd_offset: 0x00,
    gne_offset: 0x2c,
    std_offset: 0x44,
    slices: 1,
};

const LEGACY_DENOISE_DEFAULTS: DenoiseDefaults = DenoiseDefaults {
    luma: LumaDenoiseParams {
        history_delta: 8,
        history_max: 192,
        asd_threshold: 512,
        stad_threshold: 2048,
        scm_threshold: 512,
        mp_threshold: 2,
        ltd_threshold: 64,
        td_threshold: 128,
        pixel_range_threshold: [2, 4, 8, 12, 16, 24],
        pixel_range_weight: [16, 15, 13, 10, 7, 4],
    },
    chroma: ChromaDenoiseParams {
        ltd_threshold: 32,
        td_threshold: 64,
        stad_threshold: 1024,
    },
};

const DENOISE_DEFAULTS: DenoiseDefaults = DenoiseDefaults {
    luma: LumaDenoiseParams {
        history_delta: 8,
        history_max: 208,
        asd_threshold: 576,
        stad_threshold: 3072,
        scm_threshold: 576,
        mp_threshold: 2,
        ltd_threshold: 96,
        td_threshold: 160,
        pixel_range_threshold: [4, 8, 16, 24, 32, 48],
        pixel_range_weight: [16, 15, 13, 10, 7, 4],
    },
    chroma: ChromaDenoiseParams {
        ltd_threshold: 48,
        td_threshold: 80,
        stad_threshold: 1536,
    },
};

const MIN_EXTENT: Resolution = Resolution {
    width: 64,
    height: 16,
};

static GEN8_CAPS: GenerationCaps = GenerationCaps {
    min_extent: MIN_EXTENT,
    scaler: false,
    hdr_3dlut: false,
    lut_dimension: 0,
    memory_compression: false,
    compression_mode: CompressionMode::None,
    tile_mode: TileMode::TileY,
    histogram_size: 256 * 4,
    statistics: STATISTICS_LAYOUT,
    denoise_defaults: LEGACY_DENOISE_DEFAULTS,
    input_formats: LEGACY_INPUT_FORMATS,
    output_formats: LEGACY_OUTPUT_FORMATS,
};

static GEN9_CAPS: GenerationCaps = GenerationCaps {
    min_extent: MIN_EXTENT,
    scaler: true,
    hdr_3dlut: false,
    lut_dimension: 0,
    memory_compression: true,
    compression_mode: CompressionMode::Horizontal,
    tile_mode: TileMode::TileY,
    histogram_size: 256 * 4,
    statistics: STATISTICS_LAYOUT,
    denoise_defaults: LEGACY_DENOISE_DEFAULTS,
    input_formats: LEGACY_INPUT_FORMATS,
    output_formats: LEGACY_OUTPUT_FORMATS,
};

static GEN11_CAPS: GenerationCaps = GenerationCaps {
    min_extent: MIN_EXTENT,
    scaler: true,
    hdr_3dlut: false,
    lut_dimension: 0,
    memory_compression: true,
    compression_mode: CompressionMode::Media,
    tile_mode: TileMode::TileY,
    histogram_size: 256 * 4 * 2,
    statistics: StatisticsLayout {
        slices: 2,
        ..STATISTICS_LAYOUT
    },
    denoise_defaults: DENOISE_DEFAULTS,
    input_formats: INPUT_FORMATS,
    output_formats: OUTPUT_FORMATS,
};

static GEN12_CAPS: GenerationCaps = GenerationCaps {
    min_extent: MIN_EXTENT,
    scaler: true,
    hdr_3dlut: true,
    lut_dimension: 65,
    memory_compression: true,
    compression_mode: CompressionMode::Media,
    tile_mode: TileMode::Tile4,
    histogram_size: 256 * 4 * 2,
    statistics: StatisticsLayout {
        slices: 2,
        ..STATISTICS_LAYOUT
    },
    denoise_defaults: DENOISE_DEFAULTS,
    input_formats: INPUT_FORMATS,
    output_formats: OUTPUT_FORMATS,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_generation() {
        assert_eq!(
            HardwareGeneration::from_str("gen12"),
            Ok(HardwareGeneration::Gen12)
        );
        assert_eq!(
            HardwareGeneration::from_str("GEN9"),
            Ok(HardwareGeneration::Gen9)
        );
        assert_eq!(
            HardwareGeneration::from_str("11"),
            Ok(HardwareGeneration::Gen11)
        );
        assert!(HardwareGeneration::from_str("gen10").is_err());
        assert!(HardwareGeneration::from_str("foo").is_err());
    }

    #[test]
    fn only_gen12_has_hdr_lut() {
        assert!(HardwareGeneration::Gen12.caps().hdr_3dlut);
        assert_eq!(HardwareGeneration::Gen12.caps().lut_size(), 65 * 65 * 65 * 8);
        for generation in [
            HardwareGeneration::Gen8,
            HardwareGeneration::Gen9,
            HardwareGeneration::Gen11,
        ] {
            assert!(!generation.caps().hdr_3dlut);
        }
    }

    #[test]
    fn vebox_input_never_includes_rgb() {
        for generation in [
            HardwareGeneration::Gen8,
            HardwareGeneration::Gen9,
            HardwareGeneration::Gen11,
            HardwareGeneration::Gen12,
        ] {
            assert!(!generation
                .caps()
                .input_formats
                .iter()
                .any(|format| format.is_rgb()));
        }
    }
}
