// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Denoise filter parameters.
//!
//! The hardware denoiser is driven by a set of thresholds and weights. They are derived from a
//! single strength factor in `[0, NOISEFACTOR_MAX]` by direct lookup in constant tables, one row
//! per integer strength.

use crate::vebox::generation::HardwareGeneration;
use crate::PixelFormat;

/// Highest denoise strength. Larger strengths are clamped to this value.
pub const NOISEFACTOR_MAX: u32 = 64;

/// Strength in the middle of the range, used as a neutral default by callers.
pub const NOISEFACTOR_MID: u32 = NOISEFACTOR_MAX / 2;

const TABLE_LEN: usize = NOISEFACTOR_MAX as usize + 1;

/// Number of pixel range buckets of the bilateral filter.
pub const NUM_PIXEL_RANGES: usize = 6;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LumaDenoiseParams {
    pub history_delta: u32,
    pub history_max: u32,
    pub asd_threshold: u32,
    pub stad_threshold: u32,
    pub scm_threshold: u32,
    pub mp_threshold: u32,
    pub ltd_threshold: u32,
    pub td_threshold: u32,
    pub pixel_range_threshold: [u32; NUM_PIXEL_RANGES],
    pub pixel_range_weight: [u32; NUM_PIXEL_RANGES],
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChromaDenoiseParams {
    pub ltd_threshold: u32,
    pub td_threshold: u32,
    pub stad_threshold: u32,
}

/// Denoise thresholds and weights for one frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DenoiseParameters {
    pub luma: LumaDenoiseParams,
    /// `None` for formats without chroma planes.
    pub chroma: Option<ChromaDenoiseParams>,
    /// Whether the hardware adapts the parameters itself from the statistics of previous frames.
    pub auto_detect: bool,
}

/// Generation-specific parameters used when the hardware detects the noise level by itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DenoiseDefaults {
    pub luma: LumaDenoiseParams,
    pub chroma: ChromaDenoiseParams,
}

/// Denoising as requested by the caller for a source.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DenoiseSettings {
    /// Strength in `[0, NOISEFACTOR_MAX]`. Ignored with `auto_detect`.
    pub strength: f32,
    pub auto_detect: bool,
    /// Also denoise the chroma planes.
    pub chroma: bool,
}

impl Default for DenoiseSettings {
    fn default() -> Self {
        Self {
            strength: NOISEFACTOR_MID as f32,
            auto_detect: false,
            chroma: true,
        }
    }
}

/// Returns the table row used for `strength`.
///
/// The strength is truncated to an integer and clamped to `[0, NOISEFACTOR_MAX]`. Out of range
/// values are not an error: callers use anything above the maximum as "strongest".
pub fn strength_index(strength: f32) -> usize {
    // `as` truncates, saturates and maps NaN to 0.
    (strength as i64).clamp(0, NOISEFACTOR_MAX as i64) as usize
}

/// Computes the denoise parameters of a frame.
///
/// With `auto_detect` the generation defaults are returned and `strength` is ignored, as the
/// hardware derives its thresholds from the statistics surface across frames.
pub fn derive_denoise_params(
    generation: HardwareGeneration,
    strength: f32,
    auto_detect: bool,
    format: PixelFormat,
) -> DenoiseParameters {
    let (luma, chroma) = if auto_detect {
        let defaults = &generation.caps().denoise_defaults;
        (defaults.luma, defaults.chroma)
    } else {
        let index = strength_index(strength);
        (luma_row(index), chroma_row(index))
    };

    DenoiseParameters {
        luma,
        chroma: format.has_chroma().then_some(chroma),
        auto_detect,
    }
}

fn luma_row(index: usize) -> LumaDenoiseParams {
    LumaDenoiseParams {
        history_delta: HISTORY_DELTA[index],
        history_max: HISTORY_MAX[index],
        asd_threshold: ASD_THRESHOLD[index],
        stad_threshold: STAD_THRESHOLD[index],
        scm_threshold: SCM_THRESHOLD[index],
        mp_threshold: MP_THRESHOLD[index],
        ltd_threshold: LTD_THRESHOLD[index],
        td_threshold: TD_THRESHOLD[index],
        pixel_range_threshold: PIXEL_RANGE_THRESHOLD[index],
        pixel_range_weight: PIXEL_RANGE_WEIGHT[index],
    }
}

fn chroma_row(index: usize) -> ChromaDenoiseParams {
    ChromaDenoiseParams {
        ltd_threshold: CHROMA_LTD_THRESHOLD[index],
        td_threshold: CHROMA_TD_THRESHOLD[index],
        stad_threshold: CHROMA_STAD_THRESHOLD[index],
    }
}

/// Maximum change of the denoise history between two frames.
static HISTORY_DELTA: [u32; TABLE_LEN] = [
    4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5,
    6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7,
    8,
];

/// Upper bound of the denoise history.
static HISTORY_MAX: [u32; TABLE_LEN] = [
    144, 145, 146, 147, 148, 149, 150, 151, 152, 153, 154, 155, 156, 157, 158, 159, 160, 161, 162,
    163, 164, 165, 166, 167, 168, 169, 170, 171, 172, 173, 174, 175, 176, 177, 178, 179, 180, 181,
    182, 183, 184, 185, 186, 187, 188, 189, 190, 191, 192, 193, 194, 195, 196, 197, 198, 199, 200,
    201, 202, 203, 204, 205, 206, 207, 208,
];

/// Absolute sum of differences threshold of the block noise detector.
static ASD_THRESHOLD: [u32; TABLE_LEN] = [
    512, 514, 516, 518, 520, 522, 524, 526, 528, 530, 532, 534, 536, 538, 540, 542, 544, 546, 548,
    550, 552, 554, 556, 558, 560, 562, 564, 566, 568, 570, 572, 574, 576, 578, 580, 582, 584, 586,
    588, 590, 592, 594, 596, 598, 600, 602, 604, 606, 608, 610, 612, 614, 616, 618, 620, 622, 624,
    626, 628, 630, 632, 634, 636, 638, 640,
];

/// Spatial-temporal absolute difference threshold.
static STAD_THRESHOLD: [u32; TABLE_LEN] = [
    2048, 2080, 2112, 2144, 2176, 2208, 2240, 2272, 2304, 2336, 2368, 2400, 2432, 2464, 2496, 2528,
    2560, 2592, 2624, 2656, 2688, 2720, 2752, 2784, 2816, 2848, 2880, 2912, 2944, 2976, 3008, 3040,
    3072, 3104, 3136, 3168, 3200, 3232, 3264, 3296, 3328, 3360, 3392, 3424, 3456, 3488, 3520, 3552,
    3584, 3616, 3648, 3680, 3712, 3744, 3776, 3808, 3840, 3872, 3904, 3936, 3968, 4000, 4032, 4064,
    4096,
];

/// Spatial complexity measure threshold.
static SCM_THRESHOLD: [u32; TABLE_LEN] = [
    512, 514, 516, 518, 520, 522, 524, 526, 528, 530, 532, 534, 536, 538, 540, 542, 544, 546, 548,
    550, 552, 554, 556, 558, 560, 562, 564, 566, 568, 570, 572, 574, 576, 578, 580, 582, 584, 586,
    588, 590, 592, 594, 596, 598, 600, 602, 604, 606, 608, 610, 612, 614, 616, 618, 620, 622, 624,
    626, 628, 630, 632, 634, 636, 638, 640,
];

/// Number of motion pixels tolerated in a block before it is considered moving.
static MP_THRESHOLD: [u32; TABLE_LEN] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    2,
];

/// Low temporal difference threshold.
static LTD_THRESHOLD: [u32; TABLE_LEN] = [
    64, 66, 68, 70, 72, 74, 76, 78, 80, 82, 84, 86, 88, 90, 92, 94, 96, 98, 100, 102, 104, 106, 108,
    110, 112, 114, 116, 118, 120, 122, 124, 126, 128, 130, 132, 134, 136, 138, 140, 142, 144, 146,
    148, 150, 152, 154, 156, 158, 160, 162, 164, 166, 168, 170, 172, 174, 176, 178, 180, 182, 184,
    186, 188, 190, 192,
];

/// Temporal difference threshold.
static TD_THRESHOLD: [u32; TABLE_LEN] = [
    128, 130, 132, 134, 136, 138, 140, 142, 144, 146, 148, 150, 152, 154, 156, 158, 160, 162, 164,
    166, 168, 170, 172, 174, 176, 178, 180, 182, 184, 186, 188, 190, 192, 194, 196, 198, 200, 202,
    204, 206, 208, 210, 212, 214, 216, 218, 220, 222, 224, 226, 228, 230, 232, 234, 236, 238, 240,
    242, 244, 246, 248, 250, 252, 254, 256,
];

/// Bilateral filter pixel range thresholds, by range bucket.
static PIXEL_RANGE_THRESHOLD: [[u32; 6]; TABLE_LEN] = [
    [2, 4, 8, 12, 16, 24],
    [2, 4, 8, 12, 17, 25],
    [2, 4, 9, 13, 18, 27],
    [2, 4, 9, 14, 19, 28],
    [2, 5, 10, 15, 20, 30],
    [2, 5, 10, 15, 21, 31],
    [2, 5, 11, 16, 22, 33],
    [2, 5, 11, 17, 23, 34],
    [3, 6, 12, 18, 24, 36],
    [3, 6, 12, 18, 25, 37],
    [3, 6, 13, 19, 26, 39],
    [3, 6, 13, 20, 27, 40],
    [3, 7, 14, 21, 28, 42],
    [3, 7, 14, 21, 29, 43],
    [3, 7, 15, 22, 30, 45],
    [3, 7, 15, 23, 31, 46],
    [4, 8, 16, 24, 32, 48],
    [4, 8, 16, 24, 33, 49],
    [4, 8, 17, 25, 34, 51],
    [4, 8, 17, 26, 35, 52],
    [4, 9, 18, 27, 36, 54],
    [4, 9, 18, 27, 37, 55],
    [4, 9, 19, 28, 38, 57],
    [4, 9, 19, 29, 39, 58],
    [5, 10, 20, 30, 40, 60],
    [5, 10, 20, 30, 41, 61],
    [5, 10, 21, 31, 42, 63],
    [5, 10, 21, 32, 43, 64],
    [5, 11, 22, 33, 44, 66],
    [5, 11, 22, 33, 45, 67],
    [5, 11, 23, 34, 46, 69],
    [5, 11, 23, 35, 47, 70],
    [6, 12, 24, 36, 48, 72],
    [6, 12, 24, 36, 49, 73],
    [6, 12, 25, 37, 50, 75],
    [6, 12, 25, 38, 51, 76],
    [6, 13, 26, 39, 52, 78],
    [6, 13, 26, 39, 53, 79],
    [6, 13, 27, 40, 54, 81],
    [6, 13, 27, 41, 55, 82],
    [7, 14, 28, 42, 56, 84],
    [7, 14, 28, 42, 57, 85],
    [7, 14, 29, 43, 58, 87],
    [7, 14, 29, 44, 59, 88],
    [7, 15, 30, 45, 60, 90],
    [7, 15, 30, 45, 61, 91],
    [7, 15, 31, 46, 62, 93],
    [7, 15, 31, 47, 63, 94],
    [8, 16, 32, 48, 64, 96],
    [8, 16, 32, 48, 65, 97],
    [8, 16, 33, 49, 66, 99],
    [8, 16, 33, 50, 67, 100],
    [8, 17, 34, 51, 68, 102],
    [8, 17, 34, 51, 69, 103],
    [8, 17, 35, 52, 70, 105],
    [8, 17, 35, 53, 71, 106],
    [9, 18, 36, 54, 72, 108],
    [9, 18, 36, 54, 73, 109],
    [9, 18, 37, 55, 74, 111],
    [9, 18, 37, 56, 75, 112],
    [9, 19, 38, 57, 76, 114],
    [9, 19, 38, 57, 77, 115],
    [9, 19, 39, 58, 78, 117],
    [9, 19, 39, 59, 79, 118],
    [10, 20, 40, 60, 80, 120],
];

/// Bilateral filter weights applied to each pixel range bucket.
static PIXEL_RANGE_WEIGHT: [[u32; 6]; TABLE_LEN] = [
    [3, 3, 3, 2, 1, 1],
    [3, 3, 3, 2, 1, 1],
    [4, 3, 3, 2, 2, 1],
    [4, 4, 3, 2, 2, 1],
    [4, 4, 3, 3, 2, 1],
    [4, 4, 3, 3, 2, 1],
    [4, 4, 4, 3, 2, 1],
    [5, 4, 4, 3, 2, 1],
    [5, 5, 4, 3, 2, 1],
    [5, 5, 4, 3, 2, 1],
    [5, 5, 4, 3, 2, 1],
    [5, 5, 4, 3, 2, 1],
    [6, 5, 5, 4, 2, 1],
    [6, 5, 5, 4, 3, 1],
    [6, 6, 5, 4, 3, 2],
    [6, 6, 5, 4, 3, 2],
    [6, 6, 5, 4, 3, 2],
    [7, 6, 5, 4, 3, 2],
    [7, 6, 6, 4, 3, 2],
    [7, 7, 6, 4, 3, 2],
    [7, 7, 6, 5, 3, 2],
    [7, 7, 6, 5, 3, 2],
    [8, 7, 6, 5, 3, 2],
    [8, 7, 6, 5, 3, 2],
    [8, 8, 7, 5, 4, 2],
    [8, 8, 7, 5, 4, 2],
    [8, 8, 7, 5, 4, 2],
    [9, 8, 7, 5, 4, 2],
    [9, 8, 7, 6, 4, 2],
    [9, 8, 7, 6, 4, 2],
    [9, 9, 7, 6, 4, 2],
    [9, 9, 8, 6, 4, 2],
    [10, 9, 8, 6, 4, 2],
    [10, 9, 8, 6, 4, 2],
    [10, 9, 8, 6, 4, 3],
    [10, 10, 8, 6, 4, 3],
    [10, 10, 8, 7, 5, 3],
    [11, 10, 9, 7, 5, 3],
    [11, 10, 9, 7, 5, 3],
    [11, 10, 9, 7, 5, 3],
    [11, 11, 9, 7, 5, 3],
    [11, 11, 9, 7, 5, 3],
    [12, 11, 9, 7, 5, 3],
    [12, 11, 10, 7, 5, 3],
    [12, 11, 10, 8, 5, 3],
    [12, 11, 10, 8, 5, 3],
    [12, 12, 10, 8, 5, 3],
    [13, 12, 10, 8, 6, 3],
    [13, 12, 10, 8, 6, 3],
    [13, 12, 11, 8, 6, 3],
    [13, 12, 11, 8, 6, 3],
    [13, 13, 11, 8, 6, 3],
    [14, 13, 11, 9, 6, 3],
    [14, 13, 11, 9, 6, 3],
    [14, 13, 11, 9, 6, 4],
    [14, 13, 12, 9, 6, 4],
    [14, 14, 12, 9, 6, 4],
    [15, 14, 12, 9, 6, 4],
    [15, 14, 12, 9, 6, 4],
    [15, 14, 12, 9, 7, 4],
    [15, 14, 12, 10, 7, 4],
    [15, 14, 13, 10, 7, 4],
    [16, 15, 13, 10, 7, 4],
    [16, 15, 13, 10, 7, 4],
    [16, 15, 13, 10, 7, 4],
];

/// Chroma low temporal difference threshold.
static CHROMA_LTD_THRESHOLD: [u32; TABLE_LEN] = [
    32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48, 49, 50, 51, 52, 53, 54, 55,
    56, 57, 58, 59, 60, 61, 62, 63, 64, 65, 66, 67, 68, 69, 70, 71, 72, 73, 74, 75, 76, 77, 78, 79,
    80, 81, 82, 83, 84, 85, 86, 87, 88, 89, 90, 91, 92, 93, 94, 95, 96,
];

/// Chroma temporal difference threshold.
static CHROMA_TD_THRESHOLD: [u32; TABLE_LEN] = [
    64, 65, 66, 67, 68, 69, 70, 71, 72, 73, 74, 75, 76, 77, 78, 79, 80, 81, 82, 83, 84, 85, 86, 87,
    88, 89, 90, 91, 92, 93, 94, 95, 96, 97, 98, 99, 100, 101, 102, 103, 104, 105, 106, 107, 108,
    109, 110, 111, 112, 113, 114, 115, 116, 117, 118, 119, 120, 121, 122, 123, 124, 125, 126, 127,
    128,
];

/// Chroma spatial-temporal absolute difference threshold.
static CHROMA_STAD_THRESHOLD: [u32; TABLE_LEN] = [
    1024, 1040, 1056, 1072, 1088, 1104, 1120, 1136, 1152, 1168, 1184, 1200, 1216, 1232, 1248, 1264,
    1280, 1296, 1312, 1328, 1344, 1360, 1376, 1392, 1408, 1424, 1440, 1456, 1472, 1488, 1504, 1520,
    1536, 1552, 1568, 1584, 1600, 1616, 1632, 1648, 1664, 1680, 1696, 1712, 1728, 1744, 1760, 1776,
    1792, 1808, 1824, 1840, 1856, 1872, 1888, 1904, 1920, 1936, 1952, 1968, 1984, 2000, 2016, 2032,
    2048,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_row_32() {
        let params =
            derive_denoise_params(HardwareGeneration::Gen9, 32.0, false, PixelFormat::NV12);

        assert_eq!(
            params.luma,
            LumaDenoiseParams {
                history_delta: 6,
                history_max: 176,
                asd_threshold: 576,
                stad_threshold: 3072,
                scm_threshold: 576,
                mp_threshold: 1,
                ltd_threshold: 128,
                td_threshold: 192,
                pixel_range_threshold: [6, 12, 24, 36, 48, 72],
                pixel_range_weight: [10, 9, 8, 6, 4, 2],
            }
        );
        assert_eq!(
            params.chroma,
            Some(ChromaDenoiseParams {
                ltd_threshold: 64,
                td_threshold: 96,
                stad_threshold: 1536,
            })
        );
        assert!(!params.auto_detect);
    }

    #[test]
    fn strength_is_truncated_and_clamped() {
        let max = NOISEFACTOR_MAX as f32;
        let derive =
            |s| derive_denoise_params(HardwareGeneration::Gen12, s, false, PixelFormat::P010);

        assert_eq!(derive(max + 5.0), derive(max));
        assert_eq!(derive(f32::INFINITY), derive(max));
        assert_eq!(derive(-3.7), derive(0.0));
        assert_eq!(derive(f32::NAN), derive(0.0));
        assert_eq!(derive(32.9), derive(32.0));
        assert_ne!(derive(33.0), derive(32.0));

        for s in 0..=NOISEFACTOR_MAX + 10 {
            let expected = s.min(NOISEFACTOR_MAX) as usize;
            assert_eq!(strength_index(s as f32), expected);
            assert_eq!(derive(s as f32).luma, luma_row(expected));
        }
    }

    #[test]
    fn highest_row() {
        let params =
            derive_denoise_params(HardwareGeneration::Gen9, 64.0, false, PixelFormat::NV12);
        assert_eq!(params.luma.history_max, 208);
        assert_eq!(params.luma.pixel_range_threshold, [10, 20, 40, 60, 80, 120]);
        assert_eq!(params.luma.pixel_range_weight, [16, 15, 13, 10, 7, 4]);
    }

    #[test]
    fn auto_detect_uses_generation_defaults() {
        for generation in [
            HardwareGeneration::Gen8,
            HardwareGeneration::Gen9,
            HardwareGeneration::Gen11,
            HardwareGeneration::Gen12,
        ] {
            let defaults = generation.caps().denoise_defaults;
            let params = derive_denoise_params(generation, 3.0, true, PixelFormat::NV12);
            assert_eq!(params.luma, defaults.luma);
            assert_eq!(params.chroma, Some(defaults.chroma));
            assert!(params.auto_detect);
            // Strength is irrelevant in auto-detect mode.
            assert_eq!(
                derive_denoise_params(generation, 60.0, true, PixelFormat::NV12),
                params
            );
        }
    }

    #[test]
    fn luma_only_formats_have_no_chroma_params() {
        let params = derive_denoise_params(HardwareGeneration::Gen9, 10.0, false, PixelFormat::Y8);
        assert_eq!(params.chroma, None);
    }

    #[test]
    fn tables_are_monotonic() {
        for i in 1..TABLE_LEN {
            assert!(HISTORY_MAX[i] > HISTORY_MAX[i - 1]);
            assert!(STAD_THRESHOLD[i] > STAD_THRESHOLD[i - 1]);
            for range in 0..NUM_PIXEL_RANGES {
                assert!(PIXEL_RANGE_WEIGHT[i][range] >= PIXEL_RANGE_WEIGHT[i - 1][range]);
                assert!(PIXEL_RANGE_WEIGHT[i][range] <= 16);
            }
        }
    }
}
