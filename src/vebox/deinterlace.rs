// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Deinterlace modes, their constraints and their filter parameters.

use crate::surface::SampleType;
use crate::vebox::chroma::ChromaPacking;
use crate::PixelFormat;
use crate::Resolution;

/// Sources with at least this many pixels use the HD deinterlace parameters.
pub const HD_THRESHOLD: Resolution = Resolution {
    width: 1280,
    height: 720,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResolutionClass {
    Hd,
    Sd,
}

impl ResolutionClass {
    pub fn of(resolution: Resolution) -> Self {
        if resolution.area() >= HD_THRESHOLD.area() {
            ResolutionClass::Hd
        } else {
            ResolutionClass::Sd
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DeinterlaceMode {
    /// Line doubling within a single field.
    #[default]
    Bob,
    /// Motion adaptive deinterlacing using the previous frame and the motion history.
    Advanced,
}

impl DeinterlaceMode {
    /// Line alignment the source height needs for this mode.
    pub fn height_alignment(&self) -> u32 {
        match self {
            DeinterlaceMode::Bob => 2,
            DeinterlaceMode::Advanced => 4,
        }
    }
}

/// Deinterlacing as requested by the caller for a source.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DeinterlaceSettings {
    pub mode: DeinterlaceMode,
    /// Detect telecined content and recover the original progressive frames.
    pub film_mode_detection: bool,
}

/// Returns `true` if the vebox can deinterlace a source of `format` and `resolution` with `mode`.
///
/// Only subsampled YUV formats are supported, and the height must allow splitting the frame
/// into fields of whole chroma lines.
pub fn is_deinterlace_supported(
    format: PixelFormat,
    resolution: Resolution,
    mode: DeinterlaceMode,
) -> bool {
    let packing_ok = matches!(
        ChromaPacking::of(format),
        ChromaPacking::Yuv420 | ChromaPacking::Yuv422
    );

    packing_ok && resolution.height % mode.height_alignment() == 0
}

/// Deinterlacing as it will actually be performed for a frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeinterlaceControl {
    pub mode: DeinterlaceMode,
    pub top_field_first: bool,
    pub single_field: bool,
    pub film_mode_detection: bool,
}

impl DeinterlaceControl {
    /// Resolves the requested `settings` for a source of `sample_type`. Advanced deinterlacing
    /// needs a valid previous frame and falls back to bob otherwise.
    pub fn resolve(
        settings: &DeinterlaceSettings,
        sample_type: SampleType,
        reference_valid: bool,
    ) -> Self {
        let mode = match settings.mode {
            DeinterlaceMode::Advanced if !reference_valid => {
                log::debug!("No valid reference, falling back to bob deinterlacing");
                DeinterlaceMode::Bob
            }
            mode => mode,
        };

        Self {
            mode,
            top_field_first: sample_type.top_field_first(),
            single_field: sample_type.is_single_field(),
            film_mode_detection: settings.film_mode_detection && mode == DeinterlaceMode::Advanced,
        }
    }
}

/// Filter parameters of the deinterlacer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeinterlaceParameters {
    /// Weight of the temporal difference measure for luma.
    pub luma_tdm_weight: u32,
    /// Weight of the temporal difference measure for chroma.
    pub chroma_tdm_weight: u32,
    /// Spatial horizontal complexity measure.
    pub shcm_delta: u32,
    pub shcm_threshold: u32,
    /// Spatial vertical complexity measure.
    pub svcm_delta: u32,
    pub svcm_threshold: u32,
    pub luma_tdm_smaller_window: bool,
    pub chroma_tdm_smaller_window: bool,
    pub luma_tdm_coring_threshold: u32,
    pub chroma_tdm_coring_threshold: u32,
    pub stmm_shift_up: u32,
    pub stmm_shift_down: u32,
    pub stmm_output_shift: u32,
    pub minimum_stmm: u32,
    /// Threshold above which a frame is considered to contain combing artifacts.
    pub fmd_tear_threshold: u32,
    pub sdi_delta: u32,
    pub sdi_threshold: u32,
    pub sdi_fallback_mode1_t1: u32,
    pub sdi_fallback_mode2_constant: u32,
}

const HD_PARAMS: DeinterlaceParameters = DeinterlaceParameters {
    luma_tdm_weight: 4,
    chroma_tdm_weight: 4,
    shcm_delta: 5,
    shcm_threshold: 255,
    svcm_delta: 5,
    svcm_threshold: 255,
    luma_tdm_smaller_window: false,
    chroma_tdm_smaller_window: false,
    luma_tdm_coring_threshold: 0,
    chroma_tdm_coring_threshold: 0,
    stmm_shift_up: 1,
    stmm_shift_down: 3,
    stmm_output_shift: 4,
    minimum_stmm: 118,
    fmd_tear_threshold: 63,
    sdi_delta: 5,
    sdi_threshold: 100,
    sdi_fallback_mode1_t1: 100,
    sdi_fallback_mode2_constant: 1024,
};

const SD_PARAMS: DeinterlaceParameters = DeinterlaceParameters {
    luma_tdm_weight: 2,
    chroma_tdm_weight: 2,
    shcm_delta: 3,
    shcm_threshold: 128,
    svcm_delta: 3,
    svcm_threshold: 128,
    luma_tdm_smaller_window: true,
    chroma_tdm_smaller_window: true,
    luma_tdm_coring_threshold: 4,
    chroma_tdm_coring_threshold: 4,
    stmm_shift_up: 1,
    stmm_shift_down: 2,
    stmm_output_shift: 3,
    minimum_stmm: 80,
    fmd_tear_threshold: 32,
    sdi_delta: 3,
    sdi_threshold: 64,
    sdi_fallback_mode1_t1: 64,
    sdi_fallback_mode2_constant: 512,
};

pub fn derive_deinterlace_params(class: ResolutionClass) -> DeinterlaceParameters {
    match class {
        ResolutionClass::Hd => HD_PARAMS,
        ResolutionClass::Sd => SD_PARAMS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_class_threshold() {
        assert_eq!(
            ResolutionClass::of(Resolution::from((1280, 720))),
            ResolutionClass::Hd
        );
        assert_eq!(
            ResolutionClass::of(Resolution::from((1920, 1080))),
            ResolutionClass::Hd
        );
        assert_eq!(
            ResolutionClass::of(Resolution::from((1280, 718))),
            ResolutionClass::Sd
        );
        assert_eq!(
            ResolutionClass::of(Resolution::from((720, 576))),
            ResolutionClass::Sd
        );
    }

    #[test]
    fn parameter_sets_differ() {
        let hd = derive_deinterlace_params(ResolutionClass::Hd);
        let sd = derive_deinterlace_params(ResolutionClass::Sd);
        assert_ne!(hd, sd);
        assert_eq!(hd, derive_deinterlace_params(ResolutionClass::Hd));
    }

    #[test]
    fn supported_formats_and_alignment() {
        let res = Resolution::from((720, 480));
        assert!(is_deinterlace_supported(
            PixelFormat::NV12,
            res,
            DeinterlaceMode::Advanced
        ));
        assert!(is_deinterlace_supported(
            PixelFormat::YUY2,
            res,
            DeinterlaceMode::Bob
        ));
        assert!(!is_deinterlace_supported(
            PixelFormat::AYUV,
            res,
            DeinterlaceMode::Bob
        ));
        assert!(!is_deinterlace_supported(
            PixelFormat::ARGB,
            res,
            DeinterlaceMode::Bob
        ));

        let odd = Resolution::from((720, 482));
        assert!(is_deinterlace_supported(
            PixelFormat::NV12,
            odd,
            DeinterlaceMode::Bob
        ));
        assert!(!is_deinterlace_supported(
            PixelFormat::NV12,
            odd,
            DeinterlaceMode::Advanced
        ));
    }

    #[test]
    fn advanced_needs_reference() {
        let settings = DeinterlaceSettings {
            mode: DeinterlaceMode::Advanced,
            film_mode_detection: true,
        };

        let control = DeinterlaceControl::resolve(&settings, SampleType::InterleavedTopFirst, true);
        assert_eq!(control.mode, DeinterlaceMode::Advanced);
        assert!(control.top_field_first);
        assert!(control.film_mode_detection);

        let control =
            DeinterlaceControl::resolve(&settings, SampleType::InterleavedBottomFirst, false);
        assert_eq!(control.mode, DeinterlaceMode::Bob);
        assert!(!control.top_field_first);
        assert!(!control.film_mode_detection);
    }
}
