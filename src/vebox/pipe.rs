// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Output pipe selection.
//!
//! A frame can be produced by the vebox alone, by the vebox followed by a scaler, or by the
//! generic composition renderer (possibly fed with the output of the vebox). The rules below are
//! evaluated in order for each frame, the first one matching wins:
//!
//! 1. if the vebox is unusable (fused off, forced composition, unsupported input format or source
//!    not larger than the minimum extent), use composition,
//! 2. if the source needs a deinterlace mode the vebox cannot do, use composition,
//! 3. if the vebox can write the render target directly, use it alone,
//! 4. if a scaler is available and no HDR tone mapping is needed, let the scaler decide,
//! 5. otherwise use composition.
//!
//! Finally, a composition decision caused only by a color fill below a partial-height destination
//! is turned back into a vebox-only one, with the uncovered regions filled separately.

use crate::surface::Surface;
use crate::surface::SurfaceInfo;
use crate::vebox::deinterlace::is_deinterlace_supported;
use crate::vebox::deinterlace::DeinterlaceSettings;
use crate::vebox::denoise::DenoiseSettings;
use crate::vebox::hdr::HdrParams;
use crate::vebox::Result;
use crate::vebox::VeboxConfig;
use crate::vebox::VeboxError;
use crate::PixelFormat;
use crate::Rect;
use crate::Resolution;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OutputPipe {
    /// There is nothing to render.
    NotNeeded,
    /// The generic composition renderer produces the frame.
    Composition,
    /// The vebox writes the render target directly.
    VeboxOnly,
    /// The vebox output is scaled into the render target.
    VeboxWithScaler,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    None,
    Rotate90,
    Rotate180,
    Rotate270,
    MirrorHorizontal,
    MirrorVertical,
}

/// Basic color adjustments.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Procamp {
    /// In `[-100, 100]`.
    pub brightness: f32,
    /// In `[0, 10]`.
    pub contrast: f32,
    /// In degrees, in `[-180, 180]`.
    pub hue: f32,
    /// In `[0, 10]`.
    pub saturation: f32,
}

impl Default for Procamp {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: 1.0,
            hue: 0.0,
            saturation: 1.0,
        }
    }
}

impl Procamp {
    pub fn validate(&self) -> Result<()> {
        let ranges = [
            ("brightness", self.brightness, -100.0, 100.0),
            ("contrast", self.contrast, 0.0, 10.0),
            ("hue", self.hue, -180.0, 180.0),
            ("saturation", self.saturation, 0.0, 10.0),
        ];

        for (name, value, min, max) in ranges {
            if !(min..=max).contains(&value) {
                return Err(VeboxError::InvalidParameter(format!(
                    "procamp {} {} out of range [{}, {}]",
                    name, value, min, max
                )));
            }
        }

        Ok(())
    }
}

/// A source of the frame and the processing requested for it.
pub struct SourceLayer<'a, H> {
    pub surface: &'a Surface<H>,
    /// Previous frame of the sequence, used by advanced deinterlacing when denoise is off.
    pub backward_reference: Option<&'a Surface<H>>,
    /// Part of the source to render.
    pub src_rect: Rect,
    /// Where to render it in the target.
    pub dst_rect: Rect,
    pub denoise: Option<DenoiseSettings>,
    pub deinterlace: Option<DeinterlaceSettings>,
    pub procamp: Option<Procamp>,
    /// Adaptive contrast enhancement.
    pub ace: bool,
    pub rotation: Rotation,
    /// Alpha blending with the target.
    pub blending: bool,
    pub hdr: Option<HdrParams>,
}

impl<'a, H> SourceLayer<'a, H> {
    /// A layer rendering all of `surface` to `dst_rect` without any processing.
    pub fn new(surface: &'a Surface<H>, dst_rect: Rect) -> Self {
        Self {
            surface,
            backward_reference: None,
            src_rect: Rect::full(surface.resolution()),
            dst_rect,
            denoise: None,
            deinterlace: None,
            procamp: None,
            ace: false,
            rotation: Default::default(),
            blending: false,
            hdr: None,
        }
    }

    /// Whether deinterlacing has been requested and the source actually is interlaced.
    pub fn needs_deinterlace(&self) -> bool {
        self.deinterlace.is_some() && self.surface.info.sample_type.is_interlaced()
    }

    /// Whether any feature only the vebox provides has been requested.
    pub fn has_vebox_features(&self) -> bool {
        self.denoise.is_some() || self.needs_deinterlace() || self.procamp.is_some() || self.ace
    }
}

/// Everything the caller asks for a frame.
pub struct RenderParams<'a, H> {
    pub sources: Vec<SourceLayer<'a, H>>,
    pub target: &'a Surface<H>,
    /// Color to fill the parts of the target not covered by any source with.
    pub color_fill: Option<u32>,
    /// Only chain the scaler after the vebox when vebox features are requested.
    pub scaler_only_with_vebox_features: bool,
}

impl<'a, H> RenderParams<'a, H> {
    pub fn new(target: &'a Surface<H>) -> Self {
        Self {
            sources: Vec::new(),
            target,
            color_fill: None,
            scaler_only_with_vebox_features: false,
        }
    }

    /// Checks the caller contract: non-empty surfaces, non-empty rectangles lying within them and
    /// valid color adjustments.
    pub fn validate(&self) -> Result<()> {
        let target = self.target.resolution();
        if target.is_empty() {
            return Err(VeboxError::InvalidParameter(format!(
                "empty render target {:?}",
                target
            )));
        }

        for (i, layer) in self.sources.iter().enumerate() {
            let source = layer.surface.resolution();
            if source.is_empty() {
                return Err(VeboxError::InvalidParameter(format!(
                    "source {} is empty: {:?}",
                    i, source
                )));
            }
            if layer.src_rect.is_empty() || !layer.src_rect.fits_in(source) {
                return Err(VeboxError::InvalidParameter(format!(
                    "source rectangle {:?} of source {} does not fit in {:?}",
                    layer.src_rect, i, source
                )));
            }
            if layer.dst_rect.is_empty() || !layer.dst_rect.fits_in(target) {
                return Err(VeboxError::InvalidParameter(format!(
                    "destination rectangle {:?} of source {} does not fit in {:?}",
                    layer.dst_rect, i, target
                )));
            }
            if let Some(procamp) = &layer.procamp {
                procamp.validate()?;
            }
        }

        Ok(())
    }
}

/// Feasibility query of the scaler chained after the vebox.
pub trait ScalerFeasibility<H> {
    /// Returns the pipe to use for rendering `src` to `dst`: `VeboxWithScaler` if the scaler can
    /// handle the frame, `Composition` otherwise.
    fn query_output_pipe(
        &self,
        src: &SurfaceInfo,
        dst: &SurfaceInfo,
        params: &RenderParams<H>,
    ) -> OutputPipe;
}

/// Feasibility query of the composition renderer.
pub trait CompositionFeasibility<H> {
    fn supports(&self, params: &RenderParams<H>) -> bool;
}

/// Composition renderer able to handle any image format.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnyImageComposition;

impl<H> CompositionFeasibility<H> for AnyImageComposition {
    fn supports(&self, params: &RenderParams<H>) -> bool {
        params.target.info.format != PixelFormat::Buffer
            && params
                .sources
                .iter()
                .all(|layer| layer.surface.info.format != PixelFormat::Buffer)
    }
}

/// What the vebox remembers of the previous frame of the sequence.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryState {
    pub previous_frame_id: Option<u64>,
    /// Resolution of the source the history surfaces were produced from.
    pub history_resolution: Option<Resolution>,
}

impl HistoryState {
    /// Whether the history can be used as reference for `src`: it must have been produced from
    /// the frame immediately preceding it, at the same resolution.
    pub fn is_reference_valid(&self, src: &SurfaceInfo) -> bool {
        self.previous_frame_id
            .map_or(false, |id| id.checked_add(1) == Some(src.frame_id))
            && self.history_resolution == Some(src.resolution)
    }
}

/// Per-frame feature flags.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    pub denoise: bool,
    pub deinterlace: bool,
    pub color_processing: bool,
    pub reference_valid: bool,
    pub hdr: bool,
    pub ace: bool,
}

/// Color fill of the parts of the target left uncovered by a vebox-only frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FastFill {
    pub color: u32,
    pub regions: Vec<Rect>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipeDecision {
    pub pipe: OutputPipe,
    /// Whether the vebox can process this frame at all.
    pub vebox_usable: bool,
    /// Whether the vebox runs for this frame, possibly feeding the composition renderer.
    pub vebox_active: bool,
    pub flags: FeatureFlags,
    pub fast_fill: Option<FastFill>,
}

impl PipeDecision {
    fn not_needed() -> Self {
        Self {
            pipe: OutputPipe::NotNeeded,
            vebox_usable: false,
            vebox_active: false,
            flags: Default::default(),
            fast_fill: None,
        }
    }
}

/// Pipe selection for a given configuration and set of collaborators.
pub struct PipeSelector<'a, H> {
    pub config: &'a VeboxConfig,
    pub scaler: Option<&'a dyn ScalerFeasibility<H>>,
    pub composition: &'a dyn CompositionFeasibility<H>,
    /// Whether a LUT generator is available for HDR tone mapping.
    pub lut_generator: bool,
}

impl<'a, H> PipeSelector<'a, H> {
    /// Selects the output pipe of the frame described by `params` and its feature flags.
    ///
    /// The result only depends on the arguments. Fails with `UnsupportedConfiguration` if the
    /// frame ends up on the composition path and the composition renderer cannot handle it.
    pub fn select(&self, params: &RenderParams<H>, history: &HistoryState) -> Result<PipeDecision> {
        let Some(layer) = params.sources.first() else {
            return Ok(PipeDecision::not_needed());
        };

        let src = &layer.surface.info;
        let vebox_usable = self.is_vebox_usable(layer);

        let mut fast_fill = None;
        let pipe = if !vebox_usable {
            OutputPipe::Composition
        } else if self.is_vebox_only_feasible(params, Rect::full(params.target.resolution())) {
            OutputPipe::VeboxOnly
        } else if let Some(scaler) = self.usable_scaler(params, layer) {
            scaler.query_output_pipe(src, &params.target.info, params)
        } else {
            OutputPipe::Composition
        };

        let pipe = match (pipe, self.fast_fill(params, layer)) {
            (OutputPipe::Composition, Some(fill)) if vebox_usable => {
                log::debug!("Using vebox with fast color fill of {:?}", fill.regions);
                fast_fill = Some(fill);
                OutputPipe::VeboxOnly
            }
            (pipe, _) => pipe,
        };

        if pipe == OutputPipe::Composition && !self.composition.supports(params) {
            return Err(VeboxError::UnsupportedConfiguration(format!(
                "no output pipe can render {:?} to {:?}",
                src.format, params.target.info.format
            )));
        }

        let vebox_pipe = matches!(pipe, OutputPipe::VeboxOnly | OutputPipe::VeboxWithScaler);
        let denoise_requested = layer.denoise.is_some();
        let deinterlace_requested = layer.needs_deinterlace();
        let vebox_active =
            vebox_pipe || (vebox_usable && (denoise_requested || deinterlace_requested));

        let dst = &params.target.info;
        let color_processing = vebox_pipe
            && (layer.procamp.is_some()
                || layer.ace
                || layer.hdr.is_some()
                || src.color_space != dst.color_space
                || (pipe == OutputPipe::VeboxOnly && src.format != dst.format));

        let flags = FeatureFlags {
            denoise: denoise_requested && vebox_active,
            deinterlace: deinterlace_requested && vebox_active,
            color_processing,
            reference_valid: history.is_reference_valid(src),
            hdr: layer.hdr.is_some() && pipe == OutputPipe::VeboxOnly,
            ace: layer.ace && vebox_pipe,
        };

        log::debug!(
            "Selected {:?} for {:?} {:?} -> {:?} {:?}, vebox active: {}, {:?}",
            pipe,
            src.resolution,
            src.format,
            dst.resolution,
            dst.format,
            vebox_active,
            flags
        );

        Ok(PipeDecision {
            pipe,
            vebox_usable,
            vebox_active,
            flags,
            fast_fill,
        })
    }

    /// Rules 1 and 2: whether the vebox can process the first source at all.
    fn is_vebox_usable(&self, layer: &SourceLayer<H>) -> bool {
        let caps = self.config.generation.caps();
        let src = &layer.surface.info;

        if self.config.fused_off || self.config.force_composition {
            log::debug!("Vebox disabled by configuration");
            return false;
        }

        if !caps.supports_input(src.format) {
            log::debug!("Vebox does not support input format {:?}", src.format);
            return false;
        }

        // The minimum extent itself is not supported.
        if src.resolution.width <= caps.min_extent.width
            || src.resolution.height <= caps.min_extent.height
        {
            log::debug!(
                "Source {:?} not larger than vebox minimum {:?}",
                src.resolution,
                caps.min_extent
            );
            return false;
        }

        if let Some(settings) = &layer.deinterlace {
            if src.sample_type.is_interlaced()
                && !is_deinterlace_supported(src.format, src.resolution, settings.mode)
            {
                log::debug!(
                    "{:?} deinterlacing of {:?} {:?} not supported by vebox",
                    settings.mode,
                    src.format,
                    src.resolution
                );
                return false;
            }
        }

        true
    }

    /// Rule 3: whether the vebox alone can render the frame, writing `output_rect` of the target.
    fn is_vebox_only_feasible(&self, params: &RenderParams<H>, output_rect: Rect) -> bool {
        let caps = self.config.generation.caps();

        let [layer] = params.sources.as_slice() else {
            return false;
        };

        let hdr_ok = layer.hdr.is_none() || (caps.hdr_3dlut && self.lut_generator);

        layer.src_rect == Rect::full(layer.surface.resolution())
            && layer.src_rect.size() == layer.dst_rect.size()
            && layer.dst_rect == output_rect
            && layer.rotation == Rotation::None
            && !layer.blending
            && caps.supports_output(params.target.info.format)
            && hdr_ok
    }

    /// Rule 4: the scaler to query, if any.
    fn usable_scaler(
        &self,
        params: &RenderParams<H>,
        layer: &SourceLayer<H>,
    ) -> Option<&'a dyn ScalerFeasibility<H>> {
        if !self.config.scaler_available() || layer.hdr.is_some() {
            return None;
        }

        if params.scaler_only_with_vebox_features && !layer.has_vebox_features() {
            log::debug!("No vebox feature requested, leaving scaling to composition");
            return None;
        }

        self.scaler
    }

    /// Rule 6: the fast fill that makes a vebox-only frame possible despite a color fill, if any.
    fn fast_fill(&self, params: &RenderParams<H>, layer: &SourceLayer<H>) -> Option<FastFill> {
        let color = params.color_fill?;
        let target = params.target.resolution();
        let dst = layer.dst_rect;

        let partial_height = dst.x == 0 && dst.width == target.width && dst.height < target.height;
        if !partial_height || !self.is_vebox_only_feasible(params, dst) {
            return None;
        }

        let mut regions = Vec::with_capacity(2);
        if dst.y > 0 {
            regions.push(Rect::new(0, 0, target.width, dst.y));
        }
        let bottom = dst.y + dst.height;
        if bottom < target.height {
            regions.push(Rect::new(0, bottom, target.width, target.height - bottom));
        }

        Some(FastFill { color, regions })
    }
}
