// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The per-frame descriptor handed to the command encoder.

use crate::surface::Surface;
use crate::vebox::chroma::ChromaSitingConfig;
use crate::vebox::deinterlace::DeinterlaceControl;
use crate::vebox::deinterlace::DeinterlaceParameters;
use crate::vebox::denoise::DenoiseParameters;
use crate::vebox::double_buffer::Slot;
use crate::vebox::pipe::FastFill;
use crate::vebox::pipe::FeatureFlags;
use crate::vebox::pipe::OutputPipe;
use crate::vebox::pipe::Procamp;
use crate::vebox::statistics::StatisticsLayout;

/// A pool surface bound to the frame, with the double-buffer slot it comes from.
#[derive(Debug)]
pub struct SurfaceBinding<'a, H> {
    pub surface: &'a Surface<H>,
    pub slot: Slot,
}

// Manual impls, as deriving would require `H: Clone`.
impl<'a, H> Clone for SurfaceBinding<'a, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, H> Copy for SurfaceBinding<'a, H> {}

/// History surfaces read from the previous frame and written for the next one.
#[derive(Debug)]
pub struct HistoryBinding<'a, H> {
    pub input: SurfaceBinding<'a, H>,
    pub output: SurfaceBinding<'a, H>,
}

/// The surface the vebox writes its output to.
#[derive(Debug)]
pub enum OutputBinding<'a, H> {
    /// The caller's render target.
    RenderTarget(&'a Surface<H>),
    /// A pool surface consumed by the next stage.
    Intermediate(SurfaceBinding<'a, H>),
}

/// Everything the command encoder needs to program the vebox for one frame.
///
/// The descriptor borrows the processor that produced it, so the next frame can only be prepared
/// once it has been consumed.
#[derive(Debug)]
pub struct FrameDescriptor<'a, H> {
    pub pipe: OutputPipe,
    pub flags: FeatureFlags,
    pub input: &'a Surface<H>,
    /// Previous frame, if a valid reference exists.
    pub previous: Option<&'a Surface<H>>,
    pub output: OutputBinding<'a, H>,
    /// Deinterlaced output of this frame and of the previous one.
    pub deinterlaced: Option<[SurfaceBinding<'a, H>; 2]>,
    /// Denoised output of this frame. The previous one is bound as `previous`.
    pub denoised: Option<SurfaceBinding<'a, H>>,
    pub motion_history: Option<HistoryBinding<'a, H>>,
    pub statistics: &'a Surface<H>,
    pub histogram: Option<&'a Surface<H>>,
    pub lut: Option<&'a Surface<H>>,
    pub denoise_params: Option<DenoiseParameters>,
    pub deinterlace_params: Option<DeinterlaceParameters>,
    pub deinterlace_control: Option<DeinterlaceControl>,
    pub chroma_siting: ChromaSitingConfig,
    pub statistics_layout: StatisticsLayout,
    pub fast_fill: Option<FastFill>,
    pub procamp: Option<Procamp>,
}

impl<'a, H> FrameDescriptor<'a, H> {
    pub fn output_surface(&self) -> &'a Surface<H> {
        match self.output {
            OutputBinding::RenderTarget(surface) => surface,
            OutputBinding::Intermediate(binding) => binding.surface,
        }
    }
}

/// Outcome of the preparation of a frame.
#[derive(Debug)]
pub enum FramePlan<'a, H> {
    /// Nothing to render.
    NotNeeded,
    /// The frame goes entirely to the composition renderer, the vebox does nothing.
    Composition,
    /// The vebox runs, with its output going to the target or to the next stage.
    Vebox(FrameDescriptor<'a, H>),
}

impl<'a, H> FramePlan<'a, H> {
    pub fn into_descriptor(self) -> Option<FrameDescriptor<'a, H>> {
        match self {
            FramePlan::Vebox(descriptor) => Some(descriptor),
            _ => None,
        }
    }
}
