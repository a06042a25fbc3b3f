// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The vebox processor, running the per-frame control flow.

use crate::backend::AllocationRequest;
use crate::backend::CompressionCaps;
use crate::backend::ResourceAllocator;
use crate::surface::Compression;
use crate::surface::Surface;
use crate::surface::SurfaceInfo;
use crate::surface::SurfaceKind;
use crate::surface::TileMode;
use crate::vebox::chroma::derive_chroma_siting;
use crate::vebox::deinterlace::derive_deinterlace_params;
use crate::vebox::deinterlace::DeinterlaceControl;
use crate::vebox::deinterlace::ResolutionClass;
use crate::vebox::denoise::derive_denoise_params;
use crate::vebox::double_buffer::PingPong;
use crate::vebox::double_buffer::Slot;
use crate::vebox::frame::FrameDescriptor;
use crate::vebox::frame::FramePlan;
use crate::vebox::frame::HistoryBinding;
use crate::vebox::frame::OutputBinding;
use crate::vebox::frame::SurfaceBinding;
use crate::vebox::hdr::HdrParams;
use crate::vebox::hdr::LutGenerator;
use crate::vebox::pipe::AnyImageComposition;
use crate::vebox::pipe::CompositionFeasibility;
use crate::vebox::pipe::HistoryState;
use crate::vebox::pipe::OutputPipe;
use crate::vebox::pipe::PipeDecision;
use crate::vebox::pipe::PipeSelector;
use crate::vebox::pipe::RenderParams;
use crate::vebox::pipe::ScalerFeasibility;
use crate::vebox::surface_pool::PoolSlot;
use crate::vebox::surface_pool::SurfacePool;
use crate::vebox::Result;
use crate::vebox::VeboxConfig;
use crate::vebox::VeboxError;
use crate::PixelFormat;
use crate::Resolution;

/// Surfaces a frame needs, in allocation order. `None` means the kind is released.
struct SurfaceRequirements {
    denoised: Option<AllocationRequest>,
    motion_history: Option<AllocationRequest>,
    deinterlaced: Option<AllocationRequest>,
    statistics: AllocationRequest,
    histogram: Option<AllocationRequest>,
    lut: Option<AllocationRequest>,
}

/// Every kind of surface owned by the processor.
const OWNED_KINDS: [SurfaceKind; 6] = [
    SurfaceKind::Denoised,
    SurfaceKind::MotionHistory,
    SurfaceKind::Deinterlaced,
    SurfaceKind::Statistics,
    SurfaceKind::Histogram,
    SurfaceKind::Lut3d,
];

impl SurfaceRequirements {
    fn entries(&self) -> [(SurfaceKind, Option<&AllocationRequest>); 6] {
        [
            (SurfaceKind::Denoised, self.denoised.as_ref()),
            (SurfaceKind::MotionHistory, self.motion_history.as_ref()),
            (SurfaceKind::Deinterlaced, self.deinterlaced.as_ref()),
            (SurfaceKind::Statistics, Some(&self.statistics)),
            (SurfaceKind::Histogram, self.histogram.as_ref()),
            (SurfaceKind::Lut3d, self.lut.as_ref()),
        ]
    }
}

/// Surfaces (re)allocated while preparing a frame.
#[derive(Debug, Default)]
struct Reallocations {
    /// A denoise or motion history surface was reallocated, so its contents are not a valid
    /// reference anymore.
    history: bool,
    motion_history: [bool; 2],
    lut: bool,
}

fn buffer_request(kind: SurfaceKind, resolution: Resolution) -> AllocationRequest {
    AllocationRequest {
        kind,
        resolution,
        format: PixelFormat::Buffer,
        tile_mode: TileMode::Linear,
        compression: Compression::DISABLED,
    }
}

/// Controls the vebox of one video processing context.
///
/// The processor owns the auxiliary surfaces of the vebox and the state carried from one frame to
/// the next. Frames are prepared one at a time with [`VeboxProcessor::prepare_frame`].
pub struct VeboxProcessor<A: ResourceAllocator> {
    config: VeboxConfig,
    allocator: A,
    compression: Box<dyn CompressionCaps>,
    scaler: Option<Box<dyn ScalerFeasibility<A::Handle>>>,
    composition: Box<dyn CompositionFeasibility<A::Handle>>,
    lut_generator: Option<Box<dyn LutGenerator<A::Handle>>>,
    pool: SurfacePool<A::Handle>,
    denoised: PingPong,
    motion_history: PingPong,
    deinterlaced: PingPong,
    history: HistoryState,
    /// Parameters the current contents of the LUT surface have been generated for.
    lut_params: Option<HdrParams>,
}

impl<A: ResourceAllocator> VeboxProcessor<A> {
    pub fn new<C>(config: VeboxConfig, allocator: A, compression: C) -> Self
    where
        C: CompressionCaps + 'static,
    {
        log::debug!("Creating vebox processor with {:?}", config);

        Self {
            config,
            allocator,
            compression: Box::new(compression),
            scaler: None,
            composition: Box::new(AnyImageComposition),
            lut_generator: None,
            pool: SurfacePool::new(),
            denoised: PingPong::new(),
            motion_history: PingPong::new(),
            deinterlaced: PingPong::new(),
            history: Default::default(),
            lut_params: None,
        }
    }

    pub fn with_scaler<S>(mut self, scaler: S) -> Self
    where
        S: ScalerFeasibility<A::Handle> + 'static,
    {
        self.scaler = Some(Box::new(scaler));
        self
    }

    pub fn with_composition<C>(mut self, composition: C) -> Self
    where
        C: CompositionFeasibility<A::Handle> + 'static,
    {
        self.composition = Box::new(composition);
        self
    }

    pub fn with_lut_generator<G>(mut self, generator: G) -> Self
    where
        G: LutGenerator<A::Handle> + 'static,
    {
        self.lut_generator = Some(Box::new(generator));
        self
    }

    pub fn config(&self) -> &VeboxConfig {
        &self.config
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut A {
        &mut self.allocator
    }

    pub fn pool(&self) -> &SurfacePool<A::Handle> {
        &self.pool
    }

    pub fn history(&self) -> &HistoryState {
        &self.history
    }

    /// Prepares the frame described by `params`.
    ///
    /// On success with [`FramePlan::Vebox`], the returned descriptor holds everything needed to
    /// program the vebox and the double buffers have been advanced. Frames without vebox work
    /// release every vebox surface. On failure the surface pool and the double buffers are left as
    /// they were before the call.
    pub fn prepare_frame<'a>(
        &'a mut self,
        params: &RenderParams<'a, A::Handle>,
    ) -> Result<FramePlan<'a, A::Handle>> {
        params.validate()?;

        let decision = PipeSelector {
            config: &self.config,
            scaler: self.scaler.as_deref(),
            composition: self.composition.as_ref(),
            lut_generator: self.lut_generator.is_some(),
        }
        .select(params, &self.history)?;

        if decision.pipe == OutputPipe::NotNeeded || !decision.vebox_active {
            // The sequence is interrupted for the vebox, none of its surfaces is needed anymore.
            self.release_all();
            return Ok(match decision.pipe {
                OutputPipe::NotNeeded => FramePlan::NotNeeded,
                _ => FramePlan::Composition,
            });
        }

        let layer = params.sources.first().ok_or_else(|| {
            VeboxError::InvalidParameter("vebox frame without source".to_string())
        })?;
        let src = &layer.surface.info;
        let dst = &params.target.info;

        let requirements = self.surface_requirements(&decision, src, dst)?;
        let hdr = layer.hdr.filter(|_| decision.flags.hdr);

        let reallocations = match self.acquire_surfaces(&requirements, hdr.as_ref()) {
            Ok(reallocations) => reallocations,
            Err(e) => {
                log::warn!("Failed to prepare vebox surfaces: {}", e);
                self.pool.rollback(&mut self.allocator);
                return Err(e);
            }
        };
        self.pool.commit(&mut self.allocator);
        self.lut_params = hdr;

        let mut flags = decision.flags;
        if reallocations.history && flags.reference_valid {
            log::debug!("History surfaces reallocated, reference is not valid anymore");
            flags.reference_valid = false;
        }

        let temporal = flags.denoise || flags.deinterlace;
        let denoised_slots = (self.denoised.other(), self.denoised.current());
        let motion_slots = (self.motion_history.current(), self.motion_history.other());
        let deinterlaced_slots = (self.deinterlaced.other(), self.deinterlaced.current());

        // The descriptor only borrows the pool, the double buffers stay free to advance once
        // everything is bound.
        let pool: &'a SurfacePool<A::Handle> = &self.pool;
        let generation = self.config.generation;
        let caps = generation.caps();

        let denoised = if flags.denoise {
            Some(bind(pool, SurfaceKind::Denoised, denoised_slots.0)?)
        } else {
            None
        };

        let previous = match (flags.reference_valid, flags.denoise) {
            (false, _) => None,
            (true, true) => Some(pooled(pool, SurfaceKind::Denoised, denoised_slots.1)?),
            (true, false) => layer.backward_reference,
        };

        let motion_history = if temporal {
            Some(HistoryBinding {
                input: bind(pool, SurfaceKind::MotionHistory, motion_slots.0)?,
                output: bind(pool, SurfaceKind::MotionHistory, motion_slots.1)?,
            })
        } else {
            None
        };

        let output = if decision.pipe == OutputPipe::VeboxOnly {
            OutputBinding::RenderTarget(params.target)
        } else {
            let binding = bind(pool, SurfaceKind::Deinterlaced, deinterlaced_slots.0)?;
            OutputBinding::Intermediate(binding)
        };

        let deinterlaced = if flags.deinterlace {
            Some([
                bind(pool, SurfaceKind::Deinterlaced, deinterlaced_slots.0)?,
                bind(pool, SurfaceKind::Deinterlaced, deinterlaced_slots.1)?,
            ])
        } else {
            None
        };

        let statistics = pooled(pool, SurfaceKind::Statistics, Slot::A)?;
        let histogram = if flags.ace {
            Some(pooled(pool, SurfaceKind::Histogram, Slot::A)?)
        } else {
            None
        };
        let lut = if flags.hdr {
            Some(pooled(pool, SurfaceKind::Lut3d, Slot::A)?)
        } else {
            None
        };

        let denoise_params = match (&layer.denoise, flags.denoise) {
            (Some(settings), true) => {
                let mut params = derive_denoise_params(
                    generation,
                    settings.strength,
                    settings.auto_detect,
                    src.format,
                );
                if !settings.chroma {
                    params.chroma = None;
                }
                Some(params)
            }
            _ => None,
        };

        let deinterlace = layer.deinterlace.filter(|_| flags.deinterlace);
        let deinterlace_params =
            deinterlace.map(|_| derive_deinterlace_params(ResolutionClass::of(src.resolution)));
        let deinterlace_control = deinterlace.map(|settings| {
            DeinterlaceControl::resolve(&settings, src.sample_type, previous.is_some())
        });

        let descriptor = FrameDescriptor {
            pipe: decision.pipe,
            flags,
            input: layer.surface,
            previous,
            output,
            deinterlaced,
            denoised,
            motion_history,
            statistics,
            histogram,
            lut,
            denoise_params,
            deinterlace_params,
            deinterlace_control,
            chroma_siting: derive_chroma_siting(
                src,
                dst,
                flags.deinterlace,
                flags.color_processing,
            ),
            statistics_layout: caps.statistics,
            fast_fill: decision.fast_fill,
            procamp: layer.procamp.filter(|_| flags.color_processing),
        };

        // Everything is bound, the next frame reads what this one writes.
        if flags.denoise {
            self.denoised.swap();
        }
        if temporal {
            self.motion_history.swap();
        }
        if requirements.deinterlaced.is_some() {
            self.deinterlaced.swap();
        }
        log::trace!(
            "Double buffers now at denoised {:?}, motion history {:?}, deinterlaced {:?}",
            self.denoised.current(),
            self.motion_history.current(),
            self.deinterlaced.current()
        );

        self.history = if temporal {
            HistoryState {
                previous_frame_id: Some(src.frame_id),
                history_resolution: Some(src.resolution),
            }
        } else {
            Default::default()
        };

        log::trace!(
            "Frame {} bound: pipe {:?}, previous {}, output to {}",
            src.frame_id,
            descriptor.pipe,
            descriptor.previous.is_some(),
            match descriptor.output {
                OutputBinding::RenderTarget(_) => "render target",
                OutputBinding::Intermediate(_) => "intermediate",
            }
        );

        Ok(FramePlan::Vebox(descriptor))
    }

    /// Computes the surfaces needed by the features of `decision`.
    fn surface_requirements(
        &self,
        decision: &PipeDecision,
        src: &SurfaceInfo,
        dst: &SurfaceInfo,
    ) -> Result<SurfaceRequirements> {
        let caps = self.config.generation.caps();
        let flags = &decision.flags;

        // The vebox cannot change the compression state when it only denoises: input, output and
        // denoise history must all agree.
        let denoise_only = decision.pipe == OutputPipe::VeboxOnly
            && flags.denoise
            && !flags.deinterlace
            && !flags.color_processing;
        if denoise_only && src.compression.enabled != dst.compression.enabled {
            return Err(VeboxError::UnsupportedConfiguration(format!(
                "denoise only with input compression {:?} and output compression {:?}",
                src.compression, dst.compression
            )));
        }

        let compression_for = |format: PixelFormat| {
            if denoise_only {
                src.compression
            } else if caps.memory_compression
                && self.compression.is_global_compression_enabled()
                && self.compression.is_format_compression_supported(format)
            {
                Compression::enabled(caps.compression_mode)
            } else {
                Compression::DISABLED
            }
        };

        let image_request = |kind: SurfaceKind, format: PixelFormat, compression: Compression| {
            AllocationRequest {
                kind,
                resolution: src.resolution,
                format,
                tile_mode: caps.tile_mode,
                compression,
            }
        };

        let temporal = flags.denoise || flags.deinterlace;
        let deinterlaced_format = if flags.color_processing {
            dst.format
        } else {
            src.format
        };

        Ok(SurfaceRequirements {
            denoised: flags.denoise.then(|| {
                image_request(
                    SurfaceKind::Denoised,
                    src.format,
                    compression_for(src.format),
                )
            }),
            motion_history: temporal.then(|| {
                image_request(
                    SurfaceKind::MotionHistory,
                    PixelFormat::Y8,
                    Compression::DISABLED,
                )
            }),
            deinterlaced: (flags.deinterlace || decision.pipe != OutputPipe::VeboxOnly).then(
                || {
                    image_request(
                        SurfaceKind::Deinterlaced,
                        deinterlaced_format,
                        compression_for(deinterlaced_format),
                    )
                },
            ),
            statistics: buffer_request(
                SurfaceKind::Statistics,
                caps.statistics.extent(src.resolution),
            ),
            histogram: flags.ace.then(|| {
                buffer_request(
                    SurfaceKind::Histogram,
                    Resolution::from((caps.histogram_size, 1)),
                )
            }),
            lut: flags.hdr.then(|| {
                buffer_request(SurfaceKind::Lut3d, Resolution::from((caps.lut_size(), 1)))
            }),
        })
    }

    /// Brings the pool in line with `requirements`. Changes are left uncommitted.
    fn acquire_surfaces(
        &mut self,
        requirements: &SurfaceRequirements,
        hdr: Option<&HdrParams>,
    ) -> Result<Reallocations> {
        let mut reallocations = Reallocations::default();

        for (kind, request) in requirements.entries() {
            let Some(request) = request else {
                self.pool.release_surface(&mut self.allocator, kind);
                continue;
            };

            let slots: &[Slot] = if kind.is_double_buffered() {
                &[Slot::A, Slot::B]
            } else {
                &[Slot::A]
            };

            for &slot in slots {
                let (_, reallocated) = self
                    .pool
                    .ensure_surface(&mut self.allocator, slot, request)?;
                if !reallocated {
                    continue;
                }

                match kind {
                    SurfaceKind::Denoised => reallocations.history = true,
                    SurfaceKind::MotionHistory => {
                        reallocations.history = true;
                        reallocations.motion_history[slot.index()] = true;
                    }
                    SurfaceKind::Lut3d => reallocations.lut = true,
                    _ => (),
                }
            }
        }

        for slot in [Slot::A, Slot::B] {
            if reallocations.motion_history[slot.index()] {
                self.pool.initialize_history(
                    &mut self.allocator,
                    PoolSlot::new(SurfaceKind::MotionHistory, slot),
                )?;
            }
        }

        if let Some(hdr) = hdr {
            if reallocations.lut || self.lut_params.as_ref() != Some(hdr) {
                self.refresh_lut(hdr)?;
            }
        }

        Ok(reallocations)
    }

    fn refresh_lut(&mut self, hdr: &HdrParams) -> Result<()> {
        let dimension = self.config.generation.caps().lut_dimension;
        let generator = self.lut_generator.as_mut().ok_or_else(|| {
            VeboxError::UnsupportedConfiguration("HDR tone mapping without LUT generator".into())
        })?;
        let surface = self
            .pool
            .get_mut(PoolSlot::single(SurfaceKind::Lut3d))
            .ok_or_else(|| VeboxError::InvalidParameter("no LUT surface to refresh".into()))?;

        log::debug!("Refreshing 3D LUT for {:?}", hdr);
        // The contents are undefined until the generator succeeds.
        self.lut_params = None;
        generator.generate(hdr, dimension, surface)?;

        Ok(())
    }

    /// Frees every vebox surface and forgets the sequence.
    fn release_all(&mut self) {
        for kind in OWNED_KINDS {
            self.pool.release_surface(&mut self.allocator, kind);
        }
        self.pool.commit(&mut self.allocator);

        self.history = Default::default();
        self.lut_params = None;
    }
}

fn pooled<H>(pool: &SurfacePool<H>, kind: SurfaceKind, slot: Slot) -> Result<&Surface<H>> {
    pool.get(PoolSlot::new(kind, slot)).ok_or_else(|| {
        VeboxError::Other(anyhow::anyhow!(
            "{:?} surface of slot {:?} missing from the pool",
            kind,
            slot
        ))
    })
}

fn bind<H>(
    pool: &SurfacePool<H>,
    kind: SurfaceKind,
    slot: Slot,
) -> Result<SurfaceBinding<'_, H>> {
    Ok(SurfaceBinding {
        surface: pooled(pool, kind, slot)?,
        slot,
    })
}

impl<A: ResourceAllocator> Drop for VeboxProcessor<A> {
    fn drop(&mut self) {
        self.pool.destroy(&mut self.allocator);
    }
}
