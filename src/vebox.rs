// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-frame control of the video enhancement box.
//!
//! For each frame, [`processor::VeboxProcessor::prepare_frame`] runs the following stages:
//!
//! * the [pipe selector](pipe) decides which hardware path produces the frame and which vebox
//!   features are active,
//! * the [surface pool](surface_pool) (re)allocates the auxiliary surfaces these features need,
//! * the filter parameters are derived from the frame's properties ([denoise], [deinterlace],
//!   [chroma]),
//! * everything is bound into a [`frame::FrameDescriptor`] for the command encoder.
//!
//! Any failure along the way rolls the surface pool back to its state before the frame.

pub mod chroma;
pub mod deinterlace;
pub mod denoise;
pub mod double_buffer;
pub mod frame;
pub mod generation;
pub mod hdr;
pub mod pipe;
pub mod processor;
pub mod statistics;
pub mod surface_pool;

use thiserror::Error;

pub use frame::FrameDescriptor;
pub use frame::FramePlan;
pub use generation::HardwareGeneration;
pub use pipe::OutputPipe;
pub use pipe::RenderParams;
pub use processor::VeboxProcessor;

use crate::surface::SurfaceKind;

#[derive(Error, Debug)]
pub enum VeboxError {
    #[error("failed to allocate {kind:?} surface: {source:#}")]
    Allocation {
        kind: SurfaceKind,
        source: anyhow::Error,
    },
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VeboxError>;

/// Static configuration of a [`VeboxProcessor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VeboxConfig {
    /// Generation of the hardware block, selecting its capabilities and constants.
    pub generation: HardwareGeneration,
    /// The vebox is fused off on this part and must never be used.
    pub fused_off: bool,
    /// Always use the composition path. Debugging aid.
    pub force_composition: bool,
    /// Whether a scaler may be chained after the vebox, provided the generation has one.
    pub allow_scaler: bool,
}

impl Default for VeboxConfig {
    fn default() -> Self {
        Self {
            generation: Default::default(),
            fused_off: false,
            force_composition: false,
            allow_scaler: true,
        }
    }
}

impl VeboxConfig {
    /// Whether a scaler can be used after the vebox with this configuration.
    pub fn scaler_available(&self) -> bool {
        self.allow_scaler && self.generation.caps().scaler
    }
}
