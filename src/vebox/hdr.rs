// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! HDR tone mapping through a 3D lookup table.
//!
//! The vebox maps each RGB triplet of a PQ-encoded source through a 3D LUT, which thus has to
//! encode the whole transfer: PQ decoding, tone mapping of the content to the luminance range of
//! the display and re-encoding for the output transfer function. The LUT contents are produced by
//! a [`LutGenerator`], and [`SoftwareLutGenerator`] computes them on the CPU.

use anyhow::anyhow;
use byteorder::ByteOrder;
use byteorder::LittleEndian;

use crate::backend::WritableHandle;
use crate::surface::Surface;

/// Output of the tone mapping.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum HdrMode {
    /// PQ-encoded HDR output, tone mapped to the display's peak luminance.
    #[default]
    HdrToHdr,
    /// BT.709-encoded SDR output.
    HdrToSdr,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HdrParams {
    pub mode: HdrMode,
    /// Peak luminance of the display, in nits.
    pub max_display_luminance: u32,
    /// Peak luminance of the content (MaxCLL), in nits.
    pub max_content_luminance: u32,
}

impl Default for HdrParams {
    fn default() -> Self {
        Self {
            mode: Default::default(),
            max_display_luminance: 1000,
            max_content_luminance: 4000,
        }
    }
}

/// Producer of the contents of the 3D LUT surface.
pub trait LutGenerator<H> {
    /// Write into `target` the LUT of `dimension` entries per axis implementing `params`.
    fn generate(
        &mut self,
        params: &HdrParams,
        dimension: u32,
        target: &mut Surface<H>,
    ) -> anyhow::Result<()>;
}

const PQ_M1: f64 = 2610.0 / 16384.0;
const PQ_M2: f64 = 2523.0 / 4096.0 * 128.0;
const PQ_C1: f64 = 3424.0 / 4096.0;
const PQ_C2: f64 = 2413.0 / 4096.0 * 32.0;
const PQ_C3: f64 = 2392.0 / 4096.0 * 32.0;
/// Luminance of a PQ code value of 1.0, in nits.
const PQ_MAX_LUMINANCE: f64 = 10000.0;
/// Fraction of the display's peak luminance below which content is left untouched.
const KNEE: f64 = 0.75;

/// ST 2084 EOTF: PQ code value to normalized linear luminance.
fn pq_eotf(e: f64) -> f64 {
    let p = e.clamp(0.0, 1.0).powf(1.0 / PQ_M2);
    ((p - PQ_C1).max(0.0) / (PQ_C2 - PQ_C3 * p)).powf(1.0 / PQ_M1)
}

/// ST 2084 inverse EOTF: normalized linear luminance to PQ code value.
fn pq_oetf(y: f64) -> f64 {
    let yp = y.clamp(0.0, 1.0).powf(PQ_M1);
    ((PQ_C1 + PQ_C2 * yp) / (1.0 + PQ_C3 * yp)).powf(PQ_M2)
}

fn bt709_oetf(l: f64) -> f64 {
    let l = l.clamp(0.0, 1.0);
    if l < 0.018 {
        4.5 * l
    } else {
        1.099 * l.powf(0.45) - 0.099
    }
}

/// Maps a luminance in nits from the content range to the display range, rolling off the
/// highlights above the knee.
fn tone_map(nits: f64, content_max: f64, display_max: f64) -> f64 {
    if content_max <= display_max {
        return nits.min(display_max);
    }

    let knee = display_max * KNEE;
    if nits <= knee {
        return nits;
    }

    let t = ((nits - knee) / (content_max - knee)).min(1.0);
    knee + (display_max - knee) * t * (2.0 - t)
}

fn to_u16(v: f64) -> u16 {
    (v.clamp(0.0, 1.0) * u16::MAX as f64).round() as u16
}

/// Computes the LUT for `params` with `dimension` entries per axis, red varying fastest. Each
/// entry is four little-endian 16-bit words: red, green, blue and an opaque alpha.
pub fn tone_mapping_lut(params: &HdrParams, dimension: u32) -> anyhow::Result<Vec<u8>> {
    if dimension < 2 {
        return Err(anyhow!("invalid 3D LUT dimension {}", dimension));
    }
    if params.max_display_luminance == 0 {
        return Err(anyhow!("display peak luminance cannot be zero"));
    }

    let display_max = params.max_display_luminance as f64;
    let content_max = params.max_content_luminance as f64;
    let step = 1.0 / (dimension - 1) as f64;

    // The mapping is per channel, so compute it once per axis value.
    let axis: Vec<u16> = (0..dimension)
        .map(|i| {
            let nits = pq_eotf(i as f64 * step) * PQ_MAX_LUMINANCE;
            let mapped = tone_map(nits, content_max, display_max);
            match params.mode {
                HdrMode::HdrToHdr => to_u16(pq_oetf(mapped / PQ_MAX_LUMINANCE)),
                HdrMode::HdrToSdr => to_u16(bt709_oetf(mapped / display_max)),
            }
        })
        .collect();

    let mut lut = vec![0u8; dimension.pow(3) as usize * 8];
    let mut entries = lut.chunks_exact_mut(8);
    for b in &axis {
        for g in &axis {
            for r in &axis {
                if let Some(entry) = entries.next() {
                    LittleEndian::write_u16_into(&[*r, *g, *b, u16::MAX], entry);
                }
            }
        }
    }

    Ok(lut)
}

/// Computes the LUT on the CPU and uploads it into a CPU-writable surface.
#[derive(Debug, Default)]
pub struct SoftwareLutGenerator;

impl<H: WritableHandle> LutGenerator<H> for SoftwareLutGenerator {
    fn generate(
        &mut self,
        params: &HdrParams,
        dimension: u32,
        target: &mut Surface<H>,
    ) -> anyhow::Result<()> {
        let lut = tone_mapping_lut(params, dimension)?;

        let capacity = target.info.resolution.area();
        if (lut.len() as u64) > capacity {
            return Err(anyhow!(
                "LUT of {} bytes does not fit in a surface of {} bytes",
                lut.len(),
                capacity
            ));
        }

        log::debug!(
            "Uploading {}^3 LUT for {:?}, content {} nits, display {} nits",
            dimension,
            params.mode,
            params.max_content_luminance,
            params.max_display_luminance
        );

        target.handle.write(0, &lut)
    }
}
