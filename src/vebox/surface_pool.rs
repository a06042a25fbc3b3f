// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Pool of the auxiliary surfaces used by the vebox.
//!
//! Surfaces are (re)allocated lazily to match what the features of the current frame need. All
//! changes made while preparing a frame are journaled: surfaces replaced or released are kept
//! alive until [`SurfacePool::commit`], and [`SurfacePool::rollback`] frees whatever was acquired
//! and restores them. A frame that fails half-way thus leaves the pool exactly as it found it.

use std::collections::BTreeMap;

use crate::backend::AllocationRequest;
use crate::backend::ResourceAllocator;
use crate::surface::Surface;
use crate::surface::SurfaceKind;
use crate::vebox::double_buffer::Slot;
use crate::vebox::Result;
use crate::vebox::VeboxError;

/// Position of a surface in the pool. Single-buffered kinds only use [`Slot::A`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolSlot {
    pub kind: SurfaceKind,
    pub slot: Slot,
}

impl PoolSlot {
    pub fn new(kind: SurfaceKind, slot: Slot) -> Self {
        Self { kind, slot }
    }

    pub fn single(kind: SurfaceKind) -> Self {
        Self::new(kind, Slot::A)
    }
}

pub struct SurfacePool<H> {
    surfaces: BTreeMap<PoolSlot, Surface<H>>,
    /// Slots whose surface has been allocated since the last commit or rollback.
    acquired: Vec<PoolSlot>,
    /// Surfaces replaced or released since the last commit or rollback. Freed on commit,
    /// restored on rollback.
    displaced: Vec<(PoolSlot, Surface<H>)>,
}

impl<H> Default for SurfacePool<H> {
    fn default() -> Self {
        Self {
            surfaces: Default::default(),
            acquired: Default::default(),
            displaced: Default::default(),
        }
    }
}

impl<H> SurfacePool<H> {
    pub fn new() -> Self {
        Default::default()
    }

    /// Makes sure the surface at `slot` of `request.kind` satisfies `request`, allocating a new
    /// one if it does not exist or differs in size, format, tiling or compression.
    ///
    /// Returns the surface and whether it has been (re)allocated by this call.
    pub fn ensure_surface<A>(
        &mut self,
        allocator: &mut A,
        slot: Slot,
        request: &AllocationRequest,
    ) -> Result<(&Surface<H>, bool)>
    where
        A: ResourceAllocator<Handle = H>,
    {
        let key = PoolSlot::new(request.kind, slot);
        let satisfied = self
            .surfaces
            .get(&key)
            .map_or(false, |s| request.is_satisfied_by(&s.info));

        if !satisfied {
            let surface = allocator
                .allocate(request)
                .map_err(|source| VeboxError::Allocation {
                    kind: request.kind,
                    source,
                })?;

            log::debug!(
                "Allocated {:?} surface for slot {:?}: {:?} {:?} {:?} {:?}",
                request.kind,
                slot,
                request.resolution,
                request.format,
                request.tile_mode,
                request.compression
            );

            if let Some(old) = self.surfaces.insert(key, surface) {
                self.retire(allocator, key, old);
            }
            if !self.acquired.contains(&key) {
                self.acquired.push(key);
            }
        }

        Ok((&self.surfaces[&key], !satisfied))
    }

    /// Releases both slots of `kind`. Does nothing for slots that hold no surface.
    pub fn release_surface<A>(&mut self, allocator: &mut A, kind: SurfaceKind)
    where
        A: ResourceAllocator<Handle = H>,
    {
        for slot in [Slot::A, Slot::B] {
            let key = PoolSlot::new(kind, slot);
            if let Some(surface) = self.surfaces.remove(&key) {
                log::debug!("Releasing {:?} surface of slot {:?}", kind, slot);
                self.retire(allocator, key, surface);
                self.acquired.retain(|k| *k != key);
            }
        }
    }

    /// Sets a freshly allocated history surface to zero, so the first frame using it sees a
    /// defined baseline.
    pub fn initialize_history<A>(&mut self, allocator: &mut A, slot: PoolSlot) -> Result<()>
    where
        A: ResourceAllocator<Handle = H>,
    {
        let surface = self.surfaces.get_mut(&slot).ok_or_else(|| {
            VeboxError::InvalidParameter(format!("no surface to initialize at {:?}", slot))
        })?;

        allocator
            .fill(surface, 0)
            .map_err(|source| VeboxError::Allocation {
                kind: slot.kind,
                source,
            })
    }

    /// Frees the surfaces replaced or released since the last commit and makes the current
    /// contents of the pool the new baseline.
    pub fn commit<A>(&mut self, allocator: &mut A)
    where
        A: ResourceAllocator<Handle = H>,
    {
        for (_, surface) in self.displaced.drain(..) {
            allocator.free(surface);
        }
        self.acquired.clear();
    }

    /// Frees the surfaces acquired since the last commit and restores the ones they replaced.
    pub fn rollback<A>(&mut self, allocator: &mut A)
    where
        A: ResourceAllocator<Handle = H>,
    {
        if !self.acquired.is_empty() || !self.displaced.is_empty() {
            log::warn!(
                "Rolling back {} acquired and {} displaced surfaces",
                self.acquired.len(),
                self.displaced.len()
            );
        }

        for key in self.acquired.drain(..) {
            if let Some(surface) = self.surfaces.remove(&key) {
                allocator.free(surface);
            }
        }

        while let Some((key, surface)) = self.displaced.pop() {
            if let Some(stray) = self.surfaces.insert(key, surface) {
                allocator.free(stray);
            }
        }
    }

    /// Frees every surface of the pool, including pending ones.
    pub fn destroy<A>(&mut self, allocator: &mut A)
    where
        A: ResourceAllocator<Handle = H>,
    {
        self.acquired.clear();
        for (_, surface) in self.displaced.drain(..) {
            allocator.free(surface);
        }
        for (_, surface) in std::mem::take(&mut self.surfaces) {
            allocator.free(surface);
        }
    }

    pub fn get(&self, slot: PoolSlot) -> Option<&Surface<H>> {
        self.surfaces.get(&slot)
    }

    pub fn get_mut(&mut self, slot: PoolSlot) -> Option<&mut Surface<H>> {
        self.surfaces.get_mut(&slot)
    }

    pub fn contains(&self, slot: PoolSlot) -> bool {
        self.surfaces.contains_key(&slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PoolSlot, &Surface<H>)> {
        self.surfaces.iter().map(|(k, v)| (*k, v))
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Returns `true` if there are no uncommitted changes.
    pub fn is_settled(&self) -> bool {
        self.acquired.is_empty() && self.displaced.is_empty()
    }

    /// Takes `surface`, just removed from `key`, out of the pool: surfaces acquired during this
    /// frame were never visible before it and are freed right away, others wait for the commit.
    fn retire<A>(&mut self, allocator: &mut A, key: PoolSlot, surface: Surface<H>)
    where
        A: ResourceAllocator<Handle = H>,
    {
        if self.acquired.contains(&key) {
            allocator.free(surface);
        } else {
            self.displaced.push((key, surface));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::Allocator;
    use crate::backend::dummy::Handle;
    use crate::surface::Compression;
    use crate::surface::CompressionMode;
    use crate::surface::TileMode;
    use crate::PixelFormat;
    use crate::Resolution;

    fn request(kind: SurfaceKind, width: u32, height: u32) -> AllocationRequest {
        AllocationRequest {
            kind,
            resolution: Resolution::from((width, height)),
            format: PixelFormat::NV12,
            tile_mode: TileMode::TileY,
            compression: Compression::DISABLED,
        }
    }

    fn snapshot(pool: &SurfacePool<Handle>) -> Vec<(PoolSlot, u64)> {
        pool.iter().map(|(k, s)| (k, s.handle.id)).collect()
    }

    #[test]
    fn ensure_is_idempotent() {
        let mut allocator = Allocator::new();
        let mut pool = SurfacePool::new();
        let req = request(SurfaceKind::Denoised, 1920, 1080);

        let (surface, reallocated) = pool.ensure_surface(&mut allocator, Slot::A, &req).unwrap();
        let id = surface.handle.id;
        assert!(reallocated);
        pool.commit(&mut allocator);

        let (surface, reallocated) = pool.ensure_surface(&mut allocator, Slot::A, &req).unwrap();
        assert!(!reallocated);
        assert_eq!(surface.handle.id, id);
        assert_eq!(allocator.allocations, 1);
    }

    #[test]
    fn reallocates_on_any_difference() {
        let mut allocator = Allocator::new();
        let mut pool = SurfacePool::new();
        let req = request(SurfaceKind::Denoised, 1920, 1080);
        pool.ensure_surface(&mut allocator, Slot::A, &req).unwrap();
        pool.commit(&mut allocator);

        let variants = [
            request(SurfaceKind::Denoised, 1280, 720),
            AllocationRequest {
                format: PixelFormat::P010,
                ..req
            },
            AllocationRequest {
                tile_mode: TileMode::Linear,
                ..req
            },
            AllocationRequest {
                compression: Compression::enabled(CompressionMode::Media),
                ..req
            },
        ];

        for variant in variants {
            let (_, reallocated) = pool
                .ensure_surface(&mut allocator, Slot::A, &variant)
                .unwrap();
            assert!(reallocated);
            pool.commit(&mut allocator);
            assert_eq!(allocator.num_live(), 1);
        }
    }

    #[test]
    fn rollback_restores_pre_frame_state() {
        let mut allocator = Allocator::new();
        let mut pool = SurfacePool::new();
        pool.ensure_surface(
            &mut allocator,
            Slot::A,
            &request(SurfaceKind::Denoised, 720, 480),
        )
        .unwrap();
        pool.ensure_surface(
            &mut allocator,
            Slot::A,
            &request(SurfaceKind::Histogram, 1024, 1),
        )
        .unwrap();
        pool.commit(&mut allocator);
        let before = snapshot(&pool);

        // Resize one surface, release another and allocate a new one, then fail.
        pool.ensure_surface(
            &mut allocator,
            Slot::A,
            &request(SurfaceKind::Denoised, 1920, 1080),
        )
        .unwrap();
        pool.release_surface(&mut allocator, SurfaceKind::Histogram);
        pool.ensure_surface(
            &mut allocator,
            Slot::B,
            &request(SurfaceKind::Denoised, 1920, 1080),
        )
        .unwrap();
        allocator.fail_on = Some(SurfaceKind::Statistics);
        let err = pool
            .ensure_surface(
                &mut allocator,
                Slot::A,
                &request(SurfaceKind::Statistics, 1920, 271),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            VeboxError::Allocation {
                kind: SurfaceKind::Statistics,
                ..
            }
        ));

        pool.rollback(&mut allocator);
        assert_eq!(snapshot(&pool), before);
        assert_eq!(allocator.num_live(), 2);
        assert!(pool.is_settled());
    }

    #[test]
    fn commit_frees_replaced_surfaces() {
        let mut allocator = Allocator::new();
        let mut pool = SurfacePool::new();
        pool.ensure_surface(
            &mut allocator,
            Slot::A,
            &request(SurfaceKind::MotionHistory, 720, 480),
        )
        .unwrap();
        pool.commit(&mut allocator);

        pool.ensure_surface(
            &mut allocator,
            Slot::A,
            &request(SurfaceKind::MotionHistory, 1280, 720),
        )
        .unwrap();
        // Old and new are both alive until the commit.
        assert_eq!(allocator.num_live(), 2);
        pool.commit(&mut allocator);
        assert_eq!(allocator.num_live(), 1);
    }

    #[test]
    fn resizing_twice_in_a_frame_keeps_the_original_for_rollback() {
        let mut allocator = Allocator::new();
        let mut pool = SurfacePool::new();
        pool.ensure_surface(
            &mut allocator,
            Slot::A,
            &request(SurfaceKind::Deinterlaced, 720, 480),
        )
        .unwrap();
        pool.commit(&mut allocator);
        let before = snapshot(&pool);

        for (w, h) in [(1280, 720), (1920, 1080)] {
            pool.ensure_surface(
                &mut allocator,
                Slot::A,
                &request(SurfaceKind::Deinterlaced, w, h),
            )
            .unwrap();
        }
        assert_eq!(allocator.num_live(), 2);

        pool.rollback(&mut allocator);
        assert_eq!(snapshot(&pool), before);
        assert_eq!(allocator.num_live(), 1);
    }

    #[test]
    fn release_is_a_noop_when_empty() {
        let mut allocator = Allocator::new();
        let mut pool: SurfacePool<Handle> = SurfacePool::new();
        pool.release_surface(&mut allocator, SurfaceKind::Lut3d);
        assert!(pool.is_empty());
        assert!(pool.is_settled());
    }

    #[test]
    fn release_of_surface_acquired_in_frame_frees_it() {
        let mut allocator = Allocator::new();
        let mut pool = SurfacePool::new();
        pool.ensure_surface(
            &mut allocator,
            Slot::A,
            &request(SurfaceKind::Lut3d, 4096, 1),
        )
        .unwrap();
        pool.release_surface(&mut allocator, SurfaceKind::Lut3d);
        assert_eq!(allocator.num_live(), 0);
        assert!(pool.is_settled());
    }

    #[test]
    fn initialize_history_fills_with_zero() {
        let mut allocator = Allocator::new();
        let mut pool = SurfacePool::new();
        let slot = PoolSlot::new(SurfaceKind::MotionHistory, Slot::B);
        pool.ensure_surface(
            &mut allocator,
            Slot::B,
            &request(SurfaceKind::MotionHistory, 720, 480),
        )
        .unwrap();

        pool.initialize_history(&mut allocator, slot).unwrap();
        assert_eq!(pool.get(slot).unwrap().handle.fill_value, Some(0));

        allocator.fail_fill = true;
        assert!(matches!(
            pool.initialize_history(&mut allocator, slot),
            Err(VeboxError::Allocation {
                kind: SurfaceKind::MotionHistory,
                ..
            })
        ));
        assert!(pool
            .initialize_history(
                &mut allocator,
                PoolSlot::single(SurfaceKind::Statistics)
            )
            .is_err());
    }

    #[test]
    fn destroy_frees_everything() {
        let mut allocator = Allocator::new();
        let mut pool = SurfacePool::new();
        pool.ensure_surface(
            &mut allocator,
            Slot::A,
            &request(SurfaceKind::Denoised, 720, 480),
        )
        .unwrap();
        pool.commit(&mut allocator);
        pool.ensure_surface(
            &mut allocator,
            Slot::A,
            &request(SurfaceKind::Denoised, 1920, 1080),
        )
        .unwrap();

        pool.destroy(&mut allocator);
        assert_eq!(allocator.num_live(), 0);
        assert!(pool.is_empty());
    }
}
