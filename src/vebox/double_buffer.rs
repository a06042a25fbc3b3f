// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Ping-pong indices for double-buffered surfaces.
//!
//! The hardware may still be reading the surface in one slot while the next frame is being
//! prepared, so new data is always written to the other slot and the roles are swapped once the
//! frame has been fully assembled.

/// One of the two slots of a double-buffered surface.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    #[default]
    A,
    B,
}

impl Slot {
    pub fn opposite(&self) -> Self {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }
}

/// Tracks which slot of a double-buffered surface holds the data of the last frame.
///
/// `current()` is the slot to read from (the previous frame's output), `other()` the slot to
/// write to. The two are distinct by construction.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PingPong {
    current: Slot,
}

impl PingPong {
    pub fn new() -> Self {
        Default::default()
    }

    /// Slot holding the history produced by the previous frame.
    pub fn current(&self) -> Slot {
        self.current
    }

    /// Slot the current frame writes to.
    pub fn other(&self) -> Slot {
        self.current.opposite()
    }

    /// Makes the slot just written the one to read from for the next frame.
    pub fn swap(&mut self) {
        self.current = self.current.opposite();
    }
}
