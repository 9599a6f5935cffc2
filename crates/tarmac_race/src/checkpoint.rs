//! # Checkpoint Tracker
//!
//! Per-car lap progress. A lap counts only when every checkpoint has been
//! passed and the car then enters the lap rectangle. Completing a lap
//! resets all checkpoints.

use tarmac_shared::{Rect, Vec2};

/// Rectangular zone plus a passed flag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Checkpoint {
    rect: Rect,
    passed: bool,
}

impl Checkpoint {
    /// Creates an unpassed checkpoint.
    #[must_use]
    pub const fn new(rect: Rect) -> Self {
        Self { rect, passed: false }
    }

    /// Zone of this checkpoint.
    #[inline]
    #[must_use]
    pub const fn rect(&self) -> &Rect {
        &self.rect
    }

    /// Whether the car has entered the zone since the last lap.
    #[inline]
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        self.passed
    }
}

/// Ordered checkpoints, the lap checkpoint, and the lap counter of one car.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CheckpointTracker {
    checkpoints: Vec<Checkpoint>,
    lap_checkpoint: Option<Checkpoint>,
    lap: u32,
}

impl CheckpointTracker {
    /// Creates a tracker. Without a lap checkpoint laps never complete.
    #[must_use]
    pub fn new(checkpoints: Vec<Checkpoint>, lap_checkpoint: Option<Checkpoint>) -> Self {
        Self {
            checkpoints,
            lap_checkpoint,
            lap: 0,
        }
    }

    /// Completed laps.
    #[inline]
    #[must_use]
    pub const fn lap(&self) -> u32 {
        self.lap
    }

    /// Checkpoints in declaration order.
    #[inline]
    #[must_use]
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// The lap-line zone, if the level has a start line.
    #[inline]
    #[must_use]
    pub const fn lap_checkpoint(&self) -> Option<&Checkpoint> {
        self.lap_checkpoint.as_ref()
    }

    /// Returns true once every checkpoint has been passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checkpoints.iter().all(Checkpoint::is_passed)
    }

    /// Marks checkpoints containing `position`, then tests the lap line.
    ///
    /// Returns true when this call completed a lap.
    pub fn advance(&mut self, position: Vec2) -> bool {
        for checkpoint in &mut self.checkpoints {
            if !checkpoint.passed && checkpoint.rect.contains(position) {
                checkpoint.passed = true;
            }
        }

        let on_lap_line = self
            .lap_checkpoint
            .as_ref()
            .is_some_and(|lap| lap.rect.contains(position));

        if on_lap_line && self.all_passed() {
            self.lap += 1;
            self.reset();
            return true;
        }
        false
    }

    /// Marks every checkpoint unpassed. The lap counter is kept.
    pub fn reset(&mut self) {
        for checkpoint in &mut self.checkpoints {
            checkpoint.passed = false;
        }
    }
}
