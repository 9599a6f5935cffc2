//! # Tyre Stripes
//!
//! Skid marks left by drifting cars. Bounded: the oldest stripe goes
//! first once the ring is full.

use std::collections::VecDeque;

use tarmac_shared::Vec2;

use crate::level::CarId;

/// Default number of stripes kept per level.
pub const DEFAULT_STRIPE_CAPACITY: usize = 4096;

/// Distance from the car centre to each tyre.
pub const TYRE_RADIUS: f32 = 10.0;

/// One skid mark segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TyreStripe {
    /// Where the tyre was on the previous tick.
    pub start: Vec2,
    /// Where the tyre is now.
    pub end: Vec2,
    /// Car that left the mark.
    pub car: CarId,
}

/// Ring of recent stripes.
#[derive(Clone, Debug)]
pub struct TyreStripes {
    stripes: VecDeque<TyreStripe>,
    capacity: usize,
}

impl Default for TyreStripes {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_STRIPE_CAPACITY)
    }
}

impl TyreStripes {
    /// Creates an empty ring holding at most `capacity` stripes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            stripes: VecDeque::with_capacity(capacity.min(DEFAULT_STRIPE_CAPACITY)),
            capacity,
        }
    }

    /// Appends a stripe, evicting the oldest when full.
    pub fn add(&mut self, start: Vec2, end: Vec2, car: CarId) {
        if self.capacity == 0 {
            return;
        }
        if self.stripes.len() == self.capacity {
            self.stripes.pop_front();
        }
        self.stripes.push_back(TyreStripe { start, end, car });
    }

    /// Stripes oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TyreStripe> {
        self.stripes.iter()
    }

    /// Number of stored stripes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stripes.len()
    }

    /// Returns true if nothing has drifted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stripes.is_empty()
    }

    /// Removes all stripes.
    pub fn clear(&mut self) {
        self.stripes.clear();
    }
}

/// The four tyre contact points of a car at `position` facing `heading`.
///
/// Offsets are 45, 135, 225 and 315 degrees from the heading.
#[must_use]
pub fn tyre_points(position: Vec2, heading: f32) -> [Vec2; 4] {
    let mut angle = heading;
    let mut points = [Vec2::ZERO; 4];
    for (i, point) in points.iter_mut().enumerate() {
        angle += if i == 0 { 45.0 } else { 90.0 };
        *point = position + Vec2::from_degrees(angle) * TYRE_RADIUS;
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::car::Car;
    use crate::level::Level;

    fn some_car_id() -> CarId {
        let mut level = Level::new();
        level.initialize_with(crate::level_file::LevelData::parse("[meta.size]\nwidth = 1\nheight = 1\n").unwrap());
        level.add_car(Car::default())
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let id = some_car_id();
        let mut stripes = TyreStripes::with_capacity(2);
        for i in 0..3 {
            stripes.add(Vec2::new(i as f32, 0.0), Vec2::ZERO, id);
        }
        assert_eq!(stripes.len(), 2);
        assert_eq!(stripes.iter().next().unwrap().start.x, 1.0);
    }

    #[test]
    fn test_tyre_points_surround_car() {
        let points = tyre_points(Vec2::new(50.0, 50.0), 0.0);
        for p in points {
            let r = (p - Vec2::new(50.0, 50.0)).length();
            assert!((r - TYRE_RADIUS).abs() < 1e-3);
        }
        // first tyre is front-right on screen
        assert!(points[0].x > 50.0 && points[0].y > 50.0);
    }
}
