//! # Boundary Set
//!
//! Static wall segments loaded with the level. Cars test their outline
//! against every wall once per tick.

use tarmac_shared::{Segment, Vec2};

/// Index of a wall inside its [`BoundarySet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundaryId(pub usize);

/// One immutable wall segment in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Boundary {
    segment: Segment,
}

impl Boundary {
    /// Creates a wall between two world points.
    #[must_use]
    pub const fn new(start: Vec2, end: Vec2) -> Self {
        Self {
            segment: Segment::new(start, end),
        }
    }

    /// The wall's segment.
    #[inline]
    #[must_use]
    pub const fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Returns true if any edge of `outline` touches this wall.
    #[must_use]
    pub fn collides(&self, outline: &[Segment]) -> bool {
        outline.iter().any(|edge| edge.intersects(&self.segment))
    }
}

/// All walls of a level.
#[derive(Clone, Debug, Default)]
pub struct BoundarySet {
    bounds: Vec<Boundary>,
}

impl BoundarySet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { bounds: Vec::new() }
    }

    /// Adds a wall.
    pub fn push(&mut self, boundary: Boundary) -> BoundaryId {
        self.bounds.push(boundary);
        BoundaryId(self.bounds.len() - 1)
    }

    /// Number of walls.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Returns true if the level has no walls.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Wall by id.
    #[must_use]
    pub fn get(&self, id: BoundaryId) -> Option<&Boundary> {
        self.bounds.get(id.0)
    }

    /// Iterates walls in load order.
    pub fn iter(&self) -> impl Iterator<Item = (BoundaryId, &Boundary)> {
        self.bounds.iter().enumerate().map(|(i, b)| (BoundaryId(i), b))
    }

    /// Walls touched by `outline`, in load order.
    pub fn hits<'a>(&'a self, outline: &'a [Segment]) -> impl Iterator<Item = BoundaryId> + 'a {
        self.iter()
            .filter(move |(_, bound)| bound.collides(outline))
            .map(|(id, _)| id)
    }

    /// Removes every wall.
    pub fn clear(&mut self) {
        self.bounds.clear();
    }
}
