//! # Track Grid
//!
//! Width x height tiles, immutable once a level has loaded. Answers the
//! ground-resistance query the vehicle integrator makes every tick.

use tarmac_shared::{Rect, Vec2};

use crate::block::{BlockType, ResistanceAtlas};
use crate::error::{RaceError, RaceResult};

/// Largest accepted block edge in world units.
pub const MAX_BLOCK_WIDTH: f32 = 512.0;

/// Largest accepted tile count of one grid.
pub const MAX_GRID_TILES: u64 = 1 << 16;

/// Anything a vehicle can ask for ground drag.
pub trait GroundResistance {
    /// Drag coefficient at a world position. Unknown ground is zero.
    fn resistance_at(&self, position: Vec2) -> f32;
}

/// Flat ground without drag. Useful for cars that are not on a level.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoGround;

impl GroundResistance for NoGround {
    #[inline]
    fn resistance_at(&self, _position: Vec2) -> f32 {
        0.0
    }
}

/// Tile grid with per-pixel resistance.
#[derive(Clone, Debug)]
pub struct TrackGrid {
    width: u32,
    height: u32,
    block_width: f32,
    blocks: Vec<BlockType>,
    atlas: ResistanceAtlas,
}

impl TrackGrid {
    /// Creates an all-grass grid.
    ///
    /// # Errors
    ///
    /// Returns [`RaceError::InvalidSize`] for an empty grid, a grid of more
    /// than [`MAX_GRID_TILES`] tiles, or a block width outside
    /// `1..=MAX_BLOCK_WIDTH`.
    pub fn new(width: u32, height: u32, block_width: f32) -> RaceResult<Self> {
        if width == 0 || height == 0 || u64::from(width) * u64::from(height) > MAX_GRID_TILES {
            return Err(RaceError::InvalidSize(format!("{width}x{height} tiles")));
        }
        if !(1.0..=MAX_BLOCK_WIDTH).contains(&block_width) {
            return Err(RaceError::InvalidSize(format!("block width {block_width}")));
        }

        Ok(Self {
            width,
            height,
            block_width,
            blocks: vec![BlockType::Grass; width as usize * height as usize],
            atlas: ResistanceAtlas::new(block_width as usize),
        })
    }

    /// Width in tiles.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in tiles.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Tile edge length in world units.
    #[inline]
    #[must_use]
    pub const fn block_width(&self) -> f32 {
        self.block_width
    }

    /// Places a tile.
    ///
    /// # Errors
    ///
    /// Returns [`RaceError::BlockOutOfBounds`] when `(x, y)` is off the grid.
    pub fn set_block(&mut self, x: i64, y: i64, block: BlockType) -> RaceResult<()> {
        let index = self.index(x, y).ok_or(RaceError::BlockOutOfBounds {
            x,
            y,
            width: self.width,
            height: self.height,
        })?;
        self.blocks[index] = block;
        Ok(())
    }

    /// Tile at `(x, y)`, or None off the grid.
    #[must_use]
    pub fn block(&self, x: i64, y: i64) -> Option<BlockType> {
        self.index(x, y).map(|i| self.blocks[i])
    }

    /// Iterates `(x, y, block)` column by column.
    pub fn blocks(&self) -> impl Iterator<Item = (u32, u32, BlockType)> + '_ {
        (0..self.width).flat_map(move |x| {
            (0..self.height).map(move |y| (x, y, self.blocks[(y * self.width + x) as usize]))
        })
    }

    /// World rectangle covered by tile `(x, y)`. `y` may be off the grid.
    #[must_use]
    pub fn tile_rect(&self, x: i64, y: i64) -> Rect {
        let w = self.block_width;
        Rect::new(x as f32 * w, y as f32 * w, (x + 1) as f32 * w, (y + 1) as f32 * w)
    }

    /// Drag coefficient at a world position. Off the grid is zero.
    #[must_use]
    pub fn resistance(&self, x: f32, y: f32) -> f32 {
        let w = self.block_width;
        let inside = x >= 0.0 && y >= 0.0 && x < w * self.width as f32 && y < w * self.height as f32;
        if !inside {
            return 0.0;
        }

        let block_x = (x / w).floor();
        let block_y = (y / w).floor();
        let local_x = (x - block_x * w) as usize;
        let local_y = (y - block_y * w) as usize;

        match self.block(block_x as i64, block_y as i64) {
            Some(block) => self.atlas.resistance(block, local_x, local_y),
            None => 0.0,
        }
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }
}

impl GroundResistance for TrackGrid {
    #[inline]
    fn resistance_at(&self, position: Vec2) -> f32 {
        self.resistance(position.x, position.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::VERGE_RESISTANCE;

    fn grid() -> TrackGrid {
        let mut grid = TrackGrid::new(3, 2, 100.0).unwrap();
        grid.set_block(1, 0, BlockType::StreetVert).unwrap();
        grid.set_block(1, 1, BlockType::StartLine).unwrap();
        grid
    }

    #[test]
    fn test_rejects_empty_grid() {
        assert!(matches!(TrackGrid::new(0, 4, 100.0), Err(RaceError::InvalidSize(_))));
        assert!(matches!(TrackGrid::new(4, 4, 0.0), Err(RaceError::InvalidSize(_))));
        assert!(matches!(TrackGrid::new(4, 4, f32::NAN), Err(RaceError::InvalidSize(_))));
    }

    #[test]
    fn test_rejects_oversized_geometry() {
        assert!(matches!(TrackGrid::new(4, 4, f32::INFINITY), Err(RaceError::InvalidSize(_))));
        assert!(matches!(TrackGrid::new(4, 4, 1.0e6), Err(RaceError::InvalidSize(_))));
        assert!(matches!(TrackGrid::new(u32::MAX, u32::MAX, 100.0), Err(RaceError::InvalidSize(_))));
        assert!(matches!(TrackGrid::new(257, 256, 100.0), Err(RaceError::InvalidSize(_))));

        assert!(TrackGrid::new(256, 256, MAX_BLOCK_WIDTH).is_ok());
    }

    #[test]
    fn test_out_of_bounds_block_is_error() {
        let mut grid = grid();
        let err = grid.set_block(3, 0, BlockType::StreetHoriz).unwrap_err();
        assert!(matches!(err, RaceError::BlockOutOfBounds { x: 3, y: 0, .. }));
        assert!(grid.set_block(-1, 0, BlockType::StreetHoriz).is_err());
    }

    #[test]
    fn test_resistance_outside_grid_is_zero() {
        let grid = grid();
        assert_eq!(grid.resistance(-1.0, 10.0), 0.0);
        assert_eq!(grid.resistance(300.0, 10.0), 0.0);
        assert_eq!(grid.resistance(10.0, 200.0), 0.0);
    }

    #[test]
    fn test_resistance_reads_local_pixel() {
        let grid = grid();
        // grass
        assert_eq!(grid.resistance(50.0, 50.0), 0.0);
        // lane centre of the vertical street
        assert_eq!(grid.resistance(150.0, 50.0), 0.0);
        // verge of the vertical street
        assert_eq!(grid.resistance(102.0, 50.0), VERGE_RESISTANCE);
        assert_eq!(grid.resistance(198.0, 150.0), VERGE_RESISTANCE);
    }

    #[test]
    fn test_blocks_iterate_column_major() {
        let grid = grid();
        let order: Vec<_> = grid.blocks().map(|(x, y, _)| (x, y)).collect();
        assert_eq!(order[..3], [(0, 0), (0, 1), (1, 0)]);
        assert_eq!(grid.tile_rect(1, -1), Rect::new(100.0, -100.0, 200.0, 0.0));
    }
}
