//! # Track Blocks
//!
//! A block is one square tile of the track. Each street subtype has a
//! per-pixel resistance map. Only two maps are drawn by hand, a straight
//! and a curve; every other orientation is read through a [`Rotation`].

/// Ground resistance on the driveable lane.
pub const LANE_RESISTANCE: f32 = 0.0;

/// Ground resistance on the verge beside the lane.
pub const VERGE_RESISTANCE: f32 = 1.5;

/// Half of the lane width, as a fraction of the block width.
const LANE_HALF_WIDTH: f32 = 0.35;

/// Subtype of a track block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlockType {
    /// Off-track filler. Zero resistance, never a checkpoint.
    #[default]
    Grass,
    /// Straight street running top to bottom.
    StreetVert,
    /// Straight street running left to right.
    StreetHoriz,
    /// Curve joining the bottom and right edges.
    TurnBottomRight,
    /// Curve joining the bottom and left edges.
    TurnBottomLeft,
    /// Curve joining the top and right edges.
    TurnTopRight,
    /// Curve joining the top and left edges.
    TurnTopLeft,
    /// Vertical street carrying the start/finish line.
    StartLine,
}

impl BlockType {
    /// Every street subtype, in atlas order.
    pub const STREETS: [Self; 7] = [
        Self::StreetVert,
        Self::StreetHoriz,
        Self::TurnBottomRight,
        Self::TurnBottomLeft,
        Self::TurnTopRight,
        Self::TurnTopLeft,
        Self::StartLine,
    ];

    /// Parses a level-file tile name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "grass" => Some(Self::Grass),
            "vert" => Some(Self::StreetVert),
            "horiz" => Some(Self::StreetHoriz),
            "turn_bottom_right" => Some(Self::TurnBottomRight),
            "turn_bottom_left" => Some(Self::TurnBottomLeft),
            "turn_top_right" => Some(Self::TurnTopRight),
            "turn_top_left" => Some(Self::TurnTopLeft),
            "start_line" => Some(Self::StartLine),
            _ => None,
        }
    }

    /// Level-file tile name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Grass => "grass",
            Self::StreetVert => "vert",
            Self::StreetHoriz => "horiz",
            Self::TurnBottomRight => "turn_bottom_right",
            Self::TurnBottomLeft => "turn_bottom_left",
            Self::TurnTopRight => "turn_top_right",
            Self::TurnTopLeft => "turn_top_left",
            Self::StartLine => "start_line",
        }
    }

    /// Returns true for every subtype except grass.
    #[inline]
    #[must_use]
    pub const fn is_street(self) -> bool {
        !matches!(self, Self::Grass)
    }

    /// Canonical shape and rotation this subtype is read through.
    #[must_use]
    pub const fn shape(self) -> Option<(Shape, Rotation)> {
        match self {
            Self::Grass => None,
            Self::StreetVert | Self::StartLine => Some((Shape::Straight, Rotation::Identity)),
            Self::StreetHoriz => Some((Shape::Straight, Rotation::Deg90)),
            Self::TurnBottomRight => Some((Shape::Curve, Rotation::Identity)),
            Self::TurnTopRight => Some((Shape::Curve, Rotation::Deg90)),
            Self::TurnTopLeft => Some((Shape::Curve, Rotation::Deg180)),
            Self::TurnBottomLeft => Some((Shape::Curve, Rotation::Deg270)),
        }
    }
}

/// Hand-drawn canonical street shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// Vertical lane centred on the block.
    Straight,
    /// Quarter-circle lane around the bottom-right corner.
    Curve,
}

/// Pixel coordinate transform applied when reading a canonical map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    /// No transform.
    #[default]
    Identity,
    /// Quarter turn.
    Deg90,
    /// Half turn.
    Deg180,
    /// Three-quarter turn.
    Deg270,
}

impl Rotation {
    /// Maps `(x, y)` in a rotated block to the canonical map's pixel.
    #[inline]
    #[must_use]
    pub const fn translate(self, x: usize, y: usize, width: usize, height: usize) -> (usize, usize) {
        match self {
            Self::Identity => (x, y),
            Self::Deg90 => (height - y - 1, x),
            Self::Deg180 => (width - x - 1, height - y - 1),
            Self::Deg270 => (y, width - x - 1),
        }
    }
}

/// Square per-pixel drag map of one block.
#[derive(Clone, Debug, PartialEq)]
pub struct ResistanceMap {
    size: usize,
    data: Vec<f32>,
}

impl ResistanceMap {
    /// Draws the canonical map for `shape` at `size` pixels per side.
    #[must_use]
    pub fn canonical(shape: Shape, size: usize) -> Self {
        let s = size as f32;
        let half_lane = s * LANE_HALF_WIDTH;
        let mut data = Vec::with_capacity(size * size);

        for y in 0..size {
            for x in 0..size {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;
                let off_centre = match shape {
                    Shape::Straight => (px - s / 2.0).abs(),
                    Shape::Curve => {
                        let dx = s - px;
                        let dy = s - py;
                        ((dx * dx + dy * dy).sqrt() - s / 2.0).abs()
                    }
                };
                data.push(if off_centre <= half_lane {
                    LANE_RESISTANCE
                } else {
                    VERGE_RESISTANCE
                });
            }
        }

        Self { size, data }
    }

    /// Builds a map that reads `source` through `rotation`.
    #[must_use]
    pub fn rotated(source: &Self, rotation: Rotation) -> Self {
        let size = source.size;
        let mut data = Vec::with_capacity(size * size);
        for y in 0..size {
            for x in 0..size {
                let (sx, sy) = rotation.translate(x, y, size, size);
                data.push(source.data[sy * size + sx]);
            }
        }
        Self { size, data }
    }

    /// Pixels per side.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Resistance at a local pixel. Outside the block is zero.
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        if x >= self.size || y >= self.size {
            return 0.0;
        }
        self.data[y * self.size + x]
    }
}

/// One resistance map per street subtype, shared by every block of a grid.
#[derive(Clone, Debug)]
pub struct ResistanceAtlas {
    maps: Vec<ResistanceMap>,
}

impl ResistanceAtlas {
    /// Draws all street maps at `size` pixels per side.
    #[must_use]
    pub fn new(size: usize) -> Self {
        let straight = ResistanceMap::canonical(Shape::Straight, size);
        let curve = ResistanceMap::canonical(Shape::Curve, size);

        let maps = BlockType::STREETS
            .iter()
            .filter_map(|block| block.shape())
            .map(|(shape, rotation)| {
                let source = match shape {
                    Shape::Straight => &straight,
                    Shape::Curve => &curve,
                };
                ResistanceMap::rotated(source, rotation)
            })
            .collect();

        Self { maps }
    }

    /// Map for `block`, or None for grass.
    #[must_use]
    pub fn map(&self, block: BlockType) -> Option<&ResistanceMap> {
        let slot = BlockType::STREETS.iter().position(|b| *b == block)?;
        self.maps.get(slot)
    }

    /// Resistance of `block` at local pixel `(x, y)`.
    #[inline]
    #[must_use]
    pub fn resistance(&self, block: BlockType, x: usize, y: usize) -> f32 {
        self.map(block).map_or(0.0, |map| map.get(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for block in BlockType::STREETS {
            assert_eq!(BlockType::from_name(block.name()), Some(block));
        }
        assert_eq!(BlockType::from_name("lava"), None);
    }

    #[test]
    fn test_translators_match_quarter_turns() {
        // 4x2 block, pixel (1, 0)
        assert_eq!(Rotation::Identity.translate(1, 0, 4, 2), (1, 0));
        assert_eq!(Rotation::Deg90.translate(1, 0, 4, 2), (1, 1));
        assert_eq!(Rotation::Deg180.translate(1, 0, 4, 2), (2, 1));
        assert_eq!(Rotation::Deg270.translate(1, 0, 4, 2), (0, 2));
    }

    #[test]
    fn test_straight_lane_is_centred() {
        let map = ResistanceMap::canonical(Shape::Straight, 100);
        assert_eq!(map.get(50, 0), LANE_RESISTANCE);
        assert_eq!(map.get(50, 99), LANE_RESISTANCE);
        assert_eq!(map.get(2, 50), VERGE_RESISTANCE);
        assert_eq!(map.get(97, 50), VERGE_RESISTANCE);
    }

    #[test]
    fn test_horizontal_is_rotated_vertical() {
        let atlas = ResistanceAtlas::new(100);
        assert_eq!(atlas.resistance(BlockType::StreetHoriz, 0, 50), LANE_RESISTANCE);
        assert_eq!(atlas.resistance(BlockType::StreetHoriz, 50, 2), VERGE_RESISTANCE);
        assert_eq!(atlas.resistance(BlockType::StreetHoriz, 50, 97), VERGE_RESISTANCE);
    }

    #[test]
    fn test_curves_open_towards_their_edges() {
        let atlas = ResistanceAtlas::new(100);
        // Each curve's lane touches the midpoints of its two edges.
        let cases = [
            (BlockType::TurnBottomRight, (99, 50), (50, 99)),
            (BlockType::TurnBottomLeft, (0, 50), (50, 99)),
            (BlockType::TurnTopRight, (99, 50), (50, 0)),
            (BlockType::TurnTopLeft, (0, 50), (50, 0)),
        ];
        for (block, (ax, ay), (bx, by)) in cases {
            assert_eq!(atlas.resistance(block, ax, ay), LANE_RESISTANCE, "{block:?}");
            assert_eq!(atlas.resistance(block, bx, by), LANE_RESISTANCE, "{block:?}");
        }
        // The far corner of a curve is verge.
        assert_eq!(atlas.resistance(BlockType::TurnBottomRight, 0, 0), VERGE_RESISTANCE);
        assert_eq!(atlas.resistance(BlockType::TurnTopLeft, 99, 99), VERGE_RESISTANCE);
    }

    #[test]
    fn test_grass_has_no_drag() {
        let atlas = ResistanceAtlas::new(10);
        assert!(atlas.map(BlockType::Grass).is_none());
        assert_eq!(atlas.resistance(BlockType::Grass, 5, 5), 0.0);
    }
}
