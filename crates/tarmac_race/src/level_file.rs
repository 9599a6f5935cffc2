//! # Level Files
//!
//! Levels are TOML documents:
//!
//! ```toml
//! [meta.size]
//! width = 3
//! height = 2
//!
//! [[content.track.block]]
//! x = 1
//! y = 1
//! type = "start_line"
//!
//! [[content.bounds.bound]]
//! x1 = 0.0
//! y1 = 0.0
//! x2 = 3.0
//! y2 = 0.0
//!
//! [[content.start_positions.position]]
//! x = 1.5
//! y = 1.5
//! ```
//!
//! All coordinates are in block units. Unknown tile types and unknown
//! nodes are logged and skipped. A tile outside the grid fails the load.

use std::path::{Path, PathBuf};

use tarmac_shared::{Vec2, BLOCK_WIDTH};
use toml::{Table, Value};
use tracing::{debug, info, warn};

use crate::block::BlockType;
use crate::bounds::{Boundary, BoundarySet};
use crate::error::{RaceError, RaceResult};
use crate::grid::TrackGrid;

/// Everything a level file describes, already in world units.
#[derive(Clone, Debug)]
pub struct LevelData {
    /// Tiles and their resistance.
    pub grid: TrackGrid,
    /// Wall segments.
    pub bounds: BoundarySet,
    /// Start positions; slot 1 is the first entry.
    pub start_positions: Vec<Vec2>,
}

impl LevelData {
    /// Parses a level document.
    ///
    /// # Errors
    ///
    /// [`RaceError::Parse`] for malformed TOML or missing sizes,
    /// [`RaceError::InvalidSize`] for a grid or block width out of range,
    /// [`RaceError::BlockOutOfBounds`] for tiles off the grid.
    pub fn parse(source: &str) -> RaceResult<Self> {
        let doc: Table = source.parse()?;

        let meta = table(&doc, "meta")?;
        let size = table(meta, "size")?;
        let width = dimension(size, "width")?;
        let height = dimension(size, "height")?;
        let block_width = match meta.get("block_width") {
            Some(value) => as_f32(value).ok_or_else(|| RaceError::Parse("meta.block_width is not a number".into()))?,
            None => BLOCK_WIDTH,
        };

        info!(target: "race", "level size set to {width} x {height}");

        let mut grid = TrackGrid::new(width, height, block_width)?;
        let mut bounds = BoundarySet::new();
        let mut start_positions = Vec::new();

        let empty = Table::new();
        let content = doc.get("content").and_then(Value::as_table).unwrap_or(&empty);

        for block in nodes(content, "track", "block") {
            let x = integer(block, "x")?;
            let y = integer(block, "y")?;
            let name = block.get("type").and_then(Value::as_str).unwrap_or_default();

            if grid.block(x, y).is_none() {
                debug!(target: "race", "coords x={x}, y={y}");
                return Err(RaceError::BlockOutOfBounds { x, y, width, height });
            }

            match BlockType::from_name(name) {
                Some(kind) => grid.set_block(x, y, kind)?,
                None => warn!(target: "race", "Unknown block type: {name}"),
            }
        }

        for bound in nodes(content, "bounds", "bound") {
            let x1 = number(bound, "x1")? * block_width;
            let y1 = number(bound, "y1")? * block_width;
            let x2 = number(bound, "x2")? * block_width;
            let y2 = number(bound, "y2")? * block_width;

            debug!(target: "race", "Loading bound {x1} x {y1} -> {x2} x {y2}");
            bounds.push(Boundary::new(Vec2::new(x1, y1), Vec2::new(x2, y2)));
        }

        for position in nodes(content, "start_positions", "position") {
            let x = number(position, "x")? * block_width;
            let y = number(position, "y")? * block_width;
            start_positions.push(Vec2::new(x, y));
        }

        Ok(Self {
            grid,
            bounds,
            start_positions,
        })
    }

    /// Reads and parses a level file.
    ///
    /// # Errors
    ///
    /// [`RaceError::Io`] if the file cannot be read, otherwise as [`Self::parse`].
    pub fn from_file(path: impl AsRef<Path>) -> RaceResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::parse(&source)
    }
}

/// Resolves a level identifier to level data.
pub trait LevelLoader {
    /// Loads level `id`.
    ///
    /// # Errors
    ///
    /// Whatever the backing store reports.
    fn load(&self, id: &str) -> RaceResult<LevelData>;
}

/// Loads `<dir>/<id>.toml`.
#[derive(Clone, Debug)]
pub struct DirectoryLoader {
    dir: PathBuf,
}

impl DirectoryLoader {
    /// Creates a loader rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path a level id resolves to.
    #[must_use]
    pub fn path_of(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.toml"))
    }
}

impl LevelLoader for DirectoryLoader {
    fn load(&self, id: &str) -> RaceResult<LevelData> {
        // ids are plain names, never paths
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(RaceError::UnknownLevel(id.to_string()));
        }

        let path = self.path_of(id);
        if !path.is_file() {
            return Err(RaceError::UnknownLevel(id.to_string()));
        }
        LevelData::from_file(path)
    }
}

// =============================================================================
// TOML HELPERS
// =============================================================================

fn table<'a>(parent: &'a Table, key: &str) -> RaceResult<&'a Table> {
    parent
        .get(key)
        .and_then(Value::as_table)
        .ok_or_else(|| RaceError::Parse(format!("missing table `{key}`")))
}

/// Children of `content.<section>` named `node`; other names are skipped.
fn nodes<'a>(content: &'a Table, section: &str, node: &'a str) -> impl Iterator<Item = &'a Table> + 'a {
    let children = content.get(section).and_then(Value::as_table);

    children.into_iter().flat_map(move |children| {
        children.iter().flat_map(move |(name, value)| {
            if name != node {
                warn!(target: "race", "Unknown node '{name}', ignoring");
                return Vec::new();
            }
            match value {
                Value::Array(items) => items
                    .iter()
                    .filter_map(|item| {
                        let entry = item.as_table();
                        if entry.is_none() {
                            warn!(target: "race", "Malformed '{name}' entry, ignoring");
                        }
                        entry
                    })
                    .collect(),
                Value::Table(single) => vec![single],
                _ => {
                    warn!(target: "race", "Malformed '{name}' node, ignoring");
                    Vec::new()
                }
            }
        })
    })
}

fn as_f32(value: &Value) -> Option<f32> {
    match value {
        Value::Float(f) => Some(*f as f32),
        Value::Integer(i) => Some(*i as f32),
        _ => None,
    }
}

fn number(node: &Table, key: &str) -> RaceResult<f32> {
    node.get(key)
        .and_then(as_f32)
        .ok_or_else(|| RaceError::Parse(format!("`{key}` must be a number")))
}

fn integer(node: &Table, key: &str) -> RaceResult<i64> {
    node.get(key)
        .and_then(Value::as_integer)
        .ok_or_else(|| RaceError::Parse(format!("`{key}` must be an integer")))
}

fn dimension(size: &Table, key: &str) -> RaceResult<u32> {
    let value = integer(size, key)?;
    u32::try_from(value).map_err(|_| RaceError::InvalidSize(format!("{key} = {value}")))
}
