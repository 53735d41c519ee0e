//! Parser for `VTHM` height map files.
//!
//! A height map is a quadtree of sectors. Each sector stores its X/Z bounds,
//! a list of planar faces (normal, plane distance and one or more contours of
//! points), then a `u32` flag telling whether four child sectors follow.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::data::parser_utils::{ByteStream, ParseError, bounded_capacity, parse_magic};
use crate::game_types::Vec3;

pub const HEIGHT_MAP_MAGIC: &[u8; 4] = b"VTHM";

/// Deepest quadtree nesting accepted before the file is treated as corrupt.
pub const MAX_SECTOR_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum HeightMapError {
    #[error("bad magic: expected {expected}, got {found:?}")]
    BadMagic {
        expected: &'static str,
        found: String,
    },
    #[error("sector nesting exceeds {max} levels at 0x{offset:X}")]
    TooDeep { max: usize, offset: usize },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectorBounds {
    pub x_min: f32,
    pub x_max: f32,
    pub z_min: f32,
    pub z_max: f32,
}

impl SectorBounds {
    pub fn contains(&self, x: f32, z: f32) -> bool {
        (self.x_min..=self.x_max).contains(&x) && (self.z_min..=self.z_max).contains(&z)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeightMapFace {
    pub normal: Vec3,
    /// Plane distance along `normal`.
    pub distance: f32,
    pub contours: Vec<Vec<Vec3>>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeightMapSector {
    pub bounds: SectorBounds,
    pub faces: Vec<HeightMapFace>,
    pub children: Option<Box<[HeightMapSector; 4]>>,
}

impl HeightMapSector {
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Number of sectors in this subtree, including itself.
    pub fn sector_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .flat_map(|children| children.iter())
            .map(HeightMapSector::sector_count)
            .sum::<usize>()
    }

    /// Levels in this subtree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .flat_map(|children| children.iter())
            .map(HeightMapSector::depth)
            .max()
            .unwrap_or(0)
    }

    /// Deepest sector whose bounds contain the point, or `None` if this sector doesn't.
    pub fn leaf_at(&self, x: f32, z: f32) -> Option<&HeightMapSector> {
        if !self.bounds.contains(x, z) {
            return None;
        }

        let mut sector = self;
        while let Some(child) = sector
            .children
            .as_deref()
            .and_then(|children| children.iter().find(|child| child.bounds.contains(x, z)))
        {
            sector = child;
        }
        Some(sector)
    }
}

/// Parsed height map: the root sector of the quadtree.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeightMap {
    pub root: HeightMapSector,
}

impl HeightMap {
    pub fn sector_count(&self) -> usize {
        self.root.sector_count()
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn leaf_at(&self, x: f32, z: f32) -> Option<&HeightMapSector> {
        self.root.leaf_at(x, z)
    }

    pub fn face_count(&self) -> usize {
        fn count(sector: &HeightMapSector) -> usize {
            sector.faces.len()
                + sector
                    .children
                    .iter()
                    .flat_map(|children| children.iter())
                    .map(count)
                    .sum::<usize>()
        }
        count(&self.root)
    }
}

fn parse_face(stream: &mut ByteStream<'_>) -> Result<HeightMapFace, HeightMapError> {
    let normal = stream.vec3("face normal")?;
    let distance = stream.f32("face plane distance")?;
    let contour_count = stream.u32("face contour count")?;

    let mut contours = Vec::with_capacity(bounded_capacity(contour_count, stream.remaining(), 4));
    for _ in 0..contour_count {
        let point_count = stream.u32("contour point count")?;
        let mut points = Vec::with_capacity(bounded_capacity(point_count, stream.remaining(), 12));
        for _ in 0..point_count {
            points.push(stream.vec3("contour point")?);
        }
        contours.push(points);
    }

    Ok(HeightMapFace {
        normal,
        distance,
        contours,
    })
}

fn parse_sector(stream: &mut ByteStream<'_>, depth: usize) -> Result<HeightMapSector, HeightMapError> {
    if depth >= MAX_SECTOR_DEPTH {
        return Err(HeightMapError::TooDeep {
            max: MAX_SECTOR_DEPTH,
            offset: stream.offset(),
        });
    }

    let bounds = SectorBounds {
        x_min: stream.f32("sector x min")?,
        x_max: stream.f32("sector x max")?,
        z_min: stream.f32("sector z min")?,
        z_max: stream.f32("sector z max")?,
    };

    let face_count = stream.u32("sector face count")?;
    let mut faces = Vec::with_capacity(bounded_capacity(face_count, stream.remaining(), 20));
    for _ in 0..face_count {
        faces.push(parse_face(stream)?);
    }

    // Any nonzero flag means four children follow.
    let children = match stream.u32("sector child flag")? {
        0 => None,
        _ => Some(Box::new([
            parse_sector(stream, depth + 1)?,
            parse_sector(stream, depth + 1)?,
            parse_sector(stream, depth + 1)?,
            parse_sector(stream, depth + 1)?,
        ])),
    };

    Ok(HeightMapSector {
        bounds,
        faces,
        children,
    })
}

/// Parse a height map held in memory.
pub fn parse_height_map(file_data: &[u8]) -> Result<HeightMap, HeightMapError> {
    let mut stream = ByteStream::new(file_data);

    let magic: [u8; 4] = stream.read("magic", parse_magic::<4>)?;
    if &magic != HEIGHT_MAP_MAGIC {
        return Err(HeightMapError::BadMagic {
            expected: "VTHM",
            found: String::from_utf8_lossy(&magic).into_owned(),
        });
    }

    let root = parse_sector(&mut stream, 0)?;
    let height_map = HeightMap { root };
    debug!(
        sectors = height_map.sector_count(),
        depth = height_map.depth(),
        "parsed height map"
    );
    Ok(height_map)
}

/// Read and parse a height map file.
pub fn parse_height_map_file(path: &Path) -> Result<HeightMap, HeightMapError> {
    let data = std::fs::read(path).map_err(|source| HeightMapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_height_map(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::writer_utils::{write_bytes, write_f32, write_u32, write_vec3};

    fn write_bounds(buf: &mut Vec<u8>, x_min: f32, x_max: f32, z_min: f32, z_max: f32) {
        for value in [x_min, x_max, z_min, z_max] {
            write_f32(buf, value);
        }
    }

    /// A leaf with one triangular face.
    fn write_leaf(buf: &mut Vec<u8>, x_min: f32, x_max: f32, z_min: f32, z_max: f32) {
        write_bounds(buf, x_min, x_max, z_min, z_max);
        write_u32(buf, 1);
        write_vec3(buf, Vec3::new(0.0, 1.0, 0.0));
        write_f32(buf, -2.5);
        write_u32(buf, 1);
        write_u32(buf, 3);
        write_vec3(buf, Vec3::new(x_min, 2.5, z_min));
        write_vec3(buf, Vec3::new(x_max, 2.5, z_min));
        write_vec3(buf, Vec3::new(x_min, 2.5, z_max));
        write_u32(buf, 0);
    }

    /// Root covering [0, 100] on both axes, split into four quadrants.
    fn quadtree() -> Vec<u8> {
        let mut buf = Vec::new();
        write_bytes(&mut buf, HEIGHT_MAP_MAGIC);
        write_bounds(&mut buf, 0.0, 100.0, 0.0, 100.0);
        write_u32(&mut buf, 0);
        write_u32(&mut buf, 1);
        write_leaf(&mut buf, 0.0, 50.0, 0.0, 50.0);
        write_leaf(&mut buf, 50.0, 100.0, 0.0, 50.0);
        write_leaf(&mut buf, 0.0, 50.0, 50.0, 100.0);
        write_leaf(&mut buf, 50.0, 100.0, 50.0, 100.0);
        buf
    }

    #[test]
    fn parses_nested_sectors() {
        let map = parse_height_map(&quadtree()).unwrap();
        assert!(map.root.faces.is_empty());
        assert_eq!(map.sector_count(), 5);
        assert_eq!(map.depth(), 2);
        assert_eq!(map.face_count(), 4);

        let children = map.root.children.as_deref().unwrap();
        let face = &children[3].faces[0];
        assert_eq!(face.normal, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(face.distance, -2.5);
        assert_eq!(face.contours.len(), 1);
        assert_eq!(face.contours[0][1], Vec3::new(100.0, 2.5, 50.0));
        assert!(children.iter().all(HeightMapSector::is_leaf));
    }

    #[test]
    fn leaf_at_finds_quadrant() {
        let map = parse_height_map(&quadtree()).unwrap();

        let leaf = map.leaf_at(75.0, 10.0).unwrap();
        assert_eq!(leaf.bounds.x_min, 50.0);
        assert_eq!(leaf.bounds.z_max, 50.0);

        let leaf = map.leaf_at(10.0, 90.0).unwrap();
        assert_eq!((leaf.bounds.x_max, leaf.bounds.z_min), (50.0, 50.0));

        assert!(map.leaf_at(-1.0, 10.0).is_none());
    }

    #[test]
    fn single_leaf_root() {
        let mut buf = Vec::new();
        write_bytes(&mut buf, HEIGHT_MAP_MAGIC);
        write_leaf(&mut buf, -10.0, 10.0, -10.0, 10.0);

        let map = parse_height_map(&buf).unwrap();
        assert!(map.root.is_leaf());
        assert_eq!(map.depth(), 1);
        assert!(std::ptr::eq(map.leaf_at(0.0, 0.0).unwrap(), &map.root));
    }

    #[test]
    fn any_nonzero_child_flag_descends() {
        let mut buf = Vec::new();
        write_bytes(&mut buf, HEIGHT_MAP_MAGIC);
        write_bounds(&mut buf, 0.0, 100.0, 0.0, 100.0);
        write_u32(&mut buf, 0);
        write_u32(&mut buf, 7);
        write_leaf(&mut buf, 0.0, 50.0, 0.0, 50.0);
        write_leaf(&mut buf, 50.0, 100.0, 0.0, 50.0);
        write_leaf(&mut buf, 0.0, 50.0, 50.0, 100.0);
        write_leaf(&mut buf, 50.0, 100.0, 50.0, 100.0);

        let map = parse_height_map(&buf).unwrap();
        assert_eq!(map.sector_count(), 5);
        assert_eq!(map.face_count(), 4);
        assert_eq!(map.leaf_at(60.0, 60.0).unwrap().bounds.x_min, 50.0);
    }

    #[test]
    fn rejects_unbounded_nesting() {
        let mut buf = Vec::new();
        write_bytes(&mut buf, HEIGHT_MAP_MAGIC);
        for _ in 0..=MAX_SECTOR_DEPTH {
            write_bounds(&mut buf, 0.0, 1.0, 0.0, 1.0);
            write_u32(&mut buf, 0);
            write_u32(&mut buf, 1);
        }

        assert!(matches!(
            parse_height_map(&buf),
            Err(HeightMapError::TooDeep { max: MAX_SECTOR_DEPTH, .. })
        ));
    }

    #[test]
    fn rejects_bad_magic_and_truncation() {
        let mut data = quadtree();
        data[..4].copy_from_slice(b"VTHX");
        assert!(matches!(parse_height_map(&data), Err(HeightMapError::BadMagic { .. })));

        let data = quadtree();
        assert!(matches!(
            parse_height_map(&data[..data.len() - 2]),
            Err(HeightMapError::Parse(ParseError::Truncated { .. }))
        ));
    }
}
