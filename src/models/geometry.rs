//! Parser for world geometry files (`VTOP` legacy, `VTO1` current).
//!
//! Layout, all little-endian:
//! - Header: magic, `u32` counts for scene objects, meshes, props, decals, lights
//!   and hulls, a collision box count (current format only) and one unused `u32`
//! - Static meshes: materials, then LODs of blocks of sub-meshes, then corners and
//!   the world transform. Legacy blocks carry a shared vertex pool that sub-meshes
//!   index through a remap table; current sub-meshes carry their own vertices.
//! - Props, decals and lights
//! - Collision boxes (current format only; legacy files nest them per mesh and prop)

use std::path::{Path, PathBuf};

use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, warn};

use crate::data::parser_utils::{ByteStream, ParseError, bounded_capacity, parse_magic, parse_vec2};
use crate::game_types::{Matrix4x4, Vec2, Vec3};
use crate::models::light::{LightObject, parse_light};

pub const LEGACY_MAGIC: &[u8; 4] = b"VTOP";
pub const CURRENT_MAGIC: &[u8; 4] = b"VTO1";

const UV_BLOCK_SIZE: usize = 64;
const CORNERS_SIZE: usize = 8 * 12;
const VERTEX_SIZE: usize = 32;
/// Vertices with a second UV pair, which is skipped.
const EXTENDED_VERTEX_SIZE: usize = 40;
const MATRIX_SIZE: usize = 64;
/// Empty name, no textures, flag, UV block and reserved value.
const MIN_MATERIAL_SIZE: usize = 4 + 4 + 1 + UV_BLOCK_SIZE + 4;

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("bad magic: expected {expected}, got {found:?}")]
    BadMagic {
        expected: &'static str,
        found: String,
    },
    #[error("vertex remap index {index} at 0x{offset:X} is outside the {pool_len}-vertex pool")]
    RemapOutOfRange {
        index: u16,
        pool_len: usize,
        offset: usize,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GeometryFormat {
    /// `VTOP`
    Legacy,
    /// `VTO1`
    Current,
}

impl GeometryFormat {
    pub fn from_magic(magic: &[u8; 4]) -> Option<GeometryFormat> {
        match magic {
            LEGACY_MAGIC => Some(GeometryFormat::Legacy),
            CURRENT_MAGIC => Some(GeometryFormat::Current),
            _ => None,
        }
    }

    pub fn magic(self) -> &'static [u8; 4] {
        match self {
            GeometryFormat::Legacy => LEGACY_MAGIC,
            GeometryFormat::Current => CURRENT_MAGIC,
        }
    }

    pub fn is_legacy(self) -> bool {
        self == GeometryFormat::Legacy
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Material {
    pub name: String,
    /// Texture names; the first one is the diffuse texture.
    pub texture_names: Vec<String>,
    pub two_sided: bool,
    pub reserved: f32,
}

impl Material {
    pub fn diffuse_texture(&self) -> Option<&str> {
        self.texture_names
            .first()
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubMesh {
    pub vertices: Vec<Vertex>,
    /// Triangle list.
    pub indices: Vec<u16>,
    pub material_index: u32,
}

impl SubMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Collision volumes. The two formats store different shapes under the same
/// record layout, so they are kept apart.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CollisionBox {
    /// Current-format box: oriented by `transform`, sized by `half_extents`.
    Extents {
        transform: Matrix4x4,
        half_extents: Vec3,
    },
    /// Legacy inline box: a transform and a raw position.
    Legacy { transform: Matrix4x4, position: Vec3 },
}

impl CollisionBox {
    pub fn transform(&self) -> &Matrix4x4 {
        match self {
            CollisionBox::Extents { transform, .. } | CollisionBox::Legacy { transform, .. } => {
                transform
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StaticMeshAsset {
    pub materials: Vec<Material>,
    /// Sub-meshes of the first LOD.
    pub sub_meshes: Vec<SubMesh>,
    /// Inline boxes, legacy format only.
    pub collision_boxes: Vec<CollisionBox>,
    pub corners: [Vec3; 8],
    pub world_transform: Matrix4x4,
}

impl StaticMeshAsset {
    pub fn triangle_count(&self) -> usize {
        self.sub_meshes.iter().map(SubMesh::triangle_count).sum()
    }

    pub fn material(&self, sub_mesh: &SubMesh) -> Option<&Material> {
        self.materials.get(sub_mesh.material_index as usize)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropObject {
    pub mesh_index: u32,
    pub transform: Matrix4x4,
    pub corners: [Vec3; 8],
    /// Inline boxes, legacy format only.
    pub collision_boxes: Vec<CollisionBox>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecalObject {
    /// Also the decal's texture name.
    pub name: String,
    pub position: Vec3,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Depth offset against z-fighting with the surface below.
    pub z_bias: f32,
}

/// Decoded contents of a world geometry file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldGeometry {
    pub format: GeometryFormat,
    pub scene_object_count: u32,
    /// Hull records are counted in the header but never decoded.
    pub hull_count: u32,
    pub meshes: Vec<StaticMeshAsset>,
    pub props: Vec<PropObject>,
    pub decals: Vec<DecalObject>,
    pub lights: Vec<LightObject>,
    /// Top-level boxes, current format only.
    pub collision_boxes: Vec<CollisionBox>,
}

impl WorldGeometry {
    /// Distinct diffuse texture names across all materials, in first-use order.
    pub fn texture_names(&self) -> Vec<&str> {
        self.meshes
            .iter()
            .flat_map(|mesh| mesh.materials.iter())
            .filter_map(Material::diffuse_texture)
            .unique()
            .collect()
    }

    /// Top-level boxes followed by every mesh's and prop's inline boxes.
    pub fn all_collision_boxes(&self) -> impl Iterator<Item = &CollisionBox> {
        self.collision_boxes
            .iter()
            .chain(self.meshes.iter().flat_map(|mesh| mesh.collision_boxes.iter()))
            .chain(self.props.iter().flat_map(|prop| prop.collision_boxes.iter()))
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(StaticMeshAsset::triangle_count).sum()
    }

    pub fn prop_mesh(&self, prop: &PropObject) -> Option<&StaticMeshAsset> {
        self.meshes.get(prop.mesh_index as usize)
    }
}

fn parse_material(stream: &mut ByteStream<'_>) -> Result<Material, GeometryError> {
    let name = stream.string("material name")?;
    let texture_count = stream.u32("material texture count")?;
    let mut texture_names = Vec::with_capacity(bounded_capacity(texture_count, stream.remaining(), 4));
    for _ in 0..texture_count {
        texture_names.push(stream.string("material texture name")?);
    }
    let two_sided = stream.u8("material two-sided flag")? != 0;
    stream.skip("material uv block", UV_BLOCK_SIZE)?;
    let reserved = stream.f32("material reserved value")?;

    Ok(Material {
        name,
        texture_names,
        two_sided,
        reserved,
    })
}

fn parse_vertex(stream: &mut ByteStream<'_>, stride: usize) -> Result<Vertex, GeometryError> {
    let position = stream.vec3("vertex position")?;
    let normal = stream.vec3("vertex normal")?;
    let uv = stream.read("vertex uv", parse_vec2)?;
    if stride == EXTENDED_VERTEX_SIZE {
        stream.skip("vertex second uv", EXTENDED_VERTEX_SIZE - VERTEX_SIZE)?;
    }
    Ok(Vertex { position, normal, uv })
}

fn parse_vertices(
    stream: &mut ByteStream<'_>,
    count: u32,
    stride: usize,
) -> Result<Vec<Vertex>, GeometryError> {
    let mut vertices = Vec::with_capacity(bounded_capacity(count, stream.remaining(), stride));
    for _ in 0..count {
        vertices.push(parse_vertex(stream, stride)?);
    }
    Ok(vertices)
}

fn parse_legacy_sub_mesh(
    stream: &mut ByteStream<'_>,
    pool: &[Vertex],
    retain: bool,
) -> Result<Option<SubMesh>, GeometryError> {
    let material_index = stream.u32("sub-mesh material index")?;
    let face_count = stream.u32("sub-mesh face count")?;
    let remap_count = stream.u32("sub-mesh remap count")?;
    stream.u32("sub-mesh unknown")?;

    let remap_offset = stream.offset();
    let remap = stream.u16_array("sub-mesh vertex remap", remap_count as usize)?;
    let indices = stream.u16_array("sub-mesh indices", face_count as usize * 3)?;

    if !retain {
        return Ok(None);
    }

    let vertices = remap
        .iter()
        .enumerate()
        .map(|(i, &index)| {
            pool.get(index as usize)
                .copied()
                .ok_or(GeometryError::RemapOutOfRange {
                    index,
                    pool_len: pool.len(),
                    offset: remap_offset + i * 2,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(SubMesh {
        vertices,
        indices,
        material_index,
    }))
}

fn parse_current_sub_mesh(
    stream: &mut ByteStream<'_>,
    stride_type: u32,
    retain: bool,
) -> Result<Option<SubMesh>, GeometryError> {
    stream.u32("sub-mesh material id")?;
    let material_index = stream.u32("sub-mesh material index")?;
    let face_count = stream.u32("sub-mesh face count")?;
    let vertex_count = stream.u32("sub-mesh vertex count")?;
    stream.u32("sub-mesh unknown")?;

    let indices = stream.u16_array("sub-mesh indices", face_count as usize * 3)?;
    let stride = if stride_type != 0 {
        EXTENDED_VERTEX_SIZE
    } else {
        VERTEX_SIZE
    };

    if !retain {
        stream.skip("sub-mesh vertices", vertex_count as usize * stride)?;
        return Ok(None);
    }

    let vertices = parse_vertices(stream, vertex_count, stride)?;
    Ok(Some(SubMesh {
        vertices,
        indices,
        material_index,
    }))
}

/// Walk one LOD block, appending its sub-meshes to `out` when `retain` is set.
fn parse_block(
    stream: &mut ByteStream<'_>,
    format: GeometryFormat,
    retain: bool,
    out: &mut Vec<SubMesh>,
) -> Result<(), GeometryError> {
    stream.u8("block active flag")?;
    let pool_count = if format.is_legacy() {
        stream.u32("block vertex pool count")?
    } else {
        0
    };
    let sub_mesh_count = stream.u32("block sub-mesh count")?;
    stream.skip("block corners", CORNERS_SIZE)?;

    let pool = if format.is_legacy() {
        parse_vertices(stream, pool_count, VERTEX_SIZE)?
    } else {
        Vec::new()
    };

    for _ in 0..sub_mesh_count {
        let stride_type = stream.u32("sub-mesh stride type")?;
        let sub_mesh = match format {
            GeometryFormat::Legacy => parse_legacy_sub_mesh(stream, &pool, retain)?,
            GeometryFormat::Current => parse_current_sub_mesh(stream, stride_type, retain)?,
        };
        out.extend(sub_mesh);
    }

    Ok(())
}

fn parse_legacy_boxes(
    stream: &mut ByteStream<'_>,
    field: &'static str,
) -> Result<Vec<CollisionBox>, GeometryError> {
    let count = stream.u32(field)?;
    let mut boxes = Vec::with_capacity(bounded_capacity(count, stream.remaining(), MATRIX_SIZE + 12));
    for _ in 0..count {
        boxes.push(CollisionBox::Legacy {
            transform: stream.matrix("collision box transform")?,
            position: stream.vec3("collision box position")?,
        });
    }
    Ok(boxes)
}

fn parse_mesh(
    stream: &mut ByteStream<'_>,
    format: GeometryFormat,
) -> Result<StaticMeshAsset, GeometryError> {
    let material_count = stream.u32("mesh material count")?;
    let mut materials = Vec::with_capacity(bounded_capacity(material_count, stream.remaining(), MIN_MATERIAL_SIZE));
    for _ in 0..material_count {
        materials.push(parse_material(stream)?);
    }

    // Only the first LOD is kept; the rest are walked to stay aligned.
    let lod_count = stream.u32("mesh lod count")?;
    let mut sub_meshes = Vec::new();
    for lod in 0..lod_count {
        stream.u32("lod unknown")?;
        let block_count = stream.u32("lod block count")?;
        for _ in 0..block_count {
            parse_block(stream, format, lod == 0, &mut sub_meshes)?;
        }
    }

    let collision_boxes = if format.is_legacy() {
        parse_legacy_boxes(stream, "mesh collision box count")?
    } else {
        Vec::new()
    };

    Ok(StaticMeshAsset {
        materials,
        sub_meshes,
        collision_boxes,
        corners: stream.corners("mesh corners")?,
        world_transform: stream.matrix("mesh world transform")?,
    })
}

fn parse_prop(stream: &mut ByteStream<'_>, format: GeometryFormat) -> Result<PropObject, GeometryError> {
    let mesh_index = stream.u32("prop mesh index")?;
    let transform = stream.matrix("prop transform")?;
    let corners = stream.corners("prop corners")?;
    let collision_boxes = if format.is_legacy() {
        parse_legacy_boxes(stream, "prop collision box count")?
    } else {
        Vec::new()
    };

    Ok(PropObject {
        mesh_index,
        transform,
        corners,
        collision_boxes,
    })
}

fn parse_decal(stream: &mut ByteStream<'_>) -> Result<DecalObject, GeometryError> {
    Ok(DecalObject {
        name: stream.string("decal name")?,
        position: stream.vec3("decal position")?,
        scale_x: stream.f32("decal scale x")?,
        scale_y: stream.f32("decal scale y")?,
        z_bias: stream.f32("decal z bias")?,
    })
}

/// Parse a world geometry file held in memory.
pub fn parse_geometry(file_data: &[u8]) -> Result<WorldGeometry, GeometryError> {
    let mut stream = ByteStream::new(file_data);

    let magic: [u8; 4] = stream.read("magic", parse_magic::<4>)?;
    let format = GeometryFormat::from_magic(&magic).ok_or_else(|| GeometryError::BadMagic {
        expected: "VTOP or VTO1",
        found: String::from_utf8_lossy(&magic).into_owned(),
    })?;

    let scene_object_count = stream.u32("scene object count")?;
    let mesh_count = stream.u32("mesh count")?;
    let prop_count = stream.u32("prop count")?;
    let decal_count = stream.u32("decal count")?;
    let light_count = stream.u32("light count")?;
    let hull_count = stream.u32("hull count")?;
    let collision_box_count = match format {
        GeometryFormat::Legacy => 0,
        GeometryFormat::Current => stream.u32("collision box count")?,
    };
    stream.u32("unused header field")?;

    debug!(
        ?format,
        mesh_count, prop_count, decal_count, light_count, "parsing world geometry"
    );

    let mut meshes = Vec::with_capacity(bounded_capacity(mesh_count, stream.remaining(), 8));
    for _ in 0..mesh_count {
        meshes.push(parse_mesh(&mut stream, format)?);
    }

    let mut props = Vec::with_capacity(bounded_capacity(prop_count, stream.remaining(), 4 + MATRIX_SIZE));
    for _ in 0..prop_count {
        props.push(parse_prop(&mut stream, format)?);
    }

    let mut decals = Vec::with_capacity(bounded_capacity(decal_count, stream.remaining(), 28));
    for _ in 0..decal_count {
        decals.push(parse_decal(&mut stream)?);
    }

    let mut lights = Vec::with_capacity(bounded_capacity(light_count, stream.remaining(), 52));
    for _ in 0..light_count {
        lights.push(parse_light(&mut stream, format)?);
    }

    if hull_count > 0 {
        warn!(hull_count, "hull records are not decoded");
    }

    let mut collision_boxes =
        Vec::with_capacity(bounded_capacity(collision_box_count, stream.remaining(), MATRIX_SIZE + 12));
    for _ in 0..collision_box_count {
        collision_boxes.push(CollisionBox::Extents {
            transform: stream.matrix("collision box transform")?,
            half_extents: stream.vec3("collision box half extents")?,
        });
    }

    Ok(WorldGeometry {
        format,
        scene_object_count,
        hull_count,
        meshes,
        props,
        decals,
        lights,
        collision_boxes,
    })
}

/// Read and parse a world geometry file.
pub fn parse_geometry_file(path: &Path) -> Result<WorldGeometry, GeometryError> {
    let data = std::fs::read(path).map_err(|source| GeometryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_geometry(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::writer_utils::{
        write_bytes, write_color, write_f32, write_matrix, write_string, write_u8, write_u32, write_vec3, write_zeros,
    };
    use crate::game_types::Color;
    use crate::models::light::LightKind;

    struct Counts {
        meshes: u32,
        props: u32,
        decals: u32,
        lights: u32,
        hulls: u32,
        boxes: u32,
    }

    fn write_header(buf: &mut Vec<u8>, format: GeometryFormat, counts: Counts) {
        write_bytes(buf, format.magic());
        write_u32(buf, 0);
        write_u32(buf, counts.meshes);
        write_u32(buf, counts.props);
        write_u32(buf, counts.decals);
        write_u32(buf, counts.lights);
        write_u32(buf, counts.hulls);
        if format == GeometryFormat::Current {
            write_u32(buf, counts.boxes);
        }
        write_u32(buf, 0);
    }

    fn write_material(buf: &mut Vec<u8>, name: &str, textures: &[&str]) {
        write_string(buf, name);
        write_u32(buf, textures.len() as u32);
        for texture in textures {
            write_string(buf, texture);
        }
        write_u8(buf, 1);
        write_zeros(buf, UV_BLOCK_SIZE);
        write_f32(buf, 0.25);
    }

    fn write_vertex(buf: &mut Vec<u8>, x: f32, extended: bool) {
        write_vec3(buf, Vec3::new(x, 0.0, 0.0));
        write_vec3(buf, Vec3::new(0.0, 1.0, 0.0));
        write_f32(buf, x / 10.0);
        write_f32(buf, 0.5);
        if extended {
            write_f32(buf, 99.0);
            write_f32(buf, 99.0);
        }
    }

    fn write_corners(buf: &mut Vec<u8>) {
        for i in 0..8 {
            write_vec3(buf, Vec3::new(i as f32, 0.0, 0.0));
        }
    }

    fn write_block_header(buf: &mut Vec<u8>, pool_count: Option<u32>, sub_meshes: u32) {
        write_u8(buf, 1);
        if let Some(pool_count) = pool_count {
            write_u32(buf, pool_count);
        }
        write_u32(buf, sub_meshes);
        write_zeros(buf, CORNERS_SIZE);
    }

    fn write_current_sub_mesh(buf: &mut Vec<u8>, material_index: u32, vertices: u32, extended: bool) {
        write_u32(buf, extended as u32);
        write_u32(buf, 1234);
        write_u32(buf, material_index);
        write_u32(buf, 1);
        write_u32(buf, vertices);
        write_u32(buf, 0);
        for index in [0u16, 1, 2] {
            buf.extend_from_slice(&index.to_le_bytes());
        }
        for v in 0..vertices {
            write_vertex(buf, v as f32, extended);
        }
    }

    fn write_light_colors(buf: &mut Vec<u8>) {
        for _ in 0..3 {
            write_color(buf, Color::new(0.5, 0.5, 0.5, 1.0));
        }
    }

    fn current_file() -> Vec<u8> {
        let mut buf = Vec::new();
        write_header(
            &mut buf,
            GeometryFormat::Current,
            Counts {
                meshes: 1,
                props: 1,
                decals: 1,
                lights: 1,
                hulls: 0,
                boxes: 1,
            },
        );

        // Mesh: two materials sharing a diffuse texture, two LODs.
        write_u32(&mut buf, 2);
        write_material(&mut buf, "body", &["car.tex", "car_spec.tex"]);
        write_material(&mut buf, "body2", &["car.tex"]);
        write_u32(&mut buf, 2);
        // LOD 0: one block, one 40-byte-stride sub-mesh.
        write_u32(&mut buf, 0);
        write_u32(&mut buf, 1);
        write_block_header(&mut buf, None, 1);
        write_current_sub_mesh(&mut buf, 1, 3, true);
        // LOD 1: one block, one 32-byte-stride sub-mesh that must be discarded.
        write_u32(&mut buf, 0);
        write_u32(&mut buf, 1);
        write_block_header(&mut buf, None, 1);
        write_current_sub_mesh(&mut buf, 0, 4, false);
        write_corners(&mut buf);
        write_matrix(&mut buf, &Matrix4x4::IDENTITY);

        // Prop
        write_u32(&mut buf, 0);
        let mut transform = Matrix4x4::IDENTITY;
        transform.set_translation(Vec3::new(10.0, 0.0, -5.0));
        write_matrix(&mut buf, &transform);
        write_corners(&mut buf);

        // Decal
        write_string(&mut buf, "skid.tex");
        write_vec3(&mut buf, Vec3::new(1.0, 2.0, 3.0));
        write_f32(&mut buf, 2.0);
        write_f32(&mut buf, 4.0);
        write_f32(&mut buf, 0.01);

        // Light: directional
        write_u32(&mut buf, 2);
        write_vec3(&mut buf, Vec3::new(0.0, -1.0, 0.0));
        write_light_colors(&mut buf);

        // Collision box
        write_matrix(&mut buf, &Matrix4x4::IDENTITY);
        write_vec3(&mut buf, Vec3::new(1.0, 2.0, 3.0));
        buf
    }

    #[test]
    fn parses_current_format() {
        let geometry = parse_geometry(&current_file()).unwrap();
        assert_eq!(geometry.format, GeometryFormat::Current);
        assert_eq!(geometry.meshes.len(), 1);

        let mesh = &geometry.meshes[0];
        assert_eq!(mesh.materials.len(), 2);
        assert!(mesh.materials[0].two_sided);
        assert_eq!(mesh.materials[0].reserved, 0.25);
        assert_eq!(mesh.materials[0].diffuse_texture(), Some("car.tex"));

        // LOD 1 is discarded.
        assert_eq!(mesh.sub_meshes.len(), 1);
        let sub_mesh = &mesh.sub_meshes[0];
        assert_eq!(sub_mesh.material_index, 1);
        assert_eq!(sub_mesh.indices, vec![0, 1, 2]);
        assert_eq!(sub_mesh.vertices.len(), 3);
        // The second UV pair of 40-byte vertices is skipped.
        assert_eq!(sub_mesh.vertices[2].position, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(sub_mesh.vertices[2].uv, Vec2::new(0.2, 0.5));
        assert_eq!(mesh.material(sub_mesh).map(|m| m.name.as_str()), Some("body2"));
        assert_eq!(mesh.corners[7], Vec3::new(7.0, 0.0, 0.0));
        assert_eq!(mesh.world_transform, Matrix4x4::IDENTITY);

        assert_eq!(geometry.props[0].transform.translation(), Vec3::new(10.0, 0.0, -5.0));
        assert!(geometry.prop_mesh(&geometry.props[0]).is_some());

        let decal = &geometry.decals[0];
        assert_eq!(decal.name, "skid.tex");
        assert_eq!((decal.scale_x, decal.scale_y, decal.z_bias), (2.0, 4.0, 0.01));

        assert!(matches!(geometry.lights[0].kind, LightKind::Directional { .. }));
        assert_eq!(
            geometry.collision_boxes,
            vec![CollisionBox::Extents {
                transform: Matrix4x4::IDENTITY,
                half_extents: Vec3::new(1.0, 2.0, 3.0),
            }]
        );

        assert_eq!(geometry.texture_names(), vec!["car.tex"]);
        assert_eq!(geometry.triangle_count(), 1);
    }

    fn legacy_file(remap: &[u16]) -> Vec<u8> {
        let mut buf = Vec::new();
        write_header(
            &mut buf,
            GeometryFormat::Legacy,
            Counts {
                meshes: 1,
                props: 1,
                decals: 0,
                lights: 1,
                hulls: 0,
                boxes: 0,
            },
        );

        write_u32(&mut buf, 1);
        write_material(&mut buf, "wall", &["brick.tex"]);
        write_u32(&mut buf, 1);
        write_u32(&mut buf, 0);
        write_u32(&mut buf, 1);
        write_block_header(&mut buf, Some(3), 1);
        for x in [10.0, 20.0, 30.0] {
            write_vertex(&mut buf, x, false);
        }
        // Legacy sub-mesh
        write_u32(&mut buf, 0);
        write_u32(&mut buf, 0);
        write_u32(&mut buf, 1);
        write_u32(&mut buf, remap.len() as u32);
        write_u32(&mut buf, 0);
        for index in remap {
            buf.extend_from_slice(&index.to_le_bytes());
        }
        for index in [1u16, 0, 1] {
            buf.extend_from_slice(&index.to_le_bytes());
        }
        // Mesh inline box
        write_u32(&mut buf, 1);
        write_matrix(&mut buf, &Matrix4x4::IDENTITY);
        write_vec3(&mut buf, Vec3::new(4.0, 5.0, 6.0));
        write_corners(&mut buf);
        write_matrix(&mut buf, &Matrix4x4::IDENTITY);

        // Prop with two inline boxes
        write_u32(&mut buf, 0);
        write_matrix(&mut buf, &Matrix4x4::IDENTITY);
        write_corners(&mut buf);
        write_u32(&mut buf, 2);
        for _ in 0..2 {
            write_matrix(&mut buf, &Matrix4x4::IDENTITY);
            write_vec3(&mut buf, Vec3::ZERO);
        }

        // Legacy point light with a radius
        write_u32(&mut buf, 0);
        write_vec3(&mut buf, Vec3::ZERO);
        write_f32(&mut buf, 12.0);
        write_light_colors(&mut buf);
        buf
    }

    #[test]
    fn legacy_remap_is_materialized() {
        let geometry = parse_geometry(&legacy_file(&[2, 0])).unwrap();
        assert_eq!(geometry.format, GeometryFormat::Legacy);

        let sub_mesh = &geometry.meshes[0].sub_meshes[0];
        let xs: Vec<f32> = sub_mesh.vertices.iter().map(|v| v.position.x).collect();
        assert_eq!(xs, vec![30.0, 10.0]);
        assert_eq!(sub_mesh.indices, vec![1, 0, 1]);

        assert_eq!(
            geometry.meshes[0].collision_boxes,
            vec![CollisionBox::Legacy {
                transform: Matrix4x4::IDENTITY,
                position: Vec3::new(4.0, 5.0, 6.0),
            }]
        );
        assert_eq!(geometry.props[0].collision_boxes.len(), 2);
        assert!(geometry.collision_boxes.is_empty());
        assert_eq!(geometry.all_collision_boxes().count(), 3);
    }

    #[test]
    fn legacy_remap_out_of_range_is_fatal() {
        let err = parse_geometry(&legacy_file(&[0, 3])).unwrap_err();
        assert!(matches!(
            err,
            GeometryError::RemapOutOfRange { index: 3, pool_len: 3, .. }
        ));
    }

    #[test]
    fn rejects_unknown_magic() {
        let mut data = current_file();
        data[..4].copy_from_slice(b"VTO2");
        assert!(matches!(
            parse_geometry(&data),
            Err(GeometryError::BadMagic { found, .. }) if found == "VTO2"
        ));
    }

    #[test]
    fn truncation_reports_field_and_offset() {
        let data = current_file();
        let cut = data.len() - 6;
        match parse_geometry(&data[..cut]) {
            Err(GeometryError::Parse(ParseError::Truncated { field, offset, .. })) => {
                assert_eq!(field, "collision box half extents");
                assert_eq!(offset, data.len() - 12);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn parse_geometry_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.opt");
        std::fs::write(&path, current_file()).unwrap();
        assert_eq!(parse_geometry_file(&path).unwrap().meshes.len(), 1);

        assert!(matches!(
            parse_geometry_file(&dir.path().join("missing.opt")),
            Err(GeometryError::Io { .. })
        ));
    }
}
