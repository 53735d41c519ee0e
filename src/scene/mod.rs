//! Codec for `VTS1` scene descriptors (`.scn`).
//!
//! A scene names the world geometry and height map to load, sets fog, camera and
//! lighting parameters, and lists module records that place game objects. Records
//! of registered modules are decoded into typed objects (see [`modules`]); all
//! others are kept raw and written back unchanged.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::data::parser_utils::{ByteStream, ParseError, bounded_capacity, parse_magic};
use crate::data::writer_utils::{write_bytes, write_f32, write_string, write_u32, write_vec3, write_zeros};
use crate::game_types::{Color, Vec3};

pub mod modules;

use modules::{ModuleError, SceneModules, VtModule, registry};

pub const SCENE_MAGIC: &[u8; 4] = b"VTS1";

/// Shadow direction used when the stored vector has zero length.
pub const DEFAULT_SHADOW_DIRECTION: Vec3 = Vec3::new(0.0, 0.0, 1.0);

/// The game rejects scenes unless the last raw record is replaced by this many zero bytes.
const RAW_TERMINATOR_SIZE: usize = 16;

/// Smallest record: two empty names and an empty payload.
const MIN_RECORD_SIZE: usize = 12;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("bad magic: expected {expected}, got {found:?}")]
    BadMagic {
        expected: &'static str,
        found: String,
    },
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Decoded scene file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SceneDescriptor {
    /// Main module identity. Only kept so it can be written back.
    pub main_object_name: String,
    pub main_module_name: String,
    pub descriptor_size: u32,

    /// World geometry file name.
    pub geometry_file: String,
    pub height_map_file: String,
    /// Unit length.
    pub shadow_light_direction: Vec3,
    pub sky_texture: String,
    pub fog_color: Color,
    pub fog_near: f32,
    pub fog_far: f32,
    pub camera_near: f32,
    pub camera_far: f32,
    pub ambient_audio: String,

    pub modules: SceneModules,
    /// Records of modules with no registered decoder, in file order.
    pub unrecognized: Vec<VtModule>,
}

impl Default for SceneDescriptor {
    fn default() -> Self {
        SceneDescriptor {
            main_object_name: String::new(),
            main_module_name: String::new(),
            descriptor_size: 0,
            geometry_file: String::new(),
            height_map_file: String::new(),
            shadow_light_direction: DEFAULT_SHADOW_DIRECTION,
            sky_texture: String::new(),
            fog_color: Color::new(0.0, 0.0, 0.0, 1.0),
            fog_near: 0.0,
            fog_far: 0.0,
            camera_near: 0.0,
            camera_far: 0.0,
            ambient_audio: String::new(),
            modules: SceneModules::default(),
            unrecognized: Vec::new(),
        }
    }
}

impl SceneDescriptor {
    /// Number of records [`write_scene`] emits.
    pub fn module_count(&self) -> usize {
        self.modules.len() + self.unrecognized.len()
    }

    /// Set the shadow direction, normalizing it.
    pub fn set_shadow_light_direction(&mut self, direction: Vec3) {
        self.shadow_light_direction = direction.normalize_or(DEFAULT_SHADOW_DIRECTION);
    }
}

/// Module key of a module file name: directories (`\` or `/`) and extension removed.
pub fn module_base_name(module_name: &str) -> &str {
    let file_name = module_name.rsplit(['\\', '/']).next().unwrap_or(module_name);
    file_name
        .rsplit_once('.')
        .map_or(file_name, |(stem, _extension)| stem)
}

fn parse_record(stream: &mut ByteStream<'_>) -> Result<VtModule, ParseError> {
    let object_name = stream.string("module object name")?;
    let module_name = stream.string("module file name")?;
    let payload_len = stream.u32("module payload size")?;
    let payload = stream.bytes("module payload", payload_len as usize)?.to_vec();
    Ok(VtModule {
        object_name,
        module_name,
        payload,
    })
}

/// Parse a scene held in memory.
pub fn parse_scene(file_data: &[u8]) -> Result<SceneDescriptor, SceneError> {
    let mut stream = ByteStream::new(file_data);

    let magic: [u8; 4] = stream.read("magic", parse_magic::<4>)?;
    if &magic != SCENE_MAGIC {
        return Err(SceneError::BadMagic {
            expected: "VTS1",
            found: String::from_utf8_lossy(&magic).into_owned(),
        });
    }

    let module_count = stream.u32("module count")?;
    let mut scene = SceneDescriptor {
        main_object_name: stream.string("main object name")?,
        main_module_name: stream.string("main module name")?,
        descriptor_size: stream.u32("descriptor size")?,
        geometry_file: stream.string("geometry file name")?,
        height_map_file: stream.string("height map file name")?,
        shadow_light_direction: stream
            .vec3("shadow light direction")?
            .normalize_or(DEFAULT_SHADOW_DIRECTION),
        sky_texture: stream.string("sky texture name")?,
        fog_color: Color::from_packed_rgb(stream.u32("fog color")?),
        fog_near: stream.f32("fog near")?,
        fog_far: stream.f32("fog far")?,
        camera_near: stream.f32("camera near")?,
        camera_far: stream.f32("camera far")?,
        ambient_audio: stream.string("ambient audio name")?,
        modules: SceneModules::default(),
        unrecognized: Vec::with_capacity(bounded_capacity(module_count, stream.remaining(), MIN_RECORD_SIZE)),
    };

    for _ in 0..module_count {
        let record = parse_record(&mut stream)?;
        match registry().get(record.base_name()) {
            Some(descriptor) => {
                debug!(object = record.object_name, module = descriptor.key, "decoding module");
                descriptor.decode_into(&mut scene.modules, record)?;
            }
            None => {
                info!(
                    object = record.object_name,
                    module = record.module_name,
                    "no decoder for module, keeping raw record"
                );
                scene.unrecognized.push(record);
            }
        }
    }

    debug!(
        typed = scene.modules.len(),
        raw = scene.unrecognized.len(),
        "parsed scene {}",
        scene.geometry_file
    );
    Ok(scene)
}

/// Read and parse a scene file.
pub fn parse_scene_file(path: &Path) -> Result<SceneDescriptor, SceneError> {
    let data = std::fs::read(path).map_err(|source| SceneError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_scene(&data)
}

/// Encode a scene.
///
/// Typed objects are written first, grouped by module type in registry order,
/// then the raw records. The last raw record is replaced by a zero terminator.
pub fn write_scene(scene: &SceneDescriptor) -> Vec<u8> {
    let mut buf = Vec::new();

    write_bytes(&mut buf, SCENE_MAGIC);
    write_u32(&mut buf, scene.module_count() as u32);
    write_string(&mut buf, &scene.main_object_name);
    write_string(&mut buf, &scene.main_module_name);
    write_u32(&mut buf, scene.descriptor_size);

    write_string(&mut buf, &scene.geometry_file);
    write_string(&mut buf, &scene.height_map_file);
    write_vec3(&mut buf, scene.shadow_light_direction);
    write_string(&mut buf, &scene.sky_texture);
    write_u32(&mut buf, scene.fog_color.to_packed_rgb());
    write_f32(&mut buf, scene.fog_near);
    write_f32(&mut buf, scene.fog_far);
    write_f32(&mut buf, scene.camera_near);
    write_f32(&mut buf, scene.camera_far);
    write_string(&mut buf, &scene.ambient_audio);

    for descriptor in registry().descriptors() {
        descriptor.encode_all(&scene.modules, &mut buf);
    }

    if let Some((_last, rest)) = scene.unrecognized.split_last() {
        for record in rest {
            record.write_raw(&mut buf);
        }
        write_zeros(&mut buf, RAW_TERMINATOR_SIZE);
    }

    buf
}

/// Encode a scene and write it to `path`.
pub fn write_scene_file(scene: &SceneDescriptor, path: &Path) -> Result<(), SceneError> {
    std::fs::write(path, write_scene(scene)).map_err(|source| SceneError::Io {
        path: path.to_path_buf(),
        source,
    })
}
