//! Locating and loading scene resources from a VToy game directory.
//!
//! The game ships on case-insensitive filesystems and scenes refer to files with
//! `\` separators and arbitrary casing, so every lookup walks the path one
//! component at a time and matches names case-insensitively.

use std::fs::read_dir;
use std::path::{Path, PathBuf};

use bon::Builder;
use tracing::{debug, info};

use crate::error::ErrorKind;
use crate::models::geometry::{WorldGeometry, parse_geometry_file};
use crate::models::terrain::{HeightMap, parse_height_map_file};
use crate::scene::{SceneDescriptor, parse_scene_file, write_scene_file};

pub const SCENES_DIR: &str = "scns";
pub const TEXTURES_DIR: &str = "texs";
pub const DESCRIPTIONS_DIR: &str = "nfos";
pub const EXPORT_DIR: &str = "Export";

/// Directory layout of a game installation. Sub-directories are relative to `root`.
#[derive(Builder, Debug, Clone)]
pub struct GameLayout {
    #[builder(into)]
    root: PathBuf,
    #[builder(into, default = PathBuf::from(SCENES_DIR))]
    scenes_dir: PathBuf,
    #[builder(into, default = PathBuf::from(TEXTURES_DIR))]
    textures_dir: PathBuf,
    #[builder(into, default = PathBuf::from(DESCRIPTIONS_DIR))]
    descriptions_dir: PathBuf,
    #[builder(into, default = PathBuf::from(EXPORT_DIR))]
    export_dir: PathBuf,
}

impl GameLayout {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scenes_dir(&self) -> PathBuf {
        self.root.join(&self.scenes_dir)
    }

    pub fn textures_dir(&self) -> PathBuf {
        self.root.join(&self.textures_dir)
    }

    pub fn descriptions_dir(&self) -> PathBuf {
        self.root.join(&self.descriptions_dir)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.root.join(&self.export_dir)
    }

    /// List the scene files in the scenes directory, sorted by name.
    pub fn list_scenes(&self) -> Result<Vec<String>, ErrorKind> {
        let mut scenes = Vec::new();
        for entry in read_dir(self.scenes_dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.to_ascii_lowercase().ends_with(".scn") {
                scenes.push(name);
            }
        }
        scenes.sort();
        Ok(scenes)
    }

    /// Resolve a scene by file name inside the scenes directory.
    pub fn resolve_scene(&self, scene_name: &str) -> Result<PathBuf, ErrorKind> {
        resolve_case_insensitive(&self.scenes_dir(), scene_name)
    }

    /// Resolve a texture name as stored in a material.
    pub fn resolve_texture(&self, texture_name: &str) -> Result<PathBuf, ErrorKind> {
        resolve_case_insensitive(&self.textures_dir(), texture_name)
    }

    /// Resolve a path stored in a scene (such as `nfos\level.opt`) against the game root.
    pub fn resolve_game_path(&self, stored_path: &str) -> Result<PathBuf, ErrorKind> {
        resolve_case_insensitive(&self.root, stored_path)
    }
}

fn find_entry(dir: &Path, name: &str) -> Result<PathBuf, ErrorKind> {
    let not_found = || ErrorKind::FileNotFound {
        name: name.to_string(),
        dir: dir.to_path_buf(),
    };

    let candidate = dir.join(name);
    if candidate.exists() {
        return Ok(candidate);
    }

    for entry in read_dir(dir).map_err(|_| not_found())? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().eq_ignore_ascii_case(name) {
            return Ok(entry.path());
        }
    }
    Err(not_found())
}

/// Resolve `relative` (separated by `\` or `/`) under `base`, ignoring ASCII case in every component.
///
/// `..` and drive prefixes are rejected so the result never leaves `base`.
pub fn resolve_case_insensitive(base: &Path, relative: &str) -> Result<PathBuf, ErrorKind> {
    let components: Vec<&str> = relative
        .split(['\\', '/'])
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();
    if components.iter().any(|c| *c == ".." || c.contains(':')) {
        return Err(ErrorKind::UnsafePath(relative.to_string()));
    }
    if components.is_empty() {
        return Err(ErrorKind::FileNotFound {
            name: relative.to_string(),
            dir: base.to_path_buf(),
        });
    }

    let mut path = base.to_path_buf();
    for component in components {
        path = find_entry(&path, component)?;
    }
    Ok(path)
}

/// A scene plus the geometry and height map it references.
#[derive(Debug)]
pub struct SceneBundle {
    pub scene_path: PathBuf,
    pub scene: SceneDescriptor,
    /// `None` when the scene names no geometry file.
    pub geometry: Option<WorldGeometry>,
    /// `None` when the scene names no height map.
    pub height_map: Option<HeightMap>,
}

impl SceneBundle {
    /// Texture names referenced by the geometry that have no file in the textures directory.
    pub fn missing_textures(&self, layout: &GameLayout) -> Vec<String> {
        let Some(geometry) = &self.geometry else {
            return Vec::new();
        };
        geometry
            .texture_names()
            .into_iter()
            .filter(|name| layout.resolve_texture(name).is_err())
            .map(str::to_string)
            .collect()
    }
}

/// Parse a scene from the scenes directory together with its geometry and height map.
pub fn load_scene_bundle(layout: &GameLayout, scene_name: &str) -> Result<SceneBundle, ErrorKind> {
    let scene_path = layout.resolve_scene(scene_name)?;
    let scene = parse_scene_file(&scene_path)?;

    let geometry = if scene.geometry_file.is_empty() {
        None
    } else {
        let path = layout.resolve_game_path(&scene.geometry_file)?;
        debug!("loading geometry from {}", path.display());
        Some(parse_geometry_file(&path)?)
    };

    let height_map = if scene.height_map_file.is_empty() {
        None
    } else {
        let path = layout.resolve_game_path(&scene.height_map_file)?;
        debug!("loading height map from {}", path.display());
        Some(parse_height_map_file(&path)?)
    };

    info!(
        modules = scene.module_count(),
        has_geometry = geometry.is_some(),
        has_height_map = height_map.is_some(),
        "loaded scene {}",
        scene_path.display()
    );

    Ok(SceneBundle {
        scene_path,
        scene,
        geometry,
        height_map,
    })
}

/// File name a scene is exported under: the geometry file's stem with a `.scn` extension.
pub fn export_file_name(scene: &SceneDescriptor) -> Option<String> {
    let file_name = scene.geometry_file.rsplit(['\\', '/']).next()?;
    let stem = file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem);
    if stem.is_empty() {
        return None;
    }
    Some(format!("{stem}.scn"))
}

/// Write `scene` into the export directory, creating it if needed. Returns the written path.
pub fn export_scene(layout: &GameLayout, scene: &SceneDescriptor) -> Result<PathBuf, ErrorKind> {
    let file_name = export_file_name(scene).ok_or_else(|| ErrorKind::FileNotFound {
        name: scene.geometry_file.clone(),
        dir: layout.root().to_path_buf(),
    })?;

    let export_dir = layout.export_dir();
    std::fs::create_dir_all(&export_dir)?;
    let path = export_dir.join(file_name);
    write_scene_file(scene, &path)?;
    info!("exported scene to {}", path.display());
    Ok(path)
}
