use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use rootcause::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vtoytools::data::pack::{read_pack_file, repack, unpack};
use vtoytools::data::serialization::pack_to_serialized_files;
use vtoytools::error::ErrorKind;
use vtoytools::game_data::{GameLayout, export_scene, load_scene_bundle};
use vtoytools::models::description::parse_description_file;
use vtoytools::models::geometry::parse_geometry_file;
use vtoytools::models::terrain::parse_height_map_file;
use vtoytools::scene::{parse_scene_file, write_scene_file};

/// Inspect, extract and rebuild VToy game assets
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract a vtPack archive into a directory
    Unpack {
        /// Archive to read
        archive: PathBuf,
        /// Directory to extract into. Created if missing
        out_dir: PathBuf,
    },
    /// Build a vtPack archive from a directory tree
    Repack {
        /// Directory whose contents become the archive root
        in_dir: PathBuf,
        /// Archive to write
        archive: PathBuf,
    },
    /// List the entries of a vtPack archive
    List {
        archive: PathBuf,
        /// Print the listing as JSON
        #[clap(long)]
        json: bool,
    },
    /// Print a scene descriptor
    Scene {
        file: PathBuf,
        /// Print the full decoded scene as JSON
        #[clap(long)]
        json: bool,
    },
    /// Summarize a world geometry file
    Geometry {
        file: PathBuf,
        /// Print the full decoded geometry as JSON
        #[clap(long)]
        json: bool,
    },
    /// Summarize a height map
    Heightmap { file: PathBuf },
    /// Check a description file
    Describe { file: PathBuf },
    /// Parse a scene and write it back out
    RoundtripScene { input: PathBuf, output: PathBuf },
    /// Load a scene with its geometry and height map from a game directory
    Bundle {
        /// Game root containing scns/, nfos/ and texs/
        game_dir: PathBuf,
        /// Scene file name inside scns/
        scene: String,
        /// Also write the scene to the Export/ directory
        #[clap(long)]
        export: bool,
    },
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Report> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
    println!("{json}");
    Ok(())
}

fn list(archive: &Path, json: bool) -> Result<(), Report> {
    let pack = read_pack_file(archive).context_with(|| format!("Failed to read archive {}", archive.display()))?;
    let files = pack_to_serialized_files(&pack);
    if json {
        return print_json(&files);
    }

    println!("vtPack {} with {} entries", pack.version, files.len());
    for file in &files {
        if file.is_directory() {
            println!("{:>10}  {}/", "", file.path());
        } else if let Some(kind) = file.unknown_kind() {
            println!("{:>10}  {} (unknown type {kind})", file.size(), file.path());
        } else {
            println!("{:>10}  {}", file.size(), file.path());
        }
    }
    Ok(())
}

fn scene(file: &Path, json: bool) -> Result<(), Report> {
    let scene = parse_scene_file(file).context_with(|| format!("Failed to parse scene {}", file.display()))?;
    if json {
        return print_json(&scene);
    }

    println!("geometry:    {}", scene.geometry_file);
    println!("height map:  {}", scene.height_map_file);
    println!("sky:         {}", scene.sky_texture);
    println!("audio:       {}", scene.ambient_audio);
    println!("fog:         {:.1} .. {:.1}", scene.fog_near, scene.fog_far);
    println!("camera:      {:.1} .. {:.1}", scene.camera_near, scene.camera_far);
    println!("cars:        {}", scene.modules.cars.len());
    println!("start points:{:>2}", scene.modules.start_points.len());
    println!("flags:       {}", scene.modules.flags.len());
    println!("health packs:{:>2}", scene.modules.health_packs.len());
    for record in &scene.unrecognized {
        println!("raw module:  {} ({})", record.object_name, record.module_name);
    }
    Ok(())
}

fn geometry(file: &Path, json: bool) -> Result<(), Report> {
    let geometry =
        parse_geometry_file(file).context_with(|| format!("Failed to parse geometry {}", file.display()))?;
    if json {
        return print_json(&geometry);
    }

    println!("format:      {:?}", geometry.format);
    println!("meshes:      {}", geometry.meshes.len());
    println!("props:       {}", geometry.props.len());
    println!("decals:      {}", geometry.decals.len());
    println!("lights:      {}", geometry.lights.len());
    println!("boxes:       {}", geometry.all_collision_boxes().count());
    println!("triangles:   {}", geometry.triangle_count());
    for texture in geometry.texture_names() {
        println!("texture:     {texture}");
    }
    Ok(())
}

fn describe(file: &Path) -> Result<(), Report> {
    match parse_description_file(file).map_err(ErrorKind::from) {
        Ok(_) => println!("{}: decoded", file.display()),
        Err(err) if err.is_not_implemented() => {
            println!("{}: valid description file, decoding is not available", file.display())
        }
        Err(err) if err.is_magic_mismatch() => bail!("{} is not a description file: {err}", file.display()),
        Err(err) => bail!("Failed to read description file {}: {err}", file.display()),
    }
    Ok(())
}

fn bundle(game_dir: &Path, scene_name: &str, export: bool) -> Result<(), Report> {
    let layout = GameLayout::builder().root(game_dir).build();
    let bundle = load_scene_bundle(&layout, scene_name)
        .context_with(|| format!("Failed to load scene {scene_name} from {}", game_dir.display()))?;

    if let Some(geometry) = &bundle.geometry {
        println!("{} meshes, {} triangles", geometry.meshes.len(), geometry.triangle_count());
    }
    if let Some(height_map) = &bundle.height_map {
        println!("{} height map sectors", height_map.sector_count());
    }
    for texture in bundle.missing_textures(&layout) {
        warn!("texture missing: {texture}");
    }

    if export {
        let path = export_scene(&layout, &bundle.scene).context("Failed to export scene")?;
        println!("exported {}", path.display());
    }
    Ok(())
}

fn main() -> Result<(), Report> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match args.command {
        Command::Unpack { archive, out_dir } => {
            let summary = unpack(&archive, &out_dir)
                .context_with(|| format!("Failed to unpack {}", archive.display()))?;
            info!(
                directories = summary.directories,
                files = summary.files,
                placeholders = summary.placeholders,
                skipped = summary.unknown_entries,
                bytes = summary.bytes,
                "unpacked {}",
                archive.display()
            );
        }
        Command::Repack { in_dir, archive } => {
            let summary =
                repack(&in_dir, &archive).context_with(|| format!("Failed to repack {}", in_dir.display()))?;
            info!(
                directories = summary.directories,
                files = summary.files,
                bytes = summary.bytes,
                "wrote {}",
                archive.display()
            );
        }
        Command::List { archive, json } => list(&archive, json)?,
        Command::Scene { file, json } => scene(&file, json)?,
        Command::Geometry { file, json } => geometry(&file, json)?,
        Command::Heightmap { file } => {
            let height_map = parse_height_map_file(&file)
                .context_with(|| format!("Failed to parse height map {}", file.display()))?;
            println!("sectors:     {}", height_map.sector_count());
            println!("depth:       {}", height_map.depth());
            println!("faces:       {}", height_map.face_count());
            let bounds = &height_map.root.bounds;
            println!(
                "bounds:      x {:.1} .. {:.1}, z {:.1} .. {:.1}",
                bounds.x_min, bounds.x_max, bounds.z_min, bounds.z_max
            );
        }
        Command::Describe { file } => describe(&file)?,
        Command::RoundtripScene { input, output } => {
            let scene =
                parse_scene_file(&input).context_with(|| format!("Failed to parse scene {}", input.display()))?;
            write_scene_file(&scene, &output)
                .context_with(|| format!("Failed to write scene {}", output.display()))?;
            info!(modules = scene.module_count(), "wrote {}", output.display());
        }
        Command::Bundle {
            game_dir,
            scene,
            export,
        } => bundle(&game_dir, &scene, export)?,
    }

    Ok(())
}
