/// `VTFF` description files
pub mod description;
/// `VTOP`/`VTO1` world geometry: meshes, props, decals, lights and collision boxes
pub mod geometry;
/// Light records embedded in world geometry
pub mod light;
/// `VTHM` quadtree height maps
pub mod terrain;
