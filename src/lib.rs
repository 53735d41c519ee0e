/// Utilities for interacting with the game's data files
pub mod data;
/// Error definitions
pub mod error;
/// Locating and loading scenes from a VToy installation directory.
pub mod game_data;
/// Geometric primitives shared by the asset formats.
pub mod game_types;
/// World geometry, lights, height maps and description files
pub mod models;
/// Generic wrapper for values that may or may not match a known variant.
pub mod recognized;
/// Scene descriptors and the game modules they place
pub mod scene;
