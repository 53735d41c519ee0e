use std::path::PathBuf;

use thiserror::Error;

use crate::data::pack::PackError;
use crate::data::parser_utils::ParseError;
use crate::models::description::DescriptionError;
use crate::models::geometry::GeometryError;
use crate::models::terrain::HeightMapError;
use crate::scene::SceneError;
use crate::scene::modules::ModuleError;

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("Archive error: {0}")]
    Pack(#[from] PackError),
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("Height map error: {0}")]
    HeightMap(#[from] HeightMapError),
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),
    #[error("Description error: {0}")]
    Description(#[from] DescriptionError),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[cfg(feature = "json")]
    #[error("Error serializing or deserializing json: {err}")]
    SerdeJson {
        #[from]
        err: serde_json::Error,
    },
    #[error("Path {0:?} escapes its base directory")]
    UnsafePath(String),
    #[error("File not found: {name:?} in {dir}")]
    FileNotFound { name: String, dir: PathBuf },
    #[error("IO error")]
    IoError(#[from] std::io::Error),
}

impl ErrorKind {
    /// The input is well-formed but uses a feature this crate does not decode or encode.
    pub fn is_not_implemented(&self) -> bool {
        matches!(
            self,
            ErrorKind::Pack(PackError::NotImplemented(_))
                | ErrorKind::Description(DescriptionError::NotImplemented)
        )
    }

    /// The input does not start with the magic of the format it was read as.
    pub fn is_magic_mismatch(&self) -> bool {
        match self {
            ErrorKind::Pack(PackError::BadMagic { .. })
            | ErrorKind::Geometry(GeometryError::BadMagic { .. })
            | ErrorKind::HeightMap(HeightMapError::BadMagic { .. })
            | ErrorKind::Scene(SceneError::BadMagic { .. })
            | ErrorKind::Description(DescriptionError::BadMagic { .. }) => true,
            _ => false,
        }
    }
}

pub type IResult<T> = Result<T, ErrorKind>;
