//! Description files (`VTFF`, stored under `nfos/`).
//!
//! Only the magic is understood. The body layout is unknown, so every
//! well-formed file reports [`DescriptionError::NotImplemented`].

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::data::parser_utils::{ByteStream, ParseError, parse_magic};

pub const DESCRIPTION_MAGIC: &[u8; 4] = b"VTFF";

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("bad magic: expected {expected}, got {found:?}")]
    BadMagic {
        expected: &'static str,
        found: String,
    },
    #[error("decoding description files is not implemented")]
    NotImplemented,
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Decoded description file. Carries nothing until the body layout is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {}

pub fn parse_description(file_data: &[u8]) -> Result<Description, DescriptionError> {
    let mut stream = ByteStream::new(file_data);
    let magic: [u8; 4] = stream.read("magic", parse_magic::<4>)?;
    if &magic != DESCRIPTION_MAGIC {
        return Err(DescriptionError::BadMagic {
            expected: "VTFF",
            found: String::from_utf8_lossy(&magic).into_owned(),
        });
    }

    Err(DescriptionError::NotImplemented)
}

pub fn parse_description_file(path: &Path) -> Result<Description, DescriptionError> {
    let data = std::fs::read(path).map_err(|source| DescriptionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_description(&data)
}
