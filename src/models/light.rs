//! Light records stored in world geometry files.
//!
//! Each record starts with a `u32` type tag, followed by a body whose size
//! depends on the tag (and, for point lights, on the file format), followed by
//! three RGBA colors that every light carries. Unrecognized tags have no body.

use tracing::debug;

use crate::data::parser_utils::ByteStream;
use crate::game_types::{Color, Vec3};
use crate::models::geometry::{GeometryError, GeometryFormat};
use crate::recognized::Recognized;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LightType {
    Point = 0,
    Spot = 1,
    Directional = 2,
    Ambient = 3,
}

impl LightType {
    pub fn from_raw(raw: u32) -> Option<LightType> {
        match raw {
            0 => Some(LightType::Point),
            1 => Some(LightType::Spot),
            2 => Some(LightType::Directional),
            3 => Some(LightType::Ambient),
            _ => None,
        }
    }
}

/// Point light attenuation. Legacy files store a single radius, current files
/// a start/end range.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PointFalloff {
    Radius(f32),
    Range { start: f32, end: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LightKind {
    Point {
        position: Vec3,
        falloff: PointFalloff,
    },
    Spot {
        position: Vec3,
        direction: Vec3,
        /// Cone angle.
        cone: f32,
    },
    Directional {
        direction: Vec3,
    },
    Ambient,
    /// A type tag with no known meaning. Only the colors were stored.
    Unknown(u32),
}

impl LightKind {
    pub fn light_type(&self) -> Recognized<LightType> {
        match self {
            LightKind::Point { .. } => Recognized::Known(LightType::Point),
            LightKind::Spot { .. } => Recognized::Known(LightType::Spot),
            LightKind::Directional { .. } => Recognized::Known(LightType::Directional),
            LightKind::Ambient => Recognized::Known(LightType::Ambient),
            LightKind::Unknown(raw) => Recognized::Unknown(*raw),
        }
    }

    pub fn position(&self) -> Option<Vec3> {
        match self {
            LightKind::Point { position, .. } | LightKind::Spot { position, .. } => Some(*position),
            LightKind::Directional { .. } | LightKind::Ambient | LightKind::Unknown(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LightObject {
    pub kind: LightKind,
    pub diffuse: Color,
    pub ambient: Color,
    pub specular: Color,
}

pub(crate) fn parse_light(
    stream: &mut ByteStream<'_>,
    format: GeometryFormat,
) -> Result<LightObject, GeometryError> {
    let raw_type = stream.u32("light type")?;

    let kind = match LightType::from_raw(raw_type) {
        Some(LightType::Point) => {
            let position = stream.vec3("point light position")?;
            let falloff = match format {
                GeometryFormat::Legacy => PointFalloff::Radius(stream.f32("point light radius")?),
                GeometryFormat::Current => PointFalloff::Range {
                    start: stream.f32("point light start")?,
                    end: stream.f32("point light end")?,
                },
            };
            LightKind::Point { position, falloff }
        }
        Some(LightType::Spot) => LightKind::Spot {
            position: stream.vec3("spot light position")?,
            direction: stream.vec3("spot light direction")?,
            cone: stream.f32("spot light cone")?,
        },
        Some(LightType::Directional) => LightKind::Directional {
            direction: stream.vec3("directional light direction")?,
        },
        Some(LightType::Ambient) => LightKind::Ambient,
        None => {
            debug!(raw_type, offset = stream.offset(), "light of unknown type, reading colors only");
            LightKind::Unknown(raw_type)
        }
    };

    Ok(LightObject {
        kind,
        diffuse: stream.color("light diffuse color")?,
        ambient: stream.color("light ambient color")?,
        specular: stream.color("light specular color")?,
    })
}
