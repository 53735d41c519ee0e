//! `mp_CStartPoint`: a spawn point.
//!
//! Payload: position, angle (radians), team and spawn order, 24 bytes in all.

use crate::data::writer_utils::{write_f32, write_i32, write_vec3};
use crate::game_types::Vec3;
use crate::scene::modules::{GameModule, ModuleError, SceneModules, VtModule, decode_payload};

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StartPointObject {
    pub base: VtModule,
    pub position: Vec3,
    /// Facing angle in radians.
    pub angle: f32,
    pub team: i32,
    pub order: i32,
}

impl StartPointObject {
    pub fn angle_degrees(&self) -> f32 {
        self.angle.to_degrees()
    }
}

impl GameModule for StartPointObject {
    const KEY: &'static str = "mp_CStartPoint";

    fn decode(base: VtModule) -> Result<Self, ModuleError> {
        let (position, angle, team, order) = decode_payload::<Self, _>(&base, |stream| {
            Ok((
                stream.vec3("start point position")?,
                stream.f32("start point angle")?,
                stream.i32("start point team")?,
                stream.i32("start point order")?,
            ))
        })?;
        Ok(StartPointObject {
            base,
            position,
            angle,
            team,
            order,
        })
    }

    fn encode_payload(&self, buf: &mut Vec<u8>) {
        write_vec3(buf, self.position);
        write_f32(buf, self.angle);
        write_i32(buf, self.team);
        write_i32(buf, self.order);
    }

    fn with_defaults(base: VtModule) -> Self {
        StartPointObject {
            base,
            ..Default::default()
        }
    }

    fn base(&self) -> &VtModule {
        &self.base
    }

    fn base_mut(&mut self) -> &mut VtModule {
        &mut self.base
    }

    fn collection(modules: &SceneModules) -> &Vec<Self> {
        &modules.start_points
    }

    fn collection_mut(modules: &mut SceneModules) -> &mut Vec<Self> {
        &mut modules.start_points
    }
}
