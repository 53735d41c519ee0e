//! `mp_salud`: a health pickup.
//!
//! Payload: model name, transform, two auxiliary strings and the heal amount.

use crate::data::writer_utils::{write_i32, write_matrix, write_string};
use crate::game_types::Matrix4x4;
use crate::scene::modules::{GameModule, ModuleError, SceneModules, VtModule, decode_payload};

/// Heal amount the game uses when the stored amount is zero.
pub const DEFAULT_HEALTH_AMOUNT: i32 = 50;

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HealthPackObject {
    pub base: VtModule,
    pub model_name: String,
    pub transform: Matrix4x4,
    pub aux_string_1: String,
    pub aux_string_2: String,
    /// Stored amount; zero means [`DEFAULT_HEALTH_AMOUNT`].
    pub health_amount: i32,
}

impl HealthPackObject {
    pub fn effective_health_amount(&self) -> i32 {
        if self.health_amount == 0 {
            DEFAULT_HEALTH_AMOUNT
        } else {
            self.health_amount
        }
    }
}

impl GameModule for HealthPackObject {
    const KEY: &'static str = "mp_salud";

    fn decode(base: VtModule) -> Result<Self, ModuleError> {
        let (model_name, transform, aux_string_1, aux_string_2, health_amount) =
            decode_payload::<Self, _>(&base, |stream| {
                Ok((
                    stream.string("health pack model name")?,
                    stream.matrix("health pack transform")?,
                    stream.string("health pack aux string 1")?,
                    stream.string("health pack aux string 2")?,
                    stream.i32("health pack amount")?,
                ))
            })?;
        Ok(HealthPackObject {
            base,
            model_name,
            transform,
            aux_string_1,
            aux_string_2,
            health_amount,
        })
    }

    fn encode_payload(&self, buf: &mut Vec<u8>) {
        write_string(buf, &self.model_name);
        write_matrix(buf, &self.transform);
        write_string(buf, &self.aux_string_1);
        write_string(buf, &self.aux_string_2);
        write_i32(buf, self.health_amount);
    }

    fn with_defaults(base: VtModule) -> Self {
        HealthPackObject {
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
        &modules.health_packs
    }

    fn collection_mut(modules: &mut SceneModules) -> &mut Vec<Self> {
        &mut modules.health_packs
    }
}
