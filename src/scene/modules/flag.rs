//! `mp_Flag`: a capture flag.
//!
//! Payload: model name, transform, two auxiliary strings and the owning team.
//! The encoder writes an empty payload; the game's expectations for a full
//! flag body have not been confirmed.

use crate::game_types::Matrix4x4;
use crate::scene::modules::{GameModule, ModuleError, SceneModules, VtModule, decode_payload};

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlagObject {
    pub base: VtModule,
    pub model_name: String,
    pub transform: Matrix4x4,
    pub aux_string_1: String,
    pub aux_string_2: String,
    pub team: u32,
}

impl GameModule for FlagObject {
    const KEY: &'static str = "mp_Flag";

    fn decode(base: VtModule) -> Result<Self, ModuleError> {
        let (model_name, transform, aux_string_1, aux_string_2, team) =
            decode_payload::<Self, _>(&base, |stream| {
                Ok((
                    stream.string("flag model name")?,
                    stream.matrix("flag transform")?,
                    stream.string("flag aux string 1")?,
                    stream.string("flag aux string 2")?,
                    stream.u32("flag team")?,
                ))
            })?;
        Ok(FlagObject {
            base,
            model_name,
            transform,
            aux_string_1,
            aux_string_2,
            team,
        })
    }

    fn encode_payload(&self, _buf: &mut Vec<u8>) {}

    fn with_defaults(base: VtModule) -> Self {
        FlagObject {
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
        &modules.flags
    }

    fn collection_mut(modules: &mut SceneModules) -> &mut Vec<Self> {
        &mut modules.flags
    }
}
