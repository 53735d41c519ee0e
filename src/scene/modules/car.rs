//! `mp_CCar`: a drivable car placed in the scene.
//!
//! Payload: model name, transform. The game expects trailing padding after
//! those (`1i32`, `256i32`, then 14 zero bytes), which is reproduced on encode
//! and ignored on decode.

use crate::data::writer_utils::{write_i32, write_matrix, write_string, write_zeros};
use crate::game_types::Matrix4x4;
use crate::scene::modules::{GameModule, ModuleError, SceneModules, VtModule, decode_payload};

const PADDING_WORDS: [i32; 2] = [1, 256];
const PADDING_ZEROS: usize = 14;

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CarObject {
    pub base: VtModule,
    pub model_name: String,
    pub transform: Matrix4x4,
}

impl GameModule for CarObject {
    const KEY: &'static str = "mp_CCar";

    fn decode(base: VtModule) -> Result<Self, ModuleError> {
        let (model_name, transform) = decode_payload::<Self, _>(&base, |stream| {
            Ok((stream.string("car model name")?, stream.matrix("car transform")?))
        })?;
        Ok(CarObject {
            base,
            model_name,
            transform,
        })
    }

    fn encode_payload(&self, buf: &mut Vec<u8>) {
        write_string(buf, &self.model_name);
        write_matrix(buf, &self.transform);
        for word in PADDING_WORDS {
            write_i32(buf, word);
        }
        write_zeros(buf, PADDING_ZEROS);
    }

    fn with_defaults(base: VtModule) -> Self {
        CarObject {
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
        &modules.cars
    }

    fn collection_mut(modules: &mut SceneModules) -> &mut Vec<Self> {
        &mut modules.cars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_types::Vec3;

    fn payload(model: &str, transform: &Matrix4x4) -> Vec<u8> {
        let mut buf = Vec::new();
        write_string(&mut buf, model);
        write_matrix(&mut buf, transform);
        buf
    }

    #[test]
    fn decodes_model_and_transform() {
        let mut transform = Matrix4x4::IDENTITY;
        transform.set_translation(Vec3::new(5.0, 0.0, 7.5));
        let base = VtModule::new("coche_1", "mp_CCar.dll", payload("coche.opt", &transform));

        let car = CarObject::decode(base).unwrap();
        assert_eq!(car.model_name, "coche.opt");
        assert_eq!(car.transform.translation(), Vec3::new(5.0, 0.0, 7.5));
        assert!(!car.base.payload.is_empty());
    }

    #[test]
    fn encode_appends_padding() {
        let base = VtModule::new("coche_1", "mp_CCar.dll", Vec::new());
        let car = CarObject {
            model_name: "a".to_owned(),
            ..CarObject::with_defaults(base)
        };

        let mut buf = Vec::new();
        car.encode_payload(&mut buf);
        // "a" (4 + 2) + matrix (64) + padding (4 + 4 + 14)
        assert_eq!(buf.len(), 6 + 64 + 22);
        assert_eq!(&buf[70..74], &1i32.to_le_bytes());
        assert_eq!(&buf[74..78], &256i32.to_le_bytes());
        assert!(buf[78..].iter().all(|&b| b == 0));

        let decoded = CarObject::decode(VtModule::new("coche_1", "mp_CCar.dll", buf)).unwrap();
        assert_eq!(decoded.model_name, "a");
        assert_eq!(decoded.transform, Matrix4x4::IDENTITY);
    }

    #[test]
    fn truncated_payload_names_object() {
        let base = VtModule::new("coche_7", "mp_CCar.dll", payload("x", &Matrix4x4::IDENTITY)[..20].to_vec());
        match CarObject::decode(base) {
            Err(ModuleError::Decode {
                module, object_name, ..
            }) => {
                assert_eq!(module, "mp_CCar");
                assert_eq!(object_name, "coche_7");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
