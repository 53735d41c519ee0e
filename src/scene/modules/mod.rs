//! Typed game modules referenced by scene records.
//!
//! Every scene record names the module (a game DLL) that instantiates the
//! object. Records whose module has an entry in the [`ModuleRegistry`] are
//! decoded into typed objects and re-encoded from them on write. Everything
//! else stays a raw [`VtModule`].

use std::collections::HashMap;
use std::sync::LazyLock;

use thiserror::Error;

use crate::data::parser_utils::{ByteStream, ParseError};
use crate::data::writer_utils::{SizePrefixScope, write_bytes, write_string};

pub mod car;
pub mod flag;
pub mod health_pack;
pub mod start_point;

pub use car::CarObject;
pub use flag::FlagObject;
pub use health_pack::HealthPackObject;
pub use start_point::StartPointObject;

/// Suffix appended to the object name of a duplicated instance.
pub const DUPLICATE_SUFFIX: &str = "_copy";

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("failed to decode {module} payload of object {object_name:?}")]
    Decode {
        module: &'static str,
        object_name: String,
        #[source]
        source: ParseError,
    },
    #[error("no module type is registered as {0:?}")]
    UnknownModule(String),
    #[error("{module} has no object at index {index} ({len} present)")]
    IndexOutOfRange {
        module: &'static str,
        index: usize,
        len: usize,
    },
}

/// A scene record: the object to create, the module that creates it, and the
/// module's raw payload.
///
/// Typed objects keep the payload they were decoded from, but re-encode from
/// their typed fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VtModule {
    /// Object instance name, e.g. `coche_1`.
    pub object_name: String,
    /// Module file name, e.g. `mp_CCar.dll`.
    pub module_name: String,
    pub payload: Vec<u8>,
}

impl VtModule {
    pub fn new(object_name: impl Into<String>, module_name: impl Into<String>, payload: Vec<u8>) -> Self {
        VtModule {
            object_name: object_name.into(),
            module_name: module_name.into(),
            payload,
        }
    }

    /// Registry key of this record's module.
    pub fn base_name(&self) -> &str {
        crate::scene::module_base_name(&self.module_name)
    }

    /// Write the object and module names that start every record.
    pub fn write_header(&self, buf: &mut Vec<u8>) {
        write_string(buf, &self.object_name);
        write_string(buf, &self.module_name);
    }

    /// Write the record unchanged: header plus size-prefixed raw payload.
    pub fn write_raw(&self, buf: &mut Vec<u8>) {
        self.write_header(buf);
        let mut scope = SizePrefixScope::new(buf);
        write_bytes(&mut scope, &self.payload);
    }
}

/// A module type with a known payload layout.
pub trait GameModule: Clone + Sized + 'static {
    /// Registry key: the module file name without extension.
    const KEY: &'static str;

    fn decode(base: VtModule) -> Result<Self, ModuleError>;

    /// Write the payload (without its size prefix).
    fn encode_payload(&self, buf: &mut Vec<u8>);

    /// A fresh instance: identity transforms, zero vectors, empty strings and zero numbers.
    fn with_defaults(base: VtModule) -> Self;

    fn base(&self) -> &VtModule;

    fn base_mut(&mut self) -> &mut VtModule;

    fn collection(modules: &SceneModules) -> &Vec<Self>;

    fn collection_mut(modules: &mut SceneModules) -> &mut Vec<Self>;

    /// Reset every typed field, keeping the record identity.
    fn reset_to_defaults(&mut self) {
        let base = self.base().clone();
        *self = Self::with_defaults(base);
    }

    /// Write the full record: header then the size-prefixed payload.
    fn encode(&self, buf: &mut Vec<u8>) {
        self.base().write_header(buf);
        let mut scope = SizePrefixScope::new(buf);
        self.encode_payload(&mut scope);
    }
}

/// Run `parse` over a record's payload, attributing failures to the object.
///
/// Bytes left over after `parse` are ignored; some modules pad their payloads.
pub(crate) fn decode_payload<M: GameModule, T>(
    base: &VtModule,
    parse: impl FnOnce(&mut ByteStream<'_>) -> Result<T, ParseError>,
) -> Result<T, ModuleError> {
    let mut stream = ByteStream::new(&base.payload);
    parse(&mut stream).map_err(|source| ModuleError::Decode {
        module: M::KEY,
        object_name: base.object_name.clone(),
        source,
    })
}

/// Decoded objects of every registered module type in one scene.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SceneModules {
    pub cars: Vec<CarObject>,
    pub start_points: Vec<StartPointObject>,
    pub flags: Vec<FlagObject>,
    pub health_packs: Vec<HealthPackObject>,
}

impl SceneModules {
    /// Total number of typed objects.
    pub fn len(&self) -> usize {
        registry().descriptors().iter().map(|d| d.len(self)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        *self = SceneModules::default();
    }
}

/// Type-erased operations of one [`GameModule`] implementation.
#[derive(Clone, Copy)]
pub struct ModuleDescriptor {
    pub key: &'static str,
    decode_into: fn(&mut SceneModules, VtModule) -> Result<(), ModuleError>,
    encode_all: fn(&SceneModules, &mut Vec<u8>),
    create: fn(&mut SceneModules, &str) -> usize,
    duplicate: fn(&mut SceneModules, usize) -> Result<usize, ModuleError>,
    remove: fn(&mut SceneModules, usize) -> Result<VtModule, ModuleError>,
    len: fn(&SceneModules) -> usize,
}

impl std::fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDescriptor").field("key", &self.key).finish_non_exhaustive()
    }
}

fn decode_into<M: GameModule>(modules: &mut SceneModules, base: VtModule) -> Result<(), ModuleError> {
    let object = M::decode(base)?;
    M::collection_mut(modules).push(object);
    Ok(())
}

fn encode_all<M: GameModule>(modules: &SceneModules, buf: &mut Vec<u8>) {
    for object in M::collection(modules) {
        object.encode(buf);
    }
}

fn create<M: GameModule>(modules: &mut SceneModules, object_name: &str) -> usize {
    let base = VtModule::new(object_name, format!("{}.dll", M::KEY), Vec::new());
    let collection = M::collection_mut(modules);
    collection.push(M::with_defaults(base));
    collection.len() - 1
}

fn checked_index<M: GameModule>(modules: &SceneModules, index: usize) -> Result<(), ModuleError> {
    let len = M::collection(modules).len();
    if index < len {
        Ok(())
    } else {
        Err(ModuleError::IndexOutOfRange {
            module: M::KEY,
            index,
            len,
        })
    }
}

fn duplicate<M: GameModule>(modules: &mut SceneModules, index: usize) -> Result<usize, ModuleError> {
    checked_index::<M>(modules, index)?;
    let collection = M::collection_mut(modules);
    let mut copy = collection[index].clone();
    copy.base_mut().object_name.push_str(DUPLICATE_SUFFIX);
    collection.push(copy);
    Ok(collection.len() - 1)
}

fn remove<M: GameModule>(modules: &mut SceneModules, index: usize) -> Result<VtModule, ModuleError> {
    checked_index::<M>(modules, index)?;
    let removed = M::collection_mut(modules).remove(index);
    Ok(removed.base().clone())
}

fn len<M: GameModule>(modules: &SceneModules) -> usize {
    M::collection(modules).len()
}

impl ModuleDescriptor {
    pub fn of<M: GameModule>() -> Self {
        ModuleDescriptor {
            key: M::KEY,
            decode_into: decode_into::<M>,
            encode_all: encode_all::<M>,
            create: create::<M>,
            duplicate: duplicate::<M>,
            remove: remove::<M>,
            len: len::<M>,
        }
    }

    /// Decode a record and append it to this type's collection.
    pub fn decode_into(&self, modules: &mut SceneModules, base: VtModule) -> Result<(), ModuleError> {
        (self.decode_into)(modules, base)
    }

    /// Encode every object of this type, in collection order.
    pub fn encode_all(&self, modules: &SceneModules, buf: &mut Vec<u8>) {
        (self.encode_all)(modules, buf)
    }

    pub fn create(&self, modules: &mut SceneModules, object_name: &str) -> usize {
        (self.create)(modules, object_name)
    }

    pub fn duplicate(&self, modules: &mut SceneModules, index: usize) -> Result<usize, ModuleError> {
        (self.duplicate)(modules, index)
    }

    pub fn remove(&self, modules: &mut SceneModules, index: usize) -> Result<VtModule, ModuleError> {
        (self.remove)(modules, index)
    }

    pub fn len(&self, modules: &SceneModules) -> usize {
        (self.len)(modules)
    }
}

/// Lookup table from module key to its descriptor.
///
/// Keys match case-insensitively, like the DLL names they come from.
#[derive(Debug)]
pub struct ModuleRegistry {
    descriptors: Vec<ModuleDescriptor>,
    by_key: HashMap<String, usize>,
}

impl ModuleRegistry {
    pub fn new(descriptors: Vec<ModuleDescriptor>) -> Self {
        let by_key = descriptors
            .iter()
            .enumerate()
            .map(|(i, descriptor)| (descriptor.key.to_ascii_lowercase(), i))
            .collect();
        ModuleRegistry { descriptors, by_key }
    }

    fn builtin() -> Self {
        ModuleRegistry::new(vec![
            ModuleDescriptor::of::<CarObject>(),
            ModuleDescriptor::of::<StartPointObject>(),
            ModuleDescriptor::of::<FlagObject>(),
            ModuleDescriptor::of::<HealthPackObject>(),
        ])
    }

    pub fn get(&self, key: &str) -> Option<&ModuleDescriptor> {
        self.by_key
            .get(&key.to_ascii_lowercase())
            .map(|&i| &self.descriptors[i])
    }

    fn require(&self, key: &str) -> Result<&ModuleDescriptor, ModuleError> {
        self.get(key)
            .ok_or_else(|| ModuleError::UnknownModule(key.to_owned()))
    }

    /// Descriptors in write order.
    pub fn descriptors(&self) -> &[ModuleDescriptor] {
        &self.descriptors
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.descriptors.iter().map(|descriptor| descriptor.key)
    }
}

static REGISTRY: LazyLock<ModuleRegistry> = LazyLock::new(ModuleRegistry::builtin);

/// The process-wide registry of built-in module types.
pub fn registry() -> &'static ModuleRegistry {
    &REGISTRY
}

/// Append a default-initialized object of module type `key`. Returns its index.
pub fn create_module_instance(
    modules: &mut SceneModules,
    key: &str,
    object_name: &str,
) -> Result<usize, ModuleError> {
    Ok(registry().require(key)?.create(modules, object_name))
}

/// Append a copy of object `index` with [`DUPLICATE_SUFFIX`] added to its name.
pub fn duplicate_module_instance(
    modules: &mut SceneModules,
    key: &str,
    index: usize,
) -> Result<usize, ModuleError> {
    registry().require(key)?.duplicate(modules, index)
}

/// Remove object `index`, returning its record identity.
pub fn remove_module_instance(
    modules: &mut SceneModules,
    key: &str,
    index: usize,
) -> Result<VtModule, ModuleError> {
    registry().require(key)?.remove(modules, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_types::{Matrix4x4, Vec3};

    #[test]
    fn registry_lists_builtin_modules_in_write_order() {
        let keys: Vec<_> = registry().keys().collect();
        assert_eq!(keys, ["mp_CCar", "mp_CStartPoint", "mp_Flag", "mp_salud"]);
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(registry().get("MP_FLAG").map(|d| d.key), Some("mp_Flag"));
        assert!(registry().get("mp_Unknown").is_none());
    }

    #[test]
    fn create_applies_defaults() {
        let mut modules = SceneModules::default();
        let index = create_module_instance(&mut modules, "mp_salud", "salud_new").unwrap();
        assert_eq!(index, 0);

        let pack = &modules.health_packs[0];
        assert_eq!(pack.base.object_name, "salud_new");
        assert_eq!(pack.base.module_name, "mp_salud.dll");
        assert!(pack.base.payload.is_empty());
        assert_eq!(pack.transform, Matrix4x4::IDENTITY);
        assert_eq!(pack.model_name, "");
        assert_eq!(pack.health_amount, 0);

        create_module_instance(&mut modules, "mp_CStartPoint", "start").unwrap();
        assert_eq!(modules.start_points[0].position, Vec3::ZERO);
        assert_eq!(modules.len(), 2);
    }

    #[test]
    fn duplicate_appends_suffix() {
        let mut modules = SceneModules::default();
        create_module_instance(&mut modules, "mp_CCar", "coche_1").unwrap();
        modules.cars[0].model_name = "car.opt".to_owned();

        let index = duplicate_module_instance(&mut modules, "mp_CCar", 0).unwrap();
        assert_eq!(index, 1);
        assert_eq!(modules.cars[1].base.object_name, "coche_1_copy");
        assert_eq!(modules.cars[1].model_name, "car.opt");
        assert_eq!(modules.cars[0].base.object_name, "coche_1");
    }

    #[test]
    fn remove_and_bad_index() {
        let mut modules = SceneModules::default();
        create_module_instance(&mut modules, "mp_Flag", "flag_a").unwrap();
        create_module_instance(&mut modules, "mp_Flag", "flag_b").unwrap();

        let removed = remove_module_instance(&mut modules, "mp_Flag", 0).unwrap();
        assert_eq!(removed.object_name, "flag_a");
        assert_eq!(modules.flags.len(), 1);
        assert_eq!(modules.flags[0].base.object_name, "flag_b");

        assert!(matches!(
            remove_module_instance(&mut modules, "mp_Flag", 5),
            Err(ModuleError::IndexOutOfRange { index: 5, len: 1, .. })
        ));
        assert!(matches!(
            create_module_instance(&mut modules, "mp_Nope", "x"),
            Err(ModuleError::UnknownModule(_))
        ));
    }

    #[test]
    fn reset_keeps_identity() {
        let mut modules = SceneModules::default();
        create_module_instance(&mut modules, "mp_CCar", "coche_9").unwrap();
        let car = &mut modules.cars[0];
        car.model_name = "truck.opt".to_owned();
        car.transform.set_translation(Vec3::new(1.0, 2.0, 3.0));

        car.reset_to_defaults();
        assert_eq!(car.base.object_name, "coche_9");
        assert_eq!(car.model_name, "");
        assert_eq!(car.transform, Matrix4x4::IDENTITY);
    }

    #[test]
    fn raw_record_keeps_payload() {
        let record = VtModule::new("obj", "mp_Other.dll", vec![1, 2, 3]);
        let mut buf = Vec::new();
        record.write_raw(&mut buf);

        let mut stream = ByteStream::new(&buf);
        assert_eq!(stream.string("object").unwrap(), "obj");
        assert_eq!(stream.string("module").unwrap(), "mp_Other.dll");
        assert_eq!(stream.u32("size").unwrap(), 3);
        assert_eq!(stream.bytes("payload", 3).unwrap(), &[1, 2, 3]);
        assert_eq!(record.base_name(), "mp_Other");
    }
}
