//! The compiler's symbol table (§3): maps TPF registers, pointer types and
//! immediate constants to the SPIR-V ids that represent them. Entries are
//! created on first use and never removed during a compilation, mirroring
//! the teacher's `HashMap`-keyed side tables in `reflect.rs`.
use fnv::FnvHashMap;
use spirv_headers::StorageClass;

use super::instr::RegisterType;
use crate::spirv::ComponentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKey {
    PointerType(u32, StorageClassKey),
    Constant(ComponentTypeKey, u32, u128),
    Register(RegisterTypeKey, u32),
}

/// `spirv_headers::StorageClass` doesn't derive `Hash`/`Eq`, so the key
/// carries a small local mirror instead of the headers type itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClassKey {
    Function,
    Input,
    Output,
    Uniform,
    Private,
}

impl From<StorageClass> for StorageClassKey {
    fn from(sc: StorageClass) -> StorageClassKey {
        match sc {
            StorageClass::Function => StorageClassKey::Function,
            StorageClass::Input => StorageClassKey::Input,
            StorageClass::Output => StorageClassKey::Output,
            StorageClass::Uniform => StorageClassKey::Uniform,
            _ => StorageClassKey::Private,
        }
    }
}

impl From<StorageClassKey> for StorageClass {
    fn from(sc: StorageClassKey) -> StorageClass {
        match sc {
            StorageClassKey::Function => StorageClass::Function,
            StorageClassKey::Input => StorageClass::Input,
            StorageClassKey::Output => StorageClass::Output,
            StorageClassKey::Uniform => StorageClass::Uniform,
            StorageClassKey::Private => StorageClass::Private,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentTypeKey {
    Void,
    Bool,
    Int,
    Uint,
    Float,
}

impl From<ComponentType> for ComponentTypeKey {
    fn from(c: ComponentType) -> ComponentTypeKey {
        match c {
            ComponentType::Void => ComponentTypeKey::Void,
            ComponentType::Bool => ComponentTypeKey::Bool,
            ComponentType::Int => ComponentTypeKey::Int,
            ComponentType::Uint => ComponentTypeKey::Uint,
            ComponentType::Float => ComponentTypeKey::Float,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterTypeKey {
    Temp,
    Input,
    Output,
    ColorOut,
    ConstantBuffer,
}

impl From<RegisterType> for RegisterTypeKey {
    fn from(r: RegisterType) -> RegisterTypeKey {
        match r {
            RegisterType::Temp => RegisterTypeKey::Temp,
            RegisterType::Input => RegisterTypeKey::Input,
            RegisterType::Output => RegisterTypeKey::Output,
            RegisterType::ColorOut => RegisterTypeKey::ColorOut,
            RegisterType::ConstantBuffer => RegisterTypeKey::ConstantBuffer,
            RegisterType::ImmConst | RegisterType::ImmConst64 => {
                unreachable!("immediates never go through the symbol table")
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SymbolValue {
    pub id: u32,
    pub storage_class: Option<StorageClass>,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: FnvHashMap<SymbolKey, SymbolValue>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn get(&self, key: &SymbolKey) -> Option<SymbolValue> {
        self.entries.get(key).copied()
    }

    pub fn insert(&mut self, key: SymbolKey, value: SymbolValue) {
        self.entries.insert(key, value);
    }

    pub fn register_key(register_type: RegisterType, index: u32) -> SymbolKey {
        SymbolKey::Register(register_type.into(), index)
    }

    pub fn pointer_type_key(type_id: u32, storage_class: StorageClass) -> SymbolKey {
        SymbolKey::PointerType(type_id, storage_class.into())
    }

    pub fn constant_key(component: ComponentType, count: u32, bits: u128) -> SymbolKey {
        SymbolKey::Constant(component.into(), count, bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_entries_are_created_once_and_reused() {
        let mut table = SymbolTable::new();
        let key = SymbolTable::register_key(RegisterType::Temp, 3);
        assert!(table.get(&key).is_none());
        table.insert(
            key,
            SymbolValue {
                id: 42,
                storage_class: Some(StorageClass::Function),
            },
        );
        assert_eq!(table.get(&key).unwrap().id, 42);
    }

    #[test]
    fn distinct_registers_get_distinct_keys() {
        let a = SymbolTable::register_key(RegisterType::Temp, 0);
        let b = SymbolTable::register_key(RegisterType::Temp, 1);
        let c = SymbolTable::register_key(RegisterType::Input, 0);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn constants_keyed_by_full_bit_pattern() {
        let mut table = SymbolTable::new();
        let k1 = SymbolTable::constant_key(ComponentType::Float, 1, 0u128);
        let k2 = SymbolTable::constant_key(ComponentType::Float, 1, 1u128);
        table.insert(
            k1,
            SymbolValue {
                id: 1,
                storage_class: None,
            },
        );
        table.insert(
            k2,
            SymbolValue {
                id: 2,
                storage_class: None,
            },
        );
        assert_eq!(table.get(&k1).unwrap().id, 1);
        assert_eq!(table.get(&k2).unwrap().id, 2);
    }
}
