//! The type interner: `(component_type, count) -> cached SPIR-V id`.
use nohash_hasher::IntMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Void,
    Bool,
    Int,
    Uint,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TypeKey {
    component: ComponentType,
    count: u32,
}

fn key_hash(key: TypeKey) -> u64 {
    // Component types and counts are both tiny, so a simple positional
    // packing is collision-free and avoids pulling in a generic hasher for
    // this one small interning table.
    let component = match key.component {
        ComponentType::Void => 0u64,
        ComponentType::Bool => 1,
        ComponentType::Int => 2,
        ComponentType::Uint => 3,
        ComponentType::Float => 4,
    };
    component * 8 + u64::from(key.count)
}

#[derive(Debug, Default)]
pub struct TypeInterner {
    ids: IntMap<u64, u32>,
}

impl TypeInterner {
    pub fn new() -> TypeInterner {
        TypeInterner::default()
    }

    pub fn get(&self, component: ComponentType, count: u32) -> Option<u32> {
        self.ids.get(&key_hash(TypeKey { component, count })).copied()
    }

    pub fn insert(&mut self, component: ComponentType, count: u32, id: u32) {
        self.ids.insert(key_hash(TypeKey { component, count }), id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinguishes_component_type_and_count() {
        let mut interner = TypeInterner::new();
        interner.insert(ComponentType::Float, 1, 10);
        interner.insert(ComponentType::Float, 4, 11);
        interner.insert(ComponentType::Int, 4, 12);
        assert_eq!(interner.get(ComponentType::Float, 1), Some(10));
        assert_eq!(interner.get(ComponentType::Float, 4), Some(11));
        assert_eq!(interner.get(ComponentType::Int, 4), Some(12));
        assert_eq!(interner.get(ComponentType::Uint, 4), None);
    }
}
