use crate::abi::{ShapeId, TypeArena, TypeId};
use std::collections::{HashMap, HashSet};

/// Per-request naming of shapes.
///
/// Every shape gets one owner name derived from its fragment; a fragment
/// already claimed by a different shape gets the first free `_N` suffix.
/// Owner names are unique, but a prefixed name can still equal another
/// prefix plus owner; callers that mix prefixes check full names too.
#[derive(Debug, Default)]
pub struct ShapeNames {
    by_shape: HashMap<ShapeId, String>,
    taken: HashSet<String>,
}

impl ShapeNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&mut self, arena: &TypeArena, id: TypeId) -> String {
        let shape = arena.shape(id);
        if let Some(name) = self.by_shape.get(&shape) {
            return name.clone();
        }
        let base = arena.fragment(id).to_string();
        let mut name = base.clone();
        let mut n = 1;
        while self.taken.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        self.taken.insert(name.clone());
        self.by_shape.insert(shape, name.clone());
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sol_abi_types::{MemberDesc, TypeDesc};

    #[test]
    fn same_name_different_shape_is_suffixed() {
        let mut arena = TypeArena::new();
        let a = arena
            .build(&TypeDesc::structure("Order", vec![MemberDesc::new("id", TypeDesc::Uint(256))]))
            .unwrap();
        let b = arena
            .build(&TypeDesc::structure("Order", vec![MemberDesc::new("id", TypeDesc::Bytes)]))
            .unwrap();
        let a2 = arena.deep_copy(a);
        let mut names = ShapeNames::new();
        assert_eq!(names.owner(&arena, a), "Order");
        assert_eq!(names.owner(&arena, b), "Order_1");
        assert_eq!(names.owner(&arena, a2), "Order");
    }
}
