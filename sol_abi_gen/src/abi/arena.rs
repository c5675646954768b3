use crate::abi::shape::{ShapeId, ShapeInterner, ShapeKey};
use crate::error::{GenError, GenResult};
use sol_abi_types::{MemberDesc, StateMutability, TypeDesc};

/// Handle to a node owned by a [`TypeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Bool,
    Address,
    Integer { signed: bool, bits: u16 },
    Enum { name: String, member_count: u16 },
    FixedBytes { size: u8 },
    UserDefined { name: String, underlying: TypeId },
    Bytes,
    String,
    Array { base: TypeId, length: Option<u64> },
    Struct { name: String, members: Vec<TypeId> },
    Tuple { members: Vec<TypeId> },
    Function {
        name: String,
        parameters: TypeId,
        returns: TypeId,
        mutability: StateMutability,
    },
    Error { name: String, parameters: TypeId },
    /* `data` is the tuple of non-indexed parameters, built alongside `parameters` */
    Event {
        name: String,
        parameters: TypeId,
        data: TypeId,
        indexed: Vec<bool>,
        anonymous: bool,
    },
}

impl TypeKind {
    /// Direct children in declaration order.
    pub fn children(&self) -> Vec<TypeId> {
        match self {
            TypeKind::UserDefined { underlying, .. } => vec![*underlying],
            TypeKind::Array { base, .. } => vec![*base],
            TypeKind::Struct { members, .. } | TypeKind::Tuple { members } => members.clone(),
            TypeKind::Function { parameters, returns, .. } => vec![*parameters, *returns],
            TypeKind::Error { parameters, .. } => vec![*parameters],
            TypeKind::Event { parameters, data, .. } => vec![*parameters, *data],
            _ => Vec::new(),
        }
    }

    fn map_children(&self, mut f: impl FnMut(TypeId) -> TypeId) -> TypeKind {
        match self {
            TypeKind::UserDefined { name, underlying } => TypeKind::UserDefined {
                name: name.clone(),
                underlying: f(*underlying),
            },
            TypeKind::Array { base, length } => TypeKind::Array {
                base: f(*base),
                length: *length,
            },
            TypeKind::Struct { name, members } => TypeKind::Struct {
                name: name.clone(),
                members: members.iter().map(|m| f(*m)).collect(),
            },
            TypeKind::Tuple { members } => TypeKind::Tuple {
                members: members.iter().map(|m| f(*m)).collect(),
            },
            TypeKind::Function {
                name,
                parameters,
                returns,
                mutability,
            } => TypeKind::Function {
                name: name.clone(),
                parameters: f(*parameters),
                returns: f(*returns),
                mutability: *mutability,
            },
            TypeKind::Error { name, parameters } => TypeKind::Error {
                name: name.clone(),
                parameters: f(*parameters),
            },
            TypeKind::Event {
                name,
                parameters,
                data,
                indexed,
                anonymous,
            } => TypeKind::Event {
                name: name.clone(),
                parameters: f(*parameters),
                data: f(*data),
                indexed: indexed.clone(),
                anonymous: *anonymous,
            },
            leaf => leaf.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypeNode {
    pub kind: TypeKind,
    /// Field or parameter name inherited from the enclosing composite.
    pub label: Option<String>,
    pub parent: Option<TypeId>,
    pub shape: ShapeId,
}

/// Owns every type node of one generation request.
///
/// Nodes are only ever appended. A node has at most one parent; attaching a
/// node that already has one attaches a deep copy instead, so shared
/// descriptions never alias.
#[derive(Debug, Default)]
pub struct TypeArena {
    nodes: Vec<TypeNode>,
    shapes: ShapeInterner,
}

impl TypeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: TypeId) -> &TypeNode {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.nodes[id.index()].kind
    }

    pub fn label(&self, id: TypeId) -> Option<&str> {
        self.nodes[id.index()].label.as_deref()
    }

    pub fn parent(&self, id: TypeId) -> Option<TypeId> {
        self.nodes[id.index()].parent
    }

    pub fn shape(&self, id: TypeId) -> ShapeId {
        self.nodes[id.index()].shape
    }

    pub fn shapes(&self) -> &ShapeInterner {
        &self.shapes
    }

    /// Canonical shape string; equal exactly when the shapes are equal.
    pub fn identifier(&self, id: TypeId) -> &str {
        self.shapes.identifier(self.shape(id))
    }

    pub fn fragment(&self, id: TypeId) -> &str {
        self.shapes.fragment(self.shape(id))
    }

    pub fn set_label(&mut self, id: TypeId, label: impl Into<String>) {
        self.nodes[id.index()].label = Some(label.into());
    }

    /* ---------------------------------------------------------------- leaves */

    pub fn add_bool(&mut self) -> TypeId {
        self.push(TypeKind::Bool)
    }

    pub fn add_address(&mut self) -> TypeId {
        self.push(TypeKind::Address)
    }

    pub fn add_uint(&mut self, bits: u16) -> GenResult<TypeId> {
        check_bits(bits)?;
        Ok(self.push(TypeKind::Integer { signed: false, bits }))
    }

    pub fn add_int(&mut self, bits: u16) -> GenResult<TypeId> {
        check_bits(bits)?;
        Ok(self.push(TypeKind::Integer { signed: true, bits }))
    }

    pub fn add_fixed_bytes(&mut self, size: u8) -> GenResult<TypeId> {
        if !(1..=32).contains(&size) {
            return Err(GenError::InvalidType(format!("bytes{size}: size must be 1..=32")));
        }
        Ok(self.push(TypeKind::FixedBytes { size }))
    }

    /// `member_count` of 0 means the members are unknown; the enum then
    /// takes the widest legal form (256 members).
    pub fn add_enum(&mut self, name: impl Into<String>, member_count: usize) -> GenResult<TypeId> {
        let name = name.into();
        let member_count = match member_count {
            0 => 256,
            n if n <= 256 => n as u16,
            n => {
                return Err(GenError::InvalidType(format!(
                    "enum {name} has {n} members, at most 256 are allowed"
                )));
            }
        };
        Ok(self.push(TypeKind::Enum { name, member_count }))
    }

    pub fn add_bytes(&mut self) -> TypeId {
        self.push(TypeKind::Bytes)
    }

    pub fn add_string(&mut self) -> TypeId {
        self.push(TypeKind::String)
    }

    /* ------------------------------------------------------------ composites */

    pub fn add_user_defined(&mut self, name: impl Into<String>, underlying: TypeId) -> GenResult<TypeId> {
        let name = name.into();
        if !self.is_value_type(underlying) || matches!(self.kind(underlying), TypeKind::Function { .. }) {
            return Err(GenError::InvalidType(format!(
                "user-defined type {name} must wrap an elementary value type, got {}",
                self.identifier(underlying)
            )));
        }
        let underlying = self.claim(underlying);
        let id = self.push(TypeKind::UserDefined { name, underlying });
        self.adopt(id, &[underlying]);
        Ok(id)
    }

    pub fn add_array(&mut self, base: TypeId, length: Option<u64>) -> GenResult<TypeId> {
        if length == Some(0) {
            return Err(GenError::InvalidType(format!(
                "{}[0]: fixed arrays need at least one element",
                self.identifier(base)
            )));
        }
        if matches!(self.kind(base), TypeKind::Error { .. } | TypeKind::Event { .. }) {
            return Err(GenError::InvalidType(format!(
                "{} cannot be an array element",
                self.identifier(base)
            )));
        }
        let base = self.claim(base);
        let id = self.push(TypeKind::Array { base, length });
        self.adopt(id, &[base]);
        Ok(id)
    }

    pub fn add_struct(&mut self, name: impl Into<String>, members: Vec<(String, TypeId)>) -> GenResult<TypeId> {
        let name = name.into();
        let members = self.claim_members(&name, members)?;
        let id = self.push(TypeKind::Struct { name, members: members.clone() });
        self.adopt(id, &members);
        Ok(id)
    }

    pub fn add_tuple(&mut self, members: Vec<(String, TypeId)>) -> GenResult<TypeId> {
        let members = self.claim_members("tuple", members)?;
        let id = self.push(TypeKind::Tuple { members: members.clone() });
        self.adopt(id, &members);
        Ok(id)
    }

    pub fn add_function(
        &mut self,
        name: impl Into<String>,
        parameters: Vec<(String, TypeId)>,
        returns: Vec<(String, TypeId)>,
        mutability: StateMutability,
    ) -> GenResult<TypeId> {
        let parameters = self.add_tuple(parameters)?;
        let returns = self.add_tuple(returns)?;
        let id = self.push(TypeKind::Function {
            name: name.into(),
            parameters,
            returns,
            mutability,
        });
        self.adopt(id, &[parameters, returns]);
        Ok(id)
    }

    pub fn add_error(&mut self, name: impl Into<String>, parameters: Vec<(String, TypeId)>) -> GenResult<TypeId> {
        let parameters = self.add_tuple(parameters)?;
        let id = self.push(TypeKind::Error {
            name: name.into(),
            parameters,
        });
        self.adopt(id, &[parameters]);
        Ok(id)
    }

    pub fn add_event(
        &mut self,
        name: impl Into<String>,
        parameters: Vec<(String, TypeId, bool)>,
        anonymous: bool,
    ) -> GenResult<TypeId> {
        let indexed: Vec<bool> = parameters.iter().map(|(_, _, i)| *i).collect();
        let mut data_members = Vec::new();
        let mut all_members = Vec::new();
        for (label, ty, is_indexed) in parameters {
            if !is_indexed {
                let copy = self.deep_copy(ty);
                data_members.push((label.clone(), copy));
            }
            all_members.push((label, ty));
        }
        let parameters = self.add_tuple(all_members)?;
        let data = self.add_tuple(data_members)?;
        let id = self.push(TypeKind::Event {
            name: name.into(),
            parameters,
            data,
            indexed,
            anonymous,
        });
        self.adopt(id, &[parameters, data]);
        Ok(id)
    }

    /// Builds a detached tree from a collaborator-supplied description.
    pub fn build(&mut self, desc: &TypeDesc) -> GenResult<TypeId> {
        match desc {
            TypeDesc::Bool => Ok(self.add_bool()),
            TypeDesc::Address => Ok(self.add_address()),
            TypeDesc::Uint(bits) => self.add_uint(*bits),
            TypeDesc::Int(bits) => self.add_int(*bits),
            TypeDesc::Enum(e) => self.add_enum(e.name.clone(), e.members.len()),
            TypeDesc::FixedBytes(size) => self.add_fixed_bytes(*size),
            TypeDesc::UserDefined(u) => {
                let underlying = self.build(&u.underlying)?;
                self.add_user_defined(u.name.clone(), underlying)
            }
            TypeDesc::Bytes => Ok(self.add_bytes()),
            TypeDesc::String => Ok(self.add_string()),
            TypeDesc::Array(a) => {
                let base = self.build(&a.base)?;
                self.add_array(base, a.length)
            }
            TypeDesc::Struct(s) => {
                let members = self.build_members(&s.members)?;
                self.add_struct(s.name.clone(), members)
            }
            TypeDesc::Tuple(t) => {
                let members = self.build_members(&t.members)?;
                self.add_tuple(members)
            }
            TypeDesc::Function(f) => {
                let parameters = self.build_members(&f.parameters)?;
                let returns = self.build_members(&f.returns)?;
                self.add_function(f.name.clone(), parameters, returns, f.state_mutability)
            }
            TypeDesc::Error(e) => {
                let parameters = self.build_members(&e.parameters)?;
                self.add_error(e.name.clone(), parameters)
            }
            TypeDesc::Event(e) => {
                let mut parameters = Vec::with_capacity(e.parameters.len());
                for p in &e.parameters {
                    parameters.push((p.name.clone(), self.build(&p.ty)?, p.indexed));
                }
                self.add_event(e.name.clone(), parameters, e.anonymous)
            }
        }
    }

    fn build_members(&mut self, members: &[MemberDesc]) -> GenResult<Vec<(String, TypeId)>> {
        members
            .iter()
            .map(|m| Ok((m.name.clone(), self.build(&m.ty)?)))
            .collect()
    }

    /// Copies the subtree rooted at `id`. The copy is detached (no parent),
    /// keeps every label, and has the same shape as the original.
    pub fn deep_copy(&mut self, id: TypeId) -> TypeId {
        let kind = self.kind(id).clone();
        let label = self.nodes[id.index()].label.clone();
        let copied = kind.map_children(|child| self.deep_copy(child));
        let children = copied.children();
        let new_id = self.push(copied);
        self.nodes[new_id.index()].label = label;
        self.adopt(new_id, &children);
        new_id
    }

    /// Index of the member labelled `name` in a struct or tuple.
    pub fn member_index_by_name(&self, parent: TypeId, name: &str) -> GenResult<usize> {
        self.members(parent)
            .iter()
            .position(|m| self.label(*m) == Some(name))
            .ok_or_else(|| GenError::UnknownMember {
                type_name: self.identifier(parent).to_string(),
                member: name.to_string(),
            })
    }

    /// Struct and tuple members; the parameter list for error and event
    /// signatures; empty for everything else.
    pub fn members(&self, id: TypeId) -> &[TypeId] {
        match self.kind(id) {
            TypeKind::Struct { members, .. } | TypeKind::Tuple { members } => members,
            TypeKind::Error { parameters, .. } | TypeKind::Event { parameters, .. } => self.members(*parameters),
            _ => &[],
        }
    }

    /// Canonical ABI type string as used in selectors: enums are `uint8`,
    /// user-defined types their underlying type, structs plain tuples.
    pub fn abi_type_string(&self, id: TypeId) -> String {
        match self.kind(id) {
            TypeKind::Bool => "bool".into(),
            TypeKind::Address => "address".into(),
            TypeKind::Integer { signed: true, bits } => format!("int{bits}"),
            TypeKind::Integer { signed: false, bits } => format!("uint{bits}"),
            TypeKind::Enum { .. } => "uint8".into(),
            TypeKind::FixedBytes { size } => format!("bytes{size}"),
            TypeKind::UserDefined { underlying, .. } => self.abi_type_string(*underlying),
            TypeKind::Bytes => "bytes".into(),
            TypeKind::String => "string".into(),
            TypeKind::Array { base, length: Some(n) } => format!("{}[{n}]", self.abi_type_string(*base)),
            TypeKind::Array { base, length: None } => format!("{}[]", self.abi_type_string(*base)),
            TypeKind::Struct { members, .. } | TypeKind::Tuple { members } => {
                let inner: Vec<String> = members.iter().map(|m| self.abi_type_string(*m)).collect();
                format!("({})", inner.join(","))
            }
            TypeKind::Function { .. } => "function".into(),
            TypeKind::Error { name, parameters } | TypeKind::Event { name, parameters, .. } => {
                format!("{name}{}", self.abi_type_string(*parameters))
            }
        }
    }

    /// `Name(type,...)` for function, error and event signatures.
    pub fn signature(&self, id: TypeId) -> GenResult<String> {
        match self.kind(id) {
            TypeKind::Function { name, parameters, .. } => Ok(format!("{name}{}", self.abi_type_string(*parameters))),
            TypeKind::Error { .. } | TypeKind::Event { .. } => Ok(self.abi_type_string(id)),
            _ => Err(GenError::UnsupportedShape {
                type_name: self.identifier(id).to_string(),
                operation: "signature",
            }),
        }
    }

    fn claim_members(&mut self, owner: &str, members: Vec<(String, TypeId)>) -> GenResult<Vec<TypeId>> {
        let mut claimed = Vec::with_capacity(members.len());
        for (label, ty) in members {
            if matches!(self.kind(ty), TypeKind::Error { .. } | TypeKind::Event { .. }) {
                return Err(GenError::InvalidType(format!(
                    "{owner}.{label}: {} cannot be a member",
                    self.identifier(ty)
                )));
            }
            let ty = self.claim(ty);
            if !label.is_empty() {
                self.set_label(ty, label);
            }
            claimed.push(ty);
        }
        Ok(claimed)
    }

    /* A node that already belongs to a composite is copied before reuse */
    fn claim(&mut self, id: TypeId) -> TypeId {
        if self.parent(id).is_some() { self.deep_copy(id) } else { id }
    }

    fn adopt(&mut self, parent: TypeId, children: &[TypeId]) {
        for child in children {
            self.nodes[child.index()].parent = Some(parent);
        }
    }

    fn push(&mut self, kind: TypeKind) -> TypeId {
        let key = self.shape_key(&kind);
        let shape = self.shapes.intern(key);
        let id = TypeId(self.nodes.len() as u32);
        self.nodes.push(TypeNode {
            kind,
            label: None,
            parent: None,
            shape,
        });
        id
    }

    fn shape_key(&self, kind: &TypeKind) -> ShapeKey {
        let s = |id: &TypeId| self.shape(*id);
        match kind {
            TypeKind::Bool => ShapeKey::Bool,
            TypeKind::Address => ShapeKey::Address,
            TypeKind::Integer { signed, bits } => ShapeKey::Integer {
                signed: *signed,
                bits: *bits,
            },
            TypeKind::Enum { name, member_count } => ShapeKey::Enum {
                name: name.clone(),
                member_count: *member_count,
            },
            TypeKind::FixedBytes { size } => ShapeKey::FixedBytes { size: *size },
            TypeKind::UserDefined { name, underlying } => ShapeKey::UserDefined {
                name: name.clone(),
                underlying: s(underlying),
            },
            TypeKind::Bytes => ShapeKey::Bytes,
            TypeKind::String => ShapeKey::String,
            TypeKind::Array { base, length } => ShapeKey::Array {
                base: s(base),
                length: *length,
            },
            TypeKind::Struct { name, members } => ShapeKey::Struct {
                name: name.clone(),
                members: members.iter().map(s).collect(),
            },
            TypeKind::Tuple { members } => ShapeKey::Tuple {
                members: members.iter().map(s).collect(),
            },
            TypeKind::Function { parameters, returns, .. } => ShapeKey::Function {
                parameters: s(parameters),
                returns: s(returns),
            },
            TypeKind::Error { name, parameters } => ShapeKey::Error {
                name: name.clone(),
                parameters: s(parameters),
            },
            TypeKind::Event {
                name,
                parameters,
                indexed,
                anonymous,
                ..
            } => ShapeKey::Event {
                name: name.clone(),
                parameters: s(parameters),
                indexed: indexed.clone(),
                anonymous: *anonymous,
            },
        }
    }
}

fn check_bits(bits: u16) -> GenResult<()> {
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(GenError::InvalidType(format!(
            "integer width {bits} must be a multiple of 8 in 8..=256"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sol_abi_types::EnumDesc;

    #[test]
    fn structurally_equal_types_share_a_shape() {
        let mut arena = TypeArena::new();
        let a = arena.build(&TypeDesc::array(TypeDesc::Uint(256), None)).unwrap();
        let b = arena.build(&TypeDesc::array(TypeDesc::Uint(256), None)).unwrap();
        let c = arena.build(&TypeDesc::array(TypeDesc::Uint(128), None)).unwrap();
        assert_eq!(arena.shape(a), arena.shape(b));
        assert_ne!(arena.shape(a), arena.shape(c));
        assert_eq!(arena.identifier(a), "uint256[]");
    }

    #[test]
    fn labels_do_not_affect_identity() {
        let mut arena = TypeArena::new();
        let left = arena
            .build(&TypeDesc::structure("P", vec![MemberDesc::new("x", TypeDesc::Uint(8))]))
            .unwrap();
        let right = arena
            .build(&TypeDesc::structure("P", vec![MemberDesc::new("y", TypeDesc::Uint(8))]))
            .unwrap();
        assert_eq!(arena.shape(left), arena.shape(right));
        assert_eq!(arena.identifier(left), "struct P(uint8)");
    }

    #[test]
    fn reattaching_a_child_copies_it() {
        let mut arena = TypeArena::new();
        let word = arena.add_uint(256).unwrap();
        let first = arena.add_tuple(vec![("a".into(), word)]).unwrap();
        let second = arena.add_tuple(vec![("b".into(), word)]).unwrap();
        let a = arena.members(first)[0];
        let b = arena.members(second)[0];
        assert_eq!(a, word);
        assert_ne!(b, word);
        assert_eq!(arena.parent(a), Some(first));
        assert_eq!(arena.parent(b), Some(second));
        assert_eq!(arena.label(a), Some("a"));
        assert_eq!(arena.label(b), Some("b"));
        assert_eq!(arena.shape(a), arena.shape(b));
    }

    #[test]
    fn deep_copy_preserves_shape_and_labels() {
        let mut arena = TypeArena::new();
        let s = arena
            .build(&TypeDesc::structure(
                "S",
                vec![
                    MemberDesc::new("data", TypeDesc::Bytes),
                    MemberDesc::new("items", TypeDesc::array(TypeDesc::Uint(8), Some(3))),
                ],
            ))
            .unwrap();
        let copy = arena.deep_copy(s);
        assert_eq!(arena.shape(copy), arena.shape(s));
        assert_eq!(arena.parent(copy), None);
        let members = arena.members(copy).to_vec();
        assert_eq!(arena.label(members[1]), Some("items"));
        assert_eq!(arena.parent(members[1]), Some(copy));
    }

    #[test]
    fn invalid_shapes_are_rejected() {
        let mut arena = TypeArena::new();
        assert!(arena.add_uint(7).is_err());
        assert!(arena.add_int(264).is_err());
        assert!(arena.add_fixed_bytes(0).is_err());
        assert!(arena.add_enum("E", 257).is_err());
        let word = arena.add_uint(256).unwrap();
        assert!(arena.add_array(word, Some(0)).is_err());
        let bytes = arena.add_bytes();
        assert!(arena.add_user_defined("Blob", bytes).is_err());
    }

    #[test]
    fn enum_without_members_takes_maximum_width() {
        let mut arena = TypeArena::new();
        let e = arena
            .build(&TypeDesc::Enum(EnumDesc {
                name: "Side".into(),
                members: Vec::new(),
            }))
            .unwrap();
        assert_eq!(arena.kind(e), &TypeKind::Enum { name: "Side".into(), member_count: 256 });
    }

    #[test]
    fn event_splits_out_non_indexed_data() {
        let mut arena = TypeArena::new();
        let from = arena.add_address();
        let amount = arena.add_uint(256).unwrap();
        let event = arena
            .add_event("Transfer", vec![("from".into(), from, true), ("amount".into(), amount, false)], false)
            .unwrap();
        let TypeKind::Event { data, .. } = arena.kind(event).clone() else {
            panic!("not an event");
        };
        assert_eq!(arena.identifier(data), "(uint256)");
        assert_eq!(arena.members(event).len(), 2);
        assert_eq!(arena.member_index_by_name(event, "amount").unwrap(), 1);
        assert_eq!(arena.signature(event).unwrap(), "Transfer(address,uint256)");
    }

    #[test]
    fn abi_type_strings_erase_names() {
        let mut arena = TypeArena::new();
        let desc = TypeDesc::structure(
            "Order",
            vec![
                MemberDesc::new(
                    "side",
                    TypeDesc::Enum(EnumDesc {
                        name: "Side".into(),
                        members: vec!["Buy".into(), "Sell".into()],
                    }),
                ),
                MemberDesc::new("legs", TypeDesc::array(TypeDesc::tuple(vec![MemberDesc::new("p", TypeDesc::Int(24))]), Some(2))),
            ],
        );
        let id = arena.build(&desc).unwrap();
        assert_eq!(arena.abi_type_string(id), "(uint8,(int24)[2])");
        let word = arena.add_uint(256).unwrap();
        assert!(arena.signature(word).is_err());
    }
}
