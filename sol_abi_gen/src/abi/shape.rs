//! Canonical structural identity of type nodes.
//!
//! Every node is interned into a [`ShapeKey`] whose children are themselves
//! [`ShapeId`]s, so two nodes share a `ShapeId` exactly when their shapes are
//! structurally identical. Labels never participate. Memo tables key on
//! `ShapeId`; the string forms ([`ShapeInterner::identifier`],
//! [`ShapeInterner::fragment`]) are rendered once at intern time.

use indexmap::IndexSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(u32);

impl ShapeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShapeKey {
    Bool,
    Address,
    Integer { signed: bool, bits: u16 },
    Enum { name: String, member_count: u16 },
    FixedBytes { size: u8 },
    UserDefined { name: String, underlying: ShapeId },
    Bytes,
    String,
    Array { base: ShapeId, length: Option<u64> },
    Struct { name: String, members: Vec<ShapeId> },
    Tuple { members: Vec<ShapeId> },
    Function { parameters: ShapeId, returns: ShapeId },
    Error { name: String, parameters: ShapeId },
    Event { name: String, parameters: ShapeId, indexed: Vec<bool>, anonymous: bool },
}

#[derive(Debug, Default)]
pub struct ShapeInterner {
    keys: IndexSet<ShapeKey>,
    identifiers: Vec<String>,
    fragments: Vec<String>,
}

impl ShapeInterner {
    pub fn intern(&mut self, key: ShapeKey) -> ShapeId {
        if let Some(index) = self.keys.get_index_of(&key) {
            return ShapeId(index as u32);
        }
        let identifier = self.render_identifier(&key);
        let fragment = self.render_fragment(&key);
        let (index, _) = self.keys.insert_full(key);
        self.identifiers.push(identifier);
        self.fragments.push(fragment);
        ShapeId(index as u32)
    }

    pub fn key(&self, id: ShapeId) -> &ShapeKey {
        &self.keys[id.index()]
    }

    /// Canonical, injective string form (`struct Pair(uint128,bytes)[]`).
    pub fn identifier(&self, id: ShapeId) -> &str {
        &self.identifiers[id.index()]
    }

    /// Identifier-safe name fragment used for routine and constant names.
    /// Not injective; callers disambiguate through `ShapeNames`.
    pub fn fragment(&self, id: ShapeId) -> &str {
        &self.fragments[id.index()]
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn render_identifier(&self, key: &ShapeKey) -> String {
        let id = |s: &ShapeId| self.identifiers[s.index()].as_str();
        match key {
            ShapeKey::Bool => "bool".into(),
            ShapeKey::Address => "address".into(),
            ShapeKey::Integer { signed, bits } => {
                format!("{}int{}", if *signed { "" } else { "u" }, bits)
            }
            ShapeKey::Enum { name, member_count } => format!("enum {name}:{member_count}"),
            ShapeKey::FixedBytes { size } => format!("bytes{size}"),
            ShapeKey::UserDefined { name, underlying } => format!("type {name}={}", id(underlying)),
            ShapeKey::Bytes => "bytes".into(),
            ShapeKey::String => "string".into(),
            ShapeKey::Array { base, length: Some(n) } => format!("{}[{n}]", id(base)),
            ShapeKey::Array { base, length: None } => format!("{}[]", id(base)),
            ShapeKey::Struct { name, members } => {
                format!("struct {name}({})", join(members.iter().map(id), ","))
            }
            ShapeKey::Tuple { members } => format!("({})", join(members.iter().map(id), ",")),
            ShapeKey::Function { parameters, returns } => {
                format!("function{}{}", id(parameters), id(returns))
            }
            ShapeKey::Error { name, parameters } => format!("error {name}{}", id(parameters)),
            ShapeKey::Event { name, parameters, indexed, anonymous } => {
                let flags: String = indexed.iter().map(|i| if *i { 'i' } else { '_' }).collect();
                format!(
                    "event {name}{}[{flags}]{}",
                    id(parameters),
                    if *anonymous { " anonymous" } else { "" }
                )
            }
        }
    }

    fn render_fragment(&self, key: &ShapeKey) -> String {
        let frag = |s: &ShapeId| self.fragments[s.index()].as_str();
        match key {
            ShapeKey::Bool => "bool".into(),
            ShapeKey::Address => "address".into(),
            ShapeKey::Integer { signed, bits } => {
                format!("{}int{}", if *signed { "" } else { "u" }, bits)
            }
            ShapeKey::Enum { name, .. } => sanitize(name),
            ShapeKey::FixedBytes { size } => format!("bytes{size}"),
            ShapeKey::UserDefined { name, .. } => sanitize(name),
            ShapeKey::Bytes => "bytes".into(),
            ShapeKey::String => "string".into(),
            ShapeKey::Array { base, length: Some(n) } => format!("{}_array{n}", frag(base)),
            ShapeKey::Array { base, length: None } => format!("{}_array", frag(base)),
            ShapeKey::Struct { name, .. } => sanitize(name),
            ShapeKey::Tuple { members } if members.is_empty() => "tuple".into(),
            ShapeKey::Tuple { members } => format!("tuple_{}", join(members.iter().map(frag), "_")),
            ShapeKey::Function { .. } => "function".into(),
            ShapeKey::Error { name, .. } | ShapeKey::Event { name, .. } => sanitize(name),
        }
    }
}

fn join<'a>(parts: impl Iterator<Item = &'a str>, sep: &str) -> String {
    parts.collect::<Vec<_>>().join(sep)
}

/// Maps an arbitrary label onto `[A-Za-z0-9_]`, never starting with a digit.
pub fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_keys_intern_once() {
        let mut interner = ShapeInterner::default();
        let a = interner.intern(ShapeKey::Integer { signed: false, bits: 256 });
        let b = interner.intern(ShapeKey::Integer { signed: false, bits: 256 });
        assert_eq!(a, b);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn identifiers_distinguish_tuple_nesting() {
        let mut interner = ShapeInterner::default();
        let word = interner.intern(ShapeKey::Integer { signed: false, bits: 256 });
        let bytes = interner.intern(ShapeKey::Bytes);
        let inner = interner.intern(ShapeKey::Tuple { members: vec![word] });
        let left = interner.intern(ShapeKey::Tuple { members: vec![inner, bytes] });
        let inner2 = interner.intern(ShapeKey::Tuple { members: vec![word, bytes] });
        let right = interner.intern(ShapeKey::Tuple { members: vec![inner2] });
        assert_ne!(left, right);
        assert_eq!(interner.identifier(left), "((uint256),bytes)");
        assert_eq!(interner.identifier(right), "((uint256,bytes))");
    }

    #[test]
    fn sanitize_produces_identifiers() {
        assert_eq!(sanitize("items[0].amount"), "items_0__amount");
        assert_eq!(sanitize("0x"), "_0x");
        assert_eq!(sanitize(""), "_");
    }
}
