/* Values paired with arena types by the reference encoders */

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// A value of some ABI type. Value types are a single word exactly as it
/// sits in calldata (fixed bytes left-aligned, signed integers sign
/// extended); bytes and strings are raw bytes; arrays hold their elements;
/// structs and tuples hold their members in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum Value {
    Word(U256),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Tuple(Vec<Value>),
}

impl Value {
    pub fn uint(v: u64) -> Self {
        Value::Word(U256::from(v))
    }

    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(data.into())
    }

    pub fn as_word(&self) -> Option<U256> {
        match self {
            Value::Word(w) => Some(*w),
            _ => None,
        }
    }

    /// Short description used in mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Word(_) => "word",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Tuple(_) => "tuple",
        }
    }
}

impl From<U256> for Value {
    fn from(word: U256) -> Self {
        Value::Word(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(Value::uint(7).as_word(), Some(U256::from(7)));
        assert_eq!(Value::bytes(b"ab".to_vec()).kind(), "bytes");
        assert_eq!(Value::Tuple(vec![]).as_word(), None);
    }
}
