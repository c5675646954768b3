use serde_derive::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    Pure,
    View,
    #[default]
    NonPayable,
    Payable,
}

impl StateMutability {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateMutability::Pure => "pure",
            StateMutability::View => "view",
            StateMutability::NonPayable => "nonpayable",
            StateMutability::Payable => "payable",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct EnumDesc {
    pub name: String,
    /// Empty when the member names are unknown (JSON ABI only carries `uint8`);
    /// the enum is then treated as having the maximum 256 members.
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct UserDefinedDesc {
    pub name: String,
    pub underlying: Box<TypeDesc>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct ArrayDesc {
    pub base: Box<TypeDesc>,
    /// `None` for dynamically-sized arrays (`T[]`).
    #[serde(default)]
    pub length: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct MemberDesc {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDesc,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct StructDesc {
    pub name: String,
    pub members: Vec<MemberDesc>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct TupleDesc {
    pub members: Vec<MemberDesc>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct FunctionDesc {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<MemberDesc>,
    #[serde(default)]
    pub returns: Vec<MemberDesc>,
    #[serde(default)]
    pub state_mutability: StateMutability,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct ErrorDesc {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<MemberDesc>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct EventParamDesc {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDesc,
    #[serde(default)]
    pub indexed: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct EventDesc {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<EventParamDesc>,
    #[serde(default)]
    pub anonymous: bool,
}

/// Closed set of type shapes the generator understands.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub enum TypeDesc {
    Bool,
    Address,
    Uint(u16),
    Int(u16),
    Enum(EnumDesc),
    FixedBytes(u8),
    UserDefined(UserDefinedDesc),
    Bytes,
    String,
    Array(ArrayDesc),
    Struct(StructDesc),
    Tuple(TupleDesc),
    Function(FunctionDesc),
    Error(ErrorDesc),
    Event(EventDesc),
}

impl TypeDesc {
    pub fn array(base: TypeDesc, length: Option<u64>) -> Self {
        TypeDesc::Array(ArrayDesc { base: Box::new(base), length })
    }

    pub fn structure(name: impl Into<String>, members: Vec<MemberDesc>) -> Self {
        TypeDesc::Struct(StructDesc { name: name.into(), members })
    }

    pub fn tuple(members: Vec<MemberDesc>) -> Self {
        TypeDesc::Tuple(TupleDesc { members })
    }

    pub fn is_elementary(&self) -> bool {
        matches!(
            self,
            TypeDesc::Bool
                | TypeDesc::Address
                | TypeDesc::Uint(_)
                | TypeDesc::Int(_)
                | TypeDesc::FixedBytes(_)
                | TypeDesc::Bytes
                | TypeDesc::String
        )
    }
}

impl MemberDesc {
    pub fn new(name: impl Into<String>, ty: TypeDesc) -> Self {
        Self { name: name.into(), ty }
    }
}

/// Named type definition, the unit stored in YAML/JSON type files.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct TypeDef {
    pub name: String,
    #[serde(with = "serde_yml::with::singleton_map_recursive")]
    pub kind: TypeDesc,
}
