/* Solidity JSON ABI fragments and their conversion into type descriptions */

use crate::types::{
    ArrayDesc, EnumDesc, ErrorDesc, EventDesc, EventParamDesc, FunctionDesc, MemberDesc,
    StateMutability, StructDesc, TupleDesc, TypeDesc, UserDefinedDesc,
};
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypeParseError {
    #[error("invalid integer type '{0}'")]
    InvalidInteger(String),
    #[error("invalid fixed bytes type '{0}'")]
    InvalidFixedBytes(String),
    #[error("malformed array suffix in '{0}'")]
    InvalidArraySuffix(String),
    #[error("tuple type '{0}' has no components")]
    MissingComponents(String),
    #[error("unknown type '{0}'")]
    UnknownType(String),
    #[error("failed to parse ABI JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<AbiParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_type: Option<String>,
    #[serde(default)]
    pub indexed: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AbiFunction {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(default)]
    pub state_mutability: StateMutability,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AbiError {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AbiEvent {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub anonymous: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AbiSpecial {
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub state_mutability: StateMutability,
}

/// One entry of a Solidity JSON ABI.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AbiItem {
    Function(AbiFunction),
    Error(AbiError),
    Event(AbiEvent),
    Constructor(AbiSpecial),
    Fallback(AbiSpecial),
    Receive(AbiSpecial),
}

impl AbiItem {
    pub fn name(&self) -> Option<&str> {
        match self {
            AbiItem::Function(f) => Some(&f.name),
            AbiItem::Error(e) => Some(&e.name),
            AbiItem::Event(e) => Some(&e.name),
            AbiItem::Constructor(_) | AbiItem::Fallback(_) | AbiItem::Receive(_) => None,
        }
    }

    /// Converts a function, error or event item. Constructors, fallback and
    /// receive entries have no routine of their own and yield `None`.
    pub fn to_type_desc(&self) -> Result<Option<TypeDesc>, TypeParseError> {
        match self {
            AbiItem::Function(f) => Ok(Some(TypeDesc::Function(FunctionDesc {
                name: f.name.clone(),
                parameters: params_to_members(&f.inputs)?,
                returns: params_to_members(&f.outputs)?,
                state_mutability: f.state_mutability,
            }))),
            AbiItem::Error(e) => Ok(Some(TypeDesc::Error(ErrorDesc {
                name: e.name.clone(),
                parameters: params_to_members(&e.inputs)?,
            }))),
            AbiItem::Event(e) => {
                let mut parameters = Vec::with_capacity(e.inputs.len());
                for input in &e.inputs {
                    parameters.push(EventParamDesc {
                        name: input.name.clone(),
                        ty: input.to_type_desc()?,
                        indexed: input.indexed,
                    });
                }
                Ok(Some(TypeDesc::Event(EventDesc {
                    name: e.name.clone(),
                    parameters,
                    anonymous: e.anonymous,
                })))
            }
            AbiItem::Constructor(_) | AbiItem::Fallback(_) | AbiItem::Receive(_) => Ok(None),
        }
    }
}

impl AbiParam {
    pub fn to_type_desc(&self) -> Result<TypeDesc, TypeParseError> {
        parse_type_string(&self.ty, &self.components, self.internal_type.as_deref())
    }
}

pub fn parse_abi_json(json: &str) -> Result<Vec<AbiItem>, TypeParseError> {
    Ok(serde_json::from_str(json)?)
}

fn params_to_members(params: &[AbiParam]) -> Result<Vec<MemberDesc>, TypeParseError> {
    params
        .iter()
        .map(|p| Ok(MemberDesc::new(p.name.clone(), p.to_type_desc()?)))
        .collect()
}

/// Parses a JSON ABI type string (`uint256`, `bytes32[2][]`, `tuple[]`, ...).
///
/// `components` supplies tuple members; `internal_type` (the compiler's
/// `internalType` annotation) upgrades tuples to named structs, `uint8` to
/// enums and elementary types to user-defined value types.
pub fn parse_type_string(
    ty: &str,
    components: &[AbiParam],
    internal_type: Option<&str>,
) -> Result<TypeDesc, TypeParseError> {
    let ty = ty.trim();
    if ty.ends_with(']') {
        let open = ty
            .rfind('[')
            .ok_or_else(|| TypeParseError::InvalidArraySuffix(ty.to_string()))?;
        let (inner, suffix) = ty.split_at(open);
        let length_str = &suffix[1..suffix.len() - 1];
        let length = if length_str.is_empty() {
            None
        } else {
            match length_str.parse::<u64>() {
                Ok(n) if n > 0 => Some(n),
                _ => return Err(TypeParseError::InvalidArraySuffix(ty.to_string())),
            }
        };
        /* internalType carries the same suffix ("struct S[2][]") */
        let inner_internal = internal_type.and_then(|it| it.strip_suffix(suffix));
        let base = parse_type_string(inner, components, inner_internal)?;
        return Ok(TypeDesc::Array(ArrayDesc { base: Box::new(base), length }));
    }

    let elementary = parse_elementary(ty, components, internal_type)?;
    Ok(apply_internal_type(elementary, ty, internal_type))
}

fn parse_elementary(
    ty: &str,
    components: &[AbiParam],
    internal_type: Option<&str>,
) -> Result<TypeDesc, TypeParseError> {
    match ty {
        "bool" => return Ok(TypeDesc::Bool),
        "address" => return Ok(TypeDesc::Address),
        "string" => return Ok(TypeDesc::String),
        "bytes" => return Ok(TypeDesc::Bytes),
        "uint" => return Ok(TypeDesc::Uint(256)),
        "int" => return Ok(TypeDesc::Int(256)),
        "function" => {
            return Ok(TypeDesc::Function(FunctionDesc {
                name: String::new(),
                parameters: Vec::new(),
                returns: Vec::new(),
                state_mutability: StateMutability::NonPayable,
            }))
        }
        "tuple" => {
            if components.is_empty() {
                return Err(TypeParseError::MissingComponents(ty.to_string()));
            }
            let members = params_to_members(components)?;
            return Ok(match internal_type.and_then(|it| it.strip_prefix("struct ")) {
                Some(name) => TypeDesc::Struct(StructDesc { name: last_segment(name), members }),
                None => TypeDesc::Tuple(TupleDesc { members }),
            });
        }
        _ => {}
    }

    if let Some(bits) = ty.strip_prefix("uint") {
        return Ok(TypeDesc::Uint(parse_bits(ty, bits)?));
    }
    if let Some(bits) = ty.strip_prefix("int") {
        return Ok(TypeDesc::Int(parse_bits(ty, bits)?));
    }
    if let Some(size) = ty.strip_prefix("bytes") {
        return match size.parse::<u8>() {
            Ok(n) if (1..=32).contains(&n) => Ok(TypeDesc::FixedBytes(n)),
            _ => Err(TypeParseError::InvalidFixedBytes(ty.to_string())),
        };
    }
    Err(TypeParseError::UnknownType(ty.to_string()))
}

fn parse_bits(ty: &str, bits: &str) -> Result<u16, TypeParseError> {
    match bits.parse::<u16>() {
        Ok(n) if n >= 8 && n <= 256 && n % 8 == 0 => Ok(n),
        _ => Err(TypeParseError::InvalidInteger(ty.to_string())),
    }
}

fn apply_internal_type(desc: TypeDesc, ty: &str, internal_type: Option<&str>) -> TypeDesc {
    let Some(internal) = internal_type else {
        return desc;
    };
    if internal == ty || !desc.is_elementary() {
        return desc;
    }
    if let Some(name) = internal.strip_prefix("enum ") {
        return TypeDesc::Enum(EnumDesc { name: last_segment(name), members: Vec::new() });
    }
    if internal.starts_with("contract ") || internal.starts_with("struct ") {
        return desc;
    }
    /* `address payable` and friends are plain elementary types */
    if internal.split_whitespace().next() == Some(ty) {
        return desc;
    }
    TypeDesc::UserDefined(UserDefinedDesc {
        name: last_segment(internal),
        underlying: Box::new(desc),
    })
}

fn last_segment(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, ty: &str) -> AbiParam {
        AbiParam {
            name: name.into(),
            ty: ty.into(),
            components: vec![],
            internal_type: None,
            indexed: false,
        }
    }

    #[test]
    fn parses_elementary_types() {
        assert_eq!(parse_type_string("uint256", &[], None).unwrap(), TypeDesc::Uint(256));
        assert_eq!(parse_type_string("int24", &[], None).unwrap(), TypeDesc::Int(24));
        assert_eq!(parse_type_string("bytes4", &[], None).unwrap(), TypeDesc::FixedBytes(4));
        assert_eq!(parse_type_string("bytes", &[], None).unwrap(), TypeDesc::Bytes);
        assert_eq!(parse_type_string("uint", &[], None).unwrap(), TypeDesc::Uint(256));
    }

    #[test]
    fn rejects_bad_widths() {
        assert!(matches!(
            parse_type_string("uint7", &[], None),
            Err(TypeParseError::InvalidInteger(_))
        ));
        assert!(matches!(
            parse_type_string("bytes33", &[], None),
            Err(TypeParseError::InvalidFixedBytes(_))
        ));
        assert!(matches!(
            parse_type_string("uint256[0]", &[], None),
            Err(TypeParseError::InvalidArraySuffix(_))
        ));
    }

    #[test]
    fn array_suffixes_apply_left_to_right() {
        /* uint8[2][] is a dynamic array of uint8[2] */
        let parsed = parse_type_string("uint8[2][]", &[], None).unwrap();
        assert_eq!(
            parsed,
            TypeDesc::array(TypeDesc::array(TypeDesc::Uint(8), Some(2)), None)
        );
    }

    #[test]
    fn tuple_with_struct_internal_type_becomes_struct() {
        let components = vec![param("a", "uint128"), param("b", "bytes")];
        let parsed =
            parse_type_string("tuple[]", &components, Some("struct Lib.Pair[]")).unwrap();
        let TypeDesc::Array(array) = parsed else {
            panic!("expected array");
        };
        let TypeDesc::Struct(s) = *array.base else {
            panic!("expected struct base");
        };
        assert_eq!(s.name, "Pair");
        assert_eq!(s.members.len(), 2);
        assert_eq!(s.members[1].ty, TypeDesc::Bytes);
    }

    #[test]
    fn internal_types_upgrade_elementary_types() {
        assert!(matches!(
            parse_type_string("uint8", &[], Some("enum Token.Kind")).unwrap(),
            TypeDesc::Enum(EnumDesc { ref name, .. }) if name == "Kind"
        ));
        assert_eq!(
            parse_type_string("address", &[], Some("contract IERC20")).unwrap(),
            TypeDesc::Address
        );
        assert_eq!(
            parse_type_string("address", &[], Some("address payable")).unwrap(),
            TypeDesc::Address
        );
        assert!(matches!(
            parse_type_string("uint96", &[], Some("Price")).unwrap(),
            TypeDesc::UserDefined(UserDefinedDesc { ref name, .. }) if name == "Price"
        ));
    }

    #[test]
    fn parses_full_abi_document() {
        let json = r#"[
            {"type":"function","name":"swap","stateMutability":"nonpayable",
             "inputs":[{"name":"path","type":"address[]"},{"name":"amount","type":"uint256"}],
             "outputs":[{"name":"","type":"uint256"}]},
            {"type":"error","name":"Slippage","inputs":[{"name":"minOut","type":"uint256"}]},
            {"type":"event","name":"Swapped","anonymous":false,
             "inputs":[{"name":"who","type":"address","indexed":true},{"name":"data","type":"bytes","indexed":false}]},
            {"type":"receive","stateMutability":"payable"}
        ]"#;
        let items = parse_abi_json(json).unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].name(), Some("swap"));
        let Some(TypeDesc::Function(f)) = items[0].to_type_desc().unwrap() else {
            panic!("expected function");
        };
        assert_eq!(f.parameters[0].ty, TypeDesc::array(TypeDesc::Address, None));
        let Some(TypeDesc::Event(e)) = items[2].to_type_desc().unwrap() else {
            panic!("expected event");
        };
        assert!(e.parameters[0].indexed);
        assert!(items[3].to_type_desc().unwrap().is_none());
    }

    #[test]
    fn type_def_round_trips_through_yaml() {
        let def = crate::types::TypeDef {
            name: "Order".into(),
            kind: TypeDesc::structure(
                "Order",
                vec![
                    MemberDesc::new("maker", TypeDesc::Address),
                    MemberDesc::new("amounts", TypeDesc::array(TypeDesc::Uint(128), Some(2))),
                ],
            ),
        };
        let yaml = serde_yml::to_string(&def).unwrap();
        let back: crate::types::TypeDef = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(back, def);
    }
}
