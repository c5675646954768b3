use alloy_primitives::{U256, keccak256};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use sol_abi_gen::{CodeUnit, GeneratorConfig, TypeArena, TypeId, TypeKind, Transcoder};
use sol_abi_reflect::{
    Interpreter, Machine, ReflectError, ReflectResult, Value, abi_encode, read_memory, write_memory,
};
use sol_abi_types::{ErrorDesc, FunctionDesc, MemberDesc, StateMutability, TypeDesc};

/* One type with its decoder and encoder generated into a fresh unit */
struct Harness {
    arena: TypeArena,
    ty: TypeId,
    unit: CodeUnit,
    decoder: String,
    encoder: String,
}

impl Harness {
    fn new(desc: TypeDesc, config: &GeneratorConfig) -> Self {
        let mut arena = TypeArena::new();
        let ty = arena.build(&desc).expect("valid type");
        let mut unit = CodeUnit::new();
        let (decoder, encoder) = {
            let mut t = Transcoder::new(&arena, config, &mut unit);
            let decoder = t.decode(ty).unwrap().name().expect("reference type").to_string();
            let encoder = t.encode(ty).unwrap().name().expect("reference type").to_string();
            (decoder, encoder)
        };
        Self {
            arena,
            ty,
            unit,
            decoder,
            encoder,
        }
    }

    fn decode_calldata(&self, calldata: Vec<u8>) -> ReflectResult<(Value, Machine)> {
        let mut m = Machine::new(calldata);
        let out = Interpreter::new(&self.unit).call(&mut m, &self.decoder, &[U256::ZERO])?;
        let value = read_memory(&self.arena, self.ty, &m, out[0])?;
        Ok((value, m))
    }

    fn decode(&self, value: &Value) -> ReflectResult<(Value, Machine)> {
        self.decode_calldata(abi_encode(&self.arena, self.ty, value)?)
    }

    fn encode(&self, value: &Value) -> ReflectResult<Vec<u8>> {
        let mut m = Machine::new(Vec::new());
        let ptr = write_memory(&self.arena, self.ty, value, &mut m)?;
        let dst = m.allocate(1 << 14)?;
        let out = Interpreter::new(&self.unit).call(&mut m, &self.encoder, &[ptr, U256::from(dst)])?;
        Ok(m.slice(dst, out[0].to::<usize>()))
    }
}

fn member(name: &str, ty: TypeDesc) -> MemberDesc {
    MemberDesc::new(name, ty)
}

fn order_desc() -> TypeDesc {
    let leg = TypeDesc::structure(
        "Leg",
        vec![member("to", TypeDesc::Address), member("size", TypeDesc::Uint(128))],
    );
    TypeDesc::structure(
        "Order",
        vec![
            member("id", TypeDesc::Uint(256)),
            member("memo", TypeDesc::Bytes),
            member("amounts", TypeDesc::array(TypeDesc::Uint(64), None)),
            member("legs", TypeDesc::array(leg, Some(2))),
            member("tags", TypeDesc::array(TypeDesc::String, None)),
            member("flag", TypeDesc::Bool),
        ],
    )
}

fn word(bits: usize) -> impl Strategy<Value = Value> + Clone {
    any::<[u8; 32]>().prop_map(move |b| Value::Word(U256::from_be_bytes(b) >> (256 - bits)))
}

fn blob() -> impl Strategy<Value = Value> {
    prop::collection::vec(any::<u8>(), 0..70).prop_map(Value::Bytes)
}

fn order() -> impl Strategy<Value = Value> {
    let leg = (word(160), word(128)).prop_map(|(to, size)| Value::Tuple(vec![to, size]));
    (
        word(256),
        blob(),
        prop::collection::vec(word(64), 0..5).prop_map(Value::Array),
        (leg.clone(), leg).prop_map(|(a, b)| Value::Array(vec![a, b])),
        prop::collection::vec(blob(), 0..4).prop_map(Value::Array),
        word(1),
    )
        .prop_map(|(id, memo, amounts, legs, tags, flag)| Value::Tuple(vec![id, memo, amounts, legs, tags, flag]))
}

fn matrix() -> impl Strategy<Value = Value> {
    prop::collection::vec(prop::collection::vec(word(256), 0..4).prop_map(Value::Array), 0..4).prop_map(Value::Array)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn struct_decode_and_encode_match_reference(value in order()) {
        let h = Harness::new(order_desc(), &GeneratorConfig::default());
        let (decoded, _) = h.decode(&value).unwrap();
        prop_assert_eq!(&decoded, &value);
        prop_assert_eq!(h.encode(&value).unwrap(), abi_encode(&h.arena, h.ty, &value).unwrap());
    }

    #[test]
    fn nested_arrays_round_trip_with_literal_offsets(value in matrix()) {
        let config = GeneratorConfig {
            named_constants: false,
            ..GeneratorConfig::default()
        };
        let desc = TypeDesc::array(TypeDesc::array(TypeDesc::Uint(256), None), None);
        let h = Harness::new(desc, &config);
        let (decoded, _) = h.decode(&value).unwrap();
        prop_assert_eq!(&decoded, &value);
        prop_assert_eq!(h.encode(&value).unwrap(), abi_encode(&h.arena, h.ty, &value).unwrap());
    }
}

#[test]
fn value_array_decodes_with_one_bulk_copy() {
    let h = Harness::new(TypeDesc::array(TypeDesc::Uint(256), None), &GeneratorConfig::default());
    let value = Value::Array(vec![Value::uint(10), Value::uint(20), Value::uint(30)]);
    let (decoded, m) = h.decode(&value).unwrap();
    assert_eq!(decoded, value);
    assert_eq!(m.copies.calldatacopy, vec![128]);
    assert!(m.copies.mcopy.is_empty());
}

#[test]
fn overlapping_tail_offsets_revert_without_data() {
    let h = Harness::new(TypeDesc::array(TypeDesc::Bytes, None), &GeneratorConfig::default());
    let words = [
        U256::from(2),
        U256::from(0x40),
        U256::from(0x40),
        U256::from(1),
        U256::from(b'a') << 248,
    ];
    let calldata: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes::<32>()).collect();
    assert_eq!(h.decode_calldata(calldata).unwrap_err(), ReflectError::Revert { data: Vec::new() });

    /* the canonical second offset decodes */
    let value = Value::Array(vec![Value::bytes(b"a".to_vec()), Value::bytes(b"bc".to_vec())]);
    let (decoded, m) = h.decode(&value).unwrap();
    assert_eq!(decoded, value);
    assert_eq!(m.copies.calldatacopy.len(), 1);
}

#[test]
fn wrapping_tail_lengths_revert_without_data() {
    let calldata = |words: &[U256]| -> Vec<u8> { words.iter().flat_map(|w| w.to_be_bytes::<32>()).collect() };
    let revert = ReflectError::Revert { data: Vec::new() };

    /* a length whose padded size wraps to zero would let the next offset repeat */
    let h = Harness::new(TypeDesc::array(TypeDesc::Bytes, None), &GeneratorConfig::default());
    let words = [U256::from(2), U256::from(0x40), U256::from(0x40), U256::MAX - U256::from(31)];
    assert_eq!(h.decode_calldata(calldata(&words)).unwrap_err(), revert);

    let h = Harness::new(
        TypeDesc::array(TypeDesc::array(TypeDesc::Uint(256), None), None),
        &GeneratorConfig::default(),
    );
    let words = [U256::from(2), U256::from(0x40), U256::from(0x40), U256::MAX];
    assert_eq!(h.decode_calldata(calldata(&words)).unwrap_err(), revert);

    /* tails running past the end of the call data */
    let h = Harness::new(TypeDesc::array(TypeDesc::Bytes, None), &GeneratorConfig::default());
    let words = [U256::from(1), U256::from(0x20), U256::from(5)];
    assert_eq!(h.decode_calldata(calldata(&words)).unwrap_err(), revert);
}

#[test]
fn function_parameters_decode_after_the_selector() {
    let mut arena = TypeArena::new();
    let f = arena
        .build(&TypeDesc::Function(FunctionDesc {
            name: "swap".into(),
            parameters: vec![
                member("amount", TypeDesc::Uint(256)),
                member("path", TypeDesc::array(TypeDesc::Address, None)),
            ],
            returns: vec![member("out", TypeDesc::Uint(256))],
            state_mutability: StateMutability::NonPayable,
        }))
        .unwrap();
    let TypeKind::Function { parameters, .. } = arena.kind(f) else {
        panic!("function type");
    };
    let parameters = *parameters;
    let path_ty = arena.members(parameters)[1];

    let config = GeneratorConfig::default();
    let mut unit = CodeUnit::new();
    let decoder = Transcoder::new(&arena, &config, &mut unit).decode_parameters(f).unwrap();

    let path = Value::Array(vec![Value::uint(0xaa), Value::uint(0xbb)]);
    let args = Value::Tuple(vec![Value::uint(1000), path.clone()]);
    let mut calldata = keccak256(arena.signature(f).unwrap().as_bytes())[..4].to_vec();
    calldata.extend(abi_encode(&arena, parameters, &args).unwrap());

    let mut m = Machine::new(calldata);
    let out = Interpreter::new(&unit).call(&mut m, &decoder, &[U256::from(4)]).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0], U256::from(1000));
    assert_eq!(read_memory(&arena, path_ty, &m, out[1]).unwrap(), path);
}

#[test]
fn error_data_is_selector_then_parameters() {
    let mut arena = TypeArena::new();
    let err = arena
        .build(&TypeDesc::Error(ErrorDesc {
            name: "Insufficient".into(),
            parameters: vec![member("needed", TypeDesc::Uint(256)), member("why", TypeDesc::String)],
        }))
        .unwrap();
    let TypeKind::Error { parameters, .. } = arena.kind(err) else {
        panic!("error type");
    };
    let parameters = *parameters;
    let why_ty = arena.members(parameters)[1];

    let config = GeneratorConfig::default();
    let mut unit = CodeUnit::new();
    let encoder = Transcoder::new(&arena, &config, &mut unit).encode_error(err).unwrap();

    let why = Value::bytes(b"balance too low".to_vec());
    let mut m = Machine::new(Vec::new());
    let why_ptr = write_memory(&arena, why_ty, &why, &mut m).unwrap();
    let dst = m.allocate(1024).unwrap();
    let out = Interpreter::new(&unit)
        .call(&mut m, &encoder, &[U256::from(7), why_ptr, U256::from(dst)])
        .unwrap();

    let mut expected = keccak256(b"Insufficient(uint256,string)")[..4].to_vec();
    expected.extend(abi_encode(&arena, parameters, &Value::Tuple(vec![Value::uint(7), why])).unwrap());
    assert_eq!(m.slice(dst, out[0].to::<usize>()), expected);
}

#[test]
fn values_serialize_with_kind_tags() {
    let value = Value::Tuple(vec![Value::uint(1), Value::bytes(vec![0xab])]);
    let json = serde_json::to_value(&value).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "kind": "tuple",
            "value": [
                { "kind": "word", "value": "0x1" },
                { "kind": "bytes", "value": [171] }
            ]
        })
    );
    let back: Value = serde_json::from_value(json).unwrap();
    assert_eq!(back, value);
}
