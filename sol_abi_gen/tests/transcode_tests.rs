use pretty_assertions::assert_eq;
use sol_abi_gen::codegen::{Builtin, Expr, Stmt};
use sol_abi_gen::{CodeUnit, GenError, GeneratorConfig, RoutineRef, TypeArena, TypeId, Transcoder};
use sol_abi_types::{FunctionDesc, MemberDesc, StateMutability, TypeDesc};

fn render(unit: &CodeUnit, name: &str) -> String {
    unit.routine(name).expect("routine exists").to_lines(true).render("    ")
}

fn count_builtin(stmts: &[Stmt], wanted: Builtin) -> usize {
    fn in_expr(e: &Expr, wanted: Builtin) -> usize {
        match e {
            Expr::Builtin(b, args) => (*b == wanted) as usize + args.iter().map(|a| in_expr(a, wanted)).sum::<usize>(),
            Expr::Call(_, args) => args.iter().map(|a| in_expr(a, wanted)).sum(),
            _ => 0,
        }
    }
    stmts
        .iter()
        .map(|s| match s {
            Stmt::Let(_, Some(e)) | Stmt::Assign(_, e) | Stmt::Expr(e) => in_expr(e, wanted),
            Stmt::If(c, body) => in_expr(c, wanted) + count_builtin(body.stmts(), wanted),
            Stmt::For { init, cond, post, body } => {
                count_builtin(init.stmts(), wanted)
                    + in_expr(cond, wanted)
                    + count_builtin(post.stmts(), wanted)
                    + count_builtin(body.stmts(), wanted)
            }
            _ => 0,
        })
        .sum()
}

fn count_calls(stmts: &[Stmt]) -> usize {
    fn in_expr(e: &Expr) -> usize {
        match e {
            Expr::Builtin(_, args) => args.iter().map(in_expr).sum(),
            Expr::Call(_, args) => 1 + args.iter().map(in_expr).sum::<usize>(),
            _ => 0,
        }
    }
    stmts
        .iter()
        .map(|s| match s {
            Stmt::Let(_, Some(e)) | Stmt::Assign(_, e) | Stmt::Expr(e) => in_expr(e),
            Stmt::If(c, body) => in_expr(c) + count_calls(body.stmts()),
            Stmt::For { body, .. } => count_calls(body.stmts()),
            _ => 0,
        })
        .sum()
}

fn build(arena: &mut TypeArena, desc: TypeDesc) -> TypeId {
    arena.build(&desc).expect("valid type")
}

#[test]
fn two_half_words_decode_with_one_copy() {
    let mut arena = TypeArena::new();
    let pair = build(
        &mut arena,
        TypeDesc::structure(
            "Pair",
            vec![MemberDesc::new("a", TypeDesc::Uint(128)), MemberDesc::new("b", TypeDesc::Uint(128))],
        ),
    );
    let config = GeneratorConfig::default();
    let mut unit = CodeUnit::new();
    let name = Transcoder::new(&arena, &config, &mut unit).decode(pair).unwrap();
    assert_eq!(name, RoutineRef::Named("abi_decode_Pair".into()));
    assert_eq!(
        render(&unit, "abi_decode_Pair"),
        "function abi_decode_Pair(cdPtr) -> mPtr {\n\
         \x20   mPtr := mload(FreeMemoryPointerSlot)\n\
         \x20   mstore(FreeMemoryPointerSlot, add(mPtr, Pair_head_size))\n\
         \x20   calldatacopy(mPtr, cdPtr, TwoWords)\n\
         }\n"
    );
    let body = unit.routine("abi_decode_Pair").unwrap().body.stmts();
    assert_eq!(count_builtin(body, Builtin::CalldataCopy), 1);
    assert_eq!(count_calls(body), 0);
    assert_eq!(unit.routine_count(), 1);
}

#[test]
fn bytes_then_word_decodes_member_by_member() {
    let mut arena = TypeArena::new();
    let blob = build(
        &mut arena,
        TypeDesc::structure(
            "Blob",
            vec![MemberDesc::new("data", TypeDesc::Bytes), MemberDesc::new("x", TypeDesc::Uint(256))],
        ),
    );
    assert!(arena.is_dynamically_encoded(blob));
    let config = GeneratorConfig::default();
    let mut unit = CodeUnit::new();
    Transcoder::new(&arena, &config, &mut unit).decode(blob).unwrap();
    assert_eq!(
        render(&unit, "abi_decode_Blob"),
        "function abi_decode_Blob(cdPtr) -> mPtr {\n\
         \x20   mPtr := mload(FreeMemoryPointerSlot)\n\
         \x20   mstore(FreeMemoryPointerSlot, add(mPtr, Blob_head_size))\n\
         \x20   mstore(add(mPtr, Blob_x_mem_offset), calldataload(add(cdPtr, Blob_x_cd_offset)))\n\
         \x20   mstore(mPtr, abi_decode_bytes(add(cdPtr, calldataload(cdPtr))))\n\
         }\n"
    );
    let body = unit.routine("abi_decode_Blob").unwrap().body.stmts();
    assert_eq!(count_builtin(body, Builtin::CalldataCopy), 0);
    assert!(unit.routine("abi_decode_bytes").is_some());
    assert_eq!(unit.constant("Blob_head_size"), Some(alloy_primitives::U256::from(64)));
}

#[test]
fn value_array_decodes_with_one_copy_and_no_loop() {
    let mut arena = TypeArena::new();
    let words = build(&mut arena, TypeDesc::array(TypeDesc::Uint(256), None));
    let config = GeneratorConfig::default();
    let mut unit = CodeUnit::new();
    Transcoder::new(&arena, &config, &mut unit).decode(words).unwrap();
    let routine = unit.routine("abi_decode_uint256_array").unwrap();
    assert_eq!(count_builtin(routine.body.stmts(), Builtin::CalldataCopy), 1);
    assert!(!routine.body.stmts().iter().any(|s| matches!(s, Stmt::For { .. })));
}

#[test]
fn literal_mode_registers_no_constants() {
    let mut arena = TypeArena::new();
    let blob = build(
        &mut arena,
        TypeDesc::structure(
            "Blob",
            vec![MemberDesc::new("data", TypeDesc::String), MemberDesc::new("x", TypeDesc::Uint(8))],
        ),
    );
    let config = GeneratorConfig {
        named_constants: false,
        ..GeneratorConfig::default()
    };
    let mut unit = CodeUnit::new();
    let mut t = Transcoder::new(&arena, &config, &mut unit);
    t.decode(blob).unwrap();
    t.encode(blob).unwrap();
    assert_eq!(unit.constants().count(), 0);
    assert!(render(&unit, "abi_decode_Blob").contains("mload(0x40)"));
}

#[test]
fn nested_shapes_generate_each_routine_once() {
    let mut arena = TypeArena::new();
    let leg = TypeDesc::structure(
        "Leg",
        vec![MemberDesc::new("memo", TypeDesc::Bytes), MemberDesc::new("qty", TypeDesc::Uint(64))],
    );
    let order = build(
        &mut arena,
        TypeDesc::structure(
            "Order",
            vec![
                MemberDesc::new("first", leg.clone()),
                MemberDesc::new("rest", TypeDesc::array(leg, None)),
                MemberDesc::new("note", TypeDesc::Bytes),
            ],
        ),
    );
    let config = GeneratorConfig::default();
    let mut unit = CodeUnit::new();
    let mut t = Transcoder::new(&arena, &config, &mut unit);
    t.decode(order).unwrap();
    t.decode(order).unwrap();
    let names: Vec<&str> = unit.routines().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["abi_decode_bytes", "abi_decode_Leg", "abi_decode_Leg_array", "abi_decode_Order"]
    );
}

#[test]
fn function_parameters_and_returns() {
    let mut arena = TypeArena::new();
    let f = build(
        &mut arena,
        TypeDesc::Function(FunctionDesc {
            name: "swap".into(),
            parameters: vec![
                MemberDesc::new("amount", TypeDesc::Uint(256)),
                MemberDesc::new("path", TypeDesc::array(TypeDesc::Address, None)),
            ],
            returns: vec![MemberDesc::new("out", TypeDesc::Uint(256))],
            state_mutability: StateMutability::NonPayable,
        }),
    );
    let config = GeneratorConfig::default();
    let mut unit = CodeUnit::new();
    let mut t = Transcoder::new(&arena, &config, &mut unit);
    let decoder = t.decode_parameters(f).unwrap();
    let encoder = t.encode_parameters(f).unwrap();
    assert_eq!(decoder, "abi_decode_params_tuple_uint256_address_array");
    assert_eq!(encoder, "abi_encode_params_tuple_uint256");
    let rendered = render(&unit, &decoder);
    assert!(rendered.starts_with("function abi_decode_params_tuple_uint256_address_array(cdPtr) -> v0, v1 {\n"));
    assert!(rendered.contains("v0 := calldataload(cdPtr)"));
    assert_eq!(
        render(&unit, &encoder),
        "function abi_encode_params_tuple_uint256(v0, dst) -> size {\n\
         \x20   size := OneWord\n\
         \x20   mstore(dst, v0)\n\
         }\n"
    );
    assert_eq!(arena.signature(f).unwrap(), "swap(uint256,address[])");
}

#[test]
fn value_types_have_no_routine_and_events_refuse_decode() {
    let mut arena = TypeArena::new();
    let flag = arena.add_bool();
    let word = arena.add_uint(256).unwrap();
    let event = arena.add_event("Ping", vec![("n".into(), word, false)], true).unwrap();
    let config = GeneratorConfig::default();
    let mut unit = CodeUnit::new();
    let mut t = Transcoder::new(&arena, &config, &mut unit);
    assert_eq!(t.decode(flag).unwrap(), RoutineRef::Inline);
    assert!(matches!(t.encode(event), Err(GenError::UnsupportedShape { .. })));
    assert_eq!(t.encode_event_data(event).unwrap(), "abi_encode_params_tuple_uint256");
    assert!(unit.constant("Ping_topic0").is_none());
}

#[test]
fn rendered_unit_wraps_yul_in_a_container() {
    let mut arena = TypeArena::new();
    let bytes = arena.add_bytes();
    let config = GeneratorConfig::default();
    let mut unit = CodeUnit::new();
    let mut t = Transcoder::new(&arena, &config, &mut unit);
    t.decode(bytes).unwrap();
    t.encode(bytes).unwrap();
    let out = unit.render("transcoders", true);
    assert!(out.contains("uint256 constant FreeMemoryPointerSlot = 0x40;"));
    assert!(out.contains("function transcoders() pure {"));
    assert!(out.contains("assembly (\"memory-safe\") {"));
    assert!(out.contains("function abi_encode_bytes(mPtrLength, dst) -> size {"));
}
