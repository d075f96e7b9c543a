//! Integration coverage for the semantic pipeline: ordering, extraction,
//! resolution and checking over programmatically built programs.

mod common;

use common::Builder;
use orbit_ast::{keys, Annotation, BinaryOp, ExprKind};
use orbit_common::{ErrorKind, Phase, Session};
use orbit_typeck::{
    DependencyGraph, NoImports, ParsedProgram, TypeChecker, TypeExtractor, TypeResolver,
};

fn order(builder: Builder, root: orbit_ast::ExprId) -> Result<orbit_typeck::OrderedProgram, orbit_common::CompileError> {
    let session = Session::new(vec![]);
    DependencyGraph::new(session).run(ParsedProgram {
        ast: builder.ast,
        root,
    })
}

fn api_names(program: &orbit_typeck::OrderedProgram) -> Vec<String> {
    program
        .apis
        .iter()
        .map(|&id| match program.ast.kind(id) {
            ExprKind::Api { name, .. } => name.clone(),
            _ => unreachable!(),
        })
        .collect()
}

// ── Dependency ordering ──────────────────────────────────────────────

#[test]
fn chained_imports_order_dependencies_first() {
    let mut b = Builder::new();
    let c = b.api("C", &["B"], vec![]);
    let bb = b.api("B", &["A"], vec![]);
    let a = b.api("A", &[], vec![]);
    let root = b.root(vec![c, bb, a]);

    let ordered = order(b, root).unwrap();
    assert_eq!(api_names(&ordered), vec!["A", "B", "C"]);
}

#[test]
fn unrelated_apis_keep_input_order() {
    let mut b = Builder::new();
    let x = b.api("X", &[], vec![]);
    let y = b.api("Y", &[], vec![]);
    let z = b.api("Z", &[], vec![]);
    let root = b.root(vec![x, y, z]);

    let ordered = order(b, root).unwrap();
    assert_eq!(api_names(&ordered), vec!["X", "Y", "Z"]);
}

#[test]
fn mutual_imports_are_a_cycle() {
    let mut b = Builder::new();
    let a = b.api("A", &["B"], vec![]);
    let bb = b.api("B", &["A"], vec![]);
    let root = b.root(vec![a, bb]);

    let err = order(b, root).unwrap_err();
    match err.kind {
        ErrorKind::CircularDependency(chain) => {
            assert!(chain.contains(&"A".to_string()));
            assert!(chain.contains(&"B".to_string()));
            assert_eq!(chain.first(), chain.last());
        }
        other => panic!("expected CircularDependency, got {other:?}"),
    }
}

#[test]
fn self_import_warns_and_is_skipped() {
    let mut b = Builder::new();
    let a = b.api("A", &["A"], vec![]);
    let root = b.root(vec![a]);

    let session = Session::new(vec![]);
    let ordered = DependencyGraph::new(session.clone())
        .run(ParsedProgram {
            ast: b.ast,
            root,
        })
        .unwrap();
    assert_eq!(api_names(&ordered), vec!["A"]);
    assert_eq!(session.warning_count(), 1);
}

#[test]
fn import_of_unknown_api_is_deferred() {
    // `B` is not in the program; the extractor decides whether the disk can
    // provide it, ordering must not fail.
    let mut b = Builder::new();
    let a = b.api("A", &["B"], vec![]);
    let root = b.root(vec![a]);

    let ordered = order(b, root).unwrap();
    assert_eq!(api_names(&ordered), vec!["A"]);
}

// ── Extraction ───────────────────────────────────────────────────────

fn extract(
    builder: Builder,
    root: orbit_ast::ExprId,
) -> Result<orbit_typeck::ExtractedProgram, orbit_common::CompileError> {
    let session = Session::new(vec![]);
    let ordered = DependencyGraph::new(session.clone()).run(ParsedProgram {
        ast: builder.ast,
        root,
    })?;
    TypeExtractor::new(session, &NoImports).run(ordered)
}

/// API `M` with `type I(x Int)` and method `(I) id (v Int) (Int)`.
fn identity_api(b: &mut Builder) -> orbit_ast::ExprId {
    let type_def = b.type_def("I", &[("x", "Int")]);
    let signature = b.signature("I", "id", &[("v", "Int")], Some("Int"));
    let v = b.ident("v");
    let body = b.block(vec![], Some(v));
    let method = b.method(signature, body);
    b.api("M", &[], vec![type_def, method])
}

#[test]
fn single_api_exports_type_and_method() {
    let mut b = Builder::new();
    let api = identity_api(&mut b);
    let root = b.root(vec![api]);

    let extracted = extract(b, root).unwrap();
    assert_eq!(extracted.api_maps.len(), 1);
    let map = &extracted.api_maps[0];
    assert_eq!(map.canonical_name, "M");

    let ty = map.find_type("M.I").expect("M.I should be exported");
    assert_eq!(ty.members().len(), 1);
    assert_eq!(ty.members()[0].full_name(), "Orb.Core.Types.Int");

    let method = map
        .find_method("M.I.id.M.I.Orb.Core.Types.Int")
        .expect("mangled method name should be exported");
    assert_eq!(method.name, "id");
    assert_eq!(method.ret.full_name(), "Orb.Core.Types.Int");
}

#[test]
fn nested_api_gets_dotted_canonical_name() {
    let mut b = Builder::new();
    let type_def = b.type_def("I", &[]);
    let api = b.ast.alloc(
        ExprKind::Api {
            name: "Types".into(),
            within: Some("Orb.Core".into()),
            with: vec![],
            body: vec![type_def],
        },
        orbit_common::SourcePos::unknown(),
    );
    let root = b.root(vec![api]);

    let extracted = extract(b, root).unwrap();
    let map = &extracted.api_maps[0];
    assert_eq!(map.canonical_name, "Orb.Core.Types");
    assert!(map.find_type("Orb.Core.Types.I").is_some());
}

#[test]
fn duplicate_type_is_rejected() {
    let mut b = Builder::new();
    let first = b.type_def("I", &[]);
    let second = b.type_def("I", &[]);
    let api = b.api("M", &[], vec![first, second]);
    let root = b.root(vec![api]);

    let err = extract(b, root).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateType("M.I".into()));
}

#[test]
fn unknown_property_type_is_rejected() {
    let mut b = Builder::new();
    let type_def = b.type_def("I", &[("x", "Missing")]);
    let api = b.api("M", &[], vec![type_def]);
    let root = b.root(vec![api]);

    let err = extract(b, root).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownType("Missing".into()));
}

#[test]
fn missing_import_fails_extraction() {
    let mut b = Builder::new();
    let api = b.api("A", &["Elsewhere"], vec![]);
    let root = b.root(vec![api]);

    let err = extract(b, root).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DependencyNotFound("Elsewhere".into()));
}

#[test]
fn local_import_reuses_earlier_map() {
    let mut b = Builder::new();
    let shared = b.type_def("Shared", &[]);
    let a = b.api("A", &[], vec![shared]);
    let consumer = b.type_def("User", &[("s", "Shared")]);
    let bb = b.api("B", &["A"], vec![consumer]);
    let root = b.root(vec![bb, a]);

    let extracted = extract(b, root).unwrap();
    let map_b = extracted
        .api_maps
        .iter()
        .find(|m| m.canonical_name == "B")
        .unwrap();
    // A's export is visible through B's map, flagged imported.
    let imported = map_b
        .types()
        .iter()
        .find(|t| t.record.full_name() == "A.Shared")
        .unwrap();
    assert!(imported.imported);
    // And B's own type resolved its property against it.
    let user = map_b.find_type("B.User").unwrap();
    assert_eq!(user.members()[0].full_name(), "A.Shared");
}

#[test]
fn insert_type_extension_rewrites_annotation() {
    let mut b = Builder::new();
    let foo = b.ident("Foo");
    let annotation = b.annotation("Orb.Compiler.Backend.TypeExtractor.InsertType", vec![foo]);
    let api = b.api("M", &[], vec![annotation]);
    let root = b.root(vec![api]);

    let extracted = extract(b, root).unwrap();
    let map = &extracted.api_maps[0];
    let record = map.find_type("Foo").expect("Foo should be exported");
    assert_eq!(record.short_name(), "Foo");
    assert_eq!(record.full_name(), "Foo");

    // The annotation node was replaced by a synthetic TypeDef carrying
    // provenance back to the annotation.
    let api_id = extracted.apis[0];
    let body = match extracted.ast.kind(api_id) {
        ExprKind::Api { body, .. } => body.clone(),
        _ => unreachable!(),
    };
    assert_eq!(body.len(), 1);
    match extracted.ast.kind(body[0]) {
        ExprKind::TypeDef { name, .. } => assert_eq!(name, "Foo"),
        other => panic!("expected synthetic TypeDef, got {}", other.tag()),
    }
    assert!(matches!(
        extracted.ast.annotation(body[0], keys::PHASE),
        Some(Annotation::Phase(_))
    ));
}

#[test]
fn unknown_extractor_extension_is_fatal() {
    let mut b = Builder::new();
    let annotation = b.annotation("Orb.Compiler.Backend.TypeExtractor.Missing", vec![]);
    let api = b.api("M", &[], vec![annotation]);
    let root = b.root(vec![api]);

    let err = extract(b, root).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownExtension { .. }));
}

#[test]
fn extension_arity_is_enforced() {
    let mut b = Builder::new();
    let annotation = b.annotation("Orb.Compiler.Backend.TypeExtractor.InsertType", vec![]);
    let api = b.api("M", &[], vec![annotation]);
    let root = b.root(vec![api]);

    let err = extract(b, root).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::BadExtensionArity { .. }));
}

// ── Resolution ───────────────────────────────────────────────────────

fn resolve(
    builder: Builder,
    root: orbit_ast::ExprId,
) -> Result<orbit_typeck::ResolvedProgram, orbit_common::CompileError> {
    let session = Session::new(vec![]);
    let ordered = DependencyGraph::new(session.clone()).run(ParsedProgram {
        ast: builder.ast,
        root,
    })?;
    let extracted = TypeExtractor::new(session.clone(), &NoImports).run(ordered)?;
    TypeResolver::new(session).run(extracted)
}

/// An API declaring `Operator.+.Int.Int -> Int` plus a method whose body
/// returns `1 + 2`.
fn operator_program(b: &mut Builder) -> orbit_ast::ExprId {
    let plus_sig = b.signature("Operator", "+", &[("l", "Int"), ("r", "Int")], Some("Int"));
    let l = b.ident("l");
    let plus_body = b.block(vec![], Some(l));
    let plus_method = b.method(plus_sig, plus_body);

    let type_def = b.type_def("I", &[("x", "Int")]);
    let use_sig = b.signature("I", "sum", &[], Some("Int"));
    let one = b.int(1);
    let two = b.int(2);
    let sum = b.binary(BinaryOp::Add, one, two);
    let use_body = b.block(vec![], Some(sum));
    let use_method = b.method(use_sig, use_body);

    let api = b.api("M", &[], vec![type_def, plus_method, use_method]);
    b.root(vec![api])
}

#[test]
fn binary_operator_rewrites_to_method_dispatch() {
    let mut b = Builder::new();
    let root = operator_program(&mut b);

    let resolved = resolve(b, root).unwrap();

    // Find the binary node and inspect its annotations.
    let mut found = false;
    for i in 0..resolved.ast.len() as u32 {
        let id = orbit_ast::ExprId(i);
        if let ExprKind::Binary { .. } = resolved.ast.kind(id) {
            found = true;
            assert_eq!(
                resolved.ast.type_of(id).unwrap().full_name(),
                "Orb.Core.Types.Int"
            );
            let dispatch = resolved
                .ast
                .metadata(id, keys::OPERATOR_FUNCTION)
                .expect("operator metadata should be attached")
                .as_type()
                .expect("operator metadata should hold a record");
            assert_eq!(
                dispatch.full_name(),
                "Operator.+.Orb.Core.Types.Int.Orb.Core.Types.Int"
            );
        }
    }
    assert!(found, "program should contain a binary node");
}

#[test]
fn unsupported_operator_is_rejected() {
    let mut b = Builder::new();
    let type_def = b.type_def("I", &[("x", "Int")]);
    let sig = b.signature("I", "sum", &[], Some("Int"));
    let one = b.int(1);
    let two = b.int(2);
    let sum = b.binary(BinaryOp::Add, one, two);
    let body = b.block(vec![], Some(sum));
    let method = b.method(sig, body);
    let api = b.api("M", &[], vec![type_def, method]);
    let root = b.root(vec![api]);

    let err = resolve(b, root).unwrap_err();
    match err.kind {
        ErrorKind::UnsupportedOperator { symbol, operands } => {
            assert_eq!(symbol, "+");
            assert_eq!(operands.len(), 2);
        }
        other => panic!("expected UnsupportedOperator, got {other:?}"),
    }
}

#[test]
fn constructor_arity_mismatch_is_rejected() {
    let mut b = Builder::new();
    let type_def = b.type_def("P", &[("a", "Int"), ("b", "Int")]);
    let sig = b.signature("P", "make", &[], Some("P"));
    let one = b.int(1);
    let call = b.constructor("P", vec![one]);
    let body = b.block(vec![], Some(call));
    let method = b.method(sig, body);
    let api = b.api("M", &[], vec![type_def, method]);
    let root = b.root(vec![api]);

    let err = resolve(b, root).unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::ConstructorArityMismatch {
            type_name: "M.P".into(),
            expected: 2,
            actual: 1,
        }
    );
}

#[test]
fn constructor_arg_type_mismatch_is_rejected() {
    let mut b = Builder::new();
    let type_def = b.type_def("P", &[("a", "Int"), ("b", "Int")]);
    let sig = b.signature("P", "make", &[], Some("P"));
    let one = b.int(1);
    let wrong = b.real(2.0);
    let call = b.constructor("P", vec![one, wrong]);
    let body = b.block(vec![], Some(call));
    let method = b.method(sig, body);
    let api = b.api("M", &[], vec![type_def, method]);
    let root = b.root(vec![api]);

    let err = resolve(b, root).unwrap_err();
    match err.kind {
        ErrorKind::ConstructorArgTypeMismatch { index, .. } => assert_eq!(index, 1),
        other => panic!("expected ConstructorArgTypeMismatch, got {other:?}"),
    }
}

#[test]
fn assignment_declared_type_must_match() {
    let mut b = Builder::new();
    let type_def = b.type_def("I", &[("x", "Int")]);
    let sig = b.signature("I", "go", &[], None);
    let one = b.int(1);
    let assign = b.assignment("x", Some("Real"), one);
    let body = b.block(vec![assign], None);
    let method = b.method(sig, body);
    let api = b.api("M", &[], vec![type_def, method]);
    let root = b.root(vec![api]);

    let err = resolve(b, root).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::AssignmentTypeMismatch { .. }));
}

#[test]
fn instance_call_expands_with_receiver_argument() {
    // type I(x Int); (I) id (v Int) (Int); (I) call () (Int): p = I(5); return p.id(3)
    let mut b = Builder::new();
    let type_def = b.type_def("I", &[("x", "Int")]);
    let id_sig = b.signature("I", "id", &[("v", "Int")], Some("Int"));
    let v = b.ident("v");
    let id_body = b.block(vec![], Some(v));
    let id_method = b.method(id_sig, id_body);

    let caller_sig = b.signature("I", "call", &[], Some("Int"));
    let five = b.int(5);
    let ctor = b.constructor("I", vec![five]);
    let assign = b.assignment("p", None, ctor);
    let p = b.ident("p");
    let three = b.int(3);
    let call = b.instance_call(p, "id", vec![three]);
    let caller_body = b.block(vec![assign], Some(call));
    let caller = b.method(caller_sig, caller_body);

    let api = b.api("M", &[], vec![type_def, id_method, caller]);
    let root = b.root(vec![api]);

    let resolved = resolve(b, root).unwrap();
    let mut found = false;
    for i in 0..resolved.ast.len() as u32 {
        let id = orbit_ast::ExprId(i);
        if let ExprKind::InstanceCall { .. } = resolved.ast.kind(id) {
            found = true;
            let expanded = resolved
                .ast
                .metadata(id, keys::EXPANDED_METHOD_NAME)
                .and_then(|m| m.as_str())
                .expect("expanded name should be recorded");
            assert_eq!(expanded, "M.I.id.M.I.Orb.Core.Types.Int");
            assert_eq!(
                resolved.ast.type_of(id).unwrap().full_name(),
                "Orb.Core.Types.Int"
            );
        }
    }
    assert!(found);
}

#[test]
fn resolver_annotates_blocks_and_returns() {
    let mut b = Builder::new();
    let api = identity_api(&mut b);
    let root = b.root(vec![api]);

    let resolved = resolve(b, root).unwrap();
    for i in 0..resolved.ast.len() as u32 {
        let id = orbit_ast::ExprId(i);
        match resolved.ast.kind(id) {
            ExprKind::Block { ret: Some(ret), .. } => {
                let block_type = resolved.ast.type_of(id).unwrap();
                let ret_type = resolved.ast.type_of(*ret).unwrap();
                assert_eq!(block_type.full_name(), ret_type.full_name());
            }
            ExprKind::Method { .. } => {
                assert!(resolved.ast.type_of(id).is_some());
            }
            _ => {}
        }
    }
}

#[test]
fn alias_extension_introduces_scope_alias() {
    let mut b = Builder::new();
    let type_def = b.type_def("I", &[("x", "Int")]);
    let source = b.ident("MyInt");
    let target = b.type_ident("Int");
    let alias = b.annotation(
        "Orb.Compiler.Backend.TypeResolver.AliasType",
        vec![source, target],
    );
    let api = b.api("M", &[], vec![type_def, alias]);
    let root = b.root(vec![api]);

    let resolved = resolve(b, root).unwrap();
    let api_id = resolved.apis[0];
    let scope = match resolved.ast.annotation(api_id, keys::SCOPE) {
        Some(Annotation::Scope(scope)) => *scope,
        _ => panic!("api should carry its scope"),
    };
    let record = resolved.scopes.find_type(scope, "MyInt").unwrap();
    assert_eq!(record.full_name(), "Orb.Core.Types.Int");
}

#[test]
fn special_extension_declares_generic_instantiation() {
    let mut b = Builder::new();
    let base = b.type_ident("List");
    let param = b.type_ident("Int");
    let special = b.annotation("Special", vec![base, param]);
    let api = b.api("M", &[], vec![special]);
    let root = b.root(vec![api]);

    let resolved = resolve(b, root).unwrap();
    let api_id = resolved.apis[0];
    let body = match resolved.ast.kind(api_id) {
        ExprKind::Api { body, .. } => body.clone(),
        _ => unreachable!(),
    };
    assert_eq!(body.len(), 1);
    match resolved.ast.kind(body[0]) {
        ExprKind::TypeDef { name, .. } => assert_eq!(name, "List[Int]"),
        other => panic!("expected synthetic TypeDef, got {}", other.tag()),
    }
    let record = resolved.ast.type_of(body[0]).unwrap();
    assert_eq!(
        record.full_name(),
        "Orb.Core.Types.List[Orb.Core.Types.Int]"
    );

    let scope = match resolved.ast.annotation(api_id, keys::SCOPE) {
        Some(Annotation::Scope(scope)) => *scope,
        _ => panic!("api should carry its scope"),
    };
    assert!(resolved.scopes.find_type(scope, "List[Int]").is_ok());
}

#[test]
fn trait_return_with_multiple_adopters_is_rejected() {
    let mut b = Builder::new();
    let the_trait = b.trait_def("Shape");
    let first = b.type_def_adopting("Circle", &[("r", "Int")], &["Shape"]);
    let second = b.type_def_adopting("Square", &[("s", "Int")], &["Shape"]);
    let sig = b.signature("Circle", "pick", &[], Some("Shape"));
    let one = b.int(1);
    let ctor = b.constructor("Circle", vec![one]);
    let body = b.block(vec![], Some(ctor));
    let method = b.method(sig, body);
    let api = b.api("M", &[], vec![the_trait, first, second, method]);
    let root = b.root(vec![api]);

    let err = resolve(b, root).unwrap_err();
    match err.kind {
        ErrorKind::TraitReturnAmbiguous { implementers, .. } => {
            assert_eq!(implementers.len(), 2);
        }
        other => panic!("expected TraitReturnAmbiguous, got {other:?}"),
    }
}

// ── Checking ─────────────────────────────────────────────────────────

#[test]
fn checker_accepts_a_resolved_program() {
    let mut b = Builder::new();
    let root = operator_program(&mut b);

    let session = Session::new(vec![]);
    let ordered = DependencyGraph::new(session.clone())
        .run(ParsedProgram {
            ast: b.ast,
            root,
        })
        .unwrap();
    let extracted = TypeExtractor::new(session.clone(), &NoImports)
        .run(ordered)
        .unwrap();
    let resolved = TypeResolver::new(session.clone()).run(extracted).unwrap();
    assert!(TypeChecker::new(session).run(resolved).is_ok());
}
