mod common;

use common::{elaborate, parse, reject, with_main, FACTORIAL};
use minijavac::{
    ast::{Access, ExprKind, Resolved, Statement, Type},
    lex::Identifier,
    semantic::{annotate, Dump, SemanticError},
};

fn class(name: &str) -> Type {
    Type::Class(Identifier::from(name))
}

fn main_call(text: &str) -> Resolved {
    let elaborated = elaborate(text);
    let value = match elaborated.program.main.body {
        Statement::Print(value) => value,
        other => panic!("unexpected main body: {:?}", other),
    };

    assert_eq!(value.val().typ, Some(Type::Int));
    match value.into_inner().kind {
        ExprKind::Call(call) => call.resolved.expect("call was not annotated"),
        other => panic!("unexpected expression: {:?}", other),
    }
}

#[test]
fn factorial_elaborates() {
    let elaborated = elaborate(FACTORIAL);
    let method = &elaborated.program.classes[0].methods[0];

    match &method.body[0] {
        Statement::If {
            condition,
            then,
            otherwise,
        } => {
            assert_eq!(condition.val().typ, Some(Type::Boolean));

            match then.as_ref() {
                Statement::Assign { target, value } => {
                    assert_eq!(target.typ, Some(Type::Int));
                    assert_eq!(target.access, Some(Access::Local));
                    assert_eq!(value.val().typ, Some(Type::Int));
                }

                other => panic!("unexpected statement: {:?}", other),
            }

            assert!(matches!(otherwise.as_ref(), Statement::Assign { .. }));
        }

        other => panic!("unexpected statement: {:?}", other),
    }

    assert_eq!(method.result.val().typ, Some(Type::Int));

    let resolved = main_call(FACTORIAL);
    assert_eq!(resolved.class, Identifier::from("Fac"));
    assert_eq!(resolved.formals, vec![Type::Int]);
}

#[test]
fn inherited_method_call() {
    let text = with_main(
        "new B().m(5)",
        "class A { public int m(int x) { return x; } }
         class B extends A { }",
    );

    let resolved = main_call(&text);
    assert_eq!(resolved.class, Identifier::from("B"));
    assert_eq!(resolved.arguments, vec![Type::Int]);
    assert_eq!(resolved.returns, Type::Int);
}

#[test]
fn boolean_assigned_an_int() {
    let text = with_main(
        "0",
        "class A { public int m() { boolean b; b = 1 + 2; return 0; } }",
    );

    assert!(matches!(
        reject(&text),
        SemanticError::TypeMismatch(Type::Boolean, Type::Int)
    ));
}

#[test]
fn extra_argument() {
    let text = with_main(
        "new A().m(1)",
        "class A { public int m() { return 0; } }",
    );

    assert!(matches!(
        reject(&text),
        SemanticError::ArityMismatch {
            expected: 0,
            found: 1,
            ..
        }
    ));
}

#[test]
fn locals_shadow_fields() {
    let text = with_main(
        "0",
        "class A {
            int x;
            int[] y;
            public int m() { int x; x = 1; y[0] = x; return x; }
         }",
    );

    let elaborated = elaborate(&text);
    let method = &elaborated.program.classes[0].methods[0];

    match &method.body[0] {
        Statement::Assign { target, .. } => assert_eq!(target.access, Some(Access::Local)),
        other => panic!("unexpected statement: {:?}", other),
    }

    match &method.body[1] {
        Statement::AssignArray { target, .. } => {
            assert_eq!(target.access, Some(Access::Field));
            assert_eq!(target.typ, Some(Type::IntArray));
        }

        other => panic!("unexpected statement: {:?}", other),
    }
}

#[test]
fn inherited_fields_resolve() {
    let text = with_main(
        "new B().get()",
        "class A { int x; }
         class B extends A { public int get() { return x; } }",
    );

    let elaborated = elaborate(&text);
    let method = &elaborated.program.classes[1].methods[0];
    match &method.result.val().kind {
        ExprKind::Read(variable) => {
            assert_eq!(variable.access, Some(Access::Field));
            assert_eq!(variable.typ, Some(Type::Int));
        }

        other => panic!("unexpected expression: {:?}", other),
    }
}

#[test]
fn arguments_widen_nominally() {
    let classes = "
        class A { public int take(A a) { return 1; } }
        class B extends A { }
        class C extends B { public int take_b(B b) { return 2; } }
    ";

    // Un descendiente es aceptable donde se espera un ancestro
    main_call(&with_main("new A().take(new C())", classes));

    let error = reject(&with_main("new C().take_b(new A())", classes));
    assert!(matches!(error, SemanticError::TypeMismatch(expected, found)
        if expected == class("B") && found == class("A")));
}

#[test]
fn return_widens_nominally() {
    let classes = "
        class A { public A make() { return new B(); } }
        class B extends A { }
    ";

    elaborate(&with_main("0", classes));

    let classes = "class A { public int[] make() { return 1; } }";
    assert!(matches!(
        reject(&with_main("0", classes)),
        SemanticError::TypeMismatch(Type::IntArray, Type::Int)
    ));
}

#[test]
fn assignment_requires_equal_types() {
    let classes = "
        class A { public int m() { A a; a = new B(); return 0; } }
        class B extends A { }
    ";

    assert!(matches!(
        reject(&with_main("0", classes)),
        SemanticError::TypeMismatch(expected, found)
            if expected == class("A") && found == class("B")
    ));
}

#[test]
fn operator_rules() {
    let cases = [
        ("true + 1", SemanticError::TypeMismatch(Type::Int, Type::Boolean)),
        ("1 && true", SemanticError::TypeMismatch(Type::Boolean, Type::Int)),
        ("!1", SemanticError::TypeMismatch(Type::Boolean, Type::Int)),
        ("(1 < 2) < 3", SemanticError::TypeMismatch(Type::Int, Type::Boolean)),
        ("(1).length", SemanticError::TypeMismatch(Type::IntArray, Type::Int)),
        ("(new int[true]).length", SemanticError::TypeMismatch(Type::Int, Type::Boolean)),
    ];

    for (expr, expected) in cases {
        let error = reject(&with_main(expr, ""));
        assert_eq!(format!("{:?}", error), format!("{:?}", expected), "{}", expr);
    }
}

#[test]
fn conditions_and_prints() {
    let text = "class Main { public static void main(String[] a) { if (1) {} else {} } }";
    assert!(matches!(
        reject(text),
        SemanticError::TypeMismatch(Type::Boolean, Type::Int)
    ));

    let text = "class Main { public static void main(String[] a) { System.out.println(true); } }";
    assert!(matches!(
        reject(text),
        SemanticError::TypeMismatch(Type::Int, Type::Boolean)
    ));

    let text = "class Main { public static void main(String[] a) { while (false) System.out.println(1); } }";
    elaborate(text);
}

#[test]
fn call_on_a_primitive() {
    assert!(matches!(
        reject(&with_main("(1).m()", "")),
        SemanticError::ExpectedObject(Type::Int)
    ));
}

#[test]
fn unresolved_names() {
    let unresolved = |text: &str| match reject(text) {
        SemanticError::UnresolvedName(name) => name,
        other => panic!("unexpected error: {:?}", other),
    };

    let name = unresolved(&with_main("0", "class A { public int m() { return y; } }"));
    assert_eq!(name, Identifier::from("y"));

    let name = unresolved(&with_main("new Nowhere().m()", ""));
    assert_eq!(name, Identifier::from("Nowhere"));

    let name = unresolved(&with_main("new A().n()", "class A { }"));
    assert_eq!(name, Identifier::from("n"));

    let name = unresolved(&with_main("0", "class A extends Z { }"));
    assert_eq!(name, Identifier::from("Z"));

    let name = unresolved(&with_main("0", "class A { Q q; }"));
    assert_eq!(name, Identifier::from("Q"));
}

#[test]
fn main_class_is_not_a_type() {
    let unresolved = |expr: &str, classes: &str| match reject(&with_main(expr, classes)) {
        SemanticError::UnresolvedName(name) => assert_eq!(name, Identifier::from("Main")),
        other => panic!("unexpected error: {:?}", other),
    };

    unresolved("new Main().m()", "");
    unresolved("0", "class A { Main x; }");
    unresolved("0", "class A { public int m(Main x) { return 0; } }");
    unresolved("0", "class A { public Main m() { return this; } }");
    unresolved("0", "class A { public int m() { Main x; return 0; } }");
    unresolved("0", "class A extends Main { }");
}

#[test]
fn duplicates() {
    let error = reject(&with_main("0", "class A { } class A { }"));
    assert!(matches!(error, SemanticError::DuplicateClass(_)));

    let error = reject(&with_main("0", "class Main { }"));
    assert!(matches!(error, SemanticError::DuplicateClass(_)));

    let error = reject(&with_main("0", "class A { int x; boolean x; }"));
    assert!(matches!(error, SemanticError::DuplicateMember(_, _)));

    let error = reject(&with_main(
        "0",
        "class A { public int m(int a) { int a; return 0; } }",
    ));
    assert!(matches!(error, SemanticError::DuplicateVariable(_)));
}

#[test]
fn overriding_is_not_duplication() {
    let classes = "
        class A { int x; public int m() { return 1; } }
        class B extends A { int x; public int m() { return 2; } }
    ";

    elaborate(&with_main("new B().m()", classes));
}

#[test]
fn inheritance_cycle() {
    let error = reject(&with_main("0", "class A extends B { } class B extends A { }"));
    assert!(matches!(error, SemanticError::InheritanceCycle(_)));
}

#[test]
fn this_in_main() {
    let text = "class Main { public static void main(String[] a) { System.out.println(this.m()); } }";
    assert!(matches!(reject(text), SemanticError::StaticThis));
}

#[test]
fn elaboration_is_idempotent() {
    let elaborated = elaborate(FACTORIAL);
    let mut program = elaborated.program;
    let first = format!("{:?}", program);

    annotate(&mut program, &elaborated.classes, Dump::empty()).unwrap();
    assert_eq!(format!("{:?}", program), first);
}

#[test]
fn forward_references() {
    let classes = "
        class A { B b; public B get() { return b; } }
        class B { public int m() { return new A().get().n(); } public int n() { return 3; } }
    ";

    let program = parse(&with_main("new B().m()", classes));
    assert!(program.elaborate(Dump::empty()).is_ok());
}
