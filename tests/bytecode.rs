mod common;

use std::collections::HashSet;

use common::{elaborate, with_main, FACTORIAL};
use minijavac::{
    codegen::bytecode::{self, Instruction, Label, Signature, Type, Unit},
    lex::Identifier,
};

use Instruction::*;

fn units(text: &str) -> Vec<Unit> {
    let elaborated = elaborate(text);
    bytecode::translate(&elaborated.program).expect("bytecode translation failed")
}

fn render(unit: &Unit) -> String {
    let mut output = Vec::new();
    bytecode::write(unit, &mut output).unwrap();
    String::from_utf8(output).unwrap()
}

/// Instrucciones del único método de la primera clase no principal.
fn only_method(text: &str) -> Vec<Instruction> {
    match units(text).into_iter().nth(1) {
        Some(Unit::Class(mut class)) => class.methods.remove(0).instructions,
        other => panic!("unexpected unit: {:?}", other),
    }
}

fn signature(class: &str, method: &str, formals: Vec<Type>, returns: Type) -> Signature {
    Signature {
        class: Identifier::from(class),
        method: Identifier::from(method),
        formals,
        returns,
    }
}

#[test]
fn factorial() {
    let units = units(FACTORIAL);
    assert_eq!(units.len(), 2);

    let compute_fac = signature("Fac", "ComputeFac", vec![Type::Int], Type::Int);
    match &units[0] {
        Unit::Main(main) => {
            assert_eq!(main.name, Identifier::from("Factorial"));
            assert_eq!(
                main.instructions,
                vec![
                    New(Identifier::from("Fac")),
                    Ldc(10),
                    Invokevirtual(compute_fac.clone()),
                    Print,
                ]
            );
        }

        other => panic!("unexpected unit: {:?}", other),
    }

    let class = match &units[1] {
        Unit::Class(class) => class,
        other => panic!("unexpected unit: {:?}", other),
    };

    let method = &class.methods[0];
    assert_eq!(method.locals, 3);

    // La condición del `if` reserva sus etiquetas después del `if` mismo
    let (then, otherwise, end) = (Label(0), Label(1), Label(2));
    let (less, not_less, compared) = (Label(3), Label(4), Label(5));

    assert_eq!(
        method.instructions,
        vec![
            Iload(1),
            Ldc(1),
            IfIcmplt(less),
            Instruction::Label(not_less),
            Ldc(0),
            Goto(compared),
            Instruction::Label(less),
            Ldc(1),
            Goto(compared),
            Instruction::Label(compared),
            Ifne(then),
            Instruction::Label(otherwise),
            Iload(1),
            Aload(0),
            Iload(1),
            Ldc(1),
            Isub,
            Invokevirtual(compute_fac),
            Imul,
            Istore(2),
            Goto(end),
            Instruction::Label(then),
            Ldc(1),
            Istore(2),
            Goto(end),
            Instruction::Label(end),
            Iload(2),
            Ireturn,
        ]
    );

    let comparisons = method
        .instructions
        .iter()
        .filter(|instruction| matches!(instruction, IfIcmplt(_)))
        .count();

    let invocations = method
        .instructions
        .iter()
        .filter(|instruction| matches!(instruction, Invokevirtual(_)))
        .count();

    assert_eq!((comparisons, invocations), (1, 1));
}

#[test]
fn factorial_text() {
    let units = units(FACTORIAL);

    let main = render(&units[0]);
    assert!(main.contains(".class public Factorial\n.super java/lang/Object\n"));
    assert!(main.contains(".method public static main([Ljava/lang/String;)V\n"));
    assert!(main.contains(".limit locals 2\n"));
    assert!(main.contains("\tgetstatic       java/lang/System/out Ljava/io/PrintStream;\n\tswap\n"));
    assert!(main.ends_with("\treturn\n.end method\n"));

    let fac = render(&units[1]);
    assert!(fac.contains(".method public ComputeFac(I)I\n.limit stack 4096\n.limit locals 3\n"));
    assert!(fac.contains("\tinvokevirtual   Fac/ComputeFac(I)I\n"));
    assert!(fac.contains("\tif_icmplt       L_3\n"));
    assert!(fac.contains("\tinvokespecial   java/lang/Object/<init>()V\n"));
}

#[test]
fn slots_follow_declaration_order() {
    let text = with_main(
        "0",
        "class A {
            public int m(int a, A b) {
                int[] c;
                boolean d;
                c = new int[a];
                d = true;
                return b.m(c.length, this);
            }
         }",
    );

    let elaborated = elaborate(&text);
    let method = &elaborated.program.classes[0].methods[0];
    let slots = bytecode::assign_slots(method);

    let numbers: HashSet<u32> = slots.values().copied().collect();
    assert_eq!(numbers, (1..=4).collect::<HashSet<u32>>());
    assert_eq!(slots[&Identifier::from("a")], 1);
    assert_eq!(slots[&Identifier::from("d")], 4);

    let instructions = only_method(&text);
    assert_eq!(
        &instructions[..6],
        &[Iload(1), NewArray, Astore(3), Ldc(1), Istore(4), Aload(2)]
    );

    assert_eq!(
        &instructions[6..],
        &[
            Aload(3),
            Arraylength,
            Aload(0),
            Invokevirtual(signature(
                "A",
                "m",
                vec![Type::Int, Type::Class(Identifier::from("A"))],
                Type::Int
            )),
            Ireturn,
        ]
    );
}

#[test]
fn field_access() {
    let text = with_main(
        "0",
        "class A {
            int x;
            int[] y;
            public int m() { x = 5; y[0] = x; return y[1]; }
         }",
    );

    let a = || Identifier::from("A");
    let x = || Identifier::from("x");
    let y = || Identifier::from("y");

    assert_eq!(
        only_method(&text),
        vec![
            Aload(0),
            Ldc(5),
            Putfield(a(), x(), Type::Int),
            Aload(0),
            Getfield(a(), y(), Type::IntArray),
            Ldc(0),
            Aload(0),
            Getfield(a(), x(), Type::Int),
            Iastore,
            Aload(0),
            Getfield(a(), y(), Type::IntArray),
            Ldc(1),
            Iaload,
            Ireturn,
        ]
    );
}

#[test]
fn local_array_store() {
    let text = with_main(
        "0",
        "class A { public int[] m() { int[] a; a = new int[3]; a[1] = 2; return a; } }",
    );

    assert_eq!(
        only_method(&text),
        vec![
            Ldc(3),
            NewArray,
            Astore(1),
            Aload(1),
            Ldc(1),
            Ldc(2),
            Iastore,
            Aload(1),
            Areturn,
        ]
    );
}

#[test]
fn loops_and_negation() {
    let text = with_main(
        "0",
        "class A {
            public boolean m(boolean b) {
                while (b) b = !b;
                return b && true;
            }
         }",
    );

    let (test, exit) = (Label(0), Label(1));
    let (nonzero, negated) = (Label(2), Label(3));

    assert_eq!(
        only_method(&text),
        vec![
            Instruction::Label(test),
            Iload(1),
            Ifeq(exit),
            Iload(1),
            Ifne(nonzero),
            Ldc(1),
            Goto(negated),
            Instruction::Label(nonzero),
            Ldc(0),
            Instruction::Label(negated),
            Istore(1),
            Goto(test),
            Instruction::Label(exit),
            Iload(1),
            Ldc(1),
            Iand,
            Ireturn,
        ]
    );
}

#[test]
fn inherited_invocation_names_receiver_class() {
    let text = with_main(
        "new B().m(5)",
        "class A { public int m(int x) { return x; } }
         class B extends A { }",
    );

    let units = units(&text);
    match &units[0] {
        Unit::Main(main) => assert_eq!(
            main.instructions[2],
            Invokevirtual(signature("B", "m", vec![Type::Int], Type::Int))
        ),

        other => panic!("unexpected unit: {:?}", other),
    }

    let b = render(&units[2]);
    assert!(b.contains(".class public B\n.super A\n"));
    assert!(b.contains("\tinvokespecial   A/<init>()V\n"));
}

#[test]
fn labels_are_unique_across_units() {
    let text = with_main(
        "new A().m(1)",
        "class A {
            public int m(int n) {
                if (n < 2) n = 1; else n = 2;
                return n;
            }
         }
         class B {
            public int m(int n) {
                while (0 < n) n = n - 1;
                return n;
            }
         }",
    );

    let mut defined = HashSet::new();
    for unit in units(&text) {
        let methods = match unit {
            Unit::Class(class) => class.methods,
            Unit::Main(_) => continue,
        };

        for method in methods {
            for instruction in method.instructions {
                if let Instruction::Label(label) = instruction {
                    assert!(defined.insert(label), "label {} defined twice", label);
                }
            }
        }
    }

    assert_eq!(defined.len(), 6 + 5);
}
