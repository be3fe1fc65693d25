//! Sintaxis textual del ensamblador de máquina de pila.

use std::io::{self, Write};

use super::ir::{Class, Instruction, MainClass, Method, Unit};

const HEADER: &str = "; This is automatically generated by the minijavac compiler.\n; Do NOT modify!";
const OBJECT: &str = "java/lang/Object";
const STACK_LIMIT: u32 = 4096;

/// Escribe una unidad completa.
pub fn write<W: Write>(unit: &Unit, output: &mut W) -> io::Result<()> {
    writeln!(output, "{}\n", HEADER)?;

    match unit {
        Unit::Main(main) => write_main(main, output),
        Unit::Class(class) => write_class(class, output),
    }
}

fn write_main<W: Write>(main: &MainClass, output: &mut W) -> io::Result<()> {
    writeln!(output, ".class public {}", main.name)?;
    writeln!(output, ".super {}\n", OBJECT)?;

    writeln!(output, ".method public static main([Ljava/lang/String;)V")?;
    writeln!(output, ".limit stack {}", STACK_LIMIT)?;
    writeln!(output, ".limit locals 2")?;

    for instruction in &main.instructions {
        write_instruction(instruction, output)?;
    }

    emit!(output, "return")?;
    writeln!(output, ".end method")
}

fn write_class<W: Write>(class: &Class, output: &mut W) -> io::Result<()> {
    let superclass = class
        .extends
        .as_ref()
        .map(|extends| extends.as_ref())
        .unwrap_or(OBJECT);

    writeln!(output, ".class public {}", class.name)?;
    writeln!(output, ".super {}\n", superclass)?;

    for (field, typ) in &class.fields {
        writeln!(output, ".field public {} {}", field, typ)?;
    }

    writeln!(output, "\n.method public <init>()V")?;
    emit!(output, "aload", "0")?;
    emit!(output, "invokespecial", "{}/<init>()V", superclass)?;
    emit!(output, "return")?;
    writeln!(output, ".end method")?;

    for method in &class.methods {
        writeln!(output)?;
        write_method(method, output)?;
    }

    Ok(())
}

fn write_method<W: Write>(method: &Method, output: &mut W) -> io::Result<()> {
    write!(output, ".method public {}(", method.name)?;
    for formal in &method.formals {
        write!(output, "{}", formal)?;
    }

    writeln!(output, "){}", method.returns)?;
    writeln!(output, ".limit stack {}", STACK_LIMIT)?;
    writeln!(output, ".limit locals {}", method.locals)?;

    for instruction in &method.instructions {
        write_instruction(instruction, output)?;
    }

    writeln!(output, ".end method")
}

fn write_instruction<W: Write>(instruction: &Instruction, output: &mut W) -> io::Result<()> {
    use Instruction::*;

    match instruction {
        Aload(slot) => emit!(output, "aload", "{}", slot),
        Astore(slot) => emit!(output, "astore", "{}", slot),
        Iload(slot) => emit!(output, "iload", "{}", slot),
        Istore(slot) => emit!(output, "istore", "{}", slot),
        Ldc(constant) => emit!(output, "ldc", "{}", constant),
        Iadd => emit!(output, "iadd"),
        Isub => emit!(output, "isub"),
        Imul => emit!(output, "imul"),
        Iand => emit!(output, "iand"),
        Iaload => emit!(output, "iaload"),
        Iastore => emit!(output, "iastore"),
        Arraylength => emit!(output, "arraylength"),
        NewArray => emit!(output, "newarray", "int"),

        New(class) => {
            emit!(output, "new", "{}", class)?;
            emit!(output, "dup")?;
            emit!(output, "invokespecial", "{}/<init>()V", class)
        }

        Getfield(class, field, typ) => emit!(output, "getfield", "{}/{} {}", class, field, typ),
        Putfield(class, field, typ) => emit!(output, "putfield", "{}/{} {}", class, field, typ),
        Goto(label) => emit!(output, "goto", "{}", label),
        Ifne(label) => emit!(output, "ifne", "{}", label),
        Ifeq(label) => emit!(output, "ifeq", "{}", label),
        IfIcmplt(label) => emit!(output, "if_icmplt", "{}", label),
        Label(label) => writeln!(output, "{}:", label),
        Invokevirtual(signature) => emit!(output, "invokevirtual", "{}", signature),
        Ireturn => emit!(output, "ireturn"),
        Areturn => emit!(output, "areturn"),

        Print => {
            emit!(output, "getstatic", "java/lang/System/out Ljava/io/PrintStream;")?;
            emit!(output, "swap")?;
            emit!(output, "invokevirtual", "java/io/PrintStream/println(I)V")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codegen::bytecode::ir::{Label, Type},
        lex::Identifier,
    };

    fn render(unit: &Unit) -> String {
        let mut output = Vec::new();
        write(unit, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn class_header_and_constructor() {
        let unit = Unit::Class(Class {
            name: Identifier::from("B"),
            extends: Some(Identifier::from("A")),
            fields: vec![
                (Identifier::from("xs"), Type::IntArray),
                (Identifier::from("next"), Type::Class(Identifier::from("B"))),
            ],
            methods: vec![],
        });

        let text = render(&unit);
        assert!(text.contains(".class public B\n.super A\n"));
        assert!(text.contains(".field public xs [I\n"));
        assert!(text.contains(".field public next LB;\n"));
        assert!(text.contains("invokespecial   A/<init>()V\n"));
    }

    #[test]
    fn method_limits_and_labels() {
        let unit = Unit::Class(Class {
            name: Identifier::from("A"),
            extends: None,
            fields: vec![],
            methods: vec![Method {
                name: Identifier::from("m"),
                formals: vec![Type::Int, Type::IntArray],
                returns: Type::Int,
                locals: 3,
                instructions: vec![
                    Instruction::Label(Label(4)),
                    Instruction::Iload(1),
                    Instruction::Ireturn,
                ],
            }],
        });

        let text = render(&unit);
        assert!(text.contains(".super java/lang/Object\n"));
        assert!(text.contains(".method public m(I[I)I\n.limit stack 4096\n.limit locals 3\n"));
        assert!(text.contains("L_4:\n\tiload           1\n\tireturn\n.end method\n"));
    }
}
