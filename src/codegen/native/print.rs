//! Escritura de la unidad de traducción en C.
//!
//! El orden de salida es fijo: declaraciones del runtime, estructuras,
//! firmas de métodos, tipos de tablas virtuales, instancias de tablas
//! virtuales, métodos (cada uno precedido por sus mapas y su marco) y
//! finalmente `Tiger_main`.
//!
//! El recolector recorre objetos y marcos avanzando `sizeof(int)` por
//! cada `'0'` de un mapa y `sizeof(void *)` por cada `'1'`, sin relleno.
//! Por eso las estructuras de objetos y de marcos se declaran empacadas.
//! Todo símbolo generado tiene enlace interno, salvo `Tiger_main`.

use std::{
    fmt::Display,
    io::{self, Write},
};

use super::ir::{
    Expr, Global, MainMethod, Member, Method, Program, Slot, Stmt, Struct, Temp, Type, Vtable,
};
use crate::{ast::BinOp, lex::Identifier};

const HEADER: &str = "// This is automatically generated by the minijavac compiler.\n// Do NOT modify!";

/// Encabezado común de todo objeto, tal como lo define el runtime.
const OBJECT_HEADER: &str = "struct Tiger_object_header
{
  void *vptr;
  int isObjOrArray;
  unsigned length;
  void *forwarding;
};";

const RUNTIME: &str = "extern void *prev;
void *Tiger_new(void *vtable, int size);
void *Tiger_new_array(int length);
int System_out_println(int i);";

const PACKED: &str = "__attribute__((packed))";

const INDENT: usize = 2;

/// Escribe un programa completo.
pub fn write<W: Write>(program: &Program, output: &mut W) -> io::Result<()> {
    writeln!(output, "{}\n", HEADER)?;

    writeln!(output, "// runtime")?;
    writeln!(output, "{}\n", OBJECT_HEADER)?;
    writeln!(output, "{}\n", RUNTIME)?;

    writeln!(output, "// structures")?;
    for class in &program.structs {
        writeln!(output, "struct {};", Global(&class.class))?;
        writeln!(output, "struct {}_vtable;", Global(&class.class))?;
    }

    writeln!(output)?;
    for class in &program.structs {
        write_struct(class, output)?;
    }

    writeln!(output, "// method signatures")?;
    for method in &program.methods {
        write!(output, "static ")?;
        write_signature(method, output)?;
        writeln!(output, ";")?;
    }

    writeln!(output, "\n// vtable structures")?;
    for vtable in &program.vtables {
        write_vtable_struct(vtable, output)?;
    }

    writeln!(output, "// vtables")?;
    for vtable in &program.vtables {
        write_vtable(vtable, output)?;
    }

    writeln!(output, "// methods")?;
    for method in &program.methods {
        write_method(method, output)?;
    }

    writeln!(output, "// main method")?;
    write_main(&program.main, output)
}

fn write_struct<W: Write>(class: &Struct, output: &mut W) -> io::Result<()> {
    let name = Global(&class.class);

    writeln!(output, "struct {} {}\n{{", PACKED, name)?;
    writeln!(output, "  struct {}_vtable *vptr;", name)?;
    writeln!(output, "  int isObjOrArray;")?;
    writeln!(output, "  unsigned length;")?;
    writeln!(output, "  void *forwarding;")?;

    for (field, typ) in &class.fields {
        writeln!(output, "  {};", declaration(typ, Member(field)))?;
    }

    writeln!(output, "}};\n")?;

    // `Tiger_new` agrega el encabezado y rechaza tamaños no positivos
    if class.fields.is_empty() {
        writeln!(output, "static const int {}_size_ = sizeof(void *);\n", name)
    } else {
        writeln!(
            output,
            "static const int {0}_size_ = sizeof(struct {0}) - sizeof(struct Tiger_object_header);\n",
            name
        )
    }
}

fn write_signature<W: Write>(method: &Method, output: &mut W) -> io::Result<()> {
    let this = Type::Class(method.class.clone());

    write!(
        output,
        "{}(",
        declaration(&method.returns, method.symbol())
    )?;

    write!(output, "{}", declaration(&this, "this"))?;
    for (formal, typ) in &method.formals {
        write!(output, ", {}", declaration(typ, Member(formal)))?;
    }

    write!(output, ")")
}

/// Tipo de puntero a función de una entrada de la tabla virtual.
fn slot_type(class: &Identifier, slot: &Slot, name: impl Display) -> String {
    let mut parameters = Type::Class(class.clone()).to_string();
    for formal in &slot.formals {
        parameters.push_str(", ");
        parameters.push_str(&formal.to_string());
    }

    let returns = slot.returns.to_string();
    let separator = if returns.ends_with('*') { "" } else { " " };

    format!("{}{}(*{})({})", returns, separator, name, parameters)
}

fn write_vtable_struct<W: Write>(vtable: &Vtable, output: &mut W) -> io::Result<()> {
    writeln!(output, "struct {}_vtable\n{{", Global(&vtable.class))?;
    writeln!(output, "  char *class_gc_map;")?;

    for slot in &vtable.slots {
        writeln!(
            output,
            "  {};",
            slot_type(&vtable.class, slot, Member(&slot.method))
        )?;
    }

    writeln!(output, "}};\n")
}

fn write_vtable<W: Write>(vtable: &Vtable, output: &mut W) -> io::Result<()> {
    writeln!(
        output,
        "static struct {0}_vtable {0}_vtable_ =\n{{",
        Global(&vtable.class)
    )?;

    writeln!(output, "  \"{}\",", vtable.gc_map)?;
    for slot in &vtable.slots {
        let implementation = format!("{}_{}", Global(&slot.implementor), Global(&slot.method));
        if slot.implementor == vtable.class {
            writeln!(output, "  {},", implementation)?;
        } else {
            // La implementación heredada espera un `this` del ancestro
            writeln!(
                output,
                "  ({}){},",
                slot_type(&vtable.class, slot, ""),
                implementation
            )?;
        }
    }

    writeln!(output, "}};\n")
}

fn write_method<W: Write>(method: &Method, output: &mut W) -> io::Result<()> {
    let symbol = method.symbol();
    let frame = format!("{}_gc_frame", symbol);

    writeln!(
        output,
        "static char *{}_arguments_gc_map = \"{}\";",
        symbol, method.arguments_gc_map
    )?;

    writeln!(
        output,
        "static char *{}_locals_gc_map = \"{}\";\n",
        symbol, method.locals_gc_map
    )?;

    writeln!(output, "struct {} {}\n{{", PACKED, frame)?;
    writeln!(output, "  void *prev;")?;
    writeln!(output, "  int *arguments_base_address;")?;
    writeln!(output, "  char *arguments_gc_map;")?;
    writeln!(output, "  char *locals_gc_map;")?;
    for (local, typ) in &method.locals {
        writeln!(output, "  {};", declaration(typ, Member(local)))?;
    }

    writeln!(output, "}};\n")?;

    write!(output, "static ")?;
    write_signature(method, output)?;
    writeln!(output, "\n{{")?;
    writeln!(output, "  struct {} __frame;", frame)?;
    write_temps(&method.temps, output)?;
    writeln!(output, "  {};\n", declaration(&method.returns, "__result"))?;

    writeln!(output, "  __frame.prev = prev;")?;
    writeln!(output, "  prev = &__frame;")?;
    writeln!(output, "  __frame.arguments_base_address = (int *)&this;")?;
    writeln!(output, "  __frame.arguments_gc_map = {}_arguments_gc_map;", symbol)?;
    writeln!(output, "  __frame.locals_gc_map = {}_locals_gc_map;", symbol)?;
    for (local, _) in &method.locals {
        writeln!(output, "  __frame.{} = 0;", Member(local))?;
    }

    writeln!(output)?;
    for statement in &method.body {
        write_stmt(statement, INDENT, output)?;
    }

    writeln!(output, "  __result = {};", Render(&method.result))?;
    writeln!(output, "  prev = __frame.prev;")?;
    writeln!(output, "  return __result;")?;
    writeln!(output, "}}\n")
}

fn write_main<W: Write>(main: &MainMethod, output: &mut W) -> io::Result<()> {
    writeln!(output, "int Tiger_main()\n{{")?;
    write_temps(&main.temps, output)?;
    if !main.temps.is_empty() {
        writeln!(output)?;
    }

    write_stmt(&main.body, INDENT, output)?;
    writeln!(output, "  return 0;")?;
    writeln!(output, "}}")
}

fn write_temps<W: Write>(temps: &[(Temp, Type)], output: &mut W) -> io::Result<()> {
    for (temp, typ) in temps {
        writeln!(output, "  {};", declaration(typ, temp))?;
    }

    Ok(())
}

fn write_stmt<W: Write>(statement: &Stmt, indent: usize, output: &mut W) -> io::Result<()> {
    let pad = " ".repeat(indent);

    match statement {
        Stmt::Block(statements) => {
            writeln!(output, "{}{{", pad)?;
            for statement in statements {
                write_stmt(statement, indent + INDENT, output)?;
            }

            writeln!(output, "{}}}", pad)
        }

        Stmt::If {
            condition,
            then,
            otherwise,
        } => {
            writeln!(output, "{}if ({})", pad, Render(condition))?;
            write_branch(then, indent, output)?;
            writeln!(output, "{}else", pad)?;
            write_branch(otherwise, indent, output)
        }

        Stmt::While { condition, body } => {
            writeln!(output, "{}while ({})", pad, Render(condition))?;
            write_branch(body, indent, output)
        }

        Stmt::Print(value) => writeln!(output, "{}System_out_println({});", pad, Render(value)),

        Stmt::Assign { place, value } => {
            writeln!(output, "{}{} = {};", pad, place, Render(value))
        }

        Stmt::AssignArray {
            place,
            index,
            value,
        } => writeln!(
            output,
            "{}{}[{}] = {};",
            pad,
            place,
            Render(index),
            Render(value)
        ),
    }
}

/// Los bloques conservan la indentación del control que los contiene.
fn write_branch<W: Write>(statement: &Stmt, indent: usize, output: &mut W) -> io::Result<()> {
    match statement {
        Stmt::Block(_) => write_stmt(statement, indent, output),
        _ => write_stmt(statement, indent + INDENT, output),
    }
}

/// Declaración de C de una variable con un tipo.
fn declaration(typ: &Type, name: impl Display) -> String {
    match typ {
        Type::Int => format!("int {}", name),
        _ => format!("{}{}", typ, name),
    }
}

/// Expresión de C con los paréntesis mínimos necesarios.
struct Render<'a>(&'a Expr);

impl Display for Render<'_> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        render(self.0, fmt)
    }
}

/// Precedencia de C. Mayor número, mayor prioridad.
fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary(_, op, _) => match op {
            BinOp::And => 4,
            BinOp::Less => 9,
            BinOp::Add | BinOp::Sub => 11,
            BinOp::Mul => 12,
        },

        Expr::Not(_) => 14,
        Expr::Index { .. } => 15,
        _ => 16,
    }
}

fn operand(expr: &Expr, minimum: u8, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if precedence(expr) < minimum {
        fmt.write_str("(")?;
        render(expr, fmt)?;
        fmt.write_str(")")
    } else {
        render(expr, fmt)
    }
}

fn render(expr: &Expr, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match expr {
        Expr::Int(integer) => write!(fmt, "{}", integer),
        Expr::This => fmt.write_str("this"),
        Expr::Read(place) => write!(fmt, "{}", place),

        Expr::Binary(lhs, op, rhs) => {
            let level = precedence(expr);
            operand(lhs, level, fmt)?;
            write!(fmt, " {} ", op)?;
            operand(rhs, level + 1, fmt)
        }

        Expr::Not(operand_expr) => {
            fmt.write_str("!")?;
            operand(operand_expr, 14, fmt)
        }

        Expr::Index { array, index } => {
            operand(array, 15, fmt)?;
            write!(fmt, "[{}]", Render(index))
        }

        Expr::Length(array) => write!(
            fmt,
            "((int)(((struct Tiger_object_header *)({})) - 1)->length)",
            Render(array)
        ),

        Expr::Call {
            temp,
            receiver,
            method,
            arguments,
        } => {
            write!(
                fmt,
                "({} = {}, {}->vptr->{}({}",
                temp,
                Render(receiver),
                temp,
                Member(method),
                temp
            )?;
            for argument in arguments {
                write!(fmt, ", {}", Render(argument))?;
            }

            fmt.write_str("))")
        }

        Expr::NewArray(length) => write!(fmt, "((int *)Tiger_new_array({}))", Render(length)),

        Expr::NewObject(class) => write!(
            fmt,
            "((struct {0} *)(Tiger_new(&{0}_vtable_, {0}_size_)))",
            Global(class)
        ),

        Expr::Cast(typ, value) => write!(fmt, "(({})({}))", typ, Render(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: i32) -> Box<Expr> {
        Box::new(Expr::Int(value))
    }

    #[test]
    fn minimal_parentheses() {
        let sum = Expr::Binary(int(1), BinOp::Add, int(2));
        let product = Expr::Binary(Box::new(sum), BinOp::Mul, int(3));
        assert_eq!(Render(&product).to_string(), "(1 + 2) * 3");

        let difference = Expr::Binary(int(1), BinOp::Sub, int(2));
        let nested = Expr::Binary(int(5), BinOp::Sub, Box::new(difference));
        assert_eq!(Render(&nested).to_string(), "5 - (1 - 2)");

        let less = Expr::Binary(int(1), BinOp::Less, int(2));
        assert_eq!(Render(&Expr::Not(Box::new(less))).to_string(), "!(1 < 2)");
    }

    #[test]
    fn declarations() {
        let class = Type::Class(Identifier::from("A"));
        assert_eq!(declaration(&Type::Int, "x"), "int x");
        assert_eq!(declaration(&Type::IntArray, "xs"), "int *xs");
        assert_eq!(declaration(&class, "a"), "struct A *a");
    }

    #[test]
    fn inherited_slot_type() {
        let slot = Slot {
            method: Identifier::from("m"),
            implementor: Identifier::from("A"),
            returns: Type::IntArray,
            formals: vec![Type::Int],
        };

        assert_eq!(
            slot_type(&Identifier::from("B"), &slot, "m"),
            "int *(*m)(struct B *, int)"
        );

        assert_eq!(
            slot_type(&Identifier::from("B"), &slot, ""),
            "int *(*)(struct B *, int)"
        );
    }
}
