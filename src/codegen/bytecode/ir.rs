//! Representación de bytecode.
//!
//! Cada instrucción corresponde a exactamente una línea del ensamblador
//! final, con la excepción de [`Instruction::New`] y
//! [`Instruction::Print`], que expanden a secuencias fijas.

use std::fmt::{self, Display};

use crate::{ast, lex::Identifier};

/// Tipos de la máquina de pila. Los booleanos son enteros.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Int,
    IntArray,
    Class(Identifier),
}

impl Type {
    pub fn is_reference(&self) -> bool {
        !matches!(self, Type::Int)
    }
}

impl From<&ast::Type> for Type {
    fn from(typ: &ast::Type) -> Self {
        match typ {
            ast::Type::Int | ast::Type::Boolean => Type::Int,
            ast::Type::IntArray => Type::IntArray,
            ast::Type::Class(class) => Type::Class(class.clone()),
        }
    }
}

/// Descriptor de tipo.
impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => fmt.write_str("I"),
            Type::IntArray => fmt.write_str("[I"),
            Type::Class(class) => write!(fmt, "L{};", class),
        }
    }
}

/// Destino simbólico de saltos, único en toda la traducción.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl Display for Label {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "L_{}", self.0)
    }
}

/// Firma completa de un método, tal como la requiere `invokevirtual`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub class: Identifier,
    pub method: Identifier,
    pub formals: Vec<Type>,
    pub returns: Type,
}

impl Display for Signature {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}/{}(", self.class, self.method)?;
        for formal in &self.formals {
            write!(fmt, "{}", formal)?;
        }

        write!(fmt, "){}", self.returns)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Aload(u32),
    Astore(u32),
    Iload(u32),
    Istore(u32),
    Ldc(i32),
    Iadd,
    Isub,
    Imul,
    Iand,
    Iaload,
    Iastore,
    Arraylength,
    NewArray,
    New(Identifier),
    Getfield(Identifier, Identifier, Type),
    Putfield(Identifier, Identifier, Type),
    Goto(Label),
    Ifne(Label),
    Ifeq(Label),
    IfIcmplt(Label),
    Label(Label),
    Invokevirtual(Signature),
    Ireturn,
    Areturn,
    Print,
}

impl Instruction {
    /// Etiqueta a la cual esta instrucción puede saltar.
    pub fn target(&self) -> Option<Label> {
        match self {
            Instruction::Goto(label)
            | Instruction::Ifne(label)
            | Instruction::Ifeq(label)
            | Instruction::IfIcmplt(label) => Some(*label),

            _ => None,
        }
    }
}

/// Unidad de salida: un archivo por clase.
#[derive(Debug)]
pub enum Unit {
    Main(MainClass),
    Class(Class),
}

impl Unit {
    pub fn name(&self) -> &Identifier {
        match self {
            Unit::Main(main) => &main.name,
            Unit::Class(class) => &class.name,
        }
    }
}

#[derive(Debug)]
pub struct MainClass {
    pub name: Identifier,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug)]
pub struct Class {
    pub name: Identifier,
    pub extends: Option<Identifier>,
    pub fields: Vec<(Identifier, Type)>,
    pub methods: Vec<Method>,
}

#[derive(Debug)]
pub struct Method {
    pub name: Identifier,
    pub formals: Vec<Type>,
    pub returns: Type,

    /// Cantidad de slots, incluyendo la instancia en el slot 0.
    pub locals: u32,

    pub instructions: Vec<Instruction>,
}
