//! Árbol sintáctico abstracto.
//!
//! El parser construye este árbol una única vez y nunca se modifica
//! estructuralmente después de ello. La elaboración ([`crate::semantic`])
//! solamente completa los campos de anotación (`typ`, `access`, `resolved`),
//! los cuales se encuentran vacíos al salir del parser. Los back ends
//! consumen el árbol anotado y derivan sus propias representaciones.

use std::fmt::{self, Display};

use crate::{lex::Identifier, source::Located};

/// Un programa completo: clase principal y demás clases, en orden.
#[derive(Debug)]
pub struct Program {
    pub main: MainClass,
    pub classes: Vec<Class>,
}

/// Clase que contiene el método estático `main`.
#[derive(Debug)]
pub struct MainClass {
    pub name: Located<Identifier>,
    pub argument: Located<Identifier>,
    pub body: Statement,
}

#[derive(Debug)]
pub struct Class {
    pub name: Located<Identifier>,
    pub extends: Option<Located<Identifier>>,
    pub fields: Vec<Declaration>,
    pub methods: Vec<Method>,
}

/// Declaración de campo, parámetro formal o variable local.
#[derive(Debug)]
pub struct Declaration {
    pub name: Located<Identifier>,
    pub of: Located<Type>,
}

#[derive(Debug)]
pub struct Method {
    pub name: Located<Identifier>,
    pub returns: Located<Type>,
    pub formals: Vec<Declaration>,
    pub locals: Vec<Declaration>,
    pub body: Vec<Statement>,
    pub result: Located<Expr>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Boolean,
    IntArray,
    Class(Identifier),
}

impl Type {
    /// Determina si los valores de este tipo son referencias a heap.
    pub fn is_reference(&self) -> bool {
        matches!(self, Type::IntArray | Type::Class(_))
    }
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => fmt.write_str("int"),
            Type::Boolean => fmt.write_str("boolean"),
            Type::IntArray => fmt.write_str("int[]"),
            Type::Class(name) => write!(fmt, "{}", name),
        }
    }
}

#[derive(Debug)]
pub enum Statement {
    Block(Vec<Statement>),

    If {
        condition: Located<Expr>,
        then: Box<Statement>,
        otherwise: Box<Statement>,
    },

    While {
        condition: Located<Expr>,
        body: Box<Statement>,
    },

    Print(Located<Expr>),

    Assign {
        target: Variable,
        value: Located<Expr>,
    },

    AssignArray {
        target: Variable,
        index: Located<Expr>,
        value: Located<Expr>,
    },
}

/// Uso de un identificador como variable, ya sea lectura o destino.
#[derive(Debug)]
pub struct Variable {
    pub name: Located<Identifier>,

    /// Tipo declarado, anotado durante elaboración.
    pub typ: Option<Type>,

    /// Local o campo, anotado durante elaboración.
    pub access: Option<Access>,
}

impl Variable {
    pub fn new(name: Located<Identifier>) -> Self {
        Variable {
            name,
            typ: None,
            access: None,
        }
    }
}

/// Forma en que se resolvió un identificador.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    /// Parámetro formal o variable local del método actual.
    Local,

    /// Campo de la clase actual o de alguno de sus ancestros.
    Field,
}

/// Una expresión junto a su tipo resuelto.
#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,

    /// Anotado durante elaboración.
    pub typ: Option<Type>,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr { kind, typ: None }
    }
}

#[derive(Debug)]
pub enum ExprKind {
    Integer(i32),
    True,
    False,
    This,
    Read(Variable),
    Binary(Box<Located<Expr>>, BinOp, Box<Located<Expr>>),
    Not(Box<Located<Expr>>),
    Index {
        array: Box<Located<Expr>>,
        index: Box<Located<Expr>>,
    },
    Length(Box<Located<Expr>>),
    Call(Box<Call>),
    NewArray(Box<Located<Expr>>),
    NewObject(Located<Identifier>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Less,
    And,
}

impl Display for BinOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Less => "<",
            BinOp::And => "&&",
        };

        fmt.write_str(symbol)
    }
}

/// Invocación de método, `receiver.method(arguments)`.
#[derive(Debug)]
pub struct Call {
    pub receiver: Located<Expr>,
    pub method: Located<Identifier>,
    pub arguments: Vec<Located<Expr>>,

    /// Anotado durante elaboración.
    pub resolved: Option<Resolved>,
}

/// Información de una llamada, resuelta durante elaboración.
///
/// Los back ends reducen la llamada únicamente a partir de esto,
/// sin volver a consultar la tabla de clases.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    /// Clase estática del receptor.
    pub class: Identifier,

    /// Tipos de los argumentos reales, en orden.
    pub arguments: Vec<Type>,

    /// Tipos de los parámetros formales del método encontrado.
    pub formals: Vec<Type>,

    /// Tipo de retorno del método encontrado.
    pub returns: Type,
}
