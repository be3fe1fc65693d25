//! Representación intermedia del back end nativo.
//!
//! Es un árbol procedural plano: las clases ya se aplanaron a
//! estructuras, los métodos son funciones con `this` explícito y toda
//! variable ya se clasificó como campo, parámetro o local del marco.

use std::fmt::{self, Display};

use crate::{ast::BinOp, lex::Identifier};

/// Tipos de C. Los booleanos son enteros.
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

impl From<&crate::ast::Type> for Type {
    fn from(typ: &crate::ast::Type) -> Self {
        use crate::ast::Type as Source;

        match typ {
            Source::Int | Source::Boolean => Type::Int,
            Source::IntArray => Type::IntArray,
            Source::Class(class) => Type::Class(class.clone()),
        }
    }
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => fmt.write_str("int"),
            Type::IntArray => fmt.write_str("int *"),
            Type::Class(class) => write!(fmt, "struct {} *", Global(class)),
        }
    }
}

/// Parte de un símbolo global de C derivada de un identificador.
///
/// Todo `_` se duplica. Los símbolos se forman uniendo partes con un
/// único `_`, así que dos símbolos distintos nunca coinciden y ninguno
/// toma el nombre de un símbolo del runtime.
pub struct Global<'a>(pub &'a Identifier);

impl Display for Global<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = self.0.as_ref().split('_');
        if let Some(first) = parts.next() {
            fmt.write_str(first)?;
        }

        for part in parts {
            write!(fmt, "__{}", part)?;
        }

        Ok(())
    }
}

/// Variable, campo o entrada de tabla virtual derivada de un identificador.
///
/// Los identificadores del programa inician con letra, por lo que el
/// prefijo `_` los separa de `prev`, `this`, los miembros de encabezados
/// y los nombres internos que inician con `__`.
pub struct Member<'a>(pub &'a Identifier);

impl Display for Member<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "_{}", self.0)
    }
}

/// Mapa de referencias para el recolector: `'1'` por cada referencia.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcMap(pub Vec<bool>);

impl GcMap {
    pub fn of<'a, I>(types: I) -> Self
    where
        I: IntoIterator<Item = &'a Type>,
    {
        GcMap(types.into_iter().map(Type::is_reference).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for GcMap {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &reference in &self.0 {
            fmt.write_str(if reference { "1" } else { "0" })?;
        }

        Ok(())
    }
}

/// Variable temporal, declarada como local de C fuera del marco.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Temp(pub u32);

impl Display for Temp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "__t{}", self.0)
    }
}

#[derive(Debug)]
pub struct Program {
    pub structs: Vec<Struct>,
    pub vtables: Vec<Vtable>,
    pub methods: Vec<Method>,
    pub main: MainMethod,
}

/// Disposición de un objeto, con los campos heredados primero.
#[derive(Debug)]
pub struct Struct {
    pub class: Identifier,
    pub fields: Vec<(Identifier, Type)>,
}

/// Tabla virtual de una clase.
#[derive(Debug)]
pub struct Vtable {
    pub class: Identifier,

    /// Referencias entre los campos de [`Struct::fields`].
    pub gc_map: GcMap,

    pub slots: Vec<Slot>,
}

/// Entrada de una tabla virtual.
#[derive(Debug, PartialEq, Eq)]
pub struct Slot {
    pub method: Identifier,

    /// Clase que provee la implementación.
    pub implementor: Identifier,

    pub returns: Type,
    pub formals: Vec<Type>,
}

#[derive(Debug)]
pub struct Method {
    pub class: Identifier,
    pub name: Identifier,
    pub returns: Type,
    pub formals: Vec<(Identifier, Type)>,
    pub locals: Vec<(Identifier, Type)>,
    pub temps: Vec<(Temp, Type)>,

    /// Instancia seguida de los parámetros formales.
    pub arguments_gc_map: GcMap,

    pub locals_gc_map: GcMap,

    pub body: Vec<Stmt>,
    pub result: Expr,
}

impl Method {
    /// Prefijo de todos los símbolos generados para este método.
    pub fn symbol(&self) -> String {
        format!("{}_{}", Global(&self.class), Global(&self.name))
    }
}

#[derive(Debug)]
pub struct MainMethod {
    pub temps: Vec<(Temp, Type)>,
    pub body: Stmt,
}

#[derive(Debug)]
pub enum Stmt {
    Block(Vec<Stmt>),

    If {
        condition: Expr,
        then: Box<Stmt>,
        otherwise: Box<Stmt>,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
    },

    Print(Expr),

    Assign {
        place: Place,
        value: Expr,
    },

    AssignArray {
        place: Place,
        index: Expr,
        value: Expr,
    },
}

/// Ubicación de una variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Place {
    /// Variable local, vive en el marco de recolección.
    Local(Identifier),

    /// Parámetro de la función de C.
    Formal(Identifier),

    /// Campo de `this`.
    Field(Identifier),
}

impl Display for Place {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::Local(name) => write!(fmt, "__frame.{}", Member(name)),
            Place::Formal(name) => write!(fmt, "{}", Member(name)),
            Place::Field(name) => write!(fmt, "this->{}", Member(name)),
        }
    }
}

#[derive(Debug)]
pub enum Expr {
    Int(i32),
    This,
    Read(Place),
    Binary(Box<Expr>, BinOp, Box<Expr>),
    Not(Box<Expr>),
    Index {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Length(Box<Expr>),

    /// `(t = receiver, t->vptr->method(t, arguments...))`
    Call {
        temp: Temp,
        receiver: Box<Expr>,
        method: Identifier,
        arguments: Vec<Expr>,
    },

    NewArray(Box<Expr>),
    NewObject(Identifier),
    Cast(Type, Box<Expr>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(name: &str) -> String {
        Global(&Identifier::from(name)).to_string()
    }

    #[test]
    fn globals_double_underscores() {
        assert_eq!(global("Fac"), "Fac");
        assert_eq!(global("new_array"), "new__array");
        assert_eq!(global("a__b_"), "a____b__");

        let method = |class: &str, name: &str| format!("{}_{}", global(class), global(name));
        assert_ne!(method("A_b", "c"), method("A", "b_c"));
        assert_ne!(method("Tiger", "new_array"), "Tiger_new_array");
    }

    #[test]
    fn places_are_prefixed() {
        let prev = || Identifier::from("prev");
        assert_eq!(Place::Local(prev()).to_string(), "__frame._prev");
        assert_eq!(Place::Formal(prev()).to_string(), "_prev");
        assert_eq!(Place::Field(prev()).to_string(), "this->_prev");
    }
}
