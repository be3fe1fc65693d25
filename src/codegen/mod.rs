//! Generación de código.
//!
//! Existen dos back ends independientes, ambos a partir del árbol
//! anotado que produce [`crate::semantic`]:
//!
//! - [`bytecode`]: ensamblador textual para una máquina de pila, una
//!   unidad por clase.
//! - [`native`]: una única unidad de traducción en C con despacho
//!   virtual explícito y marcos de pila para el recolector de basura.
//!
//! Cada back end construye sus propias tablas y su propia
//! representación intermedia. Nada se comparte entre ellos.
//!
//! Los errores de este módulo son [`Bug`]s: un programa que superó la
//! elaboración nunca debería producirlos.

use std::str::FromStr;

use indexmap::IndexMap;
use thiserror::Error;

use crate::{
    ast::{self, Call, Expr, Resolved, Type, Variable},
    lex::Identifier,
    source::Located,
};

pub mod bytecode;
pub mod native;

/// Sistema objetivo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Código C para enlazar contra el runtime con recolector.
    Native,

    /// Ensamblador para máquina de pila.
    Bytecode,
}

impl FromStr for Target {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        match string {
            "c" => Ok(Target::Native),
            "bytecode" => Ok(Target::Bytecode),
            _ => Err(()),
        }
    }
}

pub type Lowering<T> = Result<T, Bug>;

/// Falla interna de consistencia del compilador.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Bug {
    #[error("label {0} is referenced in `{1}` but never defined")]
    MissingLabelDefinition(String, String),

    #[error("label {0} is defined more than once in `{1}`")]
    DuplicateLabelDefinition(String, String),

    #[error("node at {0} was not annotated during elaboration")]
    MissingAnnotation(String),

    #[error("class `{0}` is absent from the back end's class table")]
    UnknownClass(Identifier),

    #[error("method `{0}.{1}` is absent from the back end's class table")]
    UnknownMethod(Identifier, Identifier),

    #[error("variable `{0}` has no assigned slot")]
    UnknownSlot(Identifier),

    #[error("inheritance cycle reached while flattening class `{0}`")]
    InheritanceCycle(Identifier),
}

/// Tipo anotado de una expresión.
fn typ(expr: &Located<Expr>) -> Lowering<&Type> {
    expr.val()
        .typ
        .as_ref()
        .ok_or_else(|| missing_annotation(expr))
}

/// Tipo y forma de acceso anotados de una variable.
fn variable(variable: &Variable) -> Lowering<(&Type, ast::Access)> {
    match (&variable.typ, variable.access) {
        (Some(typ), Some(access)) => Ok((typ, access)),
        _ => Err(missing_annotation(&variable.name)),
    }
}

/// Firma resuelta de una llamada.
fn resolved(call: &Call) -> Lowering<&Resolved> {
    call.resolved
        .as_ref()
        .ok_or_else(|| missing_annotation(&call.method))
}

fn missing_annotation<T>(node: &Located<T>) -> Bug {
    Bug::MissingAnnotation(node.location().to_string())
}

/// Clases del programa indexadas por nombre, en orden de declaración.
fn class_index(program: &ast::Program) -> IndexMap<Identifier, &ast::Class> {
    program
        .classes
        .iter()
        .map(|class| (class.name.as_ref().clone(), class))
        .collect()
}

/// Cadena de herencia de una clase, desde la raíz hasta la clase misma.
fn lineage<'a>(
    classes: &IndexMap<Identifier, &'a ast::Class>,
    class: &Identifier,
) -> Lowering<Vec<&'a ast::Class>> {
    let mut chain = Vec::new();
    let mut current = Some(class);

    while let Some(name) = current {
        let class = *classes
            .get(name)
            .ok_or_else(|| Bug::UnknownClass(name.clone()))?;

        if chain.len() >= classes.len() {
            return Err(Bug::InheritanceCycle(name.clone()));
        }

        chain.push(class);
        current = class.extends.as_ref().map(Located::as_ref);
    }

    chain.reverse();
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_names() {
        assert_eq!("c".parse::<Target>(), Ok(Target::Native));
        assert_eq!("bytecode".parse::<Target>(), Ok(Target::Bytecode));
        assert_eq!("jvm".parse::<Target>(), Err(()));
    }
}
