//! Back end nativo.
//!
//! Produce una única unidad de traducción en C que se enlaza contra
//! el runtime con recolector de copia. Cada clase se reduce a una
//! estructura cuyo encabezado coincide con el encabezado de objeto del
//! runtime, seguido de los campos heredados y luego los propios. Cada
//! clase tiene además una tabla virtual cuya primera entrada es el mapa
//! de referencias de sus campos.
//!
//! # Marcos de recolección
//! Cada método declara un marco propio que se enlaza a una pila
//! sombra global (`prev`) al entrar y se desenlaza justo antes de
//! retornar. El marco contiene el mapa de referencias de los
//! argumentos, el de las locales y las locales mismas, de modo que el
//! recolector pueda actualizar toda referencia viva tras mover un
//! objeto. Los temporales de llamadas no forman parte del marco.

use std::collections::HashSet;

use indexmap::IndexMap;

use super::Lowering;
use crate::{
    ast::{self, Access, ExprKind, Statement},
    lex::Identifier,
    source::Located,
};

pub mod ir;
mod print;

pub use ir::{
    Expr, GcMap, MainMethod, Method, Place, Program, Slot, Stmt, Struct, Temp, Type, Vtable,
};
pub use print::write;

/// Traduce un programa anotado a una unidad de C.
pub fn translate(program: &ast::Program) -> Lowering<Program> {
    let index = super::class_index(program);

    let mut structs = Vec::new();
    let mut vtables = Vec::new();
    for name in index.keys() {
        let lineage = super::lineage(&index, name)?;

        let layout = flatten_fields(&lineage);
        let slots = flatten_methods(&lineage);
        log::trace!(
            "class {} has {} fields and {} virtual slots",
            name,
            layout.len(),
            slots.len()
        );

        vtables.push(Vtable {
            class: name.clone(),
            gc_map: GcMap::of(layout.iter().map(|(_, typ)| typ)),
            slots,
        });

        structs.push(Struct {
            class: name.clone(),
            fields: layout,
        });
    }

    let mut methods = Vec::new();
    for class in &program.classes {
        log::debug!("translating class {} to C", class.name.as_ref());
        for method in &class.methods {
            methods.push(translate_method(class.name.as_ref(), method)?);
        }
    }

    log::debug!("translating main class {} to C", program.main.name.as_ref());
    let mut lowerer = Lowerer::default();
    let body = lowerer.statement(&program.main.body)?;

    let main = MainMethod {
        temps: lowerer.temps,
        body,
    };

    Ok(Program {
        structs,
        vtables,
        methods,
        main,
    })
}

/// Campos de la raíz hacia la clase.
///
/// Un campo redeclarado en una subclase conserva la posición del
/// ancestro y toma el tipo más derivado.
fn flatten_fields(lineage: &[&ast::Class]) -> Vec<(Identifier, Type)> {
    let mut fields = IndexMap::new();
    for class in lineage {
        for field in &class.fields {
            fields.insert(field.name.as_ref().clone(), Type::from(field.of.as_ref()));
        }
    }

    fields.into_iter().collect()
}

/// Entradas de la tabla virtual de la raíz hacia la clase.
///
/// Redefinir un método reemplaza la entrada en su misma posición.
fn flatten_methods(lineage: &[&ast::Class]) -> Vec<Slot> {
    let mut slots = IndexMap::new();
    for class in lineage {
        for method in &class.methods {
            let slot = Slot {
                method: method.name.as_ref().clone(),
                implementor: class.name.as_ref().clone(),
                returns: Type::from(method.returns.as_ref()),
                formals: method
                    .formals
                    .iter()
                    .map(|formal| Type::from(formal.of.as_ref()))
                    .collect(),
            };

            slots.insert(method.name.as_ref().clone(), slot);
        }
    }

    slots.into_values().collect()
}

fn translate_method(class: &Identifier, method: &ast::Method) -> Lowering<Method> {
    let declarations = |declarations: &[ast::Declaration]| {
        declarations
            .iter()
            .map(|declaration| {
                (
                    declaration.name.as_ref().clone(),
                    Type::from(declaration.of.as_ref()),
                )
            })
            .collect::<Vec<_>>()
    };

    let formals = declarations(&method.formals);
    let locals = declarations(&method.locals);

    let mut lowerer = Lowerer {
        formals: formals.iter().map(|(name, _)| name.clone()).collect(),
        ..Default::default()
    };

    let body = method
        .body
        .iter()
        .map(|statement| lowerer.statement(statement))
        .collect::<Lowering<_>>()?;

    let returns = Type::from(method.returns.as_ref());
    let result = lowerer.coerce(&method.result, &returns)?;

    let this = Type::Class(class.clone());
    let arguments_gc_map = GcMap::of(std::iter::once(&this).chain(formals.iter().map(|(_, typ)| typ)));
    let locals_gc_map = GcMap::of(locals.iter().map(|(_, typ)| typ));

    Ok(Method {
        class: class.clone(),
        name: method.name.as_ref().clone(),
        returns,
        formals,
        locals,
        temps: lowerer.temps,
        arguments_gc_map,
        locals_gc_map,
        body,
        result,
    })
}

#[derive(Default)]
struct Lowerer {
    /// Nombres de parámetros formales del método actual.
    formals: HashSet<Identifier>,

    temps: Vec<(Temp, Type)>,
}

impl Lowerer {
    fn temp(&mut self, typ: Type) -> Temp {
        let temp = Temp(self.temps.len() as u32);
        self.temps.push((temp, typ));
        temp
    }

    fn place(&self, variable: &ast::Variable) -> Lowering<Place> {
        let (_, access) = super::variable(variable)?;
        let name = variable.name.as_ref().clone();

        Ok(match access {
            Access::Field => Place::Field(name),
            Access::Local if self.formals.contains(&name) => Place::Formal(name),
            Access::Local => Place::Local(name),
        })
    }

    fn statement(&mut self, statement: &Statement) -> Lowering<Stmt> {
        let statement = match statement {
            Statement::Block(statements) => Stmt::Block(
                statements
                    .iter()
                    .map(|statement| self.statement(statement))
                    .collect::<Lowering<_>>()?,
            ),

            Statement::If {
                condition,
                then,
                otherwise,
            } => Stmt::If {
                condition: self.expr(condition)?,
                then: Box::new(self.statement(then)?),
                otherwise: Box::new(self.statement(otherwise)?),
            },

            Statement::While { condition, body } => Stmt::While {
                condition: self.expr(condition)?,
                body: Box::new(self.statement(body)?),
            },

            Statement::Print(value) => Stmt::Print(self.expr(value)?),

            Statement::Assign { target, value } => Stmt::Assign {
                place: self.place(target)?,
                value: self.expr(value)?,
            },

            Statement::AssignArray {
                target,
                index,
                value,
            } => Stmt::AssignArray {
                place: self.place(target)?,
                index: self.expr(index)?,
                value: self.expr(value)?,
            },
        };

        Ok(statement)
    }

    /// Reduce una expresión, convirtiendo punteros de clase si difieren.
    fn coerce(&mut self, expr: &Located<ast::Expr>, expected: &Type) -> Lowering<Expr> {
        let found = Type::from(super::typ(expr)?);
        let lowered = self.expr(expr)?;

        Ok(match (&found, expected) {
            (Type::Class(_), Type::Class(_)) if found != *expected => {
                Expr::Cast(expected.clone(), Box::new(lowered))
            }

            _ => lowered,
        })
    }

    fn expr(&mut self, expr: &Located<ast::Expr>) -> Lowering<Expr> {
        let lowered = match &expr.val().kind {
            ExprKind::Integer(integer) => Expr::Int(*integer),
            ExprKind::True => Expr::Int(1),
            ExprKind::False => Expr::Int(0),
            ExprKind::This => Expr::This,
            ExprKind::Read(variable) => Expr::Read(self.place(variable)?),

            ExprKind::Binary(lhs, op, rhs) => {
                Expr::Binary(Box::new(self.expr(lhs)?), *op, Box::new(self.expr(rhs)?))
            }

            ExprKind::Not(operand) => Expr::Not(Box::new(self.expr(operand)?)),

            ExprKind::Index { array, index } => Expr::Index {
                array: Box::new(self.expr(array)?),
                index: Box::new(self.expr(index)?),
            },

            ExprKind::Length(array) => Expr::Length(Box::new(self.expr(array)?)),
            ExprKind::NewArray(length) => Expr::NewArray(Box::new(self.expr(length)?)),
            ExprKind::NewObject(class) => Expr::NewObject(class.as_ref().clone()),

            ExprKind::Call(call) => {
                let resolved = super::resolved(call)?;
                let temp = self.temp(Type::Class(resolved.class.clone()));

                let receiver = Box::new(self.expr(&call.receiver)?);
                let arguments = call
                    .arguments
                    .iter()
                    .zip(&resolved.formals)
                    .map(|(argument, formal)| self.coerce(argument, &Type::from(formal)))
                    .collect::<Lowering<_>>()?;

                Expr::Call {
                    temp,
                    receiver,
                    method: call.method.as_ref().clone(),
                    arguments,
                }
            }
        };

        Ok(lowered)
    }
}
