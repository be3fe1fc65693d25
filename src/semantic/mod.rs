//! Análisis semántico.
//!
//! La elaboración recibe el árbol que produce [`crate::parse`] y
//! construye primero la tabla de clases ([`symbols::ClassTable`]).
//! Luego recorre cada método resolviendo identificadores a variables
//! locales o campos y verificando tipos. El árbol no se reestructura:
//! únicamente se completan sus campos de anotación, de los cuales
//! dependen ambos back ends.
//!
//! Todo error es fatal. La elaboración se detiene en el primer error
//! encontrado y no existe modo de recuperación.

use bitflags::bitflags;
use thiserror::Error;

use crate::{
    ast::{
        Access, BinOp, Call, Class, Declaration, Expr, ExprKind, Method, Program, Resolved,
        Statement, Type, Variable,
    },
    lex::Identifier,
    source::{Located, Location},
};

pub mod symbols;

use symbols::{ClassTable, MethodTable, MethodType};

pub type Semantic<T> = Result<T, Located<SemanticError>>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("Class `{0}` is defined more than once")]
    DuplicateClass(Identifier),

    #[error("Class `{0}` already has a member named `{1}`")]
    DuplicateMember(Identifier, Identifier),

    #[error("Variable `{0}` is declared more than once in this method")]
    DuplicateVariable(Identifier),

    #[error("Symbol `{0}` is undefined")]
    UnresolvedName(Identifier),

    #[error("Type mismatch: expected `{0}`, found `{1}`")]
    TypeMismatch(Type, Type),

    #[error("Expected an object, found `{0}`")]
    ExpectedObject(Type),

    #[error("Method `{method}` takes {expected} argument(s), but {found} were supplied")]
    ArityMismatch {
        method: Identifier,
        expected: usize,
        found: usize,
    },

    #[error("Class `{0}` is part of an inheritance cycle")]
    InheritanceCycle(Identifier),

    #[error("`this` is not available inside the static main method")]
    StaticThis,
}

bitflags! {
    /// Tablas intermedias que se vuelcan al log durante elaboración.
    #[derive(Default)]
    pub struct Dump: u32 {
        const CLASS_TABLE = 1 << 0;
        const LOCALS      = 1 << 1;
        const TYPED_AST   = 1 << 2;
    }
}

/// Resultado de una elaboración exitosa.
#[derive(Debug)]
pub struct Elaborated {
    pub program: Program,
    pub classes: ClassTable,
}

impl Program {
    /// Construye la tabla de clases y anota el árbol.
    pub fn elaborate(mut self, dump: Dump) -> Semantic<Elaborated> {
        let classes = self.class_table()?;
        if dump.contains(Dump::CLASS_TABLE) {
            log::info!("class table:\n{}", classes);
        }

        annotate(&mut self, &classes, dump)?;
        Ok(Elaborated {
            program: self,
            classes,
        })
    }

    /// Construye y valida la tabla de clases de este programa.
    pub fn class_table(&self) -> Semantic<ClassTable> {
        let mut table = ClassTable::default();

        // Primera pasada: solo nombres, para admitir referencias adelantadas
        table.register_main(&self.main.name)?;
        for class in &self.classes {
            table.register(&class.name, class.extends.as_ref())?;
        }

        table.validate(|name| {
            self.classes
                .iter()
                .find(|class| class.name.as_ref() == name)
                .and_then(|class| class.extends.clone())
        })?;

        // Segunda pasada: miembros
        for class in &self.classes {
            let name = class.name.as_ref();
            for field in &class.fields {
                declared(&table, &field.of)?;
                table.add_field(name, field)?;
            }

            for method in &class.methods {
                declared(&table, &method.returns)?;
                for formal in &method.formals {
                    declared(&table, &formal.of)?;
                }

                let signature = MethodType {
                    returns: method.returns.as_ref().clone(),
                    formals: declaration_types(&method.formals).cloned().collect(),
                };

                table.add_method(name, &method.name, signature)?;
            }
        }

        log::debug!("class table built with {} classes", self.classes.len() + 1);
        Ok(table)
    }
}

/// Anota un programa contra una tabla de clases ya construida.
///
/// Todos los campos de anotación se sobrescriben, por lo cual volver
/// a anotar un árbol ya anotado produce exactamente lo mismo.
pub fn annotate(program: &mut Program, classes: &ClassTable, dump: Dump) -> Semantic<()> {
    let main = Context {
        classes,
        current: None,
        locals: MethodTable::default(),
    };

    log::debug!("elaborating main class {}", program.main.name.as_ref());
    main.statement(&mut program.main.body)?;

    for class in &mut program.classes {
        elaborate_class(class, classes, dump)?;
    }

    if dump.contains(Dump::TYPED_AST) {
        log::info!("typed AST:\n{:#?}", program);
    }

    Ok(())
}

fn elaborate_class(class: &mut Class, classes: &ClassTable, dump: Dump) -> Semantic<()> {
    log::debug!("elaborating class {}", class.name.as_ref());

    let name = class.name.as_ref();
    for method in &mut class.methods {
        let locals = method_table(method, classes)?;
        if dump.contains(Dump::LOCALS) {
            log::info!("locals of {}.{}:\n{}", name, method.name.as_ref(), locals);
        }

        let context = Context {
            classes,
            current: Some(name),
            locals,
        };

        context.method(method)?;
    }

    Ok(())
}

fn method_table(method: &Method, classes: &ClassTable) -> Semantic<MethodTable> {
    for local in &method.locals {
        declared(classes, &local.of)?;
    }

    MethodTable::new(&method.formals, &method.locals)
}

/// Un tipo declarado solo puede nombrar clases registradas.
fn declared(classes: &ClassTable, typ: &Located<Type>) -> Semantic<()> {
    match typ.as_ref() {
        Type::Class(name) if !classes.is_type(name) => Err(Located::at(
            SemanticError::UnresolvedName(name.clone()),
            typ.location().clone(),
        )),

        _ => Ok(()),
    }
}

/// Contexto de elaboración de un único método.
struct Context<'a> {
    classes: &'a ClassTable,

    /// Clase en elaboración, o `None` dentro de `main`.
    current: Option<&'a Identifier>,

    locals: MethodTable,
}

impl Context<'_> {
    fn method(&self, method: &mut Method) -> Semantic<()> {
        for statement in &mut method.body {
            self.statement(statement)?;
        }

        let found = self.expr(&mut method.result)?;
        let returns = method.returns.as_ref();
        if !self.classes.compatible(&found, returns) {
            return Err(mismatch(returns.clone(), found, &method.result));
        }

        Ok(())
    }

    fn statement(&self, statement: &mut Statement) -> Semantic<()> {
        match statement {
            Statement::Block(statements) => {
                for statement in statements {
                    self.statement(statement)?;
                }
            }

            Statement::If {
                condition,
                then,
                otherwise,
            } => {
                self.expect(condition, Type::Boolean)?;
                self.statement(then)?;
                self.statement(otherwise)?;
            }

            Statement::While { condition, body } => {
                self.expect(condition, Type::Boolean)?;
                self.statement(body)?;
            }

            Statement::Print(value) => self.expect(value, Type::Int)?,

            Statement::Assign { target, value } => {
                let expected = self.variable(target)?;
                self.expect(value, expected)?;
            }

            Statement::AssignArray {
                target,
                index,
                value,
            } => {
                let found = self.variable(target)?;
                if found != Type::IntArray {
                    return Err(Located::at(
                        SemanticError::TypeMismatch(Type::IntArray, found),
                        target.name.location().clone(),
                    ));
                }

                self.expect(index, Type::Int)?;
                self.expect(value, Type::Int)?;
            }
        }

        Ok(())
    }

    /// Elabora una expresión y exige un tipo exacto.
    fn expect(&self, expr: &mut Located<Expr>, expected: Type) -> Semantic<()> {
        let found = self.expr(expr)?;
        if found == expected {
            Ok(())
        } else {
            Err(mismatch(expected, found, expr))
        }
    }

    fn expr(&self, expr: &mut Located<Expr>) -> Semantic<Type> {
        let location = expr.location().clone();

        let typ = match &mut expr.as_mut().kind {
            ExprKind::Integer(_) => Type::Int,
            ExprKind::True | ExprKind::False => Type::Boolean,

            ExprKind::This => match self.current {
                Some(class) => Type::Class(class.clone()),
                None => return Err(Located::at(SemanticError::StaticThis, location)),
            },

            ExprKind::Read(variable) => self.variable(variable)?,

            ExprKind::Binary(lhs, op, rhs) => {
                let (operands, result) = match op {
                    BinOp::Add | BinOp::Sub | BinOp::Mul => (Type::Int, Type::Int),
                    BinOp::Less => (Type::Int, Type::Boolean),
                    BinOp::And => (Type::Boolean, Type::Boolean),
                };

                self.expect(lhs, operands.clone())?;
                self.expect(rhs, operands)?;
                result
            }

            ExprKind::Not(operand) => {
                self.expect(operand, Type::Boolean)?;
                Type::Boolean
            }

            ExprKind::Index { array, index } => {
                self.expect(array, Type::IntArray)?;
                self.expect(index, Type::Int)?;
                Type::Int
            }

            ExprKind::Length(array) => {
                self.expect(array, Type::IntArray)?;
                Type::Int
            }

            ExprKind::NewArray(length) => {
                self.expect(length, Type::Int)?;
                Type::IntArray
            }

            ExprKind::NewObject(class) => {
                if !self.classes.is_type(class.as_ref()) {
                    return Err(class.clone().map(SemanticError::UnresolvedName));
                }

                Type::Class(class.as_ref().clone())
            }

            ExprKind::Call(call) => self.call(call, location)?,
        };

        expr.as_mut().typ = Some(typ.clone());
        Ok(typ)
    }

    fn call(&self, call: &mut Call, location: Location) -> Semantic<Type> {
        let class = match self.expr(&mut call.receiver)? {
            Type::Class(class) => class,
            other => {
                return Err(Located::at(
                    SemanticError::ExpectedObject(other),
                    call.receiver.location().clone(),
                ))
            }
        };

        let signature = self
            .classes
            .resolve_method(&class, call.method.as_ref())
            .ok_or_else(|| call.method.clone().map(SemanticError::UnresolvedName))?;

        if signature.formals.len() != call.arguments.len() {
            return Err(Located::at(
                SemanticError::ArityMismatch {
                    method: call.method.as_ref().clone(),
                    expected: signature.formals.len(),
                    found: call.arguments.len(),
                },
                location,
            ));
        }

        let mut arguments = Vec::with_capacity(call.arguments.len());
        for (argument, formal) in call.arguments.iter_mut().zip(&signature.formals) {
            let found = self.expr(argument)?;
            if !self.classes.compatible(&found, formal) {
                return Err(mismatch(formal.clone(), found, argument));
            }

            arguments.push(found);
        }

        call.resolved = Some(Resolved {
            class,
            arguments,
            formals: signature.formals.clone(),
            returns: signature.returns.clone(),
        });

        Ok(signature.returns.clone())
    }

    /// Resuelve un identificador: primero como local, luego como campo.
    fn variable(&self, variable: &mut Variable) -> Semantic<Type> {
        let name = variable.name.as_ref();

        let (typ, access) = match self.locals.lookup(name) {
            Some(typ) => (typ.clone(), Access::Local),
            None => match self
                .current
                .and_then(|class| self.classes.resolve_field(class, name))
            {
                Some(typ) => (typ.clone(), Access::Field),
                None => {
                    return Err(variable
                        .name
                        .clone()
                        .map(SemanticError::UnresolvedName))
                }
            },
        };

        variable.typ = Some(typ.clone());
        variable.access = Some(access);
        Ok(typ)
    }
}

fn mismatch(expected: Type, found: Type, at: &Located<Expr>) -> Located<SemanticError> {
    Located::at(
        SemanticError::TypeMismatch(expected, found),
        at.location().clone(),
    )
}

fn declaration_types(declarations: &[Declaration]) -> impl Iterator<Item = &Type> {
    declarations.iter().map(|declaration| declaration.of.as_ref())
}
