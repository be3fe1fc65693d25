//! Back end de máquina de pila.
//!
//! La traducción ocurre en dos etapas. Primero se construye una tabla
//! propia de métodos por clase, aplanada a través de la herencia, de
//! la cual se obtienen los descriptores de `invokevirtual`. Luego cada
//! método se lineariza a una lista de [`Instruction`]s, asignando un
//! slot a cada parámetro formal y variable local en orden de
//! declaración. El slot 0 corresponde a la instancia.
//!
//! La máquina objetivo no tiene booleanos ni control estructurado,
//! por lo cual comparaciones, condicionales y ciclos se reducen a
//! saltos entre etiquetas. Cada método se verifica al final: toda
//! etiqueta referenciada debe estar definida exactamente una vez.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use super::{Bug, Lowering};
use crate::{
    ast::{self, Access, BinOp, ExprKind, Statement},
    lex::Identifier,
    source::Located,
};

pub mod ir;
mod print;

pub use ir::{Class, Instruction, Label, MainClass, Method, Signature, Type, Unit};
pub use print::write;

/// Traduce un programa anotado a una unidad por clase.
///
/// La primera unidad corresponde siempre a la clase principal.
pub fn translate(program: &ast::Program) -> Lowering<Vec<Unit>> {
    let table = MethodTable::build(program)?;
    let mut labels = Labels::default();

    let main = {
        let name = program.main.name.as_ref();
        log::debug!("translating main class {} to bytecode", name);

        let mut translator = Translator::new(&table, name, HashMap::new(), &mut labels);
        translator.statement(&program.main.body)?;

        let instructions = translator.finish(name.as_ref())?;
        Unit::Main(MainClass {
            name: name.clone(),
            instructions,
        })
    };

    let mut units = vec![main];
    for class in &program.classes {
        units.push(Unit::Class(translate_class(class, &table, &mut labels)?));
    }

    Ok(units)
}

fn translate_class(class: &ast::Class, table: &MethodTable, labels: &mut Labels) -> Lowering<Class> {
    let name = class.name.as_ref();
    log::debug!("translating class {} to bytecode", name);

    let fields = class
        .fields
        .iter()
        .map(|field| (field.name.as_ref().clone(), Type::from(field.of.as_ref())))
        .collect();

    let methods = class
        .methods
        .iter()
        .map(|method| translate_method(name, method, table, labels))
        .collect::<Lowering<_>>()?;

    Ok(Class {
        name: name.clone(),
        extends: class.extends.as_ref().map(|extends| extends.as_ref().clone()),
        fields,
        methods,
    })
}

fn translate_method(
    class: &Identifier,
    method: &ast::Method,
    table: &MethodTable,
    labels: &mut Labels,
) -> Lowering<Method> {
    let slots = assign_slots(method);
    let locals = 1 + slots.len() as u32;
    log::trace!("{}.{} uses {} slots", class, method.name.as_ref(), locals);

    let mut translator = Translator::new(table, class, slots, labels);
    for statement in &method.body {
        translator.statement(statement)?;
    }

    translator.expr(&method.result)?;
    translator.push(if method.returns.as_ref().is_reference() {
        Instruction::Areturn
    } else {
        Instruction::Ireturn
    });

    let qualified = format!("{}.{}", class, method.name.as_ref());
    Ok(Method {
        name: method.name.as_ref().clone(),
        formals: method
            .formals
            .iter()
            .map(|formal| Type::from(formal.of.as_ref()))
            .collect(),
        returns: Type::from(method.returns.as_ref()),
        locals,
        instructions: translator.finish(&qualified)?,
    })
}

/// Slots de formales y locales, a partir de 1 y en orden de declaración.
pub fn assign_slots(method: &ast::Method) -> HashMap<Identifier, u32> {
    method
        .formals
        .iter()
        .chain(&method.locals)
        .zip(1..)
        .map(|(declaration, slot)| (declaration.name.as_ref().clone(), slot))
        .collect()
}

/// Métodos visibles en cada clase, incluyendo los heredados.
struct MethodTable {
    classes: HashMap<Identifier, IndexMap<Identifier, (Vec<Type>, Type)>>,
}

impl MethodTable {
    fn build(program: &ast::Program) -> Lowering<Self> {
        let index = super::class_index(program);

        let mut classes = HashMap::new();
        for name in index.keys() {
            let mut methods = IndexMap::new();
            for ancestor in super::lineage(&index, name)? {
                for method in &ancestor.methods {
                    let formals = method
                        .formals
                        .iter()
                        .map(|formal| Type::from(formal.of.as_ref()))
                        .collect();

                    let returns = Type::from(method.returns.as_ref());
                    methods.insert(method.name.as_ref().clone(), (formals, returns));
                }
            }

            classes.insert(name.clone(), methods);
        }

        Ok(MethodTable { classes })
    }

    fn signature(&self, class: &Identifier, method: &Identifier) -> Lowering<Signature> {
        let (formals, returns) = self
            .classes
            .get(class)
            .ok_or_else(|| Bug::UnknownClass(class.clone()))?
            .get(method)
            .ok_or_else(|| Bug::UnknownMethod(class.clone(), method.clone()))?;

        Ok(Signature {
            class: class.clone(),
            method: method.clone(),
            formals: formals.clone(),
            returns: returns.clone(),
        })
    }
}

#[derive(Default)]
struct Labels {
    next: u32,
}

impl Labels {
    fn fresh(&mut self) -> Label {
        let label = Label(self.next);
        self.next += 1;
        label
    }
}

struct Translator<'a> {
    table: &'a MethodTable,
    class: &'a Identifier,
    slots: HashMap<Identifier, u32>,
    labels: &'a mut Labels,
    code: Vec<Instruction>,
}

impl<'a> Translator<'a> {
    fn new(
        table: &'a MethodTable,
        class: &'a Identifier,
        slots: HashMap<Identifier, u32>,
        labels: &'a mut Labels,
    ) -> Self {
        Translator {
            table,
            class,
            slots,
            labels,
            code: Vec::new(),
        }
    }

    fn finish(self, unit: &str) -> Lowering<Vec<Instruction>> {
        check_labels(unit, &self.code)?;
        Ok(self.code)
    }

    fn push(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }

    fn statement(&mut self, statement: &Statement) -> Lowering<()> {
        use Instruction::*;

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
                let (true_label, false_label, end) =
                    (self.labels.fresh(), self.labels.fresh(), self.labels.fresh());

                self.expr(condition)?;
                self.push(Ifne(true_label));
                self.push(Label(false_label));
                self.statement(otherwise)?;
                self.push(Goto(end));
                self.push(Label(true_label));
                self.statement(then)?;
                self.push(Goto(end));
                self.push(Label(end));
            }

            Statement::While { condition, body } => {
                let (test, exit) = (self.labels.fresh(), self.labels.fresh());

                self.push(Label(test));
                self.expr(condition)?;
                self.push(Ifeq(exit));
                self.statement(body)?;
                self.push(Goto(test));
                self.push(Label(exit));
            }

            Statement::Print(value) => {
                self.expr(value)?;
                self.push(Print);
            }

            Statement::Assign { target, value } => {
                let (typ, access) = super::variable(target)?;
                let typ = ir::Type::from(typ);

                match access {
                    Access::Local => {
                        let slot = self.slot(&target.name)?;
                        self.expr(value)?;
                        self.push(if typ.is_reference() {
                            Astore(slot)
                        } else {
                            Istore(slot)
                        });
                    }

                    Access::Field => {
                        self.push(Aload(0));
                        self.expr(value)?;
                        self.push(Putfield(
                            self.class.clone(),
                            target.name.as_ref().clone(),
                            typ,
                        ));
                    }
                }
            }

            Statement::AssignArray {
                target,
                index,
                value,
            } => {
                let (_, access) = super::variable(target)?;
                match access {
                    Access::Local => {
                        let slot = self.slot(&target.name)?;
                        self.push(Aload(slot));
                    }

                    Access::Field => {
                        self.push(Aload(0));
                        self.push(Getfield(
                            self.class.clone(),
                            target.name.as_ref().clone(),
                            ir::Type::IntArray,
                        ));
                    }
                }

                self.expr(index)?;
                self.expr(value)?;
                self.push(Iastore);
            }
        }

        Ok(())
    }

    fn expr(&mut self, expr: &Located<ast::Expr>) -> Lowering<()> {
        use Instruction::*;

        match &expr.val().kind {
            ExprKind::Integer(integer) => self.push(Ldc(*integer)),
            ExprKind::True => self.push(Ldc(1)),
            ExprKind::False => self.push(Ldc(0)),
            ExprKind::This => self.push(Aload(0)),

            ExprKind::Read(variable) => {
                let (typ, access) = super::variable(variable)?;
                let typ = ir::Type::from(typ);

                match access {
                    Access::Local => {
                        let slot = self.slot(&variable.name)?;
                        self.push(if typ.is_reference() {
                            Aload(slot)
                        } else {
                            Iload(slot)
                        });
                    }

                    Access::Field => {
                        self.push(Aload(0));
                        self.push(Getfield(
                            self.class.clone(),
                            variable.name.as_ref().clone(),
                            typ,
                        ));
                    }
                }
            }

            ExprKind::Binary(lhs, op, rhs) => {
                self.expr(lhs)?;
                self.expr(rhs)?;

                match op {
                    BinOp::Add => self.push(Iadd),
                    BinOp::Sub => self.push(Isub),
                    BinOp::Mul => self.push(Imul),
                    BinOp::And => self.push(Iand),

                    // No existe un opcode que produzca el booleano
                    BinOp::Less => {
                        let (true_label, false_label, end) =
                            (self.labels.fresh(), self.labels.fresh(), self.labels.fresh());

                        self.push(IfIcmplt(true_label));
                        self.push(Label(false_label));
                        self.push(Ldc(0));
                        self.push(Goto(end));
                        self.push(Label(true_label));
                        self.push(Ldc(1));
                        self.push(Goto(end));
                        self.push(Label(end));
                    }
                }
            }

            ExprKind::Not(operand) => {
                let (nonzero, end) = (self.labels.fresh(), self.labels.fresh());

                self.expr(operand)?;
                self.push(Ifne(nonzero));
                self.push(Ldc(1));
                self.push(Goto(end));
                self.push(Label(nonzero));
                self.push(Ldc(0));
                self.push(Label(end));
            }

            ExprKind::Index { array, index } => {
                self.expr(array)?;
                self.expr(index)?;
                self.push(Iaload);
            }

            ExprKind::Length(array) => {
                self.expr(array)?;
                self.push(Arraylength);
            }

            ExprKind::NewArray(length) => {
                self.expr(length)?;
                self.push(NewArray);
            }

            ExprKind::NewObject(class) => self.push(New(class.as_ref().clone())),

            ExprKind::Call(call) => {
                let resolved = super::resolved(call)?;
                let signature = self.table.signature(&resolved.class, call.method.as_ref())?;

                self.expr(&call.receiver)?;
                for argument in &call.arguments {
                    self.expr(argument)?;
                }

                self.push(Invokevirtual(signature));
            }
        }

        Ok(())
    }

    fn slot(&self, name: &Located<Identifier>) -> Lowering<u32> {
        self.slots
            .get(name.as_ref())
            .copied()
            .ok_or_else(|| Bug::UnknownSlot(name.as_ref().clone()))
    }
}

/// Verifica que cada etiqueta referenciada se defina exactamente una vez.
pub fn check_labels(unit: &str, code: &[Instruction]) -> Lowering<()> {
    let mut defined = HashSet::new();
    for instruction in code {
        if let Instruction::Label(label) = instruction {
            if !defined.insert(*label) {
                return Err(Bug::DuplicateLabelDefinition(
                    label.to_string(),
                    unit.to_owned(),
                ));
            }
        }
    }

    match code
        .iter()
        .filter_map(Instruction::target)
        .find(|label| !defined.contains(label))
    {
        Some(label) => Err(Bug::MissingLabelDefinition(
            label.to_string(),
            unit.to_owned(),
        )),

        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_labels() {
        let code = [
            Instruction::Label(Label(0)),
            Instruction::Ifeq(Label(1)),
            Instruction::Goto(Label(0)),
            Instruction::Label(Label(1)),
        ];

        assert!(check_labels("A.m", &code).is_ok());
    }

    #[test]
    fn missing_label() {
        let code = [Instruction::Goto(Label(7))];
        let error = check_labels("A.m", &code).unwrap_err();

        assert!(matches!(error, Bug::MissingLabelDefinition(_, _)));
        assert_eq!(
            error.to_string(),
            "label L_7 is referenced in `A.m` but never defined"
        );
    }

    #[test]
    fn duplicate_label() {
        let code = [Instruction::Label(Label(2)), Instruction::Label(Label(2))];
        let error = check_labels("A.m", &code).unwrap_err();
        assert!(matches!(error, Bug::DuplicateLabelDefinition(_, _)));
    }
}
