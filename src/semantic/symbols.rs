//! Tablas de símbolos.
//!
//! [`ClassTable`] se construye en dos pasadas sobre el programa:
//! primero se registran todos los nombres de clase, de modo que las
//! referencias adelantadas resuelvan, y luego se completan campos y
//! métodos. Una tercera operación, [`ClassTable::validate`], verifica
//! superclases y ciclos antes de que cualquier consumidor recorra
//! cadenas de herencia.
//!
//! [`MethodTable`] contiene parámetros formales y variables locales de
//! un único método. Se construye y descarta por cada método elaborado.

use std::fmt::{self, Display};

use indexmap::{map::Entry, IndexMap};

use super::{Semantic, SemanticError};
use crate::{
    ast::{Declaration, Type},
    lex::Identifier,
    source::Located,
};

/// Firma de un método: tipo de retorno y tipos formales en orden.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodType {
    pub returns: Type,
    pub formals: Vec<Type>,
}

/// Entrada de la tabla de clases.
#[derive(Debug, Default)]
pub struct ClassBinding {
    extends: Option<Identifier>,
    fields: IndexMap<Identifier, Type>,
    methods: IndexMap<Identifier, MethodType>,
}

impl ClassBinding {
    /// Superclase directa, si existe.
    pub fn extends(&self) -> Option<&Identifier> {
        self.extends.as_ref()
    }

    /// Campos propios en orden de declaración.
    pub fn fields(&self) -> impl Iterator<Item = (&Identifier, &Type)> {
        self.fields.iter()
    }

    /// Métodos propios en orden de declaración.
    pub fn methods(&self) -> impl Iterator<Item = (&Identifier, &MethodType)> {
        self.methods.iter()
    }
}

/// Tabla global de clases, en orden de registro.
///
/// La clase principal ocupa su nombre pero no es un tipo: no puede
/// declararse, instanciarse ni extenderse.
#[derive(Debug, Default)]
pub struct ClassTable {
    classes: IndexMap<Identifier, ClassBinding>,
    main: Option<Identifier>,
}

impl ClassTable {
    /// Registra el nombre de la clase principal.
    pub fn register_main(&mut self, name: &Located<Identifier>) -> Semantic<()> {
        self.register(name, None)?;
        self.main = Some(name.as_ref().clone());
        Ok(())
    }

    /// Registra un nombre de clase junto a su superclase.
    ///
    /// La superclase no se verifica en este punto.
    pub fn register(
        &mut self,
        name: &Located<Identifier>,
        extends: Option<&Located<Identifier>>,
    ) -> Semantic<()> {
        match self.classes.entry(name.as_ref().clone()) {
            Entry::Occupied(_) => Err(Located::at(
                SemanticError::DuplicateClass(name.as_ref().clone()),
                name.location().clone(),
            )),

            Entry::Vacant(entry) => {
                entry.insert(ClassBinding {
                    extends: extends.map(|extends| extends.as_ref().clone()),
                    ..Default::default()
                });

                Ok(())
            }
        }
    }

    /// Agrega un campo a una clase ya registrada.
    pub fn add_field(&mut self, class: &Identifier, field: &Declaration) -> Semantic<()> {
        let binding = self.binding_mut(class, &field.name)?;
        match binding.fields.entry(field.name.as_ref().clone()) {
            Entry::Occupied(_) => Err(duplicate_member(class, &field.name)),
            Entry::Vacant(entry) => {
                entry.insert(field.of.as_ref().clone());
                Ok(())
            }
        }
    }

    /// Agrega un método a una clase ya registrada.
    ///
    /// Redefinir un método heredado es válido; repetirlo dentro de
    /// la misma clase no lo es.
    pub fn add_method(
        &mut self,
        class: &Identifier,
        method: &Located<Identifier>,
        signature: MethodType,
    ) -> Semantic<()> {
        let binding = self.binding_mut(class, method)?;
        match binding.methods.entry(method.as_ref().clone()) {
            Entry::Occupied(_) => Err(duplicate_member(class, method)),
            Entry::Vacant(entry) => {
                entry.insert(signature);
                Ok(())
            }
        }
    }

    /// Verifica que toda superclase exista y que no haya ciclos.
    ///
    /// `locate` provee la ubicación de la cláusula `extends` de cada
    /// clase para fines de diagnóstico.
    pub fn validate<F>(&self, locate: F) -> Semantic<()>
    where
        F: Fn(&Identifier) -> Option<Located<Identifier>>,
    {
        for (name, binding) in &self.classes {
            let extends = match &binding.extends {
                Some(extends) => extends,
                None => continue,
            };

            let clause = match locate(name) {
                Some(clause) => clause,
                None => continue,
            };

            if !self.is_type(extends) {
                return Err(clause.map(SemanticError::UnresolvedName));
            }

            // Un ancestro repetido implica un ciclo
            let mut steps = 0;
            let mut current = Some(extends);
            while let Some(class) = current {
                if class == name || steps > self.classes.len() {
                    return Err(Located::at(
                        SemanticError::InheritanceCycle(name.clone()),
                        clause.location().clone(),
                    ));
                }

                steps += 1;
                current = self.classes.get(class).and_then(|binding| binding.extends.as_ref());
            }
        }

        log::trace!("class hierarchy of {} classes is acyclic", self.classes.len());
        Ok(())
    }

    /// Determina si existe una clase con este nombre.
    pub fn contains(&self, class: &Identifier) -> bool {
        self.classes.contains_key(class)
    }

    /// Determina si un nombre de clase puede usarse como tipo.
    pub fn is_type(&self, class: &Identifier) -> bool {
        self.contains(class) && self.main.as_ref() != Some(class)
    }

    /// Obtiene la entrada de una clase.
    pub fn get(&self, class: &Identifier) -> Option<&ClassBinding> {
        self.classes.get(class)
    }

    /// Clases registradas, en orden de registro.
    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &ClassBinding)> {
        self.classes.iter()
    }

    /// Cadena de herencia a partir de una clase, incluyéndola.
    ///
    /// El recorrido se detiene ante un nombre no registrado y nunca
    /// excede el número de clases, incluso si la tabla aún no ha sido
    /// validada.
    pub fn ancestors<'a>(&'a self, class: &'a Identifier) -> impl Iterator<Item = &'a Identifier> {
        let mut current = Some(class);
        std::iter::from_fn(move || {
            let class = current?;
            current = self.classes.get(class).and_then(|binding| binding.extends.as_ref());
            Some(class)
        })
        .take(self.classes.len().max(1))
    }

    /// Busca un campo en la clase o en sus ancestros.
    pub fn resolve_field(&self, class: &Identifier, field: &Identifier) -> Option<&Type> {
        self.ancestors(class)
            .filter_map(|class| self.classes.get(class))
            .find_map(|binding| binding.fields.get(field))
    }

    /// Busca un método en la clase o en sus ancestros.
    pub fn resolve_method(&self, class: &Identifier, method: &Identifier) -> Option<&MethodType> {
        self.ancestors(class)
            .filter_map(|class| self.classes.get(class))
            .find_map(|binding| binding.methods.get(method))
    }

    /// Regla de compatibilidad nominal entre un tipo real y uno esperado.
    ///
    /// Los tipos primitivos deben ser iguales. Un tipo de clase es
    /// compatible si alguno de sus ancestros, incluyéndose, es
    /// exactamente la clase esperada.
    pub fn compatible(&self, actual: &Type, expected: &Type) -> bool {
        match (actual, expected) {
            (Type::Class(actual), Type::Class(expected)) => {
                self.ancestors(actual).any(|class| class == expected)
            }

            _ => actual == expected,
        }
    }

    fn binding_mut(
        &mut self,
        class: &Identifier,
        at: &Located<Identifier>,
    ) -> Semantic<&mut ClassBinding> {
        self.classes.get_mut(class).ok_or_else(|| {
            Located::at(
                SemanticError::UnresolvedName(class.clone()),
                at.location().clone(),
            )
        })
    }
}

impl Display for ClassTable {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, binding) in &self.classes {
            match &binding.extends {
                Some(extends) => writeln!(fmt, "class {} extends {}", name, extends)?,
                None => writeln!(fmt, "class {}", name)?,
            }

            for (field, typ) in &binding.fields {
                writeln!(fmt, "  {} {};", typ, field)?;
            }

            for (method, signature) in &binding.methods {
                write!(fmt, "  {} {}(", signature.returns, method)?;
                for (i, formal) in signature.formals.iter().enumerate() {
                    let separator = if i == 0 { "" } else { ", " };
                    write!(fmt, "{}{}", separator, formal)?;
                }

                writeln!(fmt, ")")?;
            }
        }

        Ok(())
    }
}

/// Parámetros formales y variables locales de un método.
#[derive(Debug, Default)]
pub struct MethodTable {
    variables: IndexMap<Identifier, Type>,
}

impl MethodTable {
    /// Construye la tabla a partir de formales y locales, en ese orden.
    pub fn new(formals: &[Declaration], locals: &[Declaration]) -> Semantic<Self> {
        let mut table = MethodTable::default();
        for declaration in formals.iter().chain(locals) {
            match table.variables.entry(declaration.name.as_ref().clone()) {
                Entry::Occupied(_) => {
                    return Err(declaration
                        .name
                        .clone()
                        .map(SemanticError::DuplicateVariable))
                }

                Entry::Vacant(entry) => {
                    entry.insert(declaration.of.as_ref().clone());
                }
            }
        }

        Ok(table)
    }

    /// Tipo declarado de una variable, si existe en este método.
    pub fn lookup(&self, name: &Identifier) -> Option<&Type> {
        self.variables.get(name)
    }
}

impl Display for MethodTable {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, typ) in &self.variables {
            writeln!(fmt, "  {} {};", typ, name)?;
        }

        Ok(())
    }
}

fn duplicate_member(class: &Identifier, member: &Located<Identifier>) -> Located<SemanticError> {
    Located::at(
        SemanticError::DuplicateMember(class.clone(), member.as_ref().clone()),
        member.location().clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Location, Source};

    fn at(name: &str) -> Located<Identifier> {
        let source = Source::new("<test>", "");
        Located::at(Identifier::from(name), Location::start_of(&source))
    }

    fn declaration(name: &str, of: Type) -> Declaration {
        let location = at(name).location().clone();
        Declaration {
            name: at(name),
            of: Located::at(of, location),
        }
    }

    fn hierarchy(pairs: &[(&str, Option<&str>)]) -> ClassTable {
        let mut table = ClassTable::default();
        for &(name, extends) in pairs {
            let extends = extends.map(at);
            table.register(&at(name), extends.as_ref()).unwrap();
        }

        table
    }

    fn locate(name: &Identifier) -> Option<Located<Identifier>> {
        Some(at(name.as_ref()))
    }

    #[test]
    fn duplicate_class() {
        let mut table = hierarchy(&[("A", None)]);
        let error = table.register(&at("A"), None).unwrap_err();
        assert!(matches!(error.as_ref(), SemanticError::DuplicateClass(_)));
    }

    #[test]
    fn duplicate_member_within_class() {
        let mut table = hierarchy(&[("A", None), ("B", Some("A"))]);
        let a = Identifier::from("A");
        let b = Identifier::from("B");
        let signature = MethodType {
            returns: Type::Int,
            formals: vec![],
        };

        table.add_field(&a, &declaration("x", Type::Int)).unwrap();
        table.add_method(&a, &at("m"), signature.clone()).unwrap();

        // Redefinir en una subclase es válido
        table.add_field(&b, &declaration("x", Type::Boolean)).unwrap();
        table.add_method(&b, &at("m"), signature.clone()).unwrap();

        let error = table.add_method(&a, &at("m"), signature).unwrap_err();
        assert!(matches!(error.as_ref(), SemanticError::DuplicateMember(_, _)));

        let error = table.add_field(&a, &declaration("x", Type::Int)).unwrap_err();
        assert!(matches!(error.as_ref(), SemanticError::DuplicateMember(_, _)));
    }

    #[test]
    fn resolution_walks_superclasses() {
        let mut table = hierarchy(&[("A", None), ("B", Some("A")), ("C", Some("B"))]);
        let a = Identifier::from("A");
        let c = Identifier::from("C");

        table.add_field(&a, &declaration("x", Type::IntArray)).unwrap();
        table
            .add_method(
                &a,
                &at("m"),
                MethodType {
                    returns: Type::Boolean,
                    formals: vec![Type::Int],
                },
            )
            .unwrap();

        assert_eq!(
            table.resolve_field(&c, &Identifier::from("x")),
            Some(&Type::IntArray)
        );

        let method = table.resolve_method(&c, &Identifier::from("m")).unwrap();
        assert_eq!(method.returns, Type::Boolean);
        assert!(table.resolve_field(&a, &Identifier::from("y")).is_none());
        assert!(table.resolve_method(&a, &Identifier::from("n")).is_none());
    }

    #[test]
    fn nominal_compatibility() {
        let table = hierarchy(&[("A", None), ("B", Some("A")), ("Z", None)]);
        let class = |name: &str| Type::Class(Identifier::from(name));

        assert!(table.compatible(&class("B"), &class("A")));
        assert!(table.compatible(&class("A"), &class("A")));
        assert!(!table.compatible(&class("A"), &class("B")));
        assert!(!table.compatible(&class("Z"), &class("A")));
        assert!(table.compatible(&Type::Int, &Type::Int));
        assert!(!table.compatible(&Type::Int, &Type::Boolean));
    }

    #[test]
    fn ancestor_walk_is_bounded() {
        let table = hierarchy(&[("A", Some("B")), ("B", Some("A"))]);
        let a = Identifier::from("A");

        assert_eq!(table.ancestors(&a).count(), 2);
        assert!(!table.compatible(&Type::Class(a), &Type::Class(Identifier::from("Z"))));
    }

    #[test]
    fn validation_detects_cycles() {
        let table = hierarchy(&[("A", Some("C")), ("B", Some("A")), ("C", Some("B"))]);
        let error = table.validate(locate).unwrap_err();
        assert!(matches!(error.as_ref(), SemanticError::InheritanceCycle(_)));

        let table = hierarchy(&[("A", Some("A"))]);
        assert!(table.validate(locate).is_err());
    }

    #[test]
    fn validation_detects_missing_superclass() {
        let table = hierarchy(&[("A", Some("Nowhere"))]);
        let error = table.validate(locate).unwrap_err();
        assert!(matches!(error.as_ref(), SemanticError::UnresolvedName(_)));

        let table = hierarchy(&[("A", None), ("B", Some("A")), ("C", Some("A"))]);
        assert!(table.validate(locate).is_ok());
    }

    #[test]
    fn main_class_is_not_a_type() {
        let mut table = ClassTable::default();
        table.register_main(&at("Main")).unwrap();
        table.register(&at("A"), Some(&at("Main"))).unwrap();

        let main = Identifier::from("Main");
        assert!(table.contains(&main));
        assert!(!table.is_type(&main));
        assert!(table.is_type(&Identifier::from("A")));

        let error = table.register(&at("Main"), None).unwrap_err();
        assert!(matches!(error.as_ref(), SemanticError::DuplicateClass(_)));

        let error = table.validate(locate).unwrap_err();
        assert!(matches!(error.as_ref(), SemanticError::UnresolvedName(_)));
    }

    #[test]
    fn method_table_rejects_duplicates() {
        let formals = [declaration("a", Type::Int)];
        let locals = [declaration("b", Type::Boolean)];

        let table = MethodTable::new(&formals, &locals).unwrap();
        assert_eq!(table.lookup(&Identifier::from("b")), Some(&Type::Boolean));
        assert!(table.lookup(&Identifier::from("c")).is_none());

        let locals = [declaration("a", Type::IntArray)];
        let error = MethodTable::new(&formals, &locals).unwrap_err();
        assert!(matches!(error.as_ref(), SemanticError::DuplicateVariable(_)));
    }
}
