//! Compilador para un subconjunto orientado a objetos de Java.
//!
//! # Front end
//! Cada programa deriva de un único archivo de código fuente.
//! Este archivo se somete primero a análisis léxico en [`lex`], de
//! lo cual se obtiene un flujo de tokens. El flujo de tokens se
//! dispone en el árbol de [`ast`] por medio de análisis sintáctico en
//! [`parse`]. El árbol sintáctico es procesado por análisis semántico
//! en [`semantic`], donde se construye la tabla de clases y se anota
//! cada expresión con su tipo, con lo cual concluyen las fases
//! delanteras del compilador.
//!
//! # Back end
//! En esta sección el compilador deja de ser agnóstico al sistema
//! objetivo. [`codegen`] ofrece dos back ends independientes que
//! consumen el mismo árbol anotado: uno de bytecode para una máquina
//! de pila y otro que emite C con tablas virtuales explícitas y marcos
//! para un recolector de basura preciso. Ensamblado, compilación de C
//! y enlazado contra el runtime quedan a cargo de herramientas externas.

#[macro_use]
mod macros;

pub mod ast;
pub mod codegen;
pub mod error;
pub mod lex;
pub mod parse;
pub mod semantic;
pub mod source;
