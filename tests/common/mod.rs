#![allow(dead_code)]

use minijavac::{
    ast::Program,
    lex::Lexer,
    parse,
    semantic::{Dump, Elaborated, SemanticError},
    source::Source,
};

pub const FACTORIAL: &str = "
class Factorial {
    public static void main(String[] a) {
        System.out.println(new Fac().ComputeFac(10));
    }
}

class Fac {
    public int ComputeFac(int num) {
        int num_aux;
        if (num < 1)
            num_aux = 1;
        else
            num_aux = num * (this.ComputeFac(num - 1));
        return num_aux;
    }
}
";

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn parse(text: &str) -> Program {
    init();

    let source = Source::new("<test>", text);
    let lexer = Lexer::new(source);
    let eof = lexer.eof();

    let tokens = lexer.try_exhaustive().expect("lexical errors");
    parse::parse(&tokens, eof).expect("syntax error")
}

pub fn elaborate(text: &str) -> Elaborated {
    parse(text).elaborate(Dump::all()).expect("semantic error")
}

pub fn reject(text: &str) -> SemanticError {
    parse(text)
        .elaborate(Dump::empty())
        .expect_err("elaboration should fail")
        .into_inner()
}

/// Programa con una clase principal que imprime `expr` y las clases dadas.
pub fn with_main(expr: &str, classes: &str) -> String {
    format!(
        "class Main {{ public static void main(String[] args) {{ System.out.println({}); }} }}\n{}",
        expr, classes
    )
}
