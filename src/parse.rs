//! Análisis sintáctico.
//!
//! Descenso recursivo sobre el flujo de tokens. El resultado es el
//! árbol de [`crate::ast`] sin anotaciones. El primer error de sintaxis
//! detiene el análisis.

use thiserror::Error;

use crate::{
    ast::{
        BinOp, Call, Class, Declaration, Expr, ExprKind, MainClass, Method, Program, Statement,
        Type, Variable,
    },
    lex::{Identifier, Keyword, Token},
    source::{Located, Location},
};

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Expected token {0}, found {1} instead")]
    UnexpectedToken(Token, Token),

    #[error("Expected token {0}, none was found instead")]
    MissingToken(Token),

    #[error("Expected identifier")]
    ExpectedId,

    #[error("Expected any of `{{`, `if`, `while`, `System.out.println` or assignment")]
    ExpectedStatement,

    #[error("Expected any of `int`, `int[]`, `boolean` or a class name")]
    ExpectedType,

    #[error("Expected an expression")]
    ExpectedExpr,

    #[error("Expected a class declaration")]
    ExpectedClass,

    #[error("Abrupt end of program")]
    UnexpectedEof,
}

/// Construye el árbol sintáctico a partir de un flujo de tokens.
///
/// `eof` es la ubicación que se reporta si el flujo termina antes
/// de tiempo.
pub fn parse(tokens: &[Located<Token>], eof: Location) -> Result<Program, Located<ParserError>> {
    let mut parser = Parser {
        tokens,
        cursor: 0,
        last_known: eof.clone(),
        eof,
    };

    parser.program().map_err(Failure::coerce)
}

#[derive(Clone)]
struct Parser<'a> {
    tokens: &'a [Located<Token>],
    cursor: usize,
    last_known: Location,
    eof: Location,
}

enum Failure {
    Weak(Located<ParserError>),
    Strict(Located<ParserError>),
}

impl Failure {
    fn weak(self) -> Self {
        Failure::Weak(self.coerce())
    }

    fn coerce(self) -> Located<ParserError> {
        match self {
            Failure::Weak(error) => error,
            Failure::Strict(error) => error,
        }
    }
}

type Parse<T> = Result<T, Failure>;

impl<'a> Parser<'a> {
    fn program(&mut self) -> Parse<Program> {
        let main = self.main_class()?;

        let mut classes = Vec::new();
        while self.peek().is_some() {
            classes.push(self.class()?);
        }

        Ok(Program { main, classes })
    }

    fn main_class(&mut self) -> Parse<MainClass> {
        self.keyword(Keyword::Class)?;
        let name = self.id()?;
        self.expect(Token::OpenCurly)?;

        for keyword in [Keyword::Public, Keyword::Static, Keyword::Void, Keyword::Main] {
            self.keyword(keyword)?;
        }

        self.expect(Token::OpenParen)?;
        self.keyword(Keyword::String)?;
        self.expect(Token::OpenSquare)?;
        self.expect(Token::CloseSquare)?;
        let argument = self.id()?;
        self.expect(Token::CloseParen)?;

        self.expect(Token::OpenCurly)?;
        let body = self.statement()?;
        self.expect(Token::CloseCurly)?;
        self.expect(Token::CloseCurly)?;

        Ok(MainClass {
            name,
            argument,
            body,
        })
    }

    fn class(&mut self) -> Parse<Class> {
        match self.peek() {
            Some(Token::Keyword(Keyword::Class)) => self.next()?,
            _ => {
                self.next()?;
                return self.fail(ParserError::ExpectedClass);
            }
        };

        let name = self.id()?;
        let extends = match self.peek() {
            Some(Token::Keyword(Keyword::Extends)) => {
                self.next()?;
                Some(self.id()?)
            }

            _ => None,
        };

        self.expect(Token::OpenCurly)?;
        let fields = self.var_decls();

        let mut methods = Vec::new();
        while let Some(Token::Keyword(Keyword::Public)) = self.peek() {
            methods.push(self.method()?);
        }

        self.expect(Token::CloseCurly)?;

        Ok(Class {
            name,
            extends,
            fields,
            methods,
        })
    }

    fn method(&mut self) -> Parse<Method> {
        self.keyword(Keyword::Public)?;
        let returns = self.typ()?;
        let name = self.id()?;

        self.expect(Token::OpenParen)?;
        let formals = match self.peek() {
            Some(Token::CloseParen) => Vec::new(),
            _ => self.comma_separated(Parser::declaration)?,
        };
        self.expect(Token::CloseParen)?;

        self.expect(Token::OpenCurly)?;
        let locals = self.var_decls();

        let mut body = Vec::new();
        while !matches!(self.peek(), Some(Token::Keyword(Keyword::Return)) | None) {
            body.push(self.statement()?);
        }

        self.keyword(Keyword::Return)?;
        let result = self.expr()?;
        self.expect(Token::Semicolon)?;
        self.expect(Token::CloseCurly)?;

        Ok(Method {
            name,
            returns,
            formals,
            locals,
            body,
            result,
        })
    }

    fn var_decls(&mut self) -> Vec<Declaration> {
        let mut declarations = Vec::new();
        while let Ok(declaration) = self.attempt(|s| s.var_decl().map_err(Failure::weak)) {
            declarations.push(declaration);
        }

        declarations
    }

    fn var_decl(&mut self) -> Parse<Declaration> {
        let declaration = self.declaration()?;
        self.expect(Token::Semicolon)?;

        Ok(declaration)
    }

    fn declaration(&mut self) -> Parse<Declaration> {
        let of = self.typ()?;
        let name = self.id()?;

        Ok(Declaration { name, of })
    }

    fn typ(&mut self) -> Parse<Located<Type>> {
        let (location, token) = self.next()?.split();
        let typ = match token {
            Token::Keyword(Keyword::Boolean) => Type::Boolean,
            Token::Keyword(Keyword::Int) => match self.peek() {
                Some(Token::OpenSquare) => {
                    self.next()?;
                    self.expect(Token::CloseSquare)?;
                    let location = Location::span(location, &self.last_known);

                    return Ok(Located::at(Type::IntArray, location));
                }

                _ => Type::Int,
            },

            Token::Id(id) => Type::Class(id),
            _ => return self.fail(ParserError::ExpectedType),
        };

        Ok(Located::at(typ, location))
    }

    fn statement(&mut self) -> Parse<Statement> {
        match self.peek() {
            Some(Token::OpenCurly) => {
                self.next()?;

                let mut statements = Vec::new();
                while !matches!(self.peek(), Some(Token::CloseCurly) | None) {
                    statements.push(self.statement()?);
                }

                self.expect(Token::CloseCurly)?;
                Ok(Statement::Block(statements))
            }

            Some(Token::Keyword(Keyword::If)) => {
                self.next()?;
                let condition = self.parenthesized()?;
                let then = Box::new(self.statement()?);
                self.keyword(Keyword::Else)?;
                let otherwise = Box::new(self.statement()?);

                Ok(Statement::If {
                    condition,
                    then,
                    otherwise,
                })
            }

            Some(Token::Keyword(Keyword::While)) => {
                self.next()?;
                let condition = self.parenthesized()?;
                let body = Box::new(self.statement()?);

                Ok(Statement::While { condition, body })
            }

            Some(Token::Keyword(Keyword::Println)) => {
                self.next()?;
                let value = self.parenthesized()?;
                self.expect(Token::Semicolon)?;

                Ok(Statement::Print(value))
            }

            Some(Token::Id(_)) => {
                let target = Variable::new(self.id()?);
                let statement = match self.peek() {
                    Some(Token::OpenSquare) => {
                        self.next()?;
                        let index = self.expr()?;
                        self.expect(Token::CloseSquare)?;
                        self.expect(Token::Assign)?;
                        let value = self.expr()?;

                        Statement::AssignArray {
                            target,
                            index,
                            value,
                        }
                    }

                    _ => {
                        self.expect(Token::Assign)?;
                        let value = self.expr()?;

                        Statement::Assign { target, value }
                    }
                };

                self.expect(Token::Semicolon)?;
                Ok(statement)
            }

            _ => {
                self.next()?;
                self.fail(ParserError::ExpectedStatement)
            }
        }
    }

    fn parenthesized(&mut self) -> Parse<Located<Expr>> {
        self.expect(Token::OpenParen)?;
        let expr = self.expr()?;
        self.expect(Token::CloseParen)?;

        Ok(expr)
    }

    fn expr(&mut self) -> Parse<Located<Expr>> {
        self.left_associative(Parser::less, |token| match token {
            Token::And => Some(BinOp::And),
            _ => None,
        })
    }

    fn less(&mut self) -> Parse<Located<Expr>> {
        self.left_associative(Parser::additive, |token| match token {
            Token::Less => Some(BinOp::Less),
            _ => None,
        })
    }

    fn additive(&mut self) -> Parse<Located<Expr>> {
        self.left_associative(Parser::multiplicative, |token| match token {
            Token::Plus => Some(BinOp::Add),
            Token::Minus => Some(BinOp::Sub),
            _ => None,
        })
    }

    fn multiplicative(&mut self) -> Parse<Located<Expr>> {
        self.left_associative(Parser::unary, |token| match token {
            Token::Times => Some(BinOp::Mul),
            _ => None,
        })
    }

    fn left_associative<F, O>(&mut self, mut operand: F, operator: O) -> Parse<Located<Expr>>
    where
        F: FnMut(&mut Self) -> Parse<Located<Expr>>,
        O: Fn(&Token) -> Option<BinOp>,
    {
        let mut lhs = operand(self)?;
        while let Some(op) = self.peek().and_then(&operator) {
            self.next()?;
            let rhs = operand(self)?;

            let location = Location::span(lhs.location().clone(), rhs.location());
            let kind = ExprKind::Binary(Box::new(lhs), op, Box::new(rhs));
            lhs = Located::at(Expr::new(kind), location);
        }

        Ok(lhs)
    }

    fn unary(&mut self) -> Parse<Located<Expr>> {
        match self.peek() {
            Some(Token::Not) => {
                let (start, _) = self.next()?.split();
                let operand = self.unary()?;

                let location = Location::span(start, operand.location());
                Ok(Located::at(
                    Expr::new(ExprKind::Not(Box::new(operand))),
                    location,
                ))
            }

            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Parse<Located<Expr>> {
        let mut expr = self.atom()?;

        loop {
            let start = expr.location().clone();
            let kind = match self.peek() {
                Some(Token::OpenSquare) => {
                    self.next()?;
                    let index = self.expr()?;
                    self.expect(Token::CloseSquare)?;

                    ExprKind::Index {
                        array: Box::new(expr),
                        index: Box::new(index),
                    }
                }

                Some(Token::Period) => {
                    self.next()?;
                    match self.peek() {
                        Some(Token::Keyword(Keyword::Length)) => {
                            self.next()?;
                            ExprKind::Length(Box::new(expr))
                        }

                        _ => {
                            let method = self.id()?;
                            self.expect(Token::OpenParen)?;
                            let arguments = match self.peek() {
                                Some(Token::CloseParen) => Vec::new(),
                                _ => self.comma_separated(Parser::expr)?,
                            };
                            self.expect(Token::CloseParen)?;

                            ExprKind::Call(Box::new(Call {
                                receiver: expr,
                                method,
                                arguments,
                                resolved: None,
                            }))
                        }
                    }
                }

                _ => break Ok(expr),
            };

            let location = Location::span(start, &self.last_known);
            expr = Located::at(Expr::new(kind), location);
        }
    }

    fn atom(&mut self) -> Parse<Located<Expr>> {
        let (location, token) = self.next()?.split();
        let kind = match token {
            Token::IntLiteral(integer) => ExprKind::Integer(integer),
            Token::Keyword(Keyword::True) => ExprKind::True,
            Token::Keyword(Keyword::False) => ExprKind::False,
            Token::Keyword(Keyword::This) => ExprKind::This,
            Token::Id(id) => ExprKind::Read(Variable::new(Located::at(id, location.clone()))),

            Token::OpenParen => {
                let expr = self.expr()?;
                self.expect(Token::CloseParen)?;

                // Los paréntesis no dejan rastro en el árbol
                return Ok(expr);
            }

            Token::Keyword(Keyword::New) => match self.peek() {
                Some(Token::Keyword(Keyword::Int)) => {
                    self.next()?;
                    self.expect(Token::OpenSquare)?;
                    let length = self.expr()?;
                    self.expect(Token::CloseSquare)?;

                    let location = Location::span(location, &self.last_known);
                    return Ok(Located::at(
                        Expr::new(ExprKind::NewArray(Box::new(length))),
                        location,
                    ));
                }

                _ => {
                    let class = self.id()?;
                    self.expect(Token::OpenParen)?;
                    self.expect(Token::CloseParen)?;

                    let location = Location::span(location, &self.last_known);
                    return Ok(Located::at(
                        Expr::new(ExprKind::NewObject(class)),
                        location,
                    ));
                }
            },

            _ => return self.fail(ParserError::ExpectedExpr),
        };

        Ok(Located::at(Expr::new(kind), location))
    }

    fn attempt<T, F>(&mut self, rule: F) -> Parse<T>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        let mut fork = self.clone();

        let result = rule(&mut fork);
        if result.is_ok() {
            *self = fork;
        }

        result
    }

    fn comma_separated<T, F>(&mut self, mut rule: F) -> Parse<Vec<T>>
    where
        F: FnMut(&mut Self) -> Parse<T>,
    {
        let mut items = vec![rule(self)?];
        while let Some(Token::Comma) = self.peek() {
            self.next()?;
            items.push(rule(self)?);
        }

        Ok(items)
    }

    fn id(&mut self) -> Parse<Located<Identifier>> {
        let (location, token) = self.next()?.split();
        match token {
            Token::Id(id) => Ok(Located::at(id, location)),
            _ => self.fail(ParserError::ExpectedId),
        }
    }

    fn keyword(&mut self, keyword: Keyword) -> Parse<()> {
        self.expect(Token::Keyword(keyword))
    }

    fn expect(&mut self, token: Token) -> Parse<()> {
        match self.next().map(Located::into_inner) {
            Ok(found) if found == token => Ok(()),
            Ok(found) => self.fail(ParserError::UnexpectedToken(token, found)),
            Err(_) => self.fail(ParserError::MissingToken(token)),
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.cursor).map(Located::as_ref)
    }

    fn next(&mut self) -> Parse<Located<Token>> {
        match self.tokens.get(self.cursor) {
            Some(token) => {
                self.cursor += 1;
                self.last_known = token.location().clone();
                Ok(token.clone())
            }

            None => {
                self.last_known = self.eof.clone();
                self.fail(ParserError::UnexpectedEof)
            }
        }
    }

    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        Err(Failure::Strict(Located::at(error, self.last_known.clone())))
    }
}
