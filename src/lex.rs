//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone un [`Source`]
//! en unidades léxicas denominadas tokens. Los espacios en blanco y
//! los comentarios se descartan durante esta operación. Cada token
//! emitido está asociado a una ubicación en el código fuente original,
//! lo cual permite rastrear errores en tanto los mismos como constructos
//! más elevados de fases posteriores.
//!
//! # Contenido de un token
//! Operadores, puntuación y palabras clave se identifican por el hecho
//! de lo que son y no incluyen lexemas. Los identificadores sí incluyen
//! su lexema original. Las constantes literales se resuelven a sus
//! valores en vez de preservar sus lexemas.
//!
//! # Reglas importantes del lenguaje
//! - El lenguaje distingue mayúsculas de minúsculas.
//! - `System.out.println` es un único token, aunque contenga puntos.
//! - Se admiten comentarios de línea (`//`) y de bloque (`/* */`).
//!
//! # Errores
//! El lexer es capaz de recuperarse parcialmente de condiciones de error.
//! Esto ocurre en suficiente grado como para reportar más de un error por
//! ejecución, pero no lo suficiente como para permitir el avance a las
//! demás fases de la compilación.

use crate::source::{Located, Location, Position, Source};
use std::{
    fmt::{self, Display},
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;

/// Literal entero máximo.
const INT_MAX: i32 = i32::MAX;

/// Secuencia que, precedida por `System`, forma [`Keyword::Println`].
const PRINTLN_TAIL: &str = ".out.println";

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Se esperaba un carácter específico en esta posición.
    #[error("Expected {0:?}")]
    Expected(char),

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, {INT_MAX}]")]
    IntOverflow,

    /// Un comentario de bloque no fue cerrado antes del fin de archivo.
    #[error("Unterminated block comment")]
    UnterminatedComment,
}

/// Un identificador.
///
/// Los identificadores son baratos de clonar, ya que el compilador
/// los utiliza como llaves en todas sus tablas de símbolos.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Rc<str>);

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Identifier(Rc::from(name))
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// Literal de entero.
    IntLiteral(i32),

    /// `=`
    Assign,

    /// `,`
    Comma,

    /// `.`
    Period,

    /// `;`
    Semicolon,

    /// `!`
    Not,

    /// `&&`
    And,

    /// `<`
    Less,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `[`
    OpenSquare,

    /// `]`
    CloseSquare,

    /// `{`
    OpenCurly,

    /// `}`
    CloseCurly,
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            IntLiteral(integer) => write!(fmt, "literal `{}`", integer),
            Assign => fmt.write_str("`=`"),
            Comma => fmt.write_str("`,`"),
            Period => fmt.write_str("`.`"),
            Semicolon => fmt.write_str("`;`"),
            Not => fmt.write_str("`!`"),
            And => fmt.write_str("`&&`"),
            Less => fmt.write_str("`<`"),
            Plus => fmt.write_str("`+`"),
            Minus => fmt.write_str("`-`"),
            Times => fmt.write_str("`*`"),
            OpenParen => fmt.write_str("`(`"),
            CloseParen => fmt.write_str("`)`"),
            OpenSquare => fmt.write_str("`[`"),
            CloseSquare => fmt.write_str("`]`"),
            OpenCurly => fmt.write_str("`{`"),
            CloseCurly => fmt.write_str("`}`"),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Class,
    Public,
    Static,
    Void,
    Main,
    String,
    Extends,
    Return,
    Int,
    Boolean,
    If,
    Else,
    While,
    Println,
    Length,
    True,
    False,
    This,
    New,
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;
        let string = match self {
            Class   => "class",
            Public  => "public",
            Static  => "static",
            Void    => "void",
            Main    => "main",
            String  => "String",
            Extends => "extends",
            Return  => "return",
            Int     => "int",
            Boolean => "boolean",
            If      => "if",
            Else    => "else",
            While   => "while",
            Println => "System.out.println",
            Length  => "length",
            True    => "true",
            False   => "false",
            This    => "this",
            New     => "new",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use Keyword::*;

        const KEYWORDS: &[(&str, Keyword)] = &[
            ("class",   Class),
            ("public",  Public),
            ("static",  Static),
            ("void",    Void),
            ("main",    Main),
            ("String",  String),
            ("extends", Extends),
            ("return",  Return),
            ("int",     Int),
            ("boolean", Boolean),
            ("if",      If),
            ("else",    Else),
            ("while",   While),
            ("length",  Length),
            ("true",    True),
            ("false",   False),
            ("this",    This),
            ("new",     New),
        ];

        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
pub struct Lexer {
    source: Rc<Source>,
    chars: Vec<(char, Position)>,
    cursor: usize,
    state: State,
    start: Position,
    last: Position,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de error.
    Error,

    /// Estado de completitud; siempre emite el token incluido,
    /// consume la entrada actual y pasa a [`State::Start`].
    Complete(Token),

    /// Se encontró `&`, debe seguir otro `&`.
    Ampersand,

    /// Se encontró `/`.
    ///
    /// Debería seguir otro `/` o un `*` para entrar en un comentario.
    Slash,

    /// Comentario de línea.
    ///
    /// Este estado vuelve a [`State::Start`] al encontrar `'\n'`.
    LineComment,

    /// Interior de un comentario de bloque.
    BlockComment,

    /// Se encontró `*` dentro de un comentario de bloque.
    BlockCommentStar,

    /// Constante entera.
    ///
    /// Este estado incluirá dígitos en el token mientras que
    /// el siguiente carácter sea un dígito.
    Integer(i32),

    /// Término que puede ser un identificador o una palabra clave.
    Word(String),
}

impl Lexer {
    /// Crea un lexer en estado inicial a partir de un origen.
    pub fn new(source: Rc<Source>) -> Self {
        let chars = source.chars().collect();
        Lexer {
            source,
            chars,
            cursor: 0,
            state: State::Start,
            start: Position::default(),
            last: Position::default(),
        }
    }

    /// Reduce la entrada a sea una secuencia conocida de tokens
    /// infalibles o una secuencia de errores.
    ///
    /// En caso de que ocurra al menos un error, el lexer dejará
    /// de buscar tokens exitosos y comenzará a acumular solamente
    /// errores. El propósito de esta función es permitir la
    /// recolección de múltiples errores léxicos en una misma ejecución
    /// del compilador.
    pub fn try_exhaustive(mut self) -> Result<Vec<Located<Token>>, Vec<Located<LexerError>>> {
        let mut tokens = Vec::new();

        while let Some(result) = self.next() {
            match result {
                Ok(token) => tokens.push(token),
                Err(error) => {
                    drop(tokens);

                    let mut errors = vec![error];
                    errors.extend(self.filter_map(Result::err));

                    return Err(errors);
                }
            }
        }

        log::debug!("lexed {} tokens from {}", tokens.len(), self.source.name());
        Ok(tokens)
    }

    /// Ubicación inmediatamente posterior al último carácter.
    pub fn eof(&self) -> Location {
        Location::at_position(&self.source, self.source.eof())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.cursor).map(|&(c, _)| c)
    }

    fn here(&self) -> Position {
        self.chars
            .get(self.cursor)
            .map(|&(_, position)| position)
            .unwrap_or_else(|| self.source.eof())
    }

    fn bump(&mut self) {
        if let Some(&(_, position)) = self.chars.get(self.cursor) {
            self.last = position;
            self.cursor += 1;
        }
    }

    /// Consume `literal` si y solo si aparece completo a continuación.
    fn accept(&mut self, literal: &str) -> bool {
        let ahead = self.chars[self.cursor..].iter().map(|&(c, _)| c);
        let matches = literal.chars().count() <= self.chars.len() - self.cursor
            && ahead.zip(literal.chars()).all(|(found, expected)| found == expected);

        if matches {
            for _ in literal.chars() {
                self.bump();
            }
        }

        matches
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<Token>, LexerError> {
        use {State::*, Token::*};

        loop {
            let next_char = self.peek();

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                self.start = self.here();
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char) {
                // Condiciones de error: se descarta la línea donde
                // ocurrió el error. Al llegar al final de la línea
                // el lexer se recupera y reinicia.
                (Error, None) => return Ok(None),
                (Error, Some('\n')) => self.state = Start,
                (Error, Some(_)) => (),

                // Tokens triviales
                (Start, None) => return Ok(None),
                (Start, Some('=')) => self.state = Complete(Assign),
                (Start, Some(',')) => self.state = Complete(Comma),
                (Start, Some('.')) => self.state = Complete(Period),
                (Start, Some(';')) => self.state = Complete(Semicolon),
                (Start, Some('!')) => self.state = Complete(Not),
                (Start, Some('<')) => self.state = Complete(Less),
                (Start, Some('+')) => self.state = Complete(Plus),
                (Start, Some('-')) => self.state = Complete(Minus),
                (Start, Some('*')) => self.state = Complete(Times),
                (Start, Some('(')) => self.state = Complete(OpenParen),
                (Start, Some(')')) => self.state = Complete(CloseParen),
                (Start, Some('[')) => self.state = Complete(OpenSquare),
                (Start, Some(']')) => self.state = Complete(CloseSquare),
                (Start, Some('{')) => self.state = Complete(OpenCurly),
                (Start, Some('}')) => self.state = Complete(CloseCurly),
                (Start, Some('&')) => self.state = Ampersand,
                (Start, Some('/')) => self.state = Slash,

                // Identificadores y palabras clave
                (Start, Some(c)) if c.is_ascii_alphabetic() => self.state = Word(c.to_string()),

                // Inicio de una constante numérica. No se consume
                // el dígito, ya que esta lógica ya está implementada
                // en el respectivo caso para un estado de constante
                // entera. Por tanto, la constante es inicialmente cero.
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Integer(0);
                    continue;
                }

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_ascii_whitespace() => (),
                (Start, Some(c)) => return Err(LexerError::BadChar(c)),

                // Emisión retardada de tokens cualesquiera
                (Complete(token), _) => return Ok(Some(std::mem::replace(token, Comma))),

                (Ampersand, Some('&')) => self.state = Complete(And),
                (Ampersand, _) => return Err(LexerError::Expected('&')),

                // `/` siempre debería iniciar un comentario
                (Slash, Some('/')) => self.state = LineComment,
                (Slash, Some('*')) => self.state = BlockComment,
                (Slash, _) => return Err(LexerError::Expected('/')),

                // Los comentarios de línea descartan la línea donde ocurren
                (LineComment, Some('\n')) | (LineComment, None) => self.state = Start,
                (LineComment, Some(_)) => (),

                (BlockComment, Some('*')) => self.state = BlockCommentStar,
                (BlockComment, Some(_)) => (),
                (BlockCommentStar, Some('/')) => self.state = Start,
                (BlockCommentStar, Some('*')) => (),
                (BlockCommentStar, Some(_)) => self.state = BlockComment,
                (BlockComment, None) | (BlockCommentStar, None) => {
                    return Err(LexerError::UnterminatedComment)
                }

                // Acumulación dígito por dígito de constantes enteras
                (Integer(accumulated), Some(digit)) if digit.is_ascii_digit() => {
                    let digit = digit as i32 - '0' as i32;

                    match accumulated
                        .checked_mul(10)
                        .and_then(|n| n.checked_add(digit))
                    {
                        Some(result) => *accumulated = result,
                        None => return Err(LexerError::IntOverflow),
                    }
                }

                // Si sigue algo que no es un dígito, la constante ha terminado
                (Integer(integer), _) => return Ok(Some(IntLiteral(*integer))),

                // Extensión de términos
                (Word(word), Some(c)) if is_word_char(c) => word.push(c),

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word(word), _) => {
                    let word = std::mem::take(word);
                    let token = if word == "System" && self.accept(PRINTLN_TAIL) {
                        Keyword(self::Keyword::Println)
                    } else if let Ok(keyword) = self::Keyword::from_str(&word) {
                        Keyword(keyword)
                    } else {
                        Id(Identifier::from(word))
                    };

                    return Ok(Some(token));
                }
            }

            // Si no hubo `continue` ni `return`, aquí se consume el
            // carácter que se observó con lookahead anteriormente
            self.bump();
        }
    }
}

impl Iterator for Lexer {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lex() {
            Ok(None) => None,
            Ok(Some(token)) => {
                self.state = State::Start;

                let location = Location::new(&self.source, self.start..self.last.advance());
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                self.state = State::Error;
                Some(Err(Located::at(
                    error,
                    Location::at_position(&self.source, self.here()),
                )))
            }
        }
    }
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
