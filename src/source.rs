//! Rastreo de ubicaciones originales en código fuente.
//!
//! Todo nodo que el front end construye lleva consigo la región del
//! texto original de la cual proviene. Esto permite que cualquier fase
//! posterior, incluyendo elaboración, señale un punto exacto o
//! aproximado en donde ocurre un error.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::Range,
    rc::Rc,
};

/// Ancho de los divisores de tabulador.
const TAB_STOP: u32 = 4;

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    /// Transforma el valor con la misma ubicación.
    pub fn map<U, F>(self, map: F) -> Located<U>
    where
        F: FnOnce(T) -> U,
    {
        Located {
            value: map(self.value),
            location: self.location,
        }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

impl<T> AsMut<T> for Located<T> {
    fn as_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

/// Una ubicación está conformada por un origen y un rango de posiciones.
///
/// El final del rango es exclusivo: apunta a la columna inmediatamente
/// posterior al último carácter cubierto.
#[derive(Clone)]
pub struct Location {
    from: Rc<Source>,
    position: Range<Position>,
}

impl Location {
    /// Ubicación de un único carácter al inicio de un origen.
    pub fn start_of(source: &Rc<Source>) -> Self {
        Location::at_position(source, Position::default())
    }

    /// Construye a partir de un origen y un rango de posiciones.
    pub fn new(source: &Rc<Source>, position: Range<Position>) -> Self {
        Location {
            from: Rc::clone(source),
            position,
        }
    }

    /// Ubicación de un único carácter en una posición dada.
    pub fn at_position(source: &Rc<Source>, position: Position) -> Self {
        Location {
            from: Rc::clone(source),
            position: position..position.advance(),
        }
    }

    /// Unifica un rango de ubicaciones. Se asume el mismo origen.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            from: from.from,
            position: from.position.start..to.position.end,
        }
    }

    /// Obtiene la posición de inicio.
    pub fn start(&self) -> Position {
        self.position.start
    }

    /// Obtiene la posición de fin.
    pub fn end(&self) -> Position {
        self.position.end
    }

    /// Obtiene el origen.
    pub fn source(&self) -> &Source {
        &self.from
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:", self.from.name)?;

        let Range { start, end } = self.position;
        if end == start.advance() || end == start {
            // Solo se señala una columna en específico
            write!(formatter, "{}", start)
        } else {
            write!(formatter, "[{}-{}]", start, end.back())
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Una posición línea-columna en un archivo.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// Construye una posición. Ambas coordenadas inician en 1.
    pub fn new(line: u32, column: u32) -> Self {
        Position { line, column }
    }

    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Incrementa el número de columna.
    pub fn advance(self) -> Position {
        Position {
            line: self.line,
            column: self.column + 1,
        }
    }

    /// Decrementa el número de columna.
    pub fn back(self) -> Position {
        Position {
            line: self.line,
            column: self.column.max(2) - 1,
        }
    }

    /// Incrementa el número de línea y retorna a la columna 1.
    pub fn newline(self) -> Position {
        Position {
            line: self.line + 1,
            column: 1,
        }
    }

    /// Ajusta la posición a la siguiente columna de tabulador.
    pub fn tab(self) -> Position {
        let column = 1 + ((self.column - 1) / TAB_STOP + 1) * TAB_STOP;
        Position {
            line: self.line,
            column,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

/// Nombre de origen y contenido, línea por línea.
pub struct Source {
    name: String,
    lines: Vec<String>,
}

impl Source {
    /// Registra un texto completo bajo un nombre de origen.
    pub fn new<N, T>(name: N, text: T) -> Rc<Self>
    where
        N: Into<String>,
        T: AsRef<str>,
    {
        let lines = text.as_ref().lines().map(String::from).collect();
        Rc::new(Source {
            name: name.into(),
            lines,
        })
    }

    /// Nombre con el cual se identifica a este origen en diagnósticos.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoca `callback` con el contenido de una línea (1-based).
    ///
    /// Líneas inexistentes, como la posición de fin de archivo, se
    /// presentan como vacías.
    pub fn with_line<F, R>(&self, line: u32, callback: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let index = (line as usize).saturating_sub(1);
        callback(self.lines.get(index).map(String::as_str).unwrap_or(""))
    }

    /// Recorre el texto carácter por carácter.
    ///
    /// Cada carácter se acompaña de su propia posición. Las líneas
    /// terminan siempre en `'\n'`, incluso la última.
    pub fn chars(&self) -> impl Iterator<Item = (char, Position)> + '_ {
        self.lines
            .iter()
            .enumerate()
            .flat_map(|(line_index, line)| {
                let mut here = Position {
                    line: line_index as u32 + 1,
                    column: 1,
                };

                line.chars().chain(std::iter::once('\n')).map(move |c| {
                    let position = here;
                    here = match c {
                        '\n' => here.newline(),
                        '\t' => here.tab(),
                        _ => here.advance(),
                    };

                    (c, position)
                })
            })
    }

    /// Posición inmediatamente posterior al último carácter.
    pub fn eof(&self) -> Position {
        Position {
            line: self.lines.len() as u32 + 1,
            column: 1,
        }
    }
}

impl Debug for Source {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "Source({:?})", self.name)
    }
}
