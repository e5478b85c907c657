//! Query path parser.
//!
//! Grammar (whitespace is significant):
//!
//! ```text
//! path     := ["$"] [name] step*
//! step     := "." name | "[" index "]" | "[" quoted "]"
//! name     := one or more chars other than '.', '[' and ']'
//! index    := ASCII digits
//! quoted   := '"' chars '"' | "'" chars "'"   (backslash escapes the quote and backslash)
//! ```
//!
//! An empty path (or a lone `$`) addresses the whole document.

use std::fmt::{self, Write};
use std::str::FromStr;

use thiserror::Error;

/// Longest query accepted, in bytes
pub const MAX_QUERY_LENGTH: usize = 1024;

/// Most segments a single path may contain
pub const MAX_SEGMENTS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("query exceeds {MAX_QUERY_LENGTH} bytes")]
    TooLong,

    #[error("query has more than {MAX_SEGMENTS} segments")]
    TooManySegments,

    #[error("empty field name at byte {0}")]
    EmptyField(usize),

    #[error("unterminated bracket starting at byte {0}")]
    UnterminatedBracket(usize),

    #[error("invalid index at byte {0}")]
    InvalidIndex(usize),

    #[error("unexpected character {1:?} at byte {0}")]
    Unexpected(usize, char),
}

// == Segment ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Object member, from `.name` or `["name"]`
    Field(String),
    /// Array position, from `[3]`
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => {
                // Only the quote and the backslash are escaped; `quoted`
                // takes every other character literally.
                f.write_str("[\"")?;
                for c in name.chars() {
                    if c == '"' || c == '\\' {
                        f.write_char('\\')?;
                    }
                    f.write_char(c)?;
                }
                f.write_str("\"]")
            }
            Segment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

// == Query Path ==
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryPath {
    segments: Vec<Segment>,
}

impl QueryPath {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    fn push(&mut self, segment: Segment) -> Result<(), PathError> {
        if self.segments.len() == MAX_SEGMENTS {
            return Err(PathError::TooManySegments);
        }
        self.segments.push(segment);
        Ok(())
    }
}

impl fmt::Display for QueryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for QueryPath {
    type Err = PathError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.len() > MAX_QUERY_LENGTH {
            return Err(PathError::TooLong);
        }

        let mut parser = Parser {
            chars: input.char_indices().peekable(),
            len: input.len(),
        };
        let mut path = QueryPath::default();

        parser.eat('$');
        if let Some(&(_, c)) = parser.chars.peek() {
            if c != '.' && c != '[' {
                path.push(Segment::Field(parser.name()?))?;
            }
        }

        while let Some((at, c)) = parser.chars.next() {
            let segment = match c {
                '.' => Segment::Field(parser.name()?),
                '[' => parser.bracket(at)?,
                other => return Err(PathError::Unexpected(at, other)),
            };
            path.push(segment)?;
        }

        Ok(path)
    }
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    len: usize,
}

impl Parser<'_> {
    fn eat(&mut self, expected: char) -> bool {
        if matches!(self.chars.peek(), Some(&(_, c)) if c == expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn position(&mut self) -> usize {
        self.chars.peek().map(|&(at, _)| at).unwrap_or(self.len)
    }

    fn name(&mut self) -> Result<String, PathError> {
        let start = self.position();
        let mut name = String::new();
        while let Some(&(at, c)) = self.chars.peek() {
            match c {
                '.' | '[' => break,
                ']' => return Err(PathError::Unexpected(at, c)),
                _ => {
                    name.push(c);
                    self.chars.next();
                }
            }
        }
        if name.is_empty() {
            return Err(PathError::EmptyField(start));
        }
        Ok(name)
    }

    fn bracket(&mut self, open: usize) -> Result<Segment, PathError> {
        let segment = match self.chars.peek() {
            Some(&(_, quote @ ('"' | '\''))) => {
                self.chars.next();
                Segment::Field(self.quoted(open, quote)?)
            }
            Some(_) => Segment::Index(self.index()?),
            None => return Err(PathError::UnterminatedBracket(open)),
        };
        if !self.eat(']') {
            return Err(PathError::UnterminatedBracket(open));
        }
        Ok(segment)
    }

    fn quoted(&mut self, open: usize, quote: char) -> Result<String, PathError> {
        let mut name = String::new();
        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => return Ok(name),
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, escaped)) => name.push(escaped),
                    None => return Err(PathError::UnterminatedBracket(open)),
                },
                Some((_, c)) => name.push(c),
                None => return Err(PathError::UnterminatedBracket(open)),
            }
        }
    }

    fn index(&mut self) -> Result<usize, PathError> {
        let start = self.position();
        let mut digits = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(c);
            self.chars.next();
        }
        digits
            .parse::<u32>()
            .map(|index| index as usize)
            .map_err(|_| PathError::InvalidIndex(start))
    }
}
