//! `@db.` directives embedded in description text.
//!
//! ```text
//! Display name.
//! @db.length: 200
//! @db.unique
//! @db.index: { name: 'by_name', type: 'btree' }
//! ```
//!
//! Values are literals only: strings (single or double quoted), numbers, booleans,
//! `null`, arrays and objects of literals. Nothing is ever evaluated.

use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::model::Annotations;

/// Deepest array/object nesting a literal may have.
const MAX_DEPTH: usize = 32;

/// Extracts annotation maps from descriptions using a `@<namespace>.` marker.
#[derive(Debug, Clone)]
pub struct AnnotationParser {
    marker: String,
}

impl Default for AnnotationParser {
    fn default() -> Self {
        Self::new("db")
    }
}

impl AnnotationParser {
    pub fn new(namespace: &str) -> Self {
        Self {
            marker: format!("@{}.", namespace),
        }
    }

    /// Parse every marker line of `description`. Lines that fail to parse are logged and skipped.
    pub fn parse(&self, description: Option<&str>) -> Annotations {
        let mut annotations = Annotations::new();
        let Some(description) = description else {
            return annotations;
        };

        for line in description.lines() {
            let line = line.trim();
            let Some(rest) = line.strip_prefix(&self.marker) else {
                continue;
            };

            let (key, value) = match rest.split_once(':') {
                None => (rest.trim(), Ok(Value::Bool(true))),
                Some((key, raw)) => (key.trim(), parse_literal(raw)),
            };

            if key.is_empty() {
                warn!(line, "Annotation without a name");
                continue;
            }

            match value {
                Ok(value) => {
                    annotations.insert(key.to_string(), value);
                }
                Err(e) => warn!(annotation = key, error = %e, "Could not parse annotation value"),
            }
        }

        annotations
    }
}

/// Parse a single literal. Surrounding whitespace is allowed, anything else is an error.
pub fn parse_literal(input: &str) -> Result<Value, LiteralError> {
    let mut parser = LiteralParser {
        input: input.as_bytes(),
        src: input,
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos < parser.input.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

/// Error produced by the literal parser.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralError {
    pub position: usize,
    pub message: String,
}

impl std::fmt::Display for LiteralError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.message, self.position)
    }
}

impl std::error::Error for LiteralError {}

struct LiteralParser<'a> {
    input: &'a [u8],
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> LiteralParser<'a> {
    fn error(&self, message: &str) -> LiteralError {
        LiteralError {
            position: self.pos,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("expected a value")),
            Some(b'\'') | Some(b'"') => self.string().map(Value::String),
            Some(open @ (b'[' | b'{')) => {
                if self.depth == MAX_DEPTH {
                    return Err(self.error("nesting too deep"));
                }
                self.depth += 1;
                let value = if open == b'[' { self.array() } else { self.object() };
                self.depth -= 1;
                value
            }
            Some(b) if b == b'-' || b == b'+' || b == b'.' || b.is_ascii_digit() => self.number(),
            Some(b) if is_ident_start(b) => match self.ident() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "null" => Ok(Value::Null),
                _ => Err(self.error("identifiers are not literals")),
            },
            Some(_) => Err(self.error("unexpected character")),
        }
    }

    fn ident(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if is_ident_continue(b)) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let quote = self.input[self.pos];
        self.pos += 1;
        let mut out = String::new();
        loop {
            let rest = &self.src[self.pos..];
            let Some(c) = rest.chars().next() else {
                return Err(self.error("unterminated string"));
            };
            self.pos += c.len_utf8();
            match c {
                c if c as u32 == quote as u32 => return Ok(out),
                '\\' => {
                    let Some(escaped) = self.src[self.pos..].chars().next() else {
                        return Err(self.error("unterminated escape"));
                    };
                    self.pos += escaped.len_utf8();
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                c => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'-') | Some(b'+')) {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(b) if b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'_'))
            || (matches!(self.peek(), Some(b'-') | Some(b'+'))
                && matches!(self.input.get(self.pos - 1), Some(b'e') | Some(b'E')))
        {
            self.pos += 1;
        }
        let raw: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();
        let raw = raw.strip_prefix('+').unwrap_or(&raw);

        if let Ok(n) = raw.parse::<i64>() {
            return Ok(Value::Number(n.into()));
        }
        raw.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| LiteralError {
                position: start,
                message: format!("invalid number '{}'", raw),
            })
    }

    fn array(&mut self) -> Result<Value, LiteralError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b']') {
                self.pos += 1;
                return Ok(Value::Array(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {}
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn object(&mut self) -> Result<Value, LiteralError> {
        self.pos += 1;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            let key = match self.peek() {
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                Some(b'\'') | Some(b'"') => self.string()?,
                Some(b) if is_ident_start(b) => self.ident().to_string(),
                _ => return Err(self.error("expected an object key")),
            };
            self.skip_ws();
            if self.peek() != Some(b':') {
                return Err(self.error("expected ':'"));
            }
            self.pos += 1;
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}
