//! Literal-only value parser for payloads embedded in solver logs.
//!
//! Accepts numbers (including `NaN`/`Inf`), booleans and nested bracketed
//! lists. Identifiers, calls and operators are rejected; nothing is evaluated.

const MAX_NESTING_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Number(f64),
    Bool(bool),
    List(Vec<LiteralValue>),
}

impl LiteralValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Flat list of numbers.
    pub fn as_vector(&self) -> Option<Vec<f64>> {
        match self {
            Self::List(items) => items.iter().map(Self::as_number).collect(),
            _ => None,
        }
    }

    /// Non-ragged list of flat numeric lists.
    pub fn as_matrix(&self) -> Option<Vec<Vec<f64>>> {
        let Self::List(rows) = self else {
            return None;
        };
        let matrix = rows.iter().map(Self::as_vector).collect::<Option<Vec<_>>>()?;
        let width = matrix.first().map_or(0, Vec::len);
        matrix.iter().all(|row| row.len() == width).then_some(matrix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid literal at offset {offset}: {reason}")]
pub struct LiteralError {
    pub offset: usize,
    pub reason: String,
}

pub fn parse_literal(source: &str) -> Result<LiteralValue, LiteralError> {
    let mut cursor = Cursor {
        bytes: source.as_bytes(),
        source,
        position: 0,
    };
    cursor.skip_whitespace();
    let value = cursor.parse_value(0)?;
    cursor.skip_whitespace();
    if cursor.position != cursor.bytes.len() {
        return Err(cursor.error("unexpected trailing input"));
    }
    Ok(value)
}

/// A single numeric token such as `-1.5e-3` or `NaN`.
pub fn parse_number_token(token: &str) -> Result<f64, LiteralError> {
    match parse_literal(token)? {
        LiteralValue::Number(value) => Ok(value),
        _ => Err(LiteralError {
            offset: 0,
            reason: format!("expected a number, got '{token}'"),
        }),
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    source: &'a str,
    position: usize,
}

impl Cursor<'_> {
    fn error(&self, reason: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.position,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.position).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|byte| byte.is_ascii_whitespace()) {
            self.position += 1;
        }
    }

    fn parse_value(&mut self, depth: usize) -> Result<LiteralValue, LiteralError> {
        match self.peek() {
            Some(b'[') => self.parse_list(depth),
            Some(byte) if byte == b'+' || byte == b'-' || byte == b'.' || byte.is_ascii_digit() => {
                self.parse_number()
            }
            Some(byte) if byte.is_ascii_alphabetic() => self.parse_word(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_list(&mut self, depth: usize) -> Result<LiteralValue, LiteralError> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(self.error("list nesting is too deep"));
        }
        self.position += 1;
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            if self.peek() == Some(b']') {
                self.position += 1;
                return Ok(LiteralValue::List(items));
            }

            items.push(self.parse_value(depth + 1)?);
            self.skip_whitespace();

            match self.peek() {
                Some(b',') => self.position += 1,
                Some(b']') => {}
                Some(_) => return Err(self.error("expected ',' or ']'")),
                None => return Err(self.error("list is not closed")),
            }
        }
    }

    fn parse_number(&mut self) -> Result<LiteralValue, LiteralError> {
        let start = self.position;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.position += 1;
        }
        if self.peek().is_some_and(|byte| byte.is_ascii_alphabetic()) {
            let negative = self.bytes[start] == b'-';
            return match self.parse_word()? {
                LiteralValue::Number(value) if value.is_infinite() && negative => {
                    Ok(LiteralValue::Number(f64::NEG_INFINITY))
                }
                LiteralValue::Number(value) if !value.is_finite() => Ok(LiteralValue::Number(value)),
                _ => Err(LiteralError {
                    offset: start,
                    reason: "sign must precede a number".to_string(),
                }),
            };
        }

        while let Some(byte) = self.peek() {
            let is_exponent_sign = matches!(byte, b'+' | b'-')
                && self.position > start
                && matches!(self.bytes[self.position - 1], b'e' | b'E');
            if byte.is_ascii_digit() || matches!(byte, b'.' | b'e' | b'E') || is_exponent_sign {
                self.position += 1;
            } else {
                break;
            }
        }

        let token = &self.source[start..self.position];
        token
            .parse::<f64>()
            .map(LiteralValue::Number)
            .map_err(|_| LiteralError {
                offset: start,
                reason: format!("'{token}' is not a number"),
            })
    }

    fn parse_word(&mut self) -> Result<LiteralValue, LiteralError> {
        let start = self.position;
        while self
            .peek()
            .is_some_and(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
        {
            self.position += 1;
        }

        match &self.source[start..self.position] {
            "true" | "True" => Ok(LiteralValue::Bool(true)),
            "false" | "False" => Ok(LiteralValue::Bool(false)),
            "NaN" | "nan" => Ok(LiteralValue::Number(f64::NAN)),
            "Inf" | "inf" => Ok(LiteralValue::Number(f64::INFINITY)),
            word => Err(LiteralError {
                offset: start,
                reason: format!("identifier '{word}' is not a literal"),
            }),
        }
    }
}
