//! S-expression reader.

use std::iter::Peekable;
use std::str::Chars;

use crate::runtime::RuntimeError;
use crate::values::Value;

enum Token {
    Datum(Value),
    Close,
    Dot,
    Eof,
}

/// Reads successive data from a source string.
pub struct Reader<'a> {
    chars: Peekable<Chars<'a>>,
}

/// Read every datum in `src`.
pub fn read_all(src: &str) -> Result<Vec<Value>, RuntimeError> {
    let mut reader = Reader::new(src);
    let mut out = Vec::new();
    while let Some(value) = reader.read()? {
        out.push(value);
    }
    Ok(out)
}

fn syntax(message: impl Into<String>) -> RuntimeError {
    RuntimeError::Syntax(message.into())
}

fn is_token_break(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"')
}

impl<'a> Reader<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().peekable(),
        }
    }

    /// Next datum, or `None` at end of input.
    pub fn read(&mut self) -> Result<Option<Value>, RuntimeError> {
        match self.token()? {
            Token::Datum(value) => Ok(Some(value)),
            Token::Eof => Ok(None),
            Token::Close => Err(syntax("unexpected )")),
            Token::Dot => Err(syntax("unexpected .")),
        }
    }

    fn required(&mut self, context: &str) -> Result<Value, RuntimeError> {
        match self.token()? {
            Token::Datum(value) => Ok(value),
            Token::Eof => Err(syntax(format!("unexpected end of input after {context}"))),
            Token::Close => Err(syntax(format!("unexpected ) after {context}"))),
            Token::Dot => Err(syntax(format!("unexpected . after {context}"))),
        }
    }

    fn wrapped(&mut self, head: &str, context: &str) -> Result<Token, RuntimeError> {
        let datum = self.required(context)?;
        Ok(Token::Datum(Value::list(vec![Value::symbol(head), datum])))
    }

    fn token(&mut self) -> Result<Token, RuntimeError> {
        loop {
            while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
            let Some(c) = self.chars.next() else {
                return Ok(Token::Eof);
            };
            return match c {
                ';' => {
                    while self.chars.next_if(|c| *c != '\n').is_some() {}
                    continue;
                }
                '(' => self.list().map(Token::Datum),
                ')' => Ok(Token::Close),
                '"' => self.quoted('"').map(|text| Token::Datum(Value::text(&text))),
                '|' => self.quoted('|').map(|text| Token::Datum(Value::symbol(&text))),
                '\'' => self.wrapped("quote", "'"),
                '`' => self.wrapped("quasiquote", "`"),
                ',' => {
                    if self.chars.next_if_eq(&'@').is_some() {
                        self.wrapped("unquote-splicing", ",@")
                    } else {
                        self.wrapped("unquote", ",")
                    }
                }
                '#' => match self.chars.peek().copied() {
                    Some('(') => {
                        self.chars.next();
                        self.list().map(Token::Datum)
                    }
                    Some(';') => {
                        self.chars.next();
                        self.required("#;")?;
                        continue;
                    }
                    Some('\\') => {
                        self.chars.next();
                        self.character().map(Token::Datum)
                    }
                    Some(next) if !is_token_break(next) => self.atom(c),
                    _ => Err(syntax("#")),
                },
                _ => self.atom(c),
            };
        }
    }

    fn list(&mut self) -> Result<Value, RuntimeError> {
        let mut items = Vec::new();
        loop {
            match self.token()? {
                Token::Close => return Ok(Value::list(items)),
                Token::Eof => return Err(syntax("unexpected end of input in list")),
                Token::Datum(value) => items.push(value),
                Token::Dot => match self.token()? {
                    Token::Datum(Value::List(tail)) => items.extend(tail.iter().cloned()),
                    Token::Datum(value) => {
                        items.push(Value::symbol("."));
                        items.push(value);
                    }
                    Token::Close => {
                        items.push(Value::symbol("."));
                        return Ok(Value::list(items));
                    }
                    Token::Dot => items.extend([Value::symbol("."), Value::symbol(".")]),
                    Token::Eof => return Err(syntax("unexpected end of input in list")),
                },
            }
        }
    }

    /// Body of a `"string"` or `|symbol|`; the opening delimiter is consumed.
    fn quoted(&mut self, end: char) -> Result<String, RuntimeError> {
        let mut out = String::new();
        loop {
            let Some(c) = self.chars.next() else {
                return Err(syntax(format!("unterminated {end}")));
            };
            if c == end {
                return Ok(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            let Some(escaped) = self.chars.next() else {
                return Err(syntax(format!("unterminated {end}")));
            };
            match escaped {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'a' => out.push('\u{7}'),
                '0' => out.push('\0'),
                'x' => {
                    let mut hex = String::new();
                    while let Some(digit) = self.chars.next_if(|c| *c != ';') {
                        hex.push(digit);
                    }
                    if self.chars.next_if_eq(&';').is_none() {
                        return Err(syntax(format!("bad escape \\x{hex}")));
                    }
                    let ch = u32::from_str_radix(&hex, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| syntax(format!("bad escape \\x{hex};")))?;
                    out.push(ch);
                }
                other => out.push(other),
            }
        }
    }

    /// `#\x` characters, by literal, name, or `xHEX`.
    fn character(&mut self) -> Result<Value, RuntimeError> {
        let Some(first) = self.chars.next() else {
            return Err(syntax("#\\"));
        };
        let mut name = String::from(first);
        while let Some(c) = self.chars.next_if(|c| !is_token_break(*c)) {
            name.push(c);
        }
        if name.chars().count() == 1 {
            return Ok(Value::Char(first));
        }
        if let Some(hex) = name.strip_prefix(['x', 'X']) {
            if let Some(ch) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                return Ok(Value::Char(ch));
            }
        }
        let ch = match name.to_ascii_lowercase().as_str() {
            "space" => ' ',
            "newline" | "linefeed" => '\n',
            "tab" => '\t',
            "return" => '\r',
            "nul" | "null" => '\0',
            "alarm" => '\u{7}',
            "backspace" => '\u{8}',
            "escape" | "altmode" => '\u{1b}',
            "delete" | "rubout" => '\u{7f}',
            _ => return Err(syntax(format!("unknown character #\\{name}"))),
        };
        Ok(Value::Char(ch))
    }

    fn atom(&mut self, first: char) -> Result<Token, RuntimeError> {
        let mut text = String::new();
        let mut escaped = false;
        let mut c = first;
        loop {
            if c == '\\' {
                match self.chars.next() {
                    Some(literal) => text.push(literal),
                    None => return Err(syntax("trailing \\")),
                }
                escaped = true;
            } else {
                text.push(c);
            }
            match self.chars.next_if(|c| !is_token_break(*c)) {
                Some(next) => c = next,
                None => break,
            }
        }
        if escaped {
            return Ok(Token::Datum(Value::symbol(&text)));
        }
        Ok(parse_atom(&text))
    }
}

fn parse_atom(text: &str) -> Token {
    match text {
        "." => return Token::Dot,
        "#t" | "#true" | "#T" => return Token::Datum(Value::Bool(true)),
        "#f" | "#false" | "#F" => return Token::Datum(Value::Bool(false)),
        _ => {}
    }
    if text.starts_with(|c: char| c == '-' || c == '.' || c.is_ascii_digit()) {
        if let Ok(wide) = text.parse::<i64>() {
            return Token::Datum(match i32::try_from(wide) {
                Ok(narrow) => Value::Int(narrow),
                Err(_) => Value::Long(wide),
            });
        }
        if let Ok(float) = text.parse::<f64>() {
            return Token::Datum(Value::Double(float));
        }
    }
    Token::Datum(Value::symbol(text))
}
