//! Text forms of values: `display` for people, `write` for the reader.

use std::fmt::Write as _;

use crate::values::Value;

/// Characters that force a symbol to be written between bars.
const SYMBOL_SPECIAL: &[char] = &['(', ')', '"', ';', '\'', '`', ',', '|', '\\'];

pub fn display_string(value: &Value) -> String {
    let mut out = String::new();
    print_value(&mut out, value, false);
    out
}

pub fn write_string(value: &Value) -> String {
    let mut out = String::new();
    print_value(&mut out, value, true);
    out
}

fn print_value(out: &mut String, value: &Value, quoted: bool) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("#t"),
        Value::Bool(false) => out.push_str("#f"),
        Value::Char(c) if quoted => write_char(out, *c),
        Value::Char(c) => out.push(*c),
        Value::Int(v) => {
            let _ = write!(out, "{v}");
        }
        Value::Long(v) => {
            let _ = write!(out, "{v}");
        }
        Value::Double(v) => {
            let _ = write!(out, "{v:?}");
        }
        Value::Text(text) if quoted => write_text(out, text),
        Value::Text(text) => out.push_str(text),
        Value::Symbol(sym) if quoted && needs_bars(sym.as_str()) => {
            out.push('|');
            for c in sym.as_str().chars() {
                if c == '|' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('|');
        }
        Value::Symbol(sym) => out.push_str(sym.as_str()),
        Value::List(items) => {
            out.push('(');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(' ');
                }
                print_value(out, item, quoted);
            }
            out.push(')');
        }
        Value::Procedure(callable) => {
            let _ = write!(out, "#<procedure {}>", callable.name());
        }
        Value::Host(obj) => {
            let _ = write!(out, "#<{}>", obj.type_name());
        }
    }
}

fn write_char(out: &mut String, c: char) {
    out.push_str("#\\");
    match c {
        ' ' => out.push_str("space"),
        '\n' => out.push_str("newline"),
        '\t' => out.push_str("tab"),
        '\r' => out.push_str("return"),
        '\0' => out.push_str("nul"),
        c if c.is_control() => {
            let _ = write!(out, "x{:x}", c as u32);
        }
        c => out.push(c),
    }
}

fn write_text(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Would the reader turn this text into something other than this symbol?
fn needs_bars(name: &str) -> bool {
    if name.is_empty() || name == "." {
        return true;
    }
    if name.chars().any(|c| c.is_whitespace() || SYMBOL_SPECIAL.contains(&c)) {
        return true;
    }
    if name.starts_with('#') {
        return true;
    }
    name.starts_with(|c: char| c == '-' || c == '.' || c.is_ascii_digit())
        && name.parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_write_differ_on_text_and_chars() {
        let value = Value::list(vec![
            Value::text("a \"b\""),
            Value::Char('x'),
            Value::Char(' '),
            Value::Int(1),
            Value::Double(2.0),
            Value::Null,
            Value::Bool(true),
        ]);
        assert_eq!(display_string(&value), "(a \"b\" x   1 2.0 null #t)");
        assert_eq!(
            write_string(&value),
            "(\"a \\\"b\\\"\" #\\x #\\space 1 2.0 null #t)"
        );
    }

    #[test]
    fn awkward_symbols_are_barred_when_written() {
        assert_eq!(write_string(&Value::symbol("a b")), "|a b|");
        assert_eq!(write_string(&Value::symbol("42")), "|42|");
        assert_eq!(write_string(&Value::symbol("-")), "-");
        assert_eq!(write_string(&Value::symbol("symbol->string")), "symbol->string");
        assert_eq!(display_string(&Value::symbol("a b")), "a b");
    }
}
