//! Reversible mapping from surface names to member lookup keys.
//!
//! Surface names may contain punctuation that is legal in expressions but not
//! in identifiers (`+`, `->`, `?`). Member tables are keyed by the mangled form
//! so that `symbol->string` and `symbol_Gstring` name the same member.

use crate::intern::Symbol;

/// Punctuation and the code letter that stands for it.
const PUNCTUATION: &[(char, char)] = &[
    ('@', 'A'),
    ('!', 'B'),
    (':', 'C'),
    ('/', 'D'),
    ('=', 'E'),
    ('>', 'G'),
    ('#', 'H'),
    ('<', 'L'),
    ('&', 'M'),
    ('+', 'P'),
    ('?', 'Q'),
    ('*', 'T'),
    ('^', 'V'),
];

fn punctuation_code(c: char) -> Option<char> {
    PUNCTUATION
        .iter()
        .find_map(|&(punct, code)| (punct == c).then_some(code))
}

fn code_punctuation(code: char) -> Option<char> {
    PUNCTUATION
        .iter()
        .find_map(|&(punct, c)| (c == code).then_some(punct))
}

/// Mangle a surface name into its lookup key text.
pub fn mangle(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c == '-' {
            out.push('_');
        } else if c.is_ascii_uppercase() {
            out.push('U');
            out.push(c.to_ascii_lowercase());
        } else if let Some(code) = punctuation_code(c) {
            out.push(code);
        } else if c != '_' && c.is_alphanumeric() {
            out.push(c);
        } else {
            let code = c as u32;
            if code <= 0xFFFF {
                out.push_str(&format!("X{code:04x}"));
            } else {
                out.push_str(&format!("XX{code:06x}"));
            }
        }
    }
    out
}

/// Interned form of [`mangle`], cached on the name's symbol.
pub fn mangle_symbol(name: &str) -> Symbol {
    Symbol::intern(name).mangled()
}

/// Invert [`mangle`]. Returns `None` for text no surface name mangles to.
pub fn demangle(key: &str) -> Option<String> {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars();
    while let Some(c) = chars.next() {
        match c {
            '_' => out.push('-'),
            'U' => {
                let lower = chars.next().filter(|c| c.is_ascii_lowercase())?;
                out.push(lower.to_ascii_uppercase());
            }
            'X' => {
                let mut rest = chars.clone();
                let wide = rest.next() == Some('X');
                let digits = if wide { 6 } else { 4 };
                if wide {
                    chars.next();
                }
                let hex: String = chars.by_ref().take(digits).collect();
                if hex.len() != digits {
                    return None;
                }
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            c if c.is_ascii_uppercase() => out.push(code_punctuation(c)?),
            c => out.push(c),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangles_punctuation_and_case() {
        assert_eq!(mangle("symbol->string"), "symbol_Gstring");
        assert_eq!(mangle("set!"), "setB");
        assert_eq!(mangle("+"), "P");
        assert_eq!(mangle("-"), "_");
        assert_eq!(mangle("null?"), "nullQ");
        assert_eq!(mangle("Point"), "Upoint");
        assert_eq!(mangle("a_b"), "aX005fb");
        assert_eq!(mangle("a.b"), "aX002eb");
    }

    #[test]
    fn demangle_inverts_mangle() {
        for name in [
            "list",
            "symbol->string",
            "display->string",
            "*",
            "<=",
            "snake_case",
            "Ünïcode",
            "emoji\u{1F600}",
            "x:2",
            "",
        ] {
            assert_eq!(demangle(&mangle(name)).as_deref(), Some(name), "{name}");
        }
    }

    #[test]
    fn demangle_rejects_foreign_keys() {
        assert_eq!(demangle("UA"), None);
        assert_eq!(demangle("F"), None);
        assert_eq!(demangle("X12"), None);
    }
}
