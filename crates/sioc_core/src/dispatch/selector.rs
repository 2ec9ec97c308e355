//! Classification of surface names into lookup forms.

use crate::error::DispatchError;
use crate::intern::Symbol;
use crate::introspect::MemberKind;
use crate::mangle::mangle_symbol;
use crate::runtime::{Interpreter, RuntimeError};
use crate::values::Value;

use super::candidate::no_applicable_overload;
use super::metaobject::OriginFilter;

/// A member reference after marker and arity-pin stripping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemberName {
    /// Text as written, minus any arity pin.
    pub surface: Symbol,
    /// Mangled key the member tables are indexed by.
    pub key: Symbol,
    pub kind: MemberKind,
    pub pin: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameForm {
    /// Looked up in the environment, the root scope and then the imports.
    Plain(MemberName),
    /// `.member`: resolved against the runtime type of the first argument.
    Selector(MemberName),
    /// `Type/member`. `plain` is the whole name, used when `Type` is unknown.
    Qualified {
        scope: Symbol,
        member: MemberName,
        plain: MemberName,
    },
}

impl NameForm {
    pub fn classify(name: &str) -> NameForm {
        let (base, pin) = split_arity_pin(name);
        if let Some(member) = base.strip_prefix('.') {
            if !member.is_empty() && !member.starts_with('.') {
                return NameForm::Selector(member_name(member, pin, false));
            }
        }
        if let Some((scope, member)) = base.split_once('/') {
            if !scope.is_empty() && !member.is_empty() {
                return NameForm::Qualified {
                    scope: Symbol::intern(scope),
                    member: member_name(member, pin, true),
                    plain: plain_name(base, pin),
                };
            }
        }
        NameForm::Plain(plain_name(base, pin))
    }
}

/// Split a trailing `:N` arity pin off `name`.
fn split_arity_pin(name: &str) -> (&str, Option<usize>) {
    if let Some((base, digits)) = name.rsplit_once(':') {
        if !base.is_empty() && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(pin) = digits.parse() {
                return (base, Some(pin));
            }
        }
    }
    (name, None)
}

fn plain_name(text: &str, pin: Option<usize>) -> MemberName {
    MemberName {
        surface: Symbol::intern(text),
        key: mangle_symbol(text),
        kind: MemberKind::Method,
        pin,
    }
}

/// `-field` reads, `=field` writes, `new` constructs when qualified.
fn member_name(text: &str, pin: Option<usize>, qualified: bool) -> MemberName {
    let (kind, bare) = if let Some(field) = text.strip_prefix('-').filter(|f| !f.is_empty()) {
        (MemberKind::FieldGet, field)
    } else if let Some(field) = text.strip_prefix('=').filter(|f| !f.is_empty()) {
        (MemberKind::FieldSet, field)
    } else if qualified && text == "new" {
        (MemberKind::Constructor, text)
    } else {
        (MemberKind::Method, text)
    };
    MemberName {
        surface: Symbol::intern(text),
        key: mangle_symbol(bare),
        kind,
        pin,
    }
}

/// A `.member` procedure, resolved per call from its first argument's type.
#[derive(Debug)]
pub struct Selector {
    name: Symbol,
    member: MemberName,
}

impl Selector {
    pub(crate) fn new(name: Symbol, member: MemberName) -> Self {
        Self { name, member }
    }

    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn member(&self) -> &MemberName {
        &self.member
    }

    pub fn invoke(&self, args: Vec<Value>, interp: &mut Interpreter) -> Result<Value, RuntimeError> {
        let Some(receiver) = args.first() else {
            return Err(no_applicable_overload(self.name.as_str(), &args).into());
        };
        let ty = receiver.type_descriptor();
        let engine = interp.engine().clone();
        match engine.resolve_member(ty, &self.member, OriginFilter::Instance, false)? {
            Some(Value::Procedure(callable)) => callable.invoke(args, interp),
            Some(_) | None => Err(DispatchError::UnboundName {
                name: Symbol::intern(&format!(
                    "{}.{}",
                    engine.lattice().type_name(ty),
                    self.member.surface
                )),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_keep_punctuation() {
        let NameForm::Plain(member) = NameForm::classify("symbol->string") else {
            panic!("expected a plain name");
        };
        assert_eq!(member.key, "symbol_Gstring");
        assert_eq!(member.kind, MemberKind::Method);
        assert_eq!(member.pin, None);
    }

    #[test]
    fn arity_pin_is_stripped() {
        let NameForm::Plain(member) = NameForm::classify("list:3") else {
            panic!("expected a plain name");
        };
        assert_eq!(member.surface, "list");
        assert_eq!(member.pin, Some(3));
        // No prefix, or no digits, means no pin.
        assert!(matches!(NameForm::classify(":3"), NameForm::Plain(m) if m.pin.is_none()));
        assert!(matches!(NameForm::classify("a:"), NameForm::Plain(m) if m.pin.is_none()));
        assert!(matches!(NameForm::classify("a:b"), NameForm::Plain(m) if m.pin.is_none()));
    }

    #[test]
    fn selectors_and_field_markers() {
        let NameForm::Selector(member) = NameForm::classify(".-radius") else {
            panic!("expected a selector");
        };
        assert_eq!(member.kind, MemberKind::FieldGet);
        assert_eq!(member.key, "radius");

        let NameForm::Selector(member) = NameForm::classify(".area") else {
            panic!("expected a selector");
        };
        assert_eq!(member.kind, MemberKind::Method);

        assert!(matches!(NameForm::classify("."), NameForm::Plain(_)));
        assert!(matches!(NameForm::classify(".."), NameForm::Plain(_)));
        assert!(matches!(NameForm::classify("..."), NameForm::Plain(_)));
    }

    #[test]
    fn qualified_names_split_at_first_slash() {
        let NameForm::Qualified { scope, member, plain } = NameForm::classify("Point/new:2") else {
            panic!("expected a qualified name");
        };
        assert_eq!(scope, "Point");
        assert_eq!(member.kind, MemberKind::Constructor);
        assert_eq!(member.pin, Some(2));
        assert_eq!(plain.surface, "Point/new");

        let NameForm::Qualified { member, .. } = NameForm::classify("Point/=x") else {
            panic!("expected a qualified name");
        };
        assert_eq!(member.kind, MemberKind::FieldSet);
        assert_eq!(member.key, "x");

        assert!(matches!(NameForm::classify("/"), NameForm::Plain(_)));
        assert!(matches!(NameForm::classify("a/"), NameForm::Plain(_)));
        assert!(matches!(NameForm::classify("/b"), NameForm::Plain(_)));
    }
}
