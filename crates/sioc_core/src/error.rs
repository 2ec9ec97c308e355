use crate::intern::Symbol;
use crate::introspect::IntrospectionError;
use crate::types::TypeDescriptor;

/// Failures of name resolution and overload selection.
///
/// All of these are reported to the immediate caller; none is retried and
/// none leaves a call partially applied.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    #[error("unbound: {name}")]
    UnboundName { name: Symbol },
    #[error("ambiguous import: `{name}` is bound differently by {first} and {second}")]
    AmbiguousImport {
        name: Symbol,
        first: String,
        second: String,
    },
    #[error("bad varargs: {owner}.{name} has no usable candidate of arity {arity}")]
    InconsistentVariadicEncoding {
        name: String,
        owner: String,
        arity: usize,
    },
    #[error(
        "no applicable overload: {name} called with {arity} argument(s) of type ({})",
        format_types(.arg_types)
    )]
    NoApplicableOverload {
        name: String,
        arity: usize,
        arg_types: Vec<TypeDescriptor>,
    },
    #[error("not a procedure: {value}")]
    NotCallable { value: String },
    #[error("introspection of {ty} failed: {source}")]
    Introspection {
        ty: String,
        source: IntrospectionError,
    },
}

fn format_types(types: &[TypeDescriptor]) -> String {
    types
        .iter()
        .map(|ty| ty.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
