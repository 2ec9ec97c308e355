#![deny(clippy::unwrap_used)]

pub mod dispatch;
mod error;
pub mod intern;
pub mod introspect;
pub mod mangle;
pub mod printer;
pub mod reader;
pub mod runtime;
pub mod types;
pub mod values;

pub use dispatch::{Callable, DispatchEngine, EngineConfig, NameForm};
pub use error::DispatchError;
pub use intern::Symbol;
pub use introspect::{
    IntrospectionError, IntrospectionProvider, MemberImpl, MemberKind, MemberRecord, Registry,
};
pub use printer::{display_string, write_string};
pub use reader::{Reader, read_all};
pub use runtime::{CaptureBuffer, Interpreter, ROOT_SCOPE, RuntimeError, register_builtins};
pub use types::{HostTypeId, TypeDescriptor, TypeLattice};
pub use values::{HostObject, Value};
