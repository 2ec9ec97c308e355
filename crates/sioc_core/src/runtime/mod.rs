//! Evaluator: special forms, environment lookup and procedure application.

mod builtins;
mod environment;


use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dispatch::{DispatchEngine, EngineConfig};
use crate::error::DispatchError;
use crate::intern::Symbol;
use crate::introspect::Registry;
use crate::printer::write_string;
use crate::reader::read_all;
use crate::values::Value;

pub use builtins::{ROOT_SCOPE, register_builtins};
pub use environment::{Binding, Environment};

/// Forms longer than this are shortened in compile errors.
const FORM_PREVIEW_LIMIT: usize = 100;
const FORM_PREVIEW_KEEP: usize = 80;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("bad syntax: {0}")]
    Syntax(String),
    #[error("cannot compile: {0}")]
    Compile(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("{0}")]
    Message(String),
}

impl From<io::Error> for RuntimeError {
    fn from(err: io::Error) -> Self {
        RuntimeError::Io(err.to_string())
    }
}

/// In-memory sink for interpreter output, cheap to clone and inspect.
#[derive(Clone, Default)]
pub struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Interpreter {
    engine: Arc<DispatchEngine>,
    env: Environment,
    output: Box<dyn Write + Send>,
}

impl Interpreter {
    pub fn new(engine: Arc<DispatchEngine>) -> Self {
        Self {
            engine,
            env: Environment::default(),
            output: Box::new(io::stdout()),
        }
    }

    /// Interpreter over the builtin library only.
    pub fn with_builtins(config: EngineConfig) -> Self {
        let mut registry = Registry::default();
        register_builtins(&mut registry, &config.root_scope_name);
        Self::new(Arc::new(DispatchEngine::new(Arc::new(registry), config)))
    }

    pub fn engine(&self) -> &Arc<DispatchEngine> {
        &self.engine
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn set_output(&mut self, output: Box<dyn Write + Send>) {
        self.output = output;
    }

    pub fn write_output(&mut self, text: &str) -> Result<(), RuntimeError> {
        self.output.write_all(text.as_bytes())?;
        self.output.flush()?;
        Ok(())
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.env.set(Symbol::intern(name), value);
    }

    pub fn set_default(&mut self, name: &str, value: Value) {
        self.env.set_default(Symbol::intern(name), value);
    }

    pub fn unset(&mut self, name: &str) {
        self.env.unset(Symbol::intern(name));
    }

    /// Value of a symbol: the environment first, then dispatch.
    pub fn get(&self, name: Symbol) -> Result<Value, RuntimeError> {
        self.lookup(name)?
            .ok_or_else(|| DispatchError::UnboundName { name }.into())
    }

    fn lookup(&self, name: Symbol) -> Result<Option<Value>, RuntimeError> {
        match self.env.lookup(name) {
            Binding::Bound(value) => Ok(Some(value.clone())),
            Binding::Removed => Ok(None),
            Binding::Absent => Ok(self.engine.resolve(name, None)?),
        }
    }

    pub fn eval(&mut self, expr: &Value) -> Result<Value, RuntimeError> {
        let Value::List(forms) = expr else {
            return match expr {
                Value::Symbol(name) => self.get(*name),
                other => Ok(other.clone()),
            };
        };
        let Some(head) = forms.first() else {
            return Ok(expr.clone());
        };
        let callee = match head {
            Value::Symbol(name) => match self.lookup(*name)? {
                Some(value) if value.as_procedure().is_some() => value,
                resolved => return self.eval_special(*name, expr, forms, resolved),
            },
            other => self.eval(other)?,
        };
        let mut args = Vec::with_capacity(forms.len() - 1);
        for arg in &forms[1..] {
            args.push(self.eval(arg)?);
        }
        self.apply(&callee, args)
    }

    fn eval_special(
        &mut self,
        head: Symbol,
        expr: &Value,
        forms: &[Value],
        resolved: Option<Value>,
    ) -> Result<Value, RuntimeError> {
        match (head.as_str(), forms) {
            ("quote", [_, datum]) => Ok(datum.clone()),
            ("set!" | "define", [_, Value::Symbol(name), value]) => {
                let value = self.eval(value)?;
                self.env.set(*name, value);
                Ok(Value::Null)
            }
            ("begin", [_, body @ ..]) => {
                let mut last = Value::Null;
                for form in body {
                    last = self.eval(form)?;
                }
                Ok(last)
            }
            ("if", [_, test, then]) => {
                if self.eval(test)?.is_true() {
                    self.eval(then)
                } else {
                    Ok(Value::Null)
                }
            }
            ("if", [_, test, then, otherwise]) => {
                if self.eval(test)?.is_true() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            // Malformed special forms, and symbol heads that do not name a
            // procedure, are forms the evaluator cannot compile.
            _ => {
                tracing::debug!(
                    target: "sioc::runtime",
                    head = %head,
                    bound = resolved.is_some(),
                    "cannot compile form"
                );
                Err(RuntimeError::Compile(preview(expr)))
            }
        }
    }

    pub fn apply(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match callee.as_procedure() {
            Some(callable) => callable.invoke(args, self),
            None => Err(DispatchError::NotCallable {
                value: write_string(callee),
            }
            .into()),
        }
    }

    /// Read and evaluate every form in `src`, returning the last value.
    pub fn eval_source(&mut self, src: &str) -> Result<Value, RuntimeError> {
        let mut last = Value::Null;
        for form in read_all(src)? {
            last = self.eval(&form)?;
        }
        Ok(last)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<Value, RuntimeError> {
        let src = std::fs::read_to_string(path)
            .map_err(|err| RuntimeError::Io(format!("{}: {err}", path.display())))?;
        tracing::debug!(target: "sioc::runtime", path = %path.display(), "load");
        self.eval_source(&src)
    }
}

fn preview(expr: &Value) -> String {
    let text = write_string(expr);
    if text.chars().count() <= FORM_PREVIEW_LIMIT {
        return text;
    }
    let mut short: String = text.chars().take(FORM_PREVIEW_KEEP).collect();
    short.push_str(" ...");
    short
}
