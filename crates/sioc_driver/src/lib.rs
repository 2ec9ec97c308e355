#![deny(clippy::unwrap_used)]

mod config;

use std::path::{Path, PathBuf};
use std::time::Instant;

use sioc_core::{Interpreter, RuntimeError, Value, read_all};

pub use config::{
    CONFIG_FILE_NAME, SiocToml, SiocTomlLog, SiocTomlStartup, find_sioc_toml, read_sioc_toml,
};

fn trace_timing() -> bool {
    std::env::var("SIOC_TRACE_TIMING").is_ok_and(|v| v == "1")
}

macro_rules! timing_step {
    ($trace:expr, $label:expr, $block:expr) => {{
        let _t0 = if $trace { Some(Instant::now()) } else { None };
        let result = $block;
        if let Some(t0) = _t0 {
            eprintln!(
                "[SIOC_TIMING] {:40} {:>8.1}ms",
                $label,
                t0.elapsed().as_secs_f64() * 1000.0
            );
        }
        result
    }};
}

#[derive(Debug, thiserror::Error)]
pub enum SiocError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Runtime(#[from] RuntimeError),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

/// Fresh interpreter with the builtin library and the configured engine limits.
pub fn new_interpreter(config: &SiocToml) -> Interpreter {
    Interpreter::with_builtins(config.engine.clone())
}

/// Read and evaluate every form in `src`; `label` names the source in timings.
pub fn load_source(interp: &mut Interpreter, src: &str, label: &str) -> Result<Value, SiocError> {
    let trace = trace_timing();
    let forms = timing_step!(trace, format!("read {label}"), read_all(src))?;
    let mut last = Value::Null;
    timing_step!(
        trace,
        format!("eval {label}"),
        forms.iter().try_for_each(|form| {
            last = interp.eval(form)?;
            Ok::<(), RuntimeError>(())
        })
    )?;
    Ok(last)
}

pub fn load_file(interp: &mut Interpreter, path: &Path) -> Result<Value, SiocError> {
    let src = std::fs::read_to_string(path).map_err(|err| {
        std::io::Error::new(err.kind(), format!("{}: {err}", path.display()))
    })?;
    tracing::debug!(path = %path.display(), "loading file");
    load_source(interp, &src, &path.display().to_string())
}

/// Evaluate the `[startup] preload` files of `config`, resolved against `base`.
pub fn preload(interp: &mut Interpreter, config: &SiocToml, base: &Path) -> Result<(), SiocError> {
    for file in &config.startup.preload {
        let path: PathBuf = if file.is_absolute() {
            file.clone()
        } else {
            base.join(file)
        };
        load_file(interp, &path)?;
    }
    Ok(())
}
