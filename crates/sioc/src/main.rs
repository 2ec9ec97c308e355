mod logging;
mod repl;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use logging::{LogFormat, LogLevel, LogSettings, init_logging};
use sioc_core::{Interpreter, Value};
use sioc_driver::{
    SiocError, SiocToml, find_sioc_toml, load_file, load_source, new_interpreter, preload,
    read_sioc_toml,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), SiocError> {
    let Some(options) = parse_options(env::args().skip(1).collect())? else {
        print_help();
        return Ok(());
    };

    let cwd = env::current_dir()?;
    let config_path = match &options.config {
        Some(path) => Some(path.clone()),
        None => find_sioc_toml(&cwd),
    };
    let config = match &config_path {
        Some(path) => read_sioc_toml(path)?,
        None => SiocToml::default(),
    };

    let from_file = LogSettings::parse(config.log.format.as_deref(), config.log.level.as_deref());
    init_logging(
        options
            .log
            .or(LogSettings::from_env())
            .or(from_file)
            .resolve(),
    );
    if let Some(path) = &config_path {
        tracing::debug!(target: "sioc", config = %path.display(), "using config");
    }

    let mut interp = new_interpreter(&config);
    let base = config_path
        .as_deref()
        .and_then(Path::parent)
        .map_or(cwd, Path::to_path_buf);
    preload(&mut interp, &config, &base)?;

    let stdin = io::stdin();
    let mut console = io::stderr();
    run_words(&mut interp, options.words, stdin.lock(), &mut console)
}

#[derive(Debug, Default)]
struct Options {
    config: Option<PathBuf>,
    log: LogSettings,
    /// Everything after the driver's own options: `-f`, `-e`, `-i` and script arguments.
    words: Vec<String>,
}

/// Splits off the leading driver options. `None` means help was requested.
fn parse_options(args: Vec<String>) -> Result<Option<Options>, SiocError> {
    let mut options = Options::default();
    let mut args = args.into_iter().peekable();
    while let Some(arg) = args.peek() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--config" | "--log-level" | "--log-format" => {
                let flag = args.next().unwrap_or_default();
                let Some(value) = args.next() else {
                    return Err(SiocError::InvalidCommand(format!("{flag} needs a value")));
                };
                match flag.as_str() {
                    "--config" => options.config = Some(PathBuf::from(value)),
                    "--log-level" => {
                        options.log.level = Some(LogLevel::parse(&value).ok_or_else(|| {
                            SiocError::InvalidCommand(format!("unknown log level: {value}"))
                        })?);
                    }
                    _ => {
                        options.log.format = Some(LogFormat::parse(&value).ok_or_else(|| {
                            SiocError::InvalidCommand(format!("unknown log format: {value}"))
                        })?);
                    }
                }
            }
            _ => break,
        }
    }
    options.words = args.collect();
    Ok(Some(options))
}

/// Runs `-f FILE` and `-e EXPR` in order, then the REPL unless those consumed
/// every word. `-i` starts the REPL immediately. The words left over are bound
/// to `arguments`.
fn run_words(
    interp: &mut Interpreter,
    words: Vec<String>,
    input: impl BufRead,
    console: &mut impl Write,
) -> Result<(), SiocError> {
    let mut words = words.into_iter();
    let mut did_run = false;
    loop {
        let rest = words.as_slice();
        let Some((word, tail)) = rest.split_first() else {
            break;
        };
        match word.as_str() {
            "-f" | "-e" => {
                let Some(operand) = tail.first().cloned() else {
                    return Err(SiocError::InvalidCommand(format!("{word} needs an operand")));
                };
                bind_arguments(interp, &tail[1..]);
                if word == "-f" {
                    load_file(interp, Path::new(&operand))?;
                } else {
                    load_source(interp, &operand, "-e")?;
                }
                words.nth(1);
                did_run = true;
            }
            "-i" => {
                bind_arguments(interp, tail);
                return repl::run(interp, input, console);
            }
            flag if flag.starts_with('-') => {
                return Err(SiocError::InvalidCommand(format!("bad flag: {flag}")));
            }
            _ => break,
        }
    }
    let rest = words.as_slice();
    if did_run && rest.is_empty() {
        return Ok(());
    }
    bind_arguments(interp, rest);
    repl::run(interp, input, console)
}

fn bind_arguments(interp: &mut Interpreter, words: &[String]) {
    let arguments = words.iter().map(|word| Value::text(word)).collect();
    interp.set("arguments", Value::list(arguments));
}

fn print_help() {
    println!(
        "\
sioc: symbolic-expression interpreter

Usage:
  sioc [--config PATH] [--log-level LEVEL] [--log-format text|json]
       [-f FILE | -e EXPR]... [-i] [ARGS...]

Options:
  -f FILE              evaluate every form in FILE
  -e EXPR              evaluate every form in EXPR
  -i                   start the interactive loop now
  --config PATH        read settings from PATH instead of ./sioc.toml
  --log-level LEVEL    error, warn, info, debug or trace
  --log-format FORMAT  text or json
  -h, --help           show this message

With no -f or -e, or with words left after them, the interactive loop starts
with those words bound to `arguments`."
    );
}
