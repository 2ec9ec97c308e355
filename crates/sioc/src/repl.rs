use std::io::{BufRead, Write};

use sioc_core::{Interpreter, RuntimeError, Symbol, Value, display_string, read_all, write_string};
use sioc_driver::SiocError;

const BANNER: &str = ";; SIOC";
const TRAILER: &str = ";; exit\n";
const PROMPT: &str = "\n> ";

/// Read-eval-print loop over `input`. Results go to the interpreter's output;
/// the banner, prompts and error reports go to `console`.
pub fn run(
    interp: &mut Interpreter,
    input: impl BufRead,
    console: &mut impl Write,
) -> Result<(), SiocError> {
    interp.set_default("banner", Value::text(BANNER));
    interp.set_default("trailer", Value::text(TRAILER));
    interp.set_default("prompt", Value::text(PROMPT));

    write!(console, "{}", setting(interp, "banner"))?;
    write!(console, "{}", setting(interp, "prompt"))?;
    console.flush()?;

    let mut pending = String::new();
    for line in input.lines() {
        pending.push_str(&line?);
        pending.push('\n');
        let forms = match read_all(&pending) {
            Ok(forms) => forms,
            Err(err) if is_incomplete(&err) => continue,
            Err(err) => {
                writeln!(console, "error: {err}")?;
                pending.clear();
                write!(console, "{}", setting(interp, "prompt"))?;
                console.flush()?;
                continue;
            }
        };
        pending.clear();
        for form in &forms {
            match interp.eval(form) {
                Ok(value) => interp.write_output(&write_string(&value))?,
                Err(err) => {
                    tracing::debug!(target: "sioc::repl", error = %err, "evaluation failed");
                    writeln!(console, "error: {err}")?;
                }
            }
        }
        write!(console, "{}", setting(interp, "prompt"))?;
        console.flush()?;
    }

    write!(console, "{}", setting(interp, "trailer"))?;
    console.flush()?;
    Ok(())
}

/// Current display form of a REPL variable; unset or removed variables print as nothing.
fn setting(interp: &Interpreter, name: &str) -> String {
    interp
        .get(Symbol::intern(name))
        .map(|value| display_string(&value))
        .unwrap_or_default()
}

fn is_incomplete(err: &RuntimeError) -> bool {
    match err {
        RuntimeError::Syntax(message) => {
            message.starts_with("unexpected end of input") || message.starts_with("unterminated")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sioc_core::{CaptureBuffer, EngineConfig};

    fn session(input: &str) -> (String, String) {
        let mut interp = Interpreter::with_builtins(EngineConfig::default());
        let output = CaptureBuffer::default();
        interp.set_output(Box::new(output.clone()));
        let mut console = Vec::new();
        run(&mut interp, input.as_bytes(), &mut console).expect("repl");
        (
            output.contents(),
            String::from_utf8(console).expect("utf8 console"),
        )
    }

    #[test]
    fn prints_results_between_prompts() {
        let (output, console) = session("(+ 1 2)\n\"hi\"\n");
        assert_eq!(output, "3\"hi\"");
        assert_eq!(console, ";; SIOC\n> \n> \n> ;; exit\n");
    }

    #[test]
    fn multi_line_forms_are_accumulated() {
        let (output, _) = session("(list 1\n  2)\n");
        assert_eq!(output, "(1 2)");
    }

    #[test]
    fn errors_are_reported_and_the_loop_continues() {
        let (output, console) = session("(no-such-thing)\n)\n(* 6 7)\n");
        assert_eq!(output, "42");
        assert_eq!(console.matches("error: ").count(), 2);
        assert!(console.ends_with(";; exit\n"));
    }

    #[test]
    fn prompt_can_be_redefined() {
        let (_, console) = session("(define prompt \"$ \")\n1\n");
        assert_eq!(console, ";; SIOC\n> $ $ ;; exit\n");
    }
}
