use std::fs;

use sioc_core::{CaptureBuffer, DispatchError, RuntimeError, Value};
use sioc_driver::{
    SiocError, SiocToml, find_sioc_toml, load_file, load_source, new_interpreter, preload,
    read_sioc_toml,
};

#[test]
fn load_source_returns_the_last_value() {
    let mut interp = new_interpreter(&SiocToml::default());
    let value = load_source(&mut interp, "(define x 2) (* x 21)", "inline").expect("load");
    assert_eq!(value, Value::Int(42));
    assert_eq!(
        load_source(&mut interp, "", "empty").expect("empty"),
        Value::Null
    );
}

#[test]
fn load_source_surfaces_dispatch_errors() {
    let mut interp = new_interpreter(&SiocToml::default());
    let err = load_source(&mut interp, "undefined-thing", "inline").expect_err("unbound");
    assert!(matches!(
        err,
        SiocError::Runtime(RuntimeError::Dispatch(DispatchError::UnboundName { .. }))
    ));
    let err = load_source(&mut interp, "(undefined-thing)", "inline").expect_err("bad head");
    assert!(matches!(err, SiocError::Runtime(RuntimeError::Compile(_))));
    let err = load_source(&mut interp, "(a", "inline").expect_err("syntax");
    assert!(matches!(err, SiocError::Runtime(RuntimeError::Syntax(_))));
}

#[test]
fn load_file_and_nested_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inner = dir.path().join("inner.scm");
    fs::write(&inner, "(define greeting \"hello\")").expect("write inner");
    let outer = dir.path().join("outer.scm");
    fs::write(
        &outer,
        format!("(load {:?}) (display greeting)", inner.display().to_string()),
    )
    .expect("write outer");

    let mut interp = new_interpreter(&SiocToml::default());
    let buffer = CaptureBuffer::default();
    interp.set_output(Box::new(buffer.clone()));
    load_file(&mut interp, &outer).expect("load outer");
    assert_eq!(buffer.contents(), "hello");

    let err = load_file(&mut interp, &dir.path().join("missing.scm")).expect_err("missing");
    assert!(matches!(err, SiocError::Io(_)));
}

#[test]
fn config_overrides_engine_and_lists_preloads() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(find_sioc_toml(dir.path()).is_none());
    fs::write(
        dir.path().join("sioc.toml"),
        r#"
[engine]
guard_chain_limit = 2

[log]
level = "debug"

[startup]
preload = ["prelude.scm"]
"#,
    )
    .expect("write config");
    fs::write(dir.path().join("prelude.scm"), "(define answer 42)").expect("write prelude");

    let path = find_sioc_toml(dir.path()).expect("config found");
    let config = read_sioc_toml(&path).expect("parse config");
    assert_eq!(config.engine.guard_chain_limit, 2);
    assert_eq!(config.engine.variadic_lookahead, 8);
    assert_eq!(config.engine.root_scope_name, "sioc");
    assert_eq!(config.log.level.as_deref(), Some("debug"));
    assert_eq!(config.log.format, None);

    let mut interp = new_interpreter(&config);
    preload(&mut interp, &config, dir.path()).expect("preload");
    assert_eq!(
        load_source(&mut interp, "answer", "inline").expect("preloaded"),
        Value::Int(42)
    );
}

#[test]
fn malformed_config_is_a_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sioc.toml");
    fs::write(&path, "[engine]\nguard_chain_limit = \"four\"\n").expect("write config");
    assert!(matches!(read_sioc_toml(&path), Err(SiocError::Config(_))));

    fs::write(&path, "[engine]\nroot_scope_name = \"\"\n").expect("write config");
    assert!(matches!(read_sioc_toml(&path), Err(SiocError::Config(_))));
}
