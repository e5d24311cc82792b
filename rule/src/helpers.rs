//! The handful of functions bound by name on the `Config` root and reachable from any `{expr}`
//! template (DESIGN NOTES: "function calls against registered helpers (`len`, `glob`, `swap_ext`,
//! `run_cmd`, `color`)").

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::value::{ExprError, Value};

pub fn len(args: &[Value]) -> Result<Value, ExprError> {
    match args {
        [Value::List(items)] => Ok(Value::Number(items.len() as f64)),
        [Value::String(s)] => Ok(Value::Number(s.chars().count() as f64)),
        [Value::Null] => Ok(Value::Number(0.0)),
        [_] => Err(ExprError::Other("len() needs a list or string".to_string())),
        _ => Err(ExprError::Arity("len".to_string())),
    }
}

pub fn glob(args: &[Value]) -> Result<Value, ExprError> {
    let pattern = match args {
        [Value::String(s)] => s.clone(),
        [Value::Path(p)] => p.display().to_string(),
        _ => return Err(ExprError::Arity("glob".to_string())),
    };
    let mut matches: Vec<String> = ::glob::glob(&pattern)
        .map_err(|e| ExprError::Other(format!("bad glob pattern: {e}")))?
        .filter_map(|entry| entry.ok())
        .map(|p| p.display().to_string())
        .collect();
    matches.sort();
    Ok(Value::List(matches.into_iter().map(Value::String).collect()))
}

fn replace_ext(name: &str, new_ext: &str) -> String {
    let new_ext = new_ext.strip_prefix('.').unwrap_or(new_ext);
    Path::new(name)
        .with_extension(new_ext)
        .to_string_lossy()
        .into_owned()
}

fn swap_ext_value(value: &Value, new_ext: &str) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::List(items) => Value::List(
            items
                .iter()
                .map(|item| swap_ext_value(item, new_ext))
                .collect(),
        ),
        Value::String(s) => Value::String(replace_ext(s, new_ext)),
        Value::Path(p) => Value::Path(PathBuf::from(replace_ext(
            &p.display().to_string(),
            new_ext,
        ))),
        other => Value::String(replace_ext(&other.to_plain_string(), new_ext)),
    }
}

pub fn swap_ext(args: &[Value]) -> Result<Value, ExprError> {
    match args {
        [name, Value::String(new_ext)] => Ok(swap_ext_value(name, new_ext)),
        [_, _] => Err(ExprError::Other(
            "swap_ext()'s second argument must be a string".to_string(),
        )),
        _ => Err(ExprError::Arity("swap_ext".to_string())),
    }
}

/// Runs a console command and returns its stdout with whitespace stripped. Intentionally
/// synchronous, matching the source (`subprocess.check_output`) -- this is invoked while
/// evaluating a single `{expr}` span, not a build command, so it blocks the single executor
/// thread only as long as the subprocess takes.
pub fn run_cmd(args: &[Value]) -> Result<Value, ExprError> {
    let cmd = match args {
        [Value::String(s)] => s.clone(),
        _ => return Err(ExprError::Arity("run_cmd".to_string())),
    };
    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(&cmd)
        .output()
        .map_err(|e| ExprError::Other(format!("run_cmd failed to spawn: {e}")))?;
    if !output.status.success() {
        return Err(ExprError::Other(format!(
            "run_cmd: '{cmd}' exited with {}",
            output.status
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(Value::String(stdout.trim().to_string()))
}

/// Converts RGB color to an ANSI escape string. Color codes don't render in the Windows console,
/// so they're suppressed there.
pub fn color(args: &[Value]) -> Result<Value, ExprError> {
    if cfg!(windows) {
        return Ok(Value::String(String::new()));
    }
    match args {
        [] => Ok(Value::String("\x1B[0m".to_string())),
        [r, g, b] => {
            let as_u8 = |v: &Value| -> Result<u8, ExprError> {
                match v {
                    Value::Number(n) => Ok(*n as u8),
                    _ => Err(ExprError::Other("color() args must be numbers".to_string())),
                }
            };
            Ok(Value::String(format!(
                "\x1B[38;2;{};{};{}m",
                as_u8(r)?,
                as_u8(g)?,
                as_u8(b)?
            )))
        }
        _ => Err(ExprError::Arity("color".to_string())),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_swap_ext_single() {
        let result = swap_ext(&[Value::string("foo.c"), Value::string(".o")]).unwrap();
        assert_eq!(result.to_plain_string(), "foo.o");
    }

    #[test]
    fn test_swap_ext_list() {
        let result = swap_ext(&[
            Value::list([Value::string("a.c"), Value::string("b.c")]),
            Value::string(".o"),
        ])
        .unwrap();
        match result {
            Value::List(items) => {
                let strings: Vec<String> = items.iter().map(Value::to_plain_string).collect();
                assert_eq!(strings, vec!["a.o", "b.o"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_len() {
        let result = len(&[Value::list([Value::string("a"), Value::string("b")])]).unwrap();
        assert_eq!(result.to_plain_string(), "2");
    }
}
