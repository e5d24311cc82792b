//! A minimal JSON build-description loader.
//!
//! The real build-description file loader -- how user scripts are evaluated -- is explicitly out
//! of scope for the engine (PURPOSE & SCOPE, "treated as external collaborators"). This loader is
//! the CLI's stand-in: it reads a flat JSON list of task declarations and submits each one to the
//! `Session`, producing exactly the "stream of task submissions and a build-file mtime set" the
//! engine consumes.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use orchestra_rule::{Rule, TaskHandle, Value};
use orchestra_engine::Session;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("cannot read build file {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("malformed build file {0}: {1}")]
    Parse(PathBuf, serde_json::Error),
}

#[derive(Deserialize)]
struct TaskDecl {
    files_in: Vec<String>,
    files_out: Vec<String>,
    command: String,
    #[serde(default)]
    deps: Vec<String>,
    #[serde(default)]
    depfile: Option<String>,
    #[serde(default)]
    desc: Option<String>,
}

#[derive(Deserialize)]
struct BuildFile {
    #[serde(default)]
    tasks: Vec<TaskDecl>,
}

fn strings(values: Vec<String>) -> Value {
    Value::list(values.into_iter().map(Value::string))
}

/// Reads `build_file`, submits every declared task to `session`, and returns their handles. The
/// file's own mtime is folded into the module set so editing the build description itself forces
/// a rebuild (§4.C check 5).
pub fn load(
    session: &Rc<Session>,
    config: &Rc<Rule>,
    build_file: &Path,
) -> Result<Vec<TaskHandle>, LoaderError> {
    let contents = std::fs::read_to_string(build_file)
        .map_err(|e| LoaderError::Read(build_file.to_path_buf(), e))?;
    let parsed: BuildFile = serde_json::from_str(&contents)
        .map_err(|e| LoaderError::Parse(build_file.to_path_buf(), e))?;

    session.add_module(build_file.to_path_buf());
    let file_root = build_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut handles = Vec::new();
    for task in parsed.tasks {
        let mut overrides = vec![("command".to_string(), Value::string(task.command))];
        if !task.deps.is_empty() {
            overrides.push(("deps".to_string(), strings(task.deps)));
        }
        if let Some(depfile) = task.depfile {
            overrides.push(("depfile".to_string(), Value::string(depfile)));
        }
        if let Some(desc) = task.desc {
            overrides.push(("desc".to_string(), Value::string(desc)));
        }
        let handle = session.submit(
            config,
            strings(task.files_in),
            strings(task.files_out),
            overrides,
            file_root.clone(),
        );
        handles.push(handle);
    }
    Ok(handles)
}
