//! Per-task coroutine lifecycle (§4.D): expand, validate, resolve, canonicalize, register,
//! check, mkdir, expand commands, gate, run, verify, resolve.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use tokio::process::Command;

use orchestra_rule::{flatten_async, CommandError, Outcome, Rule, TemplateError, Value};

use crate::rebuild::{self, needs_rerun, RebuildInputs};
use crate::registry::DuplicateOutput;
use crate::session::Session;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("missing required attribute '{0}'")]
    MissingAttribute(&'static str),
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Rebuild(#[from] rebuild::RebuildError),
    #[error(transparent)]
    Output(#[from] DuplicateOutput),
    #[error("cannot create directory {0}: {1}")]
    Mkdir(PathBuf, std::io::Error),
    #[error("failed to spawn command: {0}")]
    Spawn(std::io::Error),
    #[error("command exited with status {0}")]
    CommandFailed(std::process::ExitStatus),
    #[error("unsupported command shape")]
    UnsupportedCommand,
    #[error("callable command returned null")]
    NullCallableResult,
    #[error("callable command failed: {0}")]
    Callable(CommandError),
    #[error("task is still stale immediately after running (miswired outputs)")]
    StillStaleAfterRun,
    #[error("cancelled")]
    Cancelled,
}

fn map_template_err(e: TemplateError) -> TaskError {
    match e {
        TemplateError::Cancelled => TaskError::Cancelled,
        other => TaskError::Template(other),
    }
}

enum Completion {
    Ran(Vec<PathBuf>),
    Clean(Vec<PathBuf>),
}

/// Runs one task coroutine to completion, never propagating a Rust error out: any failure is
/// folded into the returned `Outcome` per the Cancel-as-value design (§4.F).
pub async fn run_task(session: Rc<Session>, task: Rc<Rule>, file_root: PathBuf) -> Outcome {
    session.counters.borrow_mut().total += 1;
    match run_task_inner(&session, &task, &file_root).await {
        Ok(Completion::Ran(outputs)) => {
            session.counters.borrow_mut().pass += 1;
            Outcome::Outputs(Rc::new(outputs))
        }
        Ok(Completion::Clean(outputs)) => {
            session.counters.borrow_mut().skip += 1;
            Outcome::Outputs(Rc::new(outputs))
        }
        Err(TaskError::Cancelled) => {
            session.counters.borrow_mut().skip += 1;
            Outcome::Cancelled
        }
        Err(e) => {
            if !task.get_bool("quiet") {
                session.printer.line(&format!("FAILED: {e}"));
            }
            session.counters.borrow_mut().fail += 1;
            Outcome::Cancelled
        }
    }
}

async fn values_to_paths(rule: &Rc<Rule>, value: Value, base: &Path) -> Result<Vec<PathBuf>, TaskError> {
    let flat = flatten_async(rule, value).await.map_err(map_template_err)?;
    Ok(flat.iter().map(|v| base.join(v.to_plain_string())).collect())
}

/// Strips `root` off an absolute path for re-expression in command/desc templates. Paths outside
/// `root` are left absolute rather than rejected.
fn root_relative(root: &Path, abs: &Path) -> PathBuf {
    abs.strip_prefix(root).map(Path::to_path_buf).unwrap_or_else(|_| abs.to_path_buf())
}

fn root_relative_value(root: &Path, paths: &[PathBuf]) -> Value {
    Value::list(paths.iter().map(|p| Value::string(root_relative(root, p).display().to_string())))
}

async fn run_task_inner(
    session: &Rc<Session>,
    task: &Rc<Rule>,
    file_root: &Path,
) -> Result<Completion, TaskError> {
    // 1. Expand description for the status line.
    let desc = orchestra_rule::expand(task, task.get("desc"))
        .await
        .map_err(map_template_err)?;

    // 2. Validate.
    if !task.has("command") {
        return Err(TaskError::MissingAttribute("command"));
    }
    if !task.has("files_in") {
        return Err(TaskError::MissingAttribute("files_in"));
    }
    if !task.has("files_out") {
        return Err(TaskError::MissingAttribute("files_out"));
    }

    // 4. Canonicalize paths. `src_dir` is the script directory captured at submission time;
    // `build_dir` and `task_dir` are resolved against the project root.
    let src_dir = file_root.to_path_buf();
    let build_dir_str = orchestra_rule::expand(task, task.get("build_dir"))
        .await
        .map_err(map_template_err)?;
    let build_dir = session.root.join(build_dir_str);
    let task_dir_str = orchestra_rule::expand(task, task.get("task_dir"))
        .await
        .map_err(map_template_err)?;
    let task_dir = session.root.join(task_dir_str);

    // 3 + 4. Resolve inputs (awaiting dependency promises, propagating Cancel) and turn them
    // into absolute paths in the same step.
    let abs_inputs = values_to_paths(task, task.get("files_in"), &src_dir).await?;
    let abs_outputs = values_to_paths(task, task.get("files_out"), &build_dir).await?;
    let abs_deps = values_to_paths(task, task.get("deps"), &src_dir).await?;

    let abs_depfile = if task.has("depfile") {
        let depfile_str = orchestra_rule::expand(task, task.get("depfile"))
            .await
            .map_err(map_template_err)?;
        Some(session.root.join(depfile_str))
    } else {
        None
    };

    // Reassign files_in/files_out/deps to root-relative strings so command/desc expansion (step
    // 8) sees paths valid from task_dir rather than the raw, submission-relative ones the caller
    // passed in.
    task.set("files_in", root_relative_value(&session.root, &abs_inputs));
    task.set("files_out", root_relative_value(&session.root, &abs_outputs));
    task.set("deps", root_relative_value(&session.root, &abs_deps));

    // 5. Register outputs.
    for out in &abs_outputs {
        session.registry.insert(out.clone())?;
    }

    // 6. Consult the staleness oracle.
    let module_mtimes = session.module_mtimes_vec();
    let oracle_inputs = RebuildInputs {
        force: task.get_bool("force"),
        root: &session.root,
        abs_inputs: &abs_inputs,
        abs_outputs: &abs_outputs,
        abs_deps: &abs_deps,
        abs_depfile: abs_depfile.as_deref(),
        module_mtimes: &module_mtimes,
    };
    let reason = needs_rerun(session.disk.as_ref(), &oracle_inputs)?;
    if reason.is_none() {
        return Ok(Completion::Clean(abs_outputs));
    }

    let dryrun = task.get_bool("dryrun");

    // 7. Create output directories.
    if !dryrun {
        for out in &abs_outputs {
            if let Some(parent) = out.parent() {
                session
                    .disk
                    .mkdir_p(parent)
                    .map_err(|e| TaskError::Mkdir(parent.to_path_buf(), e))?;
            }
        }
    }

    // 8. Expand commands to concrete strings and/or callables.
    let commands = flatten_async(task, task.get("command"))
        .await
        .map_err(map_template_err)?;

    // 9. Acquire the parallelism gate, assign a display index, log status.
    let permit = session.gate.acquire().await;
    let index = session.next_display_index();
    let total = session.counters.borrow().total;
    let sameline = !task.get_bool("verbose") && !task.get_bool("quiet");
    session.printer.status(&format!("[{index}/{total}] {desc}"), sameline);
    if task.get_bool("verbose") || task.get_bool("debug") {
        session.printer.line(&format!("Reason: {}", reason.unwrap_or("")));
    }

    // 10. Run each command.
    if !dryrun {
        for command in &commands {
            invoke_command(task, command, &task_dir).await?;
        }
    }

    // 11. Release the gate, then re-consult the oracle.
    drop(permit);
    if !dryrun {
        let still_stale = needs_rerun(session.disk.as_ref(), &oracle_inputs)?;
        if still_stale.is_some() {
            return Err(TaskError::StillStaleAfterRun);
        }
    }

    // 12. Resolve with the absolute output list.
    Ok(Completion::Ran(abs_outputs))
}

async fn invoke_command(task: &Rc<Rule>, command: &Value, task_dir: &Path) -> Result<(), TaskError> {
    match command {
        Value::Command(callable) => {
            // Scoped chdir: enter, construct the callable's future synchronously, then restore
            // immediately so no suspension ever crosses a process-global cwd mutation (§5).
            let previous = std::env::current_dir().ok();
            let _ = std::env::set_current_dir(task_dir);
            let future = callable(task.clone());
            if let Some(previous) = previous {
                let _ = std::env::set_current_dir(previous);
            }
            let result = future.await.map_err(TaskError::Callable)?;
            if result.is_null() {
                return Err(TaskError::NullCallableResult);
            }
            Ok(())
        }
        Value::String(command) => {
            let output = Command::new("/bin/sh")
                .arg("-c")
                .arg(command)
                .current_dir(task_dir)
                .output()
                .await
                .map_err(TaskError::Spawn)?;
            if !output.status.success() {
                return Err(TaskError::CommandFailed(output.status));
            }
            if !task.get_bool("quiet") {
                if !output.stdout.is_empty() {
                    print!("{}", String::from_utf8_lossy(&output.stdout));
                }
                if !output.stderr.is_empty() {
                    eprint!("{}", String::from_utf8_lossy(&output.stderr));
                }
            }
            Ok(())
        }
        _ => Err(TaskError::UnsupportedCommand),
    }
}
