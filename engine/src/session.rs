//! The Build-Session object (§9 DESIGN NOTES, "Global mutable state... belong to a single
//! Build-Session object passed explicitly to all components, not stored as process globals").
//! Owns the output registry, parallelism gate, counters, module set and status printer for one
//! build run.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::Rc;

use futures::FutureExt;
use orchestra_rule::{Outcome, Rule, TaskHandle, Value};

use crate::disk::DiskInterface;
use crate::gate::Gate;
use crate::printer::Printer;
use crate::registry::OutputRegistry;
use crate::task;

#[derive(Debug, Default, Clone, Copy)]
pub struct Counters {
    pub total: usize,
    pub pass: usize,
    pub fail: usize,
    pub skip: usize,
}

pub struct Session {
    pub root: PathBuf,
    pub registry: OutputRegistry,
    pub gate: Rc<Gate>,
    pub printer: Printer,
    pub disk: Box<dyn DiskInterface>,
    pub counters: RefCell<Counters>,
    display_counter: Cell<usize>,
    module_mtimes: RefCell<HashSet<PathBuf>>,
}

impl Session {
    pub fn new(root: PathBuf, jobs: usize, quiet: bool, disk: Box<dyn DiskInterface>) -> Rc<Session> {
        Rc::new(Session {
            root,
            registry: OutputRegistry::new(),
            gate: Gate::new(jobs),
            printer: Printer::new(quiet),
            disk,
            counters: RefCell::new(Counters::default()),
            display_counter: Cell::new(0),
            module_mtimes: RefCell::new(HashSet::new()),
        })
    }

    pub fn next_display_index(&self) -> usize {
        let next = self.display_counter.get() + 1;
        self.display_counter.set(next);
        next
    }

    /// Records a loaded build-description file path; its mtime feeds every staleness check
    /// (§3 Module Set, §4.C check 5).
    pub fn add_module(&self, path: PathBuf) {
        self.module_mtimes.borrow_mut().insert(path);
    }

    pub fn module_mtimes_vec(&self) -> Vec<PathBuf> {
        self.module_mtimes.borrow().iter().cloned().collect()
    }

    /// The external task submission interface (§6): `rule(files_in, files_out, **overrides) ->
    /// promise`. Spawns the task coroutine on the current `LocalSet` and returns a cloneable
    /// handle other tasks may await.
    pub fn submit(
        self: &Rc<Self>,
        user_rule: &Rc<Rule>,
        files_in: Value,
        files_out: Value,
        overrides: Vec<(String, Value)>,
        file_root: PathBuf,
    ) -> TaskHandle {
        let mut all_overrides = overrides;
        all_overrides.push(("files_in".to_string(), files_in));
        all_overrides.push(("files_out".to_string(), files_out));
        let task_rule = user_rule.extend(all_overrides);

        let session = self.clone();
        let future: orchestra_rule::LocalBoxFuture<'static, Outcome> =
            Box::pin(task::run_task(session, task_rule, file_root));
        let shared = future.shared();
        tokio::task::spawn_local(shared.clone());
        shared
    }

    pub fn exit_code(&self) -> i32 {
        if self.counters.borrow().fail > 0 {
            1
        } else {
            0
        }
    }

    /// The final colored summary line (SPEC_FULL §10.7, grounded on hancho.py's end-of-run
    /// `BUILD PASSED`/`FAILED`/`CLEAN` print).
    pub fn summary_line(&self) -> String {
        let c = *self.counters.borrow();
        let style = console::Style::new();
        if c.fail > 0 {
            format!(
                "{} ({} pass, {} fail, {} skip)",
                style.red().apply_to("BUILD FAILED"),
                c.pass,
                c.fail,
                c.skip
            )
        } else if c.pass == 0 {
            format!(
                "{} ({} total, {} skip)",
                style.green().apply_to("BUILD CLEAN"),
                c.total,
                c.skip
            )
        } else {
            format!(
                "{} ({} pass, {} skip)",
                style.green().apply_to("BUILD PASSED"),
                c.pass,
                c.skip
            )
        }
    }
}
